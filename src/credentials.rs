//! Registry credentials cached in the OS keychain.

use std::cell::RefCell;
use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

/// Keychain service all tokens are stored under.
pub const KEYCHAIN_SERVICE: &str = "design-express/xnode";

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub user: String,
    pub token: String,
}

impl Credential {
    pub fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.user, self.token);
        format!("Basic {}", STANDARD.encode(raw.as_bytes()))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .finish()
    }
}

pub trait SecretStore {
    fn get(&self, user: &str) -> Result<Option<String>>;
    fn set(&self, user: &str, token: &str) -> Result<()>;
    /// Returns whether a token was removed.
    fn delete(&self, user: &str) -> Result<bool>;
}

pub trait TokenPrompt {
    fn prompt(&self, user: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, user: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, user).context("failed to open OS keychain entry")
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(KEYCHAIN_SERVICE)
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, user: &str) -> Result<Option<String>> {
        match self.entry(user)?.get_password() {
            Ok(value) if value.trim().is_empty() => Ok(None),
            Ok(value) => Ok(Some(value.trim().to_string())),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err).context("failed to read token from OS keychain"),
        }
    }

    fn set(&self, user: &str, token: &str) -> Result<()> {
        self.entry(user)?
            .set_password(token)
            .context("failed to store token in OS keychain")
    }

    fn delete(&self, user: &str) -> Result<bool> {
        match self.entry(user)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(err).context("failed to delete token from OS keychain"),
        }
    }
}

/// Process-local store, used when no keychain should be touched.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tokens: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn with_token(user: &str, token: &str) -> Self {
        let store = Self::default();
        store
            .tokens
            .borrow_mut()
            .insert(user.to_string(), token.to_string());
        store
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, user: &str) -> Result<Option<String>> {
        Ok(self.tokens.borrow().get(user).cloned())
    }

    fn set(&self, user: &str, token: &str) -> Result<()> {
        self.tokens
            .borrow_mut()
            .insert(user.to_string(), token.to_string());
        Ok(())
    }

    fn delete(&self, user: &str) -> Result<bool> {
        Ok(self.tokens.borrow_mut().remove(user).is_some())
    }
}

/// Masked terminal prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl TokenPrompt for TerminalPrompt {
    fn prompt(&self, user: &str) -> Result<String> {
        println!("Please login Email : '{user}'");
        dialoguer::Password::new()
            .with_prompt("Access Token")
            .interact()
            .context("failed to read access token")
    }
}

/// Returns the cached token for `user`, prompting and caching one if absent.
pub fn resolve(store: &dyn SecretStore, prompt: &dyn TokenPrompt, user: &str) -> Result<Credential> {
    if let Some(token) = store.get(user)? {
        debug!(%user, "using cached token");
        return Ok(Credential {
            user: user.to_string(),
            token,
        });
    }
    let token = login(store, prompt, user)?;
    Ok(Credential {
        user: user.to_string(),
        token,
    })
}

/// Prompts for a token and stores it, replacing any cached one.
pub fn login(store: &dyn SecretStore, prompt: &dyn TokenPrompt, user: &str) -> Result<String> {
    let token = prompt.prompt(user)?.trim().to_string();
    if token.is_empty() {
        bail!("access token cannot be empty");
    }
    store.set(user, &token)?;
    Ok(token)
}
