use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use reqwest::blocking::Client;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::config::{RegistryProfileConfig, XnodeConfig};
use crate::credentials::Credential;

pub const DEFAULT_REGISTRY_URL: &str = "http://localhost:8000";
pub const UPLOAD_PATH: &str = "/-/package/";
pub const XNODE_CONTENT_TYPE: &str = "application/x-xnode";

/// Form fields set explicitly; same-named `package.json` keys are not forwarded.
const RESERVED_FIELDS: &[&str] = &["name", "version", "scope", "integrity", "tgz_file", "read_me"];

#[derive(Debug)]
pub enum RegistryError {
    Http(reqwest::Error),
    Unauthorized(Option<String>),
    Status(reqwest::StatusCode, Option<String>),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Http(err) => write!(f, "http error: {err}"),
            RegistryError::Unauthorized(body) => {
                write!(f, "registry rejected the credentials")?;
                if let Some(body) = body {
                    write!(f, ": {body}")?;
                }
                write!(f, " (run `xnode login <email>` to replace the stored token)")
            }
            RegistryError::Status(code, body) => {
                if let Some(body) = body {
                    write!(f, "unexpected status {code}: {body}")
                } else {
                    write!(f, "unexpected status {code}")
                }
            }
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<reqwest::Error> for RegistryError {
    fn from(value: reqwest::Error) -> Self {
        RegistryError::Http(value)
    }
}

#[derive(Debug, Clone)]
pub struct RegistryProfile {
    pub name: String,
    pub url: String,
    pub user: Option<String>,
    pub token: Option<String>,
}

impl RegistryProfile {
    fn from_pair(name: &str, cfg: &RegistryProfileConfig) -> Result<Self> {
        let token = resolve_token(cfg.token.clone())?;
        let url = cfg
            .url
            .as_ref()
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string());
        Ok(Self {
            name: name.to_string(),
            url,
            user: cfg.user.clone(),
            token,
        })
    }
}

pub fn resolve_profile(config: &XnodeConfig, profile_arg: Option<&str>) -> Result<RegistryProfile> {
    let env_profile = std::env::var("XNODE_REGISTRY_PROFILE").ok();
    let profile_name = profile_arg.or(env_profile.as_deref()).unwrap_or("default");
    match config.registry.profiles.get(profile_name) {
        Some(profile_cfg) => RegistryProfile::from_pair(profile_name, profile_cfg),
        None if profile_name == "default" => {
            RegistryProfile::from_pair(profile_name, &RegistryProfileConfig::default())
        }
        None => {
            let location = std::env::var("XNODE_CONFIG")
                .map(PathBuf::from)
                .ok()
                .or_else(crate::config::config_path)
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "the xnode config file".to_string());
            bail!("registry profile `{profile_name}` not found; add [registry.{profile_name}] to {location}")
        }
    }
}

fn resolve_token(raw: Option<String>) -> Result<Option<String>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if let Some(rest) = raw.strip_prefix("env:") {
        let value = std::env::var(rest)
            .with_context(|| format!("failed to resolve env var {rest} for registry token"))?;
        Ok(Some(value))
    } else if raw.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(raw))
    }
}

/// Everything the registry needs for one upload.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub name: String,
    pub version: String,
    pub scope: Option<String>,
    /// `sha256-<hex>` of `archive`.
    pub integrity: String,
    pub archive: Vec<u8>,
    pub readme: Option<String>,
    /// Additional `package.json` fields, flattened into form fields.
    pub metadata: Map<String, JsonValue>,
}

impl PublishRequest {
    pub fn upload_file_name(&self) -> String {
        format!("{}-{}.xnode", self.name, self.version)
    }

    /// Text fields in the order they are sent.
    pub fn text_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("name".to_string(), self.name.clone()),
            ("version".to_string(), self.version.clone()),
            ("scope".to_string(), self.scope.clone().unwrap_or_default()),
            ("integrity".to_string(), self.integrity.clone()),
        ];
        if let Some(readme) = &self.readme {
            fields.push(("read_me".to_string(), readme.clone()));
        }
        for (key, value) in &self.metadata {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            flatten_field(key, value, &mut fields);
        }
        fields
    }
}

/// Flattens nested JSON into `key[sub]` / `key[0]` form fields. Booleans are
/// sent as `1`/`0`; nulls are dropped.
pub fn flatten_field(key: &str, value: &JsonValue, out: &mut Vec<(String, String)>) {
    match value {
        JsonValue::Null => {}
        JsonValue::Bool(flag) => out.push((key.to_string(), if *flag { "1" } else { "0" }.into())),
        JsonValue::Number(number) => out.push((key.to_string(), number.to_string())),
        JsonValue::String(text) => out.push((key.to_string(), text.clone())),
        JsonValue::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_field(&format!("{key}[{index}]"), item, out);
            }
        }
        JsonValue::Object(map) => {
            for (sub, item) in map {
                flatten_field(&format!("{key}[{sub}]"), item, out);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub status: reqwest::StatusCode,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    http: Client,
}

impl RegistryClient {
    pub fn from_profile(profile: &RegistryProfile) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!("xnode-dev/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: profile.url.clone(),
            http: client,
        })
    }

    pub fn upload_url(&self) -> String {
        format!("{}{UPLOAD_PATH}", self.base_url.trim_end_matches('/'))
    }

    pub fn publish(
        &self,
        request: &PublishRequest,
        credential: &Credential,
    ) -> Result<PublishReceipt, RegistryError> {
        let mut form = Form::new();
        for (key, value) in request.text_fields() {
            form = form.text(key, value);
        }
        let file = Part::bytes(request.archive.clone())
            .file_name(request.upload_file_name())
            .mime_str(XNODE_CONTENT_TYPE)?;
        form = form.part("tgz_file", file);

        let url = self.upload_url();
        debug!(%url, size = request.archive.len(), "uploading xnode");
        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, credential.basic_auth())
            .multipart(form)
            .send()?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            let body = response.text().ok().filter(|b| !b.trim().is_empty());
            return Err(RegistryError::Unauthorized(body));
        }
        if !status.is_success() {
            let body = response.text().ok().filter(|b| !b.trim().is_empty());
            return Err(RegistryError::Status(status, body));
        }
        let body = response.bytes()?;
        Ok(PublishReceipt { status, body })
    }
}
