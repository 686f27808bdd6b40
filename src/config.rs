use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct XnodeConfig {
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub defaults: DefaultsSection,
    #[serde(default)]
    pub registry: RegistrySection,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolsSection {
    #[serde(default)]
    pub bundler: BundlerEntry,
    #[serde(default)]
    pub npm: ToolEntry,
    #[serde(default)]
    pub docs: DocsEntry,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolEntry {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BundlerEntry {
    pub path: Option<PathBuf>,
    /// Replaces the default rollup arguments when set.
    pub args: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DocsEntry {
    pub path: Option<PathBuf>,
    /// Replaces the default jsdoc2md arguments when set.
    pub args: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DefaultsSection {
    /// Directory copied by `xnode new` instead of the built-in template.
    pub template: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegistrySection {
    /// Map of profile name -> profile configuration.
    #[serde(default, flatten)]
    pub profiles: HashMap<String, RegistryProfileConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryProfileConfig {
    /// Base URL of the registry.
    #[serde(default)]
    pub url: Option<String>,
    /// Publishing user; overrides the email taken from `package.json`.
    #[serde(default)]
    pub user: Option<String>,
    /// Access token; allow env:VAR indirection. Skips the keychain when set.
    #[serde(default)]
    pub token: Option<String>,
}

pub fn load() -> Result<XnodeConfig> {
    let path_override = std::env::var("XNODE_CONFIG").ok();
    load_from(path_override.as_deref())
}

pub fn load_from(path_override: Option<&str>) -> Result<XnodeConfig> {
    let Some(path) = config_path_override(path_override) else {
        return Ok(XnodeConfig::default());
    };

    if !path.exists() {
        return Ok(XnodeConfig::default());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    let config: XnodeConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config at {}", path.display()))?;
    Ok(config)
}

fn config_path_override(path_override: Option<&str>) -> Option<PathBuf> {
    if let Some(raw) = path_override {
        return Some(PathBuf::from(raw));
    }
    config_path()
}

pub fn config_path() -> Option<PathBuf> {
    // Prefer XDG-style config path, but fall back to ~/.xnode/config.toml.
    if let Some(mut dir) = dirs::config_dir() {
        dir.push("xnode");
        dir.push("config.toml");
        if dir.exists() {
            return Some(dir);
        }
    }
    dirs::home_dir().map(|mut home| {
        home.push(".xnode");
        home.push("config.toml");
        home
    })
}
