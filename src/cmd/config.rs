use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use toml_edit::{DocumentMut, Item, Table, Value, value};

use crate::cli::{ConfigCommand, ConfigSetArgs};
use crate::config;

pub fn run(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Set(args) => set_value(&args),
    }
}

fn target_path(args: &ConfigSetArgs) -> Result<PathBuf> {
    if let Some(path) = &args.file {
        return Ok(path.clone());
    }
    if let Ok(path) = std::env::var("XNODE_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    config::config_path()
        .ok_or_else(|| anyhow!("failed to resolve ~/.xnode/config.toml (no home directory found)"))
}

fn set_value(args: &ConfigSetArgs) -> Result<()> {
    let path = target_path(args)?;
    ensure_parent(&path)?;

    let mut doc = if path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if raw.trim().is_empty() {
            DocumentMut::new()
        } else {
            raw.parse::<DocumentMut>()
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
    } else {
        DocumentMut::new()
    };

    apply_key(&mut doc, &args.key, &args.value)?;

    fs::write(&path, doc.to_string())
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("✓ Updated {} in {}", args.key, path.display());
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn apply_key(doc: &mut DocumentMut, key: &str, value_str: &str) -> Result<()> {
    let segments = key
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>();
    let Some((last, parents)) = segments.split_last() else {
        bail!("config key cannot be empty");
    };

    let mut current = doc.as_table_mut();
    for segment in parents {
        current = current
            .entry(segment)
            .or_insert(Item::Table(Table::new()))
            .as_table_mut()
            .ok_or_else(|| anyhow!("path `{segment}` is not a table in the config"))?;
    }

    current.insert(last, parse_value(value_str)?);
    Ok(())
}

/// Inline arrays (`["a", "b"]`) keep their TOML type; anything else is a string.
fn parse_value(raw: &str) -> Result<Item> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        let parsed = trimmed
            .parse::<Value>()
            .with_context(|| format!("failed to parse `{raw}` as a TOML array"))?;
        return Ok(Item::Value(parsed));
    }
    Ok(value(raw))
}
