use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::json;

use crate::xnode::{self, Archive};

pub fn inspect(path: &Path, emit_json: bool) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let archive = xnode::decode(&bytes)
        .with_context(|| format!("{} is not a valid xnode archive", path.display()))?;
    let integrity = xnode::archive_integrity(&bytes);

    if emit_json {
        print_inspect_json(&archive, bytes.len(), &integrity)
    } else {
        print_inspect_human(path, &archive, bytes.len(), &integrity);
        Ok(())
    }
}

fn print_inspect_human(path: &Path, archive: &Archive, file_len: usize, integrity: &str) {
    let manifest = &archive.envelope.manifest;
    println!("{} ({})", path.display(), integrity);
    println!("Name: {}", manifest.name);
    println!("Version: {}", manifest.version);
    if let Some(description) = &manifest.description {
        println!("Description: {description}");
    }
    if let Some(author) = &manifest.author {
        println!("Author: {author}");
    }
    if let Some(license) = &manifest.license {
        println!("License: {license}");
    }
    if !manifest.keywords.is_empty() {
        println!("Keywords: {}", manifest.keywords.join(", "));
    }
    println!("Entry: {}", manifest.entry);
    println!("Builder: {}", manifest.builder);
    println!("Packed at: {}", manifest.packed_at);
    println!("Layout version: {}", archive.header.version);
    println!("Name hash: {}", archive.header.name_hash_hex());
    println!("Payload sha256: {}", archive.header.integrity_hex());
    println!("Script integrity: {}", archive.envelope.integrity);
    println!(
        "Sizes: file {} bytes, payload {} bytes, script {} bytes",
        file_len,
        archive.payload_len,
        archive.envelope.script.len()
    );
}

fn print_inspect_json(archive: &Archive, file_len: usize, integrity: &str) -> Result<()> {
    let payload = json!({
        "manifest": archive.envelope.manifest,
        "header": {
            "version": archive.header.version,
            "name_hash": archive.header.name_hash_hex(),
            "payload_sha256": archive.header.integrity_hex(),
        },
        "integrity": integrity,
        "script_integrity": archive.envelope.integrity,
        "sizes": {
            "file": file_len,
            "payload": archive.payload_len,
            "script": archive.envelope.script.len(),
        },
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

pub fn verify(path: &Path) -> Result<()> {
    let archive = xnode::read_file(path)?;
    let manifest = &archive.envelope.manifest;
    println!(
        "✓ xnode verified: {} ({}@{})",
        path.display(),
        manifest.name,
        manifest.version
    );
    Ok(())
}

/// Writes the bundled script and `manifest.json` into `out_dir`, which
/// defaults to `<file stem>/` next to the archive.
pub fn unpack(path: &Path, out_dir: Option<&Path>) -> Result<PathBuf> {
    let archive = xnode::read_file(path)?;
    let out_dir = match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_unpack_dir(path)?,
    };

    let entry = Path::new(&archive.envelope.manifest.entry);
    let Some(entry_name) = entry.file_name() else {
        bail!("archive entry `{}` is not a file name", entry.display());
    };
    if entry_name == OsStr::new("manifest.json") {
        bail!("archive entry `manifest.json` would overwrite the manifest");
    }

    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let script_path = out_dir.join(entry_name);
    fs::write(&script_path, &archive.envelope.script)
        .with_context(|| format!("failed to write {}", script_path.display()))?;
    let manifest_path = out_dir.join("manifest.json");
    let manifest = serde_json::to_string_pretty(&archive.envelope.manifest)?;
    fs::write(&manifest_path, manifest)
        .with_context(|| format!("failed to write {}", manifest_path.display()))?;

    println!(
        "✓ Unpacked {}@{} into {}",
        archive.envelope.manifest.name,
        archive.envelope.manifest.version,
        out_dir.display()
    );
    Ok(out_dir)
}

fn default_unpack_dir(path: &Path) -> Result<PathBuf> {
    let Some(stem) = path.file_stem() else {
        bail!("cannot derive an output directory from {}", path.display());
    };
    Ok(path.with_file_name(stem))
}
