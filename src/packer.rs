use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::project::ProjectManifest;
use crate::xnode::{self, Envelope, Manifest};

#[derive(Debug, Clone)]
pub struct PackRequest {
    pub project_dir: PathBuf,
    /// Bundle outputs; exactly one is accepted.
    pub outputs: Vec<PathBuf>,
    /// Directory receiving the archive; defaults to the project directory.
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PackOutcome {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub project: ProjectManifest,
    pub manifest: Manifest,
    /// `sha256-<hex>` of the whole archive.
    pub integrity: String,
}

pub fn pack(request: &PackRequest) -> Result<PackOutcome> {
    let script_path = single_output(&request.outputs)?;
    if !script_path.is_file() {
        bail!("cannot find {}", script_path.display());
    }
    let project = ProjectManifest::load(&request.project_dir)?;
    let script = fs::read_to_string(script_path)
        .with_context(|| format!("failed to read {}", script_path.display()))?;

    let manifest = build_manifest(&project, script_path)?;
    let envelope = Envelope::new(manifest.clone(), script);

    let out_dir = request
        .out_dir
        .clone()
        .unwrap_or_else(|| request.project_dir.clone());
    let path = out_dir.join(project.archive_file_name());
    let bytes = xnode::write_file(&path, &envelope)?;
    let integrity = xnode::archive_integrity(&bytes);

    info!(path = %path.display(), size = bytes.len(), "wrote xnode archive");
    println!(
        "✓ Packed {}@{} at {} ({} bytes, {})",
        manifest.name,
        manifest.version,
        path.display(),
        bytes.len(),
        integrity
    );

    Ok(PackOutcome {
        path,
        bytes,
        project,
        manifest,
        integrity,
    })
}

fn single_output(outputs: &[PathBuf]) -> Result<&Path> {
    match outputs {
        [] => bail!("bundler produced no output file"),
        [only] => Ok(only.as_path()),
        many => bail!(
            "cannot publish multiple files ({} bundle outputs: {})",
            many.len(),
            many.iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn build_manifest(project: &ProjectManifest, script_path: &Path) -> Result<Manifest> {
    let entry = script_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index.js".to_string());
    Ok(Manifest {
        name: project.package.full(),
        version: project.version.to_string(),
        description: project.description.clone(),
        author: project.author.as_ref().map(|author| author.display()),
        license: project.license.clone(),
        keywords: project.keywords.clone(),
        entry,
        builder: format!("xnode-dev {}", env!("CARGO_PKG_VERSION")),
        packed_at: packed_at()?,
    })
}

/// RFC 3339 timestamp, pinned by `SOURCE_DATE_EPOCH` for reproducible archives.
fn packed_at() -> Result<String> {
    let now = match std::env::var("SOURCE_DATE_EPOCH") {
        Ok(raw) => {
            let secs: i64 = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid SOURCE_DATE_EPOCH `{raw}`"))?;
            OffsetDateTime::from_unix_timestamp(secs)
                .with_context(|| format!("SOURCE_DATE_EPOCH `{raw}` out of range"))?
        }
        Err(_) => OffsetDateTime::now_utc(),
    };
    now.format(&Rfc3339).context("unable to format timestamp")
}
