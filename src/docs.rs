use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::info;

use crate::config::XnodeConfig;
use crate::project::ProjectManifest;
use crate::util::process::{self, CommandSpec, StreamMode};

pub const DEFAULT_DOCS_TOOL: &str = "npx";
pub const DEFAULT_DOCS_ARGS: &[&str] = &["jsdoc2md", "--files", "src/**/*.js"];
/// Markdown file written relative to the project directory.
pub const DOCS_OUTPUT: &str = "docs/index.md";

/// Documentation generator whose stdout becomes the markdown file.
#[derive(Debug, Clone)]
pub struct DocsGenerator {
    pub command: CommandSpec,
}

impl DocsGenerator {
    pub fn from_config(config: &XnodeConfig) -> Result<Self> {
        let entry = &config.tools.docs;
        let program = match &entry.path {
            Some(path) => path.clone(),
            None => which::which(DEFAULT_DOCS_TOOL).map_err(|_| {
                anyhow!(
                    "`{DEFAULT_DOCS_TOOL}` not found on PATH; install Node.js or set tools.docs.path"
                )
            })?,
        };
        let command = match &entry.args {
            Some(args) => CommandSpec::new(program).args(args.iter()),
            None => CommandSpec::new(program).args(DEFAULT_DOCS_ARGS.iter().copied()),
        };
        Ok(Self { command })
    }

    pub fn render(&self, project_dir: &Path) -> Result<Vec<u8>> {
        let spec = self
            .command
            .clone()
            .current_dir(project_dir)
            .output(StreamMode::Capture);
        info!(command = %spec.display(), "generating docs");
        let output = process::run_checked(&spec).context("documentation generator failed")?;
        Ok(output.stdout.unwrap_or_default())
    }
}

/// Renders API docs for the project into `out` (default `docs/index.md`).
pub fn generate(config: &XnodeConfig, project_dir: &Path, out: Option<&Path>) -> Result<PathBuf> {
    ProjectManifest::load(project_dir)?;
    println!("Generating documents...");
    let markdown = DocsGenerator::from_config(config)?.render(project_dir)?;

    let path = match out {
        Some(path) => path.to_path_buf(),
        None => project_dir.join(DOCS_OUTPUT),
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, &markdown).with_context(|| format!("failed to write {}", path.display()))?;
    println!("✓ Wrote {} ({} bytes)", path.display(), markdown.len());
    Ok(path)
}
