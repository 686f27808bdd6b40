use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info};

use crate::config::XnodeConfig;
use crate::project::ProjectManifest;
use crate::util::process::{self, CommandSpec};

pub const DEFAULT_BUNDLER: &str = "npx";
pub const DEFAULT_BUNDLER_ARGS: &[&str] =
    &["rollup", "--config", "rollup.config.js", "--format", "iife"];
/// Output used when neither `--output` nor `package.json` `main` is given.
pub const DEFAULT_OUTPUT: &str = "dist/index.js";

/// Bundler invocation resolved from configuration.
#[derive(Debug, Clone)]
pub struct Bundler {
    pub command: CommandSpec,
}

impl Bundler {
    pub fn from_config(config: &XnodeConfig) -> Result<Self> {
        let entry = &config.tools.bundler;
        let program = match &entry.path {
            Some(path) => path.clone(),
            None => which::which(DEFAULT_BUNDLER).map_err(|_| {
                anyhow!(
                    "`{DEFAULT_BUNDLER}` not found on PATH; install Node.js or set tools.bundler.path"
                )
            })?,
        };
        let command = match &entry.args {
            Some(args) => CommandSpec::new(program).args(args.iter()),
            None => CommandSpec::new(program).args(DEFAULT_BUNDLER_ARGS.iter().copied()),
        };
        Ok(Self { command })
    }

    pub fn run(&self, project_dir: &Path) -> Result<()> {
        let spec = self.command.clone().current_dir(project_dir);
        info!(command = %spec.display(), "running bundler");
        process::run_checked(&spec).context("bundler failed")?;
        Ok(())
    }
}

/// Resolves the scripts the bundler is expected to have produced.
pub fn resolve_outputs(
    project_dir: &Path,
    manifest: &ProjectManifest,
    explicit: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    let candidates: Vec<PathBuf> = if !explicit.is_empty() {
        explicit.to_vec()
    } else if let Some(main) = manifest.main.as_deref().filter(|m| !m.trim().is_empty()) {
        vec![PathBuf::from(main)]
    } else {
        vec![PathBuf::from(DEFAULT_OUTPUT)]
    };

    let mut outputs = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let path = if candidate.is_absolute() {
            candidate
        } else {
            project_dir.join(candidate)
        };
        if !path.is_file() {
            bail!("cannot find bundle output {}", path.display());
        }
        outputs.push(path);
    }
    debug!(?outputs, "resolved bundle outputs");
    Ok(outputs)
}

/// Runs the bundler (unless skipped) and returns the produced scripts.
pub fn build(
    config: &XnodeConfig,
    project_dir: &Path,
    explicit_outputs: &[PathBuf],
    skip_bundler: bool,
) -> Result<Vec<PathBuf>> {
    let manifest = ProjectManifest::load(project_dir)?;
    if skip_bundler {
        debug!("skipping bundler");
    } else {
        Bundler::from_config(config)?.run(project_dir)?;
    }
    resolve_outputs(project_dir, &manifest, explicit_outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BundlerEntry;
    use std::fs;

    fn project(dir: &Path, main: Option<&str>) -> ProjectManifest {
        let main = main
            .map(|m| format!(r#", "main": "{m}""#))
            .unwrap_or_default();
        let json = format!(r#"{{"name": "hello", "version": "1.0.0"{main}}}"#);
        fs::write(dir.join("package.json"), &json).unwrap();
        ProjectManifest::load(dir).unwrap()
    }

    #[test]
    fn default_output_is_dist_index() {
        let temp = tempfile::tempdir().unwrap();
        let manifest = project(temp.path(), None);
        fs::create_dir_all(temp.path().join("dist")).unwrap();
        fs::write(temp.path().join("dist/index.js"), "x").unwrap();
        let outputs = resolve_outputs(temp.path(), &manifest, &[]).unwrap();
        assert_eq!(outputs, vec![temp.path().join("dist/index.js")]);
    }

    #[test]
    fn main_field_wins_over_default() {
        let temp = tempfile::tempdir().unwrap();
        let manifest = project(temp.path(), Some("build/nodes.js"));
        fs::create_dir_all(temp.path().join("build")).unwrap();
        fs::write(temp.path().join("build/nodes.js"), "x").unwrap();
        let outputs = resolve_outputs(temp.path(), &manifest, &[]).unwrap();
        assert_eq!(outputs, vec![temp.path().join("build/nodes.js")]);
    }

    #[test]
    fn missing_output_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        let manifest = project(temp.path(), None);
        let err = resolve_outputs(temp.path(), &manifest, &[]).unwrap_err();
        assert!(err.to_string().contains("cannot find bundle output"));
    }

    #[test]
    fn configured_bundler_replaces_default_args() {
        let mut config = XnodeConfig::default();
        config.tools.bundler = BundlerEntry {
            path: Some(PathBuf::from("/usr/bin/env")),
            args: Some(vec!["webpack".into()]),
        };
        let bundler = Bundler::from_config(&config).unwrap();
        assert_eq!(bundler.command.display(), "/usr/bin/env webpack");
    }

    #[cfg(unix)]
    #[test]
    fn build_runs_configured_bundler() {
        let temp = tempfile::tempdir().unwrap();
        project(temp.path(), None);
        let mut config = XnodeConfig::default();
        config.tools.bundler = BundlerEntry {
            path: Some(PathBuf::from("sh")),
            args: Some(vec![
                "-c".into(),
                "mkdir -p dist && echo 'var a=1' > dist/index.js".into(),
            ]),
        };
        let outputs = build(&config, temp.path(), &[], false).unwrap();
        assert_eq!(outputs.len(), 1);
        assert!(fs::read_to_string(&outputs[0]).unwrap().contains("var a=1"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_bundler_aborts_build() {
        let temp = tempfile::tempdir().unwrap();
        project(temp.path(), None);
        let mut config = XnodeConfig::default();
        config.tools.bundler = BundlerEntry {
            path: Some(PathBuf::from("sh")),
            args: Some(vec!["-c".into(), "exit 1".into()]),
        };
        let err = build(&config, temp.path(), &[], false).unwrap_err();
        assert!(format!("{err:#}").contains("bundler failed"));
    }
}
