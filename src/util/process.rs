use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result, bail};
use tracing::debug;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamMode {
    Inherit,
    Capture,
    Discard,
}

#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub current_dir: Option<PathBuf>,
    pub output: StreamMode,
}

impl CommandSpec {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            output: StreamMode::Inherit,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    pub fn output(mut self, mode: StreamMode) -> Self {
        self.output = mode;
        self
    }

    pub fn display(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(self.args.iter().map(|arg| arg.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}

#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Option<Vec<u8>>,
    pub stderr: Option<Vec<u8>>,
}

pub fn run(spec: &CommandSpec) -> Result<CommandOutput> {
    let mut command = Command::new(&spec.program);
    command.args(&spec.args);
    if let Some(dir) = &spec.current_dir {
        command.current_dir(dir);
    }
    debug!(command = %spec.display(), dir = ?spec.current_dir, "spawning");

    match spec.output {
        StreamMode::Inherit | StreamMode::Discard => {
            let stdio = || {
                if spec.output == StreamMode::Inherit {
                    Stdio::inherit()
                } else {
                    Stdio::null()
                }
            };
            command.stdout(stdio());
            command.stderr(stdio());
            let status = command
                .status()
                .with_context(|| format!("failed to spawn `{}`", spec.program.to_string_lossy()))?;
            Ok(CommandOutput {
                status,
                stdout: None,
                stderr: None,
            })
        }
        StreamMode::Capture => {
            command.stdout(Stdio::piped());
            command.stderr(Stdio::piped());
            let output = command
                .output()
                .with_context(|| format!("failed to spawn `{}`", spec.program.to_string_lossy()))?;
            Ok(CommandOutput {
                status: output.status,
                stdout: Some(output.stdout),
                stderr: Some(output.stderr),
            })
        }
    }
}

/// Runs the command and fails unless it exits successfully.
pub fn run_checked(spec: &CommandSpec) -> Result<CommandOutput> {
    let output = run(spec)?;
    if !output.status.success() {
        let detail = output
            .stderr
            .as_deref()
            .map(|stderr| String::from_utf8_lossy(stderr).trim().to_string())
            .filter(|stderr| !stderr.is_empty())
            .map(|stderr| format!(": {stderr}"))
            .unwrap_or_default();
        bail!("`{}` exited with {}{detail}", spec.display(), output.status);
    }
    Ok(output)
}
