use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "xnode")]
#[command(version)]
#[command(about = "Build, pack and publish Design Express node packages")]
pub struct Cli {
    /// Enable debug logging (overrides XNODE_LOG)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scaffold a new node project
    New(NewArgs),
    /// Run the bundler and list the produced script
    Build(BuildArgs),
    /// Build and write the .xnode archive
    Pack(PackArgs),
    /// Build, pack and upload to the registry
    Publish(PublishArgs),
    /// Generate API docs (jsdoc2md) into docs/index.md
    Docs(DocsArgs),
    /// Print the header and manifest of an .xnode file
    Inspect(InspectArgs),
    /// Check the integrity of an .xnode file
    Verify(VerifyArgs),
    /// Extract the script and manifest of an .xnode file
    Unpack(UnpackArgs),
    /// Store an access token in the OS keychain
    Login(LoginArgs),
    /// Remove a stored access token
    Logout(LoginArgs),
    /// Manage xnode configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Directory to create; its name becomes the package name
    pub dir: PathBuf,
    /// Template directory to copy instead of the built-in template
    #[arg(long = "template")]
    pub template: Option<PathBuf>,
    /// Do not initialise a git repository
    #[arg(long = "no-git")]
    pub no_git: bool,
    /// Do not run `npm install`
    #[arg(long = "no-install")]
    pub no_install: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Project directory containing package.json
    #[arg(long = "project", default_value = ".")]
    pub project: PathBuf,
    /// Bundle output to use instead of package.json `main` (repeatable)
    #[arg(long = "output")]
    pub outputs: Vec<PathBuf>,
    /// Use existing outputs without running the bundler
    #[arg(long = "skip-build")]
    pub skip_build: bool,
}

#[derive(Args, Debug)]
pub struct PackArgs {
    #[command(flatten)]
    pub build: BuildArgs,
    /// Directory receiving the archive (default: project directory)
    #[arg(long = "out-dir")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    #[command(flatten)]
    pub pack: PackArgs,
    /// Registry profile from the config file
    #[arg(long = "registry")]
    pub registry: Option<String>,
    /// Pack and print the upload without sending it
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct DocsArgs {
    /// Project directory containing package.json
    #[arg(long = "project", default_value = ".")]
    pub project: PathBuf,
    /// Markdown file to write (default: <project>/docs/index.md)
    #[arg(long = "out")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Path to the .xnode file
    pub file: PathBuf,
    /// Emit JSON instead of the human summary
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Path to the .xnode file
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct UnpackArgs {
    /// Path to the .xnode file
    pub file: PathBuf,
    /// Output directory (default: file name without extension)
    #[arg(long = "out")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Publisher email the token belongs to
    pub user: String,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Set a key in xnode config (e.g. registry.default.url)
    Set(ConfigSetArgs),
}

#[derive(Args, Debug)]
pub struct ConfigSetArgs {
    /// Config key path (e.g. tools.bundler.path)
    pub key: String,
    /// Value to assign; `[...]` is stored as a TOML array, anything else as a string
    pub value: String,
    /// Override config file path (default: $XDG_CONFIG_HOME/xnode/config.toml)
    #[arg(long = "file")]
    pub file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn publish_flattens_pack_and_build_flags() {
        let cli = Cli::try_parse_from([
            "xnode",
            "publish",
            "--project",
            "demo",
            "--skip-build",
            "--out-dir",
            "out",
            "--registry",
            "staging",
            "--dry-run",
        ])
        .unwrap();
        let Command::Publish(args) = cli.command else {
            panic!("expected publish");
        };
        assert_eq!(args.pack.build.project, PathBuf::from("demo"));
        assert!(args.pack.build.skip_build);
        assert_eq!(args.pack.out_dir, Some(PathBuf::from("out")));
        assert_eq!(args.registry.as_deref(), Some("staging"));
        assert!(args.dry_run);
    }
}
