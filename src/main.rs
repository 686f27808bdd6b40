use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use xnode_dev::cli::{BuildArgs, Cli, Command, PackArgs};
use xnode_dev::config::{self, XnodeConfig};
use xnode_dev::credentials::{self, KeyringStore, SecretStore, TerminalPrompt};
use xnode_dev::packer::{self, PackOutcome, PackRequest};
use xnode_dev::scaffold::{self, NewProjectOptions};
use xnode_dev::{builder, cmd, docs, inspect, publish, registry};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!(?cli, "parsed arguments");

    match cli.command {
        Command::New(args) => {
            let config = config::load()?;
            scaffold::new_project(
                &config,
                &NewProjectOptions {
                    dir: args.dir,
                    template: args.template,
                    git: !args.no_git,
                    install: !args.no_install,
                },
            )?;
            Ok(())
        }
        Command::Build(args) => {
            let config = config::load()?;
            for output in run_build(&config, &args)? {
                println!("✓ Built {}", output.display());
            }
            Ok(())
        }
        Command::Pack(args) => {
            let config = config::load()?;
            run_pack(&config, &args).map(|_| ())
        }
        Command::Publish(args) => {
            let config = config::load()?;
            let profile = registry::resolve_profile(&config, args.registry.as_deref())?;
            let outcome = run_pack(&config, &args.pack)?;
            if args.dry_run {
                publish::describe(&outcome, &profile)
            } else {
                publish::publish(
                    &outcome,
                    &profile,
                    &KeyringStore::default(),
                    &TerminalPrompt,
                )
                .map(|_| ())
            }
        }
        Command::Docs(args) => {
            let config = config::load()?;
            docs::generate(&config, &args.project, args.out.as_deref()).map(|_| ())
        }
        Command::Inspect(args) => inspect::inspect(&args.file, args.json),
        Command::Verify(args) => inspect::verify(&args.file),
        Command::Unpack(args) => inspect::unpack(&args.file, args.out.as_deref()).map(|_| ()),
        Command::Login(args) => {
            credentials::login(&KeyringStore::default(), &TerminalPrompt, &args.user)?;
            println!("✓ Stored access token for {}", args.user);
            Ok(())
        }
        Command::Logout(args) => {
            if KeyringStore::default().delete(&args.user)? {
                println!("✓ Removed access token for {}", args.user);
            } else {
                println!("No access token stored for {}", args.user);
            }
            Ok(())
        }
        Command::Config(config_cmd) => cmd::config::run(config_cmd),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("XNODE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_build(config: &XnodeConfig, args: &BuildArgs) -> Result<Vec<std::path::PathBuf>> {
    builder::build(config, &args.project, &args.outputs, args.skip_build)
}

fn run_pack(config: &XnodeConfig, args: &PackArgs) -> Result<PackOutcome> {
    let outputs = run_build(config, &args.build)?;
    packer::pack(&PackRequest {
        project_dir: args.build.project.clone(),
        outputs,
        out_dir: args.out_dir.as_deref().map(Path::to_path_buf),
    })
}
