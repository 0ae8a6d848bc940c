//! bindshim CLI
//!
//! ```bash
//! bindshim install                      # install from the directory holding this binary
//! bindshim install --staging ./dist --user-dir ~/.idapro --no-load
//! bindshim resolve --inventory bindings.toml
//! bindshim candidates
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use bindshim_core::binding::builtin_candidates;
use bindshim_core::config::Config;
use bindshim_core::host::ConfiguredHost;
use bindshim_core::operations::{install_plugin, ArtifactOutcome, ReplaceStrategy};
use bindshim_core::registry::resolve;
use bindshim_core::source::Inventory;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bindshim")]
#[command(about = "GUI binding resolver and plugin installer", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Move the bundled plugin into the host plugin directory and load it
    Install {
        /// Directory holding the bundled artifacts (defaults to this binary's directory)
        #[arg(long, value_name = "DIR")]
        staging: Option<PathBuf>,

        /// Host user directory, overriding config and environment
        #[arg(long, value_name = "DIR")]
        user_dir: Option<PathBuf>,

        /// Replacement strategy: replace or swap
        #[arg(long)]
        strategy: Option<ReplaceStrategy>,

        /// Do not ask the host to load the plugin afterwards
        #[arg(long)]
        no_load: bool,

        /// Print the install report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve the GUI binding against an inventory of installed modules
    Resolve {
        /// JSON or TOML inventory file
        #[arg(long, value_name = "FILE")]
        inventory: PathBuf,

        /// Print the resolved table as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the built-in candidate bindings in priority order
    Candidates,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_env("BINDSHIM_LOG").unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "bindshim_core=info",
            1 => "bindshim_core=debug",
            _ => "trace",
        })
    });

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(Some(path.as_path())),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    match cli.command {
        Commands::Install { staging, user_dir, strategy, no_load, json } => {
            let staging = match staging {
                Some(dir) => dir,
                None => default_staging_dir()?,
            };

            let mut host = ConfiguredHost::from_config(&config)?;
            if let Some(dir) = user_dir {
                host = host.with_user_dir(dir);
            }

            let mut options = config.install_options()?;
            if let Some(strategy) = strategy {
                options.strategy = strategy;
            }
            options.load = !no_load;

            let report = install_plugin(&host, &staging, &config.artifacts(), &options)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for artifact in &report.artifacts {
                    let status = match artifact.outcome {
                        ArtifactOutcome::Moved { replaced_existing: true } => "replaced",
                        ArtifactOutcome::Moved { replaced_existing: false } => "installed",
                        ArtifactOutcome::AlreadyInstalled => "unchanged",
                    };
                    println!("{:>10}  {}", status, artifact.destination.display());
                }
                println!("Plugin installed into {}", report.plugin_dir.display());
            }
        }

        Commands::Resolve { inventory, json } => {
            let inventory = Inventory::load(&inventory)?;
            let table = resolve(&builtin_candidates(), &inventory).into_result()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                println!("{} (epoch {})", table.binding(), table.epoch());
                for (name, handle) in table.symbols() {
                    let marker = if handle.adapted { " (adapter)" } else { "" };
                    println!("  {:<28} {}{}", name, handle.path, marker);
                }
                for name in table.optional_names() {
                    match table.optional(name) {
                        Some(handle) => println!("  {:<28} {} (optional)", name, handle.path),
                        None => println!("  {:<28} - (optional, absent)", name),
                    }
                }
            }
        }

        Commands::Candidates => {
            for (priority, candidate) in builtin_candidates().iter().enumerate() {
                let surface = match candidate.validate() {
                    Ok(()) => "ok".to_string(),
                    Err(e) => e.to_string(),
                };
                println!(
                    "{}. {} (epoch {}, {} required, {} optional, surface {})",
                    priority + 1,
                    candidate.name,
                    candidate.epoch,
                    candidate.required.len(),
                    candidate.optional.len(),
                    surface
                );
            }
        }
    }

    Ok(())
}

/// The installer runs from the directory the artifacts are bundled in.
fn default_staging_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate the running executable")?;
    exe.parent()
        .map(|p| p.to_path_buf())
        .context("Executable has no parent directory")
}
