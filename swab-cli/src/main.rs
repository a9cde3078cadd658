// swab-cli: command-line entry point for binding generation.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, warn};

#[derive(Parser)]
#[command(name = "swab", about = "swab: C shims and Rust bindings for wasm modules")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the C shim source, Rust bindings and symbol lists.
    Generate {
        /// Path to the bindings config (.json or .toml).
        #[arg(long, default_value = "swab.toml")]
        config: PathBuf,
        /// Exit with an error if generation produced any diagnostic.
        #[arg(long)]
        deny_diagnostics: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            config,
            deny_diagnostics,
        } => match swab_codegen::run_generate(&config) {
            Ok(bindings) => {
                if deny_diagnostics && !bindings.diagnostics.is_empty() {
                    warn!(
                        "{} diagnostics with --deny-diagnostics",
                        bindings.diagnostics.len()
                    );
                    return ExitCode::FAILURE;
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{}: {e}", config.display());
                ExitCode::FAILURE
            }
        },
    }
}
