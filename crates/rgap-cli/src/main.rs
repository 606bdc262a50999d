//! RGAP CLI - listener and announcer for the group address presence protocol.
//!
//! `listen` tracks group membership from signed UDP announcements and
//! publishes it to outputs; `announce` is the member side.

mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use error::{exit_codes, CliError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(exit_codes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Log to stderr so stdout stays clean for JSON output. RUST_LOG wins over
/// `--verbose`.
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "debug,rgap_core=debug"
    } else {
        "info,rgap_core=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Listen(args) => commands::run_listen(args).await,
        Commands::Announce(args) => commands::run_announce(args).await,
        Commands::Genpsk(args) => commands::run_genpsk(args),
    }
}
