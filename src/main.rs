mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Client commands draw progress bars, so keep their logs quiet unless asked.
    let default_filter = match cli.command {
        Command::Serve(_) => "info,tower_http=debug",
        _ => "warn",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => cli::serve(args).await,
        Command::Upload(args) => cli::upload(args).await,
        Command::List(args) => cli::list(args).await,
        Command::Delete(args) => cli::delete(args).await,
    }
}
