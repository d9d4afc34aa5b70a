mod cli;

use clap::Parser;
use pcraw_relay::config::{ConfigError, LOG_VAR};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = cli::Cli::parse();

    match cli::run(args).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // Spawn failures land here as a single line naming the command.
            eprintln!("{e:#}");
            let code = if e.is::<ConfigError>() { 2 } else { 1 };
            std::process::exit(code);
        }
    }
}
