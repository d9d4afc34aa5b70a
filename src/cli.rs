use anyhow::{Context, Result};
use clap::Parser;
use pcraw_relay::config::RunConfig;
use pcraw_relay::summary::build_run_summary;
use pcraw_relay::{spawn_console_writer, Classifier, SummaryFormat, Supervisor};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Every argument is handed to the crawler script, so help and version flags are off and
/// hyphenated values are accepted anywhere.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "pcraw-relay",
    about = "Run pcraw.pl and relay its output with in-place progress rows",
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct Cli {
    /// Arguments forwarded verbatim to the crawler script
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    pub args: Vec<String>,
}

/// Run the crawler once and return the exit code the wrapper should finish with.
pub async fn run(args: Cli) -> Result<i32> {
    let cfg = RunConfig::from_env()?;
    let command = cfg.command_line(args.args);
    let supervisor = Supervisor::new(command.clone(), Classifier::new(cfg.clear_width));

    let (console, writer) = spawn_console_writer();
    let started = OffsetDateTime::now_utc();

    let outcome = supervisor.run_until(console, interrupted()).await;
    // All senders are gone once the supervisor returns; wait for the last lines to land.
    wait_for_writer(writer).await;
    let report = outcome?;

    if cfg.summary == SummaryFormat::Json {
        let summary = build_run_summary(&command, started, OffsetDateTime::now_utc(), &report);
        let out = serde_json::to_string_pretty(&summary).context("failed to encode run summary")?;
        eprintln!("{out}");
    }

    Ok(report.exit_code())
}

/// Wait for the console writer; returns false if it died before draining its queue.
async fn wait_for_writer(writer: JoinHandle<()>) -> bool {
    match writer.await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "console writer stopped early, some output may be missing");
            false
        }
    }
}

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves.
async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("interrupt received"),
        Err(e) => {
            warn!(error = %e, "could not listen for Ctrl-C");
            std::future::pending::<()>().await
        }
    }
}
