//! Terminal relay for the pcraw crawler.
//!
//! Runs the crawler as a child process, drains its stdout and stderr concurrently and
//! writes each line to the terminal, letting progress lines redraw the current row instead
//! of scrolling.

pub mod classify;
pub mod config;
pub mod console;
pub mod lines;
pub mod model;
pub mod relay;
pub mod summary;
pub mod supervisor;

pub use classify::{classify, Classifier, LineKind, DEFAULT_PROGRESS_BAR_WIDTH};
pub use config::{ConfigError, RunConfig, SummaryFormat};
pub use console::{spawn_console_writer, ConsoleSender, ConsoleWrite, Terminator};
pub use model::{CommandLine, RunState, StreamKind};
pub use relay::{relay, relay_reader, StreamError};
pub use supervisor::{RunReport, SpawnError, Supervisor};
