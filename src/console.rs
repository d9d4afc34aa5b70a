//! Shared terminal sink.
//!
//! Both relays send whole lines over one channel; a single blocking task owns the real
//! stdout/stderr handles, so a line and its terminator always go out together.

use crate::model::StreamKind;
use std::io::{self, Write};
use tokio::sync::mpsc;

/// How a write ends, and therefore what happens to the terminal row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// `\r`: the next write overwrites this row.
    Overwrite,
    /// `\n`: the row is committed and the terminal scrolls.
    Commit,
}

impl Terminator {
    pub fn as_str(self) -> &'static str {
        match self {
            Terminator::Overwrite => "\r",
            Terminator::Commit => "\n",
        }
    }
}

/// One atomic terminal write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleWrite {
    pub stream: StreamKind,
    pub text: String,
    pub terminator: Terminator,
}

impl ConsoleWrite {
    pub fn overwrite(stream: StreamKind, text: impl Into<String>) -> Self {
        Self {
            stream,
            text: text.into(),
            terminator: Terminator::Overwrite,
        }
    }

    pub fn commit(stream: StreamKind, text: impl Into<String>) -> Self {
        Self {
            stream,
            text: text.into(),
            terminator: Terminator::Commit,
        }
    }

    /// Text plus terminator, exactly as it reaches the terminal.
    pub fn rendered(&self) -> String {
        let mut out = String::with_capacity(self.text.len() + 1);
        out.push_str(&self.text);
        out.push_str(self.terminator.as_str());
        out
    }
}

pub type ConsoleSender = mpsc::UnboundedSender<ConsoleWrite>;
pub type ConsoleReceiver = mpsc::UnboundedReceiver<ConsoleWrite>;

/// Spawn the blocking writer that owns the process's stdout and stderr.
///
/// The task ends once every sender is dropped.
pub fn spawn_console_writer() -> (ConsoleSender, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ConsoleWrite>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = io::stdout();
        let stderr = io::stderr();
        let mut out = TerminalStream::new(StreamKind::Stdout);
        let mut err = TerminalStream::new(StreamKind::Stderr);

        while let Some(write) = rx.blocking_recv() {
            // Lock per line: tracing also writes to stderr and must not be starved.
            match write.stream {
                StreamKind::Stdout => out.deliver(&mut stdout.lock(), &write),
                StreamKind::Stderr => err.deliver(&mut stderr.lock(), &write),
            };
        }
    });
    (tx, handle)
}

/// One side of the terminal. Goes quiet once its reader is gone (e.g. `| head`), so a
/// long crawl does not log a failure per line.
#[derive(Debug)]
pub struct TerminalStream {
    stream: StreamKind,
    closed: bool,
}

impl TerminalStream {
    pub fn new(stream: StreamKind) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Write one line; returns whether it reached `out`.
    pub fn deliver<W: Write>(&mut self, out: &mut W, write: &ConsoleWrite) -> bool {
        if self.closed {
            return false;
        }
        match write_line(out, write) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                self.closed = true;
                tracing::warn!(stream = %self.stream, "terminal closed, discarding further output");
                false
            }
            Err(e) => {
                tracing::warn!(stream = %self.stream, error = %e, "terminal write failed");
                false
            }
        }
    }
}

/// Emit one line in a single write and flush it, so `\r` rows show up immediately.
pub fn write_line<W: Write>(out: &mut W, write: &ConsoleWrite) -> io::Result<()> {
    out.write_all(write.rendered().as_bytes())?;
    out.flush()
}
