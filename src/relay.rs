//! Drains one child pipe into the console.

use crate::classify::{Classifier, LineKind};
use crate::console::{ConsoleSender, ConsoleWrite};
use crate::lines::LineReader;
use crate::model::StreamKind;
use futures::{Stream, StreamExt};
use std::io;
use tokio::io::{AsyncRead, BufReader};
use tracing::debug;

/// Failure while draining one of the child's streams.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("failed reading child {stream}: {source}")]
    Read {
        stream: StreamKind,
        #[source]
        source: io::Error,
    },

    #[error("console closed before child {stream} was drained")]
    ConsoleClosed { stream: StreamKind },

    #[error("child {stream} was not captured")]
    NotCaptured { stream: StreamKind },

    #[error("relay for child {stream} stopped unexpectedly: {reason}")]
    Aborted { stream: StreamKind, reason: String },
}

impl StreamError {
    pub fn stream(&self) -> StreamKind {
        match self {
            StreamError::Read { stream, .. }
            | StreamError::ConsoleClosed { stream }
            | StreamError::NotCaptured { stream }
            | StreamError::Aborted { stream, .. } => *stream,
        }
    }
}

/// Turn a classified line into the write that represents it on the terminal.
pub fn render(
    stream: StreamKind,
    line: String,
    kind: LineKind,
    classifier: &Classifier,
) -> ConsoleWrite {
    match kind {
        LineKind::ProgressUpdate => ConsoleWrite::overwrite(stream, line),
        LineKind::ClearSignal => ConsoleWrite::overwrite(stream, classifier.blank()),
        LineKind::Normal => ConsoleWrite::commit(stream, line),
    }
}

/// Forward every line of `lines` to the console, in order, until the stream ends.
///
/// Returns how many lines were relayed. A read error stops this relay only; lines read
/// before it have already been sent.
pub async fn relay<S>(
    lines: S,
    stream: StreamKind,
    classifier: &Classifier,
    console: &ConsoleSender,
) -> Result<u64, StreamError>
where
    S: Stream<Item = io::Result<String>>,
{
    futures::pin_mut!(lines);
    let mut relayed = 0u64;

    while let Some(next) = lines.next().await {
        let line = next.map_err(|source| StreamError::Read { stream, source })?;
        let kind = classifier.classify(&line);
        console
            .send(render(stream, line, kind, classifier))
            .map_err(|_| StreamError::ConsoleClosed { stream })?;
        relayed += 1;
    }

    debug!(%stream, lines = relayed, "stream reached end of file");
    Ok(relayed)
}

/// [`relay`] over a raw pipe.
pub async fn relay_reader<R>(
    reader: R,
    stream: StreamKind,
    classifier: &Classifier,
    console: &ConsoleSender,
) -> Result<u64, StreamError>
where
    R: AsyncRead + Unpin,
{
    let lines = LineReader::new(BufReader::new(reader)).into_stream();
    relay(lines, stream, classifier, console).await
}
