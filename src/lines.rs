//! Line decoding for child output pipes.
//!
//! A line ends at `\n`, `\r\n` or a bare `\r`. The crawler redraws its progress bar with
//! bare carriage returns, so treating `\r` as a terminator is what lets each redraw reach
//! the classifier as its own line.

use futures::stream::{self, Stream};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub struct LineReader<R> {
    inner: R,
    // Last terminator was `\r`; a `\n` right after it belongs to the same break.
    skip_lf: bool,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            skip_lf: false,
        }
    }

    /// Next line with its terminator stripped, or `None` at end of file.
    ///
    /// A trailing line without a terminator is still returned. Invalid UTF-8 is replaced
    /// rather than reported.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut line = Vec::new();
        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                self.skip_lf = false;
                return Ok((!line.is_empty()).then(|| decode(line)));
            }

            let start = usize::from(self.skip_lf && available[0] == b'\n');
            self.skip_lf = false;
            let rest = &available[start..];

            match rest.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(idx) => {
                    line.extend_from_slice(&rest[..idx]);
                    self.skip_lf = rest[idx] == b'\r';
                    self.inner.consume(start + idx + 1);
                    return Ok(Some(decode(line)));
                }
                None => {
                    line.extend_from_slice(rest);
                    let used = available.len();
                    self.inner.consume(used);
                }
            }
        }
    }

    /// Single-pass stream of lines. It ends after end of file or after the first error.
    pub fn into_stream(self) -> impl Stream<Item = io::Result<String>> {
        stream::unfold(Some(self), |state| async move {
            let Some(mut reader) = state else {
                return None;
            };
            match reader.next_line().await {
                Ok(Some(line)) => Some((Ok(line), Some(reader))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

fn decode(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}
