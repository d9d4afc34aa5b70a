//! Line classification for the crawler's terminal protocol.
//!
//! The crawler marks lines that should redraw the current row with a handful of fixed
//! prefixes, and wipes that row by printing a run of spaces as wide as its progress bar.

/// Width of the crawler's progress bar, and so of its row-clearing blank line.
pub const DEFAULT_PROGRESS_BAR_WIDTH: usize = 79;

/// Prefixes that mark a line as an in-place progress update.
pub const PROGRESS_PREFIXES: [&str; 3] = ["|", "parsing links, please wait", "wait for "];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    /// Redraw the current row; the next write lands on top of it.
    ProgressUpdate,
    /// Blank out the progress row.
    ClearSignal,
    /// Ordinary output, committed with a newline.
    Normal,
}

/// Classify one line (terminator already stripped).
///
/// Prefix rules win over the blank-line rule.
pub fn classify(line: &str, progress_bar_width: usize) -> LineKind {
    if PROGRESS_PREFIXES.iter().any(|p| line.starts_with(p)) {
        LineKind::ProgressUpdate
    } else if is_blank_of_width(line, progress_bar_width) {
        LineKind::ClearSignal
    } else {
        LineKind::Normal
    }
}

fn is_blank_of_width(line: &str, width: usize) -> bool {
    line.len() == width && line.bytes().all(|b| b == b' ')
}

/// Classifier bound to a fixed progress bar width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    width: usize,
    blank: String,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_BAR_WIDTH)
    }
}

impl Classifier {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            blank: " ".repeat(width),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// The row-clearing string: `width` spaces.
    pub fn blank(&self) -> &str {
        &self.blank
    }

    pub fn classify(&self, line: &str) -> LineKind {
        classify(line, self.width)
    }
}
