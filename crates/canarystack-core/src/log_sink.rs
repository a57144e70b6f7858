//! Styled text log rendered as an HTML document.
//!
//! The sink contract is small: open, close, and colored preformatted blocks
//! filled with colored spans. Writes while closed are silently dropped.
//! Closing writes the document trailer and leaves the sink unusable until it
//! is opened again, which truncates the destination.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use parking_lot::Mutex;
use thiserror::Error;

/// Default file written by the process-wide log.
pub const DEFAULT_LOG_PATH: &str = "log.html";

const DOCUMENT_HEADER: &str = "<!DOCTYPE html>\n<html>\n<body>\n";
const DOCUMENT_TRAILER: &str = "\n</body>\n</html>";

/// Text colors the sink understands.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogColor {
    #[default]
    Black,
    Blue,
    Gray,
    Green,
    Pink,
    Red,
    Yellow,
}

impl LogColor {
    /// Parse a color name (case-insensitive). Unknown names become black.
    #[must_use]
    pub fn from_name_loose(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "blue" => Self::Blue,
            "gray" | "grey" => Self::Gray,
            "green" => Self::Green,
            "pink" => Self::Pink,
            "red" => Self::Red,
            "yellow" => Self::Yellow,
            _ => Self::Black,
        }
    }

    /// CSS color keyword.
    #[must_use]
    pub const fn as_css(self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::Blue => "blue",
            Self::Gray => "gray",
            Self::Green => "green",
            Self::Pink => "pink",
            Self::Red => "red",
            Self::Yellow => "yellow",
        }
    }
}

/// Destination for diagnostic reports.
pub trait LogSink {
    /// Open the destination. Returns `false` if already open or on failure.
    fn open(&mut self) -> bool;
    /// Finalize and close. Returns `false` if not open or on failure.
    fn close(&mut self) -> bool;
    /// Returns true between a successful `open` and `close`.
    fn is_open(&self) -> bool;
    /// Start a preformatted block in `color`.
    fn begin_block(&mut self, color: LogColor);
    /// Write `text` in `color` into the current block.
    fn write_styled(&mut self, text: &str, color: LogColor);
    /// End the current block.
    fn end_block(&mut self);
}

/// Log I/O failures.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("log is already open")]
    AlreadyOpen,
    #[error("log is not open")]
    NotOpen,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

enum Destination {
    File {
        path: PathBuf,
        writer: Option<BufWriter<File>>,
    },
    Memory(Vec<u8>),
}

/// HTML log with inline-styled `<pre>` blocks.
pub struct HtmlLog {
    destination: Destination,
    open: bool,
    last_error: Option<LogError>,
}

impl HtmlLog {
    /// Log that writes to `path`, created (or truncated) on open.
    #[must_use]
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            destination: Destination::File {
                path: path.into(),
                writer: None,
            },
            open: false,
            last_error: None,
        }
    }

    /// Log that writes to an in-memory buffer.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            destination: Destination::Memory(Vec::new()),
            open: false,
            last_error: None,
        }
    }

    /// File path, `None` for in-memory logs.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.destination {
            Destination::File { path, .. } => Some(path),
            Destination::Memory(_) => None,
        }
    }

    /// Rendered document so far, `None` for file logs.
    #[must_use]
    pub fn contents(&self) -> Option<&str> {
        match &self.destination {
            Destination::Memory(bytes) => std::str::from_utf8(bytes).ok(),
            Destination::File { .. } => None,
        }
    }

    /// Take the most recent write error, if any.
    pub fn take_error(&mut self) -> Option<LogError> {
        self.last_error.take()
    }

    /// Open, reporting why it failed.
    pub fn try_open(&mut self) -> Result<(), LogError> {
        if self.open {
            return Err(LogError::AlreadyOpen);
        }
        match &mut self.destination {
            Destination::File { path, writer } => {
                *writer = Some(BufWriter::new(File::create(&*path)?));
            }
            Destination::Memory(bytes) => bytes.clear(),
        }
        self.open = true;
        self.write_raw(DOCUMENT_HEADER)
    }

    /// Close, reporting why it failed.
    pub fn try_close(&mut self) -> Result<(), LogError> {
        if !self.open {
            return Err(LogError::NotOpen);
        }
        let trailer = self.write_raw(DOCUMENT_TRAILER);
        self.open = false;
        let flushed = match &mut self.destination {
            Destination::File { writer, .. } => match writer.take() {
                Some(mut writer) => writer.flush().map_err(LogError::from),
                None => Ok(()),
            },
            Destination::Memory(_) => Ok(()),
        };
        trailer.and(flushed)
    }

    fn write_raw(&mut self, text: &str) -> Result<(), LogError> {
        if !self.open {
            return Err(LogError::NotOpen);
        }
        match &mut self.destination {
            Destination::File { writer, .. } => match writer {
                Some(writer) => writer.write_all(text.as_bytes())?,
                None => return Err(LogError::NotOpen),
            },
            Destination::Memory(bytes) => bytes.extend_from_slice(text.as_bytes()),
        }
        Ok(())
    }

    fn write_or_record(&mut self, text: &str) {
        if !self.open {
            return;
        }
        if let Err(err) = self.write_raw(text) {
            self.last_error = Some(err);
        }
    }
}

impl LogSink for HtmlLog {
    fn open(&mut self) -> bool {
        self.try_open().is_ok()
    }

    fn close(&mut self) -> bool {
        self.try_close().is_ok()
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn begin_block(&mut self, color: LogColor) {
        let tag = format!("\n<pre style=\"color:{};\">\n", color.as_css());
        self.write_or_record(&tag);
    }

    fn write_styled(&mut self, text: &str, color: LogColor) {
        let span = format!(
            "<span style=\"color:{};\">{}</span>",
            color.as_css(),
            escape_html(text)
        );
        self.write_or_record(&span);
    }

    fn end_block(&mut self) {
        self.write_or_record("\n</pre>\n");
    }
}

impl std::fmt::Debug for HtmlLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlLog")
            .field("path", &self.path())
            .field("open", &self.open)
            .finish()
    }
}

/// Escape the characters HTML treats specially.
#[must_use]
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['<', '>', '&', '"']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

static GLOBAL_LOG: OnceLock<Mutex<HtmlLog>> = OnceLock::new();

/// Process-wide log writing to [`DEFAULT_LOG_PATH`]. Created on first use,
/// opened only when a caller opens it.
#[must_use]
pub fn global_html_log() -> &'static Mutex<HtmlLog> {
    GLOBAL_LOG.get_or_init(|| Mutex::new(HtmlLog::to_file(DEFAULT_LOG_PATH)))
}
