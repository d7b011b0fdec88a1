//! User-facing report output.
//!
//! Diagnostics go through `tracing` to stderr; the report a person reads in
//! the CI log (progress lines, PASS/FAIL, links) goes through [`Console`].

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// ANSI colors used in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Blue,
}

impl Color {
    fn code(&self) -> u8 {
        match self {
            Color::Red => 31,
            Color::Green => 32,
            Color::Blue => 34,
        }
    }
}

/// In-memory sink for capturing console output in tests
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "capture buffer poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Line-oriented report writer
pub struct Console {
    out: Mutex<Box<dyn Write + Send>>,
    color: bool,
}

impl Console {
    pub fn new(out: Box<dyn Write + Send>, color: bool) -> Self {
        Console {
            out: Mutex::new(out),
            color,
        }
    }

    pub fn stdout(color: bool) -> Self {
        Self::new(Box::new(io::stdout()), color)
    }

    /// Console writing into a buffer the caller can read back
    pub fn capture(color: bool) -> (Self, CaptureBuffer) {
        let buffer = CaptureBuffer::default();
        (Self::new(Box::new(buffer.clone()), color), buffer)
    }

    /// Wrap `text` in an ANSI color, unless colors are disabled
    pub fn paint(&self, color: Color, text: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", color.code(), text)
        } else {
            text.to_string()
        }
    }

    pub fn line(&self, text: &str) {
        if let Ok(mut out) = self.out.lock() {
            if let Err(err) = writeln!(out, "{}", text) {
                tracing::debug!(error = %err, "Console write failed");
            }
        }
    }

    pub fn colored_line(&self, color: Color, text: &str) {
        self.line(&self.paint(color, text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paint_uses_ansi_codes() {
        let (console, _) = Console::capture(true);
        assert_eq!(console.paint(Color::Red, "FAIL"), "\x1b[31mFAIL\x1b[0m");
        assert_eq!(console.paint(Color::Green, "PASS"), "\x1b[32mPASS\x1b[0m");
        assert_eq!(console.paint(Color::Blue, "x"), "\x1b[34mx\x1b[0m");
    }

    #[test]
    fn test_paint_without_color_is_plain() {
        let (console, _) = Console::capture(false);
        assert_eq!(console.paint(Color::Red, "FAIL"), "FAIL");
    }

    #[test]
    fn test_capture_collects_lines() {
        let (console, buffer) = Console::capture(false);
        console.line("one");
        console.colored_line(Color::Green, "two");
        assert_eq!(buffer.lines(), vec!["one", "two"]);
    }
}
