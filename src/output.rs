//! Log buffering and text sanitizing for the server output view.

use std::collections::VecDeque;

use strip_ansi_escapes::strip;

/// A fixed-capacity ring buffer for server log lines.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    max_lines: usize,
    lines: VecDeque<String>,
}

impl LogBuffer {
    /// Creates a new `LogBuffer` with the specified maximum capacity.
    pub fn new(max_lines: usize) -> Self {
        Self {
            max_lines,
            lines: VecDeque::with_capacity(max_lines.min(1024)),
        }
    }

    /// Adds a line to the buffer.
    ///
    /// Returns `true` if an old line was dropped to make room.
    pub fn push(&mut self, line: String) -> bool {
        let mut dropped = false;
        self.lines.push_back(line);
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
            dropped = true;
        }
        dropped
    }

    /// Drops every buffered line. Used when the supervisor signals a restart.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Returns the number of lines currently in the buffer.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns an iterator over the buffered lines, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.lines.iter()
    }
}

/// Sanitizes text for display, optionally stripping ANSI escape codes.
///
/// Invalid UTF-8 sequences are replaced.
pub fn sanitize_text(text: &str, strip_ansi: bool) -> String {
    if !strip_ansi {
        return text.to_string();
    }
    let stripped = strip(text.as_bytes());
    String::from_utf8_lossy(&stripped).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_buffer_drops_oldest() {
        let mut buffer = LogBuffer::new(2);
        buffer.push("a".into());
        buffer.push("b".into());
        let dropped = buffer.push("c".into());
        assert!(dropped);
        let lines = buffer.iter().cloned().collect::<Vec<_>>();
        assert_eq!(lines, vec!["b", "c"]);
    }

    #[test]
    fn clear_empties_buffer() {
        let mut buffer = LogBuffer::new(4);
        buffer.push("x".into());
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn sanitize_strips_ansi() {
        let text = "\u{1b}[31mred\u{1b}[0m";
        assert_eq!(sanitize_text(text, true), "red");
        assert_eq!(sanitize_text(text, false), text);
    }
}
