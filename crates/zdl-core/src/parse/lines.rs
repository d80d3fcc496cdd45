//! Line splitting over a byte stream with `\r` and `\n` as equal terminators.

/// Incremental splitter. Feed chunks as they arrive; complete lines come out
/// trimmed, empty lines are dropped. Invalid UTF-8 is replaced, never fatal.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        for &b in chunk {
            if b == b'\r' || b == b'\n' {
                self.take_line(&mut out);
            } else {
                self.buf.push(b);
            }
        }
        out
    }

    /// Flush the trailing partial line at EOF.
    pub fn finish(mut self) -> Option<String> {
        let mut out = Vec::with_capacity(1);
        self.take_line(&mut out);
        out.pop()
    }

    fn take_line(&mut self, out: &mut Vec<String>) {
        if self.buf.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.buf).trim().to_string();
        self.buf.clear();
        if !line.is_empty() {
            out.push(line);
        }
    }
}

/// Split a complete buffer in one go.
pub fn split_all(bytes: &[u8]) -> Vec<String> {
    let mut splitter = LineSplitter::new();
    let mut lines = splitter.push(bytes);
    lines.extend(splitter.finish());
    lines
}
