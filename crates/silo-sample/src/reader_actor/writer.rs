//! The writer capability and its in-memory implementation.

use parking_lot::Mutex;
use std::sync::Arc;

pub trait LineWriter: Send {
    fn write_line(&mut self, line: &str) -> Result<(), String>;

    fn lines_written(&self) -> usize;
}

/// Where every [`MemoryWriter`] appends, shared with whoever reads the output.
pub type SharedLines = Arc<Mutex<Vec<String>>>;

/// Appends `"<owner>: <line>"` to a shared buffer.
#[derive(Debug)]
pub struct MemoryWriter {
    owner: String,
    sink: SharedLines,
    written: usize,
}

impl MemoryWriter {
    pub fn new(owner: impl Into<String>, sink: SharedLines) -> Self {
        Self {
            owner: owner.into(),
            sink,
            written: 0,
        }
    }
}

impl LineWriter for MemoryWriter {
    fn write_line(&mut self, line: &str) -> Result<(), String> {
        if line.contains('\n') {
            return Err(format!("line contains a newline: {line:?}"));
        }
        self.sink.lock().push(format!("{}: {line}", self.owner));
        self.written += 1;
        Ok(())
    }

    fn lines_written(&self) -> usize {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_writer() {
        let sink = SharedLines::default();
        let mut writer = MemoryWriter::new("reader#1", Arc::clone(&sink));
        writer.write_line("first").unwrap();
        assert!(writer.write_line("two\nlines").is_err());
        assert_eq!(writer.lines_written(), 1);
        assert_eq!(*sink.lock(), vec!["reader#1: first"]);
    }
}
