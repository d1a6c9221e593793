//! Patch text as an ordered, terminator-preserving sequence of lines.

use std::fs;
use std::path::Path;

use crate::error::{Result, SynthError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    lines: Vec<String>,
}

impl Patch {
    pub fn from_text(text: &str) -> Self {
        Self::from_lines(text.split_inclusive('\n').map(str::to_string).collect())
    }

    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Reads a patch from disk. Malformed byte sequences are dropped rather
    /// than failing the read.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            SynthError::io(format!("failed to read '{}'", path.to_string_lossy()), e)
        })?;
        Ok(Self::from_text(&decode_lossy(&bytes)))
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Concatenates `lines[start..end]` into one scan buffer.
    pub fn join_range(&self, start: usize, end: usize) -> String {
        self.lines[start..end].concat()
    }

    pub fn into_text(self) -> String {
        self.lines.concat()
    }
}

pub fn decode_lossy(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_keep_their_terminators() {
        let patch = Patch::from_text("a\r\nb\nc");
        assert_eq!(patch.lines(), &["a\r\n", "b\n", "c"]);
        assert_eq!(patch.clone().into_text(), "a\r\nb\nc");
    }

    #[test]
    fn invalid_bytes_are_dropped() {
        let bytes = b"+ if (x \xff\xfe> 0) {\n";
        assert_eq!(decode_lossy(bytes), "+ if (x > 0) {\n");
    }

    #[test]
    fn join_range_concatenates() {
        let patch = Patch::from_text("a\nb\nc\n");
        assert_eq!(patch.join_range(1, 3), "b\nc\n");
        assert_eq!(patch.join_range(3, 3), "");
    }

    #[test]
    fn read_reports_missing_file() {
        let err = Patch::read(Path::new("/definitely/not/here.patch")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
