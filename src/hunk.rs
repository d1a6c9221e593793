//! File-boundary and hunk-header discovery, plus the `@@ -a,b +c,d @@` wire form.

use std::fmt;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::error::{Result, SynthError};
use crate::patch::Patch;

pub const FILE_BOUNDARY_PREFIX: &str = "diff --git";
pub const HUNK_HEADER_PREFIX: &str = "@@ ";

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@@ -(\d+),(\d+) \+(\d+),(\d+) @@").unwrap());

/// Line indices of every file boundary and hunk header in a patch, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HunkIndex {
    pub file_boundaries: Vec<usize>,
    pub hunk_headers: Vec<usize>,
    len: usize,
}

impl HunkIndex {
    pub fn locate(patch: &Patch) -> Self {
        let mut index = HunkIndex {
            len: patch.len(),
            ..Default::default()
        };
        for (i, line) in patch.lines().iter().enumerate() {
            if line.starts_with(FILE_BOUNDARY_PREFIX) {
                index.file_boundaries.push(i);
            } else if line.starts_with(HUNK_HEADER_PREFIX) {
                index.hunk_headers.push(i);
            }
        }
        index
    }

    /// Same as [`HunkIndex::locate`], but emits a diagnostic for each empty list.
    pub fn locate_reporting(patch: &Patch, path: &str) -> Self {
        let index = Self::locate(patch);
        if index.file_boundaries.is_empty() {
            warn!(path, "no '{FILE_BOUNDARY_PREFIX}' line found");
        }
        if index.hunk_headers.is_empty() {
            warn!(path, "no hunk header found");
        }
        index
    }

    pub fn first_header(&self) -> Option<usize> {
        self.hunk_headers.first().copied()
    }

    /// First hunk header strictly after `line`, or the end of the patch.
    pub fn segment_end(&self, line: usize) -> usize {
        self.hunk_headers
            .iter()
            .copied()
            .find(|&h| h > line)
            .unwrap_or(self.len)
    }

    /// Last hunk header strictly before `line`.
    pub fn enclosing_header(&self, line: usize) -> Option<usize> {
        self.hunk_headers.iter().copied().rev().find(|&h| h < line)
    }

    /// First file boundary strictly after `line`, or the end of the patch.
    pub fn section_end(&self, line: usize) -> usize {
        self.file_boundaries
            .iter()
            .copied()
            .find(|&b| b > line)
            .unwrap_or(self.len)
    }
}

/// Which half of a header a change applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSide {
    Old,
    New,
}

impl HeaderSide {
    /// `-` lines count against the old side; everything else against the new side.
    pub fn for_sign(sign: char) -> Self {
        if sign == '-' {
            HeaderSide::Old
        } else {
            HeaderSide::New
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: u64,
    pub old_count: u64,
    pub new_start: u64,
    pub new_count: u64,
}

impl HunkHeader {
    /// Parses the numeric token of a header line, returning it with the byte
    /// range it occupies so the line can be re-rendered in place.
    pub fn parse(line: &str, index: usize) -> Result<(Self, Range<usize>)> {
        let malformed = || SynthError::MalformedHeader {
            line: index,
            text: line.trim_end().to_string(),
        };
        let caps = HEADER_RE.captures(line).ok_or_else(malformed)?;
        let num = |i: usize| -> Result<u64> {
            caps.get(i)
                .and_then(|m| m.as_str().parse().ok())
                .ok_or_else(malformed)
        };
        let header = HunkHeader {
            old_start: num(1)?,
            old_count: num(2)?,
            new_start: num(3)?,
            new_count: num(4)?,
        };
        let span = caps.get(0).ok_or_else(malformed)?.range();
        Ok((header, span))
    }

    /// Shifts the chosen side. `move_start` also moves the start field.
    pub fn shift(
        &mut self,
        side: HeaderSide,
        delta: i64,
        move_start: bool,
        index: usize,
    ) -> Result<()> {
        let (start, count) = match side {
            HeaderSide::Old => (&mut self.old_start, &mut self.old_count),
            HeaderSide::New => (&mut self.new_start, &mut self.new_count),
        };
        let apply = |v: u64| -> Result<u64> {
            v.checked_add_signed(delta)
                .ok_or(SynthError::HeaderOverflow { line: index, delta })
        };
        *count = apply(*count)?;
        if move_start {
            *start = apply(*start)?;
        }
        Ok(())
    }

    /// Replaces only the numeric token of `line`, leaving surrounding text untouched.
    pub fn rewrite_line(
        line: &str,
        index: usize,
        f: impl FnOnce(&mut HunkHeader) -> Result<()>,
    ) -> Result<String> {
        let (mut header, span) = Self::parse(line, index)?;
        f(&mut header)?;
        let mut out = String::with_capacity(line.len() + 4);
        out.push_str(&line[..span.start]);
        out.push_str(&header.to_string());
        out.push_str(&line[span.end..]);
        Ok(out)
    }
}

impl fmt::Display for HunkHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILES: &str = "\
diff --git a/x.c b/x.c
--- a/x.c
+++ b/x.c
@@ -1,3 +1,3 @@ int main()
 a
-b
+c
@@ -10,2 +10,2 @@
 d
diff --git a/y.c b/y.c
@@ -5,1 +5,1 @@
-e
";

    #[test]
    fn locates_boundaries_and_headers() {
        let index = HunkIndex::locate(&Patch::from_text(TWO_FILES));
        assert_eq!(index.file_boundaries, vec![0, 9]);
        assert_eq!(index.hunk_headers, vec![3, 7, 10]);
        assert_eq!(index.first_header(), Some(3));
    }

    #[test]
    fn segment_and_section_bounds() {
        let index = HunkIndex::locate(&Patch::from_text(TWO_FILES));
        assert_eq!(index.segment_end(5), 7);
        assert_eq!(index.segment_end(8), 10);
        assert_eq!(index.segment_end(11), 12);
        assert_eq!(index.enclosing_header(5), Some(3));
        assert_eq!(index.enclosing_header(3), None);
        assert_eq!(index.section_end(5), 9);
        assert_eq!(index.section_end(10), 12);
    }

    #[test]
    fn raw_hunk_without_file_header() {
        let index = HunkIndex::locate(&Patch::from_text("@@ -1,1 +1,1 @@\n-a\n+b\n"));
        assert!(index.file_boundaries.is_empty());
        assert_eq!(index.hunk_headers, vec![0]);
        assert_eq!(index.section_end(1), 3);
    }

    #[test]
    fn no_headers_degrades_to_end_of_patch() {
        let index = HunkIndex::locate(&Patch::from_text("just\ntext\n"));
        assert!(index.hunk_headers.is_empty());
        assert_eq!(index.segment_end(0), 2);
    }

    #[test]
    fn header_rewrite_preserves_trailing_context() {
        let line = "@@ -10,5 +10,5 @@ static int foo(void)\n";
        let out =
            HunkHeader::rewrite_line(line, 0, |h| h.shift(HeaderSide::New, 1, false, 0)).unwrap();
        assert_eq!(out, "@@ -10,5 +10,6 @@ static int foo(void)\n");
    }

    #[test]
    fn header_shift_moves_start_when_asked() {
        let (mut h, _) = HunkHeader::parse("@@ -20,4 +22,7 @@", 0).unwrap();
        h.shift(HeaderSide::Old, 3, true, 0).unwrap();
        assert_eq!(h.to_string(), "@@ -23,7 +22,7 @@");
    }

    #[test]
    fn header_without_counts_is_malformed() {
        let err = HunkHeader::parse("@@ -1 +1 @@\n", 4).unwrap_err();
        assert!(matches!(err, SynthError::MalformedHeader { line: 4, .. }));
    }

    #[test]
    fn negative_result_is_rejected() {
        let (mut h, _) = HunkHeader::parse("@@ -1,0 +1,0 @@", 0).unwrap();
        assert!(h.shift(HeaderSide::New, -1, false, 0).is_err());
    }
}
