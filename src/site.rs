//! Finding and verifying `if (...)` sites on changed lines.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::hunk::HunkIndex;
use crate::patch::Patch;

static OPENER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"if\s*\(").unwrap());

/// Byte offsets of a conditional expression inside a scan buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionSpan {
    /// Start of the `if` keyword.
    pub if_start: usize,
    /// The opening `(`.
    pub open: usize,
    /// The matching `)`.
    pub close: usize,
}

impl ConditionSpan {
    /// Locates the first opener in `buffer` and walks forward to its matching
    /// close paren. `None` when the buffer ends before depth returns to zero.
    pub fn scan(buffer: &str) -> Option<Self> {
        let m = OPENER_RE.find(buffer)?;
        let open = m.end() - 1;
        let mut depth = 1usize;
        for (i, b) in buffer.bytes().enumerate().skip(open + 1) {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(ConditionSpan {
                            if_start: m.start(),
                            open,
                            close: i,
                        });
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Text strictly between the parens.
    pub fn condition<'a>(&self, buffer: &'a str) -> &'a str {
        &buffer[self.open + 1..self.close]
    }

    /// Every physical line from the buffer start through the close paren
    /// must begin with the buffer's first character.
    pub fn sign_consistent(&self, buffer: &str) -> bool {
        let head = &buffer[..=self.close];
        let Some(sign) = head.chars().next() else {
            return false;
        };
        let newlines = head.matches('\n').count();
        let signed = head.matches(&format!("\n{sign}")).count();
        newlines == signed
    }
}

/// A verified, safe-to-mutate conditional on a changed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionalSite {
    pub line: usize,
    pub span: ConditionSpan,
    pub sign: char,
}

impl ConditionalSite {
    /// Re-derives the site at `line` against the segment running to the next
    /// hunk header, applying the closing and sign checks.
    pub fn resolve(patch: &Patch, index: &HunkIndex, line: usize) -> Option<Self> {
        let buffer = patch.join_range(line, index.segment_end(line));
        let sign = buffer.chars().next()?;
        if sign != '+' && sign != '-' {
            return None;
        }
        let span = ConditionSpan::scan(&buffer)?;
        if !span.sign_consistent(&buffer) {
            return None;
        }
        Some(ConditionalSite { line, span, sign })
    }
}

/// Superficial scan: every line containing an `if (` opener.
pub fn find_candidates(patch: &Patch) -> Vec<usize> {
    patch
        .lines()
        .iter()
        .enumerate()
        .filter(|(_, line)| OPENER_RE.is_match(line))
        .map(|(i, _)| i)
        .collect()
}

pub fn verify(patch: &Patch, index: &HunkIndex, candidates: &[usize]) -> Vec<ConditionalSite> {
    let Some(first_header) = index.first_header() else {
        return Vec::new();
    };
    candidates
        .iter()
        .copied()
        .filter(|&ln| ln > first_header)
        .filter(|&ln| {
            let line = &patch.lines()[ln];
            line.starts_with('+') || line.starts_with('-')
        })
        .filter_map(|ln| ConditionalSite::resolve(patch, index, ln))
        .collect()
}

pub fn find_sites(patch: &Patch, index: &HunkIndex) -> Vec<ConditionalSite> {
    verify(patch, index, &find_candidates(patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sites_of(text: &str) -> Vec<usize> {
        let patch = Patch::from_text(text);
        let index = HunkIndex::locate(&patch);
        find_sites(&patch, &index).into_iter().map(|s| s.line).collect()
    }

    #[test]
    fn scan_handles_nesting() {
        let buf = "+  if (f(a) && (b || c)) {\n";
        let span = ConditionSpan::scan(buf).unwrap();
        assert_eq!(&buf[span.if_start..span.if_start + 2], "if");
        assert_eq!(span.condition(buf), "f(a) && (b || c)");
        assert_eq!(&buf[span.close..span.close + 1], ")");
    }

    #[test]
    fn scan_allows_whitespace_before_paren() {
        let buf = "-\tif   (x)\n";
        let span = ConditionSpan::scan(buf).unwrap();
        assert_eq!(span.condition(buf), "x");
    }

    #[test]
    fn scan_fails_without_close() {
        assert!(ConditionSpan::scan("+ if (a && (b)\n").is_none());
    }

    #[test]
    fn finder_is_superficial() {
        let patch = Patch::from_text("header if (x)\n+ // if (y\n context\n+ elif(z)\n");
        assert_eq!(find_candidates(&patch), vec![0, 1, 3]);
    }

    #[test]
    fn preamble_and_context_lines_are_dropped() {
        let text = "\
diff --git a/a.c b/a.c
if (preamble) {
@@ -1,3 +1,3 @@
 if (context) {
+if (added) {
-if (removed) {
";
        assert_eq!(sites_of(text), vec![4, 5]);
    }

    #[test]
    fn multi_line_condition_with_same_sign_is_kept() {
        let text = "@@ -1,2 +1,3 @@\n+  if (a &&\n+      b) {\n+  }\n";
        assert_eq!(sites_of(text), vec![1]);
    }

    #[test]
    fn condition_straddling_signs_is_rejected() {
        let text = "@@ -1,2 +1,2 @@\n+  if (a &&\n-      b) {\n";
        assert!(sites_of(text).is_empty());
    }

    #[test]
    fn condition_closing_on_context_line_is_rejected() {
        let text = "@@ -1,2 +1,2 @@\n+  if (a &&\n       b) {\n";
        assert!(sites_of(text).is_empty());
    }

    #[test]
    fn condition_must_close_before_next_header() {
        let text = "@@ -1,1 +1,1 @@\n+    // if (foo\n@@ -9,1 +9,1 @@\n+ bar)\n";
        assert!(sites_of(text).is_empty());
    }

    #[test]
    fn commented_conditional_that_closes_is_kept() {
        let text = "@@ -1,1 +1,1 @@\n+    // if (foo)\n";
        assert_eq!(sites_of(text), vec![1]);
    }

    #[test]
    fn no_header_means_no_sites() {
        assert!(sites_of("+ if (x) {\n").is_empty());
    }

    #[test]
    fn sign_check_counts_lines_through_close_only() {
        let buf = "+ if (x) {\n y\n";
        let span = ConditionSpan::scan(buf).unwrap();
        assert!(span.sign_consistent(buf));
    }

    #[test]
    fn close_paren_as_final_byte_is_kept() {
        let text = "@@ -1,1 +1,1 @@\n+if (x)";
        assert_eq!(sites_of(text), vec![1]);
        let span = ConditionSpan::scan("+if (x)").unwrap();
        assert_eq!(span.close, "+if (x)".len() - 1);
    }

    #[test]
    fn scan_running_off_the_end_is_rejected() {
        assert!(sites_of("@@ -1,1 +1,1 @@\n+if (x").is_empty());
    }
}
