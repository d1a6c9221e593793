//! The eight rewrite templates applied to a verified conditional.
//!
//! Every template inserts a declaration in front of the site and rewrites the
//! condition so the guarded branch keeps its meaning. Templates 4 to 7 also
//! emit a scoped block that sets a sentinel when the original condition holds.
//! All synthesized lines carry the diff sign and indentation of the site.

use crate::error::{Result, SynthError};
use crate::site::ConditionSpan;

pub const STRATEGY_COUNT: u8 = 8;

type RewriteFn = fn(&SiteText<'_>) -> String;

#[derive(Debug, Clone, Copy)]
pub struct StrategySpec {
    pub id: u8,
    pub label: &'static str,
    /// Line delta for a condition that fits on one line.
    pub nominal_delta: i64,
    func: RewriteFn,
}

impl StrategySpec {
    pub fn rewrite(&self, site: &SiteText<'_>) -> String {
        (self.func)(site)
    }
}

static STRATEGIES: [StrategySpec; STRATEGY_COUNT as usize] = [
    StrategySpec {
        id: 0,
        label: "sentinel zero or",
        nominal_delta: 1,
        func: rewrite_sentinel_or,
    },
    StrategySpec {
        id: 1,
        label: "sentinel one and",
        nominal_delta: 1,
        func: rewrite_sentinel_and,
    },
    StrategySpec {
        id: 2,
        label: "hoisted condition equals true",
        nominal_delta: 1,
        func: rewrite_hoisted_true,
    },
    StrategySpec {
        id: 3,
        label: "hoisted negated condition",
        nominal_delta: 1,
        func: rewrite_hoisted_negated,
    },
    StrategySpec {
        id: 4,
        label: "scoped flag and",
        nominal_delta: 4,
        func: rewrite_scoped_and,
    },
    StrategySpec {
        id: 5,
        label: "scoped inverted flag or",
        nominal_delta: 4,
        func: rewrite_scoped_or,
    },
    StrategySpec {
        id: 6,
        label: "scoped flag replaces condition",
        nominal_delta: 4,
        func: rewrite_scoped_flag,
    },
    StrategySpec {
        id: 7,
        label: "scoped inverted flag replaces condition",
        nominal_delta: 4,
        func: rewrite_scoped_inverted_flag,
    },
];

pub fn all() -> &'static [StrategySpec] {
    &STRATEGIES
}

pub fn by_id(id: u8) -> Result<&'static StrategySpec> {
    STRATEGIES
        .get(usize::from(id))
        .ok_or(SynthError::InvalidStrategy(id))
}

/// The hunk segment starting at a site, split around its condition.
#[derive(Debug, Clone)]
pub struct SiteText<'a> {
    buffer: &'a str,
    span: ConditionSpan,
    lead: String,
    eol: &'static str,
}

impl<'a> SiteText<'a> {
    pub fn new(buffer: &'a str, span: ConditionSpan) -> Self {
        let mut lead = String::with_capacity(span.if_start);
        let mut chars = buffer[..span.if_start].chars();
        if let Some(sign) = chars.next() {
            lead.push(sign);
        }
        lead.extend(chars.map(|c| if c.is_whitespace() { c } else { ' ' }));
        let first_line = buffer.split_inclusive('\n').next().unwrap_or("");
        let eol = if first_line.ends_with("\r\n") { "\r\n" } else { "\n" };
        Self {
            buffer,
            span,
            lead,
            eol,
        }
    }

    fn through_open(&self) -> &'a str {
        &self.buffer[..=self.span.open]
    }

    fn after_open(&self) -> &'a str {
        &self.buffer[self.span.open + 1..]
    }

    fn through_close(&self) -> &'a str {
        &self.buffer[..=self.span.close]
    }

    fn from_close(&self) -> &'a str {
        &self.buffer[self.span.close..]
    }

    fn condition(&self) -> &'a str {
        self.span.condition(self.buffer)
    }

    /// A synthetic line at the site's own indentation.
    fn line(&self, body: &str) -> String {
        format!("{}{}{}", self.lead, body, self.eol)
    }

    fn nested_line(&self, body: &str) -> String {
        format!("{}    {}{}", self.lead, body, self.eol)
    }

    /// `int _TMP = init;` followed by `if (cond) { _TMP = set; }`.
    fn scoped_flag(&self, init: u8, set: u8) -> String {
        let mut out = self.line(&format!("int _TMP = {init};"));
        out.push_str(self.through_close());
        out.push_str(" {");
        out.push_str(self.eol);
        out.push_str(&self.nested_line(&format!("_TMP = {set};")));
        out.push_str(&self.line("}"));
        out
    }
}

fn rewrite_sentinel_or(s: &SiteText<'_>) -> String {
    s.line("const int _SENTINEL = 0;") + s.through_open() + "_SENTINEL || " + s.after_open()
}

fn rewrite_sentinel_and(s: &SiteText<'_>) -> String {
    s.line("const int _SENTINEL = 1;") + s.through_open() + "_SENTINEL && " + s.after_open()
}

fn rewrite_hoisted_true(s: &SiteText<'_>) -> String {
    s.line(&format!("bool _TMP = {};", s.condition()))
        + s.through_open()
        + "true == _TMP"
        + s.from_close()
}

fn rewrite_hoisted_negated(s: &SiteText<'_>) -> String {
    s.line(&format!("bool _TMP = !({});", s.condition()))
        + s.through_open()
        + "!_TMP"
        + s.from_close()
}

fn rewrite_scoped_and(s: &SiteText<'_>) -> String {
    s.scoped_flag(0, 1) + s.through_open() + "_TMP && " + s.after_open()
}

fn rewrite_scoped_or(s: &SiteText<'_>) -> String {
    s.scoped_flag(1, 0) + s.through_open() + "!_TMP || " + s.after_open()
}

fn rewrite_scoped_flag(s: &SiteText<'_>) -> String {
    s.scoped_flag(0, 1) + s.through_open() + "_TMP" + s.from_close()
}

fn rewrite_scoped_inverted_flag(s: &SiteText<'_>) -> String {
    s.scoped_flag(1, 0) + s.through_open() + "!_TMP" + s.from_close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn apply(id: u8, buffer: &str) -> String {
        let span = ConditionSpan::scan(buffer).unwrap();
        by_id(id).unwrap().rewrite(&SiteText::new(buffer, span))
    }

    const SITE: &str = "+    if (x > 0) {\n+        y();\n";

    #[test]
    fn table_ids_match_positions() {
        for (i, spec) in all().iter().enumerate() {
            assert_eq!(usize::from(spec.id), i);
        }
        assert!(matches!(by_id(8), Err(SynthError::InvalidStrategy(8))));
    }

    #[test]
    fn sentinel_templates() {
        assert_eq!(
            apply(0, SITE),
            "+    const int _SENTINEL = 0;\n+    if (_SENTINEL || x > 0) {\n+        y();\n"
        );
        assert_eq!(
            apply(1, SITE),
            "+    const int _SENTINEL = 1;\n+    if (_SENTINEL && x > 0) {\n+        y();\n"
        );
    }

    #[test]
    fn hoisted_templates() {
        assert_eq!(
            apply(2, SITE),
            "+    bool _TMP = x > 0;\n+    if (true == _TMP) {\n+        y();\n"
        );
        assert_eq!(
            apply(3, SITE),
            "+    bool _TMP = !(x > 0);\n+    if (!_TMP) {\n+        y();\n"
        );
    }

    #[test]
    fn scoped_templates() {
        let block = |init: u8, set: u8| {
            format!("+    int _TMP = {init};\n+    if (x > 0) {{\n+        _TMP = {set};\n+    }}\n")
        };
        assert_eq!(
            apply(4, SITE),
            block(0, 1) + "+    if (_TMP && x > 0) {\n+        y();\n"
        );
        assert_eq!(
            apply(5, SITE),
            block(1, 0) + "+    if (!_TMP || x > 0) {\n+        y();\n"
        );
        assert_eq!(apply(6, SITE), block(0, 1) + "+    if (_TMP) {\n+        y();\n");
        assert_eq!(apply(7, SITE), block(1, 0) + "+    if (!_TMP) {\n+        y();\n");
    }

    #[test]
    fn removed_lines_keep_minus_sign_and_tabs() {
        let out = apply(0, "-\t\tif (p) return;\n");
        assert_eq!(out, "-\t\tconst int _SENTINEL = 0;\n-\t\tif (_SENTINEL || p) return;\n");
    }

    #[test]
    fn text_before_if_becomes_padding() {
        let out = apply(1, "+  } else if (q) {\n");
        assert_eq!(out, "+         const int _SENTINEL = 1;\n+  } else if (_SENTINEL && q) {\n");
    }

    #[test]
    fn crlf_terminators_are_reused() {
        let out = apply(3, "+ if (a) {\r\n");
        assert_eq!(out, "+ bool _TMP = !(a);\r\n+ if (!_TMP) {\r\n");
    }

    #[test]
    fn multi_line_condition_is_hoisted_whole() {
        let out = apply(2, "+  if (a &&\n+      b) {\n");
        assert_eq!(out, "+  bool _TMP = a &&\n+      b;\n+  if (true == _TMP) {\n");
    }
}
