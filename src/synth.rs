//! Applies one strategy to one verified site and assembles the variant.

use std::ops::Range;

use rand::Rng;

use crate::error::{Result, SynthError};
use crate::hunk::HunkIndex;
use crate::patch::Patch;
use crate::renumber::renumber;
use crate::site::{ConditionSpan, ConditionalSite};
use crate::strategy::{self, SiteText, STRATEGY_COUNT};

/// Replacement lines for the segment that starts at a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub strategy: u8,
    /// Original lines replaced: from the site to the next hunk header or end of patch.
    pub range: Range<usize>,
    pub replacement: Vec<String>,
    /// `replacement.len() - range.len()`.
    pub delta: i64,
}

impl Rewrite {
    /// The full line sequence with the segment swapped in. Headers are untouched.
    pub fn splice(&self, patch: &Patch) -> Vec<String> {
        let lines = patch.lines();
        let mut out = Vec::with_capacity(lines.len() + self.replacement.len());
        out.extend_from_slice(&lines[..self.range.start]);
        out.extend(self.replacement.iter().cloned());
        out.extend_from_slice(&lines[self.range.end..]);
        out
    }
}

/// Picks `strategy` or, when `None`, one of the eight uniformly from `rng`.
///
/// Library callers that leave the strategy unspecified resolve it here before
/// calling [`synthesize`]. The batch controller never needs it: its sampling
/// plan already draws concrete ids from the patch's seeded rng.
pub fn choose_strategy<R: Rng>(strategy: Option<u8>, rng: &mut R) -> u8 {
    strategy.unwrap_or_else(|| rng.gen_range(0..STRATEGY_COUNT))
}

/// Rewrites the segment starting at `site` with an already-resolved strategy id.
pub fn synthesize(patch: &Patch, index: &HunkIndex, site: usize, strategy: u8) -> Result<Rewrite> {
    let spec = strategy::by_id(strategy)?;
    let range = site..index.segment_end(site);
    let buffer = patch.join_range(range.start, range.end);
    let site_line_len = patch.lines().get(site).map_or(0, String::len);
    let span = ConditionSpan::scan(&buffer)
        .filter(|span| span.if_start < site_line_len)
        .ok_or(SynthError::SiteVanished { line: site })?;
    let text = spec.rewrite(&SiteText::new(&buffer, span));
    let replacement: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
    let delta = replacement.len() as i64 - range.len() as i64;
    Ok(Rewrite {
        strategy,
        range,
        replacement,
        delta,
    })
}

/// A complete derived patch: one site rewritten by one strategy, headers repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub site: usize,
    pub strategy: u8,
    pub delta: i64,
    pub lines: Vec<String>,
}

impl Variant {
    pub fn build(
        patch: &Patch,
        index: &HunkIndex,
        site: &ConditionalSite,
        strategy: u8,
    ) -> Result<Self> {
        let rewrite = synthesize(patch, index, site.line, strategy)?;
        let spliced = rewrite.splice(patch);
        let lines = renumber(patch, index, site.line, spliced)?;
        Ok(Variant {
            site: site.line,
            strategy,
            delta: rewrite.delta,
            lines,
        })
    }

    pub fn text(&self) -> String {
        self.lines.concat()
    }
}
