//! Repairs hunk-header counts after lines were inserted at a site.

use crate::error::{Result, SynthError};
use crate::hunk::{HeaderSide, HunkHeader, HunkIndex};
use crate::patch::Patch;

/// Rewrites every header from the one enclosing `site` up to the next file
/// boundary. The enclosing header only grows its count; later headers in the
/// same file section move both start and count by the delta.
///
/// `index` describes `original`; `lines` is the spliced sequence.
pub fn renumber(
    original: &Patch,
    index: &HunkIndex,
    site: usize,
    mut lines: Vec<String>,
) -> Result<Vec<String>> {
    let delta = lines.len() as i64 - original.len() as i64;
    if delta == 0 {
        return Ok(lines);
    }
    let sign = original
        .lines()
        .get(site)
        .and_then(|l| l.chars().next())
        .unwrap_or(' ');
    let side = HeaderSide::for_sign(sign);
    let first = index
        .enclosing_header(site)
        .ok_or(SynthError::MissingEnclosingHunk { line: site })?;
    let end = index.section_end(site);
    let shift = isize::try_from(delta)
        .map_err(|_| SynthError::Internal(format!("line delta {delta} out of range")))?;

    let affected = index.hunk_headers.iter().copied().filter(|&h| h >= first && h < end);
    for (n, header) in affected.enumerate() {
        let moved = n > 0;
        let at = if moved {
            header
                .checked_add_signed(shift)
                .ok_or(SynthError::HeaderOverflow { line: header, delta })?
        } else {
            header
        };
        let line = lines
            .get_mut(at)
            .ok_or_else(|| SynthError::Internal(format!("header index {at} past end of variant")))?;
        *line = HunkHeader::rewrite_line(line, header, |h| h.shift(side, delta, moved, header))?;
    }
    Ok(lines)
}
