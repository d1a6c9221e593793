//! Per-patch orchestration and the batch loop.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{Config, SamplingPolicy};
use crate::error::{Result, SynthError};
use crate::hunk::HunkIndex;
use crate::patch::Patch;
use crate::sink::{ManifestWriter, VariantRecord, VariantSink};
use crate::site::{self, ConditionalSite};
use crate::strategy::{self, STRATEGY_COUNT};
use crate::synth::Variant;

/// What happened to one patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchReport {
    pub verified_sites: usize,
    pub variants: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub patches: usize,
    pub patches_without_sites: usize,
    pub patches_with_one_site: usize,
    pub patches_with_many_sites: usize,
    pub verified_sites: usize,
    /// Every verified site times every strategy.
    pub possible_variants: usize,
    pub variants: usize,
    pub failed_patches: usize,
}

impl BatchSummary {
    fn record(&mut self, report: &PatchReport) {
        self.patches += 1;
        match report.verified_sites {
            0 => self.patches_without_sites += 1,
            1 => self.patches_with_one_site += 1,
            _ => self.patches_with_many_sites += 1,
        }
        self.verified_sites += report.verified_sites;
        self.possible_variants += report.verified_sites * usize::from(STRATEGY_COUNT);
        self.variants += report.variants;
    }

    fn record_failure(&mut self) {
        self.patches += 1;
        self.failed_patches += 1;
    }

    pub fn log(&self, dry_run: bool) {
        info!(
            "patches = {} (failed {}, no site {}, one site {}, two or more {})",
            self.patches,
            self.failed_patches,
            self.patches_without_sites,
            self.patches_with_one_site,
            self.patches_with_many_sites
        );
        info!(
            "verified sites = {}, possible variants = {}",
            self.verified_sites, self.possible_variants
        );
        if dry_run {
            info!("variants synthesized (dry run, nothing written) = {}", self.variants);
        } else {
            info!("variants written = {}", self.variants);
        }
    }
}

/// Chooses the (site, strategy) pairs to synthesize for one patch.
pub fn plan<R: Rng + ?Sized>(
    policy: SamplingPolicy,
    sites: &[ConditionalSite],
    rng: &mut R,
) -> Vec<(ConditionalSite, u8)> {
    match policy {
        SamplingPolicy::Exhaustive => sites
            .iter()
            .flat_map(|s| (0..STRATEGY_COUNT).map(move |id| (*s, id)))
            .collect(),
        SamplingPolicy::Capped {
            sites_per_patch,
            strategies_per_site,
        } => {
            let mut picked = sites.to_vec();
            picked.shuffle(rng);
            picked.truncate(sites_per_patch);
            let mut out = Vec::with_capacity(picked.len() * strategies_per_site);
            for s in picked {
                let mut ids: Vec<u8> = (0..STRATEGY_COUNT).collect();
                ids.shuffle(rng);
                ids.truncate(strategies_per_site);
                out.extend(ids.into_iter().map(|id| (s, id)));
            }
            out
        }
    }
}

/// Every regular file under `root`, optionally filtered by extension, sorted
/// so per-patch seeds do not depend on directory iteration order.
pub fn collect_patches(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let ctx = format!("failed to walk '{}'", root.to_string_lossy());
            match e.into_io_error() {
                Some(io) => SynthError::io(ctx, io),
                None => SynthError::Usage(format!("{ctx}: filesystem loop")),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let keep = extensions.is_empty()
            || path
                .extension()
                .and_then(OsStr::to_str)
                .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
        if keep {
            out.push(path.to_path_buf());
        }
    }
    out.sort();
    Ok(out)
}

pub fn render_diff(original: &str, variant: &str) -> String {
    let diff = TextDiff::from_lines(original, variant);
    let mut out = String::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => '<',
            ChangeTag::Insert => '>',
            ChangeTag::Equal => continue,
        };
        out.push(sign);
        out.push(' ');
        out.push_str(change.value());
        if change.missing_newline() {
            out.push('\n');
        }
    }
    out
}

pub struct Controller<S: VariantSink> {
    cfg: Config,
    sink: S,
    manifest: Option<Arc<Mutex<ManifestWriter>>>,
}

impl<S: VariantSink> Controller<S> {
    pub fn new(cfg: Config, sink: S) -> Result<Self> {
        let manifest = match (&cfg.manifest, cfg.dry_run) {
            (Some(path), false) => Some(Arc::new(Mutex::new(ManifestWriter::create(path)?))),
            _ => None,
        };
        Ok(Self { cfg, sink, manifest })
    }

    /// Runs Locator, Finder, Verifier, then synthesizes and persists the
    /// planned variants. Zero verified sites is a skip, not an error.
    ///
    /// Every planned variant is built before any is written, so a patch that
    /// fails part way leaves nothing behind in the output tree or manifest.
    pub fn process_patch(&self, path: &Path, seed: u64) -> Result<PatchReport> {
        let display_path = path.to_string_lossy().to_string();
        let patch = Patch::read(path)?;
        let index = HunkIndex::locate_reporting(&patch, &display_path);
        let sites = site::find_sites(&patch, &index);
        if sites.is_empty() {
            debug!(path = %display_path, "no verified conditional, skipping");
            return Ok(PatchReport::default());
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let variants = plan(self.cfg.policy, &sites, &mut rng)
            .into_iter()
            .map(|(site, strategy_id)| {
                let variant = Variant::build(&patch, &index, &site, strategy_id)?;
                debug!(
                    path = %display_path,
                    line = site.line,
                    strategy = strategy_id,
                    delta = variant.delta,
                    "variant synthesized"
                );
                Ok(variant)
            })
            .collect::<Result<Vec<Variant>>>()?;

        for variant in &variants {
            if self.cfg.dry_run {
                debug!("\n{}", render_diff(&patch.lines().concat(), &variant.text()));
            } else {
                let written = self.sink.persist(path, variant)?;
                self.record(path, &written, variant, seed)?;
            }
        }
        Ok(PatchReport {
            verified_sites: sites.len(),
            variants: variants.len(),
        })
    }

    fn record(&self, source: &Path, output: &Path, variant: &Variant, seed: u64) -> Result<()> {
        let Some(manifest) = &self.manifest else {
            return Ok(());
        };
        let record = VariantRecord {
            source: source.to_string_lossy().to_string(),
            output: output.to_string_lossy().to_string(),
            site_line: variant.site,
            strategy: variant.strategy,
            strategy_label: strategy::by_id(variant.strategy)?.label,
            line_delta: variant.delta,
            seed,
        };
        let mut guard = manifest
            .lock()
            .map_err(|_| SynthError::Internal("manifest mutex poisoned".to_string()))?;
        guard.write_record(&record)
    }

    /// Processes `files` in parallel. Patch-local failures are logged and
    /// counted; anything else aborts the batch.
    pub fn run(&self, files: &[PathBuf]) -> Result<BatchSummary> {
        let base_seed = self.cfg.seed;
        let outcomes: Vec<(&PathBuf, Result<PatchReport>)> = files
            .par_iter()
            .enumerate()
            .map(|(idx, path)| (path, self.process_patch(path, base_seed.wrapping_add(idx as u64))))
            .collect();

        let mut summary = BatchSummary::default();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(report) => {
                    if report.variants > 0 {
                        info!(
                            path = %path.to_string_lossy(),
                            sites = report.verified_sites,
                            variants = report.variants,
                            "processed"
                        );
                    }
                    summary.record(&report);
                }
                Err(e) if e.is_patch_local() => {
                    warn!(path = %path.to_string_lossy(), "skipping patch: {e}");
                    summary.record_failure();
                }
                Err(e) => return Err(e),
            }
        }
        Ok(summary)
    }

    /// Walks the input root, runs the batch, and flushes the manifest.
    pub fn run_all(self) -> Result<BatchSummary> {
        let files = collect_patches(&self.cfg.input_root, &self.cfg.extensions)?;
        if files.is_empty() {
            return Err(SynthError::Usage(format!(
                "no input files found under '{}'",
                self.cfg.input_root.to_string_lossy()
            )));
        }
        info!("found {} patch files", files.len());
        let summary = self.run(&files)?;
        if let Some(manifest) = self.manifest {
            let writer = Arc::try_unwrap(manifest)
                .map_err(|_| SynthError::Internal("manifest still shared".to_string()))?
                .into_inner()
                .map_err(|_| SynthError::Internal("manifest mutex poisoned".to_string()))?;
            let rows = writer.finish()?;
            debug!("manifest rows = {rows}");
        }
        if let Some(path) = &self.cfg.summary {
            let json = serde_json::to_string_pretty(&summary).map_err(|e| SynthError::Json {
                ctx: "summary serialization failed".to_string(),
                source: e,
            })?;
            fs::write(path, json).map_err(|e| {
                SynthError::io(format!("failed to write summary '{}'", path.to_string_lossy()), e)
            })?;
        }
        Ok(summary)
    }
}
