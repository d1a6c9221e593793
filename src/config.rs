//! Run configuration: CLI surface and the validated `Config` value.

use std::env;
use std::path::{Path, PathBuf};

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::info;

use crate::error::{Result, SynthError};

pub const SEED_ENV: &str = "PATCHSYNTH_SEED";
pub const DEFAULT_SITES_PER_PATCH: usize = 2;
pub const DEFAULT_STRATEGIES_PER_SITE: usize = 1;

/// How many (site, strategy) pairs to draw from each patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingPolicy {
    /// Every verified site with every strategy.
    Exhaustive,
    /// Random subsets, at most this many sites and strategies per site.
    Capped {
        sites_per_patch: usize,
        strategies_per_site: usize,
    },
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        SamplingPolicy::Capped {
            sites_per_patch: DEFAULT_SITES_PER_PATCH,
            strategies_per_site: DEFAULT_STRATEGIES_PER_SITE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub seed: u64,
    pub policy: SamplingPolicy,
    pub dry_run: bool,
    pub manifest: Option<PathBuf>,
    pub summary: Option<PathBuf>,
    /// Only files with one of these extensions are read. Empty means all files.
    pub extensions: Vec<String>,
}

impl Config {
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>, seed: u64) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            seed,
            policy: SamplingPolicy::default(),
            dry_run: false,
            manifest: None,
            summary: None,
            extensions: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: SamplingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.input_root.is_dir() {
            return Err(SynthError::Usage(format!(
                "input root '{}' is not a directory",
                self.input_root.to_string_lossy()
            )));
        }
        if nests_within(&self.output_root, &self.input_root) {
            return Err(SynthError::Usage(format!(
                "output root '{}' must not be inside input root '{}'",
                self.output_root.to_string_lossy(),
                self.input_root.to_string_lossy()
            )));
        }
        if let SamplingPolicy::Capped {
            sites_per_patch,
            strategies_per_site,
        } = self.policy
        {
            if sites_per_patch == 0 || strategies_per_site == 0 {
                return Err(SynthError::Usage("site and strategy caps must be at least 1".to_string()));
            }
        }
        Ok(())
    }

    pub fn log(&self) {
        info!("input root = '{}'", self.input_root.to_string_lossy());
        info!("output root = '{}'", self.output_root.to_string_lossy());
        info!("seed = {}", self.seed);
        info!("policy = {:?}", self.policy);
        info!("dry_run = {}", self.dry_run);
        if let Some(m) = &self.manifest {
            info!("manifest = '{}'", m.to_string_lossy());
        }
    }
}

fn nests_within(inner: &Path, outer: &Path) -> bool {
    if inner.starts_with(outer) {
        return true;
    }
    let Ok(outer) = outer.canonicalize() else {
        return false;
    };
    // The output root may not exist yet; resolve its closest existing ancestor.
    inner
        .ancestors()
        .find_map(|a| a.canonicalize().ok())
        .is_some_and(|resolved| resolved.starts_with(&outer))
}

#[derive(Debug, Parser)]
#[command(
    name = "patchsynth",
    version,
    about = "Synthesize patch variants by rewriting conditionals on changed lines"
)]
pub struct Cli {
    /// Directory tree of unified-diff patches.
    pub input_root: PathBuf,
    /// Where variants are written, mirroring the input layout.
    pub output_root: PathBuf,
    /// RNG seed (falls back to the PATCHSYNTH_SEED env var, then entropy).
    #[arg(long)]
    pub seed: Option<u64>,
    /// Maximum verified sites mutated per patch.
    #[arg(long, default_value_t = DEFAULT_SITES_PER_PATCH)]
    pub sites: usize,
    /// Maximum strategies applied per site.
    #[arg(long, default_value_t = DEFAULT_STRATEGIES_PER_SITE)]
    pub strategies: usize,
    /// Apply every strategy to every verified site, ignoring the caps.
    #[arg(long)]
    pub exhaustive: bool,
    /// Run the pipeline without writing variants.
    #[arg(long)]
    pub dry_run: bool,
    /// Append one JSON line per written variant to this file.
    #[arg(long)]
    pub manifest: Option<PathBuf>,
    /// Write the batch summary as JSON to this file.
    #[arg(long)]
    pub summary: Option<PathBuf>,
    /// Only read files with this extension (repeatable).
    #[arg(long = "ext")]
    pub extensions: Vec<String>,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn into_config(self) -> Result<Config> {
        let policy = if self.exhaustive {
            SamplingPolicy::Exhaustive
        } else {
            SamplingPolicy::Capped {
                sites_per_patch: self.sites,
                strategies_per_site: self.strategies,
            }
        };
        let cfg = Config {
            seed: resolve_seed(self.seed, env::var(SEED_ENV).ok())?,
            input_root: self.input_root,
            output_root: self.output_root,
            policy,
            dry_run: self.dry_run,
            manifest: self.manifest,
            summary: self.summary,
            extensions: self
                .extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Flag first, then the environment value, then fresh entropy.
pub fn resolve_seed(flag: Option<u64>, env_value: Option<String>) -> Result<u64> {
    if let Some(s) = flag {
        info!("using provided seed {s}");
        return Ok(s);
    }
    if let Some(s) = env_value {
        let parsed: u64 = s
            .trim()
            .parse()
            .map_err(|_| SynthError::Usage(format!("invalid {SEED_ENV} value '{s}' (expected u64)")))?;
        info!("using env seed {parsed}");
        return Ok(parsed);
    }
    Ok(StdRng::from_entropy().gen())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_precedence() {
        assert_eq!(resolve_seed(Some(3), Some("9".into())).unwrap(), 3);
        assert_eq!(resolve_seed(None, Some(" 9 ".into())).unwrap(), 9);
        assert!(resolve_seed(None, Some("nine".into())).is_err());
        assert!(resolve_seed(None, None).is_ok());
    }

    #[test]
    fn cli_builds_capped_policy_by_default() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("data");
        std::fs::create_dir(&input).unwrap();
        let args: Vec<std::ffi::OsString> = vec![
            "patchsynth".into(),
            input.into_os_string(),
            tmp.path().join("out").into_os_string(),
            "--seed".into(),
            "11".into(),
            "--ext".into(),
            ".patch".into(),
        ];
        let cli = Cli::parse_from(args);
        let cfg = cli.into_config().unwrap();
        assert_eq!(cfg.seed, 11);
        assert_eq!(cfg.policy, SamplingPolicy::default());
        assert_eq!(cfg.extensions, vec!["patch".to_string()]);
    }

    #[test]
    fn exhaustive_flag_overrides_caps() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from([
            "patchsynth",
            tmp.path().to_str().unwrap(),
            "/nonexistent/out",
            "--seed=1",
            "--exhaustive",
            "--sites",
            "5",
        ]);
        assert_eq!(cli.into_config().unwrap().policy, SamplingPolicy::Exhaustive);
    }

    #[test]
    fn output_inside_input_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = Config::new(tmp.path(), tmp.path().join("synthesis"), 0);
        assert!(matches!(cfg.validate(), Err(SynthError::Usage(_))));
    }

    #[test]
    fn zero_caps_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = Config::new(tmp.path(), "/nonexistent/out", 0).with_policy(SamplingPolicy::Capped {
            sites_per_patch: 0,
            strategies_per_site: 1,
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_input_root_is_rejected() {
        let cfg = Config::new("/nonexistent/in", "/nonexistent/out", 0);
        assert!(cfg.validate().is_err());
    }
}
