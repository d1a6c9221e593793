//! Persisting variants: a mirrored output tree plus an optional JSONL manifest.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{Result, SynthError};
use crate::synth::Variant;

pub trait VariantSink: Send + Sync {
    /// Writes `variant`, derived from the patch at `source`, and returns where it landed.
    fn persist(&self, source: &Path, variant: &Variant) -> Result<PathBuf>;
}

/// Writes each variant to `<output_root>/<relative dir>/<file name>.<NNNNN>`,
/// picking the lowest sequence number not already taken.
#[derive(Debug, Clone)]
pub struct MirrorSink {
    input_root: PathBuf,
    output_root: PathBuf,
}

impl MirrorSink {
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
        }
    }

    /// Directory that mirrors `source`'s parent under the output root.
    pub fn target_dir(&self, source: &Path) -> PathBuf {
        let relative_parent = source
            .strip_prefix(&self.input_root)
            .ok()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""));
        self.output_root.join(relative_parent)
    }
}

pub fn sequenced_name(file_name: &OsString, seq: u32) -> OsString {
    let mut name = file_name.clone();
    name.push(format!(".{seq:05}"));
    name
}

impl VariantSink for MirrorSink {
    fn persist(&self, source: &Path, variant: &Variant) -> Result<PathBuf> {
        let dir = self.target_dir(source);
        fs::create_dir_all(&dir).map_err(|e| {
            SynthError::io(format!("failed to create output dir '{}'", dir.to_string_lossy()), e)
        })?;
        let file_name = source
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| {
                SynthError::Usage(format!("input '{}' has no file name", source.to_string_lossy()))
            })?;

        let mut seq: u32 = 1;
        let (path, file) = loop {
            let candidate = dir.join(sequenced_name(&file_name, seq));
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(f) => break (candidate, f),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    seq = seq.checked_add(1).ok_or_else(|| {
                        SynthError::Usage(format!(
                            "no free sequence number left in '{}'",
                            dir.to_string_lossy()
                        ))
                    })?;
                }
                Err(e) => {
                    return Err(SynthError::io(
                        format!("failed to create '{}'", candidate.to_string_lossy()),
                        e,
                    ))
                }
            }
        };

        let mut w = BufWriter::new(file);
        for line in &variant.lines {
            w.write_all(line.as_bytes())
                .map_err(|e| SynthError::io(format!("failed to write '{}'", path.to_string_lossy()), e))?;
        }
        w.flush()
            .map_err(|e| SynthError::io(format!("failed to flush '{}'", path.to_string_lossy()), e))?;
        debug!(path = %path.to_string_lossy(), "variant written");
        Ok(path)
    }
}

/// One manifest line per written variant.
#[derive(Debug, Clone, Serialize)]
pub struct VariantRecord {
    pub source: String,
    pub output: String,
    pub site_line: usize,
    pub strategy: u8,
    pub strategy_label: &'static str,
    pub line_delta: i64,
    pub seed: u64,
}

pub struct ManifestWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl ManifestWriter {
    /// Refuses to overwrite an existing manifest.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| SynthError::io(format!("failed to open manifest '{}'", path.to_string_lossy()), e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn write_record(&mut self, record: &VariantRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record).map_err(|e| SynthError::Json {
            ctx: "manifest serialization failed".to_string(),
            source: e,
        })?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| SynthError::io("failed to write manifest newline", e))?;
        self.written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush().map_err(|e| {
            SynthError::io(format!("failed to flush manifest '{}'", self.path.to_string_lossy()), e)
        })?;
        Ok(self.written)
    }
}
