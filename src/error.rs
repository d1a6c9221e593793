use std::io;

pub type Result<T> = std::result::Result<T, SynthError>;

#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("{0}")]
    Usage(String),

    #[error("{ctx}: {source}")]
    Io {
        ctx: String,
        #[source]
        source: io::Error,
    },

    #[error("{ctx}: {source}")]
    Json {
        ctx: String,
        #[source]
        source: serde_json::Error,
    },

    /// A located hunk header does not carry the four-number `@@ -a,b +c,d @@` form.
    #[error("malformed hunk header at line {line}: '{text}'")]
    MalformedHeader { line: usize, text: String },

    /// Header arithmetic would leave a field below zero or overflow it.
    #[error("hunk header at line {line} cannot absorb a delta of {delta}")]
    HeaderOverflow { line: usize, delta: i64 },

    #[error("no hunk header encloses line {line}")]
    MissingEnclosingHunk { line: usize },

    /// The condition span could not be re-derived at synthesis time.
    #[error("conditional site at line {line} no longer resolves to a closed condition")]
    SiteVanished { line: usize },

    #[error("invalid strategy id {0} (expected 0..=7)")]
    InvalidStrategy(u8),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SynthError {
    pub fn io(ctx: impl Into<String>, source: io::Error) -> Self {
        SynthError::Io {
            ctx: ctx.into(),
            source,
        }
    }

    /// Whether the failure is confined to the patch being processed.
    ///
    /// The batch controller logs and skips patch-local failures; anything
    /// else stops the run.
    pub fn is_patch_local(&self) -> bool {
        !matches!(self, SynthError::Usage(_) | SynthError::Internal(_))
    }
}
