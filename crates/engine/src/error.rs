use std::io;

/// A container or chunk that could not be read. Never fatal to a scan: the
/// unit is skipped and counted.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("I/O error reading {what}: {source}")]
    Io {
        what: String,
        #[source]
        source: io::Error,
    },
    #[error("corrupt data in {what}: {reason}")]
    Corrupt { what: String, reason: String },
}

impl DecodeError {
    pub fn io(what: impl Into<String>, source: io::Error) -> Self {
        DecodeError::Io {
            what: what.into(),
            source,
        }
    }

    pub fn corrupt(what: impl Into<String>, reason: impl ToString) -> Self {
        DecodeError::Corrupt {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

/// Rejected before any container is opened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no target block types given")]
    EmptyTargets,
    #[error("pattern `{0}` matches no known block type")]
    UnmatchedPattern(String),
    #[error("unknown dimension `{0}`")]
    UnknownDimension(String),
    #[error("per-type cap must be at least 1 (got {0})")]
    InvalidCap(i64),
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Index store failures.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("index I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("index serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("index write failed ({durable} rows durable, {lost} rows lost): {reason}")]
    Persistence { durable: u64, lost: u64, reason: String },
    #[error("corrupt index row at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },
}
