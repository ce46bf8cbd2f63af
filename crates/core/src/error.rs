/// Message carried by the failure outcome of a cancelled operation.
pub const CANCELLED_MESSAGE: &str = "Cancelled by user";

/// Error raised by a codec call during one stage of an operation.
///
/// The `Display` text of this error becomes the failure outcome's message,
/// so `Failed` renders its message verbatim.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("{0}")]
    Failed(String),

    #[error("Cancelled by user")]
    Cancelled,

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("line {line}: {detail}")]
    Syntax { line: usize, detail: String },

    #[error("Corrupt archive: {0}")]
    Corrupt(String),

    #[error("Input {name} is {size_mb}MB, exceeding limit of {limit_mb}MB")]
    Oversized {
        name: String,
        size_mb: u64,
        limit_mb: u64,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl StageError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Precondition violations on the executor. These never travel through the
/// outcome channel.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("Executor is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Unknown key: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
