use thiserror::Error;

/// Common error type for Chia exporter components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias using the common [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Why a backend source produced no snapshot for a scrape.
///
/// These never escape the source boundary as transport errors; the
/// collection engine turns them into "no family this scrape".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// No connection to the backend (process down, wrong host/port, timeout).
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// Backend answered, but the response was not what we expected.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// Well-formed response that carried no usable value.
    #[error("no data: {0}")]
    NoData(String),
}

impl SourceError {
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::Unreachable(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::ProtocolMismatch(msg.into())
    }

    pub fn no_data(msg: impl Into<String>) -> Self {
        Self::NoData(msg.into())
    }

    /// Stable tag used in log fields and self-metric labels.
    pub fn reason(&self) -> &'static str {
        match self {
            SourceError::Unreachable(_) => "unreachable",
            SourceError::ProtocolMismatch(_) => "protocol_mismatch",
            SourceError::NoData(_) => "no_data",
        }
    }
}
