use std::path::PathBuf;

/// Errors raised while preparing the corpus.
///
/// Only [`Error::Configuration`] aborts a run. Every other variant is caught
/// at the item boundary, logged and counted.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("malformed annotation {}: {reason}", path.display())]
    MalformedAnnotation { path: PathBuf, reason: String },

    #[error("cannot decode image {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("cannot encode image {}: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Short, path-free reason used to group failures in the run summary.
    pub fn kind(&self) -> String {
        match self {
            Error::InvalidGeometry(_) => "invalid geometry".to_string(),
            Error::MalformedAnnotation { .. } => "malformed annotation".to_string(),
            Error::Decode { .. } => "image decode failed".to_string(),
            Error::Encode { .. } => "image encode failed".to_string(),
            Error::Configuration(_) => "configuration".to_string(),
            Error::Io { source, .. } => format!("i/o: {}", source.kind()),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
