use std::path::PathBuf;

use crate::symbolic::engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    /// A tag, call kind, value shape or encoding the codec doesn't understand.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("can't find an available filename for {prefix}_<n>{suffix}")]
    NoAvailableFilename { prefix: String, suffix: String },
    #[error("malformed dataflow graph: {0}")]
    Graph(String),
    #[error("failed to parse config file {path:?}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    // Data errors mean the input drifted from the format we understand;
    // syntax and I/O errors stay what they are.
    pub(crate) fn from_corpus_json(err: serde_json::Error) -> Self {
        match err.classify() {
            serde_json::error::Category::Data => Self::UnsupportedFormat(err.to_string()),
            _ => Self::Json(err),
        }
    }
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;
