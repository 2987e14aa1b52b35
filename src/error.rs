use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RgviewError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to launch search process '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Search process failed: {0}")]
    Process(String),

    #[error("Settings store error: {0}")]
    Store(String),

    #[error("Processing worker is gone")]
    WorkerGone,

    #[error("An unexpected error occurred: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, RgviewError>;
