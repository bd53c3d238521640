use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The bytes are not valid in the detected or declared encoding.
    #[error("could not decode text as {encoding}")]
    Decode { encoding: &'static str },

    #[error("unsupported encoding label: {0}")]
    UnsupportedEncoding(String),

    /// No chapter heading was found, so there is nothing to store.
    #[error("no chapters detected in {}", path.display())]
    NoContent { path: PathBuf },

    #[error("storage error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("chapter document schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("book {0} not found")]
    NotFound(i64),

    #[error("operation cancelled at stage={stage}")]
    Cancelled { stage: &'static str },

    #[error("could not determine application data directory")]
    AppDataDir,
}
