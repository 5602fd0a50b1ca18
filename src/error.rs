use thiserror::Error;

/// Errors surfaced by the conversion pipeline.
///
/// Only unrecoverable conditions become `Error`s. Recoverable anomalies
/// (a corrupt chunk, a dangling fragment reference, an out-of-range
/// material slot) are logged, tallied in
/// [`ConversionSummary`](crate::pipeline::ConversionSummary) and replaced
/// with a sentinel so the rest of the run can finish.
#[derive(Debug, Error)]
pub enum Error {
    #[error("bad archive magic: expected {expected:?}, found {found:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },

    #[error("archive directory at offset {offset:#x} is unreadable: {reason}")]
    BadDirectory { offset: usize, reason: String },

    #[error("unexpected end of data at offset {offset:#x} (need {need} bytes, have {have})")]
    UnexpectedEof {
        offset: usize,
        need: usize,
        have: usize,
    },

    #[error("chunk failed to decompress: {reason}")]
    ChunkDecode { reason: String },

    #[error("bad scene file magic {found:#010x}")]
    BadSceneMagic { found: u32 },

    #[error("unsupported scene file version {version:#010x}")]
    UnsupportedVersion { version: u32 },

    #[error("asset {0:?} not found in any archive")]
    MissingAsset(String),

    #[error("string at offset {offset:#x} is not valid UTF-8")]
    InvalidString { offset: usize },

    #[error("native scene data is malformed: {0}")]
    MalformedScene(String),

    #[error("interchange serialization failed: {0}")]
    Serialize(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
