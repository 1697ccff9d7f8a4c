use crate::container::ChunkId;
use crate::state::ObjectId;

fn id_list(ids: &[ObjectId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Which compatibility bound a file version violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionBound {
    /// The file predates the oldest version this build accepts.
    TooOld { min: u32 },
    /// The file was written by a newer build.
    TooNew { max: u32 },
}

impl std::fmt::Display for VersionBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionBound::TooOld { min } => write!(f, "older than the minimum readable version {min}"),
            VersionBound::TooNew { max } => write!(f, "newer than the current version {max}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not a park file: magic {found:02x?}")]
    MagicMismatch { found: [u8; 4] },

    #[error("incompatible park file version {version}: {bound}")]
    IncompatibleVersion { version: u32, bound: VersionBound },

    #[error("truncated input: need {need} bytes, have {have}")]
    TruncatedInput { need: usize, have: usize },

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("unknown entity type tag {tag}")]
    UnknownEntityType { tag: u8 },

    #[error("migration to version {version} ({gate}) failed: {reason}")]
    MigrationFailed { version: u32, gate: &'static str, reason: String },

    #[error("chunk {chunk:?} declares {declared} bytes but {consumed} were consumed")]
    ChunkLengthMismatch { chunk: ChunkId, declared: usize, consumed: usize },

    #[error("corrupt chunk directory: {0}")]
    CorruptDirectory(String),

    #[error("required chunk {0:?} is missing")]
    MissingChunk(ChunkId),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("string too long: {len} bytes (max {max})")]
    StringTooLong { len: usize, max: usize },

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("state still carries pre-migration data: {0}")]
    UnmigratedState(String),

    #[error("invalid compatibility policy: {0}")]
    InvalidPolicy(String),

    #[error("objects in use cannot be embedded: {}", id_list(.0))]
    UnresolvedObjects(Vec<ObjectId>),

    #[error("load finished with data loss: {0}")]
    DataLoss(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error aborts a load. Only unknown entity records are
    /// recovered from, by skipping them.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::UnknownEntityType { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
