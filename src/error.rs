//! Errors raised while pulling objects out of exposed Git metadata.

use thiserror::Error;

use crate::objects::Kind;

pub type Result<T, E = GitError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum GitError {
    /// The server answered anything other than 200 for a required resource.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("too many Git URLs requested for this resolution: {count}, aborting")]
    TooManyRequests { count: usize },

    #[error("request for '{url}' failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid URL {0}")]
    InvalidUrl(String),

    #[error("'{0}' is not a valid object hash")]
    InvalidHash(String),

    #[error("the loose object is not of type '{expected}': '{found}'")]
    UnexpectedType { expected: Kind, found: String },

    #[error("malformed loose object: {0}")]
    MalformedObject(String),

    #[error("the pack info file is not valid: {0}")]
    InvalidPackInfo(String),

    #[error("the pack file header does not appear to be valid")]
    InvalidPackSignature,

    #[error("pack file version {0} is not supported (only 2, 3 and 4 are)")]
    UnsupportedPackVersion(u32),

    #[error("the pack index header does not appear to be valid for index version 2 or 3")]
    InvalidIndexSignature,

    #[error("index version {0} is not supported")]
    UnsupportedIndexVersion(u32),

    #[error("pack index version {index} is incompatible with pack file version {pack}")]
    IncompatibleIndexVersion { index: u32, pack: u32 },

    #[error("the entry count ({index}) from the pack index does not match the entry count ({pack}) from the pack file")]
    IndexPackMismatch { index: u32, pack: u32 },

    #[error("object {0} is not present in the pack")]
    ObjectNotInPack(String),

    #[error("offset {offset} is not feasible for a pack file with length {len}")]
    InvalidOffset { offset: u64, len: usize },

    #[error("the number of entry size bytes exceeds 4: data corruption or parse error")]
    CorruptSizeEncoding,

    #[error("invalid packed object type {0}: reserved")]
    ReservedObjectType(u8),

    #[error("packed objects of type 'delta with base object id' are not supported")]
    UnsupportedDeltaEncoding,

    #[error("the delta base is {actual} bytes, but the delta expects {expected}")]
    DeltaBaseLengthMismatch { expected: u64, actual: usize },

    #[error("the delta produced {actual} bytes, but declared {expected}")]
    DeltaResultLengthMismatch { expected: u64, actual: usize },

    #[error("pack version 2 copy direction switching (copy from result) is not supported")]
    UnsupportedCopyDirection,

    #[error("corrupt delta data: {0}")]
    CorruptDelta(String),

    #[error("delta chain is deeper than {max}")]
    DeltaChainTooDeep { max: usize },

    #[error("the entry inflated to {actual} bytes, but its header declared {expected}")]
    InflatedSizeMismatch { expected: u64, actual: usize },

    #[error("the index file signature is not 'DIRC'")]
    InvalidIndexFileSignature,

    #[error("index entry {entry} has an invalid extended flag for index version {version}")]
    InvalidExtendedFlag { entry: u32, version: u32 },

    #[error("corrupt index file: {0}")]
    CorruptIndex(String),

    #[error("unexpected end of data while reading {0}")]
    Truncated(&'static str),

    #[error("inflate failed: {0}")]
    Inflate(#[from] std::io::Error),
}

impl GitError {
    /// Only a missing resource justifies trying another storage format.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GitError::NotFound(_))
    }
}
