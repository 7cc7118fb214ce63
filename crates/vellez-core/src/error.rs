//! Error types shared across the core crate.

use thiserror_no_std::Error;

/// Errors produced while encoding or decoding the persisted settings block.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockError {
    /// The block does not start with the initialized marker (erased or foreign data).
    #[error("settings block is not initialized")]
    Uninitialized,
    /// The payload length field points outside of the block.
    #[error("settings block payload length {0} is invalid")]
    BadLength(usize),
    /// The payload checksum does not match.
    #[error("settings block checksum mismatch")]
    Corrupt,
    /// The override layer does not fit into the block.
    #[error("settings block encode failed")]
    Encode,
    /// The payload could not be decoded into an override layer.
    #[error("settings block decode failed")]
    Decode,
}

/// Errors reported by the settings store.
///
/// Validation errors leave the store untouched. Persistence errors leave the
/// in-memory state intact and the store dirty.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    #[error("unknown setting key")]
    UnknownKey,
    #[error("value has the wrong type for {key}")]
    TypeMismatch { key: &'static str },
    #[error("value {value} outside {min}..={max} for {key}")]
    OutOfRange {
        key: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    #[error("text of {len} bytes does not fit {key} (capacity {capacity} incl. terminator)")]
    TooLong {
        key: &'static str,
        len: usize,
        capacity: usize,
    },
    #[error("text for {key} contains a NUL byte")]
    EmbeddedNul { key: &'static str },
    #[error("could not parse value for {key}")]
    Parse { key: &'static str },
    #[error("settings block: {0}")]
    Block(BlockError),
    #[error("storage medium failure")]
    Storage,
}

impl From<BlockError> for SettingsError {
    fn from(err: BlockError) -> Self {
        SettingsError::Block(err)
    }
}
