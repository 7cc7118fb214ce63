//! Persisted settings block codec.
//!
//! One fixed-size block holds the whole override layer. The block is always
//! rewritten in full, never patched field by field.
//!
//! Binary format (little-endian):
//! - marker: 1 byte ([`INITIALIZED_MARKER`])
//! - payload length: 2 bytes (u16)
//! - payload CRC-32: 4 bytes (u32, ISO-HDLC)
//! - payload: postcard encoding of `[Option<SettingValue>; FIELD_COUNT]`
//! - padding: `0xFF` up to [`BLOCK_SIZE`]
//!
//! Erased storage reads as `0xFF` and therefore fails the marker check.

use crc::{CRC_32_ISO_HDLC, Crc};
use log::warn;

use super::schema::{FIELD_COUNT, SettingId, SettingInput, SettingValue};
use crate::error::BlockError;

/// Size of the persisted block in bytes.
pub const BLOCK_SIZE: usize = 1024;

/// First byte of an initialized block.
///
/// Bump this when the record layout changes: an old block then reads as
/// uninitialized and the device falls back to factory defaults.
pub const INITIALIZED_MARKER: u8 = 0x5A;

/// Value of erased storage.
pub const ERASED_BYTE: u8 = 0xFF;

const HEADER_LEN: usize = 7;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// The override layer: `Some` for every field that has been set.
pub type Overrides = [Option<SettingValue>; FIELD_COUNT];

/// Raw image of the block.
pub type Block = [u8; BLOCK_SIZE];

/// An override layer with nothing set.
pub fn empty_overrides() -> Overrides {
    core::array::from_fn(|_| None)
}

/// Serialize `overrides` into a full block image.
pub fn encode(overrides: &Overrides, block: &mut Block) -> Result<(), BlockError> {
    block.fill(ERASED_BYTE);

    let (header, body) = block.split_at_mut(HEADER_LEN);
    let payload = postcard::to_slice(overrides, body).map_err(|_| BlockError::Encode)?;
    let len = payload.len();
    let crc = CRC32.checksum(payload);

    header[0] = INITIALIZED_MARKER;
    header[1..3].copy_from_slice(&(len as u16).to_le_bytes());
    header[3..7].copy_from_slice(&crc.to_le_bytes());
    Ok(())
}

/// Parse a block image back into an override layer.
///
/// Every decoded override is re-validated against the schema; entries that
/// no longer validate are dropped rather than surfaced.
pub fn decode(block: &Block) -> Result<Overrides, BlockError> {
    if block[0] != INITIALIZED_MARKER {
        return Err(BlockError::Uninitialized);
    }

    let len = u16::from_le_bytes([block[1], block[2]]) as usize;
    if len > BLOCK_SIZE - HEADER_LEN {
        return Err(BlockError::BadLength(len));
    }
    let expected_crc = u32::from_le_bytes([block[3], block[4], block[5], block[6]]);
    let payload = &block[HEADER_LEN..HEADER_LEN + len];
    if CRC32.checksum(payload) != expected_crc {
        return Err(BlockError::Corrupt);
    }

    let mut overrides: Overrides =
        postcard::from_bytes(payload).map_err(|_| BlockError::Decode)?;

    for id in SettingId::ALL {
        let slot = &mut overrides[id.index()];
        let rejected = slot
            .as_ref()
            .and_then(|value| id.spec().validate(SettingInput::from(value)).err());
        if let Some(err) = rejected {
            warn!("Dropping stored override for {}: {}", id.key(), err);
            *slot = None;
        }
    }

    Ok(overrides)
}
