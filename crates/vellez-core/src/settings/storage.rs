//! Persistence medium for the settings block.

use super::block::{BLOCK_SIZE, Block, ERASED_BYTE};

/// A fixed-size byte region that is read and written as a whole.
///
/// Implementations sit on top of EEPROM emulation, a flash sector or a file.
/// No partial update guarantee is assumed: a write either completes or the
/// device resets.
pub trait BlockStorage {
    type Error: core::fmt::Debug;

    /// Read the full block into `block`.
    fn read_block(&mut self, block: &mut Block) -> Result<(), Self::Error>;

    /// Replace the full block with `block`.
    fn write_block(&mut self, block: &Block) -> Result<(), Self::Error>;
}

impl<T: BlockStorage + ?Sized> BlockStorage for &mut T {
    type Error = T::Error;

    fn read_block(&mut self, block: &mut Block) -> Result<(), Self::Error> {
        (**self).read_block(block)
    }

    fn write_block(&mut self, block: &Block) -> Result<(), Self::Error> {
        (**self).write_block(block)
    }
}

/// Failure injected into a [`MemoryStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStorageError;

/// In-memory persistence medium.
///
/// Starts out erased (`0xFF`). Counts writes so tests can check that batched
/// edits cost a single write, and can be told to fail reads or writes.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    block: Block,
    writes: u32,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryStorage {
    /// A freshly erased region.
    pub fn new() -> Self {
        Self {
            block: [ERASED_BYTE; BLOCK_SIZE],
            writes: 0,
            fail_reads: false,
            fail_writes: false,
        }
    }

    /// A region holding a previously captured image.
    pub fn with_image(block: Block) -> Self {
        Self {
            block,
            ..Self::new()
        }
    }

    /// Current contents of the region.
    pub fn image(&self) -> &Block {
        &self.block
    }

    /// Number of successful block writes so far.
    pub fn write_count(&self) -> u32 {
        self.writes
    }

    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Flip bits at `offset` to simulate a corrupted cell.
    pub fn corrupt(&mut self, offset: usize, mask: u8) {
        if let Some(byte) = self.block.get_mut(offset) {
            *byte ^= mask;
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStorage for MemoryStorage {
    type Error = MemoryStorageError;

    fn read_block(&mut self, block: &mut Block) -> Result<(), Self::Error> {
        if self.fail_reads {
            return Err(MemoryStorageError);
        }
        block.copy_from_slice(&self.block);
        Ok(())
    }

    fn write_block(&mut self, block: &Block) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(MemoryStorageError);
        }
        self.block.copy_from_slice(block);
        self.writes += 1;
        Ok(())
    }
}
