//! File-backed settings block.

use std::fs;
use std::io;
use std::path::PathBuf;

use log::{debug, warn};
use vellez_core::settings::{BLOCK_SIZE, Block, BlockStorage};
use vellez_core::settings::block::ERASED_BYTE;

/// Persists the settings block to a single file. A missing file or one of
/// the wrong size reads as erased storage.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BlockStorage for FileStorage {
    type Error = io::Error;

    fn read_block(&mut self, block: &mut Block) -> Result<(), Self::Error> {
        block.fill(ERASED_BYTE);
        match fs::read(&self.path) {
            Ok(bytes) if bytes.len() == BLOCK_SIZE => {
                block.copy_from_slice(&bytes);
                debug!("Read settings block from {}", self.path.display());
                Ok(())
            }
            Ok(bytes) => {
                warn!(
                    "{} is {} bytes, expected {}; treating as erased",
                    self.path.display(),
                    bytes.len(),
                    BLOCK_SIZE
                );
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("{} does not exist yet", self.path.display());
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn write_block(&mut self, block: &Block) -> Result<(), Self::Error> {
        fs::write(&self.path, block)?;
        debug!("Wrote settings block to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("vellez-{}-{}.bin", name, std::process::id()))
    }

    #[test]
    fn missing_file_reads_erased() {
        let mut storage = FileStorage::new(temp_path("missing"));
        let mut block = [0u8; BLOCK_SIZE];
        storage.read_block(&mut block).unwrap();
        assert!(block.iter().all(|b| *b == ERASED_BYTE));
    }

    #[test]
    fn write_then_read() {
        let path = temp_path("roundtrip");
        let mut storage = FileStorage::new(&path);
        let mut written = [0xFFu8; BLOCK_SIZE];
        written[..4].copy_from_slice(&[0x5A, 1, 2, 3]);
        storage.write_block(&written).unwrap();

        let mut read = [0u8; BLOCK_SIZE];
        storage.read_block(&mut read).unwrap();
        assert_eq!(read, written);
        fs::remove_file(path).unwrap();
    }
}
