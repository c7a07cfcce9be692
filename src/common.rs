//! Shared plain types: the error taxonomy, the statfs record and the
//! decoded volume descriptor.

use onlyerror::Error;

/// Crate-wide result alias.
pub type BdfsResult<T> = Result<T, BdfsError>;

/// Everything the mount and lifecycle core can fail with.
///
/// `Io` is also what the external inode store reports for a failed
/// load or write-back; mount propagates store errors unchanged.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BdfsError {
    /// Memory or pool-slot exhaustion.
    #[error("out of memory")]
    NoMemory,
    /// The device cannot honor the filesystem block size.
    #[error("device rejected block size")]
    UnsupportedBlockSize,
    /// A block read or a write-back failed.
    #[error("block I/O failure")]
    Io,
    /// The descriptor block does not carry the expected magic.
    #[error("bad volume magic")]
    BadMagic,
    /// The descriptor block is too short to decode.
    #[error("truncated volume descriptor")]
    Corrupted,
    /// Filesystem type registration or unregistration failed.
    #[error("filesystem registration failure")]
    Registration,
}

/// Decoded copy of the on-disk volume descriptor.
///
/// Read once at mount from the descriptor block; every later metadata
/// query is served from this mirror, never from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BdfsRawSuper {
    pub magic: u32,
    pub nr_dstore_blocks: u32,
    pub root_ino: u64,
}

impl BdfsRawSuper {
    /// Bytes the descriptor occupies at the front of its block.
    pub const DISK_LEN: usize = 16;

    /// Carve the descriptor out of a block image.
    pub fn decode(block: &[u8]) -> BdfsResult<Self> {
        if block.len() < Self::DISK_LEN {
            return Err(BdfsError::Corrupted);
        }
        Ok(Self {
            magic: crate::u32!(&block[0..4]),
            nr_dstore_blocks: crate::u32!(&block[4..8]),
            root_ino: crate::u64!(&block[8..16]),
        })
    }

    /// Write the descriptor into a block image (formatter side).
    pub fn encode_into(&self, block: &mut [u8]) -> BdfsResult<()> {
        if block.len() < Self::DISK_LEN {
            return Err(BdfsError::Corrupted);
        }
        block[0..4].copy_from_slice(&self.magic.to_be_bytes());
        block[4..8].copy_from_slice(&self.nr_dstore_blocks.to_be_bytes());
        block[8..16].copy_from_slice(&self.root_ino.to_be_bytes());
        Ok(())
    }
}

/// Generic volume usage figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BdfsFsStat {
    pub f_type: u32,
    pub f_bsize: u32,
    pub f_blocks: u64,
    pub f_bfree: u64,
    pub f_bavail: u64,
    pub f_files: u64,
    pub f_ffree: u64,
    pub f_namemax: u32,
}
