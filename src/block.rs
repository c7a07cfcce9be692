//! Block-device boundary: the device trait the mount path drives and
//! the pinned per-block buffer it hands back.

use alloc::{sync::Arc, vec, vec::Vec};

use log::error;

use crate::{common::BdfsResult, BLOCK_SIZE};

/// One backing block device.
///
/// Reads may block the calling thread for the duration of the I/O.
/// `release_block` is an accounting hook: it fires exactly once per
/// buffer handed out by [`bread`], when that buffer is released.
pub trait BlockDevice: Send + Sync {
    /// Configure the logical block size used by subsequent reads.
    /// Returns false if the device cannot honor it.
    fn set_block_size(&self, size: usize) -> bool;

    /// Copy block `block_id` into `buf`; `buf.len()` is the configured
    /// block size.
    fn read_block(&self, block_id: u64, buf: &mut [u8]) -> BdfsResult<()>;

    /// A buffer for `block_id` went away without write-back.
    fn release_block(&self, _block_id: u64) {}
}

/// Pinned in-memory copy of one block.
///
/// Releasing the handle (explicitly or by drop) returns it to the
/// device without flushing; persisting mutations is the job of
/// separate write-back paths.
pub struct BufferHead {
    block_id: u64,
    data: Vec<u8>,
    dev: Arc<dyn BlockDevice>,
}

/// Read one block into a fresh [`BufferHead`].
pub fn bread(dev: &Arc<dyn BlockDevice>, block_id: u64) -> BdfsResult<BufferHead> {
    let mut data = vec![0u8; BLOCK_SIZE];
    if let Err(err) = dev.read_block(block_id, &mut data) {
        error!("bread: cannot read block {}", block_id);
        return Err(err);
    }
    Ok(BufferHead {
        block_id,
        data,
        dev: dev.clone(),
    })
}

impl BufferHead {
    pub fn block_id(&self) -> u64 {
        self.block_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Explicit release, for call sites where the hand-back should be
    /// visible in the control flow.
    pub fn release(self) {}
}

impl Drop for BufferHead {
    fn drop(&mut self) {
        self.dev.release_block(self.block_id);
    }
}
