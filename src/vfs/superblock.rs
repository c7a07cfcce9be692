//! Per-volume mount context and the capability interface it exposes.

use alloc::sync::Arc;

use log::debug;
use spin::Mutex;

use crate::{
    block::{BlockDevice, BufferHead},
    common::{BdfsFsStat, BdfsRawSuper, BdfsResult},
    pool::{InodePool, VnodeHandle},
    vfs::inode::InodeStore,
    BLOCK_SIZE,
};

/// Capability interface of one mounted volume.
///
/// Every volume holds its own instance, so several filesystem
/// variants can coexist in one process.
pub trait SuperBlockOps: Send + Sync {
    /// Generic usage figures, served from the in-memory mirror.
    fn stat_fs(&self) -> BdfsResult<BdfsFsStat>;

    /// Take a node object from the pool.
    fn alloc_inode(&self) -> BdfsResult<VnodeHandle>;

    /// Hand a node object back; reclamation is deferred.
    fn destroy_inode(&self, node: VnodeHandle);

    /// Push a node record to disk through the external store.
    fn write_inode(&self, node: &VnodeHandle, sync: bool) -> BdfsResult<()>;

    /// Release the volume's resources. Safe to call more than once.
    fn put_super(&self);
}

/// Live state of one mounted volume.
///
/// Owns the pinned descriptor buffer and the decoded mirror. The
/// data-store block count is carried here, per volume, and handed on
/// explicitly; volumes never interfere through shared configuration.
pub struct BdfsSuperBlock {
    /// Backing device.
    dev: Arc<dyn BlockDevice>,
    /// The pinned descriptor buffer; taken out once by `put_super`.
    sbh: Mutex<Option<BufferHead>>,
    /// Decoded volume descriptor.
    raw: BdfsRawSuper,
    /// Data blocks available to this volume.
    nr_dstore_blocks: u32,
    /// Shared node-object pool.
    pool: Arc<InodePool>,
    /// External inode load/write-back collaborator.
    store: Arc<dyn InodeStore>,
}

impl BdfsSuperBlock {
    pub(crate) fn new(
        dev: Arc<dyn BlockDevice>,
        sbh: BufferHead,
        raw: BdfsRawSuper,
        pool: Arc<InodePool>,
        store: Arc<dyn InodeStore>,
    ) -> Self {
        Self {
            dev,
            sbh: Mutex::new(Some(sbh)),
            nr_dstore_blocks: raw.nr_dstore_blocks,
            raw,
            pool,
            store,
        }
    }

    pub fn magic(&self) -> u32 {
        self.raw.magic
    }

    pub fn root_ino(&self) -> u64 {
        self.raw.root_ino
    }

    pub fn nr_dstore_blocks(&self) -> u32 {
        self.nr_dstore_blocks
    }

    pub fn device(&self) -> Arc<dyn BlockDevice> {
        self.dev.clone()
    }

    pub fn pool(&self) -> Arc<InodePool> {
        self.pool.clone()
    }
}

impl SuperBlockOps for BdfsSuperBlock {
    fn stat_fs(&self) -> BdfsResult<BdfsFsStat> {
        Ok(BdfsFsStat {
            f_type: self.raw.magic,
            f_bsize: BLOCK_SIZE as u32,
            f_blocks: self.nr_dstore_blocks as u64,
            f_bfree: 0,
            f_bavail: 0,
            f_files: 0,
            f_ffree: 0,
            f_namemax: 255,
        })
    }

    fn alloc_inode(&self) -> BdfsResult<VnodeHandle> {
        self.pool.alloc()
    }

    fn destroy_inode(&self, node: VnodeHandle) {
        self.pool.request_destroy(node);
    }

    fn write_inode(&self, node: &VnodeHandle, sync: bool) -> BdfsResult<()> {
        self.store.write_inode(self, node, sync)
    }

    fn put_super(&self) {
        // Taking the buffer out makes a second call a no-op.
        if let Some(sbh) = self.sbh.lock().take() {
            debug!("put_super: releasing descriptor buffer {}", sbh.block_id());
            sbh.release();
        }
    }
}
