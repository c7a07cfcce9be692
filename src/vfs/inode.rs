//! Node objects: the generic record the runtime layer owns, the
//! filesystem-private extension, and the external load/write-back
//! collaborator.

use bitflags::bitflags;
use spin::Mutex;

use crate::{common::BdfsResult, pool::VnodeHandle, vfs::superblock::BdfsSuperBlock};

/// Direct block pointers kept per node.
pub const BDFS_N_BLOCKS: usize = 15;

bitflags! {
    /// Generic node life-cycle state.
    pub struct VnodeState: u32 {
        /// Freshly constructed, not yet filled from disk.
        const NEW = 0b0001;
        /// In-memory copy differs from disk.
        const DIRTY = 0b0010;
    }
}

/// Generic node record, owned by the surrounding runtime layer.
///
/// `id` is the pool slot identity and never changes. Everything else
/// is put back into this freshly-constructed state each time the slot
/// is recycled.
pub struct Vnode {
    id: u64,
    ino: Mutex<u64>,
    size: Mutex<u64>,
    nlink: Mutex<u32>,
    state: Mutex<VnodeState>,
}

impl Vnode {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            ino: Mutex::new(0),
            size: Mutex::new(0),
            nlink: Mutex::new(1),
            state: Mutex::new(VnodeState::NEW),
        }
    }

    pub(crate) fn reset(&self) {
        *self.ino.lock() = 0;
        *self.size.lock() = 0;
        *self.nlink.lock() = 1;
        *self.state.lock() = VnodeState::NEW;
    }

    /// Slot identity, stable across reuse.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn ino(&self) -> u64 {
        *self.ino.lock()
    }

    pub fn set_ino(&self, ino: u64) {
        *self.ino.lock() = ino;
    }

    pub fn size(&self) -> u64 {
        *self.size.lock()
    }

    pub fn set_size(&self, size: u64) {
        *self.size.lock() = size;
    }

    pub fn nlink(&self) -> u32 {
        *self.nlink.lock()
    }

    pub fn set_nlink(&self, nlink: u32) {
        *self.nlink.lock() = nlink;
    }

    pub fn state(&self) -> VnodeState {
        *self.state.lock()
    }

    pub fn mark_dirty(&self) {
        let mut state = self.state.lock();
        state.remove(VnodeState::NEW);
        state.insert(VnodeState::DIRTY);
    }

    pub fn clear_dirty(&self) {
        self.state.lock().remove(VnodeState::DIRTY);
    }
}

/// Filesystem-private extension of one node.
///
/// Joined to the generic record by `vnode_id` instead of being
/// embedded in it. `i_blocks` is the block-location list; it is the
/// only part of the object exposed for raw copies to and from caller
/// buffers.
pub struct BdfsInodeInfo {
    vnode_id: u64,
    i_blocks: Mutex<[u32; BDFS_N_BLOCKS]>,
    i_subdir_count: Mutex<u16>,
}

impl BdfsInodeInfo {
    pub(crate) fn new(vnode_id: u64) -> Self {
        Self {
            vnode_id,
            i_blocks: Mutex::new([0; BDFS_N_BLOCKS]),
            i_subdir_count: Mutex::new(0),
        }
    }

    /// Identity of the generic record this extension belongs to.
    pub fn vnode_id(&self) -> u64 {
        self.vnode_id
    }

    pub fn blocks(&self) -> [u32; BDFS_N_BLOCKS] {
        *self.i_blocks.lock()
    }

    pub fn set_blocks(&self, blocks: &[u32]) {
        let mut table = self.i_blocks.lock();
        let n = core::cmp::min(blocks.len(), BDFS_N_BLOCKS);
        table[..n].copy_from_slice(&blocks[..n]);
    }

    pub fn subdir_count(&self) -> u16 {
        *self.i_subdir_count.lock()
    }

    pub fn set_subdir_count(&self, n: u16) {
        *self.i_subdir_count.lock() = n;
    }

    /// Copy the block-location list into a caller buffer, clamped to
    /// the window size. Returns the number of bytes written.
    pub fn copy_blocks_to(&self, dst: &mut [u8]) -> usize {
        let table = self.i_blocks.lock();
        let mut written = 0;
        for (chunk, blk) in dst.chunks_exact_mut(4).zip(table.iter()) {
            chunk.copy_from_slice(&blk.to_be_bytes());
            written += 4;
        }
        written
    }

    /// Fill the block-location list from a caller buffer, clamped to
    /// the window size. Returns the number of bytes consumed.
    pub fn copy_blocks_from(&self, src: &[u8]) -> usize {
        let mut table = self.i_blocks.lock();
        let mut consumed = 0;
        for (chunk, blk) in src.chunks_exact(4).zip(table.iter_mut()) {
            *blk = crate::u32!(chunk);
            consumed += 4;
        }
        consumed
    }
}

/// External collaborator that moves node records between the device
/// and memory.
///
/// `load_inode` takes its node object from the volume's pool and fills
/// both records from the on-disk inode; its error comes back out of
/// `mount` unchanged.
pub trait InodeStore: Send + Sync {
    fn load_inode(&self, sb: &BdfsSuperBlock, ino: u64) -> BdfsResult<VnodeHandle>;

    fn write_inode(&self, sb: &BdfsSuperBlock, node: &VnodeHandle, sync: bool) -> BdfsResult<()>;
}
