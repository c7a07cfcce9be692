//! Recycling allocator for in-memory node objects.
//!
//! Node objects are created and destroyed at high frequency as files
//! are opened and closed, so slots are carved from backing memory once
//! and then recycled through a free list. Destruction is deferred:
//! `request_destroy` only queues the slot, and it goes back on the
//! free list after the last outstanding handle is gone.

use alloc::{sync::Arc, vec::Vec};
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::{debug, info};
use spin::Mutex;

use crate::{
    common::{BdfsError, BdfsResult},
    vfs::{BdfsInodeInfo, Vnode},
};

/// One pool slot: the generic node record and the filesystem-private
/// extension, joined by the record's identity.
pub(crate) struct PoolSlot {
    vnode: Vnode,
    info: BdfsInodeInfo,
    doomed: AtomicBool,
}

impl PoolSlot {
    /// Runs exactly once, when the slot is first carved.
    fn carve(id: u64) -> Self {
        Self {
            vnode: Vnode::new(id),
            info: BdfsInodeInfo::new(id),
            doomed: AtomicBool::new(false),
        }
    }

    /// Restore the generic record to its freshly-constructed state for
    /// the next user. Private extension fields are left as they are.
    fn reset(&self) {
        self.vnode.reset();
        self.doomed.store(false, Ordering::Release);
    }
}

/// Cloneable reference to a pooled node object.
///
/// A handle obtained before a destroy request stays dereferenceable;
/// the slot is not recycled while any handle survives.
pub struct VnodeHandle {
    slot: Arc<PoolSlot>,
}

impl Clone for VnodeHandle {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl VnodeHandle {
    /// The generic node record.
    pub fn vnode(&self) -> &Vnode {
        &self.slot.vnode
    }

    /// The filesystem-private extension record.
    pub fn info(&self) -> &BdfsInodeInfo {
        &self.slot.info
    }

    /// Destruction has been requested; the object is on its way out.
    pub fn is_doomed(&self) -> bool {
        self.slot.doomed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for VnodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VnodeHandle")
            .field("slot", &self.slot.vnode.id())
            .field("ino", &self.slot.vnode.ino())
            .field("doomed", &self.is_doomed())
            .finish()
    }
}

/// Process-wide recycling allocator for node objects.
///
/// `alloc` and `request_destroy` are safe to call concurrently from
/// any number of threads without external locking.
pub struct InodePool {
    free: Mutex<Vec<Arc<PoolSlot>>>,
    /// Destroy requested, waiting for the last handle to go away.
    pending: Mutex<Vec<Arc<PoolSlot>>>,
    capacity: usize,
    carved: AtomicUsize,
    reclaimed: AtomicUsize,
}

impl InodePool {
    /// Create a pool with a fixed slot budget.
    pub fn with_capacity(capacity: usize) -> BdfsResult<Arc<Self>> {
        if capacity == 0 {
            return Err(BdfsError::NoMemory);
        }
        info!("inode pool: {} slots", capacity);
        Ok(Arc::new(Self {
            free: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            capacity,
            carved: AtomicUsize::new(0),
            reclaimed: AtomicUsize::new(0),
        }))
    }

    /// Hand out a recycled or freshly carved node object.
    ///
    /// The generic record is in its freshly-constructed state. The
    /// private extension keeps whatever its previous user left and
    /// must be set before first use.
    pub fn alloc(&self) -> BdfsResult<VnodeHandle> {
        self.drain();
        if let Some(slot) = self.free.lock().pop() {
            return Ok(VnodeHandle { slot });
        }
        let id = self
            .carved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then(|| n + 1)
            })
            .map_err(|_| BdfsError::NoMemory)?;
        Ok(VnodeHandle {
            slot: Arc::new(PoolSlot::carve(id as u64)),
        })
    }

    /// Ask for the object to be destroyed.
    ///
    /// Asynchronous: the call only queues the slot, and the caller
    /// must not assume the object is gone when it returns. Holders of
    /// handles cloned earlier keep reading safely; the slot is
    /// recycled by a later [`InodePool::drain`] once the last handle
    /// is gone.
    pub fn request_destroy(&self, node: VnodeHandle) {
        if node.slot.doomed.swap(true, Ordering::AcqRel) {
            // Already queued through another handle.
            return;
        }
        debug!(
            "inode pool: slot {} queued for destruction",
            node.slot.vnode.id()
        );
        self.pending.lock().push(node.slot.clone());
    }

    /// One reclamation pass: every queued slot with no outstanding
    /// handle is reset and put back on the free list. Returns how many
    /// slots were recycled.
    pub fn drain(&self) -> usize {
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return 0;
        }
        let mut still_referenced = Vec::new();
        let mut recycled = 0;
        while let Some(slot) = pending.pop() {
            if Arc::strong_count(&slot) == 1 {
                slot.reset();
                self.free.lock().push(slot);
                recycled += 1;
            } else {
                still_referenced.push(slot);
            }
        }
        *pending = still_referenced;
        self.reclaimed.fetch_add(recycled, Ordering::Relaxed);
        recycled
    }

    /// Grace-period barrier: block until every requested destruction
    /// has completed.
    pub fn sync_barrier(&self) {
        loop {
            self.drain();
            if self.pending.lock().is_empty() {
                return;
            }
            core::hint::spin_loop();
        }
    }

    /// Barrier, then release the pool's cached slots.
    pub fn teardown(&self) {
        self.sync_barrier();
        let cached = {
            let mut free = self.free.lock();
            let n = free.len();
            free.clear();
            n
        };
        info!("inode pool: torn down, {} cached slots released", cached);
    }

    /// Slots recycled so far.
    pub fn reclaimed(&self) -> usize {
        self.reclaimed.load(Ordering::Relaxed)
    }

    /// Destructions requested but not yet completed.
    pub fn outstanding(&self) -> usize {
        self.pending.lock().len()
    }

    /// Slots carved from backing memory so far.
    pub fn carved(&self) -> usize {
        self.carved.load(Ordering::Acquire)
    }

    /// Recycled slots ready for reuse.
    pub fn free_slots(&self) -> usize {
        self.free.lock().len()
    }
}
