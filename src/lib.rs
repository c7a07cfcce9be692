#![cfg_attr(not(test), no_std)]
extern crate alloc;

mod block;
mod common;
mod pool;
mod registry;
pub mod vfs;

#[cfg(test)]
mod bdfs_test;

use alloc::sync::Arc;

use log::{error, info};
use spin::Mutex;

pub use block::{bread, BlockDevice, BufferHead};
pub use common::{BdfsError, BdfsFsStat, BdfsRawSuper, BdfsResult};
pub use pool::{InodePool, VnodeHandle};
pub use registry::{
    find_filesystem, register_filesystem, unregister_filesystem, FsFlags, FsType,
};

/// Identifies a formatted volume in its descriptor block.
pub const BDFS_MAGIC: u32 = 0xBABE_0001;

/// Block index the volume descriptor lives at.
pub const BDFS_SUPER_BLOCK: u64 = 0;

/// Inode number a formatter assigns to the root directory.
pub const BDFS_ROOT_INO: u64 = 2;

/// Name the driver registers under.
pub const BDFS_FS_NAME: &str = "bdfs";

/// Slot budget of the process-wide inode pool.
pub const BDFS_POOL_SLOTS: usize = 1024;

#[macro_export]
macro_rules! u32 {
    ($x:expr) => {
        u32::from_be_bytes($x.try_into().unwrap())
    };
}

#[macro_export]
macro_rules! u64 {
    ($x:expr) => {
        u64::from_be_bytes($x.try_into().unwrap())
    };
}

#[cfg(feature = "blk512")]
pub const BLOCK_SIZE: usize = 512;

#[cfg(feature = "blk1k")]
pub const BLOCK_SIZE: usize = 1024;

#[cfg(feature = "blk4k")]
pub const BLOCK_SIZE: usize = 4096;

static INODE_POOL: Mutex<Option<Arc<InodePool>>> = Mutex::new(None);

/// Bring the driver up: create the inode pool, then register the
/// filesystem type. A registration failure tears the pool back down
/// before the error is reported.
pub fn init_bdfs(store: Arc<dyn vfs::InodeStore>) -> BdfsResult<()> {
    let pool = InodePool::with_capacity(BDFS_POOL_SLOTS)?;
    {
        let mut global = INODE_POOL.lock();
        if global.is_some() {
            error!("init_bdfs: driver already loaded");
            return Err(BdfsError::Registration);
        }
        *global = Some(pool.clone());
    }

    let fs = Arc::new(vfs::BdfsFsType::new(pool, store));
    if let Err(err) = register_filesystem(fs) {
        error!("init_bdfs: registration failed, destroying inode pool");
        if let Some(pool) = INODE_POOL.lock().take() {
            pool.teardown();
        }
        return Err(err);
    }
    info!("bdfs: driver loaded");
    Ok(())
}

/// Take the driver down: unregister first so no new mount can start,
/// then drain and destroy the pool. An unregistration failure aborts
/// the unload before the pool is touched.
pub fn exit_bdfs() -> BdfsResult<()> {
    unregister_filesystem(BDFS_FS_NAME)?;
    if let Some(pool) = INODE_POOL.lock().take() {
        pool.teardown();
    }
    info!("bdfs: driver unloaded");
    Ok(())
}

/// The pool installed by `init_bdfs`, if the driver is loaded.
pub fn clone_pool() -> Option<Arc<InodePool>> {
    INODE_POOL.lock().clone()
}
