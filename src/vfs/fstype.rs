//! The registrable filesystem type and its mount orchestrator.

use alloc::sync::Arc;

use log::{error, info};

use crate::{
    block::{bread, BlockDevice},
    common::{BdfsError, BdfsRawSuper, BdfsResult},
    pool::InodePool,
    registry::{FsFlags, FsType},
    vfs::{
        dentry::BdfsDentry,
        inode::InodeStore,
        superblock::{BdfsSuperBlock, SuperBlockOps},
    },
    BDFS_FS_NAME, BDFS_MAGIC, BDFS_SUPER_BLOCK, BLOCK_SIZE,
};

/// The bdfs driver: one instance per process, shared pool, pluggable
/// inode store.
pub struct BdfsFsType {
    pool: Arc<InodePool>,
    store: Arc<dyn InodeStore>,
}

impl BdfsFsType {
    pub fn new(pool: Arc<InodePool>, store: Arc<dyn InodeStore>) -> Self {
        Self { pool, store }
    }
}

impl FsType for BdfsFsType {
    fn fs_name(&self) -> &'static str {
        BDFS_FS_NAME
    }

    fn fs_flags(&self) -> FsFlags {
        FsFlags::REQUIRES_DEV
    }

    /// Mount sequence: configure the device block size, read and
    /// decode the volume descriptor, then build the root entry through
    /// the external inode store. Each failing step unwinds everything
    /// acquired before it; the context goes live only at the end.
    fn mount(&self, dev: Arc<dyn BlockDevice>, _flags: u32) -> BdfsResult<Arc<BdfsDentry>> {
        if !dev.set_block_size(BLOCK_SIZE) {
            error!("mount: device rejected block size {}", BLOCK_SIZE);
            return Err(BdfsError::UnsupportedBlockSize);
        }

        // The descriptor is read once; every later metadata access is
        // served from the decoded mirror.
        let sbh = bread(&dev, BDFS_SUPER_BLOCK)?;
        let raw = BdfsRawSuper::decode(sbh.data())?;
        if raw.magic != BDFS_MAGIC {
            error!(
                "mount: bad magic {:#010x} on block {}",
                raw.magic, BDFS_SUPER_BLOCK
            );
            return Err(BdfsError::BadMagic);
        }

        let sb = Arc::new(BdfsSuperBlock::new(
            dev,
            sbh,
            raw,
            self.pool.clone(),
            self.store.clone(),
        ));

        // The store draws its node object from the volume's pool; its
        // error comes back out unchanged.
        let root = self.store.load_inode(&sb, sb.root_ino())?;

        let dentry = BdfsDentry::root(root, sb.clone())?;
        info!(
            "mount: bdfs volume up, {} data blocks, root inode {}",
            sb.nr_dstore_blocks(),
            sb.root_ino()
        );
        Ok(dentry)
    }

    fn kill_sb(&self, sb: Arc<dyn SuperBlockOps>) -> BdfsResult<()> {
        info!("kill_sb: unmounting bdfs volume");
        sb.put_super();
        Ok(())
    }
}
