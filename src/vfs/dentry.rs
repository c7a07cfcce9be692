//! Root directory entry.

use alloc::{string::String, sync::Arc};
use core::fmt;

use crate::{
    common::{BdfsError, BdfsResult},
    pool::VnodeHandle,
    vfs::superblock::BdfsSuperBlock,
};

/// Attachment point of a mounted volume.
pub struct BdfsDentry {
    name: String,
    inode: VnodeHandle,
    sb: Arc<BdfsSuperBlock>,
}

impl BdfsDentry {
    /// Build the root entry over the root node.
    ///
    /// A node whose destruction is already requested cannot anchor a
    /// mount.
    pub fn root(inode: VnodeHandle, sb: Arc<BdfsSuperBlock>) -> BdfsResult<Arc<Self>> {
        if inode.is_doomed() {
            return Err(BdfsError::NoMemory);
        }
        Ok(Arc::new(Self {
            name: String::from("/"),
            inode,
            sb,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inode(&self) -> &VnodeHandle {
        &self.inode
    }

    pub fn super_block(&self) -> Arc<BdfsSuperBlock> {
        self.sb.clone()
    }
}

impl fmt::Debug for BdfsDentry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BdfsDentry")
            .field("name", &self.name)
            .field("ino", &self.inode.vnode().ino())
            .finish()
    }
}
