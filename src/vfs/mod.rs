//! Filesystem-facing layer: the mount orchestrator, the per-volume
//! mount context with its capability interface, node objects and the
//! root directory entry.

mod dentry;
mod fstype;
mod inode;
mod superblock;

pub use dentry::BdfsDentry;
pub use fstype::BdfsFsType;
pub use inode::{BdfsInodeInfo, InodeStore, Vnode, VnodeState, BDFS_N_BLOCKS};
pub use superblock::{BdfsSuperBlock, SuperBlockOps};
