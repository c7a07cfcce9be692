//! Process-wide filesystem-type registry.

use alloc::{collections::BTreeMap, sync::Arc};

use bitflags::bitflags;
use log::{debug, error};
use spin::Mutex;

use crate::{
    block::BlockDevice,
    common::{BdfsError, BdfsResult},
    vfs::{BdfsDentry, SuperBlockOps},
};

bitflags! {
    /// Properties a filesystem type declares at registration.
    pub struct FsFlags: u32 {
        /// Every instance needs a backing block device.
        const REQUIRES_DEV = 0b0001;
    }
}

/// One registrable filesystem driver.
pub trait FsType: Send + Sync {
    /// Name the type registers under.
    fn fs_name(&self) -> &'static str;

    /// Registration-time properties.
    fn fs_flags(&self) -> FsFlags;

    /// Mount a volume: produce its root directory entry or a typed
    /// failure, leaving nothing half-acquired behind.
    fn mount(&self, dev: Arc<dyn BlockDevice>, flags: u32) -> BdfsResult<Arc<BdfsDentry>>;

    /// Release a volume's live state.
    fn kill_sb(&self, sb: Arc<dyn SuperBlockOps>) -> BdfsResult<()>;
}

static FILESYSTEMS: Mutex<BTreeMap<&'static str, Arc<dyn FsType>>> =
    Mutex::new(BTreeMap::new());

/// Register a filesystem type. Duplicate names are refused.
pub fn register_filesystem(fs: Arc<dyn FsType>) -> BdfsResult<()> {
    let name = fs.fs_name();
    let mut table = FILESYSTEMS.lock();
    if table.contains_key(name) {
        error!("register_filesystem: {} already registered", name);
        return Err(BdfsError::Registration);
    }
    debug!("register_filesystem: {}", name);
    table.insert(name, fs);
    Ok(())
}

/// Remove a filesystem type. An unknown name is an error so a failed
/// unload stays visible instead of silently leaking driver state.
pub fn unregister_filesystem(name: &str) -> BdfsResult<()> {
    let mut table = FILESYSTEMS.lock();
    if table.remove(name).is_none() {
        error!("unregister_filesystem: {} is not registered", name);
        return Err(BdfsError::Registration);
    }
    debug!("unregister_filesystem: {}", name);
    Ok(())
}

/// Look a registered type up by name, the way a mount request does.
pub fn find_filesystem(name: &str) -> Option<Arc<dyn FsType>> {
    FILESYSTEMS.lock().get(name).cloned()
}
