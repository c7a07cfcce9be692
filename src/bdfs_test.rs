#[cfg(test)]
mod tests {
    use alloc::{sync::Arc, vec, vec::Vec};
    use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use spin::Mutex;

    use crate::vfs::{
        BdfsFsType, BdfsSuperBlock, InodeStore, SuperBlockOps, VnodeState, BDFS_N_BLOCKS,
    };
    use crate::{
        clone_pool, exit_bdfs, find_filesystem, init_bdfs, register_filesystem, BdfsError,
        FsType,
        BdfsRawSuper, BdfsResult, BlockDevice, FsFlags, InodePool, VnodeHandle, BDFS_FS_NAME,
        BDFS_MAGIC, BDFS_ROOT_INO, BLOCK_SIZE,
    };

    /// In-memory block device with instrumented counters.
    struct RamDisk {
        data: Mutex<Vec<u8>>,
        reads: AtomicUsize,
        releases: AtomicUsize,
        fail_reads: AtomicBool,
        reject_block_size: AtomicBool,
    }

    impl RamDisk {
        fn new(nr_blocks: usize) -> Arc<Self> {
            Arc::new(Self {
                data: Mutex::new(vec![0u8; nr_blocks * BLOCK_SIZE]),
                reads: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
                fail_reads: AtomicBool::new(false),
                reject_block_size: AtomicBool::new(false),
            })
        }

        /// Formatter side: write a descriptor into block 0.
        fn format(&self, nr_dstore_blocks: u32, root_ino: u64) {
            let raw = BdfsRawSuper {
                magic: BDFS_MAGIC,
                nr_dstore_blocks,
                root_ino,
            };
            let mut data = self.data.lock();
            raw.encode_into(&mut data[..BLOCK_SIZE]).unwrap();
        }

        fn corrupt_magic(&self) {
            let mut data = self.data.lock();
            data[0..4].copy_from_slice(&0xDEAD_BEEFu32.to_be_bytes());
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }

        fn releases(&self) -> usize {
            self.releases.load(Ordering::SeqCst)
        }
    }

    impl BlockDevice for RamDisk {
        fn set_block_size(&self, size: usize) -> bool {
            !self.reject_block_size.load(Ordering::SeqCst) && size == BLOCK_SIZE
        }

        fn read_block(&self, block_id: u64, buf: &mut [u8]) -> BdfsResult<()> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(BdfsError::Io);
            }
            let data = self.data.lock();
            let start = block_id as usize * BLOCK_SIZE;
            if start + buf.len() > data.len() {
                return Err(BdfsError::Io);
            }
            buf.copy_from_slice(&data[start..start + buf.len()]);
            Ok(())
        }

        fn release_block(&self, _block_id: u64) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Inode store that fabricates node records out of the pool.
    struct MockStore {
        fail_loads: AtomicBool,
        written: AtomicUsize,
    }

    impl MockStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fail_loads: AtomicBool::new(false),
                written: AtomicUsize::new(0),
            })
        }
    }

    impl InodeStore for MockStore {
        fn load_inode(&self, sb: &BdfsSuperBlock, ino: u64) -> BdfsResult<VnodeHandle> {
            if self.fail_loads.load(Ordering::SeqCst) {
                return Err(BdfsError::Io);
            }
            let node = sb.pool().alloc()?;
            node.vnode().set_ino(ino);
            node.vnode().set_size(BLOCK_SIZE as u64);
            // A made-up but recognizable block-location list.
            let blocks: Vec<u32> = (0..BDFS_N_BLOCKS as u32)
                .map(|i| ino as u32 * 100 + i)
                .collect();
            node.info().set_blocks(&blocks);
            Ok(node)
        }

        fn write_inode(
            &self,
            _sb: &BdfsSuperBlock,
            node: &VnodeHandle,
            _sync: bool,
        ) -> BdfsResult<()> {
            node.vnode().clear_dirty();
            self.written.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fresh_fs() -> (Arc<BdfsFsType>, Arc<MockStore>, Arc<InodePool>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let pool = InodePool::with_capacity(64).unwrap();
        let store = MockStore::new();
        let fs = Arc::new(BdfsFsType::new(pool.clone(), store.clone()));
        (fs, store, pool)
    }

    #[test]
    fn mount_end_to_end() {
        let (fs, _store, _pool) = fresh_fs();
        let disk = RamDisk::new(8);
        disk.format(1024, BDFS_ROOT_INO);

        let dentry = fs.mount(disk.clone(), 0).expect("mount failed");
        let sb = dentry.super_block();

        assert_eq!(sb.magic(), BDFS_MAGIC);
        assert_eq!(sb.nr_dstore_blocks(), 1024);
        assert_eq!(sb.root_ino(), BDFS_ROOT_INO);
        assert_eq!(dentry.name(), "/");
        assert_eq!(dentry.inode().vnode().ino(), BDFS_ROOT_INO);

        // The private extension carries what the loader produced.
        let blocks = dentry.inode().info().blocks();
        assert_eq!(blocks[0], BDFS_ROOT_INO as u32 * 100);
        assert_eq!(
            blocks[BDFS_N_BLOCKS - 1],
            BDFS_ROOT_INO as u32 * 100 + BDFS_N_BLOCKS as u32 - 1
        );
        // Extension and generic record are joined by the slot identity.
        assert_eq!(
            dentry.inode().info().vnode_id(),
            dentry.inode().vnode().id()
        );

        // The descriptor was read exactly once and is still pinned.
        assert_eq!(disk.reads(), 1);
        assert_eq!(disk.releases(), 0);
    }

    #[test]
    fn statfs_served_from_mirror() {
        let (fs, _store, _pool) = fresh_fs();
        let disk = RamDisk::new(4);
        disk.format(1024, BDFS_ROOT_INO);

        let dentry = fs.mount(disk.clone(), 0).unwrap();
        let stat = dentry.super_block().stat_fs().unwrap();
        assert_eq!(stat.f_type, BDFS_MAGIC);
        assert_eq!(stat.f_bsize as usize, BLOCK_SIZE);
        assert_eq!(stat.f_blocks, 1024);
        assert_eq!(stat.f_namemax, 255);
        // Statting again must not touch the device.
        assert_eq!(disk.reads(), 1);
    }

    #[test]
    fn mount_rejects_bad_magic() {
        let (fs, _store, _pool) = fresh_fs();
        let disk = RamDisk::new(4);
        disk.format(16, BDFS_ROOT_INO);
        disk.corrupt_magic();

        let err = fs.mount(disk.clone(), 0).unwrap_err();
        assert_eq!(err, BdfsError::BadMagic);
        // The descriptor buffer was given back and nothing else holds
        // the device.
        assert_eq!(disk.releases(), 1);
        assert_eq!(Arc::strong_count(&disk), 1);
    }

    #[test]
    fn mount_read_failure_leaves_nothing_held() {
        let (fs, _store, _pool) = fresh_fs();
        let disk = RamDisk::new(4);
        disk.format(16, BDFS_ROOT_INO);
        disk.fail_reads.store(true, Ordering::SeqCst);

        let err = fs.mount(disk.clone(), 0).unwrap_err();
        assert_eq!(err, BdfsError::Io);
        assert_eq!(disk.reads(), 1);
        // No buffer ever existed, so none was released or leaked.
        assert_eq!(disk.releases(), 0);
        assert_eq!(Arc::strong_count(&disk), 1);
    }

    #[test]
    fn block_size_rejection_precedes_any_read() {
        let (fs, _store, _pool) = fresh_fs();
        let disk = RamDisk::new(4);
        disk.format(16, BDFS_ROOT_INO);
        disk.reject_block_size.store(true, Ordering::SeqCst);

        let err = fs.mount(disk.clone(), 0).unwrap_err();
        assert_eq!(err, BdfsError::UnsupportedBlockSize);
        assert_eq!(disk.reads(), 0);
        assert_eq!(disk.releases(), 0);
    }

    #[test]
    fn loader_failure_releases_descriptor_buffer() {
        let (fs, store, _pool) = fresh_fs();
        let disk = RamDisk::new(4);
        disk.format(16, BDFS_ROOT_INO);
        store.fail_loads.store(true, Ordering::SeqCst);

        // The store's error comes back unchanged.
        let err = fs.mount(disk.clone(), 0).unwrap_err();
        assert_eq!(err, BdfsError::Io);
        assert_eq!(disk.releases(), 1);
        assert_eq!(Arc::strong_count(&disk), 1);
    }

    #[test]
    fn put_super_is_idempotent() {
        let (fs, _store, _pool) = fresh_fs();
        let disk = RamDisk::new(4);
        disk.format(16, BDFS_ROOT_INO);

        let dentry = fs.mount(disk.clone(), 0).unwrap();
        let sb = dentry.super_block();

        sb.put_super();
        assert_eq!(disk.releases(), 1);
        // A second release request finds no context and does nothing.
        sb.put_super();
        assert_eq!(disk.releases(), 1);
        fs.kill_sb(sb).unwrap();
        assert_eq!(disk.releases(), 1);

        // Dropping the dentry afterwards must not double-release.
        drop(dentry);
        assert_eq!(disk.releases(), 1);
    }

    #[test]
    fn capability_interface_round_trip() {
        let (fs, store, pool) = fresh_fs();
        let disk = RamDisk::new(4);
        disk.format(16, BDFS_ROOT_INO);

        let dentry = fs.mount(disk, 0).unwrap();
        let sb = dentry.super_block();

        let node = sb.alloc_inode().unwrap();
        node.vnode().set_ino(5);
        node.vnode().mark_dirty();
        assert!(node.vnode().state().contains(VnodeState::DIRTY));

        sb.write_inode(&node, false).unwrap();
        assert_eq!(store.written.load(Ordering::SeqCst), 1);
        assert!(!node.vnode().state().contains(VnodeState::DIRTY));

        sb.destroy_inode(node);
        assert_eq!(pool.drain(), 1);
    }

    #[test]
    fn user_window_copies_are_clamped() {
        let (fs, _store, _pool) = fresh_fs();
        let disk = RamDisk::new(4);
        disk.format(16, BDFS_ROOT_INO);

        let dentry = fs.mount(disk, 0).unwrap();
        let info = dentry.inode().info();

        // Round-trip through the only window eligible for raw copies.
        let mut image = vec![0u8; BDFS_N_BLOCKS * 4];
        assert_eq!(info.copy_blocks_to(&mut image), BDFS_N_BLOCKS * 4);
        assert_eq!(info.copy_blocks_from(&image), BDFS_N_BLOCKS * 4);

        // Oversized caller buffers stop at the window edge.
        let mut oversized = vec![0u8; BDFS_N_BLOCKS * 4 + 32];
        assert_eq!(info.copy_blocks_to(&mut oversized), BDFS_N_BLOCKS * 4);
        assert_eq!(info.copy_blocks_from(&oversized), BDFS_N_BLOCKS * 4);

        // Short buffers copy only what fits.
        let mut short = [0u8; 6];
        assert_eq!(info.copy_blocks_to(&mut short), 4);
    }

    #[test]
    fn descriptor_decode_rejects_short_blocks() {
        let raw = BdfsRawSuper {
            magic: BDFS_MAGIC,
            nr_dstore_blocks: 7,
            root_ino: BDFS_ROOT_INO,
        };
        let mut image = vec![0u8; BLOCK_SIZE];
        raw.encode_into(&mut image).unwrap();
        assert_eq!(BdfsRawSuper::decode(&image).unwrap(), raw);

        assert_eq!(
            BdfsRawSuper::decode(&image[..8]).unwrap_err(),
            BdfsError::Corrupted
        );
        let mut tiny = [0u8; 8];
        assert_eq!(
            raw.encode_into(&mut tiny).unwrap_err(),
            BdfsError::Corrupted
        );
    }

    /// Registry and pool singleton are process-wide, so the whole
    /// load/mount/unmount/unload walk lives in one test.
    #[test]
    fn driver_lifecycle() {
        let _ = env_logger::builder().is_test(true).try_init();
        let store = MockStore::new();
        init_bdfs(store).unwrap();
        assert!(clone_pool().is_some());

        let fs = find_filesystem(BDFS_FS_NAME).expect("driver not registered");
        assert!(fs.fs_flags().contains(FsFlags::REQUIRES_DEV));

        // Duplicate registration is refused.
        let (dup, _, _) = fresh_fs();
        assert_eq!(register_filesystem(dup).unwrap_err(), BdfsError::Registration);

        // A second load attempt is refused while the driver is live.
        assert_eq!(
            init_bdfs(MockStore::new()).unwrap_err(),
            BdfsError::Registration
        );

        // Mount through the registry, then unmount.
        let disk = RamDisk::new(4);
        disk.format(16, BDFS_ROOT_INO);
        let dentry = fs.mount(disk.clone(), 0).unwrap();
        fs.kill_sb(dentry.super_block()).unwrap();
        assert_eq!(disk.releases(), 1);
        drop(dentry);

        exit_bdfs().unwrap();
        assert!(find_filesystem(BDFS_FS_NAME).is_none());
        assert!(clone_pool().is_none());

        // Unloading twice is a visible failure, not a silent one.
        assert_eq!(exit_bdfs().unwrap_err(), BdfsError::Registration);
    }
}
