//! process-wide pools of open shard handles
//!
//! Opening a shard costs a few milliseconds and the working set exceeds a
//! thousand files, so handles are opened once and never evicted; the OS
//! reclaims descriptors at process exit. Open failures are not memoized:
//! a shard that shows up later (NFS hiccup, remount) gets retried.

use std::collections::HashMap;
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::storage::tch::Tch;

static TCH_POOL: Lazy<Pool<Tch>> = Lazy::new(Pool::new);
static BIN_POOL: Lazy<Pool<File>> = Lazy::new(Pool::new);

struct Pool<T> {
    handles: RwLock<HashMap<PathBuf, Arc<T>>>,
}

impl<T> Pool<T> {
    fn new() -> Self {
        Pool {
            handles: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_open(&self, path: &Path, open: impl FnOnce(&Path) -> Result<T>) -> Result<Arc<T>> {
        if let Some(handle) = self.handles.read().get(path) {
            return Ok(Arc::clone(handle));
        }
        let mut handles = self.handles.write();
        // double-checked: another thread may have opened it meanwhile
        if let Some(handle) = handles.get(path) {
            return Ok(Arc::clone(handle));
        }
        let handle = Arc::new(open(path)?);
        handles.insert(path.to_path_buf(), Arc::clone(&handle));
        Ok(handle)
    }
}

/// pooled handle to a `.tch` shard
pub fn tch_handle(path: &Path) -> Result<Arc<Tch>> {
    TCH_POOL.get_or_open(path, Tch::open)
}

/// pooled handle to a `.bin` archive shard
pub fn bin_handle(path: &Path) -> Result<Arc<File>> {
    BIN_POOL.get_or_open(path, |p| File::open(p).map_err(|e| Error::shard(p, e)))
}

/// read one record out of a `.bin` archive
///
/// a stale offset pointing past the end of the archive is reported as
/// absent, not as corruption
pub fn bin_read(path: &Path, offset: u64, length: u64) -> Result<Vec<u8>> {
    let file = bin_handle(path)?;
    let mut buf = vec![0u8; length as usize];
    file.read_exact_at(&mut buf, offset).map_err(|_| {
        Error::not_found("blob record", format!("{}:{}+{}", path.display(), offset, length))
    })?;
    Ok(buf)
}
