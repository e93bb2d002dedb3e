//! File reading strategy selection (`spec.md` §4.1.1). `armake2::io` is the
//! model for "a grab-bag of small I/O helpers behind a couple of enums"
//! (its `Input`/`Output`); this module is that shape applied to the one
//! decision the spec requires here: how to get a file's bytes into memory.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{HunterError, Result};

/// Selected once per session (§4.1.1), then dispatched as a plain branch —
/// the design note calling out "no virtual call overhead in the hot
/// scanner" rules out a `Box<dyn Strategy>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadStrategy {
    /// `mmap` the file read-only.
    Mmap,
    /// Read the whole file into a `Vec<u8>` in one call.
    Normal,
    /// Read in bounded chunks with the handle closed immediately after,
    /// for environments with a small open-fd budget.
    FdSafe,
}

/// Bounded chunk size used by `ReadStrategy::FdSafe`.
const FD_SAFE_CHUNK: usize = 64 * 1024;

impl ReadStrategy {
    /// Pick a strategy for `working_tree`, honoring the three possible
    /// overrides before falling back to the open-fd-limit / filesystem-type
    /// heuristic of §4.1.1's table.
    pub fn select(
        working_tree: &Path,
        force_no_mmap: bool,
        force_fd_safe: bool,
        force_normal: bool,
    ) -> ReadStrategy {
        if force_fd_safe {
            return ReadStrategy::FdSafe;
        }
        if force_no_mmap || force_normal {
            return ReadStrategy::Normal;
        }

        if open_fd_limit() < 100 {
            return ReadStrategy::FdSafe;
        }

        if !supports_mmap(working_tree) {
            return ReadStrategy::Normal;
        }

        ReadStrategy::Mmap
    }

    /// Read `path`'s bytes under this strategy, truncating to
    /// `max_read_size` if it is non-zero. Returns the bytes and whether
    /// truncation occurred (`was_truncated`, §4.1.1).
    pub fn read(self, path: &Path, max_read_size: usize) -> Result<(Vec<u8>, bool)> {
        let file = File::open(path).map_err(|e| HunterError::FileMissing {
            path: path.to_path_buf(),
            source: Some(e),
        })?;

        let len = file
            .metadata()
            .map_err(|e| HunterError::FileMissing {
                path: path.to_path_buf(),
                source: Some(e),
            })?
            .len() as usize;

        // Mapping a zero-byte file is an error on some platforms (§4.1.1);
        // treat empty files identically under every strategy.
        if len == 0 {
            return Ok((Vec::new(), false));
        }

        let cap = if max_read_size == 0 { len } else { max_read_size.min(len) };
        let was_truncated = max_read_size != 0 && max_read_size < len;

        let bytes = match self {
            ReadStrategy::Mmap => {
                // Safety: the mapping is read-only and dropped before this
                // function returns (we copy out of it); no other strategy
                // shares the file handle.
                let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| HunterError::FileMissing {
                    path: path.to_path_buf(),
                    source: Some(e),
                })?;
                mmap[..cap].to_vec()
            }
            ReadStrategy::Normal => {
                let mut buf = Vec::with_capacity(cap);
                (&file).take(cap as u64).read_to_end(&mut buf).map_err(|e| HunterError::FileMissing {
                    path: path.to_path_buf(),
                    source: Some(e),
                })?;
                buf
            }
            ReadStrategy::FdSafe => {
                let mut buf = Vec::with_capacity(cap);
                let mut remaining = cap;
                let mut reader = file;
                let mut chunk = [0u8; FD_SAFE_CHUNK];
                while remaining > 0 {
                    let want = remaining.min(FD_SAFE_CHUNK);
                    let n = reader.read(&mut chunk[..want]).map_err(|e| HunterError::FileMissing {
                        path: path.to_path_buf(),
                        source: Some(e),
                    })?;
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    remaining -= n;
                }
                drop(reader);
                buf
            }
        };

        Ok((bytes, was_truncated))
    }
}

#[cfg(unix)]
fn open_fd_limit() -> u64 {
    let mut rlim = libc::rlimit { rlim_cur: 0, rlim_max: 0 };
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rlim) };
    if rc == 0 {
        rlim.rlim_cur as u64
    } else {
        u64::MAX
    }
}

#[cfg(not(unix))]
fn open_fd_limit() -> u64 {
    u64::MAX
}

/// Best-effort local-vs-network filesystem check. Unknown or unsupported
/// platforms are treated as local (so `mmap` stays the default), matching
/// the fd-limit check above in erring toward the faster strategy when
/// unsure.
#[cfg(unix)]
fn supports_mmap(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    // Magic numbers for common network filesystems, from <linux/magic.h>.
    const NFS_SUPER_MAGIC: i64 = 0x6969;
    const SMB_SUPER_MAGIC: i64 = 0x517B;
    const CIFS_MAGIC_NUMBER: i64 = 0xFF534D42u32 as i64;

    let c_path = match CString::new(path.as_os_str().as_bytes()) {
        Ok(c) => c,
        Err(_) => return true,
    };

    unsafe {
        let mut buf: libc::statfs = std::mem::zeroed();
        if libc::statfs(c_path.as_ptr(), &mut buf) != 0 {
            return true;
        }
        let magic = buf.f_type as i64;
        magic != NFS_SUPER_MAGIC && magic != SMB_SUPER_MAGIC && magic != CIFS_MAGIC_NUMBER
    }
}

#[cfg(not(unix))]
fn supports_mmap(_path: &Path) -> bool {
    true
}
