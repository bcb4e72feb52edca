//! Attributes of the files going into an archive.

use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::defaults;

/// What the host knows about a file that is appended in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceMetadata {
    pub size: u64,
    pub mode: u32,
    pub uid: u64,
    pub gid: u64,
    /// Owner name; looked up from `uid` when absent.
    pub uname: Option<String>,
    /// Group name; looked up from `gid` when absent.
    pub gname: Option<String>,
    pub mtime: i64,
}

impl SourceMetadata {
    #[cfg(unix)]
    pub fn from_fs(metadata: &fs::Metadata) -> SourceMetadata {
        use std::os::unix::fs::MetadataExt;

        SourceMetadata {
            size: metadata.len(),
            mode: metadata.mode(),
            uid: u64::from(metadata.uid()),
            gid: u64::from(metadata.gid()),
            uname: None,
            gname: None,
            mtime: metadata.mtime(),
        }
    }

    #[cfg(not(unix))]
    pub fn from_fs(metadata: &fs::Metadata) -> SourceMetadata {
        SourceMetadata {
            size: metadata.len(),
            mode: if metadata.permissions().readonly() { 0o444 } else { defaults::MODE },
            mtime: metadata.modified().map(unix_seconds).unwrap_or(0),
            ..SourceMetadata::default()
        }
    }
}

/// Attributes declared for an entry whose content is produced by a stream.
///
/// Anything left out falls back to `mode 0644`, `nobody:nogroup`, no
/// numeric ids and the current time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryAttributes {
    pub mode: Option<u32>,
    pub uid: Option<u64>,
    pub gid: Option<u64>,
    pub uname: Option<String>,
    pub gname: Option<String>,
    pub mtime: Option<i64>,
}

impl EntryAttributes {
    pub fn mode(&self) -> u32 {
        self.mode.unwrap_or(defaults::MODE)
    }

    pub fn uname(&self) -> &str {
        self.uname.as_deref().unwrap_or(defaults::UNAME)
    }

    pub fn gname(&self) -> &str {
        self.gname.as_deref().unwrap_or(defaults::GNAME)
    }

    pub fn mtime(&self) -> i64 {
        self.mtime.unwrap_or_else(|| unix_seconds(SystemTime::now()))
    }
}

fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs() as i64,
        Err(before) => -(before.duration().as_secs() as i64),
    }
}

/// Maps numeric owner and group ids to names.
pub trait OwnerResolver {
    fn user_name(&self, uid: u64) -> Option<String>;
    fn group_name(&self, gid: u64) -> Option<String>;
}

/// Resolves ids through the host's user and group databases, including
/// whatever name services the C library is configured with.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOwnerResolver;

impl OwnerResolver for SystemOwnerResolver {
    fn user_name(&self, uid: u64) -> Option<String> {
        sys::user_name(uid)
    }

    fn group_name(&self, gid: u64) -> Option<String> {
        sys::group_name(gid)
    }
}

#[cfg(unix)]
mod sys {
    use std::convert::TryFrom;
    use std::ffi::CStr;
    use std::mem;
    use std::ptr;

    /// Upper bound for the scratch buffer when the C library keeps asking
    /// for more room.
    const MAX_BUFFER: usize = 1 << 20;

    fn initial_buffer(name: libc::c_int) -> Vec<libc::c_char> {
        let amt = match unsafe { libc::sysconf(name) } {
            n if n < 0 => 1024 as usize,
            n => n as usize,
        };
        Vec::with_capacity(amt)
    }

    pub fn user_name(uid: u64) -> Option<String> {
        let uid = libc::uid_t::try_from(uid).ok()?;
        let mut buf = initial_buffer(libc::_SC_GETPW_R_SIZE_MAX);

        loop {
            let mut passwd: libc::passwd = unsafe { mem::zeroed() };
            let mut result = ptr::null_mut();
            let status = unsafe {
                libc::getpwuid_r(uid, &mut passwd, buf.as_mut_ptr(), buf.capacity(), &mut result)
            };
            match status {
                0 if !result.is_null() => {
                    let name = unsafe { CStr::from_ptr(passwd.pw_name) };
                    return Some(name.to_string_lossy().into_owned());
                }
                libc::ERANGE if buf.capacity() < MAX_BUFFER => buf.reserve(buf.capacity() * 2),
                _ => return None,
            }
        }
    }

    pub fn group_name(gid: u64) -> Option<String> {
        let gid = libc::gid_t::try_from(gid).ok()?;
        let mut buf = initial_buffer(libc::_SC_GETGR_R_SIZE_MAX);

        loop {
            let mut group: libc::group = unsafe { mem::zeroed() };
            let mut result = ptr::null_mut();
            let status = unsafe {
                libc::getgrgid_r(gid, &mut group, buf.as_mut_ptr(), buf.capacity(), &mut result)
            };
            match status {
                0 if !result.is_null() => {
                    let name = unsafe { CStr::from_ptr(group.gr_name) };
                    return Some(name.to_string_lossy().into_owned());
                }
                libc::ERANGE if buf.capacity() < MAX_BUFFER => buf.reserve(buf.capacity() * 2),
                _ => return None,
            }
        }
    }
}

#[cfg(not(unix))]
mod sys {
    pub fn user_name(_uid: u64) -> Option<String> {
        None
    }

    pub fn group_name(_gid: u64) -> Option<String> {
        None
    }
}
