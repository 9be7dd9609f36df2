use std::ffi::CString;
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

pub struct DiskInfo {
    pub total: u64,
    pub available: u64,
}

impl DiskInfo {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }
}

/// Capacity of the filesystem holding `path`, or `None` if statvfs fails.
pub fn disk_info(path: &Path) -> Option<DiskInfo> {
    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if ret != 0 {
        return None;
    }
    let stat = unsafe { stat.assume_init() };
    let block_size = stat.f_frsize as u64;
    Some(DiskInfo {
        total: stat.f_blocks as u64 * block_size,
        available: stat.f_bavail as u64 * block_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_filesystem_reports_capacity() {
        let info = disk_info(Path::new("/")).expect("statvfs on /");
        assert!(info.total > 0);
        assert!(info.used() <= info.total);
    }

    #[test]
    fn missing_path_reports_none() {
        assert!(disk_info(Path::new("/definitely/not/here")).is_none());
    }
}
