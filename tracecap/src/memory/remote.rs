//! Cross-address-space reads through `process_vm_readv`
//!
//! The syscall copies through the kernel, so an unmapped or protected source
//! comes back as `EFAULT` instead of a signal in the calling process. That is
//! what makes it usable as the fault-tolerant read for both another process
//! and the caller's own stack.

#![allow(unsafe_code)] // process_vm_readv requires unsafe

use log::debug;

use super::maps::{parse_memory_maps, ranges_cover, readable_ranges, MemoryRange};
use super::safe_read::SafeRead;
use crate::domain::{Pid, ReadFault, TargetError};

/// Memory of another process
///
/// Reads are checked against the readable mappings captured when the reader
/// was opened before the syscall is issued.
#[derive(Debug, Clone)]
pub struct RemoteMemory {
    pid: Pid,
    readable: Vec<MemoryRange>,
}

impl RemoteMemory {
    /// Open the address space of `pid`
    ///
    /// # Errors
    /// Returns an error if `/proc/<pid>/maps` cannot be read.
    pub fn open(pid: Pid) -> Result<Self, TargetError> {
        let regions = parse_memory_maps(pid)?;
        Ok(Self::from_ranges(pid, readable_ranges(&regions)))
    }

    /// Build a reader from an already known set of readable ranges
    #[must_use]
    pub fn from_ranges(pid: Pid, mut readable: Vec<MemoryRange>) -> Self {
        readable.sort();
        Self { pid, readable }
    }
}

impl SafeRead for RemoteMemory {
    fn try_read(&self, addr: usize, buf: &mut [u8]) -> Result<(), ReadFault> {
        let len = buf.len();
        if addr.checked_add(len).is_none() {
            return Err(ReadFault::OutOfRange { addr, len });
        }
        if !ranges_cover(&self.readable, addr, len) {
            return Err(ReadFault::Unmapped { addr, len });
        }
        vm_read(self.pid, addr, buf)
    }
}

/// The calling process's own memory
///
/// Used by the in-process frame walker so that following a corrupt frame
/// pointer yields a [`ReadFault`] rather than a segfault.
#[derive(Debug, Clone, Copy)]
pub struct LocalMemory {
    pid: Pid,
}

impl LocalMemory {
    #[must_use]
    pub fn new() -> Self {
        Self { pid: Pid(std::process::id() as i32) }
    }
}

impl Default for LocalMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl SafeRead for LocalMemory {
    fn try_read(&self, addr: usize, buf: &mut [u8]) -> Result<(), ReadFault> {
        let len = buf.len();
        if addr.checked_add(len).is_none() {
            return Err(ReadFault::OutOfRange { addr, len });
        }
        vm_read(self.pid, addr, buf)
    }
}

#[cfg(target_os = "linux")]
fn vm_read(pid: Pid, addr: usize, buf: &mut [u8]) -> Result<(), ReadFault> {
    let len = buf.len();
    if len == 0 {
        return Ok(());
    }

    let local = libc::iovec { iov_base: buf.as_mut_ptr().cast(), iov_len: len };
    let remote = libc::iovec { iov_base: addr as *mut libc::c_void, iov_len: len };

    // SAFETY: `local` describes `buf`, which we borrow mutably for the call.
    // The remote side is only ever read by the kernel, which validates it.
    let read = unsafe { libc::process_vm_readv(pid.0, &local, 1, &remote, 1, 0) };

    if read < 0 {
        let err = std::io::Error::last_os_error();
        debug!("process_vm_readv({pid}, 0x{addr:x}, {len}) failed: {err}");
        return Err(match err.raw_os_error() {
            Some(libc::EPERM | libc::ESRCH) => ReadFault::Denied { addr },
            _ => ReadFault::Unmapped { addr, len },
        });
    }

    #[allow(clippy::cast_sign_loss)]
    let read = read as usize;
    if read < len {
        return Err(ReadFault::Partial { addr, read, len });
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn vm_read(pid: Pid, addr: usize, _buf: &mut [u8]) -> Result<(), ReadFault> {
    debug!("cross-address-space reads are unavailable on this platform ({pid})");
    Err(ReadFault::Denied { addr })
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn test_local_read_of_own_data() {
        let value: [usize; 2] = [0x1122_3344, 0x5566_7788];
        let memory = LocalMemory::new();

        let mut buf = [0u8; std::mem::size_of::<usize>()];
        let addr = value.as_ptr() as usize;
        memory.try_read(addr + buf.len(), &mut buf).unwrap();
        assert_eq!(usize::from_ne_bytes(buf), 0x5566_7788);
    }

    #[test]
    fn test_local_read_of_null_page_faults_cleanly() {
        let memory = LocalMemory::new();
        let mut buf = [0u8; 8];
        assert!(memory.try_read(0x10, &mut buf).is_err());
    }

    #[test]
    fn test_remote_read_outside_mappings_is_rejected() {
        let memory = RemoteMemory::from_ranges(
            Pid(std::process::id() as i32),
            vec![MemoryRange { start: 0x1000, end: 0x2000 }],
        );
        let mut buf = [0u8; 8];
        let err = memory.try_read(0x3000, &mut buf).unwrap_err();
        assert_eq!(err, ReadFault::Unmapped { addr: 0x3000, len: 8 });
    }

    #[test]
    fn test_remote_open_self() {
        let pid = Pid(std::process::id() as i32);
        let memory = RemoteMemory::open(pid).unwrap();

        let marker: usize = 0xfeed_f00d;
        let mut buf = [0u8; std::mem::size_of::<usize>()];
        memory.try_read(std::ptr::addr_of!(marker) as usize, &mut buf).unwrap();
        assert_eq!(usize::from_ne_bytes(buf), 0xfeed_f00d);
    }
}
