//! Live capture of a thread in another process
//!
//! The thread is stopped with `ptrace` for as long as the [`LiveTarget`]
//! exists so that its stack does not change under the unwinder, and its
//! registers are read once at attach time. Memory is read with
//! [`RemoteMemory`], so a corrupt chain cannot hurt the tracer.

#![allow(unsafe_code)] // ptrace and waitpid require unsafe

use log::{debug, info};
use tracecap_common::{Registers, WORD_SIZE};

use super::snapshot::StackSnapshot;
use super::{UserSpace, UserTarget};
use crate::domain::{Pid, TargetError, Tid};
use crate::memory::maps::{parse_memory_maps, readable_ranges, MapRegion};
use crate::memory::{RemoteMemory, SafeRead};

/// Largest stack slice copied into a snapshot
const MAX_SNAPSHOT_STACK_BYTES: usize = 1024 * 1024;

/// A stopped thread and the address space it runs in
#[derive(Debug)]
pub struct LiveTarget {
    pid: Pid,
    tid: Tid,
    attached: bool,
    regs: Option<Registers>,
    memory: RemoteMemory,
    regions: Vec<MapRegion>,
}

impl LiveTarget {
    /// Stop thread `tid` of process `pid` and read its registers
    ///
    /// A process without any mappings has no user address space; it is not
    /// attached to and yields a target without one.
    ///
    /// # Errors
    /// Returns an error if the maps cannot be read, the thread cannot be
    /// attached to, or its registers cannot be read.
    pub fn attach(pid: Pid, tid: Tid) -> Result<Self, TargetError> {
        let regions = parse_memory_maps(pid)?;
        let memory = RemoteMemory::from_ranges(pid, readable_ranges(&regions));

        let mut target = Self { pid, tid, attached: false, regs: None, memory, regions };
        if target.regions.is_empty() {
            info!("{pid} has no user mappings, not attaching");
            return Ok(target);
        }

        ptrace::attach(tid)?;
        target.attached = true;
        target.regs = Some(ptrace::registers(tid)?);
        debug!("{tid}: {:?}", target.regs);
        Ok(target)
    }

    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.pid, self.tid)
    }

    /// Capture target borrowing this thread's address space
    #[must_use]
    pub fn user_target(&self) -> UserTarget<&RemoteMemory> {
        match self.regs {
            Some(regs) => UserTarget::new(self.label(), UserSpace::new(regs, &self.memory)),
            None => UserTarget::kernel_thread(self.label()),
        }
    }

    /// Copy the live part of the stack into an offline snapshot
    ///
    /// Copies from the stack pointer to the top of the mapping that contains
    /// it, capped at a fixed size. Without registers the snapshot has no
    /// address space either.
    #[must_use]
    pub fn snapshot(&self) -> StackSnapshot {
        let mut snapshot = StackSnapshot::new(self.label(), self.regs);
        let Some(regs) = self.regs else {
            return snapshot;
        };
        let Some(stack) = self.regions.iter().find(|region| region.range.contains(regs.sp)) else {
            debug!("stack pointer 0x{:x} is not inside any mapping", regs.sp);
            return snapshot;
        };

        let start = regs.sp - regs.sp % WORD_SIZE;
        let len = (stack.range.end - start).min(MAX_SNAPSHOT_STACK_BYTES);
        let mut bytes = vec![0u8; len - len % WORD_SIZE];
        match self.memory.try_read(start, &mut bytes) {
            Ok(()) => {
                let words = bytes
                    .chunks_exact(WORD_SIZE)
                    .map(|chunk| {
                        let mut word = [0u8; WORD_SIZE];
                        word.copy_from_slice(chunk);
                        usize::from_ne_bytes(word)
                    })
                    .collect();
                snapshot.push_words(start, words);
            }
            Err(fault) => debug!("could not copy stack for snapshot: {fault}"),
        }
        snapshot
    }
}

impl Drop for LiveTarget {
    fn drop(&mut self) {
        if self.attached {
            ptrace::detach(self.tid);
        }
    }
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
mod ptrace {
    use log::warn;
    use std::ptr;
    use tracecap_common::Registers;

    use crate::domain::{TargetError, Tid};

    pub fn attach(tid: Tid) -> Result<(), TargetError> {
        // SAFETY: PTRACE_ATTACH takes no pointers
        let ret = unsafe {
            libc::ptrace(
                libc::PTRACE_ATTACH,
                tid.0,
                ptr::null_mut::<libc::c_void>(),
                ptr::null_mut::<libc::c_void>(),
            )
        };
        if ret < 0 {
            return Err(TargetError::AttachFailed { tid, source: std::io::Error::last_os_error() });
        }

        let mut status = 0;
        // SAFETY: status is a valid out pointer for the call
        let waited = unsafe { libc::waitpid(tid.0, &mut status, libc::__WALL) };
        if waited < 0 {
            let source = std::io::Error::last_os_error();
            detach(tid);
            return Err(TargetError::AttachFailed { tid, source });
        }
        Ok(())
    }

    pub fn registers(tid: Tid) -> Result<Registers, TargetError> {
        // SAFETY: user_regs_struct is plain integers, all-zero is valid
        let mut regs: libc::user_regs_struct = unsafe { std::mem::zeroed() };
        // SAFETY: the kernel writes a user_regs_struct through the data pointer
        let ret = unsafe {
            libc::ptrace(
                libc::PTRACE_GETREGS,
                tid.0,
                ptr::null_mut::<libc::c_void>(),
                ptr::addr_of_mut!(regs).cast::<libc::c_void>(),
            )
        };
        if ret < 0 {
            return Err(TargetError::RegistersUnavailable {
                tid,
                source: std::io::Error::last_os_error(),
            });
        }

        Ok(Registers { ip: regs.rip as usize, sp: regs.rsp as usize, bp: regs.rbp as usize })
    }

    pub fn detach(tid: Tid) {
        // SAFETY: PTRACE_DETACH takes no pointers
        let ret = unsafe {
            libc::ptrace(
                libc::PTRACE_DETACH,
                tid.0,
                ptr::null_mut::<libc::c_void>(),
                ptr::null_mut::<libc::c_void>(),
            )
        };
        if ret < 0 {
            warn!("failed to detach from {tid}: {}", std::io::Error::last_os_error());
        }
    }
}

#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
mod ptrace {
    use tracecap_common::Registers;

    use crate::domain::{TargetError, Tid};

    pub fn attach(_tid: Tid) -> Result<(), TargetError> {
        Err(TargetError::UnsupportedPlatform(std::env::consts::ARCH))
    }

    pub fn registers(_tid: Tid) -> Result<Registers, TargetError> {
        Err(TargetError::UnsupportedPlatform(std::env::consts::ARCH))
    }

    pub fn detach(_tid: Tid) {}
}
