//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep process and thread IDs apart, which matters
//! because `ptrace` operates on threads while `/proc/<pid>/maps` describes a
//! whole process.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process ID
///
/// Identifies the address space a user-stack capture reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pid(pub i32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

impl From<i32> for Pid {
    fn from(pid: i32) -> Self {
        Pid(pid)
    }
}

/// Thread ID
///
/// The thread whose registers a live capture starts from. For the main
/// thread of a process this equals the process ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tid(pub i32);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

impl From<Pid> for Tid {
    fn from(pid: Pid) -> Self {
        Tid(pid.0)
    }
}

/// Which context a capture walked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    /// The caller's own privileged call chain
    Kernel,
    /// The caller's own chain, starting from a saved register snapshot
    KernelRegs,
    /// Another, possibly sleeping, task's chain
    Task,
    /// An unprivileged context's frame-pointer chain
    User,
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureMode::Kernel => "kernel",
            CaptureMode::KernelRegs => "kernel-regs",
            CaptureMode::Task => "task",
            CaptureMode::User => "user",
        };
        f.write_str(name)
    }
}
