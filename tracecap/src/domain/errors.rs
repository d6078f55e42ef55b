//! Structured error types for tracecap
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Capture itself never fails: [`ReadFault`] and [`CopyError`] are values the
//! unwinder turns into a stop reason, the other enums cover setting up a
//! target and writing results out.

use super::types::{Pid, Tid};
use thiserror::Error;

/// Outcome of a fault-tolerant read that did not complete
///
/// Every way target memory can be unreadable collapses into one of these.
/// None of them is retried.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFault {
    #[error("address range 0x{addr:x}+{len} is not mapped")]
    Unmapped { addr: usize, len: usize },

    #[error("address range 0x{addr:x}+{len} wraps around the address space")]
    OutOfRange { addr: usize, len: usize },

    #[error("address 0x{addr:x} is not word aligned")]
    Misaligned { addr: usize },

    #[error("access to 0x{addr:x} denied")]
    Denied { addr: usize },

    #[error("short read at 0x{addr:x}: got {read} of {len} bytes")]
    Partial { addr: usize, read: usize, len: usize },
}

/// Failure to copy one frame-link record out of a user stack
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyError {
    #[error("0x{0:x} is not a valid user address")]
    InvalidAddress(usize),

    #[error(transparent)]
    Fault(#[from] ReadFault),
}

#[derive(Error, Debug)]
pub enum TargetError {
    #[error("Failed to read memory maps of {0}")]
    MemoryMapsParseFailed(Pid),

    #[error("Failed to attach to {tid}: {source}")]
    AttachFailed { tid: Tid, source: std::io::Error },

    #[error("Failed to read registers of {tid}: {source}")]
    RegistersUnavailable { tid: Tid, source: std::io::Error },

    #[error("Live capture is not supported on {0}")]
    UnsupportedPlatform(&'static str),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write capture report: {0}")]
    WriteFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_error_display() {
        let err = TargetError::MemoryMapsParseFailed(Pid(1234));
        assert_eq!(err.to_string(), "Failed to read memory maps of PID:1234");
    }

    #[test]
    fn test_read_fault_display() {
        let err = ReadFault::Unmapped { addr: 0x1000, len: 16 };
        assert_eq!(err.to_string(), "address range 0x1000+16 is not mapped");
    }

    #[test]
    fn test_copy_error_wraps_fault() {
        let err = CopyError::from(ReadFault::Denied { addr: 0x2000 });
        assert!(err.to_string().contains("0x2000"));
        assert!(matches!(err, CopyError::Fault(ReadFault::Denied { .. })));
    }

    #[test]
    fn test_attach_error() {
        let err = TargetError::AttachFailed {
            tid: Tid(77),
            source: std::io::Error::from_raw_os_error(1),
        };
        assert!(err.to_string().contains("TID:77"));
    }
}
