//! # Shared Data Structures (Capture Core ↔ Front End)
//!
//! Defines the plain data exchanged between the stack capture core and its
//! callers: the frame-link record read out of an untrusted stack, the register
//! snapshot a walk starts from, and the stop reason a user-stack walk reports.
//! All record types use `#[repr(C)]` so that their layout matches the frame
//! layout they are copied from.
//!
//! ## Key Types
//!
//! - [`StackFrameUser`] - One link of a frame-pointer chain (saved frame pointer + return address)
//! - [`Registers`] - Program counter, stack pointer and frame pointer of a context
//! - [`StopReason`] - Why a user-stack walk stopped
//!
//! ## Features
//!
//! - `user`: derives `serde` traits for the types that appear in snapshots and reports

#![no_std]

use core::fmt;

// ============================================================================
// Trace Constants
// ============================================================================

/// End-of-trace marker appended after the last recorded frame
///
/// The all-ones address can never be a call site, so a consumer scanning a
/// buffer that is not completely full stops at the first slot holding this
/// value. It is only written when there is room left in the buffer.
pub const TRACE_END: usize = usize::MAX;

/// Default capacity of a trace buffer when the caller does not pick one
pub const DEFAULT_MAX_ENTRIES: usize = 64;

/// Size of a machine word in the traced address space
pub const WORD_SIZE: usize = core::mem::size_of::<usize>();

/// Size in bytes of one frame-link record on the stack
pub const FRAME_RECORD_SIZE: usize = 2 * WORD_SIZE;

/// Page granularity assumed for user address-space bounds
pub const PAGE_SIZE: usize = 4096;

/// Exclusive upper bound of user-space addresses
///
/// On x86-64 user space spans the lower 47 bits minus one guard page, which
/// keeps a read that straddles the limit from touching the non-canonical hole.
#[cfg(target_pointer_width = "64")]
pub const USER_ADDRESS_LIMIT: usize = (1 << 47) - PAGE_SIZE;

/// Exclusive upper bound of user-space addresses (3G/1G split)
#[cfg(not(target_pointer_width = "64"))]
pub const USER_ADDRESS_LIMIT: usize = 0xc000_0000;

// ============================================================================
// Shared Data Structures
// ============================================================================

/// One link of a frame-pointer chain as laid out on the stack
///
/// On entry a callee pushes the caller's frame pointer right below the return
/// address the `call` instruction pushed, then points the frame pointer
/// register at that slot. Reading memory upward from a frame pointer therefore
/// yields the saved frame pointer first, followed by the return address.
///
/// **Lifetime**: materialized once per unwind iteration and dropped right after.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackFrameUser {
    /// Frame pointer of the caller (the next link to follow)
    pub next_fp: usize,

    /// Call-site address in the caller
    ///
    /// Zero when the frame carries no return address (e.g. the outermost
    /// frame set up by the runtime's entry code).
    pub ret_addr: usize,
}

impl StackFrameUser {
    /// Decode a record from the raw bytes copied out of the target stack
    ///
    /// Bytes are interpreted in native endianness, the same order the
    /// target wrote them in.
    #[must_use]
    pub fn from_ne_bytes(bytes: &[u8; FRAME_RECORD_SIZE]) -> Self {
        let mut next_fp = [0u8; WORD_SIZE];
        let mut ret_addr = [0u8; WORD_SIZE];
        next_fp.copy_from_slice(&bytes[..WORD_SIZE]);
        ret_addr.copy_from_slice(&bytes[WORD_SIZE..]);
        Self { next_fp: usize::from_ne_bytes(next_fp), ret_addr: usize::from_ne_bytes(ret_addr) }
    }
}

/// Register values a stack walk starts from
///
/// For the current context these are read from the live registers; for a
/// stopped or sleeping context they come from the state saved when it was
/// switched out.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "user", derive(serde::Serialize, serde::Deserialize))]
pub struct Registers {
    /// Program counter (RIP on x86-64, PC on aarch64)
    pub ip: usize,

    /// Stack pointer (RSP on x86-64, SP on aarch64)
    pub sp: usize,

    /// Frame pointer (RBP on x86-64, X29 on aarch64)
    pub bp: usize,
}

/// Reason a user-stack walk stopped
///
/// Exactly one reason is produced per capture. It is a diagnostic for the
/// caller, not an error: a trace is always returned alongside it.
///
/// The discriminant is the single-character code the reason is reported as.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "user", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "user", serde(rename_all = "snake_case"))]
pub enum StopReason {
    /// The fault-tolerant copy of a frame record failed
    CopyFailed = b'c',

    /// The chain was still going after the walker's frame limit
    ///
    /// Only reachable through frames that record nothing (a zero return
    /// address), since every other frame takes up a buffer slot.
    DepthLimitReached = b'd',

    /// The frame pointer read from the stack points to its own frame
    SelfReferentialFrame = b'e',

    /// The target has no user address space to walk
    KernelThreadNoAddressSpace = b'k',

    /// The frame pointer lies below the target's stack pointer
    ///
    /// Only produced when the stack-pointer sanity check is enabled.
    InvalidPointerBelowStackBase = b'l',

    /// The buffer filled up while the chain was still intact
    MaxEntriesReached = b'n',

    /// The frame pointer is not a valid user-space address
    InvalidUserAddress = b'p',

    /// The walk loop never ran (no room left after the entry point)
    Uninitialized = b'z',
}

impl StopReason {
    /// All reasons, in code order
    pub const ALL: [StopReason; 8] = [
        StopReason::CopyFailed,
        StopReason::DepthLimitReached,
        StopReason::SelfReferentialFrame,
        StopReason::KernelThreadNoAddressSpace,
        StopReason::InvalidPointerBelowStackBase,
        StopReason::MaxEntriesReached,
        StopReason::InvalidUserAddress,
        StopReason::Uninitialized,
    ];

    /// Single-character classification code
    #[must_use]
    pub fn code(self) -> char {
        char::from(self as u8)
    }

    /// Reverse of [`StopReason::code`]
    #[must_use]
    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|reason| reason.code() == code)
    }

    /// Short human-readable description
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            StopReason::CopyFailed => "copy of frame record failed",
            StopReason::DepthLimitReached => "frame chain too deep",
            StopReason::SelfReferentialFrame => "frame pointer refers to its own frame",
            StopReason::KernelThreadNoAddressSpace => "no user address space",
            StopReason::InvalidPointerBelowStackBase => "frame pointer below stack pointer",
            StopReason::MaxEntriesReached => "reached max number of entries",
            StopReason::InvalidUserAddress => "frame pointer is not a user address",
            StopReason::Uninitialized => "walk never started",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}
