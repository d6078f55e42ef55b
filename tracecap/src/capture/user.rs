//! # User Stack Unwinder
//!
//! Walks the frame-pointer chain of an unprivileged context. The chain lives in
//! memory the target controls, so nothing read from it is trusted:
//!
//! - every frame pointer is checked against the user address limit before it
//!   is followed
//! - every frame record is copied with a fault-tolerant read
//! - a frame pointing at itself ends the walk instead of spinning forever
//! - return addresses outside user space are not recorded
//! - a chain longer than [`DEFAULT_WALK_DEPTH`] frames is abandoned, so a
//!   cycle of frames without return addresses cannot spin forever either
//!
//! The walk always produces a (possibly partial) trace plus a [`StopReason`]
//! saying why it ended. Nothing is retried.
//!
//! ## Frame Layout
//!
//! ```text
//!   higher addresses
//!   ┌──────────────────────┐
//!   │ return address       │  fp + WORD_SIZE
//!   ├──────────────────────┤
//!   │ caller's frame ptr   │  fp            ◀── frame pointer register
//!   ├──────────────────────┤
//!   │ callee locals ...    │
//!   └──────────────────────┘
//!   lower addresses
//! ```

use log::{debug, warn};
use tracecap_common::{StackFrameUser, StopReason, FRAME_RECORD_SIZE};

use super::config::{CaptureConfig, StackPointerCheck};
use super::walker::DEFAULT_WALK_DEPTH;
use crate::domain::CopyError;
use crate::memory::{read_frame_record, SafeRead};
use crate::target::{UserSpace, UserTarget};
use crate::trace_buffer::TraceBuffer;

/// Copy the frame record at `fp` out of the target's stack
///
/// # Errors
/// - [`CopyError::InvalidAddress`] if the record does not lie below the
///   target's user address limit
/// - [`CopyError::Fault`] if the fault-tolerant read failed
pub fn copy_stack_frame<M: SafeRead>(
    space: &UserSpace<M>,
    fp: usize,
) -> Result<StackFrameUser, CopyError> {
    if !space.access_ok(fp, FRAME_RECORD_SIZE) {
        return Err(CopyError::InvalidAddress(fp));
    }
    Ok(read_frame_record(&space.memory, fp)?)
}

fn below_stack_pointer(
    check: StackPointerCheck,
    when: StackPointerCheck,
    fp: usize,
    sp: usize,
) -> bool {
    check == when && fp < sp
}

fn unwind_user_stack<M: SafeRead>(
    space: &UserSpace<M>,
    trace: &mut TraceBuffer,
    sp_check: StackPointerCheck,
) -> StopReason {
    let regs = space.regs;
    let mut fp = regs.bp;
    let mut reason = StopReason::Uninitialized;

    trace.record(regs.ip);

    let mut depth = 0;
    while trace.has_room() {
        if depth == DEFAULT_WALK_DEPTH {
            warn!("user unwind gave up after {depth} frames at fp=0x{fp:x}");
            reason = StopReason::DepthLimitReached;
            break;
        }
        depth += 1;

        if below_stack_pointer(sp_check, StackPointerCheck::Before, fp, regs.sp) {
            reason = StopReason::InvalidPointerBelowStackBase;
            break;
        }

        let frame = match copy_stack_frame(space, fp) {
            Ok(frame) => frame,
            Err(CopyError::InvalidAddress(addr)) => {
                debug!("frame pointer 0x{addr:x} is outside user space");
                reason = StopReason::InvalidUserAddress;
                break;
            }
            Err(CopyError::Fault(fault)) => {
                debug!("copying frame at 0x{fp:x} failed: {fault}");
                reason = StopReason::CopyFailed;
                break;
            }
        };

        if below_stack_pointer(sp_check, StackPointerCheck::After, fp, regs.sp) {
            reason = StopReason::InvalidPointerBelowStackBase;
            break;
        }

        if frame.ret_addr != 0 {
            if space.access_ok(frame.ret_addr, 1) {
                trace.record(frame.ret_addr);
            } else {
                debug!("return address 0x{:x} is outside user space", frame.ret_addr);
            }
        }
        if frame.next_fp == fp {
            reason = StopReason::SelfReferentialFrame;
            break;
        }
        fp = frame.next_fp;
        reason = StopReason::MaxEntriesReached;
    }

    reason
}

/// Capture the user-space call chain of `target`
///
/// A target without a user address space short-circuits to
/// [`StopReason::KernelThreadNoAddressSpace`] without reading any memory. In
/// every case the end-of-trace marker is appended if there is room.
pub fn save_stack_trace_user<M: SafeRead>(
    target: &UserTarget<M>,
    trace: &mut TraceBuffer,
    config: &CaptureConfig,
) -> StopReason {
    let reason = match target.space() {
        Some(space) => unwind_user_stack(space, trace, config.sp_check),
        None => StopReason::KernelThreadNoAddressSpace,
    };
    trace.append_sentinel();

    match reason {
        StopReason::CopyFailed | StopReason::InvalidUserAddress => {
            warn!("{}: user unwind stopped early: {reason}", target.label);
        }
        _ => debug!("{}: user unwind stopped: {reason}", target.label),
    }
    reason
}
