//! # Stack Capture Core
//!
//! Turns an execution context into a bounded [`TraceBuffer`](crate::trace_buffer::TraceBuffer)
//! of return addresses.
//!
//! ## Capture Strategies
//!
//! - **Privileged contexts** are walked by a [`FrameWalker`], an external
//!   producer that calls back once per candidate address. [`TraceCollector`]
//!   is the consumer that filters (reliability, scheduler frames), applies the
//!   skip count and stops the walk when the buffer is full.
//! - **Unprivileged contexts** are walked by the user unwinder in [`user`],
//!   which follows the frame-pointer chain itself through a
//!   [`SafeRead`](crate::memory::SafeRead) and reports a
//!   [`StopReason`](tracecap_common::StopReason).
//!
//! ## Entry Points
//!
//! [`StackCapture`] offers one method per context:
//!
//! | Method                    | Context walked                   | Scheduler filter |
//! |---------------------------|----------------------------------|------------------|
//! | `save_stack_trace`        | caller's own chain               | off              |
//! | `save_stack_trace_regs`   | caller's chain from a snapshot   | off              |
//! | `save_stack_trace_tsk`    | another, sleeping task           | on               |
//! | `save_stack_trace_user`   | unprivileged frame-pointer chain | n/a              |
//!
//! Every path finishes the buffer with the end-of-trace marker when a slot
//! is left.

pub mod arch;
pub mod collector;
pub mod config;
pub mod entry;
pub mod sched;
pub mod user;
pub mod walker;

pub use arch::{current_frame_pointer, current_registers};
pub use collector::TraceCollector;
pub use config::{CaptureConfig, StackPointerCheck};
pub use entry::StackCapture;
pub use sched::{parse_range, SchedFunctions};
pub use user::{copy_stack_frame, save_stack_trace_user};
pub use walker::{FrameConsumer, FramePointerWalker, FrameWalker, Walk, WalkStart};
