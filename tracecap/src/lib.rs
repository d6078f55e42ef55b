//! # tracecap - Bounded Stack Trace Capture
//!
//! tracecap records the call chain of an execution context as a bounded list
//! of return addresses. It captures privileged chains through an external
//! frame walker, and unprivileged (user) chains by following frame pointers
//! through memory it does not trust.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Capture Targets                          │
//! │   own thread · saved registers · sleeping task · user context   │
//! └───────────────┬──────────────────────────────┬──────────────────┘
//!                 │ privileged                   │ unprivileged
//!                 ▼                              ▼
//! ┌───────────────────────────────┐  ┌──────────────────────────────┐
//! │  FrameWalker (producer)       │  │  User Unwinder               │
//! │   on_stack / on_frame ──┐     │  │   access_ok → SafeRead copy  │
//! │                         ▼     │  │   → record → advance         │
//! │  TraceCollector (consumer)    │  │   → StopReason               │
//! │   reliable · nosched · skip   │  │                              │
//! └───────────────┬───────────────┘  └──────────────┬───────────────┘
//!                 │                                 │
//!                 ▼                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │          TraceBuffer (max_entries, skip, TRACE_END marker)      │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 ▼
//!                 ┌──────────────────────────────┐
//!                 │  CaptureReport (JSON export) │
//!                 └──────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! ### Capture Core
//!
//! - [`trace_buffer`]: bounded return-address buffer with skip accounting
//! - [`capture`]: entry points, frame walker contract, collector and the user
//!   unwinder
//! - [`memory`]: the [`SafeRead`](memory::SafeRead) capability and its
//!   snapshot, remote and local implementations
//! - [`target`]: the contexts a capture can be pointed at
//!
//! ### Front End
//!
//! - [`cli`]: command-line argument parsing
//! - [`preflight`]: permission and platform checks before a live attach
//! - [`process_lookup`]: PID and TID resolution from `/proc`
//! - [`export`]: JSON capture reports
//! - [`display`]: plain-text output
//! - [`domain`]: core domain types (Pid, Tid, CaptureMode) and errors
//!
//! ## Typical Usage
//!
//! ```bash
//! # Unwind the main thread of a running process
//! sudo ./tracecap --pid <PID>
//!
//! # Save the stack for later and export the report
//! sudo ./tracecap my-app --dump-snapshot stack.json --export trace.json
//!
//! # Replay the saved stack with a smaller buffer
//! ./tracecap --replay stack.json --max-entries 8
//! ```
//!
//! ## Key Concepts
//!
//! - **Frame pointer chain**: each frame stores the caller's frame pointer
//!   followed by the return address; tracecap follows it innermost first
//! - **Fault-tolerant read**: every read of target memory returns a fault
//!   value instead of crashing or blocking
//! - **Stop reason**: a one-character code explaining why a user walk ended

pub mod capture;
pub mod cli;
pub mod display;
pub mod domain;
pub mod export;
pub mod memory;
pub mod preflight;
pub mod process_lookup;
pub mod target;
pub mod trace_buffer;

pub use trace_buffer::{Record, TraceBuffer};
