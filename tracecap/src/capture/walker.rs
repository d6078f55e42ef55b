//! Frame walker contract and the in-process frame-pointer walker
//!
//! A [`FrameWalker`] produces candidate return addresses for some context and
//! pushes them, one at a time, into a [`FrameConsumer`]. The capture adapter
//! is a consumer; how the walker finds frames is its own business.

use log::debug;
use tracecap_common::Registers;

use super::arch::current_frame_pointer;
use crate::memory::{read_frame_record, LocalMemory, SafeRead};
use crate::target::TaskTarget;

/// Upper bound on frames the walker follows on its own
pub const DEFAULT_WALK_DEPTH: usize = 4096;

/// Consumer's answer to a walker callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Continue,
    Stop,
}

/// Receives frames from a [`FrameWalker`]
pub trait FrameConsumer {
    /// The walk moved onto the stack called `name`
    fn on_stack(&mut self, _name: &str) -> Walk {
        Walk::Continue
    }

    /// One candidate return address
    ///
    /// `reliable` is true when the walker derived the address from an intact
    /// frame chain and false when it was guessed (e.g. by scanning the stack
    /// for values that look like text addresses).
    fn on_frame(&mut self, addr: usize, reliable: bool) -> Walk;
}

/// Which call chain a walk starts from
#[derive(Debug, Clone, Copy)]
pub enum WalkStart<'a> {
    /// The caller's own live chain
    Current,
    /// The caller's chain as captured in a register snapshot
    Regs(&'a Registers),
    /// Another, not running, task
    Task(&'a TaskTarget),
}

/// Producer of privileged call frames
pub trait FrameWalker {
    /// Feed every frame reachable from `start` to `consumer`, innermost first,
    /// until the frames run out or the consumer asks to stop
    fn walk(&self, start: WalkStart<'_>, consumer: &mut dyn FrameConsumer);
}

/// Walks a frame-pointer chain through a [`SafeRead`]
///
/// Every address it reports comes from the chain itself, so all of them are
/// marked reliable. The walk ends at a null or non-increasing frame pointer,
/// a zero return address, a read fault, or after `max_depth` frames.
#[derive(Debug, Clone)]
pub struct FramePointerWalker<M> {
    memory: M,
    max_depth: usize,
}

impl FramePointerWalker<LocalMemory> {
    /// Walker over the calling process's own stacks
    #[must_use]
    pub fn local() -> Self {
        Self::new(LocalMemory::new())
    }
}

impl<M: SafeRead> FramePointerWalker<M> {
    #[must_use]
    pub fn new(memory: M) -> Self {
        Self { memory, max_depth: DEFAULT_WALK_DEPTH }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn walk_chain(
        &self,
        stack: &str,
        ip: Option<usize>,
        mut fp: usize,
        consumer: &mut dyn FrameConsumer,
    ) {
        if consumer.on_stack(stack) == Walk::Stop {
            return;
        }
        if let Some(ip) = ip {
            if consumer.on_frame(ip, true) == Walk::Stop {
                return;
            }
        }

        for depth in 0..self.max_depth {
            if fp == 0 {
                break;
            }
            let frame = match read_frame_record(&self.memory, fp) {
                Ok(frame) => frame,
                Err(fault) => {
                    debug!("{stack} walk stopped at depth {depth}: {fault}");
                    break;
                }
            };
            if frame.ret_addr == 0 {
                break;
            }
            if consumer.on_frame(frame.ret_addr, true) == Walk::Stop {
                break;
            }
            // callers live at higher addresses
            if frame.next_fp <= fp {
                break;
            }
            fp = frame.next_fp;
        }
    }
}

impl<M: SafeRead> FrameWalker for FramePointerWalker<M> {
    #[inline(never)]
    fn walk(&self, start: WalkStart<'_>, consumer: &mut dyn FrameConsumer) {
        match start {
            WalkStart::Current => match current_frame_pointer() {
                Some(fp) => self.walk_chain("current", None, fp, consumer),
                None => debug!("no frame pointer register on this architecture"),
            },
            WalkStart::Regs(regs) => self.walk_chain("regs", Some(regs.ip), regs.bp, consumer),
            WalkStart::Task(task) => {
                self.walk_chain(&task.name, Some(task.regs.ip), task.regs.bp, consumer);
            }
        }
    }
}
