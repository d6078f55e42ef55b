//! Privileged-context capture adapter
//!
//! [`TraceCollector`] is the [`FrameConsumer`] every privileged capture hands
//! to the frame walker. It decides, frame by frame, whether an address ends
//! up in the trace:
//!
//! 1. Unreliable addresses are dropped when only reliable ones are trusted
//! 2. Scheduler frames are dropped when walking another task (`nosched`)
//! 3. Everything else goes through the buffer's skip and capacity logic
//!
//! Filtered addresses count against neither the skip counter nor capacity.

use log::debug;

use super::sched::SchedFunctions;
use super::walker::{FrameConsumer, Walk};
use crate::trace_buffer::{Record, TraceBuffer};

pub struct TraceCollector<'a> {
    trace: &'a mut TraceBuffer,
    reliable_only: bool,
    nosched: Option<&'a SchedFunctions>,
}

impl<'a> TraceCollector<'a> {
    /// Collector for the caller's own chain (no scheduler filtering)
    pub fn new(trace: &'a mut TraceBuffer, reliable_only: bool) -> Self {
        Self { trace, reliable_only, nosched: None }
    }

    /// Collector for another task's chain, dropping frames inside `sched`
    pub fn nosched(
        trace: &'a mut TraceBuffer,
        reliable_only: bool,
        sched: &'a SchedFunctions,
    ) -> Self {
        Self { trace, reliable_only, nosched: Some(sched) }
    }
}

impl FrameConsumer for TraceCollector<'_> {
    fn on_stack(&mut self, name: &str) -> Walk {
        debug!("walking stack '{name}'");
        Walk::Continue
    }

    fn on_frame(&mut self, addr: usize, reliable: bool) -> Walk {
        if self.reliable_only && !reliable {
            debug!("dropping unreliable address 0x{addr:x}");
            return Walk::Continue;
        }
        if self.nosched.is_some_and(|sched| sched.in_sched_functions(addr)) {
            debug!("dropping scheduler frame 0x{addr:x}");
            return Walk::Continue;
        }

        match self.trace.record(addr) {
            Record::Skipped => Walk::Continue,
            Record::Rejected => {
                debug!("dropping address equal to the end marker");
                Walk::Continue
            }
            Record::Stored if self.trace.has_room() => Walk::Continue,
            Record::Stored | Record::Full => Walk::Stop,
        }
    }
}
