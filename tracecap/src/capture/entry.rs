//! Capture entry points
//!
//! [`StackCapture`] binds a frame walker, the scheduler-function filter and a
//! [`CaptureConfig`], and exposes one method per kind of context. Each method
//! fills the buffer it is given and finishes it with the end-of-trace marker.

use log::debug;
use tracecap_common::{Registers, StopReason};

use super::collector::TraceCollector;
use super::config::CaptureConfig;
use super::sched::SchedFunctions;
use super::user::save_stack_trace_user;
use super::walker::{FrameWalker, WalkStart};
use crate::memory::SafeRead;
use crate::target::{TaskTarget, UserTarget};
use crate::trace_buffer::TraceBuffer;

pub struct StackCapture<'a, W: ?Sized> {
    walker: &'a W,
    sched: &'a SchedFunctions,
    config: CaptureConfig,
}

impl<'a, W: FrameWalker + ?Sized> StackCapture<'a, W> {
    pub fn new(walker: &'a W, sched: &'a SchedFunctions, config: CaptureConfig) -> Self {
        Self { walker, sched, config }
    }

    #[must_use]
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Empty buffer primed with the configured capacity and skip count
    #[must_use]
    pub fn new_buffer(&self) -> TraceBuffer {
        self.config.new_buffer()
    }

    fn dump_trace(&self, start: WalkStart<'_>, nosched: bool, trace: &mut TraceBuffer) {
        {
            let mut collector = if nosched {
                TraceCollector::nosched(trace, self.config.reliable_only, self.sched)
            } else {
                TraceCollector::new(trace, self.config.reliable_only)
            };
            self.walker.walk(start, &mut collector);
        }
        trace.append_sentinel();
        debug!("captured {} entries (terminated: {})", trace.len(), trace.is_terminated());
    }

    /// Capture the caller's own call chain
    #[inline(never)]
    pub fn save_stack_trace(&self, trace: &mut TraceBuffer) {
        self.dump_trace(WalkStart::Current, false, trace);
    }

    /// Capture the caller's call chain as recorded in `regs`
    pub fn save_stack_trace_regs(&self, regs: &Registers, trace: &mut TraceBuffer) {
        self.dump_trace(WalkStart::Regs(regs), false, trace);
    }

    /// Capture another task's call chain, leaving out scheduler frames
    pub fn save_stack_trace_tsk(&self, task: &TaskTarget, trace: &mut TraceBuffer) {
        self.dump_trace(WalkStart::Task(task), true, trace);
    }

    /// Capture an unprivileged context's frame-pointer chain
    pub fn save_stack_trace_user<M: SafeRead>(
        &self,
        target: &UserTarget<M>,
        trace: &mut TraceBuffer,
    ) -> StopReason {
        save_stack_trace_user(target, trace, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::walker::{FrameConsumer, Walk};
    use crate::memory::MemoryRange;
    use tracecap_common::TRACE_END;

    /// Replays a fixed list of (address, reliable) frames
    struct Scripted(Vec<(usize, bool)>);

    impl FrameWalker for Scripted {
        fn walk(&self, _start: WalkStart<'_>, consumer: &mut dyn FrameConsumer) {
            if consumer.on_stack("scripted") == Walk::Stop {
                return;
            }
            for &(addr, reliable) in &self.0 {
                if consumer.on_frame(addr, reliable) == Walk::Stop {
                    return;
                }
            }
        }
    }

    fn sched() -> SchedFunctions {
        SchedFunctions::new([MemoryRange { start: 0x9000, end: 0x9100 }])
    }

    #[test]
    fn test_current_capture_appends_sentinel() {
        let walker = Scripted(vec![(0x10, true), (0x20, true)]);
        let sched = sched();
        let capture = StackCapture::new(&walker, &sched, CaptureConfig::default());

        let mut trace = TraceBuffer::new(4);
        capture.save_stack_trace(&mut trace);
        assert_eq!(trace.entries(), &[0x10, 0x20, TRACE_END]);
    }

    #[test]
    fn test_full_buffer_gets_no_sentinel() {
        let walker = Scripted(vec![(0x10, true), (0x20, true), (0x30, true)]);
        let sched = sched();
        let capture = StackCapture::new(&walker, &sched, CaptureConfig::default());

        let mut trace = TraceBuffer::new(2);
        capture.save_stack_trace_regs(&Registers::default(), &mut trace);
        assert_eq!(trace.entries(), &[0x10, 0x20]);
        assert!(!trace.is_terminated());
    }

    #[test]
    fn test_own_chain_keeps_scheduler_frames() {
        let walker = Scripted(vec![(0x9010, true), (0x20, true)]);
        let sched = sched();
        let capture = StackCapture::new(&walker, &sched, CaptureConfig::default());

        let mut trace = TraceBuffer::new(4);
        capture.save_stack_trace(&mut trace);
        assert_eq!(trace.frames(), &[0x9010, 0x20]);
    }

    #[test]
    fn test_task_capture_filters_scheduler_frames() {
        let walker = Scripted(vec![(0x9010, true), (0x9080, true), (0x20, true), (0x30, true)]);
        let sched = sched();
        let config = CaptureConfig { skip: 1, ..CaptureConfig::default() };
        let capture = StackCapture::new(&walker, &sched, config);

        let mut trace = capture.new_buffer();
        capture.save_stack_trace_tsk(&TaskTarget::new("sleeper", Registers::default()), &mut trace);
        assert_eq!(trace.entries(), &[0x30, TRACE_END]);
    }

    #[test]
    fn test_reliable_only_drops_guesses() {
        let walker = Scripted(vec![(0x10, false), (0x20, true), (0x30, false)]);
        let sched = sched();
        let config = CaptureConfig { reliable_only: true, ..CaptureConfig::default() };
        let capture = StackCapture::new(&walker, &sched, config);

        let mut trace = TraceBuffer::new(4);
        capture.save_stack_trace(&mut trace);
        assert_eq!(trace.frames(), &[0x20]);
    }

    #[test]
    fn test_user_capture_without_address_space() {
        let walker = Scripted(Vec::new());
        let sched = SchedFunctions::empty();
        let capture = StackCapture::new(&walker, &sched, CaptureConfig::default());

        let target: UserTarget<crate::memory::SnapshotMemory> = UserTarget::kernel_thread("kthread");
        let mut trace = TraceBuffer::new(4);
        let reason = capture.save_stack_trace_user(&target, &mut trace);
        assert_eq!(reason, StopReason::KernelThreadNoAddressSpace);
        assert_eq!(trace.entries(), &[TRACE_END]);
    }
}
