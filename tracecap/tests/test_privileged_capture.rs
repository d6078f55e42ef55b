use tracecap::capture::{
    CaptureConfig, FrameConsumer, FramePointerWalker, FrameWalker, SchedFunctions, StackCapture,
    Walk, WalkStart,
};
use tracecap::memory::{MemoryRange, SnapshotMemory};
use tracecap::target::TaskTarget;
use tracecap::TraceBuffer;
use tracecap_common::{Registers, TRACE_END};

/// Walker that replays fixed stacks and remembers how far it got
struct ScriptedWalker {
    stacks: Vec<(&'static str, Vec<(usize, bool)>)>,
    offered: std::cell::Cell<usize>,
}

impl ScriptedWalker {
    fn new(stacks: Vec<(&'static str, Vec<(usize, bool)>)>) -> Self {
        Self { stacks, offered: std::cell::Cell::new(0) }
    }
}

impl FrameWalker for ScriptedWalker {
    fn walk(&self, _start: WalkStart<'_>, consumer: &mut dyn FrameConsumer) {
        for (name, frames) in &self.stacks {
            if consumer.on_stack(name) == Walk::Stop {
                return;
            }
            for &(addr, reliable) in frames {
                self.offered.set(self.offered.get() + 1);
                if consumer.on_frame(addr, reliable) == Walk::Stop {
                    return;
                }
            }
        }
    }
}

fn sched() -> SchedFunctions {
    SchedFunctions::new([
        MemoryRange { start: 0xa000, end: 0xa100 },
        MemoryRange { start: 0xb000, end: 0xb040 },
    ])
}

#[test]
fn test_walk_stops_once_buffer_is_full() {
    let walker = ScriptedWalker::new(vec![(
        "irq",
        vec![(0x10, true), (0x20, true), (0x30, true), (0x40, true), (0x50, true)],
    )]);
    let sched = sched();
    let capture = StackCapture::new(&walker, &sched, CaptureConfig::default());

    let mut trace = TraceBuffer::new(3);
    capture.save_stack_trace(&mut trace);

    assert_eq!(trace.entries(), &[0x10, 0x20, 0x30]);
    assert_eq!(walker.offered.get(), 3);
}

#[test]
fn test_frames_span_several_stacks() {
    let walker = ScriptedWalker::new(vec![
        ("irq", vec![(0x10, true)]),
        ("task", vec![(0x20, true), (0x30, true)]),
    ]);
    let sched = sched();
    let capture = StackCapture::new(&walker, &sched, CaptureConfig::default());

    let mut trace = TraceBuffer::new(8);
    capture.save_stack_trace_regs(&Registers::default(), &mut trace);
    assert_eq!(trace.entries(), &[0x10, 0x20, 0x30, TRACE_END]);
}

#[test]
fn test_filtered_frames_do_not_consume_skip() {
    let walker = ScriptedWalker::new(vec![(
        "sleeper",
        vec![(0xa010, true), (0x20, false), (0xb000, true), (0x30, true), (0x40, true)],
    )]);
    let sched = sched();
    let config = CaptureConfig { skip: 1, reliable_only: true, ..CaptureConfig::default() };
    let capture = StackCapture::new(&walker, &sched, config);

    let mut trace = capture.new_buffer();
    capture.save_stack_trace_tsk(&TaskTarget::new("sleeper", Registers::default()), &mut trace);
    assert_eq!(trace.entries(), &[0x40, TRACE_END]);
}

#[test]
fn test_empty_walk_yields_sentinel_only() {
    let walker = ScriptedWalker::new(Vec::new());
    let sched = SchedFunctions::empty();
    let capture = StackCapture::new(&walker, &sched, CaptureConfig::default());

    let mut trace = capture.new_buffer();
    capture.save_stack_trace(&mut trace);
    assert_eq!(trace.entries(), &[TRACE_END]);
}

#[test]
fn test_frame_pointer_walker_over_snapshot() {
    const FP0: usize = 0x7000;
    const FP1: usize = 0x7040;

    let mut memory = SnapshotMemory::new();
    memory.add_words(FP0, &[FP1, 0x4010]);
    memory.add_words(FP1, &[0, 0x4020]);

    let walker = FramePointerWalker::new(memory);
    let sched = SchedFunctions::new([MemoryRange { start: 0x4000, end: 0x4014 }]);
    let capture = StackCapture::new(&walker, &sched, CaptureConfig::default());
    let task = TaskTarget::new("worker", Registers { ip: 0x4000, sp: FP0, bp: FP0 });

    let mut trace = capture.new_buffer();
    capture.save_stack_trace_tsk(&task, &mut trace);
    // 0x4000 and 0x4010 sit inside the scheduler range
    assert_eq!(trace.entries(), &[0x4020, TRACE_END]);

    let mut trace = capture.new_buffer();
    capture.save_stack_trace_regs(&task.regs, &mut trace);
    assert_eq!(trace.entries(), &[0x4000, 0x4010, 0x4020, TRACE_END]);
}

#[cfg(all(target_os = "linux", any(target_arch = "x86_64", target_arch = "aarch64")))]
#[test]
fn test_own_chain_through_local_walker() {
    let walker = FramePointerWalker::local();
    let sched = SchedFunctions::empty();
    let capture = StackCapture::new(&walker, &sched, CaptureConfig::default());

    let mut trace = TraceBuffer::new(16);
    capture.save_stack_trace(&mut trace);

    // however deep the walk got, the buffer stays well formed
    assert!(trace.len() <= 16);
    assert!(trace.is_terminated() || trace.is_full());
    assert!(!trace.frames().contains(&TRACE_END));
}
