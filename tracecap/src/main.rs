//! # tracecap - Main Entry Point
//!
//! Supports three operational modes:
//! - **Live** (`--pid <PID>` or `tracecap <PROCESS>`): stop a thread and unwind its user stack
//! - **Replay** (`--replay stack.json`): unwind a snapshot saved with `--dump-snapshot`
//! - **Self-test** (`--self-test`): capture tracecap's own call chain through every entry point

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use tracecap::capture::{
    current_registers, save_stack_trace_user, FramePointerWalker, SchedFunctions, StackCapture,
};
use tracecap::cli::Args;
use tracecap::display::{print_report, print_snapshot_summary};
use tracecap::domain::{CaptureMode, Pid, Tid};
use tracecap::export::{export_to_file, CaptureReport};
use tracecap::memory::LocalMemory;
use tracecap::preflight::run_preflight_checks;
use tracecap::process_lookup::{find_process_by_name, resolve_thread};
use tracecap::target::{LiveTarget, StackSnapshot, TaskTarget, UserSpace, UserTarget};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}").to_lowercase();
    if msg.contains("permission denied") || msg.contains("operation not permitted") {
        EXIT_NOPERM
    } else if msg.contains("missing required argument") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

/// Resolve PID and TID from CLI arguments.
///
/// - `tracecap my-app` - find process by name, main thread
/// - `tracecap --pid 1234` - explicit PID, main thread
/// - `tracecap --pid 1234 --tid 1240` - explicit thread
fn resolve_pid_and_tid(args: &Args) -> Result<(Pid, Tid)> {
    let pid = if let Some(ref name) = args.process {
        if args.pid.is_some() {
            bail!(
                "Cannot use PROCESS argument with --pid.\n\n\
                 Use either:\n  \
                 tracecap my-app         (find by name)\n  \
                 tracecap --pid 1234     (explicit PID)"
            );
        }
        let info = find_process_by_name(name)?;
        info!("'{name}' resolved to {} ({})", info.pid, info.command);
        info.pid
    } else if let Some(pid) = args.pid {
        Pid(pid)
    } else {
        bail!(
            "Missing required argument: PROCESS, --pid, --replay or --self-test\n\n\
             Usage:\n  \
             tracecap my-app              Capture a process found by name\n  \
             tracecap --pid 1234          Capture an explicit PID\n  \
             tracecap --replay stack.json Unwind a saved snapshot\n\n\
             Run 'tracecap --help' for more options"
        );
    };

    let tid = resolve_thread(pid, args.tid.map(Tid))?;
    Ok((pid, tid))
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = args.capture_config();
    let sched = SchedFunctions::new(args.sched_range.iter().copied());

    if args.max_entries == 0 {
        bail!("--max-entries must be at least 1");
    }

    if !args.quiet {
        println!("tracecap v{}", env!("CARGO_PKG_VERSION"));
    }

    let reports = if let Some(ref path) = args.replay {
        let snapshot = StackSnapshot::load(path)
            .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
        if !args.quiet {
            print_snapshot_summary(&snapshot);
        }

        let target = snapshot.to_target();
        let mut trace = config.new_buffer();
        let reason = save_stack_trace_user(&target, &mut trace, &config);
        vec![CaptureReport::new(&snapshot.label, CaptureMode::User, &trace, Some(reason))]
    } else if args.self_test {
        let walker = FramePointerWalker::local();
        let capture = StackCapture::new(&walker, &sched, config);
        self_test(&capture)?
    } else {
        let (pid, tid) = resolve_pid_and_tid(&args)?;
        run_preflight_checks(pid)?;

        if !args.quiet {
            println!("pid: {}", pid.0);
            println!("tid: {}", tid.0);
        }

        let live = LiveTarget::attach(pid, tid)?;
        if let Some(ref path) = args.dump_snapshot {
            let snapshot = live.snapshot();
            snapshot
                .save(path)
                .with_context(|| format!("Failed to save snapshot {}", path.display()))?;
            if !args.quiet {
                println!("snapshot: {}", path.display());
            }
        }

        let target = live.user_target();
        let mut trace = config.new_buffer();
        let reason = save_stack_trace_user(&target, &mut trace, &config);
        vec![CaptureReport::new(&target.label, CaptureMode::User, &trace, Some(reason))]
    };

    for report in &reports {
        print_report(report);
    }

    if let Some(ref path) = args.export {
        let Some(report) = reports.last() else {
            bail!("nothing was captured");
        };
        export_to_file(report, path)?;
        if !args.quiet {
            println!("saved: {}", path.display());
        }
    }

    Ok(())
}

/// Capture this thread through every entry point
///
/// Runs inside one frame so that the registers read at the top still describe
/// a live chain while the captures walk it.
#[inline(never)]
fn self_test(
    capture: &StackCapture<'_, FramePointerWalker<LocalMemory>>,
) -> Result<Vec<CaptureReport>> {
    let Some(regs) = current_registers() else {
        bail!("--self-test is not supported on {}", std::env::consts::ARCH);
    };
    let label = format!("tracecap {}", std::process::id());
    let mut reports = Vec::with_capacity(4);

    let mut trace = capture.new_buffer();
    capture.save_stack_trace(&mut trace);
    reports.push(CaptureReport::new(&label, CaptureMode::Kernel, &trace, None));

    let mut trace = capture.new_buffer();
    capture.save_stack_trace_regs(&regs, &mut trace);
    reports.push(CaptureReport::new(&label, CaptureMode::KernelRegs, &trace, None));

    let mut trace = capture.new_buffer();
    capture.save_stack_trace_tsk(&TaskTarget::new(&label, regs), &mut trace);
    reports.push(CaptureReport::new(&label, CaptureMode::Task, &trace, None));

    let target = UserTarget::new(&label, UserSpace::new(regs, LocalMemory::new()));
    let mut trace = capture.new_buffer();
    let reason = capture.save_stack_trace_user(&target, &mut trace);
    reports.push(CaptureReport::new(&label, CaptureMode::User, &trace, Some(reason)));

    Ok(reports)
}
