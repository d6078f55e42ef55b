//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;
use tracecap_common::DEFAULT_MAX_ENTRIES;

use crate::capture::{parse_range, CaptureConfig, StackPointerCheck};
use crate::memory::MemoryRange;

fn parse_sched_range(text: &str) -> Result<MemoryRange, String> {
    parse_range(text).map_err(|e| format!("{e:#}"))
}

#[derive(Parser, Debug)]
#[command(
    name = "tracecap",
    about = "Capture frame-pointer stack traces from live threads or saved snapshots",
    after_help = "\
EXAMPLES:
    sudo tracecap my-app                       Main thread of a process found by name
    sudo tracecap --pid 1234 --tid 1240        A specific thread
    tracecap --replay stack.json               Unwind a saved snapshot
    tracecap --self-test                       Capture tracecap's own call chain"
)]
pub struct Args {
    /// Process name to capture (main thread unless --tid is given)
    #[arg(value_name = "PROCESS")]
    pub process: Option<String>,

    /// Process ID to capture
    #[arg(short, long)]
    pub pid: Option<i32>,

    /// Thread ID inside the process (defaults to the main thread)
    #[arg(short, long)]
    pub tid: Option<i32>,

    /// Unwind a stack snapshot saved earlier with --dump-snapshot
    #[arg(long, value_name = "FILE", conflicts_with_all = ["process", "pid", "tid", "self_test"])]
    pub replay: Option<PathBuf>,

    /// Capture tracecap's own call chain with the in-process walker
    #[arg(long, conflicts_with_all = ["process", "pid", "tid"])]
    pub self_test: bool,

    /// Trace buffer capacity, end marker included
    #[arg(long, default_value_t = DEFAULT_MAX_ENTRIES)]
    pub max_entries: usize,

    /// Leading frames to discard
    #[arg(long, default_value = "0")]
    pub skip: usize,

    /// Drop addresses the walker cannot vouch for
    #[arg(long)]
    pub reliable_only: bool,

    /// Compare frame pointers against the stack pointer
    #[arg(long, value_enum, default_value_t = StackPointerCheck::Off)]
    pub sp_check: StackPointerCheck,

    /// Scheduler text range to leave out of task traces, as START-END in hex (repeatable)
    #[arg(long, value_name = "START-END", value_parser = parse_sched_range)]
    pub sched_range: Vec<MemoryRange>,

    /// Write the capture report as JSON
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Save the stopped thread's stack for later --replay
    #[arg(long, value_name = "FILE", conflicts_with_all = ["replay", "self_test"])]
    pub dump_snapshot: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Capture settings selected on the command line
    #[must_use]
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            max_entries: self.max_entries,
            skip: self.skip,
            reliable_only: self.reliable_only,
            sp_check: self.sp_check,
        }
    }
}
