//! Pre-flight checks for live capture
//!
//! Validates that a thread can be stopped and read before attempting to
//! attach to it. Provides clear, actionable error messages when requirements
//! aren't met.

#![allow(unsafe_code)] // geteuid() requires unsafe

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::domain::Pid;

const PTRACE_SCOPE_PATH: &str = "/proc/sys/kernel/yama/ptrace_scope";

/// Run all pre-flight checks before attaching to `pid`
pub fn run_preflight_checks(pid: Pid) -> Result<()> {
    check_platform()?;
    check_process_exists(pid)?;
    check_proc_access(pid)?;
    check_ptrace_permission()?;
    Ok(())
}

/// Live capture reads registers with `PTRACE_GETREGS`
fn check_platform() -> Result<()> {
    if cfg!(all(target_os = "linux", target_arch = "x86_64")) {
        return Ok(());
    }
    bail!(
        "Live capture is only supported on Linux x86-64 (this is {} {}).\n\n\
         Capture a snapshot on a supported machine and use --replay instead.",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
}

/// Check whether this process may ptrace a non-child process
fn check_ptrace_permission() -> Result<()> {
    // SAFETY: geteuid has no preconditions
    if unsafe { libc::geteuid() } == 0 {
        return Ok(());
    }

    // No Yama LSM means classic ptrace rules: same uid is enough
    let Ok(content) = std::fs::read_to_string(PTRACE_SCOPE_PATH) else {
        return Ok(());
    };
    check_ptrace_scope(&content)
}

fn check_ptrace_scope(content: &str) -> Result<()> {
    match content.trim() {
        "0" => Ok(()),
        "1" => bail!(
            "Permission denied: ptrace is restricted to descendants (ptrace_scope=1).\n\n\
             Run with: sudo tracecap ...\n\
             or relax it with: echo 0 | sudo tee {PTRACE_SCOPE_PATH}"
        ),
        "2" => bail!(
            "Permission denied: ptrace requires CAP_SYS_PTRACE (ptrace_scope=2).\n\n\
             Run with: sudo tracecap ..."
        ),
        "3" => bail!("Permission denied: ptrace is disabled on this system (ptrace_scope=3)."),
        // Unknown value, let attach report the real error
        _ => Ok(()),
    }
}

/// Check if the target process exists
pub fn check_process_exists(pid: Pid) -> Result<()> {
    let proc_path = format!("/proc/{}", pid.0);
    if !Path::new(&proc_path).exists() {
        bail!(
            "Process {} not found.\n\n\
             Is the process still running? Check with: ps -p {}",
            pid.0,
            pid.0
        );
    }
    Ok(())
}

/// Check if we can read the process's memory maps
pub fn check_proc_access(pid: Pid) -> Result<()> {
    let maps_path = format!("/proc/{}/maps", pid.0);
    std::fs::read_to_string(&maps_path).with_context(|| {
        format!(
            "Cannot read {maps_path}\n\n\
             This usually means:\n\
             - The process doesn't exist (check: ps -p {})\n\
             - Permission denied (run with sudo)\n\
             - /proc is not mounted",
            pid.0
        )
    })?;
    Ok(())
}
