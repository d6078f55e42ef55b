//! Resolve process names and thread IDs from `/proc`.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{Pid, Tid};

/// Result of process lookup.
#[derive(Debug)]
pub struct ProcessInfo {
    pub pid: Pid,
    /// Absent for kernel threads
    pub exe_path: Option<PathBuf>,
    pub command: String,
}

/// One thread of a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub tid: Tid,
    pub comm: String,
}

/// Find a process by name.
///
/// Searches `/proc` for processes matching the given name.
/// Matches against the command name from `/proc/<pid>/stat` and, when the
/// process has one, the executable basename from `/proc/<pid>/exe`.
///
/// # Errors
/// - No processes found
/// - Multiple processes found (ambiguous)
pub fn find_process_by_name(name: &str) -> Result<ProcessInfo> {
    let mut matches: Vec<ProcessInfo> = Vec::new();
    let own_pid = std::process::id();

    let proc_dir = fs::read_dir("/proc").context("Failed to read /proc")?;

    for entry in proc_dir.flatten() {
        let file_name = entry.file_name();
        let pid_str = file_name.to_string_lossy();

        let Ok(pid) = pid_str.parse::<i32>() else {
            continue;
        };
        if u32::try_from(pid).is_ok_and(|pid| pid == own_pid) {
            continue;
        }

        let stat_path = format!("/proc/{pid}/stat");
        let Ok(stat_content) = fs::read_to_string(&stat_path) else {
            continue;
        };
        let Ok(command) = extract_comm(&stat_content) else {
            continue;
        };

        // kernel threads have no exe link
        let exe_path = fs::read_link(format!("/proc/{pid}/exe")).ok();

        if is_match(&command, exe_path.as_deref(), name) {
            matches.push(ProcessInfo { pid: Pid(pid), exe_path, command });
        }
    }

    match matches.len() {
        0 => bail!(
            "No process matching '{name}' found.\n\
             Check running processes with: ps aux | grep {name}"
        ),
        1 => Ok(matches.remove(0)),
        _ => {
            let list: Vec<String> =
                matches.iter().map(|m| format!("  {} ({})", m.pid.0, m.command)).collect();
            bail!(
                "Multiple processes match '{name}':\n{}\n\n\
                 Specify PID explicitly: tracecap --pid <PID>",
                list.join("\n")
            )
        }
    }
}

/// List the threads of a process from `/proc/<pid>/task`.
///
/// # Errors
/// Returns error if the task directory cannot be read.
pub fn list_process_threads(pid: Pid) -> Result<Vec<ThreadInfo>> {
    let task_dir = format!("/proc/{}/task", pid.0);
    let entries = fs::read_dir(&task_dir).with_context(|| format!("Failed to read {task_dir}"))?;

    let mut threads: Vec<ThreadInfo> = entries
        .flatten()
        .filter_map(|entry| {
            let tid = entry.file_name().to_string_lossy().parse::<i32>().ok()?;
            let comm = fs::read_to_string(entry.path().join("comm")).ok()?;
            Some(ThreadInfo { tid: Tid(tid), comm: comm.trim().to_string() })
        })
        .collect();
    threads.sort_by_key(|thread| thread.tid.0);
    Ok(threads)
}

/// Pick the thread to capture: `tid` if given, else the main thread.
///
/// # Errors
/// Returns error if `tid` is not a thread of `pid`.
pub fn resolve_thread(pid: Pid, tid: Option<Tid>) -> Result<Tid> {
    let Some(tid) = tid else {
        return Ok(Tid::from(pid));
    };
    let threads = list_process_threads(pid)?;
    if threads.iter().any(|thread| thread.tid == tid) {
        Ok(tid)
    } else {
        bail!(
            "Thread {} is not part of process {}.\n\
             List its threads with: ls /proc/{}/task",
            tid.0,
            pid.0,
            pid.0
        )
    }
}

/// Extract command name from `/proc/<pid>/stat`.
/// Format: "pid (comm) state ..."
fn extract_comm(stat_line: &str) -> Result<String> {
    let open = stat_line.find('(').context("Invalid stat format")?;
    let close = stat_line.rfind(')').context("Invalid stat format")?;
    if open >= close {
        bail!("Invalid stat format");
    }
    Ok(stat_line[open + 1..close].to_string())
}

/// Check if process matches the search pattern.
fn is_match(command: &str, exe_path: Option<&Path>, pattern: &str) -> bool {
    let exe_basename =
        exe_path.and_then(|path| path.file_name()).and_then(|n| n.to_str()).unwrap_or("");

    let pattern_basename =
        Path::new(pattern).file_name().and_then(|n| n.to_str()).unwrap_or(pattern);

    command == pattern_basename
        || (!exe_basename.is_empty() && exe_basename == pattern_basename)
        || command.contains(pattern)
        || (!exe_basename.is_empty() && exe_basename.contains(pattern))
}
