//! JSON capture reports

use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracecap_common::StopReason;

use crate::domain::{CaptureMode, ExportError};
use crate::trace_buffer::TraceBuffer;

/// Outcome of one capture call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReport {
    /// Label of the walked context
    pub target: String,
    pub mode: CaptureMode,
    pub max_entries: usize,

    /// Recorded return addresses, innermost first, without the end marker
    pub frames: Vec<usize>,

    /// Whether the end-of-trace marker was written
    pub terminated: bool,

    /// Why a user walk ended; absent for privileged captures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_code: Option<char>,
}

impl CaptureReport {
    #[must_use]
    pub fn new(
        target: impl Into<String>,
        mode: CaptureMode,
        trace: &TraceBuffer,
        stop_reason: Option<StopReason>,
    ) -> Self {
        Self {
            target: target.into(),
            mode,
            max_entries: trace.capacity(),
            frames: trace.frames().to_vec(),
            terminated: trace.is_terminated(),
            stop_reason,
            stop_code: stop_reason.map(StopReason::code),
        }
    }
}

/// Write `report` as pretty-printed JSON
///
/// # Errors
/// Returns an error if serialization or the underlying writer fails.
pub fn write_report<W: Write>(report: &CaptureReport, mut writer: W) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Write `report` to the file at `path`, replacing it
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn export_to_file(report: &CaptureReport, path: &Path) -> Result<(), ExportError> {
    let file = File::create(path)
        .map_err(|e| ExportError::WriteFailed(format!("{}: {e}", path.display())))?;
    write_report(report, BufWriter::new(file))?;
    info!("Wrote capture report for '{}' to {}", report.target, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracecap_common::TRACE_END;

    fn user_trace() -> TraceBuffer {
        let mut trace = TraceBuffer::new(4);
        trace.push(0x1000);
        trace.push(0x1004);
        trace.append_sentinel();
        trace
    }

    #[test]
    fn test_report_excludes_sentinel() {
        let report = CaptureReport::new(
            "worker",
            CaptureMode::User,
            &user_trace(),
            Some(StopReason::SelfReferentialFrame),
        );
        assert_eq!(report.frames, vec![0x1000, 0x1004]);
        assert!(!report.frames.contains(&TRACE_END));
        assert!(report.terminated);
        assert_eq!(report.stop_code, Some('e'));
    }

    #[test]
    fn test_json_fields() {
        let report = CaptureReport::new(
            "worker",
            CaptureMode::User,
            &user_trace(),
            Some(StopReason::CopyFailed),
        );
        let mut out = Vec::new();
        write_report(&report, &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["mode"], "user");
        assert_eq!(value["stop_reason"], "copy_failed");
        assert_eq!(value["stop_code"], "c");
        assert_eq!(value["frames"][1], 0x1004);
    }

    #[test]
    fn test_privileged_report_omits_stop_reason() {
        let report = CaptureReport::new("self", CaptureMode::Kernel, &user_trace(), None);
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("stop_reason"));
        assert!(!json.contains("stop_code"));
    }
}
