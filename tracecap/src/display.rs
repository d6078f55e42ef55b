//! Plain-text rendering of capture results

use crate::export::CaptureReport;
use crate::target::StackSnapshot;

/// Print a capture report, one return address per line
pub fn print_report(report: &CaptureReport) {
    println!("\n[TRACE] {} mode={} entries={}", report.target, report.mode, report.frames.len());
    for (depth, addr) in report.frames.iter().enumerate() {
        println!("  #{depth:<3} 0x{addr:016x}");
    }
    if !report.terminated {
        println!("  ... (buffer full, max_entries={})", report.max_entries);
    }
    if let Some(reason) = report.stop_reason {
        println!("  stop={reason}");
    }
}

/// Print where a snapshot was taken
pub fn print_snapshot_summary(snapshot: &StackSnapshot) {
    match snapshot.registers {
        Some(regs) => println!(
            "snapshot: {} ip=0x{:x} sp=0x{:x} fp=0x{:x} regions={}",
            snapshot.label,
            regs.ip,
            regs.sp,
            regs.bp,
            snapshot.regions.len()
        ),
        None => println!("snapshot: {} (no user address space)", snapshot.label),
    }
}
