//! Capture report export
//!
//! This module turns a finished capture into a serializable report and writes
//! it as JSON for tooling that symbolizes or aggregates traces later.

pub mod report;

pub use report::{export_to_file, write_report, CaptureReport};
