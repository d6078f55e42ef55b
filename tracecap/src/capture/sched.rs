//! Scheduler-function filter
//!
//! A task that is not running was switched out from inside the scheduler, so
//! the innermost frames of its saved stack are context-switch plumbing rather
//! than anything the task itself called. [`SchedFunctions`] holds the text
//! ranges of that plumbing and is handed to the capture explicitly.

use anyhow::{bail, Context, Result};

use crate::memory::MemoryRange;

/// Sorted, non-overlapping set of scheduler text ranges
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedFunctions {
    ranges: Vec<MemoryRange>,
}

impl SchedFunctions {
    /// Build the set, dropping empty ranges and merging overlapping ones
    #[must_use]
    pub fn new(ranges: impl IntoIterator<Item = MemoryRange>) -> Self {
        let mut sorted: Vec<MemoryRange> = ranges.into_iter().filter(|r| !r.is_empty()).collect();
        sorted.sort();

        let mut merged: Vec<MemoryRange> = Vec::with_capacity(sorted.len());
        for range in sorted {
            match merged.last_mut() {
                Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
                _ => merged.push(range),
            }
        }
        Self { ranges: merged }
    }

    /// Set that matches nothing
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    #[must_use]
    pub fn ranges(&self) -> &[MemoryRange] {
        &self.ranges
    }

    /// Whether `addr` lies inside scheduler or context-switch code
    #[must_use]
    pub fn in_sched_functions(&self, addr: usize) -> bool {
        let idx = self.ranges.partition_point(|range| range.start <= addr);
        idx.checked_sub(1).and_then(|i| self.ranges.get(i)).is_some_and(|range| range.contains(addr))
    }
}

/// Parse a `START-END` pair of hex addresses (with or without `0x`)
///
/// # Errors
/// Returns an error if either bound is not hex or the range is empty.
pub fn parse_range(text: &str) -> Result<MemoryRange> {
    let (start, end) = text.split_once('-').context("expected START-END")?;
    let parse = |value: &str| {
        let digits = value.trim().trim_start_matches("0x");
        usize::from_str_radix(digits, 16).with_context(|| format!("invalid hex address '{value}'"))
    };
    let range = MemoryRange { start: parse(start)?, end: parse(end)? };
    if range.is_empty() {
        bail!("empty range {text}");
    }
    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_sched_functions() {
        let sched = SchedFunctions::new([
            MemoryRange { start: 0x3000, end: 0x3100 },
            MemoryRange { start: 0x1000, end: 0x1200 },
        ]);

        assert!(sched.in_sched_functions(0x1000));
        assert!(sched.in_sched_functions(0x11ff));
        assert!(!sched.in_sched_functions(0x1200));
        assert!(sched.in_sched_functions(0x3050));
        assert!(!sched.in_sched_functions(0x0fff));
        assert!(!sched.in_sched_functions(0x2000));
    }

    #[test]
    fn test_overlapping_ranges_merge() {
        let sched = SchedFunctions::new([
            MemoryRange { start: 0x1000, end: 0x1800 },
            MemoryRange { start: 0x1400, end: 0x2000 },
            MemoryRange { start: 0x5000, end: 0x5000 },
        ]);
        assert_eq!(sched.ranges(), &[MemoryRange { start: 0x1000, end: 0x2000 }]);
    }

    #[test]
    fn test_empty_matches_nothing() {
        assert!(!SchedFunctions::empty().in_sched_functions(0));
        assert!(!SchedFunctions::empty().in_sched_functions(usize::MAX));
    }

    #[test]
    fn test_parse_range() {
        let range = parse_range("0xffff8000-ffff9000").unwrap();
        assert_eq!(range, MemoryRange { start: 0xffff_8000, end: 0xffff_9000 });
        assert!(parse_range("2000-1000").is_err());
        assert!(parse_range("zz-10").is_err());
        assert!(parse_range("1000").is_err());
    }
}
