//! Bounded trace buffer shared by every capture path
//!
//! A [`TraceBuffer`] is created by the caller, handed to exactly one capture,
//! and filled innermost frame first. It never grows past the capacity it was
//! created with.

use tracecap_common::{DEFAULT_MAX_ENTRIES, TRACE_END};

/// What happened to an address offered to [`TraceBuffer::record`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    /// Consumed by the skip counter, nothing stored
    Skipped,
    /// Stored in the next free slot
    Stored,
    /// Dropped because the buffer is full
    Full,
    /// Dropped because it equals [`TRACE_END`]; the skip counter is untouched
    Rejected,
}

/// Fixed-capacity sequence of return addresses plus skip state
///
/// Invariants:
/// - `len() <= capacity()` at all times
/// - skipped frames never take up a slot
/// - after a completed capture, a buffer with room left ends in [`TRACE_END`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceBuffer {
    entries: Vec<usize>,
    max_entries: usize,
    skip: usize,
}

impl TraceBuffer {
    /// Create an empty buffer holding at most `max_entries` slots
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self::with_skip(max_entries, 0)
    }

    /// Create an empty buffer that discards the first `skip` frames offered
    #[must_use]
    pub fn with_skip(max_entries: usize, skip: usize) -> Self {
        Self { entries: Vec::with_capacity(max_entries), max_entries, skip }
    }

    /// Append `addr` if there is room, returning whether it was stored
    ///
    /// Bypasses the skip counter. [`TRACE_END`] is never stored this way, so
    /// a value read off a hostile stack cannot pose as the end marker.
    pub fn push(&mut self, addr: usize) -> bool {
        addr != TRACE_END && self.push_slot(addr)
    }

    fn push_slot(&mut self, addr: usize) -> bool {
        if self.entries.len() < self.max_entries {
            self.entries.push(addr);
            true
        } else {
            false
        }
    }

    /// Offer a candidate frame address
    ///
    /// The skip counter is consulted before the capacity check, so frames
    /// being skipped are discarded even when the buffer is already full.
    pub fn record(&mut self, addr: usize) -> Record {
        if addr == TRACE_END {
            return Record::Rejected;
        }
        if self.skip > 0 {
            self.skip -= 1;
            return Record::Skipped;
        }
        if self.push(addr) {
            Record::Stored
        } else {
            Record::Full
        }
    }

    /// Mark the logical end of the trace
    ///
    /// Writes [`TRACE_END`] if a slot is left. A full buffer gets no marker,
    /// which is how a consumer tells a truncated trace from a complete one.
    pub fn append_sentinel(&mut self) -> bool {
        self.push_slot(TRACE_END)
    }

    /// Number of slots written, including a trailing sentinel
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Frames still to be discarded before recording starts
    #[must_use]
    pub fn remaining_skip(&self) -> usize {
        self.skip
    }

    /// Whether another slot can be written
    #[must_use]
    pub fn has_room(&self) -> bool {
        self.entries.len() < self.max_entries
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        !self.has_room()
    }

    /// All written slots, sentinel included
    #[must_use]
    pub fn entries(&self) -> &[usize] {
        &self.entries
    }

    /// Recorded return addresses, sentinel excluded
    #[must_use]
    pub fn frames(&self) -> &[usize] {
        match self.entries.split_last() {
            Some((&TRACE_END, rest)) => rest,
            _ => &self.entries,
        }
    }

    /// Whether the trace ends in the end-of-trace marker
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.entries.last() == Some(&TRACE_END)
    }

}

impl Default for TraceBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_respects_capacity() {
        let mut buf = TraceBuffer::new(2);
        assert!(buf.push(0x10));
        assert!(buf.push(0x20));
        assert!(!buf.push(0x30));
        assert_eq!(buf.entries(), &[0x10, 0x20]);
        assert!(buf.is_full());
    }

    #[test]
    fn test_skip_happens_before_capacity_check() {
        let mut buf = TraceBuffer::with_skip(1, 2);
        assert_eq!(buf.record(0x10), Record::Skipped);
        assert_eq!(buf.record(0x20), Record::Skipped);
        assert_eq!(buf.record(0x30), Record::Stored);
        assert_eq!(buf.record(0x40), Record::Full);
        assert_eq!(buf.entries(), &[0x30]);
        assert_eq!(buf.remaining_skip(), 0);
    }

    #[test]
    fn test_skip_consumed_even_when_full() {
        let mut buf = TraceBuffer::with_skip(0, 1);
        assert_eq!(buf.record(0x10), Record::Skipped);
        assert_eq!(buf.record(0x20), Record::Full);
    }

    #[test]
    fn test_sentinel_only_when_room() {
        let mut buf = TraceBuffer::new(2);
        buf.push(0x10);
        assert!(buf.append_sentinel());
        assert!(buf.is_terminated());
        assert_eq!(buf.frames(), &[0x10]);
        assert_eq!(buf.entries(), &[0x10, TRACE_END]);

        let mut full = TraceBuffer::new(1);
        full.push(0x10);
        assert!(!full.append_sentinel());
        assert!(!full.is_terminated());
        assert_eq!(full.frames(), &[0x10]);
    }

    #[test]
    fn test_end_marker_never_recorded() {
        let mut buf = TraceBuffer::with_skip(2, 1);
        assert_eq!(buf.record(TRACE_END), Record::Rejected);
        assert_eq!(buf.remaining_skip(), 1);
        assert!(!buf.push(TRACE_END));

        assert_eq!(buf.record(0x10), Record::Skipped);
        assert_eq!(buf.record(0x20), Record::Stored);
        assert!(buf.append_sentinel());
        assert_eq!(buf.entries(), &[0x20, TRACE_END]);
    }

    #[test]
    fn test_zero_capacity_buffer() {
        let mut buf = TraceBuffer::new(0);
        assert!(!buf.append_sentinel());
        assert!(buf.is_empty());
        assert!(buf.frames().is_empty());
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(TraceBuffer::default().capacity(), DEFAULT_MAX_ENTRIES);
    }
}
