//! Capture configuration

use clap::ValueEnum;
use tracecap_common::DEFAULT_MAX_ENTRIES;

use crate::trace_buffer::TraceBuffer;

/// When the user unwinder compares a frame pointer against the stack pointer
///
/// A frame pointer below the stack pointer cannot belong to a live caller
/// frame, so the check rejects obviously stale chains. It also stops walks
/// early on stacks that switch (signal stacks, coroutine stacks), which is
/// why it is off unless asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StackPointerCheck {
    /// Never compare
    #[default]
    Off,
    /// Compare before the frame record is read
    Before,
    /// Compare after the frame record was read successfully
    After,
}

/// Settings shared by every capture entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Capacity of the buffers handed out by [`CaptureConfig::new_buffer`]
    pub max_entries: usize,

    /// Leading frames to discard before recording starts
    pub skip: usize,

    /// Drop addresses the frame walker could not vouch for
    pub reliable_only: bool,

    /// Stack-pointer sanity check in the user unwinder
    pub sp_check: StackPointerCheck,
}

impl CaptureConfig {
    /// Fresh buffer sized and skip-primed for this configuration
    #[must_use]
    pub fn new_buffer(&self) -> TraceBuffer {
        TraceBuffer::with_skip(self.max_entries, self.skip)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            skip: 0,
            reliable_only: false,
            sp_check: StackPointerCheck::Off,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_uses_config() {
        let config = CaptureConfig { max_entries: 8, skip: 3, ..CaptureConfig::default() };
        let buf = config.new_buffer();
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.remaining_skip(), 3);
    }

    #[test]
    fn test_sp_check_off_by_default() {
        assert_eq!(CaptureConfig::default().sp_check, StackPointerCheck::Off);
    }
}
