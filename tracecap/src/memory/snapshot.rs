//! In-memory address space made of captured regions
//!
//! Used to replay a stack that was dumped earlier and to drive the unwinder
//! against hand-built (including deliberately corrupt) chains.

use tracecap_common::WORD_SIZE;

use super::maps::MemoryRange;
use super::safe_read::SafeRead;
use crate::domain::ReadFault;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Region {
    start: usize,
    bytes: Vec<u8>,
}

impl Region {
    fn range(&self) -> MemoryRange {
        MemoryRange { start: self.start, end: self.start + self.bytes.len() }
    }
}

/// Sparse address space backed by owned byte regions
///
/// Anything outside the regions added reads as unmapped. A read must fall
/// entirely within one region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotMemory {
    regions: Vec<Region>,
}

impl SnapshotMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `bytes` at `start`, replacing any region it overlaps
    ///
    /// A region that would extend past the end of the address space is
    /// truncated to fit.
    pub fn add_region(&mut self, start: usize, mut bytes: Vec<u8>) {
        let room = usize::MAX - start;
        bytes.truncate(room);
        let new = Region { start, bytes };
        let new_range = new.range();

        self.regions.retain(|region| {
            let range = region.range();
            range.end <= new_range.start || range.start >= new_range.end
        });
        let at = self.regions.partition_point(|region| region.start < start);
        self.regions.insert(at, new);
    }

    /// Map a run of native-endian words at `start`
    pub fn add_words(&mut self, start: usize, words: &[usize]) {
        let bytes = words.iter().flat_map(|word| word.to_ne_bytes()).collect();
        self.add_region(start, bytes);
    }

    /// Ranges currently mapped, sorted by start address
    #[must_use]
    pub fn ranges(&self) -> Vec<MemoryRange> {
        self.regions.iter().map(Region::range).collect()
    }

    /// Read back the word stored at `addr`, if mapped
    #[must_use]
    pub fn word_at(&self, addr: usize) -> Option<usize> {
        let mut word = [0u8; WORD_SIZE];
        self.try_read(addr, &mut word).ok()?;
        Some(usize::from_ne_bytes(word))
    }
}

impl SafeRead for SnapshotMemory {
    fn try_read(&self, addr: usize, buf: &mut [u8]) -> Result<(), ReadFault> {
        let len = buf.len();
        let end = addr.checked_add(len).ok_or(ReadFault::OutOfRange { addr, len })?;

        let idx = self.regions.partition_point(|region| region.start <= addr);
        let region = idx
            .checked_sub(1)
            .and_then(|i| self.regions.get(i))
            .filter(|region| end <= region.range().end)
            .ok_or(ReadFault::Unmapped { addr, len })?;

        let offset = addr - region.start;
        buf.copy_from_slice(&region.bytes[offset..offset + len]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_inside_region() {
        let mut memory = SnapshotMemory::new();
        memory.add_region(0x1000, vec![1, 2, 3, 4]);

        let mut buf = [0u8; 2];
        memory.try_read(0x1001, &mut buf).unwrap();
        assert_eq!(buf, [2, 3]);
    }

    #[test]
    fn test_read_past_region_end_is_unmapped() {
        let mut memory = SnapshotMemory::new();
        memory.add_region(0x1000, vec![0; 8]);

        let mut buf = [0u8; 4];
        let err = memory.try_read(0x1006, &mut buf).unwrap_err();
        assert_eq!(err, ReadFault::Unmapped { addr: 0x1006, len: 4 });
        assert!(memory.try_read(0x0ffe, &mut buf).is_err());
    }

    #[test]
    fn test_read_wrapping_range() {
        let memory = SnapshotMemory::new();
        let mut buf = [0u8; 4];
        let err = memory.try_read(usize::MAX - 1, &mut buf).unwrap_err();
        assert!(matches!(err, ReadFault::OutOfRange { .. }));
    }

    #[test]
    fn test_overlapping_region_replaces_old() {
        let mut memory = SnapshotMemory::new();
        memory.add_region(0x1000, vec![1; 16]);
        memory.add_region(0x2000, vec![3; 16]);
        memory.add_region(0x1008, vec![2; 16]);

        assert_eq!(memory.ranges().len(), 2);
        let mut buf = [0u8; 1];
        assert!(memory.try_read(0x1000, &mut buf).is_err());
        memory.try_read(0x1008, &mut buf).unwrap();
        assert_eq!(buf, [2]);
    }

    #[test]
    fn test_words_round_trip() {
        let mut memory = SnapshotMemory::new();
        memory.add_words(0x4000, &[0xdead, 0xbeef]);
        assert_eq!(memory.word_at(0x4000), Some(0xdead));
        assert_eq!(memory.word_at(0x4000 + WORD_SIZE), Some(0xbeef));
        assert_eq!(memory.word_at(0x4000 + 2 * WORD_SIZE), None);
    }
}
