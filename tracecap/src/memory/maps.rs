//! Memory mapping utilities for process address space analysis
//!
//! This module parses `/proc/<pid>/maps` into the set of regions a process has
//! mapped. The capture core uses it for two things: refusing to issue a read
//! against an address range that is not readable, and recognising a process
//! that has no user mappings at all.

use log::debug;
use std::fs;

use crate::domain::{Pid, TargetError};

/// Half-open address range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemoryRange {
    pub start: usize,
    pub end: usize,
}

impl MemoryRange {
    /// Check if an address falls within this memory range
    #[must_use]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.start && addr < self.end
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Check whether `[addr, addr + len)` is fully covered by `ranges`
///
/// `ranges` must be sorted by start address. Adjacent ranges count as one,
/// so a read may straddle two back-to-back mappings.
#[must_use]
pub fn ranges_cover(ranges: &[MemoryRange], addr: usize, len: usize) -> bool {
    let Some(end) = addr.checked_add(len) else {
        return false;
    };
    let mut cursor = addr;
    for range in ranges {
        if range.end <= cursor {
            continue;
        }
        if range.start > cursor {
            return false;
        }
        cursor = range.end;
        if cursor >= end {
            return true;
        }
    }
    cursor >= end
}

/// One line of `/proc/<pid>/maps`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRegion {
    pub range: MemoryRange,
    pub readable: bool,
    pub executable: bool,
    /// Backing file or pseudo-name such as `[stack]`
    pub pathname: Option<String>,
}

/// Parse /proc/pid/maps into its regions, sorted by start address
///
/// # Errors
/// Returns an error if /proc/pid/maps cannot be read
pub fn parse_memory_maps(pid: Pid) -> Result<Vec<MapRegion>, TargetError> {
    let maps_path = format!("/proc/{}/maps", pid.0);
    let maps = fs::read_to_string(&maps_path).map_err(|err| {
        debug!("Failed to read {maps_path}: {err}");
        TargetError::MemoryMapsParseFailed(pid)
    })?;

    let regions = parse_maps_content(&maps);
    debug!("{pid}: {} mapped regions", regions.len());
    Ok(regions)
}

/// Parse the text of a maps file
///
/// Lines that do not follow "start-end perms offset dev inode pathname" are
/// skipped rather than failing the whole parse.
#[must_use]
pub fn parse_maps_content(maps: &str) -> Vec<MapRegion> {
    let mut regions: Vec<MapRegion> = maps.lines().filter_map(parse_maps_line).collect();
    regions.sort_by_key(|region| region.range);
    regions
}

fn parse_maps_line(line: &str) -> Option<MapRegion> {
    let mut parts = line.split_whitespace();
    let (start, end) = parts.next()?.split_once('-')?;
    let perms = parts.next()?.as_bytes();

    let range = MemoryRange {
        start: usize::from_str_radix(start, 16).ok()?,
        end: usize::from_str_radix(end, 16).ok()?,
    };

    // offset, dev, inode
    let pathname = parts.nth(3).map(str::to_string);

    Some(MapRegion {
        range,
        readable: perms.first() == Some(&b'r'),
        executable: perms.get(2) == Some(&b'x'),
        pathname,
    })
}

/// Ranges of the regions that can be read, merged where they touch
#[must_use]
pub fn readable_ranges(regions: &[MapRegion]) -> Vec<MemoryRange> {
    let mut merged: Vec<MemoryRange> = Vec::new();
    for region in regions.iter().filter(|region| region.readable) {
        match merged.last_mut() {
            Some(last) if last.end == region.range.start => last.end = region.range.end,
            _ => merged.push(region.range),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MAPS: &str = "\
55d4a8c00000-55d4a8c2a000 r--p 00000000 08:01 1311 /usr/bin/app
55d4a8c2a000-55d4a8d00000 r-xp 0002a000 08:01 1311 /usr/bin/app
55d4a8f00000-55d4a8f21000 rw-p 00000000 00:00 0 [heap]
7f1c2a000000-7f1c2a001000 ---p 00000000 00:00 0
7ffd6b5e0000-7ffd6b601000 rw-p 00000000 00:00 0 [stack]
";

    #[test]
    fn test_memory_range_contains() {
        let range = MemoryRange { start: 0x1000, end: 0x2000 };

        assert!(range.contains(0x1000));
        assert!(range.contains(0x1500));
        assert!(range.contains(0x1FFF));
        assert!(!range.contains(0x0FFF));
        assert!(!range.contains(0x2000));
        assert!(!range.contains(0x2001));
    }

    #[test]
    fn test_parse_maps_content() {
        let regions = parse_maps_content(SAMPLE_MAPS);
        assert_eq!(regions.len(), 5);

        assert_eq!(regions[0].pathname.as_deref(), Some("/usr/bin/app"));
        assert!(regions[1].executable);
        assert!(!regions[3].readable);
        assert_eq!(regions[3].pathname, None);
        assert_eq!(regions[4].pathname.as_deref(), Some("[stack]"));
        assert_eq!(regions[4].range.start, 0x7ffd_6b5e_0000);
    }

    #[test]
    fn test_parse_skips_garbage_lines() {
        let regions = parse_maps_content("not a maps line\n1000-2000 r--p 0 0:0 0\n");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].range, MemoryRange { start: 0x1000, end: 0x2000 });
    }

    #[test]
    fn test_readable_ranges_merge_adjacent() {
        let ranges = readable_ranges(&parse_maps_content(SAMPLE_MAPS));
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0], MemoryRange { start: 0x55d4_a8c0_0000, end: 0x55d4_a8d0_0000 });
    }

    #[test]
    fn test_ranges_cover() {
        let ranges = [
            MemoryRange { start: 0x1000, end: 0x2000 },
            MemoryRange { start: 0x2000, end: 0x3000 },
            MemoryRange { start: 0x5000, end: 0x6000 },
        ];
        assert!(ranges_cover(&ranges, 0x1ff8, 16));
        assert!(ranges_cover(&ranges, 0x5000, 0x1000));
        assert!(!ranges_cover(&ranges, 0x2ff8, 16));
        assert!(!ranges_cover(&ranges, 0x4000, 8));
        assert!(!ranges_cover(&ranges, usize::MAX - 4, 8));
    }

    #[test]
    fn test_parse_memory_maps_self() {
        let pid = Pid(std::process::id() as i32);
        let regions = parse_memory_maps(pid).expect("own maps should be readable");
        assert!(regions.iter().any(|region| region.readable));
    }
}
