//! Offline stack snapshots
//!
//! A snapshot records everything a user-stack walk needs: the starting
//! registers and the memory words the chain lives in. It is stored as JSON so
//! that a stack captured on one machine can be replayed (or hand-edited into
//! a corrupt one) elsewhere.

use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracecap_common::{Registers, USER_ADDRESS_LIMIT};

use super::{UserSpace, UserTarget};
use crate::domain::TargetError;
use crate::memory::SnapshotMemory;

fn default_address_limit() -> usize {
    USER_ADDRESS_LIMIT
}

/// Run of native-endian words starting at `start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRegion {
    pub start: usize,
    pub words: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSnapshot {
    pub label: String,

    /// Starting registers; absent for a context without user address space
    #[serde(default)]
    pub registers: Option<Registers>,

    #[serde(default = "default_address_limit")]
    pub address_limit: usize,

    #[serde(default)]
    pub regions: Vec<SnapshotRegion>,
}

impl StackSnapshot {
    #[must_use]
    pub fn new(label: impl Into<String>, registers: Option<Registers>) -> Self {
        Self {
            label: label.into(),
            registers,
            address_limit: USER_ADDRESS_LIMIT,
            regions: Vec::new(),
        }
    }

    /// Add a run of words at `start`
    pub fn push_words(&mut self, start: usize, words: Vec<usize>) {
        self.regions.push(SnapshotRegion { start, words });
    }

    /// Load a snapshot from a JSON file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// describes overlapping regions.
    pub fn load(path: &Path) -> Result<Self, TargetError> {
        let file = File::open(path)?;
        let snapshot = Self::from_reader(BufReader::new(file))?;
        info!(
            "Loaded snapshot '{}' from {} ({} regions)",
            snapshot.label,
            path.display(),
            snapshot.regions.len()
        );
        Ok(snapshot)
    }

    /// # Errors
    /// Returns an error on malformed JSON or overlapping regions.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TargetError> {
        let snapshot: Self = serde_json::from_reader(reader)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Write the snapshot as pretty-printed JSON
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn save(&self, path: &Path) -> Result<(), TargetError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    fn validate(&self) -> Result<(), TargetError> {
        let word = std::mem::size_of::<usize>();
        let mut spans: Vec<(usize, usize)> = Vec::with_capacity(self.regions.len());
        for region in &self.regions {
            let end = region
                .words
                .len()
                .checked_mul(word)
                .and_then(|len| region.start.checked_add(len))
                .ok_or_else(|| {
                    TargetError::InvalidSnapshot(format!(
                        "region at 0x{:x} runs past the end of the address space",
                        region.start
                    ))
                })?;
            spans.push((region.start, end));
        }

        spans.sort_unstable();
        for pair in spans.windows(2) {
            if pair[1].0 < pair[0].1 {
                return Err(TargetError::InvalidSnapshot(format!(
                    "regions at 0x{:x} and 0x{:x} overlap",
                    pair[0].0, pair[1].0
                )));
            }
        }
        Ok(())
    }

    /// Address space the snapshot describes
    #[must_use]
    pub fn memory(&self) -> SnapshotMemory {
        let mut memory = SnapshotMemory::new();
        for region in &self.regions {
            memory.add_words(region.start, &region.words);
        }
        memory
    }

    /// Turn the snapshot into a capture target
    #[must_use]
    pub fn to_target(&self) -> UserTarget<SnapshotMemory> {
        match self.registers {
            Some(regs) => UserTarget::new(
                self.label.clone(),
                UserSpace::new(regs, self.memory()).with_address_limit(self.address_limit),
            ),
            None => UserTarget::kernel_thread(self.label.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{ "label": "worker", "registers": { "ip": 4096, "sp": 8192, "bp": 8208 } }"#;
        let snapshot = StackSnapshot::from_reader(json.as_bytes()).unwrap();

        assert_eq!(snapshot.address_limit, USER_ADDRESS_LIMIT);
        assert!(snapshot.regions.is_empty());
        assert!(snapshot.to_target().has_address_space());
    }

    #[test]
    fn test_missing_registers_is_kernel_thread() {
        let json = r#"{ "label": "kthreadd" }"#;
        let snapshot = StackSnapshot::from_reader(json.as_bytes()).unwrap();
        assert!(!snapshot.to_target().has_address_space());
    }

    #[test]
    fn test_overlapping_regions_rejected() {
        let mut snapshot = StackSnapshot::new("bad", None);
        snapshot.push_words(0x1000, vec![0; 4]);
        snapshot.push_words(0x1008, vec![0; 1]);
        let json = serde_json::to_string(&snapshot).unwrap();

        let err = StackSnapshot::from_reader(json.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_memory_contains_regions() {
        let mut snapshot = StackSnapshot::new("stack", None);
        snapshot.push_words(0x2000, vec![0xaa, 0xbb]);
        let memory = snapshot.memory();
        assert_eq!(memory.word_at(0x2000 + std::mem::size_of::<usize>()), Some(0xbb));
    }

    #[test]
    fn test_invalid_json() {
        let err = StackSnapshot::from_reader("{ not json".as_bytes()).unwrap_err();
        assert!(matches!(err, TargetError::Json(_)));
    }
}
