//! # Target Memory Access
//!
//! Everything the capture core knows about target memory goes through the
//! [`SafeRead`] capability defined here. The unwinder never dereferences a
//! pointer it found on a stack; it asks a reader for the bytes and gets back
//! either the bytes or a [`ReadFault`](crate::domain::ReadFault).
//!
//! ## Readers
//!
//! - [`SnapshotMemory`]: regions captured earlier (replay files, tests)
//! - [`RemoteMemory`]: another live process, via `process_vm_readv`
//! - [`LocalMemory`]: the calling process itself, via the same syscall
//!
//! ## Address Space Layout
//!
//! [`maps`] parses `/proc/<pid>/maps` so that [`RemoteMemory`] can refuse
//! reads of unmapped ranges up front and so that a process with no mappings
//! can be recognised as having no user address space.

pub mod maps;
pub mod remote;
pub mod safe_read;
pub mod snapshot;

pub use maps::{parse_maps_content, parse_memory_maps, MapRegion, MemoryRange};
pub use remote::{LocalMemory, RemoteMemory};
pub use safe_read::{read_frame_record, SafeRead};
pub use snapshot::SnapshotMemory;
