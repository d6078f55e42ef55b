//! The fault-tolerant read capability
//!
//! Target memory is only ever touched through [`SafeRead::try_read`]. An
//! implementation must report failure instead of faulting or blocking the
//! caller, whatever address it is handed.

use tracecap_common::{StackFrameUser, FRAME_RECORD_SIZE, WORD_SIZE};

use crate::domain::ReadFault;

/// Read bytes out of an address space without faulting the caller
pub trait SafeRead {
    /// Fill `buf` with the bytes at `addr .. addr + buf.len()`
    ///
    /// # Errors
    /// Returns the [`ReadFault`] describing why the range could not be read.
    /// A failed read leaves the contents of `buf` unspecified.
    fn try_read(&self, addr: usize, buf: &mut [u8]) -> Result<(), ReadFault>;
}

impl<T: SafeRead + ?Sized> SafeRead for &T {
    fn try_read(&self, addr: usize, buf: &mut [u8]) -> Result<(), ReadFault> {
        (**self).try_read(addr, buf)
    }
}

impl<T: SafeRead + ?Sized> SafeRead for Box<T> {
    fn try_read(&self, addr: usize, buf: &mut [u8]) -> Result<(), ReadFault> {
        (**self).try_read(addr, buf)
    }
}

/// Read one frame-link record at `addr`
///
/// This is the single place a frame record is decoded. Misaligned and
/// wrapping addresses are rejected before the reader is asked.
///
/// # Errors
/// Returns a [`ReadFault`] if the record cannot be read in full.
pub fn read_frame_record<M: SafeRead + ?Sized>(
    memory: &M,
    addr: usize,
) -> Result<StackFrameUser, ReadFault> {
    if addr % WORD_SIZE != 0 {
        return Err(ReadFault::Misaligned { addr });
    }
    if addr.checked_add(FRAME_RECORD_SIZE).is_none() {
        return Err(ReadFault::OutOfRange { addr, len: FRAME_RECORD_SIZE });
    }

    let mut bytes = [0u8; FRAME_RECORD_SIZE];
    memory.try_read(addr, &mut bytes)?;
    Ok(StackFrameUser::from_ne_bytes(&bytes))
}
