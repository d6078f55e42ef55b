//! Reading the live registers of the calling context

#![allow(unsafe_code)] // inline asm requires unsafe

use tracecap_common::Registers;

/// Current frame pointer register
#[cfg(target_arch = "x86_64")]
#[inline(always)]
#[must_use]
pub fn current_frame_pointer() -> Option<usize> {
    let frame_ptr: usize;
    // SAFETY: copies a register, touches no memory
    unsafe {
        core::arch::asm!("mov {}, rbp", out(reg) frame_ptr, options(nomem, nostack, preserves_flags));
    }
    Some(frame_ptr)
}

/// Current frame pointer register
#[cfg(target_arch = "aarch64")]
#[inline(always)]
#[must_use]
pub fn current_frame_pointer() -> Option<usize> {
    let frame_ptr: usize;
    // SAFETY: copies a register, touches no memory
    unsafe {
        core::arch::asm!("mov {}, x29", out(reg) frame_ptr, options(nomem, nostack, preserves_flags));
    }
    Some(frame_ptr)
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[must_use]
pub fn current_frame_pointer() -> Option<usize> {
    None
}

/// Program counter, stack pointer and frame pointer of the caller
#[cfg(target_arch = "x86_64")]
#[inline(always)]
#[must_use]
pub fn current_registers() -> Option<Registers> {
    let (ip, sp, bp): (usize, usize, usize);
    // SAFETY: copies registers, touches no memory
    unsafe {
        core::arch::asm!(
            "lea {ip}, [rip]",
            "mov {sp}, rsp",
            "mov {bp}, rbp",
            ip = out(reg) ip,
            sp = out(reg) sp,
            bp = out(reg) bp,
            options(nomem, nostack, preserves_flags)
        );
    }
    Some(Registers { ip, sp, bp })
}

/// Program counter, stack pointer and frame pointer of the caller
#[cfg(target_arch = "aarch64")]
#[inline(always)]
#[must_use]
pub fn current_registers() -> Option<Registers> {
    let (ip, sp, bp): (usize, usize, usize);
    // SAFETY: copies registers, touches no memory
    unsafe {
        core::arch::asm!(
            "adr {ip}, .",
            "mov {sp}, sp",
            "mov {bp}, x29",
            ip = out(reg) ip,
            sp = out(reg) sp,
            bp = out(reg) bp,
            options(nomem, nostack, preserves_flags)
        );
    }
    Some(Registers { ip, sp, bp })
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[must_use]
pub fn current_registers() -> Option<Registers> {
    None
}
