//! Execution contexts a capture can be pointed at
//!
//! - [`UserTarget`]: an unprivileged context, optionally without any user
//!   address space (a kernel-only worker)
//! - [`TaskTarget`]: another task whose privileged chain is walked from the
//!   registers it saved when it was switched out
//! - [`StackSnapshot`]: an offline, serializable [`UserTarget`]
//! - [`LiveTarget`]: a stopped thread of a running process

pub mod live;
pub mod snapshot;

pub use live::LiveTarget;
pub use snapshot::{SnapshotRegion, StackSnapshot};

use tracecap_common::{Registers, USER_ADDRESS_LIMIT};

/// User address space of a target plus the registers its walk starts from
#[derive(Debug, Clone)]
pub struct UserSpace<M> {
    pub regs: Registers,
    pub memory: M,
    /// Exclusive upper bound for frame pointers the unwinder will follow
    pub address_limit: usize,
}

impl<M> UserSpace<M> {
    #[must_use]
    pub fn new(regs: Registers, memory: M) -> Self {
        Self { regs, memory, address_limit: USER_ADDRESS_LIMIT }
    }

    #[must_use]
    pub fn with_address_limit(mut self, address_limit: usize) -> Self {
        self.address_limit = address_limit;
        self
    }

    /// Whether `[addr, addr + len)` lies within user space
    #[must_use]
    pub fn access_ok(&self, addr: usize, len: usize) -> bool {
        addr.checked_add(len).is_some_and(|end| end <= self.address_limit)
    }
}

/// Context for a user-stack capture
#[derive(Debug, Clone)]
pub struct UserTarget<M> {
    /// Name used in logs and reports
    pub label: String,
    space: Option<UserSpace<M>>,
}

impl<M> UserTarget<M> {
    #[must_use]
    pub fn new(label: impl Into<String>, space: UserSpace<M>) -> Self {
        Self { label: label.into(), space: Some(space) }
    }

    /// Target that has no user address space
    #[must_use]
    pub fn kernel_thread(label: impl Into<String>) -> Self {
        Self { label: label.into(), space: None }
    }

    #[must_use]
    pub fn space(&self) -> Option<&UserSpace<M>> {
        self.space.as_ref()
    }

    #[must_use]
    pub fn has_address_space(&self) -> bool {
        self.space.is_some()
    }
}

/// Another task, seen through the registers it saved when switched out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTarget {
    pub name: String,
    pub regs: Registers,
}

impl TaskTarget {
    #[must_use]
    pub fn new(name: impl Into<String>, regs: Registers) -> Self {
        Self { name: name.into(), regs }
    }
}
