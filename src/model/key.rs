use std::fmt;

use crate::tracer::event::Event;

/// Process id substituted for objects whose address lies in kernel space.
pub const KERNEL_PROCESS_ID: u32 = u32::MAX;

/// Identity of a traced object: its address plus the process that owns it.
///
/// Kernel-mode addresses are keyed under [`KERNEL_PROCESS_ID`] so that a
/// user-mode object with the same bit pattern never aliases them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub pointer: u64,
    pub process_id: u32,
}

impl ObjectKey {
    /// Resolves a key from a raw pointer. The sign bit is tested at the
    /// width given by `pointer_size`; anything other than 4 is treated as 8.
    pub const fn resolve(pointer: u64, pointer_size: u8, process_id: u32) -> Self {
        let sign_bit = if pointer_size == 4 { 1u64 << 31 } else { 1u64 << 63 };
        let process_id = if pointer & sign_bit != 0 {
            KERNEL_PROCESS_ID
        } else {
            process_id
        };
        Self {
            pointer,
            process_id,
        }
    }

    /// Key of the object an event is scoped to.
    pub const fn of_event(evt: &Event) -> Self {
        Self::resolve(evt.object_pointer, evt.pointer_size, evt.process_id)
    }

    /// Key of a related object named in an event payload, resolved in the
    /// event's own address space.
    pub const fn related(evt: &Event, pointer: u64) -> Self {
        Self::resolve(pointer, evt.pointer_size, evt.process_id)
    }

    pub const fn is_kernel(&self) -> bool {
        self.process_id == KERNEL_PROCESS_ID
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_kernel() {
            write!(f, "0x{:x}@kernel", self.pointer)
        } else {
            write!(f, "0x{:x}@{}", self.pointer, self.process_id)
        }
    }
}
