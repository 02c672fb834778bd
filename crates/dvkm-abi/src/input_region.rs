//! The exported input region.
//!
//! The emulator resolves `dvkm_harness_input` in the harness image and writes
//! each testcase straight into guest memory while the guest is parked on the
//! entry marker. Rust code only ever reads it, through [`InputSource::ready`].

use std::cell::UnsafeCell;
use std::sync::atomic::{Ordering, compiler_fence};

use dvkm_core::{INPUT_CAPACITY, InputBuffer, InputSource};

/// A statically allocated input buffer written from outside the program.
#[repr(transparent)]
pub struct InputRegion(UnsafeCell<InputBuffer>);

// SAFETY: the harness is single-threaded and never writes the region; the
// only writer is the emulator, which does so while the guest is stopped.
unsafe impl Sync for InputRegion {}

impl InputRegion {
    #[must_use]
    pub const fn zeroed() -> Self {
        Self(UnsafeCell::new(InputBuffer::zeroed()))
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        INPUT_CAPACITY
    }
}

impl InputSource for InputRegion {
    fn ready(&self) -> &InputBuffer {
        // Keep the compiler from hoisting the region's loads above the entry
        // marker, where the emulator's write happens.
        compiler_fence(Ordering::SeqCst);
        let ptr = std::hint::black_box(self.0.get());
        // SAFETY: ptr comes from a live static; nothing in this process writes
        // through it, so the shared borrow is not aliased by a mutable one.
        unsafe { &*ptr }
    }

    fn address(&self) -> usize {
        self.0.get() as usize
    }
}

/// The region the fuzzer fills.
#[allow(non_upper_case_globals)]
#[unsafe(no_mangle)]
pub static dvkm_harness_input: InputRegion = InputRegion::zeroed();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exported_region_starts_zeroed() {
        let input = dvkm_harness_input.ready();
        assert!(input.as_bytes().iter().all(|&b| b == 0));
        assert_eq!(dvkm_harness_input.capacity(), 1024);
    }

    #[test]
    fn ready_view_aliases_the_region() {
        let region = InputRegion::zeroed();
        assert_eq!(region.ready().address(), region.address());
    }
}
