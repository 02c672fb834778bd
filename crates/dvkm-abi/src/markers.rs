//! Synchronization markers.
//!
//! Two exported no-op functions the emulator sets breakpoints on. Each is
//! never inlined and contains an opaque `asm!` block, so the call survives
//! optimization and cannot move across the surrounding memory operations.
//! The external locator finds them by symbol name; on Linux each one also
//! owns a dedicated section so the section start is the function. The two
//! bodies differ so the optimizer cannot fold them into one address.

use dvkm_core::{InputSource, TrialHooks};

use crate::input_region::dvkm_harness_input;

/// Symbol name of the marker fired after the device opens.
pub const ENTRY_MARKER_SYMBOL: &str = "dvkm_trial_entry_marker";
/// Symbol name of the marker fired after the control call returns.
pub const EXIT_MARKER_SYMBOL: &str = "dvkm_trial_exit_marker";
/// Symbol name of the input region.
pub const INPUT_SYMBOL: &str = "dvkm_harness_input";
/// Section holding only the entry marker (Linux).
pub const ENTRY_MARKER_SECTION: &str = ".trigger_bp";
/// Section holding only the exit marker (Linux).
pub const EXIT_MARKER_SECTION: &str = ".trigger_bp_2";

#[inline(never)]
#[unsafe(no_mangle)]
#[cfg_attr(target_os = "linux", unsafe(link_section = ".trigger_bp"))]
pub extern "C" fn dvkm_trial_entry_marker() {
    marker_body(1);
}

#[inline(never)]
#[unsafe(no_mangle)]
#[cfg_attr(target_os = "linux", unsafe(link_section = ".trigger_bp_2"))]
pub extern "C" fn dvkm_trial_exit_marker() {
    marker_body(2);
}

/// `nops` no-op instructions behind a compiler barrier.
#[inline(always)]
fn marker_body(nops: usize) {
    for _ in 0..nops {
        #[cfg(any(
            target_arch = "x86",
            target_arch = "x86_64",
            target_arch = "aarch64",
            target_arch = "riscv64"
        ))]
        // SAFETY: a single nop; no registers, stack or flags are touched.
        unsafe {
            std::arch::asm!("nop", options(nostack, preserves_flags));
        }
        #[cfg(not(any(
            target_arch = "x86",
            target_arch = "x86_64",
            target_arch = "aarch64",
            target_arch = "riscv64"
        )))]
        std::hint::black_box(nops);
    }
    std::sync::atomic::compiler_fence(std::sync::atomic::Ordering::SeqCst);
}

/// Runtime addresses of the exported harness symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerAddresses {
    pub entry: usize,
    pub exit: usize,
    pub input: usize,
}

#[must_use]
pub fn marker_addresses() -> MarkerAddresses {
    MarkerAddresses {
        entry: dvkm_trial_entry_marker as extern "C" fn() as usize,
        exit: dvkm_trial_exit_marker as extern "C" fn() as usize,
        input: dvkm_harness_input.address(),
    }
}

/// [`TrialHooks`] backed by the exported markers.
///
/// `settle_iterations` spin-loop hints run before and after the control
/// call, giving the emulator a quiet window around the dispatch.
#[derive(Debug, Clone, Copy)]
pub struct ExportedMarkers {
    pub settle_iterations: u32,
}

impl ExportedMarkers {
    pub const DEFAULT_SETTLE_ITERATIONS: u32 = 100;

    #[must_use]
    pub const fn new(settle_iterations: u32) -> Self {
        Self { settle_iterations }
    }
}

impl Default for ExportedMarkers {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SETTLE_ITERATIONS)
    }
}

impl TrialHooks for ExportedMarkers {
    fn entry(&mut self) {
        dvkm_trial_entry_marker();
    }

    fn exit(&mut self) {
        dvkm_trial_exit_marker();
    }

    fn settle(&mut self) {
        for _ in 0..self.settle_iterations {
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_have_distinct_addresses() {
        let addrs = marker_addresses();
        assert_ne!(addrs.entry, addrs.exit);
        assert_ne!(addrs.entry, 0);
        assert_ne!(addrs.input, 0);
    }

    #[test]
    fn markers_are_plain_call_and_return() {
        let mut hooks = ExportedMarkers::new(3);
        hooks.entry();
        hooks.settle();
        hooks.exit();
    }
}
