//! # dvkm-abi
//!
//! The kernel-facing boundary of the DVKM harness.
//!
//! Everything that needs `unsafe` lives here:
//! - [`device`]: `open(2)`/`ioctl(2)`/`close(2)` on the proc entry via `libc`.
//! - [`wire`]: the `#[repr(C)]` argument struct the driver reads.
//! - [`input_region`]: the exported static the emulator writes trial input into.
//! - [`markers`]: exported, never-inlined no-op functions the emulator breaks on.
//!
//! # Architecture
//!
//! ```text
//! emulator -> dvkm_harness_input -> dvkm-core decode -> wire::DvkmObj -> ioctl
//!             dvkm_trial_entry_marker / dvkm_trial_exit_marker bracket the ioctl
//! ```

pub mod device;
pub mod input_region;
pub mod markers;
pub mod wire;

pub use device::{DeviceFd, ProcDevice};
pub use input_region::{InputRegion, dvkm_harness_input};
pub use markers::{ExportedMarkers, MarkerAddresses, marker_addresses};
pub use wire::{DVKM_OBJ_SIZE, DvkmObj, request_code};
