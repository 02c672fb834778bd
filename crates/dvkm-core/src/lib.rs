//! # dvkm-core
//!
//! Safe building blocks for the DVKM fuzz harness.
//!
//! An emulator-driven fuzzer writes a fixed-size input into the harness
//! process, the harness decodes it into a [`Request`] and hands it to the
//! device under test through a single `ioctl`. This crate holds everything
//! that can be expressed without touching the kernel:
//!
//! ```text
//! InputBuffer -> decode_request -> Request -> DeviceChannel::submit
//!                                      ^
//!               TrialHooks::entry ----/ \---- TrialHooks::exit
//! ```
//!
//! The kernel-facing pieces (file descriptors, the `#[repr(C)]` argument
//! struct, exported marker symbols) live in `dvkm-abi`.

#![deny(unsafe_code)]

pub mod decode;
pub mod elf;
pub mod hexdump;
pub mod input;
pub mod ioctl;
pub mod trial;

pub use decode::{Operation, Request, decode_request};
pub use input::{HEADER_SIZE, INPUT_CAPACITY, InputBuffer, PAYLOAD_CAPACITY};
pub use ioctl::{DVKM_IOCTL_MAGIC, IoctlCode};
pub use trial::{
    ControlStatus, DEFAULT_DEVICE_PATH, DeviceChannel, DeviceOpener, InputSource, TrialError,
    TrialHooks, TrialObserver, TrialReport, TrialState, run_trial,
};
