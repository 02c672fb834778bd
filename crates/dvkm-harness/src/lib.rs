//! Single-trial fuzz harness for the DVKM proc driver.
//!
//! This crate provides:
//! - Configuration: environment variables with command-line overrides
//! - Trial runner: one open/entry/submit/exit/close pass with diagnostics
//! - Structured logging: JSONL trial records and a validator for them
//! - Marker locator: symbol and section addresses the emulator breaks on

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod locate;
pub mod runner;
pub mod structured_log;

pub use config::{DumpMode, HarnessConfig};
pub use error::HarnessError;
pub use locate::{LocateError, MarkerMap};
pub use runner::TrialRunner;
