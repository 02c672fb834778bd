//! Harness configuration.
//!
//! Every knob can be set through the environment and overridden on the
//! command line:
//! - `DVKM_HARNESS_DEVICE`: device path (default `/proc/dvkm`).
//! - `DVKM_HARNESS_DUMP`: `hex` (default) prints the input before dispatch,
//!   `off` skips it. Unknown values fall back to `hex`.
//! - `DVKM_HARNESS_LOG`: path of a JSONL trial log. Unset means no log.
//! - `DVKM_HARNESS_SETTLE`: spin-loop iterations around the control call
//!   (default 100). Unparseable values fall back to the default.

use std::path::PathBuf;

use dvkm_abi::ExportedMarkers;
use dvkm_core::DEFAULT_DEVICE_PATH;

pub const ENV_DEVICE: &str = "DVKM_HARNESS_DEVICE";
pub const ENV_DUMP: &str = "DVKM_HARNESS_DUMP";
pub const ENV_LOG: &str = "DVKM_HARNESS_LOG";
pub const ENV_SETTLE: &str = "DVKM_HARNESS_SETTLE";

/// Whether the input is echoed to stdout before dispatch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumpMode {
    #[default]
    Hex,
    Off,
}

impl DumpMode {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" | "quiet" | "0" | "false" => Self::Off,
            _ => Self::Hex,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hex => "hex",
            Self::Off => "off",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub device: PathBuf,
    pub dump: DumpMode,
    pub log: Option<PathBuf>,
    pub settle_iterations: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE_PATH),
            dump: DumpMode::default(),
            log: None,
            settle_iterations: ExportedMarkers::DEFAULT_SETTLE_ITERATIONS,
        }
    }
}

/// Values given on the command line. `None` keeps the environment's value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub device: Option<PathBuf>,
    pub dump: Option<DumpMode>,
    pub log: Option<PathBuf>,
    pub settle_iterations: Option<u32>,
}

impl HarnessConfig {
    /// Read the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            device: get(ENV_DEVICE).map_or(defaults.device, PathBuf::from),
            dump: get(ENV_DUMP).map_or(defaults.dump, |v| DumpMode::from_str_loose(&v)),
            log: get(ENV_LOG).map(PathBuf::from),
            settle_iterations: get(ENV_SETTLE)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.settle_iterations),
        }
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(device) = overrides.device {
            self.device = device;
        }
        if let Some(dump) = overrides.dump {
            self.dump = dump;
        }
        if let Some(log) = overrides.log {
            self.log = Some(log);
        }
        if let Some(settle) = overrides.settle_iterations {
            self.settle_iterations = settle;
        }
        self
    }
}
