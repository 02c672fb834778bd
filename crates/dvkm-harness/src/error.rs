//! Harness-level errors and their process exit codes.

use std::path::PathBuf;

use dvkm_core::TrialError;
use thiserror::Error;

use crate::locate::LocateError;

/// Exit status when the device cannot be opened.
pub const EXIT_DEVICE_UNAVAILABLE: u8 = 1;
/// Exit status for failed tooling subcommands (`locate`, `validate-log`).
pub const EXIT_TOOL_FAILURE: u8 = 1;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Trial(#[from] TrialError),
    #[error("locate: {0}")]
    Locate(#[from] LocateError),
    #[error("{}: {violations} schema violation(s)", path.display())]
    InvalidLog { path: PathBuf, violations: usize },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Trial(TrialError::DeviceUnavailable { .. }) => EXIT_DEVICE_UNAVAILABLE,
            Self::Locate(_) | Self::InvalidLog { .. } | Self::Io(_) => EXIT_TOOL_FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_unavailable_exits_with_one() {
        let err = HarnessError::from(TrialError::DeviceUnavailable {
            path: PathBuf::from("/proc/dvkm"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().starts_with("cannot open /proc/dvkm"));
    }

    #[test]
    fn invalid_log_names_the_file() {
        let err = HarnessError::InvalidLog {
            path: PathBuf::from("trial.jsonl"),
            violations: 2,
        };
        assert_eq!(err.to_string(), "trial.jsonl: 2 schema violation(s)");
        assert_eq!(err.exit_code(), EXIT_TOOL_FAILURE);
    }
}
