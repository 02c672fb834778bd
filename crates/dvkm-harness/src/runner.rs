//! Trial runner: drives one trial and reports it.
//!
//! The runner is the [`TrialObserver`] for [`run_trial`]. Human-readable
//! diagnostics go to `out` (stdout in the binary); the optional
//! [`LogEmitter`] receives one JSONL record per trial event. Neither sink can
//! change what the trial does, and a failing log is dropped with a warning.

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use dvkm_abi::{ExportedMarkers, ProcDevice, dvkm_harness_input};
use dvkm_core::hexdump::hex_dump;
use dvkm_core::{
    ControlStatus, DeviceOpener, INPUT_CAPACITY, InputBuffer, InputSource, Request, TrialHooks,
    TrialObserver, TrialReport, run_trial,
};

use crate::config::{DumpMode, HarnessConfig};
use crate::error::{EXIT_DEVICE_UNAVAILABLE, HarnessError};
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, input_digest};

/// Component name used in trace ids.
pub const COMPONENT: &str = "dvkm-harness";

/// Run id for this process: `<pid>-<unix seconds>`.
#[must_use]
pub fn default_run_id() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}-{secs}", std::process::id())
}

pub struct TrialRunner {
    out: Box<dyn Write>,
    log: Option<LogEmitter>,
    dump: DumpMode,
    input_sha256: Option<String>,
}

impl TrialRunner {
    #[must_use]
    pub fn new(out: impl Write + 'static, dump: DumpMode) -> Self {
        Self {
            out: Box::new(out),
            log: None,
            dump,
            input_sha256: None,
        }
    }

    #[must_use]
    pub fn with_log(mut self, log: LogEmitter) -> Self {
        self.log = Some(log);
        self
    }

    /// Whether a structured log is still attached.
    #[must_use]
    pub fn is_logging(&self) -> bool {
        self.log.is_some()
    }

    /// Run a single trial against `device`.
    pub fn run<O, H, S>(
        &mut self,
        opener: &O,
        device: &Path,
        hooks: &mut H,
        input: &S,
    ) -> Result<TrialReport, HarnessError>
    where
        O: DeviceOpener + ?Sized,
        H: TrialHooks + ?Sized,
        S: InputSource + ?Sized,
    {
        let address = input.address();
        self.say(format_args!(
            "input buffer address: {address:#x} size {INPUT_CAPACITY}"
        ));
        self.log(
            LogEntry::new(String::new(), LogLevel::Info, "trial_start")
                .with_device(device)
                .with_details(serde_json::json!({
                    "input_address": format!("{address:#x}"),
                    "input_size": INPUT_CAPACITY,
                    "dump": self.dump.as_str(),
                })),
        );

        let report = match run_trial(opener, device, hooks, input, self) {
            Ok(report) => report,
            Err(err) => {
                self.log(
                    LogEntry::new(String::new(), LogLevel::Error, "trial_complete")
                        .with_device(device)
                        .with_exit_code(i32::from(EXIT_DEVICE_UNAVAILABLE)),
                );
                return Err(err.into());
            }
        };

        self.say(format_args!("dvkm ret: {}\nBye!", report.status.ret));
        self.log(
            LogEntry::new(String::new(), LogLevel::Info, "trial_complete")
                .with_device(device)
                .with_operation(report.operation)
                .with_status(report.status.ret)
                .with_exit_code(0),
        );
        Ok(report)
    }

    // Stdout failures are not trial failures.
    fn say(&mut self, args: std::fmt::Arguments<'_>) {
        let _ = writeln!(self.out, "{args}").and_then(|()| self.out.flush());
    }

    fn log(&mut self, entry: LogEntry) {
        let Some(emitter) = self.log.as_mut() else {
            return;
        };
        if let Err(err) = emitter.emit_entry(entry) {
            eprintln!("{COMPONENT}: structured log disabled: {err}");
            self.log = None;
        }
    }
}

impl std::fmt::Debug for TrialRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrialRunner")
            .field("log", &self.log)
            .field("dump", &self.dump)
            .finish_non_exhaustive()
    }
}

impl TrialObserver for TrialRunner {
    fn device_opened(&mut self, path: &Path) {
        self.say(format_args!(
            "dvkm opened successfully, triggering entry marker."
        ));
        self.log(LogEntry::new(String::new(), LogLevel::Info, "device_open").with_device(path));
    }

    fn device_open_failed(&mut self, path: &Path, err: &io::Error) {
        let mut entry = LogEntry::new(String::new(), LogLevel::Error, "device_open_failed")
            .with_device(path)
            .with_exit_code(i32::from(EXIT_DEVICE_UNAVAILABLE))
            .with_details(serde_json::json!({ "error": err.to_string() }));
        if let Some(errno) = err.raw_os_error() {
            entry = entry.with_errno(errno);
        }
        self.log(entry);
    }

    fn input_ready(&mut self, input: &InputBuffer) {
        let digest = input_digest(input.as_bytes());
        self.log(
            LogEntry::new(String::new(), LogLevel::Info, "trial_entry")
                .with_input_sha256(digest.clone()),
        );
        self.input_sha256 = Some(digest);

        if self.dump == DumpMode::Hex {
            let dump = hex_dump(input.as_bytes());
            let _ = self
                .out
                .write_all(dump.as_bytes())
                .and_then(|()| self.out.flush());
        }
    }

    fn request_decoded(&mut self, request: &Request<'_>) {
        let mut entry = LogEntry::new(String::new(), LogLevel::Debug, "request_decoded")
            .with_operation(request.operation)
            .with_fields(request.width, request.height, request.size)
            .with_details(serde_json::json!({ "payload_len": request.payload.len() }));
        if let Some(digest) = &self.input_sha256 {
            entry = entry.with_input_sha256(digest.clone());
        }
        self.log(entry);
    }

    fn request_submitted(
        &mut self,
        request: &Request<'_>,
        status: ControlStatus,
        latency: Duration,
    ) {
        let level = if status.ret < 0 {
            LogLevel::Warn
        } else {
            LogLevel::Info
        };
        let mut entry = LogEntry::new(String::new(), level, "request_submitted")
            .with_operation(request.operation)
            .with_status(status.ret)
            .with_latency_ns(u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX));
        if let Some(errno) = status.errno {
            entry = entry.with_errno(errno);
        }
        self.log(entry);
        self.log(LogEntry::new(String::new(), LogLevel::Info, "trial_exit"));
    }

    fn device_closed(&mut self, result: &io::Result<()>) {
        let entry = match result {
            Ok(()) => LogEntry::new(String::new(), LogLevel::Info, "device_closed"),
            Err(err) => {
                let entry = LogEntry::new(String::new(), LogLevel::Warn, "device_closed")
                    .with_details(serde_json::json!({ "error": err.to_string() }));
                match err.raw_os_error() {
                    Some(errno) => entry.with_errno(errno),
                    None => entry,
                }
            }
        };
        self.log(entry);
    }
}

/// Run the production trial described by `config`: the proc device, the
/// exported markers and the exported input region, reporting on stdout.
pub fn run_configured(config: &HarnessConfig) -> Result<TrialReport, HarnessError> {
    let mut runner = TrialRunner::new(io::stdout(), config.dump);
    if let Some(path) = &config.log {
        match LogEmitter::to_file(path, COMPONENT, &default_run_id()) {
            Ok(emitter) => runner = runner.with_log(emitter),
            Err(err) => eprintln!(
                "{COMPONENT}: cannot create log {}: {err}; continuing without it",
                path.display()
            ),
        }
    }
    let mut hooks = ExportedMarkers::new(config.settle_iterations);
    runner.run(&ProcDevice, &config.device, &mut hooks, &dvkm_harness_input)
}
