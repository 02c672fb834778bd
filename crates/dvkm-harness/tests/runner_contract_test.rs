//! Integration tests for the trial runner and its JSONL trial log.

use std::io;
use std::path::{Path, PathBuf};

use dvkm_abi::{ExportedMarkers, ProcDevice};
use dvkm_core::{InputBuffer, Operation};
use dvkm_harness::config::Overrides;
use dvkm_harness::runner::{COMPONENT, run_configured};
use dvkm_harness::structured_log::{LogEmitter, validate_log_file};
use dvkm_harness::{DumpMode, HarnessConfig, TrialRunner};

fn temp_log(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("dvkm-harness-{}-{name}.jsonl", std::process::id()))
}

fn events(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn event_names(entries: &[serde_json::Value]) -> Vec<String> {
    entries
        .iter()
        .map(|e| e["event"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn dev_null_trial_logs_every_stage_in_order() {
    let log_path = temp_log("dev-null");
    let emitter = LogEmitter::to_file(&log_path, COMPONENT, "run-test").unwrap();
    let mut runner = TrialRunner::new(io::sink(), DumpMode::Off).with_log(emitter);

    let mut bytes = [0u8; 13];
    bytes[0] = 0x05;
    bytes[9..13].copy_from_slice(&64i32.to_ne_bytes());
    let input = InputBuffer::from_prefix(&bytes);

    let report = runner
        .run(
            &ProcDevice,
            Path::new("/dev/null"),
            &mut ExportedMarkers::new(1),
            &input,
        )
        .unwrap();
    assert_eq!(report.operation, Operation::IntegerUnderflow);
    assert_eq!(report.size, 64);
    drop(runner);

    let (lines, errors) = validate_log_file(&log_path).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(lines, 8);

    let entries = events(&log_path);
    assert_eq!(
        event_names(&entries),
        [
            "trial_start",
            "device_open",
            "trial_entry",
            "request_decoded",
            "request_submitted",
            "trial_exit",
            "device_closed",
            "trial_complete",
        ]
    );

    let decoded = &entries[3];
    assert_eq!(decoded["operation"], "integer_underflow");
    assert_eq!(decoded["opcode"], 1);
    assert_eq!(decoded["size"], 64);
    assert_eq!(decoded["input_sha256"], entries[2]["input_sha256"]);

    // /dev/null rejects the request; the status is recorded, not acted on.
    let submitted = &entries[4];
    assert_eq!(submitted["status"], -1);
    assert_eq!(submitted["level"], "warn");
    assert!(submitted["errno"].is_i64());
    assert_eq!(entries[7]["exit_code"], 0);

    for (i, entry) in entries.iter().enumerate() {
        let expected = format!("{COMPONENT}::run-test::{:03}", i + 1);
        assert_eq!(entry["trace_id"], expected.as_str());
    }

    let _ = std::fs::remove_file(&log_path);
}

#[test]
fn missing_device_never_reaches_the_markers() {
    let log_path = temp_log("missing");
    let emitter = LogEmitter::to_file(&log_path, COMPONENT, "run-missing").unwrap();
    let mut runner = TrialRunner::new(io::sink(), DumpMode::Hex).with_log(emitter);

    let err = runner
        .run(
            &ProcDevice,
            Path::new("/proc/dvkm-harness-missing"),
            &mut ExportedMarkers::new(1),
            &InputBuffer::zeroed(),
        )
        .unwrap_err();
    assert_eq!(err.exit_code(), 1);
    drop(runner);

    let entries = events(&log_path);
    assert_eq!(
        event_names(&entries),
        ["trial_start", "device_open_failed", "trial_complete"]
    );
    assert_eq!(entries[1]["exit_code"], 1);
    assert_eq!(entries[1]["errno"], 2);
    assert_eq!(entries[2]["exit_code"], 1);

    let _ = std::fs::remove_file(&log_path);
}

#[test]
fn configured_run_uses_overridden_device_and_log() {
    let log_path = temp_log("configured");
    let config = HarnessConfig::default().with_overrides(Overrides {
        device: Some(PathBuf::from("/proc/dvkm-harness-missing")),
        dump: Some(DumpMode::Off),
        log: Some(log_path.clone()),
        settle_iterations: Some(0),
    });

    let err = run_configured(&config).unwrap_err();
    assert_eq!(err.exit_code(), 1);

    let (lines, errors) = validate_log_file(&log_path).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(lines, 3);

    let _ = std::fs::remove_file(&log_path);
}
