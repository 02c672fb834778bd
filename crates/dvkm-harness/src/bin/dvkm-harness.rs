//! CLI entrypoint for the DVKM fuzz harness.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use dvkm_harness::config::Overrides;
use dvkm_harness::locate::locate_file;
use dvkm_harness::runner::run_configured;
use dvkm_harness::structured_log::validate_log_file;
use dvkm_harness::{DumpMode, HarnessConfig, HarnessError};

/// Single-trial harness for the DVKM proc driver.
#[derive(Debug, Parser)]
#[command(name = "dvkm-harness")]
#[command(about = "Decode one fuzz input and dispatch it to the DVKM driver")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[command(flatten)]
    run: RunArgs,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Device path (overrides DVKM_HARNESS_DEVICE).
    #[arg(long)]
    device: Option<PathBuf>,
    /// JSONL trial log path (overrides DVKM_HARNESS_LOG).
    #[arg(long)]
    log: Option<PathBuf>,
    /// Input echo before dispatch: `hex` or `off` (overrides DVKM_HARNESS_DUMP).
    #[arg(long)]
    dump: Option<String>,
    /// Spin-loop iterations around the control call (overrides DVKM_HARNESS_SETTLE).
    #[arg(long)]
    settle: Option<u32>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one trial. Same as giving no subcommand.
    Run(RunArgs),
    /// Report marker and input addresses of a harness image as JSON.
    Locate {
        /// Harness ELF image.
        image: PathBuf,
        /// Output JSON path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check a JSONL trial log against the log schema.
    ValidateLog {
        /// JSONL log path.
        log: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        None => run(cli.run),
        Some(Command::Run(args)) => run(args),
        Some(Command::Locate { image, output }) => locate(&image, output.as_deref()),
        Some(Command::ValidateLog { log }) => validate_log(&log),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("dvkm-harness: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(args: RunArgs) -> Result<(), HarnessError> {
    let config = HarnessConfig::from_env().with_overrides(Overrides {
        device: args.device,
        dump: args.dump.as_deref().map(DumpMode::from_str_loose),
        log: args.log,
        settle_iterations: args.settle,
    });
    run_configured(&config)?;
    Ok(())
}

fn locate(image: &Path, output: Option<&Path>) -> Result<(), HarnessError> {
    let map = locate_file(image)?;
    let json = map.to_json().map_err(std::io::Error::other)?;
    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))?;
            eprintln!("Wrote marker map to {}", path.display());
        }
        None => println!("{json}"),
    }
    if map.position_independent {
        eprintln!(
            "warning: {} is position-independent; addresses are offsets from the load base",
            image.display()
        );
    }
    if !map.sections_match_markers() {
        eprintln!("note: marker sections missing or misplaced; break on the symbol addresses");
    }
    Ok(())
}

fn validate_log(path: &Path) -> Result<(), HarnessError> {
    let (lines, errors) = validate_log_file(path)?;
    for err in &errors {
        eprintln!("{err}");
    }
    if !errors.is_empty() {
        return Err(HarnessError::InvalidLog {
            path: path.to_path_buf(),
            violations: errors.len(),
        });
    }
    println!("{}: {lines} line(s) valid", path.display());
    Ok(())
}
