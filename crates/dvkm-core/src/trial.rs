//! Trial sequencing.
//!
//! One process run performs exactly one trial:
//!
//! ```text
//! Unopened --open ok--> Opened --entry--> EntryMarked --submit--> Submitted
//!     |                                                               |
//!     +--open err--> Failed                 Closed <--close-- ExitMarked <--exit--+
//! ```
//!
//! The device, the marker hooks and the input region are collaborators behind
//! traits so the ordering contract can be exercised without a kernel.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::decode::{Operation, Request, decode_request};
use crate::input::InputBuffer;

/// Path of the DVKM proc entry.
pub const DEFAULT_DEVICE_PATH: &str = "/proc/dvkm";

/// Where the trial input comes from.
///
/// [`InputSource::ready`] is consulted only after the entry marker has fired,
/// since that is when the emulator is guaranteed to have written the region.
pub trait InputSource {
    fn ready(&self) -> &InputBuffer;

    /// Start of the region, for diagnostics. Safe to call before `ready`.
    fn address(&self) -> usize;
}

impl InputSource for InputBuffer {
    fn ready(&self) -> &InputBuffer {
        self
    }

    fn address(&self) -> usize {
        InputBuffer::address(self)
    }
}

/// Opens the device under test.
pub trait DeviceOpener {
    type Channel: DeviceChannel;

    /// Open `path` read-write. No retries.
    fn open(&self, path: &Path) -> io::Result<Self::Channel>;
}

/// An open handle to the device under test.
pub trait DeviceChannel {
    /// Issue the discriminated control call and block until it returns.
    fn submit(&mut self, request: &Request<'_>) -> ControlStatus;

    /// Release the handle. Consumes the channel so it cannot be used after.
    fn close(self) -> io::Result<()>;
}

/// Instrumentation hooks around the dispatch.
pub trait TrialHooks {
    /// Fires once the device is open, before the input is read.
    fn entry(&mut self);

    /// Fires once the control call has returned, before the device is closed.
    fn exit(&mut self);

    /// Quiet window immediately before and after the control call.
    fn settle(&mut self) {}
}

/// Diagnostic callbacks. None of them can alter the trial.
pub trait TrialObserver {
    fn device_opened(&mut self, _path: &Path) {}
    fn device_open_failed(&mut self, _path: &Path, _err: &io::Error) {}
    fn input_ready(&mut self, _input: &InputBuffer) {}
    fn request_decoded(&mut self, _request: &Request<'_>) {}
    fn request_submitted(
        &mut self,
        _request: &Request<'_>,
        _status: ControlStatus,
        _latency: Duration,
    ) {
    }
    fn device_closed(&mut self, _result: &io::Result<()>) {}
}

impl TrialObserver for () {}

/// Raw result of the control call. Passed through, never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlStatus {
    pub ret: i32,
    /// `errno` captured right after the call when `ret` is negative.
    pub errno: Option<i32>,
}

impl ControlStatus {
    #[must_use]
    pub const fn returned(ret: i32) -> Self {
        Self { ret, errno: None }
    }

    #[must_use]
    pub const fn with_errno(ret: i32, errno: i32) -> Self {
        Self {
            ret,
            errno: Some(errno),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrialState {
    Unopened,
    Opened,
    EntryMarked,
    Submitted,
    ExitMarked,
    Closed,
    Failed,
}

impl TrialState {
    /// Whether `self -> next` is a legal edge. Every state is left at most once.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Unopened, Self::Opened)
                | (Self::Unopened, Self::Failed)
                | (Self::Opened, Self::EntryMarked)
                | (Self::EntryMarked, Self::Submitted)
                | (Self::Submitted, Self::ExitMarked)
                | (Self::ExitMarked, Self::Closed)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

#[derive(Debug)]
struct Sequencer {
    state: TrialState,
}

impl Sequencer {
    const fn new() -> Self {
        Self {
            state: TrialState::Unopened,
        }
    }

    fn advance(&mut self, next: TrialState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal trial transition {:?} -> {next:?}",
            self.state
        );
        self.state = next;
    }
}

/// Summary of a completed trial.
#[derive(Debug)]
pub struct TrialReport {
    pub operation: Operation,
    pub width: i32,
    pub height: i32,
    pub size: i32,
    pub payload_len: usize,
    pub status: ControlStatus,
    pub latency: Duration,
    /// Set when releasing the handle failed. The trial still counts as done.
    pub close_error: Option<io::Error>,
    pub state: TrialState,
}

#[derive(Debug)]
pub enum TrialError {
    /// The device could not be opened. No marker fired, nothing was submitted.
    DeviceUnavailable { path: PathBuf, source: io::Error },
}

impl core::fmt::Display for TrialError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DeviceUnavailable { path, source } => {
                write!(f, "cannot open {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for TrialError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DeviceUnavailable { source, .. } => Some(source),
        }
    }
}

/// Run one trial: open, entry marker, decode, submit, exit marker, close.
///
/// The handle is closed on every path that opened it; a close failure is
/// reported in [`TrialReport::close_error`] rather than as an error, since the
/// control call has already happened by then.
pub fn run_trial<O, H, S, B>(
    opener: &O,
    path: &Path,
    hooks: &mut H,
    input: &S,
    observer: &mut B,
) -> Result<TrialReport, TrialError>
where
    O: DeviceOpener + ?Sized,
    H: TrialHooks + ?Sized,
    S: InputSource + ?Sized,
    B: TrialObserver + ?Sized,
{
    let mut seq = Sequencer::new();

    let mut channel = match opener.open(path) {
        Ok(channel) => channel,
        Err(source) => {
            seq.advance(TrialState::Failed);
            observer.device_open_failed(path, &source);
            return Err(TrialError::DeviceUnavailable {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    seq.advance(TrialState::Opened);
    observer.device_opened(path);

    hooks.entry();
    seq.advance(TrialState::EntryMarked);

    let input = input.ready();
    observer.input_ready(input);
    let request = decode_request(input);
    observer.request_decoded(&request);

    hooks.settle();
    let started = Instant::now();
    let status = channel.submit(&request);
    let latency = started.elapsed();
    seq.advance(TrialState::Submitted);
    hooks.settle();

    hooks.exit();
    seq.advance(TrialState::ExitMarked);
    observer.request_submitted(&request, status, latency);

    let closed = channel.close();
    seq.advance(TrialState::Closed);
    observer.device_closed(&closed);

    Ok(TrialReport {
        operation: request.operation,
        width: request.width,
        height: request.height,
        size: request.size,
        payload_len: request.payload.len(),
        status,
        latency,
        close_error: closed.err(),
        state: seq.state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_the_single_pass_chain() {
        use TrialState::*;
        let chain = [Unopened, Opened, EntryMarked, Submitted, ExitMarked, Closed];
        for pair in chain.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{pair:?}");
        }
        assert!(Unopened.can_advance_to(Failed));
    }

    #[test]
    fn no_state_is_revisited_or_skipped() {
        use TrialState::*;
        assert!(!Opened.can_advance_to(Submitted));
        assert!(!Submitted.can_advance_to(EntryMarked));
        assert!(!Closed.can_advance_to(Opened));
        assert!(!Failed.can_advance_to(Opened));
        assert!(!Opened.can_advance_to(Failed));
    }

    #[test]
    fn only_closed_and_failed_are_terminal() {
        use TrialState::*;
        for state in [Unopened, Opened, EntryMarked, Submitted, ExitMarked] {
            assert!(!state.is_terminal());
        }
        assert!(Closed.is_terminal());
        assert!(Failed.is_terminal());
    }

    #[test]
    fn device_unavailable_display_names_path() {
        let err = TrialError::DeviceUnavailable {
            path: PathBuf::from("/proc/dvkm"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("cannot open /proc/dvkm: "));
        assert!(std::error::Error::source(&err).is_some());
    }
}
