use std::{fmt, sync::Arc};

use log::{debug, error, info, warn};
use strum_macros::Display;

use crate::{
    calibration::CalibrationTracker,
    params::DeviceConfig,
    report::{decode, RawSample, REPORT_LEN},
    transform::to_screen,
    Axis, InputError, InputSink, ReportPipe, TransportError,
};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    /// Nothing outstanding yet.
    Idle,
    /// Exactly one report request outstanding.
    Polling,
    /// Cancellation requested; the outstanding request has not completed.
    Closing,
    Closed,
}

/// How an outstanding report request finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Completed,
    /// The device went away.
    Disconnected,
    /// The request was cancelled on our side.
    Cancelled,
    /// The host controller is shutting the endpoint down.
    ShuttingDown,
    Stall,
    Overflow,
    /// Any other failure, with the backend's error code.
    Fault(i32),
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Completed => write!(f, "completed"),
            TransferStatus::Disconnected => write!(f, "disconnected"),
            TransferStatus::Cancelled => write!(f, "cancelled"),
            TransferStatus::ShuttingDown => write!(f, "shutting down"),
            TransferStatus::Stall => write!(f, "stall"),
            TransferStatus::Overflow => write!(f, "overflow"),
            TransferStatus::Fault(code) => write!(f, "fault {code}"),
        }
    }
}

impl TransferStatus {
    /// Terminal statuses end polling; everything else is retried.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferStatus::Disconnected | TransferStatus::Cancelled | TransferStatus::ShuttingDown
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub status: TransferStatus,
    /// Bytes written into the transfer buffer.
    pub len: usize,
}

impl Completion {
    pub fn completed(len: usize) -> Self {
        Self {
            status: TransferStatus::Completed,
            len,
        }
    }

    pub fn failed(status: TransferStatus) -> Self {
        Self { status, len: 0 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub samples: u64,
    pub calibration_samples: u64,
    pub transient_faults: u64,
    pub short_reports: u64,
    pub dropped_events: u64,
    pub resubmissions: u64,
}

/// One attached panel: its configuration, its single report request and the
/// buffer that request fills.
///
/// All mutation happens in [`Session::complete`], which runs once per
/// completion of the one outstanding request, so nothing here is locked.
pub struct Session<P, S> {
    name: heapless::String<128>,
    config: DeviceConfig,
    tracker: Arc<CalibrationTracker>,
    pipe: P,
    sink: S,
    buffer: Vec<u8>,
    state: SessionState,
    stats: SessionStats,
}

impl<P, S> Session<P, S>
where
    P: ReportPipe,
    S: InputSink,
{
    pub(crate) fn new(
        name: heapless::String<128>,
        config: DeviceConfig,
        tracker: Arc<CalibrationTracker>,
        pipe: P,
        sink: S,
        buffer: Vec<u8>,
    ) -> Self {
        Self {
            name,
            config,
            tracker,
            pipe,
            sink,
            buffer,
            state: SessionState::Idle,
            stats: SessionStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }
    pub fn state(&self) -> SessionState {
        self.state
    }
    pub fn stats(&self) -> SessionStats {
        self.stats
    }
    pub fn pipe(&self) -> &P {
        &self.pipe
    }

    /// Arms the first request. Only meaningful while `Idle`.
    pub fn start(&mut self) -> Result<(), TransportError> {
        if self.state != SessionState::Idle {
            return Ok(());
        }
        self.pipe.submit()?;
        self.state = SessionState::Polling;
        Ok(())
    }

    /// Requests cancellation of the outstanding request.
    ///
    /// The move to `Closed` happens when that request's completion arrives.
    pub fn close(&mut self) {
        if self.state == SessionState::Polling {
            self.pipe.cancel();
            self.state = SessionState::Closing;
        }
    }

    /// Waits for the outstanding request and handles its completion.
    pub fn poll_once(&mut self) -> SessionState {
        if !matches!(self.state, SessionState::Polling | SessionState::Closing) {
            return self.state;
        }
        let completion = self.pipe.wait(&mut self.buffer);
        self.complete(completion)
    }

    /// Drives the completion/resubmit chain until the session is closed.
    pub fn run(&mut self) -> SessionStats {
        while matches!(self.state, SessionState::Polling | SessionState::Closing) {
            self.poll_once();
        }
        self.stats
    }

    /// Completion handler for the outstanding request.
    ///
    /// Expects the transfer buffer to already hold the completion's data.
    pub fn complete(&mut self, completion: Completion) -> SessionState {
        match self.state {
            SessionState::Polling => (),
            SessionState::Closing => {
                debug!("{}: final completion ({})", self.name, completion.status);
                self.state = SessionState::Closed;
                return self.state;
            }
            SessionState::Idle | SessionState::Closed => {
                warn!(
                    "{}: completion ({}) with nothing outstanding",
                    self.name, completion.status
                );
                return self.state;
            }
        }

        if completion.status.is_terminal() {
            info!("{}: report stream ended ({})", self.name, completion.status);
            self.state = SessionState::Closed;
            return self.state;
        }

        match completion.status {
            TransferStatus::Completed => self.handle_report(completion.len),
            status => {
                self.stats.transient_faults += 1;
                debug!("{}: transfer fault ({status}), resubmitting", self.name);
            }
        }

        self.resubmit();
        self.state
    }

    fn handle_report(&mut self, len: usize) {
        let filled = len.min(self.buffer.len());
        let report = self.buffer[..filled]
            .get(..REPORT_LEN)
            .and_then(|data| <&[u8; REPORT_LEN]>::try_from(data).ok());
        let Some(report) = report else {
            self.stats.short_reports += 1;
            debug!("{}: short report ({len} bytes), resubmitting", self.name);
            return;
        };

        let sample = decode(report);
        self.stats.samples += 1;

        if self.config.calibrate {
            self.tracker.observe(sample.x, sample.y);
            self.stats.calibration_samples += 1;
        } else if let Err(e) = self.emit(&sample) {
            self.stats.dropped_events += 1;
            warn!("{}: input sink dropped a sample: {e}", self.name);
        }

        if self.config.print_position {
            info!(
                "{}: x:[{}] y:[{}] t:[{}]",
                self.name, sample.x, sample.y, sample.touch as u8
            );
        }
    }

    fn emit(&mut self, sample: &RawSample) -> Result<(), InputError> {
        let point = to_screen(
            sample.x,
            sample.y,
            self.config.orientation,
            &self.config.bounds,
        );
        self.sink.emit_abs(Axis::X, point.x)?;
        self.sink.emit_abs(Axis::Y, point.y)?;
        self.sink.emit_touch(sample.touch)?;
        self.sink.sync()
    }

    fn resubmit(&mut self) {
        match self.pipe.submit() {
            Ok(()) => self.stats.resubmissions += 1,
            Err(TransportError::Cancelled) => {
                debug!("{}: cancelled before resubmission", self.name);
                self.state = SessionState::Closed;
            }
            Err(e) => {
                error!("{}: can't resubmit report request: {e}", self.name);
                self.state = SessionState::Closed;
            }
        }
    }

    pub(crate) fn into_parts(self) -> (heapless::String<128>, P, S) {
        (self.name, self.pipe, self.sink)
    }
}
