//! Driver core for the Fujitsu U810/P1620/T1010 USB touch panel.
//!
//! Transport, input registration and parameter storage sit behind the traits
//! below; the daemon crate wires them to libusb and uinput.

mod calibration;
mod errors;
mod lifecycle;
mod params;
mod report;
mod session;
mod transform;

pub use calibration::{CalibrationSnapshot, CalibrationTracker};
pub use errors::{AttachError, ConfigError, InputError, TransportError};
pub use lifecycle::{
    attach, detach, Capabilities, DeviceIdentity, EndpointInfo, EndpointKind, SetupCommand,
    DEVICE_ID, SETUP_COMMANDS, TRANSFER_LEN,
};
pub use params::{DeviceConfig, Params};
pub use report::{decode, RawSample, REPORT_LEN};
pub use session::{
    Completion, Session, SessionState, SessionStats, TransferStatus,
};
pub use transform::{to_screen, CalibratedBounds, Orientation, ScreenPoint};

/// Absolute axes reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// The outstanding-request half of the transport.
///
/// A pipe holds at most one armed request. `wait` blocks the driving thread
/// until that request completes and fills `buffer` with whatever the device
/// sent.
pub trait ReportPipe {
    fn submit(&mut self) -> Result<(), TransportError>;
    fn cancel(&mut self);
    fn wait(&mut self, buffer: &mut [u8]) -> Completion;
}

/// A physical device as seen at attach time.
pub trait TouchDevice {
    type Pipe: ReportPipe;

    fn identity(&self) -> DeviceIdentity;
    fn endpoints(&self) -> Vec<EndpointInfo>;
    fn open_pipe(&mut self, endpoint: &EndpointInfo, len: usize)
        -> Result<Self::Pipe, TransportError>;
    fn control(&mut self, command: &SetupCommand) -> Result<(), TransportError>;
}

/// Host input subsystem: registration side.
pub trait InputHost {
    type Sink: InputSink;

    fn register(&mut self, capabilities: &Capabilities) -> Result<Self::Sink, InputError>;
}

/// Host input subsystem: event side of one registered device.
pub trait InputSink {
    fn emit_abs(&mut self, axis: Axis, value: i32) -> Result<(), InputError>;
    fn emit_touch(&mut self, touching: bool) -> Result<(), InputError>;
    fn sync(&mut self) -> Result<(), InputError>;

    fn unregister(self)
    where
        Self: Sized,
    {
    }
}

/// File-backed parameter store owned by the companion helper.
pub trait ParamStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn load(&self) -> Result<Params, Self::Error>;
    fn store_calibration(&self, snapshot: &CalibrationSnapshot) -> Result<(), Self::Error>;
}
