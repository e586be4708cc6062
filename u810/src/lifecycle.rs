use std::{fmt::Write as _, sync::Arc};

use log::{info, warn};
use strum_macros::Display;

use crate::{
    calibration::CalibrationTracker,
    errors::{AttachError, TransportError},
    report::REPORT_LEN,
    session::{Session, SessionStats},
    transform::CalibratedBounds,
    InputHost, InputSink, ParamStore, ReportPipe, TouchDevice,
};

/// The single supported panel, as found on the U810, U820, P1620 and T1010.
pub const DEVICE_ID: (u16, u16) = (0x0430, 0x0530);

/// Upper bound on the transfer length regardless of the endpoint's packet size.
pub const TRANSFER_LEN: usize = 8;

/// The panel's reported coordinates jitter by a few units at rest.
const AXIS_FUZZ: i32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum EndpointKind {
    InterruptIn,
    InterruptOut,
    BulkIn,
    BulkOut,
    IsochronousIn,
    IsochronousOut,
    Control,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    pub address: u8,
    pub kind: EndpointKind,
    pub max_packet: u16,
    /// Polling interval in frames.
    pub interval: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    /// Bus topology path, e.g. `usb-0000:00:1d.0-1`.
    pub path: String,
}

/// A class or vendor control request with no data stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupCommand {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub label: &'static str,
}

/// Sent once after registration. Reverse-engineered from the vendor's
/// Windows driver; either may fail on some firmware revisions.
pub const SETUP_COMMANDS: [SetupCommand; 2] = [
    SetupCommand {
        request_type: 0x21,
        request: 0x0a,
        value: 0x0000,
        index: 0x0000,
        label: "SET_IDLE",
    },
    SetupCommand {
        request_type: 0x40,
        request: 0x05,
        value: 0x0016,
        index: 0x0000,
        label: "vendor enable",
    },
];

/// What gets registered with the host input subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub name: heapless::String<128>,
    pub phys: heapless::String<64>,
    pub vendor_id: u16,
    pub product_id: u16,
    pub bounds: CalibratedBounds,
    pub fuzz: i32,
}

fn push_truncated<const N: usize>(out: &mut heapless::String<N>, text: &str) {
    for c in text.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
}

fn device_name(identity: &DeviceIdentity) -> heapless::String<128> {
    let mut name = heapless::String::new();
    let parts = [identity.manufacturer.as_deref(), identity.product.as_deref()];
    for part in parts.into_iter().flatten().filter(|p| !p.is_empty()) {
        if !name.is_empty() {
            push_truncated(&mut name, " ");
        }
        push_truncated(&mut name, part);
    }
    if name.is_empty() {
        let _ = write!(
            name,
            "USB Fujitsu U810 Tablet {:04x}:{:04x}",
            identity.vendor_id, identity.product_id
        );
    }
    name
}

fn device_phys(identity: &DeviceIdentity) -> heapless::String<64> {
    let mut phys = heapless::String::new();
    push_truncated(&mut phys, &identity.path);
    push_truncated(&mut phys, "/input0");
    phys
}

fn report_endpoint(endpoints: &[EndpointInfo]) -> Result<EndpointInfo, AttachError> {
    match endpoints {
        [ep] if ep.kind == EndpointKind::InterruptIn => {
            if usize::from(ep.max_packet) < REPORT_LEN {
                return Err(AttachError::ShortEndpoint {
                    max_packet: ep.max_packet,
                });
            }
            Ok(*ep)
        }
        _ => Err(AttachError::ShapeMismatch {
            count: endpoints.len(),
            first: endpoints.first().map(|ep| ep.kind),
        }),
    }
}

fn allocate_buffer(len: usize) -> Result<Vec<u8>, AttachError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| AttachError::ResourceExhaustion(TransportError::NoMemory))?;
    buffer.resize(len, 0);
    Ok(buffer)
}

/// Claims `device` and starts polling it.
///
/// Anything acquired before a failing step is dropped on the way out.
pub fn attach<D, H, P>(
    device: &mut D,
    host: &mut H,
    params: &P,
    tracker: Arc<CalibrationTracker>,
) -> Result<Session<D::Pipe, H::Sink>, AttachError>
where
    D: TouchDevice,
    H: InputHost,
    P: ParamStore,
{
    let endpoint = report_endpoint(&device.endpoints())?;
    let transfer_len = usize::from(endpoint.max_packet).min(TRANSFER_LEN);

    let buffer = allocate_buffer(transfer_len)?;
    let pipe = device
        .open_pipe(&endpoint, transfer_len)
        .map_err(|e| match e {
            TransportError::NoMemory => AttachError::ResourceExhaustion(e),
            e => AttachError::Transport(e),
        })?;

    let config = params
        .load()
        .map_err(|e| AttachError::Params(Box::new(e)))?
        .device_config()?;

    let identity = device.identity();
    let capabilities = Capabilities {
        name: device_name(&identity),
        phys: device_phys(&identity),
        vendor_id: identity.vendor_id,
        product_id: identity.product_id,
        bounds: config.bounds,
        fuzz: AXIS_FUZZ,
    };
    let sink = host
        .register(&capabilities)
        .map_err(AttachError::Register)?;
    info!(
        "probing: device found [{}][{}]",
        capabilities.name, capabilities.phys
    );

    for command in &SETUP_COMMANDS {
        if let Err(e) = device.control(command) {
            warn!("{}: {} failed: {e}", capabilities.name, command.label);
        }
    }

    let mut session = Session::new(
        capabilities.name,
        config,
        tracker,
        pipe,
        sink,
        buffer,
    );
    session.start().map_err(AttachError::Arm)?;

    let bounds = &config.bounds;
    info!(
        "{}: attached, {} orientation{}, x[{},{}] y[{},{}]",
        session.name(),
        config.orientation,
        if config.calibrate { ", calibrating" } else { "" },
        bounds.min_x(),
        bounds.max_x(),
        bounds.min_y(),
        bounds.max_y()
    );
    Ok(session)
}

/// Stops polling, waits for the session to close, then releases the request,
/// the buffer and the input registration.
pub fn detach<P, S>(mut session: Session<P, S>) -> SessionStats
where
    P: ReportPipe,
    S: InputSink,
{
    session.close();
    let stats = session.run();
    let (name, pipe, sink) = session.into_parts();
    drop(pipe);
    sink.unregister();
    info!(
        "{name}: detached after {} samples, {} transient faults",
        stats.samples, stats.transient_faults
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interrupt_in(max_packet: u16) -> EndpointInfo {
        EndpointInfo {
            address: 0x81,
            kind: EndpointKind::InterruptIn,
            max_packet,
            interval: 10,
        }
    }

    #[test]
    fn single_interrupt_in_endpoint_is_accepted() {
        assert_eq!(report_endpoint(&[interrupt_in(8)]).unwrap().address, 0x81);
    }

    #[test]
    fn endpoint_count_and_kind_are_checked() {
        assert!(matches!(
            report_endpoint(&[]),
            Err(AttachError::ShapeMismatch { count: 0, first: None })
        ));
        assert!(matches!(
            report_endpoint(&[interrupt_in(8), interrupt_in(8)]),
            Err(AttachError::ShapeMismatch { count: 2, .. })
        ));
        let bulk = EndpointInfo {
            kind: EndpointKind::BulkIn,
            ..interrupt_in(64)
        };
        let err = report_endpoint(&[bulk]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected one interrupt-in endpoint, found 1 endpoint(s) (first is bulk-in)"
        );
    }

    #[test]
    fn endpoint_shorter_than_a_report_is_rejected() {
        assert!(matches!(
            report_endpoint(&[interrupt_in(4)]),
            Err(AttachError::ShortEndpoint { max_packet: 4 })
        ));
    }

    #[test]
    fn name_joins_manufacturer_and_product() {
        let identity = DeviceIdentity {
            vendor_id: 0x0430,
            product_id: 0x0530,
            manufacturer: Some("Fujitsu Component".into()),
            product: Some("USB Touch Panel".into()),
            path: "usb-0000:00:1d.0-1".into(),
        };
        assert_eq!(device_name(&identity), "Fujitsu Component USB Touch Panel");
        assert_eq!(device_phys(&identity), "usb-0000:00:1d.0-1/input0");
    }

    #[test]
    fn name_falls_back_to_ids() {
        let identity = DeviceIdentity {
            vendor_id: 0x0430,
            product_id: 0x0530,
            ..Default::default()
        };
        assert_eq!(device_name(&identity), "USB Fujitsu U810 Tablet 0430:0530");
    }

    #[test]
    fn long_strings_are_truncated() {
        let identity = DeviceIdentity {
            manufacturer: Some("m".repeat(100)),
            product: Some("p".repeat(100)),
            path: "x".repeat(80),
            ..Default::default()
        };
        assert_eq!(device_name(&identity).len(), 128);
        assert_eq!(device_phys(&identity).len(), 64);
    }
}
