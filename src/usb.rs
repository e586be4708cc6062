use std::{sync::Arc, time::Duration};

use log::{debug, warn};
use rusb::{Context, Device, DeviceHandle, Direction, TransferType, UsbContext};
use u810::{
    Completion, DeviceIdentity, EndpointInfo, EndpointKind, ReportPipe, SetupCommand, TouchDevice,
    TransferStatus, TransportError, DEVICE_ID,
};

use crate::{
    errors::AppError,
    supervisor::{PanelKey, PanelSource},
    worker::{CancelPipe, CancelToken},
};

/// How long one blocking read may sit before the cancel flag is checked again.
const WAIT_SLICE: Duration = Duration::from_millis(100);
const CONTROL_TIMEOUT: Duration = Duration::from_millis(1000);

fn is_panel(device: &Device<Context>) -> bool {
    device
        .device_descriptor()
        .is_ok_and(|d| (d.vendor_id(), d.product_id()) == DEVICE_ID)
}

fn panel_key(device: &Device<Context>) -> PanelKey {
    PanelKey {
        bus: device.bus_number(),
        address: device.address(),
    }
}

/// The host's USB buses, as seen through one libusb context.
pub struct UsbBus {
    context: Context,
}

impl UsbBus {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            context: Context::new()?,
        })
    }
}

impl PanelSource for UsbBus {
    type Panel = UsbPanel;

    fn present(&mut self) -> Result<Vec<PanelKey>, AppError> {
        let devices = self.context.devices()?;
        Ok(devices.iter().filter(is_panel).map(|d| panel_key(&d)).collect())
    }

    fn open(&mut self, key: PanelKey) -> Result<UsbPanel, AppError> {
        let device = self
            .context
            .devices()?
            .iter()
            .find(|d| panel_key(d) == key && is_panel(d))
            .ok_or(rusb::Error::NoDevice)?;
        debug!("{key}: opening");
        UsbPanel::open(device)
    }
}

fn topology_path(bus: u8, ports: &[u8]) -> String {
    let ports: Vec<String> = ports.iter().map(u8::to_string).collect();
    if ports.is_empty() {
        format!("usb-{bus:03}")
    } else {
        format!("usb-{bus:03}-{}", ports.join("."))
    }
}

fn endpoint_kind(transfer: TransferType, direction: Direction) -> EndpointKind {
    match (transfer, direction) {
        (TransferType::Interrupt, Direction::In) => EndpointKind::InterruptIn,
        (TransferType::Interrupt, Direction::Out) => EndpointKind::InterruptOut,
        (TransferType::Bulk, Direction::In) => EndpointKind::BulkIn,
        (TransferType::Bulk, Direction::Out) => EndpointKind::BulkOut,
        (TransferType::Isochronous, Direction::In) => EndpointKind::IsochronousIn,
        (TransferType::Isochronous, Direction::Out) => EndpointKind::IsochronousOut,
        (TransferType::Control, _) => EndpointKind::Control,
    }
}

/// Maps a failed blocking read onto the completion status the session expects.
fn completion_status(error: rusb::Error) -> TransferStatus {
    match error {
        rusb::Error::NoDevice => TransferStatus::Disconnected,
        // libusb reports a cancelled synchronous transfer as interrupted
        rusb::Error::Interrupted => TransferStatus::Cancelled,
        rusb::Error::Pipe => TransferStatus::Stall,
        rusb::Error::Overflow => TransferStatus::Overflow,
        other => TransferStatus::Fault(libusb_code(other)),
    }
}

fn libusb_code(error: rusb::Error) -> i32 {
    match error {
        rusb::Error::Io => -1,
        rusb::Error::InvalidParam => -2,
        rusb::Error::Access => -3,
        rusb::Error::NoDevice => -4,
        rusb::Error::NotFound => -5,
        rusb::Error::Busy => -6,
        rusb::Error::Timeout => -7,
        rusb::Error::Overflow => -8,
        rusb::Error::Pipe => -9,
        rusb::Error::Interrupted => -10,
        rusb::Error::NoMem => -11,
        rusb::Error::NotSupported => -12,
        _ => -99,
    }
}

fn transport_error(error: rusb::Error) -> TransportError {
    match error {
        rusb::Error::NoDevice => TransportError::NoDevice,
        rusb::Error::NoMem => TransportError::NoMemory,
        e => TransportError::backend(e),
    }
}

pub struct UsbPanel {
    handle: Arc<DeviceHandle<Context>>,
    identity: DeviceIdentity,
    /// First interface's endpoints, each with its interface number.
    endpoints: Vec<(u8, EndpointInfo)>,
}

impl UsbPanel {
    fn open(device: Device<Context>) -> Result<Self, AppError> {
        let descriptor = device.device_descriptor()?;
        let handle = device.open()?;

        let ports = device.port_numbers().unwrap_or_default();
        let identity = DeviceIdentity {
            vendor_id: descriptor.vendor_id(),
            product_id: descriptor.product_id(),
            manufacturer: handle.read_manufacturer_string_ascii(&descriptor).ok(),
            product: handle.read_product_string_ascii(&descriptor).ok(),
            path: topology_path(device.bus_number(), &ports),
        };

        let config = device.active_config_descriptor()?;
        let endpoints: Vec<(u8, EndpointInfo)> = config
            .interfaces()
            .next()
            .and_then(|interface| {
                let number = interface.number();
                interface.descriptors().next().map(|alt| {
                    alt.endpoint_descriptors()
                        .map(|ep| {
                            let info = EndpointInfo {
                                address: ep.address(),
                                kind: endpoint_kind(ep.transfer_type(), ep.direction()),
                                max_packet: ep.max_packet_size(),
                                interval: ep.interval(),
                            };
                            (number, info)
                        })
                        .collect()
                })
            })
            .unwrap_or_default();

        Ok(Self {
            handle: Arc::new(handle),
            identity,
            endpoints,
        })
    }
}

impl TouchDevice for UsbPanel {
    type Pipe = UsbPipe;

    fn identity(&self) -> DeviceIdentity {
        self.identity.clone()
    }

    fn endpoints(&self) -> Vec<EndpointInfo> {
        self.endpoints.iter().map(|(_, info)| *info).collect()
    }

    fn open_pipe(
        &mut self,
        endpoint: &EndpointInfo,
        len: usize,
    ) -> Result<UsbPipe, TransportError> {
        let interface = self
            .endpoints
            .iter()
            .find(|(_, info)| info.address == endpoint.address)
            .map(|(number, _)| *number)
            .ok_or_else(|| TransportError::backend("endpoint not on this device"))?;

        let handle = Arc::get_mut(&mut self.handle)
            .ok_or_else(|| TransportError::backend("report pipe already open"))?;
        if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
            warn!("can't auto-detach kernel driver: {e}");
        }
        handle.claim_interface(interface).map_err(transport_error)?;

        Ok(UsbPipe {
            handle: Arc::clone(&self.handle),
            address: endpoint.address,
            len,
            armed: false,
            cancel: CancelToken::default(),
        })
    }

    fn control(&mut self, command: &SetupCommand) -> Result<(), TransportError> {
        self.handle
            .write_control(
                command.request_type,
                command.request,
                command.value,
                command.index,
                &[],
                CONTROL_TIMEOUT,
            )
            .map(|_| ())
            .map_err(transport_error)
    }
}

/// Interrupt-in pipe. The armed request is realised as a blocking read
/// performed in `wait`, sliced so that cancellation is noticed promptly.
pub struct UsbPipe {
    handle: Arc<DeviceHandle<Context>>,
    address: u8,
    len: usize,
    armed: bool,
    cancel: CancelToken,
}

impl CancelPipe for UsbPipe {
    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

impl ReportPipe for UsbPipe {
    fn submit(&mut self) -> Result<(), TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        if self.armed {
            return Err(TransportError::backend("report request already outstanding"));
        }
        self.armed = true;
        Ok(())
    }

    fn cancel(&mut self) {
        self.cancel.cancel();
    }

    fn wait(&mut self, buffer: &mut [u8]) -> Completion {
        if !std::mem::take(&mut self.armed) {
            debug!("wait on an idle pipe");
            return Completion::failed(TransferStatus::Cancelled);
        }
        let len = self.len.min(buffer.len());
        loop {
            if self.cancel.is_cancelled() {
                return Completion::failed(TransferStatus::Cancelled);
            }
            match self
                .handle
                .read_interrupt(self.address, &mut buffer[..len], WAIT_SLICE)
            {
                Ok(n) => return Completion::completed(n),
                Err(rusb::Error::Timeout) => continue,
                Err(e) => return Completion::failed(completion_status(e)),
            }
        }
    }
}
