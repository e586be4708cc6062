//! Host input side: each attached panel becomes one `/dev/uinput` device.

use evdevil::{
    event::{Abs, EventType, InputEvent, Key},
    uinput::{AbsSetup, UinputDevice},
    AbsInfo, Bus, InputId, InputProp,
};
use log::{debug, info};
use u810::{Axis, Capabilities, InputError, InputHost, InputSink};

const EV_SYN: u16 = 0x00;
const EV_KEY: u16 = 0x01;
const EV_ABS: u16 = 0x03;
const SYN_REPORT: u16 = 0x00;
const ABS_X: u16 = 0x00;
const ABS_Y: u16 = 0x01;

/// Events of one sample, held until the frame is closed by `SYN_REPORT`.
#[derive(Debug, Default)]
struct Frame {
    events: Vec<(u16, u16, i32)>,
}

impl Frame {
    fn abs(&mut self, axis: Axis, value: i32) {
        let code = match axis {
            Axis::X => ABS_X,
            Axis::Y => ABS_Y,
        };
        self.events.push((EV_ABS, code, value));
    }

    fn touch(&mut self, touching: bool) {
        self.events
            .push((EV_KEY, Key::BTN_TOUCH.raw(), i32::from(touching)));
    }

    fn close(&mut self) -> Vec<InputEvent> {
        self.events.push((EV_SYN, SYN_REPORT, 0));
        self.events
            .drain(..)
            .map(|(ty, code, value)| InputEvent::new(EventType::from_raw(ty), code, value))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct UinputHost;

impl InputHost for UinputHost {
    type Sink = UinputSink;

    fn register(&mut self, caps: &Capabilities) -> Result<UinputSink, InputError> {
        let bounds = &caps.bounds;
        let axes = [
            AbsSetup::new(
                Abs::X,
                AbsInfo::new(bounds.min_x(), bounds.max_x()).with_fuzz(caps.fuzz),
            ),
            AbsSetup::new(
                Abs::Y,
                AbsInfo::new(bounds.min_y(), bounds.max_y()).with_fuzz(caps.fuzz),
            ),
        ];
        let device = UinputDevice::builder()?
            .with_input_id(InputId::new(
                Bus::USB,
                caps.vendor_id,
                caps.product_id,
                0,
            ))?
            .with_props([InputProp::DIRECT])?
            .with_abs_axes(axes)?
            .with_keys([
                Key::BTN_TOOL_PEN,
                Key::BTN_TOUCH,
                Key::BTN_STYLUS,
                Key::BTN_STYLUS2,
            ])?
            .build(caps.name.as_str())?;

        match device.sysname() {
            Ok(sysname) => info!(
                "{}: registered as {} ({})",
                caps.name,
                sysname.to_string_lossy(),
                caps.phys
            ),
            Err(_) => info!("{}: registered ({})", caps.name, caps.phys),
        }
        Ok(UinputSink {
            device,
            frame: Frame::default(),
        })
    }
}

pub struct UinputSink {
    device: UinputDevice,
    frame: Frame,
}

impl InputSink for UinputSink {
    fn emit_abs(&mut self, axis: Axis, value: i32) -> Result<(), InputError> {
        self.frame.abs(axis, value);
        Ok(())
    }

    fn emit_touch(&mut self, touching: bool) -> Result<(), InputError> {
        self.frame.touch(touching);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), InputError> {
        let events = self.frame.close();
        self.device.write(&events)?;
        Ok(())
    }

    fn unregister(self) {
        debug!("destroying uinput device");
        drop(self.device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_is_abs_then_touch_then_report() {
        let mut frame = Frame::default();
        frame.abs(Axis::X, 3820);
        frame.abs(Axis::Y, 3920);
        frame.touch(true);
        assert_eq!(
            frame.events,
            vec![
                (EV_ABS, ABS_X, 3820),
                (EV_ABS, ABS_Y, 3920),
                (EV_KEY, Key::BTN_TOUCH.raw(), 1)
            ]
        );
        assert_eq!(frame.close().len(), 4);
        assert!(frame.events.is_empty());
    }

    #[test]
    fn release_is_key_value_zero() {
        let mut frame = Frame::default();
        frame.touch(false);
        assert_eq!(frame.events, vec![(EV_KEY, Key::BTN_TOUCH.raw(), 0)]);
    }
}
