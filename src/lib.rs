//! Userspace driver for the Fujitsu USB touch panel: libusb in, uinput out.

pub mod errors;
pub mod settings;
pub mod supervisor;
pub mod uinput;
pub mod usb;
pub mod worker;
