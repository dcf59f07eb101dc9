//! USB HID device access via nusb
//!
//! Python-facing objects (`Device`, `Enumeration`, `DeviceInfo`) sit on top
//! of the backend traits in [`backend`]; [`usb`] is the nusb implementation.

mod args;
mod ascii;
mod backend;
mod descriptor;
mod device;
mod device_info;
mod enumerate;
mod error;
pub(crate) mod functions;
mod report;
#[cfg(test)]
mod testing;
mod usb;

pub use ascii::{forced_ascii, widen, WideString, STRING_MAX_LEN};
pub use device::HidDevice;
pub use device_info::DeviceInfo;
pub use enumerate::Enumeration;
pub use error::{HidError, Result, UsageError};
pub use report::{feature_buffer, frame_report};
