//! Native HID backend interface
//!
//! The binding never talks to USB directly. It calls exactly one method of
//! these traits per host call. [`crate::hid::usb::UsbHidApi`] is the
//! production implementation; tests substitute their own.

use crate::hid::{Result, WideString};

/// One descriptor of a device scan, as produced by the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawDeviceInfo {
    pub path: Vec<u8>,
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<WideString>,
    pub release_number: u16,
    pub manufacturer_string: Option<WideString>,
    pub product_string: Option<WideString>,
    pub usage_page: u16,
    pub usage: u16,
    pub interface_number: i32,
}

/// Result of a device scan.
///
/// Entries are addressed in scan order. The list is released when the
/// value is dropped, so ownership decides when that happens.
pub trait DeviceList: Send + Sync {
    fn entry(&self, index: usize) -> Option<&RawDeviceInfo>;
}

/// Process-wide HID library.
#[cfg_attr(test, mockall::automock)]
pub trait HidApi: Send + Sync {
    fn init(&self) -> Result<()>;

    fn exit(&self) -> Result<()>;

    /// Scan for devices. A vendor or product id of 0 matches any device.
    fn enumerate(&self, vendor_id: u16, product_id: u16) -> Result<Box<dyn DeviceList>>;

    /// Open the first device matching the id pair.
    fn open(&self, vendor_id: u16, product_id: u16) -> Result<Box<dyn HidHandle>>;

    fn open_path(&self, path: &[u8]) -> Result<Box<dyn HidHandle>>;
}

/// An open HID device.
///
/// Report buffers carry the report id in byte 0. Lengths returned count
/// that byte. Dropping the handle closes the device.
pub trait HidHandle: Send + Sync {
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Read an input report, honoring the current blocking mode.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Read an input report, waiting at most `timeout_ms`. A negative
    /// timeout waits indefinitely; 0 polls.
    fn read_timeout(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize>;

    fn set_nonblocking(&mut self, nonblock: bool) -> Result<()>;

    fn manufacturer_string(&mut self, max_len: usize) -> Result<WideString>;

    fn product_string(&mut self, max_len: usize) -> Result<WideString>;

    fn serial_number_string(&mut self, max_len: usize) -> Result<WideString>;

    fn indexed_string(&mut self, index: i32, max_len: usize) -> Result<WideString>;

    fn send_feature_report(&mut self, data: &[u8]) -> Result<usize>;

    /// Fill `buf` with a feature report; `buf[0]` selects the report id.
    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Message of the most recent failed call, if any.
    fn last_error(&self) -> Option<WideString>;
}

/// Truncate a wide string the way a NUL-terminated buffer of `max_len`
/// units would.
pub fn fit_to_buffer(mut s: WideString, max_len: usize) -> WideString {
    s.truncate(max_len.saturating_sub(1));
    s
}
