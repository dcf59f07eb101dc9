//! HID device information from enumeration

use crate::hid::backend::RawDeviceInfo;
use crate::hid::forced_ascii;
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict};

/// HID device information from enumeration.
///
/// A snapshot: values are copied out of the scan result when the
/// enumeration cursor reaches the entry.
#[pyclass(module = "hidlink", frozen)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    #[pyo3(get)]
    pub path: Vec<u8>,

    #[pyo3(get, name = "vid")]
    pub vendor_id: u16,

    #[pyo3(get, name = "pid")]
    pub product_id: u16,

    #[pyo3(get)]
    pub serial_number: String,

    #[pyo3(get, name = "release")]
    pub release_number: u16,

    #[pyo3(get)]
    pub manufacturer_string: String,

    #[pyo3(get)]
    pub product_string: String,

    #[pyo3(get)]
    pub usage_page: u16,

    #[pyo3(get)]
    pub usage: u16,

    #[pyo3(get, name = "interface")]
    pub interface_number: i32,
}

#[pymethods]
impl DeviceInfo {
    fn __repr__(&self) -> String {
        format!(
            "DeviceInfo(vid=0x{:04x}, pid=0x{:04x}, interface={}, path={:?})",
            self.vendor_id,
            self.product_id,
            self.interface_number,
            String::from_utf8_lossy(&self.path)
        )
    }

    /// The record as a plain dict, keyed like the attributes.
    fn to_dict<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let dict = PyDict::new(py);
        dict.set_item("path", PyBytes::new(py, &self.path))?;
        dict.set_item("vid", self.vendor_id)?;
        dict.set_item("pid", self.product_id)?;
        dict.set_item("serial_number", &self.serial_number)?;
        dict.set_item("release", self.release_number)?;
        dict.set_item("manufacturer_string", &self.manufacturer_string)?;
        dict.set_item("product_string", &self.product_string)?;
        dict.set_item("usage_page", self.usage_page)?;
        dict.set_item("usage", self.usage)?;
        dict.set_item("interface", self.interface_number)?;
        Ok(dict)
    }
}

impl From<&RawDeviceInfo> for DeviceInfo {
    fn from(raw: &RawDeviceInfo) -> Self {
        Self {
            path: raw.path.clone(),
            vendor_id: raw.vendor_id,
            product_id: raw.product_id,
            serial_number: forced_ascii(raw.serial_number.as_deref()),
            release_number: raw.release_number,
            manufacturer_string: forced_ascii(raw.manufacturer_string.as_deref()),
            product_string: forced_ascii(raw.product_string.as_deref()),
            usage_page: raw.usage_page,
            usage: raw.usage,
            interface_number: raw.interface_number,
        }
    }
}
