//! Module-level functions
//!
//! Library lifecycle, scanning and opening go through the process-wide
//! backend. The per-device functions take the device as their first
//! argument and behave exactly like the corresponding `Device` methods.

use crate::hid::args::{self, check_sleep};
use crate::hid::backend::HidApi;
use crate::hid::device::{open_with, HidDevice};
use crate::hid::enumerate::{enumerate_with, Enumeration};
use crate::hid::usb::backend;
use pyo3::prelude::*;
use pyo3::types::PyTuple;
use tracing::debug;

fn lifecycle(op: &str, result: crate::hid::Result<()>) -> Option<bool> {
    match result {
        Ok(()) => Some(true),
        Err(err) => {
            debug!("{} failed: {}", op, err);
            None
        }
    }
}

pub fn init_with(api: &dyn HidApi) -> Option<bool> {
    lifecycle("init", api.init())
}

pub fn exit_with(api: &dyn HidApi) -> Option<bool> {
    lifecycle("exit", api.exit())
}

/// Initialize the HID library. True on success, None on failure.
#[pyfunction]
pub fn init(py: Python<'_>) -> Option<bool> {
    py.detach(|| init_with(backend()))
}

/// Finalize the HID library. True on success, None on failure.
#[pyfunction]
pub fn exit(py: Python<'_>) -> Option<bool> {
    py.detach(|| exit_with(backend()))
}

/// Scan for HID devices: `enumerate()` or `enumerate(vendor_id, product_id)`.
///
/// Returns an `Enumeration`, or None when nothing was found.
#[pyfunction]
#[pyo3(signature = (*args))]
pub fn enumerate(py: Python<'_>, args: &Bound<'_, PyTuple>) -> PyResult<Option<Enumeration>> {
    let filter = args::enumerate_filter(args)?;
    Ok(py.detach(|| enumerate_with(backend(), filter))?)
}

/// Open a device: `open(vendor_id, product_id)` or `open(path)`.
///
/// Returns a `Device`, or None on failure.
#[pyfunction]
#[pyo3(signature = (*args))]
pub fn open(py: Python<'_>, args: &Bound<'_, PyTuple>) -> PyResult<Option<HidDevice>> {
    let target = args::open_target(args)?;
    Ok(py.detach(|| open_with(backend(), &target))?)
}

#[pyfunction]
#[pyo3(signature = (device, *args))]
pub fn write(
    mut device: PyRefMut<'_, HidDevice>,
    args: &Bound<'_, PyTuple>,
) -> PyResult<Option<usize>> {
    let py = device.py();
    device.py_write(py, args)
}

#[pyfunction]
#[pyo3(signature = (device, size, timeout_ms=None))]
pub fn read(
    mut device: PyRefMut<'_, HidDevice>,
    size: &Bound<'_, PyAny>,
    timeout_ms: Option<&Bound<'_, PyAny>>,
) -> PyResult<Option<Vec<u8>>> {
    let py = device.py();
    device.py_read(py, size, timeout_ms)
}

#[pyfunction]
pub fn set(
    mut device: PyRefMut<'_, HidDevice>,
    option: &Bound<'_, PyAny>,
) -> PyResult<Option<bool>> {
    let py = device.py();
    device.py_set(py, option)
}

#[pyfunction]
pub fn getstring(
    mut device: PyRefMut<'_, HidDevice>,
    option: &Bound<'_, PyAny>,
) -> PyResult<Option<String>> {
    let py = device.py();
    device.py_getstring(py, option)
}

#[pyfunction]
pub fn setfeature(
    mut device: PyRefMut<'_, HidDevice>,
    feature_id: &Bound<'_, PyAny>,
    data: &Bound<'_, PyAny>,
) -> PyResult<Option<usize>> {
    let py = device.py();
    device.py_setfeature(py, feature_id, data)
}

#[pyfunction]
pub fn getfeature(
    mut device: PyRefMut<'_, HidDevice>,
    feature_id: &Bound<'_, PyAny>,
    size: &Bound<'_, PyAny>,
) -> PyResult<Option<Vec<u8>>> {
    let py = device.py();
    device.py_getfeature(py, feature_id, size)
}

#[pyfunction]
pub fn error(mut device: PyRefMut<'_, HidDevice>) -> PyResult<Option<String>> {
    device.py_error()
}

#[pyfunction]
pub fn close(mut device: PyRefMut<'_, HidDevice>) {
    device.py_close();
}

/// Sleep for the given number of milliseconds, with the GIL released.
#[pyfunction]
pub fn msleep(py: Python<'_>, milliseconds: i64) -> PyResult<()> {
    let duration = check_sleep(milliseconds)?;
    py.detach(|| std::thread::sleep(duration));
    Ok(())
}
