//! Python bindings for USB HID devices
//!
//! Exposes device enumeration, raw report I/O and feature reports as the
//! `hidlink` extension module.

use pyo3::prelude::*;

mod config;
mod hid;

use hid::functions;

// Re-export for benchmarks
pub use hid::{feature_buffer, forced_ascii, frame_report, widen};

/// Negative read timeout: block until a report arrives.
pub const TIMEOUT_INFINITE: i64 = -1;

/// USB HID devices from Python.
#[pymodule(name = "hidlink")]
fn hidlink(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<hid::DeviceInfo>()?;
    m.add_class::<hid::Enumeration>()?;
    m.add_class::<hid::HidDevice>()?;

    // Library lifecycle
    m.add_function(wrap_pyfunction!(functions::init, m)?)?;
    m.add_function(wrap_pyfunction!(functions::exit, m)?)?;

    m.add_function(wrap_pyfunction!(functions::enumerate, m)?)?;
    m.add_function(wrap_pyfunction!(functions::open, m)?)?;

    // Device functions, also available as methods
    m.add_function(wrap_pyfunction!(functions::write, m)?)?;
    m.add_function(wrap_pyfunction!(functions::read, m)?)?;
    m.add_function(wrap_pyfunction!(functions::set, m)?)?;
    m.add_function(wrap_pyfunction!(functions::getstring, m)?)?;
    m.add_function(wrap_pyfunction!(functions::setfeature, m)?)?;
    m.add_function(wrap_pyfunction!(functions::getfeature, m)?)?;
    m.add_function(wrap_pyfunction!(functions::error, m)?)?;
    m.add_function(wrap_pyfunction!(functions::close, m)?)?;

    m.add_function(wrap_pyfunction!(functions::msleep, m)?)?;

    m.add("VERSION", env!("CARGO_PKG_VERSION"))?;
    m.add("STRING_MAX_LEN", hid::STRING_MAX_LEN)?;
    m.add("TIMEOUT_INFINITE", TIMEOUT_INFINITE)?;

    Ok(())
}
