//! HID device handle for communication

use crate::hid::args::{
    self, check_id_pair, check_report_id, check_size, check_timeout, BlockingMode, OpenTarget,
    StringKind,
};
use crate::hid::backend::{HidApi, HidHandle};
use crate::hid::report::{feature_buffer, frame_report, received};
use crate::hid::{forced_ascii, HidError, UsageError, STRING_MAX_LEN};
use pyo3::prelude::*;
use pyo3::types::PyTuple;
use tracing::{debug, trace};

/// Open HID device.
///
/// Owns the backend handle. `close()` releases it; so does garbage
/// collection of an object that was never closed.
#[pyclass(name = "Device", module = "hidlink")]
pub struct HidDevice {
    handle: Option<Box<dyn HidHandle>>,
}

/// Log an operational failure and turn it into the `None` sentinel.
fn sentinel<T>(op: &str, result: crate::hid::Result<T>) -> Option<T> {
    result
        .map_err(|err: HidError| debug!("{} failed: {}", op, err))
        .ok()
}

impl HidDevice {
    pub fn from_handle(handle: Box<dyn HidHandle>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn handle(&mut self) -> Result<&mut Box<dyn HidHandle>, UsageError> {
        self.handle.as_mut().ok_or(UsageError::ClosedDevice)
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Send an output report. `report_id` defaults to 0.
    ///
    /// Returns the byte count the backend reports as sent.
    pub fn write_report(
        &mut self,
        report_id: Option<i64>,
        report: &[u8],
    ) -> Result<Option<usize>, UsageError> {
        let handle = self.handle()?;
        let report_id = check_report_id("report id", report_id.unwrap_or(0))?;
        let buf = frame_report(report_id, report);
        Ok(sentinel("write", handle.write(&buf)))
    }

    /// Read an input report of at most `size` bytes.
    ///
    /// Without a timeout the handle's blocking mode applies; with one the
    /// timed read is used whatever the mode (negative waits forever).
    pub fn read_report(
        &mut self,
        size: i64,
        timeout_ms: Option<i64>,
    ) -> Result<Option<Vec<u8>>, UsageError> {
        let handle = self.handle()?;
        let size = check_size("buffer size", size)?;
        let timeout_ms = timeout_ms.map(check_timeout).transpose()?;

        let mut buf = vec![0u8; size];
        let result = match timeout_ms {
            Some(timeout) => handle.read_timeout(&mut buf, timeout),
            None => handle.read(&mut buf),
        };
        Ok(sentinel("read", result).map(|n| received(buf, n)))
    }

    pub fn set_mode(&mut self, mode: BlockingMode) -> Result<bool, UsageError> {
        let handle = self.handle()?;
        Ok(sentinel("set", handle.set_nonblocking(mode.is_nonblocking())).is_some())
    }

    pub fn get_string(&mut self, kind: StringKind) -> Result<Option<String>, UsageError> {
        let handle = self.handle()?;
        let result = match kind {
            StringKind::Manufacturer => handle.manufacturer_string(STRING_MAX_LEN),
            StringKind::Product => handle.product_string(STRING_MAX_LEN),
            StringKind::SerialNumber => handle.serial_number_string(STRING_MAX_LEN),
            StringKind::Indexed(index) => handle.indexed_string(index, STRING_MAX_LEN),
        };
        Ok(sentinel("getstring", result).map(|ws| forced_ascii(Some(&ws))))
    }

    pub fn set_feature(
        &mut self,
        feature_id: i64,
        data: &[u8],
    ) -> Result<Option<usize>, UsageError> {
        let handle = self.handle()?;
        let feature_id = check_report_id("feature id", feature_id)?;
        let buf = frame_report(feature_id, data);
        Ok(sentinel("setfeature", handle.send_feature_report(&buf)))
    }

    /// Read a feature report into a `size + 1` byte buffer.
    ///
    /// The result starts with the report id byte and holds only the bytes
    /// the backend reports as received.
    pub fn get_feature(
        &mut self,
        feature_id: i64,
        size: i64,
    ) -> Result<Option<Vec<u8>>, UsageError> {
        let handle = self.handle()?;
        let feature_id = check_report_id("feature id", feature_id)?;
        let size = check_size("buffer size", size)?;

        let mut buf = feature_buffer(feature_id, size);
        let result = handle.get_feature_report(&mut buf);
        Ok(sentinel("getfeature", result).map(|n| received(buf, n)))
    }

    /// Last error reported by the backend for this device.
    pub fn last_error(&mut self) -> Result<Option<String>, UsageError> {
        let handle = self.handle()?;
        Ok(handle.last_error().map(|ws| forced_ascii(Some(&ws))))
    }

    /// Release the device. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.handle.take().is_some() {
            trace!("device closed");
        }
    }
}

#[pymethods]
impl HidDevice {
    /// Send an output report: `write(report)` or `write(report_id, report)`.
    ///
    /// Returns bytes sent, or None on failure.
    #[pyo3(name = "write", signature = (*args))]
    pub(crate) fn py_write(
        &mut self,
        py: Python<'_>,
        args: &Bound<'_, PyTuple>,
    ) -> PyResult<Option<usize>> {
        self.handle()?;
        let (report_id, report) = args::write_args(args)?;
        Ok(py.detach(|| self.write_report(report_id, &report))?)
    }

    /// Read an input report of up to `size` bytes.
    ///
    /// Returns the report as bytes, or None on failure. The GIL is released
    /// while waiting.
    #[pyo3(name = "read", signature = (size, timeout_ms=None))]
    pub(crate) fn py_read(
        &mut self,
        py: Python<'_>,
        size: &Bound<'_, PyAny>,
        timeout_ms: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<Option<Vec<u8>>> {
        self.handle()?;
        let size = args::int_arg(size, "buffer size")?;
        let timeout_ms = timeout_ms
            .map(|t| args::int_arg(t, "timeout"))
            .transpose()?;
        Ok(py.detach(|| self.read_report(size, timeout_ms))?)
    }

    /// Select blocking ("block") or non-blocking ("noblock") reads.
    #[pyo3(name = "set")]
    pub(crate) fn py_set(
        &mut self,
        py: Python<'_>,
        option: &Bound<'_, PyAny>,
    ) -> PyResult<Option<bool>> {
        self.handle()?;
        let mode = args::str_arg(option, "blocking mode")?.parse::<BlockingMode>()?;
        Ok(py.detach(|| self.set_mode(mode))?.then_some(true))
    }

    /// Get "manufacturer", "product", "serial_number" or an indexed string.
    #[pyo3(name = "getstring")]
    pub(crate) fn py_getstring(
        &mut self,
        py: Python<'_>,
        option: &Bound<'_, PyAny>,
    ) -> PyResult<Option<String>> {
        self.handle()?;
        let kind = args::string_kind(option)?;
        Ok(py.detach(|| self.get_string(kind))?)
    }

    /// Send a feature report. Returns bytes sent, or None on failure.
    #[pyo3(name = "setfeature")]
    pub(crate) fn py_setfeature(
        &mut self,
        py: Python<'_>,
        feature_id: &Bound<'_, PyAny>,
        data: &Bound<'_, PyAny>,
    ) -> PyResult<Option<usize>> {
        self.handle()?;
        let feature_id = args::int_arg(feature_id, "feature id")?;
        let data = args::bytes_arg(data, "feature data")?;
        Ok(py.detach(|| self.set_feature(feature_id, &data))?)
    }

    /// Get a feature report. Returns the report as bytes, or None on failure.
    #[pyo3(name = "getfeature")]
    pub(crate) fn py_getfeature(
        &mut self,
        py: Python<'_>,
        feature_id: &Bound<'_, PyAny>,
        size: &Bound<'_, PyAny>,
    ) -> PyResult<Option<Vec<u8>>> {
        self.handle()?;
        let feature_id = args::int_arg(feature_id, "feature id")?;
        let size = args::int_arg(size, "buffer size")?;
        Ok(py.detach(|| self.get_feature(feature_id, size))?)
    }

    /// Describe the last error, or None if there was none.
    #[pyo3(name = "error")]
    pub(crate) fn py_error(&mut self) -> PyResult<Option<String>> {
        Ok(self.last_error()?)
    }

    /// Close the device. Always succeeds.
    #[pyo3(name = "close")]
    pub(crate) fn py_close(&mut self) {
        self.close();
    }

    #[getter(is_open)]
    fn py_is_open(&self) -> bool {
        self.is_open()
    }

    fn __enter__(slf: PyRef<'_, Self>) -> PyRef<'_, Self> {
        slf
    }

    #[pyo3(signature = (*_exc))]
    fn __exit__(&mut self, _exc: &Bound<'_, PyTuple>) -> bool {
        self.close();
        false
    }

    fn __repr__(&self) -> &'static str {
        if self.is_open() {
            "<hidlink.Device open>"
        } else {
            "<hidlink.Device closed>"
        }
    }
}

/// Open a device through `api`.
///
/// Ids are range checked before the backend is touched. Returns `Ok(None)`
/// when the backend cannot open the device; the wrapper is only created
/// once the backend handed over a handle.
pub fn open_with(
    api: &dyn HidApi,
    target: &OpenTarget,
) -> Result<Option<HidDevice>, UsageError> {
    let result = match target {
        OpenTarget::Ids {
            vendor_id,
            product_id,
        } => {
            let (vendor_id, product_id) = check_id_pair(*vendor_id, *product_id)?;
            api.open(vendor_id, product_id)
        }
        OpenTarget::Path(path) => api.open_path(path),
    };
    Ok(sentinel("open", result).map(HidDevice::from_handle))
}
