//! HID device enumeration

use crate::hid::args::check_id_pair;
use crate::hid::backend::{DeviceList, HidApi};
use crate::hid::{DeviceInfo, UsageError};
use pyo3::prelude::*;
use tracing::{debug, trace};

enum CursorState {
    /// Released, either explicitly or by finalization.
    Closed,
    /// Holds the scan result; `position` is the next entry to return.
    Open {
        list: Box<dyn DeviceList>,
        position: usize,
    },
    /// Every entry was returned and the scan result released.
    Done,
}

/// Cursor over the devices found by `enumerate`.
///
/// The scan result is owned by the cursor and released exactly once: when
/// the last entry has been returned, on `close`, or when the object is
/// garbage collected.
#[pyclass(module = "hidlink")]
pub struct Enumeration {
    state: CursorState,
}

impl Enumeration {
    /// Wrap a scan result; `None` if it has no entries.
    pub fn from_list(list: Box<dyn DeviceList>) -> Option<Self> {
        list.entry(0)?;
        Some(Self {
            state: CursorState::Open { list, position: 0 },
        })
    }

    /// Return the next device, or `None` once the scan is exhausted.
    pub fn next_device(&mut self) -> Result<Option<DeviceInfo>, UsageError> {
        let (info, more) = match &mut self.state {
            CursorState::Closed => return Err(UsageError::ClosedEnumeration),
            CursorState::Done => return Ok(None),
            CursorState::Open { list, position } => {
                let info = list.entry(*position).map(DeviceInfo::from);
                if info.is_some() {
                    *position += 1;
                }
                (info, list.entry(*position).is_some())
            }
        };

        if !more {
            self.finish();
        }
        Ok(info)
    }

    /// Release the scan result if still held. Never fails.
    pub fn close(&mut self) {
        if matches!(self.state, CursorState::Open { .. }) {
            trace!("releasing device list");
        }
        self.state = CursorState::Closed;
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, CursorState::Open { .. })
    }

    fn finish(&mut self) {
        trace!("device list exhausted");
        self.state = CursorState::Done;
    }
}

#[pymethods]
impl Enumeration {
    /// Next device found, or None if there are no more.
    #[pyo3(name = "next")]
    fn py_next(&mut self) -> PyResult<Option<DeviceInfo>> {
        Ok(self.next_device()?)
    }

    /// Close the enumeration. Always succeeds.
    #[pyo3(name = "close")]
    fn py_close(&mut self) {
        self.close();
    }

    /// True while entries remain.
    #[getter(is_open)]
    fn py_is_open(&self) -> bool {
        self.is_open()
    }

    fn __iter__(slf: PyRef<'_, Self>) -> PyRef<'_, Self> {
        slf
    }

    fn __next__(&mut self) -> PyResult<Option<DeviceInfo>> {
        Ok(self.next_device()?)
    }

    fn __enter__(slf: PyRef<'_, Self>) -> PyRef<'_, Self> {
        slf
    }

    #[pyo3(signature = (*_exc))]
    fn __exit__(&mut self, _exc: &Bound<'_, pyo3::types::PyTuple>) -> bool {
        self.close();
        false
    }
}

/// Scan for devices through `api`.
///
/// `filter` is the raw (vendor_id, product_id) pair from the caller, checked
/// before the backend is touched. Returns `Ok(None)` when the scan fails or
/// finds nothing.
pub fn enumerate_with(
    api: &dyn HidApi,
    filter: Option<(i64, i64)>,
) -> Result<Option<Enumeration>, UsageError> {
    let (vendor_id, product_id) = match filter {
        Some((vendor_id, product_id)) => check_id_pair(vendor_id, product_id)?,
        None => (0, 0),
    };

    match api.enumerate(vendor_id, product_id) {
        Ok(list) => {
            let cursor = Enumeration::from_list(list);
            if cursor.is_none() {
                debug!(
                    "enumerate({:04x}, {:04x}): no devices",
                    vendor_id, product_id
                );
            }
            Ok(cursor)
        }
        Err(err) => {
            debug!("enumerate({:04x}, {:04x}) failed: {}", vendor_id, product_id, err);
            Ok(None)
        }
    }
}
