//! Argument validation for the binding
//!
//! Overloaded calls (`open`, `getstring`) are resolved into tagged
//! variants here, and numeric arguments are range checked before any
//! native call is made.

use crate::hid::UsageError;
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyInt, PyString, PyTuple};
use std::str::FromStr;
use std::time::Duration;

/// How `open` selects a device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpenTarget {
    /// First device matching the id pair, as passed by the caller.
    Ids { vendor_id: i64, product_id: i64 },
    /// Platform-specific path, as reported by enumeration.
    Path(Vec<u8>),
}

/// Which device string `getstring` retrieves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringKind {
    Manufacturer,
    Product,
    SerialNumber,
    Indexed(i32),
}

impl StringKind {
    pub const NAMES: &'static [&'static str] = &["manufacturer", "product", "serial_number"];
}

impl FromStr for StringKind {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manufacturer" => Ok(StringKind::Manufacturer),
            "product" => Ok(StringKind::Product),
            "serial_number" => Ok(StringKind::SerialNumber),
            _ => Err(UsageError::UnknownOption {
                option: s.to_string(),
                expected: Self::NAMES,
            }),
        }
    }
}

/// Read mode selected by `set`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockingMode {
    Block,
    NoBlock,
}

impl BlockingMode {
    pub const NAMES: &'static [&'static str] = &["block", "noblock"];

    pub fn is_nonblocking(self) -> bool {
        self == BlockingMode::NoBlock
    }
}

impl FromStr for BlockingMode {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" => Ok(BlockingMode::Block),
            "noblock" => Ok(BlockingMode::NoBlock),
            _ => Err(UsageError::UnknownOption {
                option: s.to_string(),
                expected: Self::NAMES,
            }),
        }
    }
}

fn check_range(what: &'static str, value: i64, min: i64, max: i64) -> Result<i64, UsageError> {
    if value < min || value > max {
        return Err(UsageError::OutOfRange {
            what,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

/// Validate a 16-bit vendor or product id.
pub fn check_id(what: &'static str, value: i64) -> Result<u16, UsageError> {
    check_range(what, value, 0, u16::MAX as i64).map(|v| v as u16)
}

/// Validate a one-byte report or feature id.
pub fn check_report_id(what: &'static str, value: i64) -> Result<u8, UsageError> {
    check_range(what, value, 0, u8::MAX as i64).map(|v| v as u8)
}

/// Validate a buffer size; it must be non-negative.
pub fn check_size(what: &'static str, value: i64) -> Result<usize, UsageError> {
    check_range(what, value, 0, i32::MAX as i64).map(|v| v as usize)
}

/// Validate a read timeout in milliseconds. Negative values block.
pub fn check_timeout(value: i64) -> Result<i32, UsageError> {
    check_range("timeout", value, i32::MIN as i64, i32::MAX as i64).map(|v| v as i32)
}

/// Validate a sleep duration in milliseconds.
pub fn check_sleep(value: i64) -> Result<Duration, UsageError> {
    check_range("sleep duration", value, 0, i64::MAX).map(|v| Duration::from_millis(v as u64))
}

/// Validate a vendor/product pair.
pub fn check_id_pair(vendor_id: i64, product_id: i64) -> Result<(u16, u16), UsageError> {
    Ok((
        check_id("vendor id", vendor_id)?,
        check_id("product id", product_id)?,
    ))
}

// Python extraction. Type mismatches are programming errors, so they are
// reported as `UsageError::WrongType` rather than the raw pyo3 message.

pub(crate) fn int_arg(obj: &Bound<'_, PyAny>, what: &'static str) -> PyResult<i64> {
    if !obj.is_instance_of::<PyInt>() {
        return Err(UsageError::WrongType {
            what,
            expected: "an integer",
        }
        .into());
    }
    obj.extract::<i64>()
        .map_err(|_| UsageError::WrongType {
            what,
            expected: "a 64-bit integer",
        })
        .map_err(PyErr::from)
}

pub(crate) fn str_arg(obj: &Bound<'_, PyAny>, what: &'static str) -> PyResult<String> {
    if !obj.is_instance_of::<PyString>() {
        return Err(UsageError::WrongType {
            what,
            expected: "a string",
        }
        .into());
    }
    Ok(obj.extract::<String>()?)
}

pub(crate) fn bytes_arg(obj: &Bound<'_, PyAny>, what: &'static str) -> PyResult<Vec<u8>> {
    if obj.is_instance_of::<PyBytes>() {
        return Ok(obj.extract::<Vec<u8>>()?);
    }
    if obj.is_instance_of::<PyString>() {
        return Ok(obj.extract::<String>()?.into_bytes());
    }
    Err(UsageError::WrongType {
        what,
        expected: "bytes",
    }
    .into())
}

/// Resolve `open(vendor_id, product_id)` / `open(path)`.
pub(crate) fn open_target(args: &Bound<'_, PyTuple>) -> PyResult<OpenTarget> {
    match args.len() {
        2 => {
            let vendor_id = int_arg(&args.get_item(0)?, "vendor id")?;
            let product_id = int_arg(&args.get_item(1)?, "product id")?;
            Ok(OpenTarget::Ids {
                vendor_id,
                product_id,
            })
        }
        1 => Ok(OpenTarget::Path(bytes_arg(&args.get_item(0)?, "path")?)),
        got => Err(UsageError::Arity {
            function: "open",
            got,
            expected: "(vendor_id, product_id) or (path)",
        }
        .into()),
    }
}

/// Resolve `enumerate()` / `enumerate(vendor_id, product_id)`.
pub(crate) fn enumerate_filter(args: &Bound<'_, PyTuple>) -> PyResult<Option<(i64, i64)>> {
    match args.len() {
        0 => Ok(None),
        2 => Ok(Some((
            int_arg(&args.get_item(0)?, "vendor id")?,
            int_arg(&args.get_item(1)?, "product id")?,
        ))),
        got => Err(UsageError::Arity {
            function: "enumerate",
            got,
            expected: "none or (vendor_id, product_id)",
        }
        .into()),
    }
}

/// Resolve `write(report)` / `write(report_id, report)`.
pub(crate) fn write_args(args: &Bound<'_, PyTuple>) -> PyResult<(Option<i64>, Vec<u8>)> {
    match args.len() {
        1 => Ok((None, bytes_arg(&args.get_item(0)?, "report")?)),
        2 => Ok((
            Some(int_arg(&args.get_item(0)?, "report id")?),
            bytes_arg(&args.get_item(1)?, "report")?,
        )),
        got => Err(UsageError::Arity {
            function: "write",
            got,
            expected: "([report_id,] report)",
        }
        .into()),
    }
}

/// Resolve the `getstring` option: an integer index or a string name.
pub(crate) fn string_kind(obj: &Bound<'_, PyAny>) -> PyResult<StringKind> {
    if obj.is_instance_of::<PyInt>() {
        let index = int_arg(obj, "string index")?;
        let index = check_range("string index", index, i32::MIN as i64, i32::MAX as i64)?;
        return Ok(StringKind::Indexed(index as i32));
    }
    Ok(str_arg(obj, "string option")?.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_id_bounds() {
        assert_eq!(check_id("vendor id", 0), Ok(0));
        assert_eq!(check_id("vendor id", 0xFFFF), Ok(0xFFFF));
        assert!(check_id("vendor id", -1).is_err());
        assert!(check_id("vendor id", 0x10000).is_err());
    }

    #[test]
    fn test_check_id_pair_reports_failing_side() {
        let err = check_id_pair(0x1234, 70000).unwrap_err();
        assert_eq!(
            err,
            UsageError::OutOfRange {
                what: "product id",
                value: 70000,
                min: 0,
                max: 0xFFFF,
            }
        );
    }

    #[test]
    fn test_check_report_id_bounds() {
        assert_eq!(check_report_id("report id", 255), Ok(255));
        assert!(check_report_id("report id", 256).is_err());
        assert!(check_report_id("report id", -1).is_err());
    }

    #[test]
    fn test_check_size_rejects_negative() {
        assert_eq!(check_size("buffer size", 0), Ok(0));
        assert!(check_size("buffer size", -1).is_err());
    }

    #[test]
    fn test_check_timeout() {
        assert_eq!(check_timeout(-1), Ok(-1));
        assert_eq!(check_timeout(250), Ok(250));
        assert!(check_timeout(i64::MAX).is_err());
    }

    #[test]
    fn test_check_sleep() {
        assert_eq!(check_sleep(0), Ok(Duration::ZERO));
        assert_eq!(check_sleep(15), Ok(Duration::from_millis(15)));
        assert!(matches!(
            check_sleep(-1),
            Err(UsageError::OutOfRange { value: -1, .. })
        ));
    }

    #[test]
    fn test_string_kind_names() {
        assert_eq!("manufacturer".parse(), Ok(StringKind::Manufacturer));
        assert_eq!("product".parse(), Ok(StringKind::Product));
        assert_eq!("serial_number".parse(), Ok(StringKind::SerialNumber));
        assert!("serial".parse::<StringKind>().is_err());
    }

    #[test]
    fn test_blocking_mode_names() {
        assert_eq!("block".parse(), Ok(BlockingMode::Block));
        assert_eq!("noblock".parse(), Ok(BlockingMode::NoBlock));
        assert!(BlockingMode::NoBlock.is_nonblocking());
        assert!(!BlockingMode::Block.is_nonblocking());
        assert!("nonblock".parse::<BlockingMode>().is_err());
    }

    #[cfg(feature = "auto-initialize")]
    mod interpreter {
        use super::*;
        use pyo3::exceptions::{PyTypeError, PyValueError};
        use pyo3::types::PyFloat;

        fn run(test: impl for<'py> FnOnce(Python<'py>)) {
            Python::initialize();
            Python::attach(test);
        }

        #[test]
        fn test_open_target_by_ids() {
            run(|py| {
                let args = (0x1532i64, 0x0084i64).into_pyobject(py).unwrap();
                assert_eq!(
                    open_target(&args).unwrap(),
                    OpenTarget::Ids {
                        vendor_id: 0x1532,
                        product_id: 0x0084,
                    }
                );
            });
        }

        #[test]
        fn test_open_target_keeps_raw_ids() {
            run(|py| {
                let args = (-1i64, 70000i64).into_pyobject(py).unwrap();
                assert_eq!(
                    open_target(&args).unwrap(),
                    OpenTarget::Ids {
                        vendor_id: -1,
                        product_id: 70000,
                    }
                );
            });
        }

        #[test]
        fn test_open_target_by_path() {
            run(|py| {
                let args = ("001:007:00",).into_pyobject(py).unwrap();
                assert_eq!(
                    open_target(&args).unwrap(),
                    OpenTarget::Path(b"001:007:00".to_vec())
                );

                let args = (PyBytes::new(py, b"\x01\xff"),).into_pyobject(py).unwrap();
                assert_eq!(
                    open_target(&args).unwrap(),
                    OpenTarget::Path(vec![0x01, 0xFF])
                );
            });
        }

        #[test]
        fn test_open_target_rejects_bad_calls() {
            run(|py| {
                let err = open_target(&PyTuple::empty(py)).unwrap_err();
                assert!(err.is_instance_of::<PyTypeError>(py));

                let args = (1i64, 2i64, 3i64).into_pyobject(py).unwrap();
                assert!(open_target(&args).unwrap_err().is_instance_of::<PyTypeError>(py));

                let args = (PyFloat::new(py, 1.5), 2i64).into_pyobject(py).unwrap();
                assert!(open_target(&args).unwrap_err().is_instance_of::<PyTypeError>(py));

                let args = (42i64,).into_pyobject(py).unwrap();
                assert!(open_target(&args).unwrap_err().is_instance_of::<PyTypeError>(py));
            });
        }

        #[test]
        fn test_enumerate_filter_arity() {
            run(|py| {
                assert_eq!(enumerate_filter(&PyTuple::empty(py)).unwrap(), None);

                let args = (0x1532i64, 0i64).into_pyobject(py).unwrap();
                assert_eq!(enumerate_filter(&args).unwrap(), Some((0x1532, 0)));

                let args = (0x1532i64,).into_pyobject(py).unwrap();
                assert!(enumerate_filter(&args).unwrap_err().is_instance_of::<PyTypeError>(py));

                let args = ("1532", 0i64).into_pyobject(py).unwrap();
                assert!(enumerate_filter(&args).unwrap_err().is_instance_of::<PyTypeError>(py));
            });
        }

        #[test]
        fn test_write_args_overloads() {
            run(|py| {
                let args = (PyBytes::new(py, b"\x01\x02"),).into_pyobject(py).unwrap();
                assert_eq!(write_args(&args).unwrap(), (None, vec![1, 2]));

                let args = (5i64, PyBytes::new(py, b"\x01\x02")).into_pyobject(py).unwrap();
                assert_eq!(write_args(&args).unwrap(), (Some(5), vec![1, 2]));

                let args = (5i64, "hi").into_pyobject(py).unwrap();
                assert_eq!(write_args(&args).unwrap(), (Some(5), b"hi".to_vec()));

                assert!(write_args(&PyTuple::empty(py))
                    .unwrap_err()
                    .is_instance_of::<PyTypeError>(py));

                let args = (PyBytes::new(py, b"\x01"), 5i64).into_pyobject(py).unwrap();
                assert!(write_args(&args).unwrap_err().is_instance_of::<PyTypeError>(py));
            });
        }

        #[test]
        fn test_string_kind_dispatch() {
            run(|py| {
                let index = 3i64.into_pyobject(py).unwrap().into_any();
                assert_eq!(string_kind(&index).unwrap(), StringKind::Indexed(3));

                let name = "serial_number".into_pyobject(py).unwrap().into_any();
                assert_eq!(string_kind(&name).unwrap(), StringKind::SerialNumber);

                let unknown = "serial".into_pyobject(py).unwrap().into_any();
                assert!(string_kind(&unknown).unwrap_err().is_instance_of::<PyValueError>(py));

                let huge = (1i64 << 40).into_pyobject(py).unwrap().into_any();
                assert!(string_kind(&huge).unwrap_err().is_instance_of::<PyValueError>(py));

                let float = PyFloat::new(py, 1.0).into_any();
                assert!(string_kind(&float).unwrap_err().is_instance_of::<PyTypeError>(py));
            });
        }
    }
}
