//! Error types for HID operations

use pyo3::exceptions::{PyTypeError, PyValueError};
use pyo3::prelude::*;
use thiserror::Error;

/// Failures reported by the native HID backend.
///
/// These never reach Python as exceptions: the binding turns them into a
/// `None` return value.
#[derive(Error, Debug)]
pub enum HidError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("USB error: {0}")]
    UsbError(#[from] nusb::Error),

    #[error("Transfer error: {0}")]
    TransferError(#[from] nusb::transfer::TransferError),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Invalid device path: {0}")]
    InvalidPath(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("String not available: {0}")]
    StringUnavailable(&'static str),

    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

pub type Result<T> = std::result::Result<T, HidError>;

/// Misuse of the binding by the caller: bad arguments or a closed object.
///
/// Raised immediately, before any native call is attempted.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum UsageError {
    #[error("bad argument: {what} {value} out of range [{min}, {max}]")]
    OutOfRange {
        what: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{function}() got {got} arguments, expected {expected}")]
    Arity {
        function: &'static str,
        got: usize,
        expected: &'static str,
    },

    #[error("bad argument: {what} must be {expected}")]
    WrongType {
        what: &'static str,
        expected: &'static str,
    },

    #[error("invalid option '{option}' (expected one of: {})", .expected.join(", "))]
    UnknownOption {
        option: String,
        expected: &'static [&'static str],
    },

    #[error("attempt to use an invalid or closed object")]
    ClosedDevice,

    #[error("attempt to use a closed object")]
    ClosedEnumeration,
}

impl From<UsageError> for PyErr {
    fn from(err: UsageError) -> PyErr {
        match err {
            UsageError::Arity { .. } | UsageError::WrongType { .. } => {
                PyTypeError::new_err(err.to_string())
            }
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message() {
        let err = UsageError::OutOfRange {
            what: "vendor id",
            value: 70000,
            min: 0,
            max: 0xFFFF,
        };
        assert_eq!(
            err.to_string(),
            "bad argument: vendor id 70000 out of range [0, 65535]"
        );
    }

    #[test]
    fn test_unknown_option_lists_choices() {
        let err = UsageError::UnknownOption {
            option: "fast".into(),
            expected: &["block", "noblock"],
        };
        assert_eq!(
            err.to_string(),
            "invalid option 'fast' (expected one of: block, noblock)"
        );
    }

    #[test]
    fn test_closed_messages() {
        assert_eq!(
            UsageError::ClosedDevice.to_string(),
            "attempt to use an invalid or closed object"
        );
        assert_eq!(
            UsageError::ClosedEnumeration.to_string(),
            "attempt to use a closed object"
        );
    }
}
