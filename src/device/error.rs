use std::{error::Error, fmt, io};

use crate::snes::mapping::MappingError;

use super::capability::DeviceCapabilities;

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Coarse classification an outer service layer maps onto its own status
/// codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    Unmapped,
    CapabilityUnavailable,
    NotFound,
    InvalidArgument,
    /// The request failed but the connection is still usable.
    Transient,
    /// The connection can no longer be trusted and has been closed.
    Fatal,
    Closed,
    DeadlineExceeded,
    DetectionFailed,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Unmapped => "unmapped_address",
            ErrorKind::CapabilityUnavailable => "capability_unavailable",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Transient => "transient",
            ErrorKind::Fatal => "fatal",
            ErrorKind::Closed => "closed",
            ErrorKind::DeadlineExceeded => "deadline_exceeded",
            ErrorKind::DetectionFailed => "detection_failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug)]
pub enum DeviceError {
    OutOfRange { offset: u64, len: u64, capacity: u64 },
    CapabilityUnavailable(DeviceCapabilities),
    Mapping(MappingError),
    /// The peer answered with a textual error.
    Remote(String),
    UnexpectedLength { expected: usize, actual: usize },
    /// The caller's deadline passed before any I/O was attempted.
    DeadlineExceeded,
    /// The deadline expired mid-operation.
    Timeout,
    Io(io::Error),
    Protocol(String),
    Closed,
    NoDeviceFound(String),
    NoDriverFound(String),
    InvalidUri(String),
}

impl DeviceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeviceError::OutOfRange { .. }
            | DeviceError::Remote(_)
            | DeviceError::UnexpectedLength { .. } => ErrorKind::Transient,
            DeviceError::CapabilityUnavailable(_) => ErrorKind::CapabilityUnavailable,
            DeviceError::Mapping(_) => ErrorKind::Unmapped,
            DeviceError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            DeviceError::Timeout | DeviceError::Io(_) | DeviceError::Protocol(_) => {
                ErrorKind::Fatal
            }
            DeviceError::Closed => ErrorKind::Closed,
            DeviceError::NoDeviceFound(_) | DeviceError::NoDriverFound(_) => ErrorKind::NotFound,
            DeviceError::InvalidUri(_) => ErrorKind::InvalidArgument,
        }
    }

    /// True when the device behind this error must not be used again.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Fatal | ErrorKind::Closed)
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::OutOfRange {
                offset,
                len,
                capacity,
            } => write!(
                f,
                "device access offset 0x{offset:06X} len {len} exceeds capacity 0x{capacity:06X}"
            ),
            DeviceError::CapabilityUnavailable(caps) => {
                write!(f, "capability unavailable: {caps}")
            }
            DeviceError::Mapping(err) => write!(f, "{err}"),
            DeviceError::Remote(msg) => write!(f, "device reported an error: {msg}"),
            DeviceError::UnexpectedLength { expected, actual } => write!(
                f,
                "device replied with {actual} bytes, expected {expected}"
            ),
            DeviceError::DeadlineExceeded => {
                write!(f, "deadline exceeded before the request was sent")
            }
            DeviceError::Timeout => write!(f, "device did not answer before the deadline"),
            DeviceError::Io(err) => write!(f, "device i/o error: {err}"),
            DeviceError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            DeviceError::Closed => write!(f, "device connection is closed"),
            DeviceError::NoDeviceFound(key) => write!(f, "no device found for '{key}'"),
            DeviceError::NoDriverFound(kind) => write!(f, "no driver registered for '{kind}'"),
            DeviceError::InvalidUri(uri) => write!(f, "invalid device uri '{uri}'"),
        }
    }
}

impl Error for DeviceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DeviceError::Mapping(err) => Some(err),
            DeviceError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MappingError> for DeviceError {
    fn from(value: MappingError) -> Self {
        DeviceError::Mapping(value)
    }
}

impl From<io::Error> for DeviceError {
    fn from(value: io::Error) -> Self {
        DeviceError::Io(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_fatal() {
        assert!(DeviceError::Timeout.is_fatal());
        assert!(DeviceError::Closed.is_fatal(), "closed devices stay closed");
        assert!(
            DeviceError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "gone")).is_fatal(),
            "broken socket invalidates the device"
        );
    }

    #[test]
    fn request_failures_keep_the_connection() {
        assert!(!DeviceError::Remote("bad address".into()).is_fatal());
        assert!(!DeviceError::DeadlineExceeded.is_fatal(), "nothing was sent");
        assert!(
            !DeviceError::CapabilityUnavailable(DeviceCapabilities::RESET_SYSTEM).is_fatal(),
            "missing capability is not a connection failure"
        );
    }

    #[test]
    fn mapping_errors_report_unmapped_kind() {
        let err: DeviceError = MappingError::UnknownMapping { address: 0 }.into();
        assert_eq!(err.kind(), ErrorKind::Unmapped);
        assert_eq!(err.kind().code(), "unmapped_address");
        assert!(err.source().is_some(), "mapping error is kept as the source");
    }
}
