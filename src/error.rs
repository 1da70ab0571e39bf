use thiserror::Error;

/// Failures of the serial connection.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Access to a serial port was declined: {0}")]
    PermissionDenied(String),
    #[error("Serial port {port} is unavailable")]
    PortUnavailable {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("Serial stream terminated: {0}")]
    StreamTerminated(String),
    #[error("Serial port is not connected")]
    NotConnected,
    #[error("Serial I/O failed")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SampleError {
    #[error("Malformed sample {line:?}: {reason}")]
    MalformedSample { line: String, reason: String },
}

impl SampleError {
    pub(crate) fn malformed(line: &str, reason: impl Into<String>) -> Self {
        SampleError::MalformedSample {
            line: line.to_owned(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("No orientation sample received yet")]
    NoSample,
    #[error("Reference quaternion has zero magnitude")]
    DegenerateReference,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{0:?} is not a standard baud rate")]
pub struct InvalidBaudRate(pub String);

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed accessing settings file")]
    Io(#[from] std::io::Error),
    #[error("Failed encoding settings")]
    Json(#[from] serde_json::Error),
}
