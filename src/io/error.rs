// src/io/error.rs
//
// Error type shared by the transport drivers (MQTT, SocketCAN).
// Every error names the device it came from, e.g. "socketcan(can0)".

use std::fmt;

/// What went wrong at the transport level
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IoErrorKind {
    Connection,
    Protocol,
    Read,
    Write,
    Timeout,
    Configuration,
}

impl IoErrorKind {
    fn label(&self) -> &'static str {
        match self {
            IoErrorKind::Connection => "connection error",
            IoErrorKind::Protocol => "protocol error",
            IoErrorKind::Read => "read error",
            IoErrorKind::Write => "write error",
            IoErrorKind::Timeout => "timeout",
            IoErrorKind::Configuration => "configuration error",
        }
    }
}

/// Transport error with the originating device
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IoError {
    pub kind: IoErrorKind,
    pub device: String,
    pub message: String,
}

impl IoError {
    fn new(kind: IoErrorKind, device: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub fn connection(device: &str, message: impl Into<String>) -> Self {
        Self::new(IoErrorKind::Connection, device, message)
    }

    pub fn protocol(device: &str, message: impl Into<String>) -> Self {
        Self::new(IoErrorKind::Protocol, device, message)
    }

    pub fn read(device: &str, message: impl Into<String>) -> Self {
        Self::new(IoErrorKind::Read, device, message)
    }

    pub fn write(device: &str, message: impl Into<String>) -> Self {
        Self::new(IoErrorKind::Write, device, message)
    }

    pub fn timeout(device: &str, message: impl Into<String>) -> Self {
        Self::new(IoErrorKind::Timeout, device, message)
    }

    pub fn configuration(device: &str, message: impl Into<String>) -> Self {
        Self::new(IoErrorKind::Configuration, device, message)
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.device, self.kind.label(), self.message)
    }
}

impl std::error::Error for IoError {}
