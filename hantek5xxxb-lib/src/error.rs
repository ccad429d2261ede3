use std::io;
use std::time::Duration;

use nusb::transfer::TransferError;
use num_enum::{FromPrimitive, IntoPrimitive};
use thiserror::Error;

use crate::config::ConfigKey;
use crate::engine::AcquisitionState;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures of the blocking USB link itself.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("USB device not found. Is the oscilloscope connected?")]
    DeviceNotFound,

    #[error("Transport is not open")]
    NotOpen,

    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    #[error("USB transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Timeout during USB {op} after {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },

    #[error("Short write: {written} of {expected} bytes sent")]
    ShortWrite { written: usize, expected: usize },

    #[error("Failed to build I/O runtime: {0}")]
    Runtime(io::Error),
}

/// A response frame that does not follow the wire format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("Frame too short: {actual} bytes")]
    TooShort { actual: usize },

    #[error("Response size does not match (declared {declared}, received {actual})")]
    SizeMismatch { declared: usize, actual: usize },

    #[error("Response checksum does not match (got {actual:#04x}, expected {expected:#04x})")]
    Checksum { expected: u8, actual: u8 },

    #[error("Response command does not match (got {actual:#04x}, expected {expected:#04x})")]
    CommandEcho { expected: u8, actual: u8 },

    #[error("Response sub command does not match (got {actual:#04x}, expected {expected:#04x})")]
    SubCommand { expected: u8, actual: u8 },

    #[error("Panel lock not acknowledged (got {actual:#04x}, expected {expected:#04x})")]
    LockEcho { expected: u8, actual: u8 },

    #[error("Payload of {len} bytes does not fit into a frame")]
    PayloadTooLarge { len: usize },

    #[error("SysDATA payload too short: expected at least {expected} bytes, got {actual}")]
    SysDataTooShort { expected: usize, actual: usize },
}

/// Status byte reported by the instrument.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DeviceStatus {
    #[error("Communication timeout")]
    CommunicationTimeout = 1,
    #[error("Checksum error")]
    ChecksumError = 3,
    #[error("Unknown command")]
    UnknownCommand = 4,
    #[error("Invalid access level")]
    InvalidAccessLevel = 5,
    #[error("Hardware error")]
    HardwareError = 8,
    #[error("Device not ready")]
    NotReady = 10,

    #[num_enum(catch_all)]
    #[error("Unknown error (status {0})")]
    Unknown(u8),
}

/// The primary error type for the `hantek5xxxb-lib` library.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Framing(#[from] FramingError),

    #[error("Device reported: {0}")]
    DeviceStatus(DeviceStatus),

    #[error("Unknown register code {value:#04x} for {field}")]
    UnknownRegisterCode { field: &'static str, value: u8 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration key {0} is not applicable here")]
    NotApplicable(ConfigKey),

    #[error("Giving up on channel {channel} after {errors} chunk errors")]
    SampleChunk { channel: usize, errors: u32 },

    #[error("Operation not allowed while {state}")]
    InvalidState { state: AcquisitionState },
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}
