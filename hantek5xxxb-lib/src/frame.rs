//! Command frames exchanged over the bulk endpoints.
//!
//! Every frame, in both directions, is laid out as
//! `marker | len_lo | len_hi | command | args... | checksum` where the
//! little-endian length counts command, args and checksum.

use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{FromPrimitive, IntoPrimitive};
use strum_macros::Display;

use crate::constants::{FRAME_HEADER_SIZE, MIN_FRAME_SIZE, RESPONSE_FLAG};
use crate::error::FramingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum Marker {
    Normal = 0x53,
    Debug = 0x43,

    #[num_enum(catch_all)]
    Unknown(u8),
}

// `#[default]` would be read by num_enum as the fallback variant and clash with `catch_all`.
impl Default for Marker {
    fn default() -> Self {
        Marker::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum Command {
    Echo = 0x00,
    ReadSysData = 0x01,
    ReadSampleData = 0x02,
    ReadFile = 0x10,
    WriteSysData = 0x11,
    /// Panel lock (sub-command 0x01)
    Lock = 0x12,

    #[num_enum(catch_all)]
    Unknown(u8),
}

impl Command {
    /// Command byte the device answers with.
    pub fn response_code(self) -> u8 {
        u8::from(self) | RESPONSE_FLAG
    }
}

/// Low byte of the sum of all bytes.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub marker: Marker,
    /// Raw command byte, including the response flag for device frames
    pub command: u8,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(marker: Marker, command: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            marker,
            command,
            payload: payload.into(),
        }
    }

    /// Host request with the normal marker.
    pub fn request(command: Command, args: impl Into<Bytes>) -> Self {
        Self::new(Marker::Normal, command.into(), args)
    }

    pub fn encode(&self) -> Result<Bytes, FramingError> {
        let declared = self.payload.len() + 2;
        let declared = u16::try_from(declared).map_err(|_| FramingError::PayloadTooLarge {
            len: self.payload.len(),
        })?;

        let mut buf = BytesMut::with_capacity(declared as usize + FRAME_HEADER_SIZE);
        buf.put_u8(self.marker.into());
        buf.put_u16_le(declared);
        buf.put_u8(self.command);
        buf.put_slice(&self.payload);
        let sum = checksum(&buf);
        buf.put_u8(sum);
        Ok(buf.freeze())
    }

    /// Validates size and checksum of one received transfer.
    ///
    /// The command byte is not checked here, see [`Frame::expect_response`].
    pub fn decode(bytes: &[u8]) -> Result<Self, FramingError> {
        if bytes.len() < FRAME_HEADER_SIZE {
            return Err(FramingError::TooShort { actual: bytes.len() });
        }

        let declared = u16::from_le_bytes([bytes[1], bytes[2]]) as usize;
        if bytes.len() != declared + FRAME_HEADER_SIZE {
            return Err(FramingError::SizeMismatch {
                declared: declared + FRAME_HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        if bytes.len() < MIN_FRAME_SIZE {
            return Err(FramingError::TooShort { actual: bytes.len() });
        }

        let (body, tail) = bytes.split_at(bytes.len() - 1);
        let expected = checksum(body);
        if tail[0] != expected {
            return Err(FramingError::Checksum {
                expected,
                actual: tail[0],
            });
        }

        Ok(Self {
            marker: Marker::from(bytes[0]),
            command: bytes[3],
            payload: Bytes::copy_from_slice(&body[FRAME_HEADER_SIZE + 1..]),
        })
    }

    /// Checks that this frame answers `request`.
    pub fn expect_response(self, request: Command) -> Result<Self, FramingError> {
        let expected = request.response_code();
        if self.command != expected {
            return Err(FramingError::CommandEcho {
                expected,
                actual: self.command,
            });
        }
        Ok(self)
    }

    /// First payload byte, used as sub-command or status by most responses.
    pub fn sub_command(&self) -> Result<u8, FramingError> {
        self.payload
            .first()
            .copied()
            .ok_or(FramingError::TooShort { actual: MIN_FRAME_SIZE })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_read_sysdata() {
        let frame = Frame::request(Command::ReadSysData, Bytes::new());
        assert_eq!(frame.encode().unwrap().as_ref(), &[0x53, 0x02, 0x00, 0x01, 0x56]);
    }

    #[test]
    fn test_encode_lock() {
        let frame = Frame::request(Command::Lock, vec![0x01, 0x01]);
        assert_eq!(
            frame.encode().unwrap().as_ref(),
            &[0x53, 0x04, 0x00, 0x12, 0x01, 0x01, 0x6b]
        );
    }

    #[test]
    fn test_response_code() {
        assert_eq!(Command::ReadSysData.response_code(), 0x81);
        assert_eq!(Command::Lock.response_code(), 0x92);
        assert_eq!(Command::from(0x11), Command::WriteSysData);
        assert_eq!(Command::from(0x55), Command::Unknown(0x55));
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0xff, 0x02]), 0x01);
        assert_eq!(checksum(&[0x80; 4]), 0x00);
    }
}
