use bytes::Bytes;
use tracing::{debug, error};

use crate::config::DriverConfig;
use crate::error::{FramingError, Result, TransportError};
use crate::frame::{Command, Frame, Marker};
use crate::transport::Transport;

/// Framed request/response exchange on top of a [`Transport`].
///
/// A link has no notion of sessions; callers serialize access to it.
pub struct Link<T> {
    transport: T,
    marker: Marker,
    config: DriverConfig,
    buf: Vec<u8>,
}

impl<T: Transport> Link<T> {
    pub fn new(transport: T, config: DriverConfig) -> Self {
        Self {
            transport,
            marker: config.marker,
            config,
            buf: Vec::new(),
        }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    pub fn send(&mut self, command: Command, args: &[u8]) -> Result<()> {
        let frame = Frame::new(self.marker, command.into(), Bytes::copy_from_slice(args));
        let data = frame.encode()?;
        debug!(%command, bytes = hex::encode(&data), "USB Write");

        let written = self.transport.write(&data, self.config.send_timeout).map_err(|e| {
            error!("Send command {:#04x} failed: {}", u8::from(command), e);
            e
        })?;
        if written != data.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: data.len(),
            }
            .into());
        }
        Ok(())
    }

    /// Receives one response frame of at most `max_size` bytes answering `command`.
    pub fn receive(&mut self, command: Command, max_size: usize) -> Result<Frame> {
        self.buf.resize(max_size, 0);
        let received = self
            .transport
            .read(&mut self.buf, self.config.receive_timeout)
            .map_err(|e| {
                error!("Receive for command {:#04x} failed: {}", u8::from(command), e);
                e
            })?;
        let data = &self.buf[..received];
        debug!(%command, bytes = hex::encode(data), "USB Read");

        Frame::decode(data)
            .and_then(|frame| frame.expect_response(command))
            .map_err(|e| self.log_malformed(e, received))
    }

    pub fn request(&mut self, command: Command, args: &[u8], max_size: usize) -> Result<Frame> {
        self.send(command, args)?;
        self.receive(command, max_size)
    }

    fn log_malformed(&self, err: FramingError, received: usize) -> crate::error::Error {
        error!(bytes = hex::encode(&self.buf[..received]), "{}", err);
        err.into()
    }
}
