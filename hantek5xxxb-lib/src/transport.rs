use std::thread;
use std::time::Duration;

use nusb::transfer::RequestBuffer;
use nusb::{Device, DeviceInfo, Interface};
use tokio::runtime::{Builder, Runtime};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::DriverConfig;
use crate::error::TransportError;

/// Blocking bulk transport to one instrument.
///
/// Every call blocks until the transfer completes or the timeout expires;
/// expiry is reported as [`TransportError::Timeout`] and never retried.
pub trait Transport {
    fn open(&mut self) -> Result<(), TransportError>;
    fn claim(&mut self) -> Result<(), TransportError>;
    fn close(&mut self) -> Result<(), TransportError>;
    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransportError>;
    /// Reads one transfer into `buf`, returning the number of bytes received.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Physical address of the device, `bus.address`.
    fn connection_id(&self) -> Option<String> {
        None
    }
}

/// A scope found on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub bus: u8,
    pub address: u8,
    pub product: Option<String>,
    pub serial: Option<String>,
}

impl DeviceSummary {
    pub fn connection_id(&self) -> String {
        format!("{}.{}", self.bus, self.address)
    }
}

fn matches(config: &DriverConfig, info: &DeviceInfo) -> bool {
    if info.vendor_id() != config.vendor_id || info.product_id() != config.product_id {
        return false;
    }
    match &config.conn {
        Some(conn) => *conn == format!("{}.{}", info.bus_number(), info.device_address()),
        None => true,
    }
}

/// Lists every attached scope matching the configured ids.
pub fn discover(config: &DriverConfig) -> Result<Vec<DeviceSummary>, TransportError> {
    Ok(nusb::list_devices()?
        .filter(|d| matches(config, d))
        .map(|d| DeviceSummary {
            bus: d.bus_number(),
            address: d.device_address(),
            product: d.product_string().map(str::to_owned),
            serial: d.serial_number().map(str::to_owned),
        })
        .collect())
}

/// [`Transport`] over `nusb`, driving its transfer futures on a private runtime.
pub struct NusbTransport {
    config: DriverConfig,
    runtime: Runtime,
    info: Option<DeviceInfo>,
    device: Option<Device>,
    interface: Option<Interface>,
}

impl NusbTransport {
    pub fn new(config: DriverConfig) -> Result<Self, TransportError> {
        let runtime = Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(TransportError::Runtime)?;
        Ok(Self {
            config,
            runtime,
            info: None,
            device: None,
            interface: None,
        })
    }

    fn interface(&self) -> Result<&Interface, TransportError> {
        self.interface.as_ref().ok_or(TransportError::NotOpen)
    }
}

impl Transport for NusbTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        info!("Searching for Hantek 5xxxB oscilloscope...");
        let info = nusb::list_devices()?
            .find(|d| matches(&self.config, d))
            .ok_or(TransportError::DeviceNotFound)?;

        info!(
            "Found device on bus {} addr {}",
            info.bus_number(),
            info.device_address()
        );

        self.device = Some(info.open()?);
        self.info = Some(info);
        Ok(())
    }

    fn claim(&mut self) -> Result<(), TransportError> {
        let device = self.device.as_ref().ok_or(TransportError::NotOpen)?;

        info!("Performing USB device reset...");
        device.reset()?;
        thread::sleep(Duration::from_millis(50));

        let interface = device.detach_and_claim_interface(self.config.interface)?;
        info!("Interface {} claimed successfully.", self.config.interface);
        self.interface = Some(interface);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if let Some(info) = &self.info {
            info!(
                "Closing device on {}.{} interface {}.",
                info.bus_number(),
                info.device_address(),
                self.config.interface
            );
        }
        self.interface = None;
        self.device = None;
        Ok(())
    }

    fn write(&mut self, data: &[u8], limit: Duration) -> Result<usize, TransportError> {
        let transfer = self.interface()?.bulk_out(self.config.endpoint_out, data.to_vec());
        let completion = self
            .runtime
            .block_on(async { timeout(limit, transfer).await })
            .map_err(|_| TransportError::Timeout {
                op: "write",
                timeout: limit,
            })?;
        let sent = completion.into_result()?.actual_length();
        debug!("Sent {} bytes", sent);
        Ok(sent)
    }

    fn read(&mut self, buf: &mut [u8], limit: Duration) -> Result<usize, TransportError> {
        let transfer = self
            .interface()?
            .bulk_in(self.config.endpoint_in, RequestBuffer::new(buf.len()));
        let completion = self
            .runtime
            .block_on(async { timeout(limit, transfer).await })
            .map_err(|_| TransportError::Timeout {
                op: "read",
                timeout: limit,
            })?;
        let data = completion.into_result()?;
        let received = data.len().min(buf.len());
        buf[..received].copy_from_slice(&data[..received]);
        debug!("Received {} bytes", received);
        Ok(received)
    }

    fn connection_id(&self) -> Option<String> {
        self.info
            .as_ref()
            .map(|info| format!("{}.{}", info.bus_number(), info.device_address()))
    }
}
