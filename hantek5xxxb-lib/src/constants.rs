// Protocol constants for the Hantek 5xxxB family (Tekway DST, Voltcraft DSO-1062D, ...)

use std::time::Duration;

/// USB vendor id shared by every known model
pub const USB_VENDOR_ID: u16 = 0x049f;

/// USB product id shared by every known model
pub const USB_PRODUCT_ID: u16 = 0x505a;

/// Interface carrying the bulk endpoints
pub const USB_INTERFACE: u8 = 0;

/// Bulk IN endpoint (device to host)
pub const ENDPOINT_IN: u8 = 0x82;

/// Bulk OUT endpoint (host to device)
pub const ENDPOINT_OUT: u8 = 0x01;

/// Bit set on the command byte of every response
pub const RESPONSE_FLAG: u8 = 0x80;

/// marker + length (2 bytes)
pub const FRAME_HEADER_SIZE: usize = 3;

/// Smallest valid frame: header, command and checksum
pub const MIN_FRAME_SIZE: usize = FRAME_HEADER_SIZE + 2;

/// Sub-command of the lock command selecting the panel lock
pub const SUB_LOCK_PANEL: u8 = 0x01;

/// Sub-command of the sample data command requesting a channel
pub const SUB_READ_SAMPLES: u8 = 0x01;

/// Status sub-command: sample data is ready
pub const SAMPLE_STATUS_READY: u8 = 0x00;

/// Chunk sub-command: more data follows
pub const SAMPLE_CHUNK_MORE: u8 = 0x01;

/// Chunk sub-command: final chunk, carries no samples
pub const SAMPLE_CHUNK_LAST: u8 = 0x02;

/// Status / chunk sub-command: no data or chunk error
pub const SAMPLE_NOT_AVAILABLE: u8 = 0x03;

/// Bytes in front of the sample data inside a chunk payload (sub-command, sequence)
pub const SAMPLE_CHUNK_PREFIX: usize = 2;

/// Size of the SysDATA register snapshot on the wire
pub const SYS_DATA_SIZE: usize = 240;

/// Receive buffer for lock and sample status responses
pub const STATUS_RECEIVE_SIZE: usize = 128;

/// Receive buffer for the SysDATA response
pub const SYS_DATA_RECEIVE_SIZE: usize = 512;

/// Receive buffer for a single sample chunk
pub const CHUNK_RECEIVE_SIZE: usize = 10007;

/// Receive buffer for the SysDATA write acknowledge
pub const WRITE_ACK_RECEIVE_SIZE: usize = 32;

/// Receive buffer for echo responses
pub const ECHO_RECEIVE_SIZE: usize = 512;

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Error-tagged chunks tolerated within one frame before the retrieval is aborted
pub const DEFAULT_CHUNK_ERROR_LIMIT: u32 = 16;

/// Vertical divisions on screen (510 pixels)
pub const NUM_VDIV: f32 = 10.2;

/// Vertical divisions reported to callers
pub const NUM_VDIV_INT: i32 = 11;

/// Horizontal divisions with the menu visible (640 pixels)
pub const NUM_HDIV_MENU_ON: i32 = 16;

/// Horizontal divisions without menu as a fraction, 19.2 (768 pixels)
pub const NUM_HDIV_MENU_OFF: (u64, u64) = (96, 5);

/// Horizontal divisions without menu reported to callers
pub const NUM_HDIV_MENU_OFF_INT: i32 = 20;

/// Raw sample steps per vertical division
pub const STEPS_PER_DIV: f32 = 25.0;

/// Number of analog channels
pub const NUM_CHANNELS: usize = 2;
