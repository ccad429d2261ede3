pub mod channel;
pub mod config;
pub mod constants;
pub mod device;
pub mod engine;
pub mod error;
pub mod frame;
pub mod link;
pub mod panel;
pub mod registry;
pub mod sample;
pub mod session;
pub mod sysdata;
pub mod tables;
pub mod transport;

// Re-export the driver handle for easy access
pub use device::Dso;
pub use error::{Error, Result};
