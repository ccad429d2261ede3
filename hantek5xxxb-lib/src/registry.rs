//! Ownership of the shadow register snapshot and the link it is read over.

use std::sync::{Mutex, MutexGuard, RwLock};

use tracing::{error, trace};

use crate::constants::{SYS_DATA_RECEIVE_SIZE, WRITE_ACK_RECEIVE_SIZE};
use crate::error::{DeviceStatus, Error, Result};
use crate::frame::Command;
use crate::link::Link;
use crate::panel;
use crate::sysdata::SysData;
use crate::transport::Transport;

/// Holds the link and the last published snapshot.
///
/// Every wire exchange goes through a [`RegistryGuard`], which keeps the link
/// mutex for as long as it lives. The published shadow can be read without the
/// guard, so readers never wait for a transfer in progress. Until the first
/// fetch is published the shadow reads as an all-zero snapshot.
pub struct SysDataRegistry<T> {
    link: Mutex<Link<T>>,
    shadow: RwLock<Option<SysData>>,
}

impl<T: Transport> SysDataRegistry<T> {
    pub fn new(link: Link<T>) -> Self {
        Self {
            link: Mutex::new(link),
            shadow: RwLock::new(None),
        }
    }

    /// Exclusive access to the link until the guard is dropped.
    pub fn lock(&self) -> RegistryGuard<'_, T> {
        RegistryGuard {
            link: self.link.lock().unwrap_or_else(|e| e.into_inner()),
            shadow: &self.shadow,
        }
    }

    /// Copy of the last published snapshot.
    pub fn shadow(&self) -> SysData {
        self.published().unwrap_or_default()
    }

    /// The last published snapshot, `None` if nothing was fetched yet.
    pub fn published(&self) -> Option<SysData> {
        self.shadow.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn into_link(self) -> Link<T> {
        self.link.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct RegistryGuard<'a, T> {
    link: MutexGuard<'a, Link<T>>,
    shadow: &'a RwLock<Option<SysData>>,
}

impl<T: Transport> RegistryGuard<'_, T> {
    /// Reads a fresh snapshot from the device without publishing it.
    ///
    /// lock, read, unlock; the panel is unlocked again when the read fails.
    pub fn fetch(&mut self) -> Result<SysData> {
        let frame = panel::with_panel_locked(&mut *self.link, |link| {
            link.request(Command::ReadSysData, &[], SYS_DATA_RECEIVE_SIZE)
        })?;

        // A single byte answer carries a status code instead of the snapshot.
        if let [status] = &frame.payload[..] {
            let status = DeviceStatus::from(*status);
            error!("Reading SysDATA failed: {}", status);
            return Err(Error::DeviceStatus(status));
        }

        let sys = SysData::decode(&frame.payload)?;
        trace!(?sys, "SysDATA");
        Ok(sys)
    }

    /// Fetches and publishes a fresh snapshot.
    pub fn refresh(&mut self) -> Result<SysData> {
        let sys = self.fetch()?;
        self.publish(sys.clone());
        Ok(sys)
    }

    pub fn publish(&self, sys: SysData) {
        *self.shadow.write().unwrap_or_else(|e| e.into_inner()) = Some(sys);
    }

    pub fn shadow(&self) -> SysData {
        self.shadow
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .unwrap_or_default()
    }

    /// Writes the whole snapshot back to the device.
    ///
    /// Unlike [`fetch`](Self::fetch) the write is not bracketed by a panel
    /// lock. Whether the firmware locks implicitly is unverified on hardware.
    pub fn commit(&mut self, pending: &SysData) -> Result<()> {
        trace!(?pending, "SysDATA write");
        let frame = self
            .link
            .request(Command::WriteSysData, &pending.encode(), WRITE_ACK_RECEIVE_SIZE)?;

        let status = frame.sub_command()?;
        if status != 0 {
            let status = DeviceStatus::from(status);
            error!("Writing SysDATA failed with status {}", status);
            return Err(Error::DeviceStatus(status));
        }
        Ok(())
    }

    /// Read-modify-write of the snapshot.
    ///
    /// A fresh snapshot is fetched and published, cloned into a pending copy,
    /// handed to `f` together with the fresh one, and committed. The pending
    /// copy is returned; the published shadow keeps the device's view until the
    /// next fetch.
    pub fn modify<F>(&mut self, f: F) -> Result<SysData>
    where
        F: FnOnce(&SysData, &mut SysData) -> Result<()>,
    {
        let current = self.refresh()?;
        let mut pending = current.clone();
        f(&current, &mut pending)?;
        self.commit(&pending)?;
        Ok(pending)
    }

    pub fn link_mut(&mut self) -> &mut Link<T> {
        &mut *self.link
    }
}
