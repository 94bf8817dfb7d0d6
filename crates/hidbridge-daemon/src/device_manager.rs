//! Device session management
//!
//! This module provides the `DeviceManager` struct which owns every grabbed
//! input device for the lifetime of the bridge.
//!
//! # Overview
//!
//! The `DeviceManager` is responsible for:
//! - Grabbing all devices present at startup (all-or-nothing)
//! - Grabbing hot-plugged devices (best-effort, failures are discarded)
//! - Dropping devices that fail while the event loop services them
//! - Releasing every remaining grab exactly once when the session ends
//!
//! Release happens in [`DeviceManager::release_all`], which `Drop` also calls,
//! so every exit path of the daemon (normal return, `?` propagation, panic
//! unwinding) gives the devices back to the host.

use std::collections::BTreeMap;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use crate::device::{DeviceOpener, InputSource};
use crate::error::DeviceError;

/// Identifies one grabbed device for the lifetime of its grab.
///
/// Paths are not unique over time: a node can be removed and recreated
/// before the old handle has errored out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(u64);

/// A device held under an exclusive grab
pub struct GrabbedDevice<D> {
    pub path: PathBuf,
    pub name: String,
    pub device: D,
}

/// Manages grabbed input devices for the daemon.
///
/// Owned by the event loop; it is not shared with anything else.
pub struct DeviceManager<O: DeviceOpener> {
    opener: O,
    /// Grabbed devices in grab order
    grabbed: BTreeMap<DeviceId, GrabbedDevice<O::Device>>,
    next_id: u64,
}

impl<O: DeviceOpener> DeviceManager<O> {
    pub fn new(opener: O) -> Self {
        Self {
            opener,
            grabbed: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Returns the number of currently grabbed devices.
    pub fn grabbed_count(&self) -> usize {
        self.grabbed.len()
    }

    pub fn get_mut(&mut self, id: DeviceId) -> Option<&mut GrabbedDevice<O::Device>> {
        self.grabbed.get_mut(&id)
    }

    /// Readiness descriptors of all grabbed devices, in grab order
    pub fn poll_fds(&self) -> Vec<(DeviceId, RawFd)> {
        self.grabbed
            .iter()
            .map(|(&id, grabbed)| (id, grabbed.device.raw_fd()))
            .collect()
    }

    /// Grab every device present at startup.
    ///
    /// Any device that cannot be opened or grabbed aborts startup, including
    /// a node that vanished since enumeration: a device left ungrabbed would
    /// keep feeding the host. Devices grabbed before the failure stay in the
    /// manager and are released by the caller's cleanup.
    pub fn grab_all(&mut self, paths: &[PathBuf]) -> Result<(), DeviceError> {
        for path in paths {
            let device = self.opener.open(path).map_err(|source| DeviceError::Open {
                path: path.clone(),
                source,
            })?;

            self.grab(path, device)?;
        }

        tracing::info!("Grabbed {} input device(s)", self.grabbed.len());
        Ok(())
    }

    /// Try to grab a newly created device node.
    ///
    /// Exactly one open and one grab are attempted. Failure is logged and
    /// the device discarded; the running session is unaffected. A node that
    /// is already held (the attribute change following its creation) fails
    /// with `EBUSY`, which is only worth a debug line.
    pub fn on_hotplug(&mut self, path: &Path) -> Option<DeviceId> {
        let result = self
            .opener
            .open(path)
            .map_err(|source| DeviceError::Open {
                path: path.to_path_buf(),
                source,
            })
            .and_then(|device| self.grab(path, device));

        match result {
            Ok(id) => Some(id),
            Err(e) if self.is_held(path) => {
                tracing::debug!(
                    "{} is already grabbed: {:#}",
                    path.display(),
                    anyhow::Error::new(e)
                );
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring new device: {:#}", anyhow::Error::new(e));
                None
            }
        }
    }

    /// Whether a device opened from `path` is currently grabbed
    pub fn is_held(&self, path: &Path) -> bool {
        self.grabbed.values().any(|grabbed| grabbed.path == path)
    }

    /// Drop a device that failed while being serviced.
    ///
    /// Releasing the grab is best-effort: the device is usually gone already.
    pub fn on_device_error(&mut self, id: DeviceId) {
        let Some(mut grabbed) = self.grabbed.remove(&id) else {
            tracing::debug!("Device {:?} already released", id);
            return;
        };

        if let Err(e) = grabbed.device.ungrab() {
            tracing::debug!("Could not ungrab '{}': {}", grabbed.name, e);
        }

        tracing::info!(
            "Dropped device '{}' at {} ({} remaining)",
            grabbed.name,
            grabbed.path.display(),
            self.grabbed.len()
        );
    }

    /// Release every grabbed device, ignoring failures.
    ///
    /// The manager is empty afterwards, so repeated calls are no-ops.
    pub fn release_all(&mut self) {
        if self.grabbed.is_empty() {
            return;
        }

        let count = self.grabbed.len();
        for (_, mut grabbed) in std::mem::take(&mut self.grabbed) {
            if let Err(e) = grabbed.device.ungrab() {
                tracing::debug!("Could not ungrab '{}': {}", grabbed.name, e);
            }
        }

        tracing::info!("Released {} input device(s)", count);
    }

    fn grab(&mut self, path: &Path, mut device: O::Device) -> Result<DeviceId, DeviceError> {
        let name = device.name().to_string();

        device.grab().map_err(|source| DeviceError::Grab {
            path: path.to_path_buf(),
            name: name.clone(),
            source,
        })?;

        let id = DeviceId(self.next_id);
        self.next_id += 1;

        tracing::info!("Grabbed device '{}' at {}", name, path.display());

        self.grabbed.insert(
            id,
            GrabbedDevice {
                path: path.to_path_buf(),
                name,
                device,
            },
        );

        Ok(id)
    }
}

impl<O: DeviceOpener> Drop for DeviceManager<O> {
    fn drop(&mut self) {
        self.release_all();
    }
}
