//! Single-threaded readiness loop
//!
//! One `poll(2)` call waits on every grabbed device, the hot-plug watch and a
//! signalfd for SIGINT/SIGTERM. Readiness is collected first and dispatched
//! afterwards, so handlers are free to add or drop devices.
//!
//! Devices are serviced before the watch, and the signal is checked last:
//! events that arrived together with a shutdown request are still forwarded.

use std::io;
use std::os::fd::{AsFd, BorrowedFd};
use std::path::PathBuf;

use anyhow::Context;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signalfd::SignalFd;

use crate::device::{DeviceOpener, InputSource};
use crate::device_manager::{DeviceId, DeviceManager};
use crate::error::DeviceError;
use crate::hid::ReportSink;
use crate::hotplug::HotplugWatch;
use crate::translate::Translator;

/// Routes device events and hot-plug notifications to their handlers
pub struct Dispatcher<O: DeviceOpener, S> {
    devices: DeviceManager<O>,
    translator: Translator<S>,
}

impl<O: DeviceOpener, S: ReportSink> Dispatcher<O, S> {
    pub fn new(devices: DeviceManager<O>, translator: Translator<S>) -> Self {
        Self {
            devices,
            translator,
        }
    }

    pub fn devices(&self) -> &DeviceManager<O> {
        &self.devices
    }

    /// Drain and translate everything a readable device has queued.
    ///
    /// A read failure, or a report write failure while translating this
    /// device's events, drops the device. Returns whether it is still held.
    pub fn service_device(&mut self, id: DeviceId) -> bool {
        match self.drain(id) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{:#}", anyhow::Error::new(e));
                self.devices.on_device_error(id);
                false
            }
        }
    }

    /// The device reported an error or hang-up condition
    pub fn service_hangup(&mut self, id: DeviceId) {
        if let Some(grabbed) = self.devices.get_mut(id) {
            tracing::warn!("Device '{}' hung up", grabbed.name);
        }
        self.devices.on_device_error(id);
    }

    /// Offer newly created nodes to the device manager
    pub fn service_hotplug(&mut self, paths: Vec<PathBuf>) {
        for path in paths {
            tracing::debug!("New input node {}", path.display());
            self.devices.on_hotplug(&path);
        }
    }

    /// Send idle reports so the target starts from a clean state
    pub fn reset_reports(&mut self) -> io::Result<()> {
        self.translator.reset()
    }

    /// Release held keys on the target, then give every device back
    pub fn shutdown(&mut self) {
        if let Err(e) = self.translator.reset() {
            tracing::debug!("Could not send idle reports: {}", e);
        }
        self.devices.release_all();
    }

    fn drain(&mut self, id: DeviceId) -> Result<(), DeviceError> {
        let Some(grabbed) = self.devices.get_mut(id) else {
            return Ok(());
        };

        let events = grabbed
            .device
            .fetch_events()
            .map_err(|source| DeviceError::Read {
                name: grabbed.name.clone(),
                source,
            })?;

        for event in &events {
            self.translator
                .handle_event(event)
                .map_err(|source| DeviceError::Report {
                    name: grabbed.name.clone(),
                    source,
                })?;
        }

        Ok(())
    }

    #[cfg(test)]
    pub fn translator(&self) -> &Translator<S> {
        &self.translator
    }
}

/// Readiness of one poll round, detached from the borrowed descriptors
#[derive(Debug, Default)]
struct Ready {
    devices: Vec<(DeviceId, PollFlags)>,
    hotplug: bool,
    signal: bool,
}

fn is_readable(flags: PollFlags) -> bool {
    flags.contains(PollFlags::POLLIN)
}

fn is_hangup(flags: PollFlags) -> bool {
    flags.intersects(PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL)
}

fn wait<O: DeviceOpener, S>(
    dispatcher: &Dispatcher<O, S>,
    watch: &HotplugWatch,
    signals: &SignalFd,
) -> nix::Result<Ready> {
    let devices = dispatcher.devices.poll_fds();

    let mut fds: Vec<PollFd> = devices
        .iter()
        .map(|&(_, raw)| {
            // SAFETY: the descriptor belongs to a device owned by the
            // manager, which is not modified until `fds` is dropped.
            let fd = unsafe { BorrowedFd::borrow_raw(raw) };
            PollFd::new(fd, PollFlags::POLLIN)
        })
        .collect();
    fds.push(PollFd::new(watch.as_fd(), PollFlags::POLLIN));
    fds.push(PollFd::new(signals.as_fd(), PollFlags::POLLIN));

    loop {
        match poll(&mut fds, PollTimeout::NONE) {
            Ok(_) => break,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }

    let revents: Vec<PollFlags> = fds
        .iter()
        .map(|fd| fd.revents().unwrap_or(PollFlags::empty()))
        .collect();
    let (device_revents, rest) = revents.split_at(devices.len());

    Ok(Ready {
        devices: devices
            .iter()
            .zip(device_revents)
            .filter(|(_, flags)| !flags.is_empty())
            .map(|(&(id, _), &flags)| (id, flags))
            .collect(),
        hotplug: is_readable(rest[0]),
        signal: is_readable(rest[1]),
    })
}

/// Run until SIGINT/SIGTERM arrives.
///
/// Returns `Ok` on a shutdown signal. Poll and watch failures are fatal;
/// device failures never are.
pub fn run<O: DeviceOpener, S: ReportSink>(
    dispatcher: &mut Dispatcher<O, S>,
    watch: &HotplugWatch,
    signals: &mut SignalFd,
) -> anyhow::Result<()> {
    tracing::info!(
        "Forwarding input from {} device(s)",
        dispatcher.devices().grabbed_count()
    );

    loop {
        let ready = wait(dispatcher, watch, signals).context("failed to wait for input")?;

        for (id, flags) in ready.devices {
            // Drain pending input before acting on a hang-up
            if is_readable(flags) && !dispatcher.service_device(id) {
                continue;
            }
            if is_hangup(flags) {
                dispatcher.service_hangup(id);
            }
        }

        if ready.hotplug {
            let paths = watch
                .read_paths()
                .context("failed to read hot-plug notifications")?;
            dispatcher.service_hotplug(paths);
        }

        if ready.signal {
            match signals.read_signal() {
                Ok(Some(info)) => {
                    tracing::info!("Received signal {}, shutting down", info.ssi_signo);
                    return Ok(());
                }
                Ok(None) => {}
                Err(e) => return Err(e).context("failed to read signal"),
            }
        }
    }
}
