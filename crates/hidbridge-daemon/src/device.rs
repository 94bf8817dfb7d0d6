//! Device enumeration and the input source seam

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use evdev::{Device, InputEvent};

/// A grabbable stream of input events
pub trait InputSource {
    /// Human readable device name
    fn name(&self) -> &str;

    /// Take exclusive ownership of the event stream
    fn grab(&mut self) -> io::Result<()>;

    /// Give the event stream back to the host
    fn ungrab(&mut self) -> io::Result<()>;

    /// Read all events currently available
    fn fetch_events(&mut self) -> io::Result<Vec<InputEvent>>;

    /// Descriptor to wait on for readiness
    fn raw_fd(&self) -> RawFd;
}

impl InputSource for Device {
    fn name(&self) -> &str {
        Device::name(self).unwrap_or("Unknown")
    }

    fn grab(&mut self) -> io::Result<()> {
        Device::grab(self)
    }

    fn ungrab(&mut self) -> io::Result<()> {
        Device::ungrab(self)
    }

    fn fetch_events(&mut self) -> io::Result<Vec<InputEvent>> {
        Ok(Device::fetch_events(self)?.collect())
    }

    fn raw_fd(&self) -> RawFd {
        self.as_raw_fd()
    }
}

/// Opens input sources by device node path
pub trait DeviceOpener {
    type Device: InputSource;

    fn open(&mut self, path: &Path) -> io::Result<Self::Device>;
}

/// Opens evdev device nodes
#[derive(Debug, Default, Clone, Copy)]
pub struct EvdevOpener;

impl DeviceOpener for EvdevOpener {
    type Device = Device;

    fn open(&mut self, path: &Path) -> io::Result<Device> {
        Device::open(path)
    }
}

/// Check if a path names an evdev event node (`event*`)
pub fn is_event_node(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with("event"))
        .unwrap_or(false)
}

/// Enumerate all event device nodes in `dir`, sorted by path
pub fn enumerate_devices(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut devices = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if is_event_node(&path) {
            devices.push(path);
        }
    }

    devices.sort();
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_event_node() {
        assert!(is_event_node(Path::new("/dev/input/event0")));
        assert!(is_event_node(Path::new("event12")));
        assert!(!is_event_node(Path::new("/dev/input/mice")));
        assert!(!is_event_node(Path::new("/dev/input/by-id")));
        assert!(!is_event_node(Path::new("/dev/input/js0")));
    }

    #[test]
    fn test_enumerate_devices_filters_and_sorts() {
        let dir = tempfile::tempdir().expect("create temp dir");
        for name in ["event3", "mice", "event1", "mouse0", "event10"] {
            std::fs::write(dir.path().join(name), b"").expect("create node");
        }

        let devices = enumerate_devices(dir.path()).expect("enumerate");
        let names: Vec<_> = devices
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["event1", "event10", "event3"]);
    }

    #[test]
    fn test_enumerate_missing_dir_is_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        assert!(enumerate_devices(&dir.path().join("missing")).is_err());
    }
}
