//! In-memory doubles for report sinks and input devices

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use evdev::{EventType, InputEvent, Key, RelativeAxisType};
use nix::sys::signal::Signal;

use crate::device::{DeviceOpener, InputSource};
use crate::hid::ReportSink;

/// Sink recording every report; clones share the same log
#[derive(Clone, Default)]
pub struct RecordingSink {
    writes: Rc<RefCell<Vec<Vec<u8>>>>,
    fail: Rc<Cell<bool>>,
}

impl RecordingSink {
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.borrow().clone()
    }

    pub fn last(&self) -> Option<Vec<u8>> {
        self.writes.borrow().last().cloned()
    }

    pub fn clear(&self) {
        self.writes.borrow_mut().clear();
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail.set(fail);
    }
}

impl ReportSink for RecordingSink {
    fn write_report(&mut self, report: &[u8]) -> io::Result<()> {
        if self.fail.get() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "gadget not connected"));
        }
        self.writes.borrow_mut().push(report.to_vec());
        Ok(())
    }
}

#[derive(Default)]
struct MockState {
    pending: VecDeque<InputEvent>,
    grabbed: bool,
    grab_attempts: usize,
    ungrab_attempts: usize,
    fail_grab: bool,
    fail_read: bool,
}

/// Scripted input device; clones share state so tests can steer it
#[derive(Clone)]
pub struct MockDevice {
    name: String,
    fd: RawFd,
    state: Rc<RefCell<MockState>>,
}

impl MockDevice {
    pub fn new(name: &str, fd: RawFd) -> Self {
        Self {
            name: name.to_string(),
            fd,
            state: Rc::default(),
        }
    }

    pub fn push(&self, event: InputEvent) {
        self.state.borrow_mut().pending.push_back(event);
    }

    pub fn press(&self, key: Key) {
        self.push(key_event(key, 1));
    }

    pub fn release(&self, key: Key) {
        self.push(key_event(key, 0));
    }

    pub fn fail_grab(&self) {
        self.state.borrow_mut().fail_grab = true;
    }

    pub fn fail_read(&self) {
        self.state.borrow_mut().fail_read = true;
    }

    pub fn is_grabbed(&self) -> bool {
        self.state.borrow().grabbed
    }

    pub fn grab_attempts(&self) -> usize {
        self.state.borrow().grab_attempts
    }

    pub fn ungrab_attempts(&self) -> usize {
        self.state.borrow().ungrab_attempts
    }
}

impl InputSource for MockDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn grab(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.grab_attempts += 1;
        if state.fail_grab {
            return Err(io::Error::new(io::ErrorKind::Other, "Device or resource busy"));
        }
        state.grabbed = true;
        Ok(())
    }

    fn ungrab(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.ungrab_attempts += 1;
        if !state.grabbed {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "not grabbed"));
        }
        state.grabbed = false;
        Ok(())
    }

    fn fetch_events(&mut self) -> io::Result<Vec<InputEvent>> {
        let mut state = self.state.borrow_mut();
        if state.fail_read {
            return Err(io::Error::new(io::ErrorKind::Other, "No such device"));
        }
        Ok(state.pending.drain(..).collect())
    }

    fn raw_fd(&self) -> RawFd {
        self.fd
    }
}

/// Opener serving pre-registered mock devices by path
#[derive(Clone, Default)]
pub struct MockOpener {
    devices: Rc<RefCell<HashMap<PathBuf, MockDevice>>>,
    opened: Rc<RefCell<Vec<PathBuf>>>,
}

impl MockOpener {
    pub fn insert(&self, path: &str, device: &MockDevice) {
        self.devices
            .borrow_mut()
            .insert(PathBuf::from(path), device.clone());
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.borrow().clone()
    }
}

impl DeviceOpener for MockOpener {
    type Device = MockDevice;

    fn open(&mut self, path: &Path) -> io::Result<MockDevice> {
        self.opened.borrow_mut().push(path.to_path_buf());
        self.devices
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such device"))
    }
}

/// Input source reading from one end of a socket pair, so it has a real
/// descriptor for `poll(2)`. Each key event is two bytes: code, value.
pub struct SocketDevice {
    name: String,
    stream: UnixStream,
    grabbed: bool,
    raise_after_read: Option<Signal>,
}

/// Writing end of a [`SocketDevice`]; dropping it hangs the device up
pub struct SocketFeed {
    stream: UnixStream,
}

impl SocketDevice {
    pub fn pair(name: &str) -> (Self, SocketFeed) {
        let (device, feed) = UnixStream::pair().expect("create socket pair");
        device.set_nonblocking(true).expect("set nonblocking");

        let device = Self {
            name: name.to_string(),
            stream: device,
            grabbed: false,
            raise_after_read: None,
        };
        (device, SocketFeed { stream: feed })
    }

    /// Raise `signal` in the reading thread after the next read
    pub fn raise_after_read(&mut self, signal: Signal) {
        self.raise_after_read = Some(signal);
    }
}

impl SocketFeed {
    pub fn key(&mut self, key: Key, value: u8) {
        let code = u8::try_from(key.code()).expect("code fits in one byte");
        self.stream.write_all(&[code, value]).expect("write event");
    }
}

impl InputSource for SocketDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn grab(&mut self) -> io::Result<()> {
        if self.grabbed {
            return Err(io::Error::new(io::ErrorKind::Other, "Device or resource busy"));
        }
        self.grabbed = true;
        Ok(())
    }

    fn ungrab(&mut self) -> io::Result<()> {
        self.grabbed = false;
        Ok(())
    }

    fn fetch_events(&mut self) -> io::Result<Vec<InputEvent>> {
        let mut bytes = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => bytes.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }

        if let Some(signal) = self.raise_after_read.take() {
            nix::sys::signal::raise(signal)?;
        }

        Ok(bytes
            .chunks_exact(2)
            .map(|event| key_event(Key::new(u16::from(event[0])), i32::from(event[1])))
            .collect())
    }

    fn raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

/// Opener handing out each registered socket device once
#[derive(Default)]
pub struct SocketOpener {
    devices: HashMap<PathBuf, SocketDevice>,
}

impl SocketOpener {
    pub fn insert(&mut self, path: impl Into<PathBuf>, device: SocketDevice) {
        self.devices.insert(path.into(), device);
    }
}

impl DeviceOpener for SocketOpener {
    type Device = SocketDevice;

    fn open(&mut self, path: &Path) -> io::Result<SocketDevice> {
        self.devices
            .remove(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such device"))
    }
}

pub fn key_event(key: Key, value: i32) -> InputEvent {
    InputEvent::new(EventType::KEY, key.code(), value)
}

pub fn rel_event(axis: RelativeAxisType, value: i32) -> InputEvent {
    InputEvent::new(EventType::RELATIVE, axis.0, value)
}
