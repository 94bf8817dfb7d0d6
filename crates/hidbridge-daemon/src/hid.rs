//! USB HID gadget reports
//!
//! This module owns the two report buffers sent to the USB gadget endpoints:
//!
//! - keyboard: 8-byte boot report `[modifiers, reserved, key1 .. key6]`
//! - mouse: 4-byte report `[buttons, x, y, wheel]`
//!
//! Every mutation writes the full report to its [`ReportSink`]. Relative
//! motion and wheel values are *pulsed*: the delta is written once and then
//! immediately zeroed and written again, because a relative report describes
//! only the movement since the previous report.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Size of a boot keyboard report
pub const KEYBOARD_REPORT_LEN: usize = 8;
/// Size of a 3-button wheel mouse report
pub const MOUSE_REPORT_LEN: usize = 4;
/// Number of non-modifier key slots in a keyboard report
pub const MAX_KEYS: usize = 6;

/// A byte-oriented target that receives complete reports.
pub trait ReportSink {
    /// Write one complete report. Implementations must not split a report.
    fn write_report(&mut self, report: &[u8]) -> io::Result<()>;
}

/// A HID gadget character device (e.g. `/dev/hidg0`)
pub struct GadgetSink {
    path: PathBuf,
    file: File,
}

impl GadgetSink {
    /// Open a gadget endpoint for writing
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().write(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for GadgetSink {
    fn write_report(&mut self, report: &[u8]) -> io::Result<()> {
        // The gadget driver treats every write() as one report
        let written = self.file.write(report)?;
        if written != report.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!(
                    "short write to {}: {} of {} bytes",
                    self.path.display(),
                    written,
                    report.len()
                ),
            ));
        }
        Ok(())
    }
}

/// A (clear, set) mask pair applied to a bit-mask byte.
///
/// A press ORs in `set`, a release ANDs with `clear`. Both operations are
/// idempotent, so repeated presses or releases leave the byte unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskPair {
    pub clear: u8,
    pub set: u8,
}

impl MaskPair {
    /// Mask pair for a single bit
    pub const fn bit(bit: u8) -> Self {
        let set = 1 << bit;
        Self { clear: !set, set }
    }

    pub fn apply(self, byte: u8, pressed: bool) -> u8 {
        if pressed {
            byte | self.set
        } else {
            byte & self.clear
        }
    }
}

/// Relative motion axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    fn report_index(self) -> usize {
        match self {
            Axis::X => 1,
            Axis::Y => 2,
        }
    }
}

/// Fold a signed delta into its 8-bit two's-complement byte.
///
/// Non-negative deltas in `0..=255` pass through, negative deltas become
/// `256 + delta`. Anything that does not land in `0..=255` is replaced by 0,
/// which the receiver reads as "no movement".
pub fn fold_delta(delta: i32) -> u8 {
    let folded = if delta >= 0 { delta } else { 256 + delta };
    u8::try_from(folded).unwrap_or(0)
}

/// Set of held non-modifier usage codes, kept in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeldKeys {
    keys: Vec<u8>,
}

impl HeldKeys {
    pub fn insert(&mut self, usage: u8) {
        if !self.keys.contains(&usage) {
            self.keys.push(usage);
        }
    }

    pub fn remove(&mut self, usage: u8) {
        self.keys.retain(|&k| k != usage);
    }

    #[cfg(test)]
    pub fn contains(&self, usage: u8) -> bool {
        self.keys.contains(&usage)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key slots of a report: the first six keys, zero-filled
    pub fn slots(&self) -> [u8; MAX_KEYS] {
        let mut slots = [0u8; MAX_KEYS];
        for (slot, &key) in slots.iter_mut().zip(&self.keys) {
            *slot = key;
        }
        slots
    }
}

/// Boot keyboard state and its gadget endpoint
pub struct Keyboard<S> {
    report: [u8; KEYBOARD_REPORT_LEN],
    held: HeldKeys,
    sink: S,
}

impl<S: ReportSink> Keyboard<S> {
    pub fn new(sink: S) -> Self {
        Self {
            report: [0; KEYBOARD_REPORT_LEN],
            held: HeldKeys::default(),
            sink,
        }
    }

    /// Press or release a modifier bit
    pub fn set_modifier(&mut self, mask: MaskPair, pressed: bool) -> io::Result<()> {
        self.report[0] = mask.apply(self.report[0], pressed);
        self.write()
    }

    /// Press or release a non-modifier key by HID usage code
    pub fn set_key(&mut self, usage: u8, pressed: bool) -> io::Result<()> {
        if pressed {
            self.held.insert(usage);
        } else {
            self.held.remove(usage);
        }
        self.report[2..].copy_from_slice(&self.held.slots());
        self.write()
    }

    /// Forget all held keys and send an all-released report
    pub fn reset(&mut self) -> io::Result<()> {
        self.held = HeldKeys::default();
        self.report = [0; KEYBOARD_REPORT_LEN];
        self.write()
    }

    pub fn report(&self) -> &[u8; KEYBOARD_REPORT_LEN] {
        &self.report
    }

    pub fn held(&self) -> &HeldKeys {
        &self.held
    }

    fn write(&mut self) -> io::Result<()> {
        tracing::trace!("keyboard report {:02x?}", self.report);
        self.sink.write_report(&self.report)
    }
}

/// Wheel mouse state and its gadget endpoint
pub struct Mouse<S> {
    report: [u8; MOUSE_REPORT_LEN],
    sink: S,
}

impl<S: ReportSink> Mouse<S> {
    pub fn new(sink: S) -> Self {
        Self {
            report: [0; MOUSE_REPORT_LEN],
            sink,
        }
    }

    /// Press or release a button bit; buttons persist until released
    pub fn set_button(&mut self, mask: MaskPair, pressed: bool) -> io::Result<()> {
        self.report[0] = mask.apply(self.report[0], pressed);
        self.write()
    }

    /// Pulse a relative motion delta on one axis
    pub fn pulse_motion(&mut self, axis: Axis, delta: i32) -> io::Result<()> {
        self.pulse(axis.report_index(), fold_delta(delta))
    }

    /// Pulse one wheel step; only the direction of `delta` is reported
    pub fn pulse_wheel(&mut self, delta: i32) -> io::Result<()> {
        let step = match delta.signum() {
            1 => 0x01,
            -1 => 0xFF,
            _ => 0x00,
        };
        self.pulse(3, step)
    }

    /// Release all buttons and send an idle report
    pub fn reset(&mut self) -> io::Result<()> {
        self.report = [0; MOUSE_REPORT_LEN];
        self.write()
    }

    pub fn report(&self) -> &[u8; MOUSE_REPORT_LEN] {
        &self.report
    }

    fn pulse(&mut self, index: usize, value: u8) -> io::Result<()> {
        self.report[index] = value;
        let written = self.write();
        // Zero the axis even if the first write failed, so a stale delta
        // never leaks into a later button report.
        self.report[index] = 0;
        written?;
        self.write()
    }

    fn write(&mut self) -> io::Result<()> {
        tracing::trace!("mouse report {:02x?}", self.report);
        self.sink.write_report(&self.report)
    }
}
