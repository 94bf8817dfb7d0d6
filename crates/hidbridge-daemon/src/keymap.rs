//! Translation tables from evdev codes to HID report bits
//!
//! The tables are plain immutable data built once at startup and handed to
//! the translator. Nothing mutates them while the bridge runs.

use std::collections::HashMap;

use evdev::Key;

use crate::hid::MaskPair;

/// Number of evdev key codes covered by the scan-code table
pub const SCAN_TABLE_LEN: usize = 128;

/// HID usage codes for evdev key codes `0..128` (boot keyboard page 0x07).
///
/// A zero entry means the key has no boot keyboard usage.
#[rustfmt::skip]
const BOOT_KEYBOARD: [u8; SCAN_TABLE_LEN] = [
    0x00, 0x29, 0x1e, 0x1f, 0x20, 0x21, 0x22, 0x23,
    0x24, 0x25, 0x26, 0x27, 0x2d, 0x2e, 0x2a, 0x2b,
    0x14, 0x1a, 0x08, 0x15, 0x17, 0x1c, 0x18, 0x0c,
    0x12, 0x13, 0x2f, 0x30, 0x28, 0x00, 0x04, 0x16,
    0x07, 0x09, 0x0a, 0x0b, 0x0d, 0x0e, 0x0f, 0x33,
    0x34, 0x35, 0x00, 0x31, 0x1d, 0x1b, 0x06, 0x19,
    0x05, 0x11, 0x10, 0x36, 0x37, 0x38, 0x00, 0x55,
    0x00, 0x2c, 0x39, 0x3a, 0x3b, 0x3c, 0x3d, 0x3e,
    0x3f, 0x40, 0x41, 0x42, 0x43, 0x53, 0x47, 0x5f,
    0x60, 0x61, 0x56, 0x5c, 0x5d, 0x5e, 0x57, 0x59,
    0x5a, 0x5b, 0x62, 0x63, 0x00, 0x00, 0x00, 0x44,
    0x45, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x58, 0x00, 0x54, 0x46, 0x00, 0x00, 0x4a, 0x52,
    0x4b, 0x50, 0x4f, 0x4d, 0x51, 0x4e, 0x49, 0x4c,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x48,
    0x00, 0x00, 0x00, 0x00, 0x00, 0xe3, 0x00, 0xe7,
];

/// Immutable lookup tables used by the translator
#[derive(Debug, Clone)]
pub struct KeyTables {
    scan: [u8; SCAN_TABLE_LEN],
    modifiers: HashMap<Key, MaskPair>,
    buttons: HashMap<Key, MaskPair>,
}

impl Default for KeyTables {
    fn default() -> Self {
        Self::boot_keyboard()
    }
}

impl KeyTables {
    /// Tables for a 101-key boot keyboard and a 3-button mouse.
    ///
    /// Right-ctrl has no modifier entry: it acts as the chord trigger and
    /// is never forwarded to the target as a modifier.
    pub fn boot_keyboard() -> Self {
        let modifiers = HashMap::from([
            (Key::KEY_LEFTCTRL, MaskPair::bit(0)),
            (Key::KEY_LEFTSHIFT, MaskPair::bit(1)),
            (Key::KEY_LEFTALT, MaskPair::bit(2)),
            (Key::KEY_LEFTMETA, MaskPair::bit(3)),
            (Key::KEY_RIGHTSHIFT, MaskPair::bit(5)),
            (Key::KEY_RIGHTALT, MaskPair::bit(6)),
            (Key::KEY_RIGHTMETA, MaskPair::bit(7)),
        ]);

        let buttons = HashMap::from([
            (Key::BTN_LEFT, MaskPair::bit(0)),
            (Key::BTN_RIGHT, MaskPair::bit(1)),
            (Key::BTN_MIDDLE, MaskPair::bit(2)),
        ]);

        Self {
            scan: BOOT_KEYBOARD,
            modifiers,
            buttons,
        }
    }

    /// HID usage for a key; keys outside the table resolve to 0
    pub fn usage(&self, key: Key) -> u8 {
        self.scan.get(usize::from(key.code())).copied().unwrap_or(0)
    }

    pub fn modifier(&self, key: Key) -> Option<MaskPair> {
        self.modifiers.get(&key).copied()
    }

    pub fn button(&self, key: Key) -> Option<MaskPair> {
        self.buttons.get(&key).copied()
    }
}
