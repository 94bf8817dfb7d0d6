//! Configuration data model

use std::collections::HashMap;
use std::path::PathBuf;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hidbridge/config.kdl";

/// Root configuration structure
///
/// Key names in `remap` and `chord` are stored in their canonical kernel form
/// (`KEY_CAPSLOCK`, `KEY_F1`, ...), see [`crate::canonical_key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub gadget: GadgetConfig,
    pub input: InputConfig,
    /// Unconditional 1:1 substitutions applied before translation
    pub remap: HashMap<String, String>,
    /// Substitutions applied only while the trigger key is held
    pub chord: ChordLayer,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gadget: GadgetConfig::default(),
            input: InputConfig::default(),
            remap: default_remap(),
            chord: ChordLayer::default(),
        }
    }
}

/// Paths of the two HID gadget endpoints reports are written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GadgetConfig {
    /// Keyboard endpoint, receives 8-byte boot keyboard reports
    pub keyboard: PathBuf,
    /// Mouse endpoint, receives 4-byte wheel mouse reports
    pub mouse: PathBuf,
}

impl Default for GadgetConfig {
    fn default() -> Self {
        Self {
            keyboard: PathBuf::from("/dev/hidg0"),
            mouse: PathBuf::from("/dev/hidg1"),
        }
    }
}

/// Where input devices are enumerated from and watched for hot-plug
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputConfig {
    pub watch_dir: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from("/dev/input"),
        }
    }
}

/// A layer of key substitutions activated by holding a trigger key.
///
/// The default layer turns right-ctrl into an "Fn" key: the number row becomes
/// F1-F12 and grave becomes escape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordLayer {
    /// Key that activates the layer while held
    pub trigger: String,
    /// Substitutions (from -> to) active while the trigger is held
    pub keys: HashMap<String, String>,
}

impl Default for ChordLayer {
    fn default() -> Self {
        let keys = [
            ("KEY_GRAVE", "KEY_ESC"),
            ("KEY_1", "KEY_F1"),
            ("KEY_2", "KEY_F2"),
            ("KEY_3", "KEY_F3"),
            ("KEY_4", "KEY_F4"),
            ("KEY_5", "KEY_F5"),
            ("KEY_6", "KEY_F6"),
            ("KEY_7", "KEY_F7"),
            ("KEY_8", "KEY_F8"),
            ("KEY_9", "KEY_F9"),
            ("KEY_0", "KEY_F10"),
            ("KEY_MINUS", "KEY_F11"),
            ("KEY_EQUAL", "KEY_F12"),
        ];

        Self {
            trigger: "KEY_RIGHTCTRL".to_string(),
            keys: pairs(&keys),
        }
    }
}

fn default_remap() -> HashMap<String, String> {
    pairs(&[("KEY_ESC", "KEY_GRAVE"), ("KEY_CAPSLOCK", "KEY_ESC")])
}

fn pairs(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}
