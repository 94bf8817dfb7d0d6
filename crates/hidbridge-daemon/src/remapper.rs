//! Key remapping logic
//!
//! Keyboard codes are rewritten before translation by two tables:
//!
//! 1. the simple table, applied unconditionally (e.g. `CapsLock -> Esc`)
//! 2. the chord table, applied on top of the simple table while the chord
//!    trigger key is held (e.g. `RightCtrl` + `1` -> `F1`)
//!
//! Chord activity is tracked on the *raw* codes in the primary key range
//! (`0..128`), so the trigger works regardless of the simple table.
//!
//! ## Ordering
//!
//! The tracking set is updated with the current event before the chord state
//! is read. Pressing the trigger itself therefore already sees the chord as
//! active, and releasing it already sees it as inactive.
//!
//! The effective key of every press is remembered until its release, and the
//! release always reports that key. A key pressed while the chord is active
//! and released after the trigger therefore still releases its chorded code.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use evdev::Key;
use hidbridge_config::Config;

use crate::error::RemapError;

/// Upper bound (exclusive) of the key codes that are tracked and remapped
pub const PRIMARY_KEY_RANGE: u16 = 128;

/// Event value constants for key events.
pub mod event_value {
    /// Key release event value
    pub const RELEASE: i32 = 0;
    /// Key press event value
    pub const PRESS: i32 = 1;
    /// Key repeat event value (autorepeat)
    pub const REPEAT: i32 = 2;
}

/// Returns true if the key is in the tracked keyboard range
pub fn is_primary(key: Key) -> bool {
    key.code() < PRIMARY_KEY_RANGE
}

/// Remapper rewrites raw key codes according to the remap tables
#[derive(Debug, Clone)]
pub struct Remapper {
    /// Simple key remaps (from -> to)
    remap: HashMap<Key, Key>,
    /// Remaps active while the trigger is held (from -> to)
    chord: HashMap<Key, Key>,
    /// Key whose presence in `held` activates the chord table
    trigger: Key,
    /// Raw primary-range keys currently held
    held: HashSet<Key>,
    /// Effective key recorded for each held raw key at press time
    pressed: HashMap<Key, Key>,
}

impl Remapper {
    /// Create a remapper from resolved tables.
    ///
    /// All keys must be in the primary range and the trigger may not be the
    /// target of either table.
    pub fn new(
        remap: HashMap<Key, Key>,
        chord: HashMap<Key, Key>,
        trigger: Key,
    ) -> Result<Self, RemapError> {
        let all_keys = remap
            .iter()
            .chain(chord.iter())
            .flat_map(|(from, to)| [*from, *to])
            .chain(std::iter::once(trigger));

        for key in all_keys {
            if !is_primary(key) {
                return Err(RemapError::OutOfRange(format!("{:?}", key)));
            }
        }

        if remap.values().chain(chord.values()).any(|&to| to == trigger) {
            return Err(RemapError::TriggerTargeted(format!("{:?}", trigger)));
        }

        Ok(Self {
            remap,
            chord,
            trigger,
            held: HashSet::new(),
            pressed: HashMap::new(),
        })
    }

    /// Create a remapper from the configured tables
    pub fn from_config(config: &Config) -> Result<Self, RemapError> {
        let remap = parse_table(&config.remap)?;
        let chord = parse_table(&config.chord.keys)?;
        let trigger = parse_key(&config.chord.trigger)?;

        tracing::debug!(
            "Remap tables: {} simple, {} chord entries (trigger {:?})",
            remap.len(),
            chord.len(),
            trigger
        );

        Self::new(remap, chord, trigger)
    }

    /// Update the chord tracking set for a raw key transition.
    ///
    /// Keys outside the primary range are ignored.
    pub fn track(&mut self, key: Key, pressed: bool) {
        if !is_primary(key) {
            return;
        }
        if pressed {
            self.held.insert(key);
        } else {
            self.held.remove(&key);
        }
    }

    /// Whether the chord trigger is currently held
    pub fn chord_active(&self) -> bool {
        self.held.contains(&self.trigger)
    }

    /// Resolve the effective key for a raw key
    pub fn resolve(&self, key: Key, chord_active: bool) -> Key {
        let key = self.remap.get(&key).copied().unwrap_or(key);

        if chord_active {
            if let Some(&chorded) = self.chord.get(&key) {
                return chorded;
            }
        }

        key
    }

    /// Track a raw key transition and return its effective key.
    ///
    /// A release returns the key its press produced. A repeated press of an
    /// already held key returns the recorded key unchanged.
    pub fn process(&mut self, key: Key, pressed: bool) -> Key {
        self.track(key, pressed);

        let effective = if pressed {
            match self.pressed.get(&key) {
                Some(&recorded) => recorded,
                None => {
                    let effective = self.resolve(key, self.chord_active());
                    self.pressed.insert(key, effective);
                    effective
                }
            }
        } else {
            self.pressed
                .remove(&key)
                .unwrap_or_else(|| self.resolve(key, self.chord_active()))
        };

        if effective != key {
            tracing::trace!("Remapped {:?} -> {:?}", key, effective);
        }

        effective
    }
}

fn parse_table(table: &HashMap<String, String>) -> Result<HashMap<Key, Key>, RemapError> {
    table
        .iter()
        .map(|(from, to)| Ok((parse_key(from)?, parse_key(to)?)))
        .collect()
}

/// Parse a canonical kernel key name (`KEY_*`) to an evdev Key
fn parse_key(name: &str) -> Result<Key, RemapError> {
    Key::from_str(name).map_err(|_| RemapError::UnknownKey(name.to_string()))
}
