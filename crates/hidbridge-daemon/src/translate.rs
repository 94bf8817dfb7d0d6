//! Input event to HID report translation

use std::io;

use evdev::{InputEvent, InputEventKind, Key, RelativeAxisType};

use crate::hid::{Axis, Keyboard, Mouse, ReportSink};
use crate::keymap::KeyTables;
use crate::remapper::{event_value, is_primary, Remapper};

/// Owns all per-session translation state: both reports, the held-key sets
/// and the tables. Every event is applied here, in arrival order.
pub struct Translator<S> {
    tables: KeyTables,
    remapper: Remapper,
    keyboard: Keyboard<S>,
    mouse: Mouse<S>,
}

impl<S: ReportSink> Translator<S> {
    pub fn new(tables: KeyTables, remapper: Remapper, keyboard: Keyboard<S>, mouse: Mouse<S>) -> Self {
        Self {
            tables,
            remapper,
            keyboard,
            mouse,
        }
    }

    /// Apply one input event, writing the resulting report(s)
    pub fn handle_event(&mut self, event: &InputEvent) -> io::Result<()> {
        match event.kind() {
            InputEventKind::RelAxis(axis) => self.translate_motion(axis, event.value()),
            InputEventKind::Key(key) => {
                let pressed = match event.value() {
                    event_value::PRESS => true,
                    event_value::RELEASE => false,
                    // Autorepeat is generated by the target host
                    event_value::REPEAT => return Ok(()),
                    other => {
                        tracing::trace!("Ignoring {:?} with value {}", key, other);
                        return Ok(());
                    }
                };

                if self.tables.button(key).is_some() {
                    self.translate_mouse_button(key, pressed)
                } else if is_primary(key) {
                    let effective = self.remapper.process(key, pressed);
                    self.translate_keyboard(effective, pressed)
                } else {
                    tracing::trace!("Ignoring {:?}", key);
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// Send all-released reports to both endpoints
    pub fn reset(&mut self) -> io::Result<()> {
        self.keyboard.reset()?;
        self.mouse.reset()
    }

    fn translate_keyboard(&mut self, key: Key, pressed: bool) -> io::Result<()> {
        if let Some(mask) = self.tables.modifier(key) {
            return self.keyboard.set_modifier(mask, pressed);
        }

        let usage = self.tables.usage(key);
        self.keyboard.set_key(usage, pressed)?;

        if self.keyboard.held().len() > crate::hid::MAX_KEYS {
            tracing::debug!(
                "{} keys held, only the first {} are reported",
                self.keyboard.held().len(),
                crate::hid::MAX_KEYS
            );
        }

        Ok(())
    }

    fn translate_mouse_button(&mut self, key: Key, pressed: bool) -> io::Result<()> {
        match self.tables.button(key) {
            Some(mask) => self.mouse.set_button(mask, pressed),
            None => Ok(()),
        }
    }

    fn translate_motion(&mut self, axis: RelativeAxisType, delta: i32) -> io::Result<()> {
        match axis {
            RelativeAxisType::REL_X => self.mouse.pulse_motion(Axis::X, delta),
            RelativeAxisType::REL_Y => self.mouse.pulse_motion(Axis::Y, delta),
            RelativeAxisType::REL_WHEEL_HI_RES => self.mouse.pulse_wheel(delta),
            _ => Ok(()),
        }
    }

    #[cfg(test)]
    pub fn keyboard(&self) -> &Keyboard<S> {
        &self.keyboard
    }

    #[cfg(test)]
    pub fn mouse(&self) -> &Mouse<S> {
        &self.mouse
    }
}
