//! Pointer and keyboard input types.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Pointer button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }

    /// Modifier that extends rather than replaces the selection.
    pub fn extends_selection(&self) -> bool {
        self.shift || self.command()
    }
}

/// Pointer event in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        position: Point,
        button: PointerButton,
        modifiers: Modifiers,
    },
    Move {
        position: Point,
        modifiers: Modifiers,
    },
    Up {
        position: Point,
        button: PointerButton,
        modifiers: Modifiers,
    },
    Scroll {
        position: Point,
        delta: Vec2,
        modifiers: Modifiers,
    },
}

impl PointerEvent {
    pub fn position(&self) -> Point {
        match *self {
            PointerEvent::Down { position, .. }
            | PointerEvent::Move { position, .. }
            | PointerEvent::Up { position, .. }
            | PointerEvent::Scroll { position, .. } => position,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        match *self {
            PointerEvent::Down { modifiers, .. }
            | PointerEvent::Move { modifiers, .. }
            | PointerEvent::Up { modifiers, .. }
            | PointerEvent::Scroll { modifiers, .. } => modifiers,
        }
    }
}

/// Named keys the engine reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Delete,
    Backspace,
    Escape,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Character(String),
}

/// Double-click detection constants.
const DOUBLE_CLICK_TIME_MS: f64 = 500.0;
const DOUBLE_CLICK_DISTANCE: f64 = 5.0;

/// Tracks pointer state across events.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    /// Last pointer position in screen coordinates.
    pub pointer_position: Point,
    pub modifiers: Modifiers,
    pub is_pressed: bool,
    last_click: Option<(f64, Point)>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a primary press at `now_ms`. Returns `true` when it completes a double-click.
    pub fn press(&mut self, position: Point, modifiers: Modifiers, now_ms: f64) -> bool {
        self.pointer_position = position;
        self.modifiers = modifiers;
        self.is_pressed = true;

        let double = match self.last_click {
            Some((t, p)) => {
                now_ms - t < DOUBLE_CLICK_TIME_MS && p.distance(position) < DOUBLE_CLICK_DISTANCE
            }
            None => false,
        };
        // A triple click must not count as a second double-click
        self.last_click = if double { None } else { Some((now_ms, position)) };
        double
    }

    pub fn moved(&mut self, position: Point, modifiers: Modifiers) {
        self.pointer_position = position;
        self.modifiers = modifiers;
    }

    pub fn release(&mut self, position: Point, modifiers: Modifiers) {
        self.pointer_position = position;
        self.modifiers = modifiers;
        self.is_pressed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_click_detection() {
        let mut input = InputState::new();
        assert!(!input.press(Point::new(10.0, 10.0), Modifiers::NONE, 0.0));
        input.release(Point::new(10.0, 10.0), Modifiers::NONE);
        assert!(input.press(Point::new(11.0, 10.0), Modifiers::NONE, 200.0));
        // Third click starts a fresh sequence
        assert!(!input.press(Point::new(11.0, 10.0), Modifiers::NONE, 300.0));
    }

    #[test]
    fn test_slow_clicks_are_not_double() {
        let mut input = InputState::new();
        input.press(Point::ZERO, Modifiers::NONE, 0.0);
        assert!(!input.press(Point::ZERO, Modifiers::NONE, 900.0));
    }

    #[test]
    fn test_modifier_helpers() {
        assert!(Modifiers::shift().extends_selection());
        assert!(!Modifiers::NONE.extends_selection());
        let m = Modifiers { meta: true, ..Modifiers::NONE };
        assert!(m.command());
    }
}
