//! Keyboard shortcut registry.

use meetink_core::input::{Key, Modifiers};

/// Board commands reachable from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SelectAll,
    Undo,
    Redo,
    Delete,
    BringToFront,
    SendToBack,
    /// Abort the current drag, stroke or text edit, then drop the selection.
    Cancel,
    /// Move the selection by a number of nudge steps.
    Nudge { dx: f64, dy: f64 },
    /// Frame every item in the viewport.
    ZoomToContent,
    ResetView,
}

/// A keyboard shortcut definition.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub key: &'static str,
    pub ctrl: bool,
    pub shift: bool,
    pub command: Command,
    pub description: &'static str,
}

impl Shortcut {
    pub const fn new(
        key: &'static str,
        ctrl: bool,
        shift: bool,
        command: Command,
        description: &'static str,
    ) -> Self {
        Self {
            key,
            ctrl,
            shift,
            command,
            description,
        }
    }

    /// Format the shortcut for display (e.g., "Ctrl+Z").
    pub fn format(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.shift {
            parts.push("Shift");
        }
        parts.push(self.key);
        parts.join("+")
    }

    fn matches(&self, key: &Key, modifiers: Modifiers) -> bool {
        self.ctrl == modifiers.command()
            && self.shift == modifiers.shift
            && self.key.eq_ignore_ascii_case(key_name(key))
    }
}

/// Shift multiplies arrow-key nudges by this.
const FAST_NUDGE: f64 = 10.0;

/// Registry of all keyboard shortcuts.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    /// Get all registered shortcuts.
    pub fn all() -> Vec<Shortcut> {
        vec![
            Shortcut::new("A", true, false, Command::SelectAll, "Select all items"),
            Shortcut::new("Z", true, false, Command::Undo, "Undo"),
            Shortcut::new("Z", true, true, Command::Redo, "Redo"),
            Shortcut::new("Y", true, false, Command::Redo, "Redo"),
            Shortcut::new("]", true, false, Command::BringToFront, "Bring to front"),
            Shortcut::new("[", true, false, Command::SendToBack, "Send to back"),
            Shortcut::new("Delete", false, false, Command::Delete, "Delete selected items"),
            Shortcut::new("Backspace", false, false, Command::Delete, "Delete selected items"),
            Shortcut::new("Escape", false, false, Command::Cancel, "Cancel current action"),
            Shortcut::new("Up", false, false, Command::Nudge { dx: 0.0, dy: -1.0 }, "Nudge up"),
            Shortcut::new("Down", false, false, Command::Nudge { dx: 0.0, dy: 1.0 }, "Nudge down"),
            Shortcut::new("Left", false, false, Command::Nudge { dx: -1.0, dy: 0.0 }, "Nudge left"),
            Shortcut::new("Right", false, false, Command::Nudge { dx: 1.0, dy: 0.0 }, "Nudge right"),
            Shortcut::new("1", false, true, Command::ZoomToContent, "Zoom to fit all items"),
            Shortcut::new("0", false, true, Command::ResetView, "Reset zoom and pan"),
        ]
    }

    /// Command bound to a key press, if any. Shift+arrow nudges further.
    pub fn resolve(key: &Key, modifiers: Modifiers) -> Option<Command> {
        Self::lookup(key, modifiers).or_else(|| {
            if !modifiers.shift {
                return None;
            }
            let plain = Modifiers {
                shift: false,
                ..modifiers
            };
            match Self::lookup(key, plain) {
                Some(Command::Nudge { dx, dy }) => Some(Command::Nudge {
                    dx: dx * FAST_NUDGE,
                    dy: dy * FAST_NUDGE,
                }),
                _ => None,
            }
        })
    }

    fn lookup(key: &Key, modifiers: Modifiers) -> Option<Command> {
        Self::all()
            .into_iter()
            .find(|s| s.matches(key, modifiers))
            .map(|s| s.command)
    }
}

fn key_name(key: &Key) -> &str {
    match key {
        Key::Delete => "Delete",
        Key::Backspace => "Backspace",
        Key::Escape => "Escape",
        Key::ArrowUp => "Up",
        Key::ArrowDown => "Down",
        Key::ArrowLeft => "Left",
        Key::ArrowRight => "Right",
        Key::Character(c) => c.as_str(),
    }
}
