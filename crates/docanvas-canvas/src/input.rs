//! Unified input event model.
//!
//! Mouse, touch and pen input all arrive as [`PointerEvent`]s keyed by a
//! pointer id, so gestures are written once for every device.

use serde::{Deserialize, Serialize};

use crate::model::ScreenPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerKind {
    Down,
    Move,
    Up,
    Cancel,
    /// Pointer left the canvas.
    Leave,
}

impl PointerKind {
    /// Whether this event ends whatever gesture the pointer drives.
    pub fn is_release(self) -> bool {
        matches!(self, Self::Up | Self::Cancel | Self::Leave)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PointerType {
    #[default]
    Mouse,
    Touch,
    Pen,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub pointer_id: u64,
    pub kind: PointerKind,
    pub position: ScreenPoint,
    pub pointer_type: PointerType,
}

impl PointerEvent {
    pub fn new(pointer_id: u64, kind: PointerKind, position: ScreenPoint, pointer_type: PointerType) -> Self {
        Self {
            pointer_id,
            kind,
            position,
            pointer_type,
        }
    }

    pub fn mouse(kind: PointerKind, x: f64, y: f64) -> Self {
        Self::new(0, kind, ScreenPoint::new(x, y), PointerType::Mouse)
    }

    pub fn touch(pointer_id: u64, kind: PointerKind, x: f64, y: f64) -> Self {
        Self::new(pointer_id, kind, ScreenPoint::new(x, y), PointerType::Touch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        meta: false,
        shift: false,
        alt: false,
    };

    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        meta: false,
        shift: false,
        alt: false,
    };

    pub const META: Modifiers = Modifiers {
        ctrl: false,
        meta: true,
        shift: false,
        alt: false,
    };

    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelEvent {
    pub position: ScreenPoint,
    pub delta_x: f64,
    pub delta_y: f64,
    pub modifiers: Modifiers,
}

impl WheelEvent {
    pub fn new(x: f64, y: f64, delta_y: f64, modifiers: Modifiers) -> Self {
        Self {
            position: ScreenPoint::new(x, y),
            delta_x: 0.0,
            delta_y,
            modifiers,
        }
    }
}

/// Where keyboard focus was when a key was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FocusTarget {
    #[default]
    Canvas,
    /// A text field or text area.
    TextInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: String,
    pub modifiers: Modifiers,
    pub focus: FocusTarget,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>, modifiers: Modifiers, focus: FocusTarget) -> Self {
        Self {
            key: key.into(),
            modifiers,
            focus,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Undo,
    Redo,
}

/// Maps key presses to canvas shortcuts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortcutMap;

impl ShortcutMap {
    /// Command+Z undoes, Command+Y redoes. Nothing fires while typing.
    pub fn resolve(&self, event: &KeyEvent) -> Option<Shortcut> {
        if event.focus == FocusTarget::TextInput || !event.modifiers.command() {
            return None;
        }
        if event.key.eq_ignore_ascii_case("z") {
            Some(Shortcut::Undo)
        } else if event.key.eq_ignore_ascii_case("y") {
            Some(Shortcut::Redo)
        } else {
            None
        }
    }
}
