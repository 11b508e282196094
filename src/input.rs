use std::collections::HashSet;

use glam::Vec2;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const RIGHT: Self = Self(1);
    pub const MIDDLE: Self = Self(2);
}

/// Pointer motion accumulated since the orbit controls last consumed it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Gestures {
    /// Pixels dragged with the left button.
    pub rotate: Vec2,
    /// Pixels dragged with the right button.
    pub pan: Vec2,
    /// Wheel steps; positive scrolls away from the user.
    pub wheel: f32,
}

impl Gestures {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Default)]
struct PointerState {
    buttons: HashSet<MouseButton>,
    position: Option<Vec2>,
    pending: Gestures,
}

/// Mouse snapshot fed by the window and drained by the orbit controls.
#[derive(Debug, Default)]
pub struct InputState {
    pointer: RwLock<PointerState>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mouse_button_down(&self, button: MouseButton) {
        self.pointer.write().buttons.insert(button);
    }

    pub fn set_mouse_button_up(&self, button: MouseButton) {
        self.pointer.write().buttons.remove(&button);
    }

    pub fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.pointer.read().buttons.contains(&button)
    }

    /// Records a cursor move, turning it into drag motion for held buttons.
    pub fn set_mouse_position(&self, position: Vec2) {
        let mut pointer = self.pointer.write();
        if let Some(previous) = pointer.position {
            let delta = position - previous;
            if pointer.buttons.contains(&MouseButton::LEFT) {
                pointer.pending.rotate += delta;
            } else if pointer.buttons.contains(&MouseButton::RIGHT) {
                pointer.pending.pan += delta;
            }
        }
        pointer.position = Some(position);
    }

    pub fn mouse_position(&self) -> Option<Vec2> {
        self.pointer.read().position
    }

    /// Forgets the cursor, e.g. when it leaves the window.
    pub fn clear_mouse_position(&self) {
        self.pointer.write().position = None;
    }

    pub fn add_wheel(&self, steps: f32) {
        self.pointer.write().pending.wheel += steps;
    }

    /// Returns and resets the motion accumulated so far.
    pub fn take_gestures(&self) -> Gestures {
        std::mem::take(&mut self.pointer.write().pending)
    }
}
