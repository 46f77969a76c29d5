//! Device polling for the frame loop
//!
//! Keyboard (WASD or arrows, F or Space to fire) and a mouse-drag virtual
//! stick are read into a [`ControlState`]. Debouncing is not done here.

use crate::intent::{ControlState, KeyState};
use macroquad::prelude::*;

/// Drag distance in pixels that counts as a full stick deflection.
pub const STICK_RADIUS: f32 = 50.0;

/// Drag offset scaled to the unit circle.
pub fn stick_vector(origin: (f32, f32), current: (f32, f32), radius: f32) -> (f32, f32) {
    let dx = current.0 - origin.0;
    let dy = current.1 - origin.1;
    let length = (dx * dx + dy * dy).sqrt();
    if length == 0.0 || radius <= 0.0 {
        return (0.0, 0.0);
    }
    let scale = length.min(radius) / (length * radius);
    (dx * scale, dy * scale)
}

#[derive(Debug, Default)]
pub struct InputSampler {
    drag_origin: Option<(f32, f32)>,
}

impl InputSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where the current stick drag started, if one is active.
    pub fn drag_origin(&self) -> Option<(f32, f32)> {
        self.drag_origin
    }

    pub fn sample(&mut self) -> ControlState {
        let keys = KeyState {
            up: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            down: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
        };
        let fire = is_key_down(KeyCode::Space) || is_key_down(KeyCode::F);

        if is_mouse_button_pressed(MouseButton::Left) {
            self.drag_origin = Some(mouse_position());
        } else if !is_mouse_button_down(MouseButton::Left) {
            self.drag_origin = None;
        }

        let stick = self
            .drag_origin
            .map(|origin| stick_vector(origin, mouse_position(), STICK_RADIUS));

        ControlState { keys, stick, fire }
    }

    pub fn dismiss_pressed(&self) -> bool {
        is_key_pressed(KeyCode::Enter)
    }

    pub fn quit_pressed(&self) -> bool {
        is_key_pressed(KeyCode::Escape)
    }
}
