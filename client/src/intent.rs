//! Turns raw control state into debounced server intents
//!
//! Movement is sampled every frame but emitted at most once per move
//! interval; frames inside the cooldown window are dropped, never queued.
//! Firing is edge-triggered and ignores the movement cooldown. Whether a
//! shot is allowed is up to the server.

use crate::scheduler::Millis;
use shared::{ClientMessage, Direction, MOVE_INTERVAL_MS, STICK_DEADZONE};

/// Held state of the four direction keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

/// Everything the encoder looks at in one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlState {
    pub keys: KeyState,
    /// Analog vector in `[-1, 1]` per axis, screen orientation (y down).
    pub stick: Option<(f32, f32)>,
    pub fire: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Idle,
    Cooldown { until: Millis },
}

/// First held key in the order up, down, left, right.
pub fn key_direction(keys: &KeyState) -> Option<Direction> {
    if keys.up {
        Some(Direction::Up)
    } else if keys.down {
        Some(Direction::Down)
    } else if keys.left {
        Some(Direction::Left)
    } else if keys.right {
        Some(Direction::Right)
    } else {
        None
    }
}

/// Quantizes an analog vector to one of four directions.
pub fn stick_direction(x: f32, y: f32) -> Option<Direction> {
    if x.abs() > y.abs() {
        if x.abs() < STICK_DEADZONE {
            None
        } else if x > 0.0 {
            Some(Direction::Right)
        } else {
            Some(Direction::Left)
        }
    } else if y.abs() < STICK_DEADZONE {
        None
    } else if y > 0.0 {
        Some(Direction::Down)
    } else {
        Some(Direction::Up)
    }
}

#[derive(Debug, Clone)]
pub struct IntentEncoder {
    move_interval: Millis,
    state: EncoderState,
    fire_held: bool,
}

impl IntentEncoder {
    pub fn new(move_interval: Millis) -> Self {
        Self {
            move_interval,
            state: EncoderState::Idle,
            fire_held: false,
        }
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    /// Keys win over the stick when both are active.
    pub fn direction(controls: &ControlState) -> Option<Direction> {
        key_direction(&controls.keys)
            .or_else(|| controls.stick.and_then(|(x, y)| stick_direction(x, y)))
    }

    /// Samples one frame and returns the intents to send, fire first.
    pub fn sample(&mut self, controls: &ControlState, now: Millis) -> Vec<ClientMessage> {
        let mut intents = Vec::new();

        if controls.fire && !self.fire_held {
            intents.push(ClientMessage::FireBullet {});
        }
        self.fire_held = controls.fire;

        if let EncoderState::Cooldown { until } = self.state {
            if now >= until {
                self.state = EncoderState::Idle;
            }
        }

        if self.state == EncoderState::Idle {
            if let Some(direction) = Self::direction(controls) {
                intents.push(ClientMessage::PlayerMove { direction });
                self.state = EncoderState::Cooldown {
                    until: now + self.move_interval,
                };
            }
        }

        intents
    }

    /// Tracks the fire button without emitting anything, so a press held
    /// across a blocked period does not fire when sampling resumes.
    pub fn observe(&mut self, controls: &ControlState) {
        self.fire_held = controls.fire;
    }
}

impl Default for IntentEncoder {
    fn default() -> Self {
        Self::new(MOVE_INTERVAL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding_up() -> ControlState {
        ControlState {
            keys: KeyState {
                up: true,
                ..KeyState::default()
            },
            ..ControlState::default()
        }
    }

    fn moves(intents: &[ClientMessage]) -> usize {
        intents
            .iter()
            .filter(|i| matches!(i, ClientMessage::PlayerMove { .. }))
            .count()
    }

    #[test]
    fn test_debounce_drops_frames_in_window() {
        let mut encoder = IntentEncoder::new(200);
        let controls = holding_up();

        let emitted: Vec<Millis> = [0, 50, 150, 210]
            .into_iter()
            .filter(|&t| moves(&encoder.sample(&controls, t)) == 1)
            .collect();

        assert_eq!(emitted, vec![0, 210]);
    }

    #[test]
    fn test_emits_exactly_at_interval() {
        let mut encoder = IntentEncoder::new(200);
        let controls = holding_up();
        assert_eq!(moves(&encoder.sample(&controls, 1_000)), 1);
        assert_eq!(encoder.state(), EncoderState::Cooldown { until: 1_200 });
        assert_eq!(moves(&encoder.sample(&controls, 1_199)), 0);
        assert_eq!(moves(&encoder.sample(&controls, 1_200)), 1);
    }

    #[test]
    fn test_no_control_stays_idle() {
        let mut encoder = IntentEncoder::new(200);
        assert!(encoder.sample(&ControlState::default(), 0).is_empty());
        assert_eq!(encoder.state(), EncoderState::Idle);
        assert_eq!(moves(&encoder.sample(&holding_up(), 10)), 1);
    }

    #[test]
    fn test_key_priority() {
        let all = KeyState {
            up: true,
            down: true,
            left: true,
            right: true,
        };
        assert_eq!(key_direction(&all), Some(Direction::Up));

        let sideways = KeyState {
            left: true,
            right: true,
            ..KeyState::default()
        };
        assert_eq!(key_direction(&sideways), Some(Direction::Left));
        assert_eq!(key_direction(&KeyState::default()), None);
    }

    #[test]
    fn test_stick_quantization() {
        assert_eq!(stick_direction(0.9, 0.2), Some(Direction::Right));
        assert_eq!(stick_direction(-0.6, 0.5), Some(Direction::Left));
        assert_eq!(stick_direction(0.1, -0.8), Some(Direction::Up));
        assert_eq!(stick_direction(0.0, 0.7), Some(Direction::Down));
        assert_eq!(stick_direction(0.6, 0.6), Some(Direction::Down));
    }

    #[test]
    fn test_stick_deadzone() {
        assert_eq!(stick_direction(0.0, 0.0), None);
        assert_eq!(stick_direction(0.4, 0.3), None);
        assert_eq!(stick_direction(-0.49, 0.1), None);
        assert_eq!(stick_direction(0.5, 0.0), Some(Direction::Right));
    }

    #[test]
    fn test_keys_and_stick_share_representation() {
        let stick = ControlState {
            stick: Some((0.0, -1.0)),
            ..ControlState::default()
        };
        assert_eq!(IntentEncoder::direction(&stick), IntentEncoder::direction(&holding_up()));
    }

    #[test]
    fn test_fire_is_edge_triggered_and_not_debounced() {
        let mut encoder = IntentEncoder::new(200);
        let mut controls = holding_up();
        controls.fire = true;

        let first = encoder.sample(&controls, 0);
        assert_eq!(first[0], ClientMessage::FireBullet {});
        assert_eq!(moves(&first), 1);

        // Held: no second shot.
        assert!(encoder.sample(&controls, 16).is_empty());

        controls.fire = false;
        encoder.sample(&controls, 32);
        controls.fire = true;
        assert_eq!(encoder.sample(&controls, 48), vec![ClientMessage::FireBullet {}]);
    }

    #[test]
    fn test_observe_swallows_held_fire() {
        let mut encoder = IntentEncoder::new(200);
        let controls = ControlState {
            fire: true,
            ..ControlState::default()
        };
        encoder.observe(&controls);
        assert!(encoder.sample(&controls, 0).is_empty());
    }
}
