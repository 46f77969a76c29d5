//! Top-level context for one connection to a battle room
//!
//! A [`Session`] owns everything the client mutates: the reconciler with its
//! registries, the dispatcher and the intent encoder. There are no globals.
//! The frame loop feeds it transport events and control state together with
//! a monotonic clock reading, and gets back the intents to send.
//!
//! ```text
//! AwaitingStart --start--> Playing --base_destroyed--> BaseDestroyed
//!       |                     |                            |
//!       +-------- close / error / teardown ----------------+--> Closed
//! ```
//!
//! A new `start` leaves `BaseDestroyed` for `Playing`. `Closed` is terminal.

use crate::dispatcher::{Dispatcher, Outcome};
use crate::intent::{ControlState, IntentEncoder};
use crate::network::TransportEvent;
use crate::reconciler::{Reconciler, Timings};
use crate::scheduler::Millis;
use log::{debug, error, info, warn};
use shared::{
    decode_server_message, ClientMessage, EntityId, ServerMessage, BONUS_EFFECT_DURATION_MS,
    EXPLOSION_DURATION_MS, MOVE_INTERVAL_MS,
};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub screen_width: f32,
    pub screen_height: f32,
    pub move_interval_ms: Millis,
    pub effect_duration_ms: Millis,
    pub bonus_effect_duration_ms: Millis,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            screen_width: 800.0,
            screen_height: 600.0,
            move_interval_ms: MOVE_INTERVAL_MS,
            effect_duration_ms: EXPLOSION_DURATION_MS,
            bonus_effect_duration_ms: BONUS_EFFECT_DURATION_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingStart,
    Playing,
    BaseDestroyed,
    Closed,
}

/// Server-reported error waiting for the user to acknowledge it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub received_at: Millis,
}

pub struct Session {
    phase: Phase,
    room_id: Option<EntityId>,
    reconciler: Reconciler,
    dispatcher: Dispatcher,
    encoder: IntentEncoder,
    notices: VecDeque<Notice>,
}

impl Session {
    pub fn new(config: &SessionConfig) -> Self {
        let timings = Timings {
            effect_duration: config.effect_duration_ms,
            bonus_duration: config.bonus_effect_duration_ms,
        };
        Self {
            phase: Phase::AwaitingStart,
            room_id: None,
            reconciler: Reconciler::new(timings),
            dispatcher: Dispatcher::new(config.screen_width, config.screen_height),
            encoder: IntentEncoder::new(config.move_interval_ms),
            notices: VecDeque::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn room_id(&self) -> Option<&EntityId> {
        self.room_id.as_ref()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notices.front()
    }

    pub fn dismiss_notice(&mut self) -> Option<Notice> {
        self.notices.pop_front()
    }

    /// Decodes and applies one text frame. Undecodable frames are dropped.
    pub fn handle_text(&mut self, text: &str, now: Millis) -> Option<Outcome> {
        match decode_server_message(text) {
            Ok(message) => self.receive(&message, now),
            Err(e) => {
                warn!("Dropping server message: {}", e);
                None
            }
        }
    }

    /// Applies one decoded message, honouring the current phase.
    pub fn receive(&mut self, message: &ServerMessage, now: Millis) -> Option<Outcome> {
        match (self.phase, message) {
            (Phase::Closed, _) => {
                debug!("Session closed, dropping {}", message.kind());
                return None;
            }
            (Phase::BaseDestroyed, ServerMessage::Start(_) | ServerMessage::Error { .. }) => {}
            (Phase::BaseDestroyed, _) => {
                debug!("Simulation paused, dropping {}", message.kind());
                return None;
            }
            _ => {}
        }

        let outcome = self.dispatcher.dispatch(message, &mut self.reconciler, now);
        match &outcome {
            Outcome::Started { room_id, .. } => {
                match room_id {
                    Some(room) => info!("Joined room {}", room),
                    None => info!("Game started"),
                }
                self.room_id = room_id.clone();
                self.phase = Phase::Playing;
            }
            Outcome::BaseDestroyed => {
                info!("Base destroyed, simulation paused");
                self.phase = Phase::BaseDestroyed;
            }
            Outcome::ServerError(text) => {
                error!("Server error: {}", text);
                self.notices.push_back(Notice {
                    message: text.clone(),
                    received_at: now,
                });
            }
            Outcome::Entities(_) | Outcome::Unknown => {}
        }
        Some(outcome)
    }

    pub fn handle_transport(&mut self, event: TransportEvent, now: Millis) -> Option<Outcome> {
        match event {
            TransportEvent::Opened => {
                info!("Connection open, waiting for start");
                None
            }
            TransportEvent::Message(text) => self.handle_text(&text, now),
            TransportEvent::Closed => {
                info!("Connection closed");
                self.phase = Phase::Closed;
                None
            }
            TransportEvent::Error(e) => {
                error!("Connection lost: {}", e);
                self.phase = Phase::Closed;
                None
            }
        }
    }

    /// Runs due timers. Timers keep firing after the session closes.
    pub fn advance(&mut self, now: Millis) -> usize {
        self.reconciler.run_due_tasks(now)
    }

    /// Advances timers and samples controls for one rendered frame.
    ///
    /// No intent is produced unless a game is running and no notice is
    /// waiting for acknowledgement.
    pub fn frame(&mut self, controls: &ControlState, now: Millis) -> Vec<ClientMessage> {
        self.advance(now);

        if self.phase != Phase::Playing || !self.notices.is_empty() {
            self.encoder.observe(controls);
            return Vec::new();
        }
        self.encoder.sample(controls, now)
    }

    /// Drops all entities and stops accepting messages.
    pub fn teardown(&mut self) {
        info!("Tearing down session");
        self.reconciler.clear_entities();
        self.phase = Phase::Closed;
    }
}
