//! # Tank Battle Client Library
//!
//! Client-side state synchronization for a tile-grid tank battle played
//! against an authoritative server. The server owns every entity and every
//! position; this library keeps a faithful local mirror of that state,
//! applies the server's lifecycle events to it in a deterministic order,
//! and turns player controls into rate-limited movement and fire intents.
//!
//! ## Architecture Overview
//!
//! Messages flow one way and intents flow the other:
//!
//! ```text
//! socket -> network -> session -> dispatcher -> reconciler -> registry / grid
//!                                                       \-> effects / scheduler
//! devices -> input -> session -> intent encoder -> network -> socket
//! ```
//!
//! There is no client-side prediction. The local tank moves only when the
//! server confirms a move, the same way every remote tank and enemy does.
//!
//! ### Idempotent Lifecycle
//! Every entity kind supports spawn, move and destroy. Replayed spawns,
//! moves for entities that have not arrived yet and destroys for entities
//! that are already gone are all harmless no-ops, so the mirror converges
//! regardless of duplicate or reordered delivery.
//!
//! ### Single Timeline
//! The transport runs on a tokio runtime in a background thread, but game
//! state is only ever touched from the frame loop. Timed effects (explosion
//! fade-out, power-up expiry) are queued on a frame-driven scheduler rather
//! than on runtime timers, and check that their target still exists.
//!
//! ## Module Organization
//!
//! ### Core
//! - `coords`: tile to pixel mapping fitted to the window at level load
//! - `registry`: one generic keyed store per entity kind
//! - `grid`: the destructible terrain
//! - `scheduler`: cancellable deferred tasks
//! - `effects`: transient explosions and impacts
//! - `reconciler`: the lifecycle state machine
//! - `dispatcher`: message variant to reconciler operation
//! - `intent`: debounced, quantized control intents
//! - `session`: the context object tying the above together
//!
//! ### Adapters
//! - `network`: WebSocket transport
//! - `input`: keyboard and mouse polling
//! - `rendering`: drawing the mirror each frame
//!
//! ## Usage Example
//!
//! ```rust
//! use client::intent::ControlState;
//! use client::session::{Session, SessionConfig};
//!
//! let mut session = Session::new(&SessionConfig::default());
//! session.handle_text(r#"{"type":"start","playerId":1,"playerEvents":[{"playerId":1,"x":9,"y":24}]}"#, 0);
//! session.handle_text(r#"{"type":"game_tick","playerEvents":[{"action":"move","playerId":1,"x":9,"y":23}]}"#, 16);
//!
//! let tank = session.reconciler().local_tank().unwrap();
//! assert_eq!((tank.tile.x, tank.tile.y), (9, 23));
//!
//! // Intents to forward to the server for this frame.
//! let intents = session.frame(&ControlState::default(), 32);
//! assert!(intents.is_empty());
//! ```

pub mod coords;
pub mod dispatcher;
pub mod effects;
pub mod grid;
pub mod input;
pub mod intent;
pub mod network;
pub mod reconciler;
pub mod registry;
pub mod rendering;
pub mod scheduler;
pub mod session;
