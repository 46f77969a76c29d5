//! Integration tests for the synchronization layer
//!
//! These tests drive a full session with raw server JSON and check the
//! resulting mirror, and run the transport against a local WebSocket server.

use client::coords::{CoordinateMapper, PixelPos, TilePos};
use client::intent::{ControlState, KeyState};
use client::network::{run_transport, TransportEvent};
use client::session::{Phase, Session, SessionConfig};
use shared::{ClientMessage, Direction, EntityId, TileCode};

fn id(value: &str) -> EntityId {
    EntityId::from(value)
}

fn session() -> Session {
    Session::new(&SessionConfig::default())
}

/// Feeds frames in order, all at the same instant.
fn feed(session: &mut Session, frames: &[&str], now: u64) {
    for frame in frames {
        session.handle_text(frame, now);
    }
}

/// SCENARIO TESTS
mod scenario_tests {
    use super::*;

    /// Start followed by a confirmed move updates the one local tank
    #[test]
    fn start_then_tick_moves_local_player() {
        let mut session = session();
        feed(
            &mut session,
            &[
                r#"{"type":"start","playerEvents":[{"playerId":1,"x":9,"y":24,"direction":"UP"}]}"#,
                r#"{"type":"game_tick","playerEvents":[{"action":"move","playerId":1,"x":9,"y":23,"direction":"UP"}]}"#,
            ],
            0,
        );

        let players = &session.reconciler().registry().players;
        assert_eq!(players.len(), 1);
        let tank = players.get(&id("1")).unwrap();
        assert_eq!(tank.tile, TilePos::new(9, 23));
        assert_eq!(tank.facing, Direction::Up);
        assert!(tank.local);
    }

    /// The same spawn delivered twice, across messages and within a batch
    #[test]
    fn duplicate_spawn_is_ignored() {
        let mut session = session();
        let spawn = r#"{"type":"enemy_spawn","enemyId":"A","x":4,"y":4,"direction":"DOWN"}"#;
        feed(
            &mut session,
            &[
                spawn,
                spawn,
                r#"{"type":"game_tick","enemyEvents":[{"action":"spawn","enemyId":"A","x":0,"y":0},{"action":"spawn","enemyId":"A","x":1,"y":1}]}"#,
            ],
            0,
        );

        let enemies = &session.reconciler().registry().enemies;
        assert_eq!(enemies.len(), 1);
        let enemy = enemies.get(&id("A")).unwrap();
        assert_eq!(enemy.tile, TilePos::new(4, 4));
        assert_eq!(enemy.facing, Direction::Down);
    }

    /// Moves and destroys for an id that never spawned change nothing
    #[test]
    fn orphan_events_leave_registry_untouched() {
        let mut session = session();
        feed(
            &mut session,
            &[
                r#"{"type":"enemy_destroyed","enemyId":"B"}"#,
                r#"{"type":"player_move","playerId":"B","x":1,"y":1,"direction":"LEFT"}"#,
                r#"{"type":"game_tick","enemyEvents":[{"action":"move","enemyId":"B","x":1,"y":1},{"action":"destroy","enemyId":"B"}]}"#,
                r#"{"type":"bonus_remove","bonusId":"B"}"#,
            ],
            0,
        );

        assert!(session.reconciler().registry().is_empty());
        assert!(session.reconciler().effects().is_empty());
    }

    /// Spawn then destroy of the same bullet in one tick leaves it absent
    #[test]
    fn batch_later_action_wins() {
        let mut session = session();
        feed(
            &mut session,
            &[r#"{"type":"game_tick","bullets":[{"id":"b1","action":"spawn","x":2,"y":3},{"id":"b1","action":"destroy"}]}"#],
            0,
        );

        assert!(!session.reconciler().registry().bullets.contains(&id("b1")));
        assert_eq!(session.reconciler().effects().len(), 1);
    }

    /// A shot-away brick stays empty until the server says otherwise
    #[test]
    fn tile_destruction_is_permanent() {
        let mut session = session();
        let mut rows = vec![".".repeat(13); 13];
        rows[5] = ".....#.......".to_string();
        let start = serde_json::json!({
            "type": "start",
            "playerId": 1,
            "levelMap": rows,
            "playerEvents": [{"playerId": 1, "x": 0, "y": 0}],
        })
        .to_string();
        feed(&mut session, &[start.as_str()], 0);

        let grid = session.reconciler().grid().unwrap();
        assert!(grid.get(5, 5).unwrap().destructible);

        feed(
            &mut session,
            &[
                r#"{"type":"tile_update","x":5,"y":5,"tile":"."}"#,
                r#"{"type":"bonus_spawn","bonusId":"s","x":5,"y":5,"bonusType":"star"}"#,
                r#"{"type":"game_tick","enemyEvents":[{"action":"spawn","enemyId":"e","x":5,"y":5}]}"#,
            ],
            10,
        );

        let cell = session.reconciler().grid().unwrap().get(5, 5).unwrap();
        assert_eq!(cell.code, TileCode::Empty);
        assert!(!cell.destructible);

        feed(&mut session, &[r##"{"type":"tile_update_batch","tiles":[{"x":5,"y":5,"tile":"#"}]}"##], 20);
        assert_eq!(
            session.reconciler().grid().unwrap().get(5, 5).unwrap().code,
            TileCode::Brick
        );
    }

    /// A whole round: level, enemies, a shot, a pickup, the end
    #[test]
    fn full_round() {
        let mut session = session();
        let start = serde_json::json!({
            "type": "start",
            "playerId": 1,
            "roomId": "alpha",
            "levelMap": ["....", ".#..", "....", "...."],
            "playerEvents": [
                {"playerId": 1, "x": 0, "y": 3, "direction": "UP"},
                {"playerId": 2, "x": 3, "y": 3, "direction": "UP"}
            ],
        })
        .to_string();
        feed(&mut session, &[start.as_str()], 0);
        assert_eq!(session.phase(), Phase::Playing);
        assert_eq!(session.room_id(), Some(&id("alpha")));
        assert_eq!(session.reconciler().mapper().tile_size(), 150);

        feed(
            &mut session,
            &[
                r#"{"type":"game_tick","enemyEvents":[{"action":"spawn","enemyId":7,"x":0,"y":0,"direction":180}]}"#,
                r#"{"type":"fire_bullet","bulletId":"b1","ownerId":1,"x":0,"y":2,"direction":"UP"}"#,
            ],
            100,
        );
        assert_eq!(session.reconciler().local_tank().unwrap().active_bullets, 1);
        assert_eq!(
            session.reconciler().registry().enemies.get(&id("7")).unwrap().facing,
            Direction::Down
        );

        feed(
            &mut session,
            &[
                r#"{"type":"bullet_move","bulletId":"b1","x":0,"y":1,"direction":"UP"}"#,
                r#"{"type":"game_tick","bullets":[{"action":"destroy","bulletId":"b1"}],"enemyEvents":[{"action":"destroy","enemyId":7}],"explosions":[{"x":0,"y":0}]}"#,
            ],
            200,
        );
        let reconciler = session.reconciler();
        assert!(reconciler.registry().bullets.is_empty());
        assert!(reconciler.registry().enemies.is_empty());
        assert_eq!(reconciler.local_tank().unwrap().active_bullets, 0);
        assert_eq!(reconciler.effects().len(), 3);

        feed(
            &mut session,
            &[
                r#"{"type":"bonus_spawn","bonusId":"h1","x":1,"y":3,"bonusType":"helmet"}"#,
                r#"{"type":"game_tick","bonuses":[{"action":"collect","bonusId":"h1","playerId":1}]}"#,
            ],
            300,
        );
        assert_eq!(session.reconciler().local_tank().unwrap().health, 3);

        session.advance(1_000);
        assert!(session.reconciler().effects().is_empty());

        session.advance(10_300);
        assert_eq!(session.reconciler().local_tank().unwrap().health, 2);

        feed(&mut session, &[r#"{"type":"base_destroyed"}"#], 11_000);
        assert_eq!(session.phase(), Phase::BaseDestroyed);
        feed(&mut session, &[r#"{"type":"player_destroyed","playerNumber":2}"#], 11_010);
        assert!(session.reconciler().registry().players.contains(&id("2")));
    }

    /// Malformed and unknown traffic never stops the session
    #[test]
    fn protocol_errors_are_not_fatal() {
        let mut session = session();
        feed(
            &mut session,
            &[
                r#"{"type":"start","playerId":1,"playerEvents":[{"playerId":1,"x":0,"y":0}]}"#,
                "garbage",
                r#"{"type":"warp_drive","x":1}"#,
                r#"{"type":"enemy_spawn","enemyId":"e1"}"#,
                r#"{"type":"bullet_destroy_batch"}"#,
                r#"{"type":"game_tick"}"#,
                r#"{"type":"enemy_spawn","enemyId":"e2","x":1,"y":1}"#,
            ],
            0,
        );

        assert_eq!(session.phase(), Phase::Playing);
        let enemies = &session.reconciler().registry().enemies;
        assert!(!enemies.contains(&id("e1")));
        assert!(enemies.contains(&id("e2")));
    }

    /// One unreadable entry costs only itself, not the rest of the tick
    #[test]
    fn bad_tick_entry_does_not_drop_the_tick() {
        let mut session = session();
        feed(
            &mut session,
            &[
                r#"{"type":"start","playerId":1,"playerEvents":[{"playerId":1,"x":9,"y":24}]}"#,
                r#"{"type":"enemy_spawn","enemyId":"e1","x":3,"y":3}"#,
                r#"{"type":"game_tick","playerEvents":[{"action":"move","playerId":1,"x":9,"y":23},{"action":"respawn","playerId":2,"x":0,"y":0}],"enemyEvents":[{"action":"destroy","enemyId":"e1"}],"bonuses":[{"action":"spawn","bonusId":"z","x":1,"y":1,"bonusType":"laser"}]}"#,
            ],
            0,
        );

        let reconciler = session.reconciler();
        assert_eq!(reconciler.local_tank().unwrap().tile, TilePos::new(9, 23));
        assert!(!reconciler.registry().enemies.contains(&id("e1")));
        assert!(reconciler.registry().bonuses.is_empty());
        assert_eq!(reconciler.registry().players.len(), 1);
    }

    /// A bullet event naming both the bullet and its shooter
    #[test]
    fn bullet_event_with_owner_counts_against_shooter() {
        let mut session = session();
        feed(
            &mut session,
            &[
                r#"{"type":"start","playerId":1,"playerEvents":[{"playerId":1,"x":0,"y":5}]}"#,
                r#"{"type":"fire_bullet","bulletId":"b1","playerId":1,"x":0,"y":4,"direction":"UP"}"#,
            ],
            0,
        );
        assert!(session.reconciler().registry().bullets.contains(&id("b1")));
        assert_eq!(session.reconciler().local_tank().unwrap().active_bullets, 1);

        feed(
            &mut session,
            &[r#"{"type":"bullet_destroy","bulletId":"b1","playerId":1}"#],
            10,
        );
        assert!(session.reconciler().registry().bullets.is_empty());
        assert_eq!(session.reconciler().local_tank().unwrap().active_bullets, 0);
        assert!(session.reconciler().registry().players.contains(&id("1")));
    }
}

/// INPUT TESTS
mod input_tests {
    use super::*;

    /// Held key over several frames respects the move interval
    #[test]
    fn held_key_is_debounced_through_session() {
        let mut session = session();
        feed(
            &mut session,
            &[r#"{"type":"start","playerId":1,"playerEvents":[{"playerId":1,"x":0,"y":0}]}"#],
            0,
        );

        let controls = ControlState {
            keys: KeyState {
                up: true,
                ..KeyState::default()
            },
            ..ControlState::default()
        };

        let mut emitted = Vec::new();
        for now in [0, 50, 150, 210] {
            for intent in session.frame(&controls, now) {
                emitted.push((now, intent));
            }
        }

        assert_eq!(
            emitted,
            vec![
                (0, ClientMessage::PlayerMove { direction: Direction::Up }),
                (210, ClientMessage::PlayerMove { direction: Direction::Up }),
            ]
        );

        // The tank itself has not moved: only the server moves it.
        assert_eq!(
            session.reconciler().local_tank().unwrap().tile,
            TilePos::new(0, 0)
        );
    }

    /// Intents serialize to the documented wire shape
    #[test]
    fn intents_on_the_wire() {
        let up = shared::encode_client_message(&ClientMessage::PlayerMove {
            direction: Direction::Up,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&up).unwrap();
        assert_eq!(value, serde_json::json!({"type": "player_move", "direction": "UP"}));

        let fire = shared::encode_client_message(&ClientMessage::FireBullet {}).unwrap();
        let value: serde_json::Value = serde_json::from_str(&fire).unwrap();
        assert_eq!(value, serde_json::json!({"type": "fire_bullet"}));
    }
}

/// COORDINATE TESTS
mod coordinate_tests {
    use super::*;

    /// Snapping equals mapping to a tile and back, across the whole grid
    #[test]
    fn snap_matches_round_trip() {
        let mapper = CoordinateMapper::new(8.0, 4.0, 32);
        let cols = 13;
        let rows = 13;

        let mut py = 4.0;
        while py < 4.0 + (rows * 32) as f32 {
            let mut px = 8.0;
            while px < 8.0 + (cols * 32) as f32 {
                let tile = mapper.to_tile(px, py);
                assert_eq!(mapper.to_pixel(tile.x, tile.y), mapper.snap_to_tile(px, py));
                px += 7.5;
            }
            py += 7.5;
        }

        assert_eq!(mapper.snap_to_tile(8.0 + 31.9, 4.0), PixelPos::new(8.0, 4.0));
    }
}

/// NETWORK TESTS
mod network_tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::Message;

    /// A scripted server drives a session through the real transport
    #[tokio::test]
    async fn session_over_websocket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            for frame in [
                r#"{"type":"start","playerId":1,"playerEvents":[{"playerId":1,"x":2,"y":2}]}"#,
                r#"{"type":"enemy_spawn","enemyId":"e1","x":5,"y":0}"#,
                r#"{"type":"game_tick","playerEvents":[{"action":"move","playerId":1,"x":2,"y":1}]}"#,
            ] {
                ws.send(Message::Text(frame.to_string())).await.unwrap();
            }

            let intent = loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => break text,
                    Some(Ok(_)) => continue,
                    other => panic!("Server got no intent: {:?}", other),
                }
            };
            ws.close(None).await.unwrap();
            intent
        });

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let transport = tokio::spawn(run_transport(format!("ws://{}", addr), event_tx, intent_rx));

        let mut session = session();
        let mut messages = 0;
        while messages < 3 {
            let event = event_rx.recv().await.unwrap();
            if matches!(event, TransportEvent::Message(_)) {
                messages += 1;
            }
            session.handle_transport(event, 0);
        }

        assert_eq!(session.phase(), Phase::Playing);
        assert_eq!(
            session.reconciler().local_tank().unwrap().tile,
            TilePos::new(2, 1)
        );
        assert_eq!(session.reconciler().registry().enemies.len(), 1);

        let fire = ControlState {
            fire: true,
            ..ControlState::default()
        };
        for intent in session.frame(&fire, 16) {
            intent_tx.send(intent).unwrap();
        }

        let received = server.await.unwrap();
        assert_eq!(received, r#"{"type":"fire_bullet"}"#);

        while let Some(event) = event_rx.recv().await {
            session.handle_transport(event, 32);
        }
        assert_eq!(session.phase(), Phase::Closed);
        transport.await.unwrap();
    }
}
