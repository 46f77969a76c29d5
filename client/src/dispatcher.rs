//! Routes decoded server messages to the reconciler
//!
//! The dispatcher holds no game state of its own. It unpacks each message
//! variant and forwards every contained action to the matching reconciler
//! operation. Messages that concern the session rather than entities
//! (`base_destroyed`, `error`) are reported back as an [`Outcome`] for the
//! session to act on.

use crate::reconciler::{Reconciler, TickOutcome};
use crate::scheduler::Millis;
use log::{debug, warn};
use shared::{EntityId, ServerMessage};

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Entity actions were forwarded to the reconciler.
    Entities(TickOutcome),
    /// A new room started.
    Started {
        room_id: Option<EntityId>,
        outcome: TickOutcome,
    },
    BaseDestroyed,
    ServerError(String),
    Unknown,
}

#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    screen: (f32, f32),
}

/// Applies `apply` to every entry of a legacy batch array.
///
/// A missing array is a protocol slip, not a failure: it is logged and
/// treated as empty.
fn for_each_entry<T>(
    kind: &str,
    entries: &Option<Vec<T>>,
    mut apply: impl FnMut(&T) -> bool,
) -> TickOutcome {
    let mut outcome = TickOutcome::default();
    let Some(entries) = entries else {
        warn!("{} message without its array, treating as empty", kind);
        return outcome;
    };
    for entry in entries {
        if apply(entry) {
            outcome.applied += 1;
        } else {
            outcome.ignored += 1;
        }
    }
    outcome
}

fn single(applied: bool) -> Outcome {
    Outcome::Entities(TickOutcome {
        applied: applied as usize,
        ignored: (!applied) as usize,
    })
}

impl Dispatcher {
    pub fn new(screen_width: f32, screen_height: f32) -> Self {
        Self {
            screen: (screen_width, screen_height),
        }
    }

    pub fn screen(&self) -> (f32, f32) {
        self.screen
    }

    pub fn resize(&mut self, screen_width: f32, screen_height: f32) {
        self.screen = (screen_width, screen_height);
    }

    pub fn dispatch(
        &self,
        message: &ServerMessage,
        reconciler: &mut Reconciler,
        now: Millis,
    ) -> Outcome {
        debug!("Dispatching {}", message.kind());
        let kind = message.kind();

        match message {
            ServerMessage::Start(start) => Outcome::Started {
                room_id: start.room_id.clone(),
                outcome: reconciler.start(start, self.screen, now),
            },
            ServerMessage::SpawnOther(placement) => single(reconciler.spawn_player(placement)),
            ServerMessage::EnemySpawn(placement) => single(reconciler.spawn_enemy(placement)),
            ServerMessage::EnemyDestroyed(target) => {
                single(reconciler.destroy_enemy(&target.id, now))
            }
            ServerMessage::PlayerMove(placement) => single(reconciler.move_player(placement)),
            ServerMessage::PlayerDestroyed(target) => {
                single(reconciler.destroy_player(&target.id, now))
            }
            ServerMessage::FireBullet(placement) => single(reconciler.move_bullet(placement)),
            ServerMessage::BulletDestroy(target) => {
                single(reconciler.destroy_bullet(&target.id, now))
            }
            ServerMessage::BonusSpawn(placement) => single(reconciler.spawn_bonus(placement)),
            ServerMessage::BonusRemove(removal) => {
                single(reconciler.apply_bonus_removal(removal, now))
            }
            ServerMessage::Explosion(at) => single(reconciler.explode_at(at, now)),
            ServerMessage::TileUpdate(update) => single(reconciler.update_tile(update)),
            ServerMessage::EnemyMoveBatch { enemies } => Outcome::Entities(for_each_entry(
                kind,
                enemies,
                |placement| reconciler.move_enemy(placement),
            )),
            ServerMessage::BulletMoveBatch { bullets } => Outcome::Entities(for_each_entry(
                kind,
                bullets,
                |placement| reconciler.move_bullet(placement),
            )),
            ServerMessage::BulletDestroyBatch { bullet_ids } => Outcome::Entities(
                for_each_entry(kind, bullet_ids, |id| reconciler.destroy_bullet(id, now)),
            ),
            ServerMessage::TileUpdateBatch { tiles } => Outcome::Entities(for_each_entry(
                kind,
                tiles,
                |update| reconciler.update_tile(update),
            )),
            ServerMessage::ExplosionBatch { explosions } => Outcome::Entities(for_each_entry(
                kind,
                explosions,
                |at| reconciler.explode_at(at, now),
            )),
            ServerMessage::GameTick(tick) => Outcome::Entities(reconciler.apply_tick(tick, now)),
            ServerMessage::BaseDestroyed {} => Outcome::BaseDestroyed,
            ServerMessage::Error { message } => Outcome::ServerError(message.clone()),
            ServerMessage::Unknown => {
                warn!("Dropping message of unknown type");
                Outcome::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::TilePos;
    use shared::{decode_server_message, Direction};

    fn dispatch_json(dispatcher: &Dispatcher, reconciler: &mut Reconciler, text: &str) -> Outcome {
        let message = decode_server_message(text).unwrap();
        dispatcher.dispatch(&message, reconciler, 0)
    }

    #[test]
    fn test_legacy_messages_reach_reconciler() {
        let dispatcher = Dispatcher::new(800.0, 600.0);
        let mut reconciler = Reconciler::default();

        dispatch_json(
            &dispatcher,
            &mut reconciler,
            r#"{"type":"enemy_spawn","enemyId":"e1","x":3,"y":0,"direction":"DOWN"}"#,
        );
        let outcome = dispatch_json(
            &dispatcher,
            &mut reconciler,
            r#"{"type":"enemy_move_batch","enemies":[{"enemyId":"e1","x":3,"y":1,"direction":"DOWN"},{"enemyId":"e9","x":0,"y":0}]}"#,
        );

        assert_eq!(outcome, Outcome::Entities(TickOutcome { applied: 1, ignored: 1 }));
        let enemy = reconciler.registry().enemies.get(&EntityId::from("e1")).unwrap();
        assert_eq!(enemy.tile, TilePos::new(3, 1));
        assert_eq!(enemy.facing, Direction::Down);
    }

    #[test]
    fn test_player_move_alias() {
        let dispatcher = Dispatcher::new(800.0, 600.0);
        let mut reconciler = Reconciler::default();

        dispatch_json(
            &dispatcher,
            &mut reconciler,
            r#"{"type":"spawn_new_player","playerId":2,"x":1,"y":1,"direction":"UP"}"#,
        );
        dispatch_json(
            &dispatcher,
            &mut reconciler,
            r#"{"type":"move","playerNumber":2,"x":2,"y":1,"direction":"RIGHT"}"#,
        );

        let tank = reconciler.registry().players.get(&EntityId::from("2")).unwrap();
        assert_eq!(tank.tile, TilePos::new(2, 1));
        assert_eq!(tank.facing, Direction::Right);
    }

    #[test]
    fn test_bullet_batches() {
        let dispatcher = Dispatcher::new(800.0, 600.0);
        let mut reconciler = Reconciler::default();

        dispatch_json(
            &dispatcher,
            &mut reconciler,
            r#"{"type":"bullet_move_batch","bullets":[{"bulletId":"b1","x":1,"y":1},{"bulletId":"b2","x":2,"y":2}]}"#,
        );
        assert_eq!(reconciler.registry().bullets.len(), 2);

        let outcome = dispatch_json(
            &dispatcher,
            &mut reconciler,
            r#"{"type":"bullet_destroy_batch","bulletIds":["b1","b1","b3"]}"#,
        );
        assert_eq!(outcome, Outcome::Entities(TickOutcome { applied: 1, ignored: 2 }));
        assert_eq!(reconciler.registry().bullets.len(), 1);
    }

    #[test]
    fn test_missing_batch_array_is_empty() {
        let dispatcher = Dispatcher::new(800.0, 600.0);
        let mut reconciler = Reconciler::default();

        let outcome = dispatch_json(&dispatcher, &mut reconciler, r#"{"type":"explosion_batch"}"#);
        assert_eq!(outcome, Outcome::Entities(TickOutcome::default()));
        assert!(reconciler.effects().is_empty());
    }

    #[test]
    fn test_session_level_outcomes() {
        let dispatcher = Dispatcher::new(800.0, 600.0);
        let mut reconciler = Reconciler::default();

        let outcome = dispatch_json(
            &dispatcher,
            &mut reconciler,
            r#"{"type":"start","playerId":1,"roomId":"r7","playerEvents":[{"playerId":1,"x":0,"y":0}]}"#,
        );
        match outcome {
            Outcome::Started { room_id, outcome } => {
                assert_eq!(room_id, Some(EntityId::from("r7")));
                assert_eq!(outcome.applied, 1);
            }
            other => panic!("Wrong outcome for start: {:?}", other),
        }

        assert_eq!(
            dispatch_json(&dispatcher, &mut reconciler, r#"{"type":"base_destroyed"}"#),
            Outcome::BaseDestroyed
        );
        assert_eq!(
            dispatch_json(&dispatcher, &mut reconciler, r#"{"type":"error","message":"room full"}"#),
            Outcome::ServerError("room full".to_string())
        );
    }

    #[test]
    fn test_start_uses_screen_for_level() {
        let dispatcher = Dispatcher::new(200.0, 100.0);
        let mut reconciler = Reconciler::default();

        dispatch_json(
            &dispatcher,
            &mut reconciler,
            r#"{"type":"start","playerId":1,"levelMap":["....","...."]}"#,
        );
        assert_eq!(reconciler.mapper().tile_size(), 50);
        assert_eq!(reconciler.mapper().offset(), (0.0, 0.0));
    }
}
