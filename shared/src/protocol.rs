//! JSON wire protocol between the battle server and its clients.
//!
//! Every message is a JSON object with a `type` discriminator. Inbound
//! traffic decodes into [`ServerMessage`]; outbound intent is built from
//! [`ClientMessage`]. The server names the same concept differently across
//! message kinds (`playerId` vs `playerNumber`, `move` vs `player_move`), so
//! the serde attributes here carry the aliases and nothing downstream has to.

use crate::{BonusType, Direction, EntityId, TileCode};
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message has no type discriminator")]
    MissingType,
    #[error("unknown message type: {0}")]
    UnknownType(String),
    #[error("malformed {kind} message: {source}")]
    Malformed {
        kind: String,
        source: serde_json::Error,
    },
}

/// Every identifier field an event may carry.
///
/// A bullet or bonus event can name both itself and the tank it belongs to,
/// so the keys are split here rather than aliased onto one field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ids {
    id: Option<EntityId>,
    bullet_id: Option<EntityId>,
    bonus_id: Option<EntityId>,
    enemy_id: Option<EntityId>,
    player_id: Option<EntityId>,
    player_number: Option<EntityId>,
    owner_id: Option<EntityId>,
}

impl Ids {
    /// Returns the entity's own key and, when one is named, its owner.
    fn resolve(self) -> Result<(EntityId, Option<EntityId>), String> {
        let tank = self.enemy_id.or(self.player_id).or(self.player_number);
        match self.bullet_id.or(self.bonus_id).or(self.id) {
            Some(id) => Ok((id, self.owner_id.or(tank))),
            None => tank
                .map(|id| (id, self.owner_id))
                .ok_or_else(|| "missing entity id".to_string()),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlacementRepr {
    x: i32,
    y: i32,
    #[serde(default)]
    direction: Direction,
    id: Option<EntityId>,
    bullet_id: Option<EntityId>,
    enemy_id: Option<EntityId>,
    player_id: Option<EntityId>,
    player_number: Option<EntityId>,
    owner_id: Option<EntityId>,
}

/// Position (and facing) of a tank or bullet in tile coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "PlacementRepr")]
pub struct Placement {
    pub id: EntityId,
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    /// Tank that fired a bullet, when the server reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<EntityId>,
}

impl TryFrom<PlacementRepr> for Placement {
    type Error = String;

    fn try_from(repr: PlacementRepr) -> Result<Self, Self::Error> {
        let ids = Ids {
            id: repr.id,
            bullet_id: repr.bullet_id,
            enemy_id: repr.enemy_id,
            player_id: repr.player_id,
            player_number: repr.player_number,
            owner_id: repr.owner_id,
            ..Ids::default()
        };
        let (id, owner_id) = ids.resolve()?;
        Ok(Placement {
            id,
            x: repr.x,
            y: repr.y,
            direction: repr.direction,
            owner_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Ids")]
pub struct Target {
    pub id: EntityId,
}

impl TryFrom<Ids> for Target {
    type Error = String;

    fn try_from(ids: Ids) -> Result<Self, Self::Error> {
        let (id, _) = ids.resolve()?;
        Ok(Target { id })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusPlacement {
    #[serde(alias = "bonusId")]
    pub id: EntityId,
    pub x: i32,
    pub y: i32,
    #[serde(alias = "type", alias = "effect")]
    pub bonus_type: BonusType,
}

/// Removal of a bonus; `player_id` is set when a tank picked it up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusRemoval {
    #[serde(alias = "bonusId")]
    pub id: EntityId,
    #[serde(default, alias = "playerNumber", skip_serializing_if = "Option::is_none")]
    pub player_id: Option<EntityId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileUpdate {
    pub x: i32,
    pub y: i32,
    pub tile: TileCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExplosionAt {
    pub x: i32,
    pub y: i32,
}

/// One entry of a batched tank or bullet array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Spawn(Placement),
    Move(Placement),
    Destroy(Target),
}

/// One entry of a batched bonus array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BonusEvent {
    Spawn(BonusPlacement),
    #[serde(alias = "destroy")]
    Remove(BonusRemoval),
    Collect(BonusRemoval),
}

/// Unified per-tick snapshot. Absent arrays are empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameTick {
    #[serde(deserialize_with = "lenient_entries")]
    pub player_events: Vec<LifecycleEvent>,
    #[serde(deserialize_with = "lenient_entries")]
    pub enemy_events: Vec<LifecycleEvent>,
    #[serde(deserialize_with = "lenient_entries")]
    pub bullets: Vec<LifecycleEvent>,
    #[serde(deserialize_with = "lenient_entries")]
    pub bonuses: Vec<BonusEvent>,
    #[serde(deserialize_with = "lenient_entries")]
    pub tiles: Vec<TileUpdate>,
    #[serde(deserialize_with = "lenient_entries")]
    pub explosions: Vec<ExplosionAt>,
}

impl GameTick {
    pub fn is_empty(&self) -> bool {
        self.player_events.is_empty()
            && self.enemy_events.is_empty()
            && self.bullets.is_empty()
            && self.bonuses.is_empty()
            && self.tiles.is_empty()
            && self.explosions.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartMessage {
    #[serde(alias = "playerNumber")]
    pub player_id: Option<EntityId>,
    pub room_id: Option<EntityId>,
    pub level_map: Vec<String>,
    #[serde(deserialize_with = "lenient_entries")]
    pub player_events: Vec<Placement>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub direction: Option<Direction>,
}

/// Decodes an array entry by entry, logging and skipping entries that do
/// not parse. A missing or `null` array is empty.
fn lenient_entries<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(lenient_batch(deserializer)?.unwrap_or_default())
}

/// Like [`lenient_entries`], but keeps an absent array distinguishable.
fn lenient_batch<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(values) = Option::<Vec<serde_json::Value>>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let entries = values
        .into_iter()
        .filter_map(|value| match T::deserialize(&value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping malformed entry {}: {}", value, e);
                None
            }
        })
        .collect();
    Ok(Some(entries))
}

/// Every message the server may send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Start(StartMessage),
    #[serde(alias = "spawn_new_player")]
    SpawnOther(Placement),
    EnemySpawn(Placement),
    EnemyDestroyed(Target),
    #[serde(alias = "move")]
    PlayerMove(Placement),
    PlayerDestroyed(Target),
    #[serde(alias = "bullet_move")]
    FireBullet(Placement),
    BulletDestroy(Target),
    BonusSpawn(BonusPlacement),
    BonusRemove(BonusRemoval),
    Explosion(ExplosionAt),
    TileUpdate(TileUpdate),
    EnemyMoveBatch {
        #[serde(default, deserialize_with = "lenient_batch")]
        enemies: Option<Vec<Placement>>,
    },
    BulletMoveBatch {
        #[serde(default, deserialize_with = "lenient_batch")]
        bullets: Option<Vec<Placement>>,
    },
    BulletDestroyBatch {
        #[serde(rename = "bulletIds", default, deserialize_with = "lenient_batch")]
        bullet_ids: Option<Vec<EntityId>>,
    },
    TileUpdateBatch {
        #[serde(default, deserialize_with = "lenient_batch")]
        tiles: Option<Vec<TileUpdate>>,
    },
    ExplosionBatch {
        #[serde(default, deserialize_with = "lenient_batch")]
        explosions: Option<Vec<ExplosionAt>>,
    },
    GameTick(GameTick),
    BaseDestroyed {},
    Error {
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// Wire name of the message kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Start(_) => "start",
            ServerMessage::SpawnOther(_) => "spawn_other",
            ServerMessage::EnemySpawn(_) => "enemy_spawn",
            ServerMessage::EnemyDestroyed(_) => "enemy_destroyed",
            ServerMessage::PlayerMove(_) => "player_move",
            ServerMessage::PlayerDestroyed(_) => "player_destroyed",
            ServerMessage::FireBullet(_) => "fire_bullet",
            ServerMessage::BulletDestroy(_) => "bullet_destroy",
            ServerMessage::BonusSpawn(_) => "bonus_spawn",
            ServerMessage::BonusRemove(_) => "bonus_remove",
            ServerMessage::Explosion(_) => "explosion",
            ServerMessage::TileUpdate(_) => "tile_update",
            ServerMessage::EnemyMoveBatch { .. } => "enemy_move_batch",
            ServerMessage::BulletMoveBatch { .. } => "bullet_move_batch",
            ServerMessage::BulletDestroyBatch { .. } => "bullet_destroy_batch",
            ServerMessage::TileUpdateBatch { .. } => "tile_update_batch",
            ServerMessage::ExplosionBatch { .. } => "explosion_batch",
            ServerMessage::GameTick(_) => "game_tick",
            ServerMessage::BaseDestroyed {} => "base_destroyed",
            ServerMessage::Error { .. } => "error",
            ServerMessage::Unknown => "unknown",
        }
    }
}

/// Intent sent by the client. The server assigns every resulting id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    PlayerMove { direction: Direction },
    FireBullet {},
}

pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(ProtocolError::MissingType)?
        .to_string();

    match ServerMessage::deserialize(value) {
        Ok(ServerMessage::Unknown) => Err(ProtocolError::UnknownType(kind)),
        Ok(message) => Ok(message),
        Err(source) => Err(ProtocolError::Malformed { kind, source }),
    }
}

pub fn encode_client_message(message: &ClientMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}
