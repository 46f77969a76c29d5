use serde::{Deserialize, Serialize};
use std::fmt;

pub mod protocol;

pub use protocol::{
    decode_server_message, encode_client_message, BonusEvent, BonusPlacement, BonusRemoval,
    ClientMessage, ExplosionAt, GameTick, LifecycleEvent, Placement, ProtocolError,
    ServerMessage, StartMessage, Target, TileUpdate,
};

pub const TILE_SIZE: u32 = 32;
pub const MOVE_INTERVAL_MS: u64 = 200;
pub const EXPLOSION_DURATION_MS: u64 = 500;
pub const BONUS_EFFECT_DURATION_MS: u64 = 10_000;
pub const DEFAULT_HEALTH: u32 = 2;
pub const DEFAULT_MAX_BULLETS: u32 = 2;
pub const STICK_DEADZONE: f32 = 0.5;
/// Tile the base asset occupies on every level.
pub const BASE_TILE: (i32, i32) = (13, 25);

/// Server-assigned key of a player, enemy, bullet or bonus.
///
/// The server sends ids as strings for some kinds and integers for others,
/// so both are folded into one textual key: `1` and `"1"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "IdRepr", into = "String")]
pub struct EntityId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Number(i64),
}

impl From<IdRepr> for EntityId {
    fn from(repr: IdRepr) -> Self {
        match repr {
            IdRepr::Text(text) => EntityId(text),
            IdRepr::Number(number) => EntityId(number.to_string()),
        }
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl From<&str> for EntityId {
    fn from(text: &str) -> Self {
        EntityId(text.to_string())
    }
}

impl From<u32> for EntityId {
    fn from(number: u32) -> Self {
        EntityId(number.to_string())
    }
}

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Facing of a tank or bullet on the 4-directional grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "DirectionRepr")]
pub enum Direction {
    #[default]
    Up,
    Right,
    Down,
    Left,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DirectionRepr {
    Name(String),
    Angle(f64),
}

impl TryFrom<DirectionRepr> for Direction {
    type Error = String;

    fn try_from(repr: DirectionRepr) -> Result<Self, Self::Error> {
        match repr {
            DirectionRepr::Name(name) => match name.to_ascii_uppercase().as_str() {
                "UP" | "N" => Ok(Direction::Up),
                "RIGHT" | "E" => Ok(Direction::Right),
                "DOWN" | "S" => Ok(Direction::Down),
                "LEFT" | "W" => Ok(Direction::Left),
                _ => Err(format!("unknown direction: {}", name)),
            },
            DirectionRepr::Angle(angle) if angle.fract() == 0.0 => {
                Direction::from_angle(angle as i64)
                    .ok_or_else(|| format!("unknown angle: {}", angle))
            }
            DirectionRepr::Angle(angle) => Err(format!("unknown angle: {}", angle)),
        }
    }
}

impl Direction {
    /// Rotation in degrees, clockwise from north.
    pub fn angle(self) -> u16 {
        match self {
            Direction::Up => 0,
            Direction::Right => 90,
            Direction::Down => 180,
            Direction::Left => 270,
        }
    }

    pub fn from_angle(angle: i64) -> Option<Self> {
        match angle.rem_euclid(360) {
            0 => Some(Direction::Up),
            90 => Some(Direction::Right),
            180 => Some(Direction::Down),
            270 => Some(Direction::Left),
            _ => None,
        }
    }

    /// Unit step in tile space; y grows downward.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }
}

/// Terrain of one grid cell, encoded as a single character in level text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub enum TileCode {
    #[default]
    Empty,
    Brick,
    Stone,
    Bush,
    Water,
    Ice,
}

impl TileCode {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(TileCode::Empty),
            '#' => Some(TileCode::Brick),
            '@' => Some(TileCode::Stone),
            '%' => Some(TileCode::Bush),
            '~' => Some(TileCode::Water),
            '-' => Some(TileCode::Ice),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            TileCode::Empty => '.',
            TileCode::Brick => '#',
            TileCode::Stone => '@',
            TileCode::Bush => '%',
            TileCode::Water => '~',
            TileCode::Ice => '-',
        }
    }

    pub fn is_destructible(self) -> bool {
        self == TileCode::Brick
    }

    /// Tanks may drive over empty, bush and ice cells.
    pub fn is_walkable(self) -> bool {
        matches!(self, TileCode::Empty | TileCode::Bush | TileCode::Ice)
    }
}

impl TryFrom<char> for TileCode {
    type Error = String;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        TileCode::from_char(c).ok_or_else(|| format!("unknown tile code: {:?}", c))
    }
}

impl From<TileCode> for char {
    fn from(code: TileCode) -> Self {
        code.to_char()
    }
}

/// Power-up carried by a bonus pickup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BonusType {
    #[serde(alias = "bonus_helmet")]
    Helmet,
    #[serde(alias = "bonus_boat")]
    Boat,
    #[serde(alias = "bonus_gun")]
    Gun,
    #[serde(alias = "bonus_grenade")]
    Grenade,
    #[serde(alias = "bonus_star")]
    Star,
    #[serde(alias = "bonus_shovel")]
    Shovel,
    #[serde(alias = "bonus_clock")]
    Clock,
    #[serde(alias = "bonus_tank")]
    Tank,
}

impl BonusType {
    pub const ALL: [BonusType; 8] = [
        BonusType::Helmet,
        BonusType::Boat,
        BonusType::Gun,
        BonusType::Grenade,
        BonusType::Star,
        BonusType::Shovel,
        BonusType::Clock,
        BonusType::Tank,
    ];

    /// Effects that wear off after `BONUS_EFFECT_DURATION_MS`.
    pub fn is_timed(self) -> bool {
        matches!(
            self,
            BonusType::Helmet | BonusType::Boat | BonusType::Gun | BonusType::Star
        )
    }
}
