//! Keyed collections of every server-owned entity the client mirrors
//!
//! One generic [`Registry`] is instantiated per entity kind.
//! `put` always overwrites and never decides whether an
//! operation is a create or an update. That decision belongs to the
//! reconciler, which is the only code that mutates these collections.

use crate::coords::{PixelPos, TilePos};
use crate::scheduler::TaskId;
use shared::{BonusType, Direction, EntityId, DEFAULT_HEALTH, DEFAULT_MAX_BULLETS};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Player,
    Enemy,
    Bullet,
    Bonus,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Player => "player",
            EntityKind::Enemy => "enemy",
            EntityKind::Bullet => "bullet",
            EntityKind::Bonus => "bonus",
        };
        f.write_str(name)
    }
}

/// Globally unique handle: ids are only unique within their kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Common view of anything stored in a [`Registry`].
pub trait Entity {
    fn id(&self) -> &EntityId;
    fn tile(&self) -> TilePos;
    fn pixel(&self) -> PixelPos;
}

/// Entities whose position and facing the server updates after spawn.
pub trait Movable: Entity {
    fn relocate(&mut self, tile: TilePos, pixel: PixelPos, facing: Direction);
}

/// Glow shown while a power-up is active on a tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTint {
    Yellow,
    Blue,
    Purple,
    Green,
}

impl StatusTint {
    pub fn for_bonus(bonus: BonusType) -> Option<Self> {
        match bonus {
            BonusType::Helmet => Some(StatusTint::Yellow),
            BonusType::Boat => Some(StatusTint::Blue),
            BonusType::Star => Some(StatusTint::Purple),
            BonusType::Tank => Some(StatusTint::Green),
            BonusType::Gun | BonusType::Grenade | BonusType::Shovel | BonusType::Clock => None,
        }
    }
}

/// A player or enemy tank as last confirmed by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Tank {
    pub id: EntityId,
    pub tile: TilePos,
    pub pixel: PixelPos,
    pub facing: Direction,
    pub tint: Option<StatusTint>,
    pub max_bullets: u32,
    pub active_bullets: u32,
    pub health: u32,
    /// True for the tank this client controls.
    pub local: bool,
    /// Pending expiry task of each running timed power-up.
    pub timed_bonuses: BTreeMap<BonusType, TaskId>,
}

impl Tank {
    pub fn new(id: EntityId, tile: TilePos, pixel: PixelPos, facing: Direction) -> Self {
        Self {
            id,
            tile,
            pixel,
            facing,
            tint: None,
            max_bullets: DEFAULT_MAX_BULLETS,
            active_bullets: 0,
            health: DEFAULT_HEALTH,
            local: false,
            timed_bonuses: BTreeMap::new(),
        }
    }

    pub fn apply_bonus(&mut self, bonus: BonusType) {
        match bonus {
            BonusType::Helmet | BonusType::Tank => self.health += 1,
            BonusType::Gun | BonusType::Star => self.max_bullets += 1,
            BonusType::Boat | BonusType::Grenade | BonusType::Shovel | BonusType::Clock => {}
        }

        if let Some(tint) = StatusTint::for_bonus(bonus) {
            self.tint = Some(tint);
        }
    }

    /// Undoes [`Tank::apply_bonus`], never dropping below the default stats.
    pub fn revert_bonus(&mut self, bonus: BonusType) {
        match bonus {
            BonusType::Helmet | BonusType::Tank => {
                self.health = self.health.saturating_sub(1).max(DEFAULT_HEALTH);
            }
            BonusType::Gun | BonusType::Star => {
                self.max_bullets = self.max_bullets.saturating_sub(1).max(DEFAULT_MAX_BULLETS);
                self.active_bullets = self.active_bullets.min(self.max_bullets);
            }
            BonusType::Boat | BonusType::Grenade | BonusType::Shovel | BonusType::Clock => {}
        }

        if self.tint.is_some() && self.tint == StatusTint::for_bonus(bonus) {
            self.tint = None;
        }
    }

    pub fn can_fire(&self) -> bool {
        self.active_bullets < self.max_bullets
    }
}

impl Entity for Tank {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn tile(&self) -> TilePos {
        self.tile
    }

    fn pixel(&self) -> PixelPos {
        self.pixel
    }
}

impl Movable for Tank {
    fn relocate(&mut self, tile: TilePos, pixel: PixelPos, facing: Direction) {
        self.tile = tile;
        self.pixel = pixel;
        self.facing = facing;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    pub id: EntityId,
    pub tile: TilePos,
    pub pixel: PixelPos,
    pub facing: Direction,
    pub owner: Option<EntityId>,
}

impl Entity for Bullet {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn tile(&self) -> TilePos {
        self.tile
    }

    fn pixel(&self) -> PixelPos {
        self.pixel
    }
}

impl Movable for Bullet {
    fn relocate(&mut self, tile: TilePos, pixel: PixelPos, facing: Direction) {
        self.tile = tile;
        self.pixel = pixel;
        self.facing = facing;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bonus {
    pub id: EntityId,
    pub tile: TilePos,
    pub pixel: PixelPos,
    pub bonus_type: BonusType,
}

impl Entity for Bonus {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn tile(&self) -> TilePos {
        self.tile
    }

    fn pixel(&self) -> PixelPos {
        self.pixel
    }
}

/// At most one entity per id, iterated in id order.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    kind: EntityKind,
    entries: BTreeMap<EntityId, T>,
}

impl<T> Registry<T> {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn get(&self, id: &EntityId) -> Option<&T> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut T> {
        self.entries.get_mut(id)
    }

    /// Stores a fully built entity, replacing any previous one with that id.
    pub fn put(&mut self, id: EntityId, entity: T) -> Option<T> {
        self.entries.insert(id, entity)
    }

    pub fn remove(&mut self, id: &EntityId) -> Option<T> {
        self.entries.remove(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone)]
pub struct EntityRegistry {
    pub players: Registry<Tank>,
    pub enemies: Registry<Tank>,
    pub bullets: Registry<Bullet>,
    pub bonuses: Registry<Bonus>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            players: Registry::new(EntityKind::Player),
            enemies: Registry::new(EntityKind::Enemy),
            bullets: Registry::new(EntityKind::Bullet),
            bonuses: Registry::new(EntityKind::Bonus),
        }
    }

    /// Tank collection for a tank kind; `None` for bullets and bonuses.
    pub fn tanks(&self, kind: EntityKind) -> Option<&Registry<Tank>> {
        match kind {
            EntityKind::Player => Some(&self.players),
            EntityKind::Enemy => Some(&self.enemies),
            EntityKind::Bullet | EntityKind::Bonus => None,
        }
    }

    pub fn tanks_mut(&mut self, kind: EntityKind) -> Option<&mut Registry<Tank>> {
        match kind {
            EntityKind::Player => Some(&mut self.players),
            EntityKind::Enemy => Some(&mut self.enemies),
            EntityKind::Bullet | EntityKind::Bonus => None,
        }
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        match key.kind {
            EntityKind::Player => self.players.contains(&key.id),
            EntityKind::Enemy => self.enemies.contains(&key.id),
            EntityKind::Bullet => self.bullets.contains(&key.id),
            EntityKind::Bonus => self.bonuses.contains(&key.id),
        }
    }

    pub fn len(&self) -> usize {
        self.players.len() + self.enemies.len() + self.bullets.len() + self.bonuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.players.clear();
        self.enemies.clear();
        self.bullets.clear();
        self.bonuses.clear();
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
