//! Applies server lifecycle events to the local mirror of the battle
//!
//! Every entity kind supports the same three actions and each of them is
//! idempotent and tolerant of reordering:
//!
//! - **spawn** creates the entity unless its id is already present, so a
//!   replayed batch never duplicates anything.
//! - **move** updates position and facing of a present entity and is a no-op
//!   otherwise. The spawn may still be in flight, or the entity is already
//!   gone; neither case is an error. Bullets are the exception: the server
//!   never sends a separate spawn for them, so the first move-style event for
//!   an unknown bullet creates it.
//! - **destroy** removes a present entity and leaves a transient effect at
//!   its last pixel position. It is a no-op for unknown ids.
//!
//! Within a batched tick the kinds are applied in a fixed order (players,
//! bullets, bonuses, tiles, explosions, enemies) and entries within a kind in
//! array order, so a later action on an id always wins over an earlier one.

use crate::coords::{CoordinateMapper, PixelPos, TilePos};
use crate::effects::{EffectKind, Effects};
use crate::grid::{GridError, TileGrid};
use crate::registry::{
    Bonus, Bullet, EntityKey, EntityKind, EntityRegistry, Movable, Registry, Tank,
};
use crate::scheduler::{Millis, Scheduler, Task};
use log::{debug, info, warn};
use shared::{
    BonusEvent, BonusPlacement, BonusRemoval, BonusType, EntityId, ExplosionAt, GameTick,
    LifecycleEvent, Placement, StartMessage, TileUpdate, BASE_TILE, BONUS_EFFECT_DURATION_MS,
    EXPLOSION_DURATION_MS,
};

/// Which tank slot a player event is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerSlot {
    Local,
    Remote,
}

/// How many actions of a batch changed state and how many were no-ops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub applied: usize,
    pub ignored: usize,
}

impl TickOutcome {
    fn record(&mut self, applied: bool) {
        if applied {
            self.applied += 1;
        } else {
            self.ignored += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub effect_duration: Millis,
    pub bonus_duration: Millis,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            effect_duration: EXPLOSION_DURATION_MS,
            bonus_duration: BONUS_EFFECT_DURATION_MS,
        }
    }
}

pub struct Reconciler {
    registry: EntityRegistry,
    grid: Option<TileGrid>,
    mapper: CoordinateMapper,
    effects: Effects,
    scheduler: Scheduler,
    local_player: Option<EntityId>,
    base: Option<TilePos>,
    timings: Timings,
}

fn spawn_into<T>(registry: &mut Registry<T>, id: &EntityId, entity: T) -> bool {
    if registry.contains(id) {
        debug!("Duplicate spawn of {} {} ignored", registry.kind(), id);
        return false;
    }
    registry.put(id.clone(), entity);
    true
}

fn move_within<T: Movable>(
    registry: &mut Registry<T>,
    placement: &Placement,
    pixel: PixelPos,
) -> bool {
    match registry.get_mut(&placement.id) {
        Some(entity) => {
            let tile = TilePos::new(placement.x, placement.y);
            entity.relocate(tile, pixel, placement.direction);
            true
        }
        None => {
            debug!("Move for unknown {} {} ignored", registry.kind(), placement.id);
            false
        }
    }
}

impl Reconciler {
    pub fn new(timings: Timings) -> Self {
        Self {
            registry: EntityRegistry::new(),
            grid: None,
            mapper: CoordinateMapper::default(),
            effects: Effects::new(),
            scheduler: Scheduler::new(),
            local_player: None,
            base: None,
            timings,
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn grid(&self) -> Option<&TileGrid> {
        self.grid.as_ref()
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn effects(&self) -> &Effects {
        &self.effects
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn timings(&self) -> Timings {
        self.timings
    }

    pub fn local_player_id(&self) -> Option<&EntityId> {
        self.local_player.as_ref()
    }

    /// Cell of the base the players defend, once a round has started.
    pub fn base(&self) -> Option<TilePos> {
        self.base
    }

    pub fn local_tank(&self) -> Option<&Tank> {
        self.local_player
            .as_ref()
            .and_then(|id| self.registry.players.get(id))
    }

    pub fn slot_for(&self, id: &EntityId) -> PlayerSlot {
        if self.local_player.as_ref() == Some(id) {
            PlayerSlot::Local
        } else {
            PlayerSlot::Remote
        }
    }

    /// Records which player this client controls and flags its tank.
    pub fn set_local_player(&mut self, id: EntityId) {
        if let Some(previous) = self.local_player.take() {
            if let Some(tank) = self.registry.players.get_mut(&previous) {
                tank.local = false;
            }
        }
        if let Some(tank) = self.registry.players.get_mut(&id) {
            tank.local = true;
        }
        self.local_player = Some(id);
    }

    /// Replaces the terrain and recomputes the pixel mapping for `screen`.
    pub fn load_level<S: AsRef<str>>(
        &mut self,
        rows: &[S],
        screen: (f32, f32),
    ) -> Result<(), GridError> {
        let grid = TileGrid::parse(rows)?;
        self.mapper = CoordinateMapper::fit(screen.0, screen.1, grid.cols(), grid.rows());
        info!(
            "Loaded {}x{} level, tile size {}",
            grid.cols(),
            grid.rows(),
            self.mapper.tile_size()
        );
        self.grid = Some(grid);
        Ok(())
    }

    /// Forgets every entity, effect and pending task of the previous room.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.effects.clear();
        self.scheduler.clear();
        self.local_player = None;
        self.base = None;
    }

    /// Drops entities and effects but lets pending tasks run out.
    pub fn clear_entities(&mut self) {
        self.registry.clear();
        self.effects.clear();
    }

    /// Applies a `start` message: new level, local player, initial tanks.
    pub fn start(&mut self, start: &StartMessage, screen: (f32, f32), now: Millis) -> TickOutcome {
        self.reset();

        if !start.level_map.is_empty() {
            if let Err(e) = self.load_level(start.level_map.as_slice(), screen) {
                warn!("Ignoring level map in start message: {}", e);
            }
        }

        let (bx, by) = BASE_TILE;
        self.base = match &self.grid {
            Some(grid) if grid.get(bx, by).is_none() => {
                debug!("Level has no cell ({}, {}), no base shown", bx, by);
                None
            }
            _ => Some(TilePos::new(bx, by)),
        };

        let mut placements = start.player_events.clone();
        if placements.is_empty() {
            if let (Some(id), Some(x), Some(y)) = (&start.player_id, start.x, start.y) {
                placements.push(Placement {
                    id: id.clone(),
                    x,
                    y,
                    direction: start.direction.unwrap_or_default(),
                    owner_id: None,
                });
            }
        }

        let local = start
            .player_id
            .clone()
            .or_else(|| placements.first().map(|p| p.id.clone()));
        if let Some(id) = local {
            info!("Playing as player {}", id);
            self.set_local_player(id);
        } else {
            warn!("Start message names no local player");
        }

        let mut outcome = TickOutcome::default();
        for placement in &placements {
            outcome.record(self.spawn_player(placement));
        }
        outcome.applied += self.run_due_tasks(now);
        outcome
    }

    fn pixel_of(&self, x: i32, y: i32) -> PixelPos {
        self.mapper.to_pixel(x, y)
    }

    fn leave_effect(&mut self, kind: EffectKind, position: PixelPos, now: Millis) {
        let effect = self.effects.spawn(kind, position, now);
        self.scheduler
            .schedule(now + self.timings.effect_duration, Task::ExpireEffect(effect));
    }

    pub fn spawn_player(&mut self, placement: &Placement) -> bool {
        let slot = self.slot_for(&placement.id);
        let mut tank = Tank::new(
            placement.id.clone(),
            TilePos::new(placement.x, placement.y),
            self.pixel_of(placement.x, placement.y),
            placement.direction,
        );
        tank.local = slot == PlayerSlot::Local;
        spawn_into(&mut self.registry.players, &placement.id, tank)
    }

    /// Moves a player tank. The local tank only ever moves here, on a
    /// server-confirmed position.
    pub fn move_player(&mut self, placement: &Placement) -> bool {
        let pixel = self.pixel_of(placement.x, placement.y);
        if self.slot_for(&placement.id) == PlayerSlot::Local {
            debug!("Local tank confirmed at ({}, {})", placement.x, placement.y);
        }
        move_within(&mut self.registry.players, placement, pixel)
    }

    pub fn destroy_player(&mut self, id: &EntityId, now: Millis) -> bool {
        self.destroy_tank(EntityKind::Player, id, now)
    }

    pub fn spawn_enemy(&mut self, placement: &Placement) -> bool {
        let tank = Tank::new(
            placement.id.clone(),
            TilePos::new(placement.x, placement.y),
            self.pixel_of(placement.x, placement.y),
            placement.direction,
        );
        spawn_into(&mut self.registry.enemies, &placement.id, tank)
    }

    pub fn move_enemy(&mut self, placement: &Placement) -> bool {
        let pixel = self.pixel_of(placement.x, placement.y);
        move_within(&mut self.registry.enemies, placement, pixel)
    }

    pub fn destroy_enemy(&mut self, id: &EntityId, now: Millis) -> bool {
        self.destroy_tank(EntityKind::Enemy, id, now)
    }

    fn destroy_tank(&mut self, kind: EntityKind, id: &EntityId, now: Millis) -> bool {
        let removed = match self.registry.tanks_mut(kind) {
            Some(tanks) => tanks.remove(id),
            None => None,
        };
        let Some(tank) = removed else {
            debug!("Destroy for unknown {} {} ignored", kind, id);
            return false;
        };

        let cancelled = self
            .scheduler
            .cancel_owned_by(&EntityKey::new(kind, id.clone()));
        if cancelled > 0 {
            debug!("Cancelled {} pending task(s) of {} {}", cancelled, kind, id);
        }
        if tank.local {
            info!("Local tank destroyed");
        }

        self.leave_effect(EffectKind::Explosion, tank.pixel, now);
        true
    }

    /// Tank that fired a bullet. Player ids take precedence over enemy ids.
    fn owner_mut(&mut self, owner: &EntityId) -> Option<&mut Tank> {
        if self.registry.players.contains(owner) {
            self.registry.players.get_mut(owner)
        } else {
            self.registry.enemies.get_mut(owner)
        }
    }

    pub fn spawn_bullet(&mut self, placement: &Placement) -> bool {
        let bullet = Bullet {
            id: placement.id.clone(),
            tile: TilePos::new(placement.x, placement.y),
            pixel: self.pixel_of(placement.x, placement.y),
            facing: placement.direction,
            owner: placement.owner_id.clone(),
        };
        if !spawn_into(&mut self.registry.bullets, &placement.id, bullet) {
            return false;
        }

        if let Some(owner) = &placement.owner_id {
            if let Some(tank) = self.owner_mut(owner) {
                tank.active_bullets = (tank.active_bullets + 1).min(tank.max_bullets);
            }
        }
        true
    }

    /// Creates the bullet on first sight, otherwise moves it.
    pub fn move_bullet(&mut self, placement: &Placement) -> bool {
        if !self.registry.bullets.contains(&placement.id) {
            return self.spawn_bullet(placement);
        }
        let pixel = self.pixel_of(placement.x, placement.y);
        move_within(&mut self.registry.bullets, placement, pixel)
    }

    pub fn destroy_bullet(&mut self, id: &EntityId, now: Millis) -> bool {
        let Some(bullet) = self.registry.bullets.remove(id) else {
            debug!("Destroy for unknown bullet {} ignored", id);
            return false;
        };

        if let Some(owner) = &bullet.owner {
            if let Some(tank) = self.owner_mut(owner) {
                tank.active_bullets = tank.active_bullets.saturating_sub(1);
            }
        }

        self.leave_effect(EffectKind::Impact, bullet.pixel, now);
        true
    }

    pub fn spawn_bonus(&mut self, placement: &BonusPlacement) -> bool {
        let bonus = Bonus {
            id: placement.id.clone(),
            tile: TilePos::new(placement.x, placement.y),
            pixel: self.pixel_of(placement.x, placement.y),
            bonus_type: placement.bonus_type,
        };
        spawn_into(&mut self.registry.bonuses, &placement.id, bonus)
    }

    pub fn remove_bonus(&mut self, id: &EntityId) -> bool {
        if self.registry.bonuses.remove(id).is_none() {
            debug!("Removal of unknown bonus {} ignored", id);
            return false;
        }
        true
    }

    /// Removes the bonus and grants its effect to the collecting player.
    ///
    /// The effect is only granted when the bonus was still present, which
    /// keeps a redelivered collection from granting it twice.
    pub fn collect_bonus(&mut self, id: &EntityId, player: &EntityId, now: Millis) -> bool {
        let Some(bonus) = self.registry.bonuses.remove(id) else {
            debug!("Collection of unknown bonus {} ignored", id);
            return false;
        };
        info!("Player {} collected {:?}", player, bonus.bonus_type);
        self.grant_bonus(player, bonus.bonus_type, now);
        true
    }

    fn grant_bonus(&mut self, player: &EntityId, bonus: BonusType, now: Millis) {
        let Some(tank) = self.registry.players.get_mut(player) else {
            debug!("Bonus for unknown player {} dropped", player);
            return;
        };

        if !bonus.is_timed() {
            tank.apply_bonus(bonus);
            return;
        }

        // A second pickup of a running effect only extends it.
        match tank.timed_bonuses.remove(&bonus) {
            Some(previous) => {
                self.scheduler.cancel(previous);
            }
            None => tank.apply_bonus(bonus),
        }

        let task = self.scheduler.schedule_owned(
            now + self.timings.bonus_duration,
            EntityKey::new(EntityKind::Player, player.clone()),
            Task::RevertBonus {
                player: player.clone(),
                bonus,
            },
        );
        tank.timed_bonuses.insert(bonus, task);
    }

    /// Rewrites one terrain cell. A destroyed brick only comes back through
    /// another explicit tile update.
    pub fn update_tile(&mut self, update: &TileUpdate) -> bool {
        let Some(grid) = self.grid.as_mut() else {
            warn!("Tile update before level load ignored");
            return false;
        };
        match grid.apply_update(update.x, update.y, update.tile) {
            Ok(_) => true,
            Err(e) => {
                warn!("Tile update ignored: {}", e);
                false
            }
        }
    }

    pub fn explode_at(&mut self, at: &ExplosionAt, now: Millis) -> bool {
        let position = self.pixel_of(at.x, at.y);
        self.leave_effect(EffectKind::Explosion, position, now);
        true
    }

    /// Applies one tank or bullet action from a batch.
    pub fn apply_lifecycle(&mut self, kind: EntityKind, event: &LifecycleEvent, now: Millis) -> bool {
        match (kind, event) {
            (EntityKind::Player, LifecycleEvent::Spawn(p)) => self.spawn_player(p),
            (EntityKind::Player, LifecycleEvent::Move(p)) => self.move_player(p),
            (EntityKind::Player, LifecycleEvent::Destroy(t)) => self.destroy_player(&t.id, now),
            (EntityKind::Enemy, LifecycleEvent::Spawn(p)) => self.spawn_enemy(p),
            (EntityKind::Enemy, LifecycleEvent::Move(p)) => self.move_enemy(p),
            (EntityKind::Enemy, LifecycleEvent::Destroy(t)) => self.destroy_enemy(&t.id, now),
            (EntityKind::Bullet, LifecycleEvent::Spawn(p)) => self.spawn_bullet(p),
            (EntityKind::Bullet, LifecycleEvent::Move(p)) => self.move_bullet(p),
            (EntityKind::Bullet, LifecycleEvent::Destroy(t)) => self.destroy_bullet(&t.id, now),
            (EntityKind::Bonus, _) => {
                warn!("Bonus entries use their own event type");
                false
            }
        }
    }

    pub fn apply_bonus_event(&mut self, event: &BonusEvent, now: Millis) -> bool {
        match event {
            BonusEvent::Spawn(placement) => self.spawn_bonus(placement),
            BonusEvent::Remove(removal) => self.apply_bonus_removal(removal, now),
            BonusEvent::Collect(BonusRemoval {
                id,
                player_id: Some(player),
            }) => self.collect_bonus(id, player, now),
            BonusEvent::Collect(BonusRemoval { id, player_id: None }) => {
                warn!("Collection of bonus {} names no player", id);
                self.remove_bonus(id)
            }
        }
    }

    /// A removal naming a player is a collection.
    pub fn apply_bonus_removal(&mut self, removal: &BonusRemoval, now: Millis) -> bool {
        match &removal.player_id {
            Some(player) => self.collect_bonus(&removal.id, player, now),
            None => self.remove_bonus(&removal.id),
        }
    }

    /// Applies a batched tick in the canonical kind order.
    pub fn apply_tick(&mut self, tick: &GameTick, now: Millis) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        for event in &tick.player_events {
            outcome.record(self.apply_lifecycle(EntityKind::Player, event, now));
        }
        for event in &tick.bullets {
            outcome.record(self.apply_lifecycle(EntityKind::Bullet, event, now));
        }
        for event in &tick.bonuses {
            outcome.record(self.apply_bonus_event(event, now));
        }
        for update in &tick.tiles {
            outcome.record(self.update_tile(update));
        }
        for explosion in &tick.explosions {
            outcome.record(self.explode_at(explosion, now));
        }
        for event in &tick.enemy_events {
            outcome.record(self.apply_lifecycle(EntityKind::Enemy, event, now));
        }

        outcome
    }

    /// Runs every task due at `now`. Returns how many found their target.
    pub fn run_due_tasks(&mut self, now: Millis) -> usize {
        let mut ran = 0;
        for (id, task) in self.scheduler.take_due(now) {
            match task {
                Task::ExpireEffect(effect) => {
                    if self.effects.expire(effect) {
                        ran += 1;
                    }
                }
                Task::RevertBonus { player, bonus } => {
                    match self.registry.players.get_mut(&player) {
                        Some(tank) if tank.timed_bonuses.get(&bonus) == Some(&id) => {
                            tank.timed_bonuses.remove(&bonus);
                            tank.revert_bonus(bonus);
                            debug!("{:?} expired on player {}", bonus, player);
                            ran += 1;
                        }
                        _ => debug!("{:?} expiry for player {} found nothing", bonus, player),
                    }
                }
            }
        }
        ran
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(Timings::default())
    }
}
