//! Fire-and-forget visual effects (explosions, bullet impacts)
//!
//! Effects have no server identity. They get a local id only so that their
//! expiry task can find them again.

use crate::coords::PixelPos;
use crate::scheduler::Millis;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Tank wreck or server-reported blast.
    Explosion,
    /// Bullet removed from play.
    Impact,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Effect {
    pub kind: EffectKind,
    pub position: PixelPos,
    pub started_at: Millis,
}

impl Effect {
    /// Animation progress in `[0, 1]` for an effect lasting `duration`.
    pub fn progress(&self, now: Millis, duration: Millis) -> f32 {
        if duration == 0 {
            return 1.0;
        }
        (now.saturating_sub(self.started_at) as f32 / duration as f32).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Effects {
    next_id: u64,
    active: BTreeMap<EffectId, Effect>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, kind: EffectKind, position: PixelPos, now: Millis) -> EffectId {
        self.next_id += 1;
        let id = EffectId(self.next_id);
        self.active.insert(
            id,
            Effect {
                kind,
                position,
                started_at: now,
            },
        );
        id
    }

    /// Returns false when the effect was already cleared.
    pub fn expire(&mut self, id: EffectId) -> bool {
        self.active.remove(&id).is_some()
    }

    pub fn get(&self, id: EffectId) -> Option<&Effect> {
        self.active.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.active.values()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}
