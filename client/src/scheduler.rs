//! Deferred work driven by the frame clock
//!
//! Transient effects expire and timed power-ups wear off some time after the
//! message that caused them. Those callbacks are queued here instead of on a
//! runtime timer so that they run on the same timeline as message handling
//! and can be cancelled when the entity they belong to goes away. A task
//! that fires after its target is gone must find nothing to do: callers
//! check existence before acting on a [`Task`].

use crate::effects::EffectId;
use crate::registry::EntityKey;
use shared::{BonusType, EntityId};

/// Milliseconds on the session clock.
pub type Millis = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    ExpireEffect(EffectId),
    RevertBonus { player: EntityId, bonus: BonusType },
}

#[derive(Debug, Clone)]
struct Scheduled {
    id: TaskId,
    due: Millis,
    owner: Option<EntityKey>,
    task: Task,
}

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    next_id: u64,
    pending: Vec<Scheduled>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Millis, task: Task) -> TaskId {
        self.push(due, None, task)
    }

    /// Schedules a task that dies with `owner`; see [`Scheduler::cancel_owned_by`].
    pub fn schedule_owned(&mut self, due: Millis, owner: EntityKey, task: Task) -> TaskId {
        self.push(due, Some(owner), task)
    }

    fn push(&mut self, due: Millis, owner: Option<EntityKey>, task: Task) -> TaskId {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        self.pending.push(Scheduled {
            id,
            due,
            owner,
            task,
        });
        id
    }

    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|scheduled| scheduled.id != id);
        self.pending.len() != before
    }

    pub fn cancel_owned_by(&mut self, owner: &EntityKey) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|scheduled| scheduled.owner.as_ref() != Some(owner));
        before - self.pending.len()
    }

    /// Removes and returns every task due at `now`, earliest first.
    ///
    /// Tasks due at the same instant come out in scheduling order.
    pub fn take_due(&mut self, now: Millis) -> Vec<(TaskId, Task)> {
        let (mut due, pending): (Vec<Scheduled>, Vec<Scheduled>) = self
            .pending
            .drain(..)
            .partition(|scheduled| scheduled.due <= now);
        self.pending = pending;

        due.sort_by_key(|scheduled| (scheduled.due, scheduled.id));
        due.into_iter()
            .map(|scheduled| (scheduled.id, scheduled.task))
            .collect()
    }

    pub fn next_due(&self) -> Option<Millis> {
        self.pending.iter().map(|scheduled| scheduled.due).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
