//! Scheduled continuations.
//!
//! Timed behavior (swing phases, knockback slides, volley shots, gather
//! intervals, health-bar auto-hide) is expressed as data: a [`Continuation`]
//! due at a tick, owned by an agent. Continuations are cancelled by owner
//! id when the owner's intent is superseded or the owner retires, so a
//! stale timer can never act on a reassigned agent.

use serde::{Deserialize, Serialize};

use crate::components::AgentId;
use crate::math::{Fixed, Vec2Fixed};
use crate::simulation::TickPhase;

/// A deferred piece of behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Continuation {
    /// Periodic resource collection by a gathering worker.
    GatherCollect {
        /// Node being gathered.
        node: AgentId,
    },
    /// Expand peak of a knockback swing, where damage and push-back land.
    SwingPeak,
    /// End of the shrink phase of a knockback swing.
    SwingEnd,
    /// A delayed shot of a ranged volley.
    VolleyShot {
        /// Target picked when the volley started.
        target: AgentId,
    },
    /// One step of a knockback slide applied to the pushed agent.
    KnockbackSlide {
        /// Position when the push started.
        from: Vec2Fixed,
        /// Final pushed position.
        to: Vec2Fixed,
        /// Tick the push started.
        started: u64,
        /// Slide length in ticks.
        duration: u64,
    },
    /// Hide the owner's health bar after it lingered.
    HideHealthBar,
}

impl Continuation {
    /// Tick phase in which this continuation runs.
    #[must_use]
    pub const fn phase(&self) -> TickPhase {
        match self {
            Self::GatherCollect { .. } | Self::HideHealthBar => TickPhase::Behavior,
            Self::SwingPeak
            | Self::SwingEnd
            | Self::VolleyShot { .. }
            | Self::KnockbackSlide { .. } => TickPhase::Combat,
        }
    }

    /// Whether a new command for the owner cancels this continuation.
    ///
    /// Slides and health-bar timers describe what is happening *to* the
    /// agent and outlive a change of orders.
    #[must_use]
    pub const fn is_intent_bound(&self) -> bool {
        matches!(
            self,
            Self::GatherCollect { .. } | Self::SwingPeak | Self::SwingEnd | Self::VolleyShot { .. }
        )
    }
}

/// A continuation waiting in the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scheduled {
    /// Insertion sequence number, used to order entries due on the same tick.
    pub seq: u64,
    /// Agent the continuation belongs to.
    pub owner: AgentId,
    /// Tick at which it becomes due.
    pub due: u64,
    /// What to do.
    pub continuation: Continuation,
}

/// Queue of pending continuations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scheduler {
    next_seq: u64,
    entries: Vec<Scheduled>,
}

impl Scheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `continuation` for `owner` at tick `due`. Returns its sequence number.
    pub fn schedule(&mut self, owner: AgentId, due: u64, continuation: Continuation) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Scheduled {
            seq,
            owner,
            due,
            continuation,
        });
        seq
    }

    /// Drop everything owned by `owner`. Returns how many entries were removed.
    pub fn cancel_owner(&mut self, owner: AgentId) -> usize {
        self.cancel_where(owner, |_| true)
    }

    /// Drop the owner's intent-bound continuations.
    pub fn cancel_intent(&mut self, owner: AgentId) -> usize {
        self.cancel_where(owner, Continuation::is_intent_bound)
    }

    /// Drop the owner's continuations matching `predicate`.
    pub fn cancel_where(
        &mut self,
        owner: AgentId,
        predicate: impl Fn(&Continuation) -> bool,
    ) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|entry| entry.owner != owner || !predicate(&entry.continuation));
        before - self.entries.len()
    }

    /// Remove and return every entry for `phase` due at or before `now`,
    /// ordered by due tick then insertion.
    pub fn take_due(&mut self, phase: TickPhase, now: u64) -> Vec<Scheduled> {
        let mut due = Vec::new();
        self.entries.retain(|entry| {
            if entry.due <= now && entry.continuation.phase() == phase {
                due.push(*entry);
                false
            } else {
                true
            }
        });
        due.sort_unstable_by_key(|entry| (entry.due, entry.seq));
        due
    }

    /// Check whether a specific entry is still pending.
    #[must_use]
    pub fn is_pending(&self, seq: u64) -> bool {
        self.entries.iter().any(|entry| entry.seq == seq)
    }

    /// Pending entries owned by `owner`.
    pub fn pending_for(&self, owner: AgentId) -> impl Iterator<Item = &Scheduled> {
        self.entries.iter().filter(move |entry| entry.owner == owner)
    }

    /// Number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending entries in insertion order, for hashing.
    pub(crate) fn entries(&self) -> &[Scheduled] {
        &self.entries
    }
}

/// Interpolated position of a knockback slide at tick `now`.
#[must_use]
pub fn slide_position(
    from: Vec2Fixed,
    to: Vec2Fixed,
    started: u64,
    duration: u64,
    now: u64,
) -> Vec2Fixed {
    if duration == 0 || now >= started + duration {
        return to;
    }
    let elapsed = now.saturating_sub(started);
    let t = Fixed::from_num(elapsed) / Fixed::from_num(duration);
    from.lerp(to, t)
}
