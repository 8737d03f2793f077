//! Component definitions attached to agents.
//!
//! Components are pure data with little behavior. An [`Agent`](crate::agent::Agent)
//! is composed of these plus its behavior profile.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::economy::ResourceKind;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Unique identifier for agents, assigned in registration order.
pub type AgentId = u64;

/// Health component.
///
/// `current` is always within `[0, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Create new health component at full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Check if the agent is dead (health == 0).
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Check if the agent is at full health.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.current >= self.max
    }

    /// Apply damage, returning actual damage dealt.
    /// Uses saturating subtraction to prevent underflow.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.current);
        self.current = self.current.saturating_sub(actual);
        actual
    }

    /// Heal, returning the amount actually restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let headroom = self.max.saturating_sub(self.current);
        let actual = amount.min(headroom);
        self.current = self.current.saturating_add(actual);
        actual
    }

    /// Drive health from a construction progress ratio.
    ///
    /// Health becomes `max(1, progress * max)`, with progress clamped to
    /// `[0, 1]`. Returns `true` if the value changed.
    pub fn set_from_progress(&mut self, progress: Fixed) -> bool {
        let progress = progress.clamp(Fixed::ZERO, Fixed::ONE);
        let scaled = (progress * Fixed::from_num(self.max)).to_num::<u32>();
        let next = scaled.clamp(1.min(self.max), self.max);
        let changed = next != self.current;
        self.current = next;
        changed
    }
}

/// Locomotion parameters. Agents without mobility never move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mobility {
    /// Ground speed in units per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Turn rate; facing interpolates by `rotation_speed * dt` per tick.
    #[serde(with = "fixed_serde")]
    pub rotation_speed: Fixed,
}

/// A player-issued order.
///
/// A command with no target is a plain move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command {
    /// Ground destination.
    pub destination: Vec2Fixed,
    /// Agent the order is aimed at, if the click landed on one.
    pub target: Option<AgentId>,
    /// Tick at which the order was issued.
    pub issued_at: u64,
}

impl Command {
    /// Create a plain move order.
    #[must_use]
    pub const fn move_to(destination: Vec2Fixed, issued_at: u64) -> Self {
        Self {
            destination,
            target: None,
            issued_at,
        }
    }

    /// Check whether this is a plain move with no target.
    #[must_use]
    pub const fn is_plain_move(&self) -> bool {
        self.target.is_none()
    }
}

/// The target an offensive agent is locked onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetLock {
    /// Locked target.
    pub target: AgentId,
    /// Set when the lock came from a player command rather than acquisition.
    pub explicit: bool,
}

/// Resources a worker is carrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cargo {
    /// Kind of resource carried, `None` while empty.
    pub kind: Option<ResourceKind>,
    /// Amount carried.
    pub amount: u32,
    /// Node the load was taken from, used to return after delivery.
    pub source: Option<AgentId>,
}

impl Cargo {
    /// Check whether the worker carries nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.amount == 0
    }

    /// Remaining room for a worker with the given capacity.
    #[must_use]
    pub const fn free_capacity(&self, capacity: u32) -> u32 {
        capacity.saturating_sub(self.amount)
    }

    /// Empty the load, returning what was carried.
    pub fn take(&mut self) -> Option<(ResourceKind, u32)> {
        let kind = self.kind.take()?;
        let amount = std::mem::take(&mut self.amount);
        (amount > 0).then_some((kind, amount))
    }
}

/// Construction state of a building that is not yet complete.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Construction {
    /// Completion ratio in `[0, 1]`.
    #[serde(with = "fixed_serde")]
    pub progress: Fixed,
    /// Seconds a single unit of build power needs to finish the site.
    #[serde(with = "fixed_serde")]
    pub build_time: Fixed,
    /// Workers currently assigned to the site.
    pub builders: BTreeSet<AgentId>,
}

impl Construction {
    /// Create a fresh site at zero progress.
    #[must_use]
    pub fn new(build_time: Fixed) -> Self {
        Self {
            progress: Fixed::ZERO,
            build_time,
            builders: BTreeSet::new(),
        }
    }

    /// Check whether the site is finished.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.progress >= Fixed::ONE
    }

    /// Add progress for one worker's tick of effort, clamping at one.
    pub fn advance(&mut self, build_power: Fixed, dt: Fixed) {
        let step = if self.build_time > Fixed::ZERO {
            build_power * dt / self.build_time
        } else {
            Fixed::ONE
        };
        self.progress = (self.progress + step).min(Fixed::ONE);
    }
}
