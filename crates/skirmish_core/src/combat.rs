//! Combat resolution.
//!
//! Four attack variants share one cooldown gate:
//!
//! - **Melee contact**: damage lands on the single target immediately.
//! - **Melee with knockback**: a two-phase swing. At the expand peak every
//!   enemy within reach takes damage and is pushed out to
//!   `range + knockback_margin`, sliding there over `push_time`.
//! - **Ranged**: homing projectiles carry the damage; extra volley shots
//!   follow after `volley_delay`.
//! - **Ranged with environmental debuff**: range and damage are scaled by
//!   the current [`Environment`] at the instant of firing.
//!
//! Attack starts for one agent are always at least `cooldown` apart. A
//! trigger inside the window does nothing, which makes repeated triggers
//! idempotent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agent::AgentState;
use crate::components::AgentId;
use crate::events::SimEvent;
use crate::factions::Faction;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::profile::{BehaviorProfile, Knockback, MeleeProfile, RangedProfile};
use crate::scheduler::{slide_position, Continuation, Scheduled};
use crate::simulation::{Simulation, TickPhase};
use crate::spatial::SpatialQuery;
use crate::targeting::is_hostile_target;

/// Externally controlled battlefield condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Environment {
    /// Normal conditions.
    #[default]
    Day,
    /// Debuffed ranged units fire shorter and weaker.
    Night,
}

/// A homing projectile in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Projectile {
    /// Projectile id.
    pub id: u64,
    /// Shooter.
    pub source: AgentId,
    /// Shooter's faction at the time of firing.
    pub faction: Option<Faction>,
    /// Homing target.
    pub target: AgentId,
    /// Current ground position.
    pub position: Vec2Fixed,
    /// Ground speed in units per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Damage applied on impact.
    pub damage: u32,
    /// Tick the projectile was fired. It starts moving on the following tick.
    pub fired_at: u64,
}

/// Projectiles in flight, iterated in id order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectileStore {
    projectiles: BTreeMap<u64, Projectile>,
    next_id: u64,
}

impl ProjectileStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a projectile, assigning its id.
    pub fn insert(&mut self, mut projectile: Projectile) -> u64 {
        self.next_id += 1;
        projectile.id = self.next_id;
        self.projectiles.insert(projectile.id, projectile);
        projectile.id
    }

    /// Get a projectile by id.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&Projectile> {
        self.projectiles.get(&id)
    }

    /// Iterate in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.values()
    }

    /// Number of projectiles in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    /// Check whether nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    fn ids(&self) -> Vec<u64> {
        self.projectiles.keys().copied().collect()
    }

    fn get_mut(&mut self, id: u64) -> Option<&mut Projectile> {
        self.projectiles.get_mut(&id)
    }

    fn remove(&mut self, id: u64) -> Option<Projectile> {
        self.projectiles.remove(&id)
    }
}

impl Simulation {
    /// Combat phase: move projectiles, run due swing/volley/slide
    /// continuations, then start attacks for every agent in `Attacking`.
    pub(crate) fn run_combat_phase(&mut self) {
        self.advance_projectiles();

        for entry in self.scheduler.take_due(TickPhase::Combat, self.tick) {
            self.run_combat_continuation(entry);
        }

        for id in self.agents.sorted_ids() {
            if let Some(AgentState::Attacking { target }) = self.agents.get(id).map(|a| a.state) {
                self.start_attack(id, target);
            }
        }
    }

    /// Try to start an attack against the agent's current target.
    ///
    /// Returns `true` if an attack resolution began. Returns `false` when
    /// there is no valid target in range or the cooldown has not elapsed;
    /// calling this again inside the cooldown window changes nothing.
    pub fn trigger_attack(&mut self, attacker: AgentId) -> bool {
        let target = self.agents.get(attacker).and_then(|agent| match agent.state {
            AgentState::Attacking { target } => Some(target),
            _ => agent.lock.map(|lock| lock.target),
        });
        match target {
            Some(target) => self.start_attack(attacker, target),
            None => false,
        }
    }

    /// Check whether `target` is something `attacker` may hit.
    pub(crate) fn is_valid_target(&self, attacker: AgentId, target: AgentId) -> bool {
        match (self.agents.get(attacker), self.agents.get(target)) {
            (Some(attacker), Some(target)) => is_hostile_target(attacker, target),
            _ => false,
        }
    }

    fn start_attack(&mut self, attacker: AgentId, target: AgentId) -> bool {
        if !self.is_valid_target(attacker, target) {
            return false;
        }
        let Some(agent) = self.agents.get(attacker) else {
            return false;
        };
        if !agent.is_alive() {
            return false;
        }
        let Some(target_agent) = self.agents.get(target) else {
            return false;
        };
        let Some(range) = agent.profile.attack_range(self.environment) else {
            return false;
        };
        if !agent.within_reach(target_agent, range) {
            return false;
        }
        let Some(cooldown) = agent.profile.cooldown() else {
            return false;
        };
        if let Some(last) = agent.last_attack_tick {
            if self.tick.saturating_sub(last) < self.ticks_at_least(cooldown).max(1) {
                tracing::trace!(attacker, tick = self.tick, "Attack still cooling down");
                return false;
            }
        }

        let profile = agent.profile;
        if let Some(agent) = self.agents.get_mut(attacker) {
            agent.last_attack_tick = Some(self.tick);
        }
        self.emit(SimEvent::AttackStarted { attacker, target });
        tracing::debug!(attacker, target, tick = self.tick, "Attack started");

        match profile {
            BehaviorProfile::Melee(MeleeProfile {
                knockback: Some(knockback),
                ..
            }) => self.start_swing(attacker, knockback),
            BehaviorProfile::Melee(melee) => {
                self.apply_damage(attacker, target, melee.damage);
            }
            BehaviorProfile::Ranged(ranged) => self.start_volley(attacker, target, &ranged),
            _ => {}
        }
        true
    }

    fn start_swing(&mut self, attacker: AgentId, knockback: Knockback) {
        let peak = self.ticks_for(knockback.expand_time);
        let end = self.ticks_for(knockback.expand_time + knockback.shrink_time).max(peak);

        if peak == 0 {
            self.resolve_swing_peak(attacker);
        } else {
            self.scheduler
                .schedule(attacker, self.tick + peak, Continuation::SwingPeak);
        }
        if end == 0 {
            self.emit(SimEvent::SwingFinished { attacker });
        } else {
            self.scheduler
                .schedule(attacker, self.tick + end, Continuation::SwingEnd);
        }
    }

    fn start_volley(&mut self, attacker: AgentId, target: AgentId, ranged: &RangedProfile) {
        self.fire_projectile(attacker, target);
        for shot in 1..ranged.projectile_count {
            let delay = ranged.volley_delay * Fixed::from_num(shot);
            let due = self.tick + self.ticks_for(delay);
            if due == self.tick {
                self.fire_projectile(attacker, target);
            } else {
                self.scheduler
                    .schedule(attacker, due, Continuation::VolleyShot { target });
            }
        }
    }

    fn fire_projectile(&mut self, attacker: AgentId, target: AgentId) {
        let Some(agent) = self.agents.get(attacker) else {
            return;
        };
        let BehaviorProfile::Ranged(ranged) = agent.profile else {
            return;
        };
        let projectile = Projectile {
            id: 0,
            source: attacker,
            faction: agent.faction,
            target,
            position: agent.position,
            speed: ranged.projectile_speed,
            damage: ranged.effective_damage(self.environment),
            fired_at: self.tick,
        };
        let id = self.projectiles.insert(projectile);
        self.emit(SimEvent::ProjectileSpawned {
            projectile: id,
            source: attacker,
            target,
        });
    }

    fn advance_projectiles(&mut self) {
        let dt = self.dt();
        let epsilon = self.config.projectile_arrival_epsilon;

        for id in self.projectiles.ids() {
            let Some(projectile) = self.projectiles.get(id).copied() else {
                continue;
            };
            // Newly fired projectiles wait for the next tick
            if projectile.fired_at >= self.tick {
                continue;
            }

            let Some(target_position) = self
                .agents
                .get(projectile.target)
                .filter(|target| target.is_damageable())
                .map(|target| target.position)
            else {
                self.projectiles.remove(id);
                self.emit(SimEvent::ProjectileFizzled { projectile: id });
                tracing::debug!(projectile = id, "Projectile target gone, fizzled");
                continue;
            };

            let step = projectile.speed * dt;
            let offset = target_position - projectile.position;
            let distance = offset.length();
            let position = if distance <= step {
                target_position
            } else {
                projectile.position + offset.normalize().scale(step)
            };

            if position.distance(target_position) <= epsilon {
                self.projectiles.remove(id);
                self.emit(SimEvent::ProjectileHit {
                    projectile: id,
                    target: projectile.target,
                });
                self.apply_damage(projectile.source, projectile.target, projectile.damage);
            } else if let Some(stored) = self.projectiles.get_mut(id) {
                stored.position = position;
            }
        }
    }

    fn run_combat_continuation(&mut self, entry: Scheduled) {
        let owner = entry.owner;
        match entry.continuation {
            Continuation::SwingPeak => self.resolve_swing_peak(owner),
            Continuation::SwingEnd => {
                if self.agents.contains(owner) {
                    self.emit(SimEvent::SwingFinished { attacker: owner });
                }
            }
            Continuation::VolleyShot { target } => {
                if self.is_valid_target(owner, target) {
                    self.fire_projectile(owner, target);
                }
            }
            Continuation::KnockbackSlide {
                from,
                to,
                started,
                duration,
            } => {
                let position = slide_position(from, to, started, duration, self.tick);
                if let Some(agent) = self.agents.get_mut(owner) {
                    agent.position = position;
                }
                if self.tick < started + duration {
                    self.scheduler.schedule(owner, self.tick + 1, entry.continuation);
                }
            }
            Continuation::GatherCollect { .. } | Continuation::HideHealthBar => {}
        }
    }

    /// Damage and push every enemy within reach of a knockback swing.
    fn resolve_swing_peak(&mut self, attacker: AgentId) {
        let Some(agent) = self.agents.get(attacker).filter(|agent| agent.is_alive()) else {
            return;
        };
        let BehaviorProfile::Melee(MeleeProfile {
            range,
            damage,
            knockback: Some(knockback),
            ..
        }) = agent.profile
        else {
            return;
        };
        let origin = agent.position;
        let reach = agent.effective_reach(range);
        let push_distance = range + self.config.knockback_margin;
        let push_ticks = self.ticks_for(knockback.push_time);
        let fallback = self.config.collision_fallback.normalize_or(Vec2Fixed::UNIT_X);

        let struck: Vec<AgentId> = self
            .agents
            .query_circle(origin, reach)
            .into_iter()
            .filter(|&id| self.is_valid_target(attacker, id))
            .collect();

        for target in struck {
            self.apply_damage(attacker, target, damage);

            let Some(victim) = self
                .agents
                .get(target)
                .filter(|victim| victim.is_alive() && victim.is_mobile())
            else {
                continue;
            };
            let from = victim.position;
            if from.distance(origin) >= push_distance {
                continue;
            }
            let direction = (from - origin).normalize_or(fallback);
            let to = origin + direction.scale(push_distance);

            self.scheduler.cancel_where(target, |continuation| {
                matches!(continuation, Continuation::KnockbackSlide { .. })
            });
            if push_ticks == 0 {
                if let Some(victim) = self.agents.get_mut(target) {
                    victim.position = to;
                }
            } else {
                self.scheduler.schedule(
                    target,
                    self.tick + 1,
                    Continuation::KnockbackSlide {
                        from,
                        to,
                        started: self.tick,
                        duration: push_ticks,
                    },
                );
            }
            self.emit(SimEvent::KnockedBack {
                attacker,
                target,
                to,
            });
        }
    }

    /// Apply combat damage, returning what was actually removed.
    pub(crate) fn apply_damage(&mut self, attacker: AgentId, target: AgentId, amount: u32) -> u32 {
        let Some(victim) = self
            .agents
            .get_mut(target)
            .filter(|victim| victim.is_damageable())
        else {
            return 0;
        };
        let Some(health) = victim.health.as_mut() else {
            return 0;
        };
        let dealt = health.apply_damage(amount);
        let (current, max) = (health.current, health.max);

        self.emit(SimEvent::DamageDealt {
            attacker,
            target,
            amount: dealt,
        });
        if dealt > 0 {
            self.on_health_changed(target, current, max);
        }
        tracing::debug!(attacker, target, dealt, remaining = current, "Damage applied");
        dealt
    }
}
