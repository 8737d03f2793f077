//! Behavior profiles.
//!
//! Every agent carries exactly one [`BehaviorProfile`]. The variant decides
//! which branch of the behavior driver runs for it each tick; the payload
//! holds the tuning numbers for that branch.

use serde::{Deserialize, Serialize};

use crate::combat::Environment;
use crate::economy::ResourceKind;
use crate::math::{fixed_decimal, Fixed};

/// Area push-back performed by a two-phase melee swing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Knockback {
    /// Seconds from swing start to the expand peak, where damage lands.
    #[serde(with = "fixed_decimal")]
    pub expand_time: Fixed,
    /// Seconds from the peak until the swing has fully retracted.
    #[serde(with = "fixed_decimal")]
    pub shrink_time: Fixed,
    /// Seconds over which a struck enemy slides to its pushed position.
    #[serde(with = "fixed_decimal")]
    pub push_time: Fixed,
}

/// Close-quarters attacker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeleeProfile {
    /// Reach, measured from the attacker's centre to the target's edge.
    #[serde(with = "fixed_decimal")]
    pub range: Fixed,
    /// Minimum seconds between attack starts.
    #[serde(with = "fixed_decimal")]
    pub cooldown: Fixed,
    /// Damage per hit.
    pub damage: u32,
    /// Radius within which enemies are noticed.
    #[serde(with = "fixed_decimal")]
    pub sensing_range: Fixed,
    /// Present for the area-knockback variant.
    #[serde(default)]
    pub knockback: Option<Knockback>,
}

/// Range and damage scaling applied while the environment is hostile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentalDebuff {
    /// Multiplier on attack range.
    #[serde(with = "fixed_decimal")]
    pub range_factor: Fixed,
    /// Multiplier on damage, rounded down.
    #[serde(with = "fixed_decimal")]
    pub damage_factor: Fixed,
}

/// Projectile attacker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangedProfile {
    /// Firing range, measured from the attacker's centre to the target's edge.
    #[serde(with = "fixed_decimal")]
    pub range: Fixed,
    /// Minimum seconds between attack starts.
    #[serde(with = "fixed_decimal")]
    pub cooldown: Fixed,
    /// Damage per projectile.
    pub damage: u32,
    /// Radius within which enemies are noticed.
    #[serde(with = "fixed_decimal")]
    pub sensing_range: Fixed,
    /// Projectiles per attack. Values above one make a volley.
    #[serde(default = "default_projectile_count")]
    pub projectile_count: u32,
    /// Seconds between successive volley shots.
    #[serde(with = "fixed_decimal", default)]
    pub volley_delay: Fixed,
    /// Projectile ground speed in units per second.
    #[serde(with = "fixed_decimal")]
    pub projectile_speed: Fixed,
    /// Present for the environment-sensitive variant.
    #[serde(default)]
    pub environmental_debuff: Option<EnvironmentalDebuff>,
}

fn default_projectile_count() -> u32 {
    1
}

impl RangedProfile {
    /// Firing range under the given environment.
    #[must_use]
    pub fn effective_range(&self, environment: Environment) -> Fixed {
        match (self.environmental_debuff, environment) {
            (Some(debuff), Environment::Night) => self.range * debuff.range_factor,
            _ => self.range,
        }
    }

    /// Damage per projectile under the given environment.
    #[must_use]
    pub fn effective_damage(&self, environment: Environment) -> u32 {
        match (self.environmental_debuff, environment) {
            (Some(debuff), Environment::Night) => {
                (Fixed::from_num(self.damage) * debuff.damage_factor)
                    .saturating_to_num::<u32>()
            }
            _ => self.damage,
        }
    }
}

/// Gatherer and builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerProfile {
    /// Maximum load carried at once.
    pub carry_capacity: u32,
    /// Amount taken per collection.
    pub gather_rate: u32,
    /// Distance from a node or depot edge at which the worker can interact.
    #[serde(with = "fixed_decimal")]
    pub fetch_range: Fixed,
    /// Construction effort contributed per second.
    #[serde(with = "fixed_decimal")]
    pub build_power: Fixed,
}

/// Shared payload of both building variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BuildingProfile {
    /// Whether workers may deliver resources here.
    #[serde(default)]
    pub accepts_deposits: bool,
}

/// A neutral gather target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceNodeProfile {
    /// Resource yielded.
    pub kind: ResourceKind,
    /// Amount left before the node is exhausted.
    pub remaining: u32,
    /// Marked nodes are where idle workers look for more work.
    #[serde(default)]
    pub marked: bool,
}

/// Tagged behavior variant, one per agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorProfile {
    /// Melee attacker, optionally with area knockback.
    Melee(MeleeProfile),
    /// Ranged attacker, optionally with volleys and environmental debuff.
    Ranged(RangedProfile),
    /// Economy worker.
    Worker(WorkerProfile),
    /// Passive building.
    Static(BuildingProfile),
    /// Building that produces units. Commands set its rally point.
    ProductionBuilding(BuildingProfile),
    /// Neutral resource deposit.
    ResourceNode(ResourceNodeProfile),
}

impl BehaviorProfile {
    /// Melee, ranged and worker agents are units; the rest are not.
    #[must_use]
    pub const fn is_unit(&self) -> bool {
        matches!(self, Self::Melee(_) | Self::Ranged(_) | Self::Worker(_))
    }

    /// Check whether this is one of the building variants.
    #[must_use]
    pub const fn is_building(&self) -> bool {
        matches!(self, Self::Static(_) | Self::ProductionBuilding(_))
    }

    /// Check whether this is a resource node.
    #[must_use]
    pub const fn is_resource_node(&self) -> bool {
        matches!(self, Self::ResourceNode(_))
    }

    /// Check whether this agent seeks out and attacks enemies.
    #[must_use]
    pub const fn is_offensive(&self) -> bool {
        matches!(self, Self::Melee(_) | Self::Ranged(_))
    }

    /// Check whether workers can deliver here.
    #[must_use]
    pub const fn is_depot(&self) -> bool {
        match self {
            Self::Static(building) | Self::ProductionBuilding(building) => {
                building.accepts_deposits
            }
            _ => false,
        }
    }

    /// Sensing radius of an offensive profile.
    #[must_use]
    pub fn sensing_range(&self) -> Option<Fixed> {
        match self {
            Self::Melee(melee) => Some(melee.sensing_range),
            Self::Ranged(ranged) => Some(ranged.sensing_range),
            _ => None,
        }
    }

    /// Attack range of an offensive profile under the given environment.
    #[must_use]
    pub fn attack_range(&self, environment: Environment) -> Option<Fixed> {
        match self {
            Self::Melee(melee) => Some(melee.range),
            Self::Ranged(ranged) => Some(ranged.effective_range(environment)),
            _ => None,
        }
    }

    /// Attack cooldown of an offensive profile.
    #[must_use]
    pub fn cooldown(&self) -> Option<Fixed> {
        match self {
            Self::Melee(melee) => Some(melee.cooldown),
            Self::Ranged(ranged) => Some(ranged.cooldown),
            _ => None,
        }
    }

    /// Worker payload, if any.
    #[must_use]
    pub const fn as_worker(&self) -> Option<&WorkerProfile> {
        match self {
            Self::Worker(worker) => Some(worker),
            _ => None,
        }
    }

    /// Resource node payload, if any.
    #[must_use]
    pub const fn as_resource_node(&self) -> Option<&ResourceNodeProfile> {
        match self {
            Self::ResourceNode(node) => Some(node),
            _ => None,
        }
    }

    /// Mutable resource node payload, if any.
    pub fn as_resource_node_mut(&mut self) -> Option<&mut ResourceNodeProfile> {
        match self {
            Self::ResourceNode(node) => Some(node),
            _ => None,
        }
    }
}
