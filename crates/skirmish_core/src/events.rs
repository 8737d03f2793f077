//! Events emitted for presentation, and the visibility observer seam.
//!
//! The core never calls into presentation. It records [`SimEvent`]s, which
//! the host drains once per tick through [`TickEvents`].

use serde::{Deserialize, Serialize};

use crate::combat::Environment;
use crate::components::AgentId;
use crate::economy::ResourceKind;
use crate::factions::Faction;
use crate::math::Vec2Fixed;

/// Something the presentation layer may want to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimEvent {
    /// An agent entered the selection set.
    Selected {
        /// Selected agent.
        agent: AgentId,
    },
    /// An agent left the selection set.
    Deselected {
        /// Deselected agent.
        agent: AgentId,
    },
    /// A second click on the same agent inside the double-click window.
    FocusRequested {
        /// Agent to focus the camera on.
        agent: AgentId,
    },
    /// A command was accepted by an agent.
    CommandIssued {
        /// Commanded agent.
        agent: AgentId,
        /// Ground destination.
        destination: Vec2Fixed,
        /// Clicked target, if any.
        target: Option<AgentId>,
    },
    /// An agent's hit points changed.
    HpChanged {
        /// Affected agent.
        agent: AgentId,
        /// New hit points.
        current: u32,
        /// Maximum hit points.
        max: u32,
    },
    /// A health bar should be shown for an agent.
    HealthBarShown {
        /// Affected agent.
        agent: AgentId,
    },
    /// An agent's health bar lingered long enough and should hide.
    HealthBarHidden {
        /// Affected agent.
        agent: AgentId,
    },
    /// An attack resolution started.
    AttackStarted {
        /// Attacker.
        attacker: AgentId,
        /// Primary target.
        target: AgentId,
    },
    /// A knockback swing finished retracting.
    SwingFinished {
        /// Attacker.
        attacker: AgentId,
    },
    /// Damage was applied.
    DamageDealt {
        /// Attacker.
        attacker: AgentId,
        /// Damaged agent.
        target: AgentId,
        /// Hit points removed.
        amount: u32,
    },
    /// A projectile left its shooter.
    ProjectileSpawned {
        /// Projectile id.
        projectile: u64,
        /// Shooter.
        source: AgentId,
        /// Homing target.
        target: AgentId,
    },
    /// A projectile reached its target.
    ProjectileHit {
        /// Projectile id.
        projectile: u64,
        /// Struck agent.
        target: AgentId,
    },
    /// A projectile's target vanished before impact.
    ProjectileFizzled {
        /// Projectile id.
        projectile: u64,
    },
    /// An agent was shoved by a knockback swing.
    KnockedBack {
        /// Swinging agent.
        attacker: AgentId,
        /// Pushed agent.
        target: AgentId,
        /// Where the push ends.
        to: Vec2Fixed,
    },
    /// A worker collected from a node.
    ResourceGathered {
        /// Worker.
        worker: AgentId,
        /// Node.
        node: AgentId,
        /// Resource kind.
        kind: ResourceKind,
        /// Amount taken.
        amount: u32,
    },
    /// A worker dropped its load at a depot.
    ResourceDeposited {
        /// Worker.
        worker: AgentId,
        /// Depot.
        depot: AgentId,
        /// Credited faction.
        faction: Faction,
        /// Resource kind.
        kind: ResourceKind,
        /// Amount deposited.
        amount: u32,
    },
    /// A resource node ran out.
    NodeDepleted {
        /// Exhausted node.
        node: AgentId,
    },
    /// A building was placed and construction began.
    ConstructionStarted {
        /// New site.
        site: AgentId,
    },
    /// A construction site finished.
    ConstructionCompleted {
        /// Finished building.
        site: AgentId,
    },
    /// An agent was removed from the simulation.
    AgentRetired {
        /// Removed agent.
        agent: AgentId,
    },
    /// The environment changed.
    EnvironmentChanged {
        /// New environment.
        environment: Environment,
    },
}

/// Events generated during a simulation tick.
///
/// Includes anything emitted by dispatcher calls made since the previous tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Tick the events belong to.
    pub tick: u64,
    /// Events in emission order.
    pub events: Vec<SimEvent>,
}

impl TickEvents {
    /// Total damage applied this tick.
    #[must_use]
    pub fn total_damage(&self) -> u64 {
        self.events
            .iter()
            .map(|event| match event {
                SimEvent::DamageDealt { amount, .. } => u64::from(*amount),
                _ => 0,
            })
            .sum()
    }

    /// Agents retired this tick.
    #[must_use]
    pub fn retired(&self) -> Vec<AgentId> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SimEvent::AgentRetired { agent } => Some(*agent),
                _ => None,
            })
            .collect()
    }

    /// Check whether no events were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Fog-of-war style observer.
///
/// Informed of agent movement and retirement; it never influences behavior.
pub trait VisibilityObserver: Send {
    /// An agent ended the tick at a new position.
    fn agent_moved(&mut self, agent: AgentId, faction: Option<Faction>, position: Vec2Fixed);

    /// An agent left the simulation.
    fn agent_retired(&mut self, agent: AgentId);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullVisibility;

impl VisibilityObserver for NullVisibility {
    fn agent_moved(&mut self, _agent: AgentId, _faction: Option<Faction>, _position: Vec2Fixed) {}

    fn agent_retired(&mut self, _agent: AgentId) {}
}
