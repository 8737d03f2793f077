//! The agent record and the table that owns every agent.
//!
//! An agent is any simulated unit, building or resource node. Agents are
//! stored in an [`AgentTable`] keyed by [`AgentId`]; ids are handed out in
//! registration order and never reused, which makes "lowest id" a stable
//! tie-breaker everywhere.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::components::{AgentId, Cargo, Command, Construction, Health, Mobility, TargetLock};
use crate::factions::Faction;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::profile::BehaviorProfile;

/// Tolerance on the centre distance collision resolution leaves between
/// two touching circles.
const CONTACT_SLACK: Fixed = Fixed::from_bits(1 << 16);

/// What a moving agent intends to do once it gets there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    /// Plain travel to a point.
    Travel,
    /// Close in on an enemy to attack it.
    Engage(AgentId),
    /// Walk to a resource node to gather.
    Gather(AgentId),
    /// Walk to a depot to drop off cargo.
    Deliver(AgentId),
    /// Walk to a construction site to build.
    Construct(AgentId),
}

impl Intent {
    /// Agent the intent is aimed at, if any.
    #[must_use]
    pub const fn target(&self) -> Option<AgentId> {
        match self {
            Self::Travel => None,
            Self::Engage(id)
            | Self::Gather(id)
            | Self::Deliver(id)
            | Self::Construct(id) => Some(*id),
        }
    }
}

/// Behavior state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AgentState {
    /// Doing nothing.
    #[default]
    Idle,
    /// Walking toward `destination`.
    Moving {
        /// Current ground destination.
        destination: Vec2Fixed,
        /// What happens on arrival.
        intent: Intent,
    },
    /// In range of and attacking `target`.
    Attacking {
        /// Attack target.
        target: AgentId,
    },
    /// Collecting from a resource node.
    Gathering {
        /// Node being gathered from.
        node: AgentId,
    },
    /// Dropping cargo at a depot.
    Delivering {
        /// Receiving depot.
        depot: AgentId,
    },
    /// Working on a construction site.
    Constructing {
        /// Site being built.
        site: AgentId,
    },
}

impl AgentState {
    /// Short label for logs and reports.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Moving { .. } => "moving",
            Self::Attacking { .. } => "attacking",
            Self::Gathering { .. } => "gathering",
            Self::Delivering { .. } => "delivering",
            Self::Constructing { .. } => "constructing",
        }
    }
}

/// A simulated unit, building or resource node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier, assigned at registration.
    pub id: AgentId,
    /// Name of the template this agent was built from.
    pub template: String,
    /// Owning side. Resource nodes have none.
    pub faction: Option<Faction>,
    /// Ground position.
    pub position: Vec2Fixed,
    /// Height above the ground plane, used when picking.
    #[serde(with = "fixed_serde")]
    pub height: Fixed,
    /// Unit heading on the ground plane.
    pub facing: Vec2Fixed,
    /// Collision radius.
    #[serde(with = "fixed_serde")]
    pub radius: Fixed,
    /// Hit points. Agents without health cannot be damaged.
    pub health: Option<Health>,
    /// Locomotion. Agents without mobility are static.
    pub mobility: Option<Mobility>,
    /// Tagged behavior variant.
    pub profile: BehaviorProfile,
    /// Current behavior state.
    pub state: AgentState,
    /// Pending player command.
    pub order: Option<Command>,
    /// Current attack target.
    pub lock: Option<TargetLock>,
    /// Tick at which the last attack started.
    pub last_attack_tick: Option<u64>,
    /// Carried resources (workers only).
    pub cargo: Cargo,
    /// Present while the agent is an unfinished building.
    pub construction: Option<Construction>,
    /// Whether the template names a health-bar anchor.
    pub health_bar: bool,
}

impl Agent {
    /// Create an idle agent with no health, mobility or faction.
    ///
    /// The id is overwritten when the agent is inserted into an [`AgentTable`].
    #[must_use]
    pub fn new(template: impl Into<String>, profile: BehaviorProfile, position: Vec2Fixed) -> Self {
        Self {
            id: 0,
            template: template.into(),
            faction: None,
            position,
            height: Fixed::ZERO,
            facing: Vec2Fixed::UNIT_X,
            radius: Fixed::from_num(0.5),
            health: None,
            mobility: None,
            profile,
            state: AgentState::Idle,
            order: None,
            lock: None,
            last_attack_tick: None,
            cargo: Cargo::default(),
            construction: None,
            health_bar: false,
        }
    }

    /// Set the owning faction.
    #[must_use]
    pub fn with_faction(mut self, faction: Faction) -> Self {
        self.faction = Some(faction);
        self
    }

    /// Give the agent full health.
    #[must_use]
    pub fn with_health(mut self, max: u32) -> Self {
        self.health = Some(Health::new(max));
        self
    }

    /// Give the agent mobility.
    #[must_use]
    pub fn with_mobility(mut self, speed: Fixed, rotation_speed: Fixed) -> Self {
        self.mobility = Some(Mobility {
            speed,
            rotation_speed,
        });
        self
    }

    /// Set the collision radius.
    #[must_use]
    pub fn with_radius(mut self, radius: Fixed) -> Self {
        self.radius = radius;
        self
    }

    /// Set the picking height.
    #[must_use]
    pub fn with_height(mut self, height: Fixed) -> Self {
        self.height = height;
        self
    }

    /// Check whether the agent has health left. Agents without health
    /// count as alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health.map_or(true, |health| !health.is_dead())
    }

    /// Check whether the agent can currently take combat damage.
    #[must_use]
    pub fn is_damageable(&self) -> bool {
        self.health.is_some_and(|health| !health.is_dead()) && self.construction.is_none()
    }

    /// Check whether the agent ever moves on its own.
    #[must_use]
    pub fn is_mobile(&self) -> bool {
        self.mobility.is_some()
    }

    /// Check whether the agent is an unfinished building.
    #[must_use]
    pub fn is_under_construction(&self) -> bool {
        self.construction.is_some()
    }

    /// Distance from `point` to this agent's circle edge, never negative.
    #[must_use]
    pub fn edge_distance_from(&self, point: Vec2Fixed) -> Fixed {
        (self.position.distance(point) - self.radius).max(Fixed::ZERO)
    }

    /// Reach this agent actually has for a nominal `reach`.
    ///
    /// Reach runs from this agent's centre to the target's edge. Collision
    /// keeps touching agents a full radius apart, so a reach shorter than
    /// the agent's own radius is extended to contact.
    #[must_use]
    pub fn effective_reach(&self, reach: Fixed) -> Fixed {
        if reach >= self.radius {
            reach
        } else {
            self.radius + CONTACT_SLACK
        }
    }

    /// Check whether `target` lies within `reach` of this agent.
    #[must_use]
    pub fn within_reach(&self, target: &Self, reach: Fixed) -> bool {
        target.edge_distance_from(self.position) <= self.effective_reach(reach)
    }

    /// Check whether the agent belongs to `faction` and accepts player commands.
    ///
    /// Passive buildings and resource nodes never do.
    #[must_use]
    pub fn accepts_commands_from(&self, faction: Faction) -> bool {
        self.faction == Some(faction)
            && self.is_alive()
            && !matches!(
                self.profile,
                BehaviorProfile::Static(_) | BehaviorProfile::ResourceNode(_)
            )
    }

    /// Check whether a worker of `faction` can drop cargo here.
    #[must_use]
    pub fn is_depot_for(&self, faction: Faction) -> bool {
        self.faction == Some(faction) && self.profile.is_depot() && !self.is_under_construction()
    }

    /// Check whether this is a resource node with something left in it.
    #[must_use]
    pub fn is_gatherable(&self) -> bool {
        self.profile
            .as_resource_node()
            .is_some_and(|node| node.remaining > 0)
    }
}

/// Storage for every agent in the simulation.
///
/// Uses a `HashMap` for O(1) lookup by id, with deterministic iteration via
/// sorted keys when processing phases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentTable {
    agents: HashMap<AgentId, Agent>,
    next_id: AgentId,
}

impl AgentTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register an agent and return its id.
    pub fn insert(&mut self, mut agent: Agent) -> AgentId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        agent.id = id;
        self.agents.insert(id, agent);
        id
    }

    /// Remove an agent by id.
    pub fn remove(&mut self, id: AgentId) -> Option<Agent> {
        self.agents.remove(&id)
    }

    /// Get an agent by id.
    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    /// Get a mutable reference to an agent by id.
    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    /// Check if an agent exists.
    #[must_use]
    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    /// Number of agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Check if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agent ids in ascending order, for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<_> = self.agents.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all agents (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Nearest completed depot owned by `faction`.
    ///
    /// Distance ties go to the lowest id.
    #[must_use]
    pub fn nearest_depot(&self, faction: Faction, position: Vec2Fixed) -> Option<AgentId> {
        self.nearest_matching(position, |agent| agent.is_depot_for(faction))
    }

    /// Nearest marked resource node that still holds resources.
    ///
    /// Distance ties go to the lowest id.
    #[must_use]
    pub fn nearest_marked_gather_target(&self, position: Vec2Fixed) -> Option<AgentId> {
        self.nearest_matching(position, |agent| {
            agent
                .profile
                .as_resource_node()
                .is_some_and(|node| node.marked && node.remaining > 0)
        })
    }

    fn nearest_matching(
        &self,
        position: Vec2Fixed,
        predicate: impl Fn(&Agent) -> bool,
    ) -> Option<AgentId> {
        self.agents
            .values()
            .filter(|agent| predicate(agent))
            .min_by_key(|agent| (agent.position.distance_squared(position).to_bits(), agent.id))
            .map(|agent| agent.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::ResourceKind;
    use crate::profile::{BuildingProfile, ResourceNodeProfile};

    fn at(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    fn depot(x: i32) -> Agent {
        Agent::new(
            "depot",
            BehaviorProfile::Static(BuildingProfile {
                accepts_deposits: true,
            }),
            at(x, 0),
        )
        .with_faction(Faction::Ally)
        .with_health(500)
    }

    fn node(x: i32, marked: bool, remaining: u32) -> Agent {
        Agent::new(
            "node",
            BehaviorProfile::ResourceNode(ResourceNodeProfile {
                kind: ResourceKind::Wood,
                remaining,
                marked,
            }),
            at(x, 0),
        )
    }

    #[test]
    fn test_short_reach_extends_to_contact() {
        let agent = depot(0).with_radius(Fixed::from_num(0.5));
        let touching = depot(2).with_radius(Fixed::from_num(1.5));
        let apart = depot(3).with_radius(Fixed::from_num(1.5));

        assert!(agent.within_reach(&touching, Fixed::from_num(0.2)));
        assert!(!agent.within_reach(&apart, Fixed::from_num(0.2)));
        assert_eq!(agent.effective_reach(Fixed::from_num(2)), Fixed::from_num(2));
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut table = AgentTable::new();
        let a = table.insert(depot(0));
        let b = table.insert(depot(5));
        assert_eq!((a, b), (1, 2));
        table.remove(a);
        let c = table.insert(depot(9));
        assert_eq!(c, 3);
        assert_eq!(table.sorted_ids(), vec![2, 3]);
    }

    #[test]
    fn test_nearest_depot_ties_to_lowest_id() {
        let mut table = AgentTable::new();
        let left = table.insert(depot(-4));
        let _right = table.insert(depot(4));
        let enemy = table.insert(depot(1).with_faction(Faction::Enemy));

        assert_eq!(table.nearest_depot(Faction::Ally, at(0, 0)), Some(left));
        assert_eq!(table.nearest_depot(Faction::Enemy, at(0, 0)), Some(enemy));
    }

    #[test]
    fn test_unfinished_depot_is_not_a_depot() {
        let mut table = AgentTable::new();
        let mut site = depot(1);
        site.construction = Some(Construction::new(Fixed::from_num(10)));
        table.insert(site);
        assert_eq!(table.nearest_depot(Faction::Ally, at(0, 0)), None);
    }

    #[test]
    fn test_nearest_marked_skips_unmarked_and_empty() {
        let mut table = AgentTable::new();
        table.insert(node(1, false, 50));
        table.insert(node(2, true, 0));
        let far = table.insert(node(9, true, 50));
        assert_eq!(table.nearest_marked_gather_target(at(0, 0)), Some(far));
    }

    #[test]
    fn test_command_acceptance() {
        let depot = depot(0);
        assert!(!depot.accepts_commands_from(Faction::Ally));

        let node = node(0, false, 10);
        assert!(!node.accepts_commands_from(Faction::Ally));

        let unit = Agent::new(
            "rally",
            BehaviorProfile::ProductionBuilding(BuildingProfile::default()),
            at(0, 0),
        )
        .with_faction(Faction::Ally)
        .with_health(100);
        assert!(unit.accepts_commands_from(Faction::Ally));
        assert!(!unit.accepts_commands_from(Faction::Enemy));
    }
}
