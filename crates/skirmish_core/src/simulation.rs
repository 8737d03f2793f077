//! Core simulation loop.
//!
//! The simulation runs at a fixed tick rate and processes all agent logic
//! deterministically. Each tick runs the same phases in the same order:
//!
//! 1. [`TickPhase::CommandIntake`]: queued player commands replace intents
//! 2. [`TickPhase::Behavior`]: due gather/health-bar continuations, then the
//!    behavior driver for every agent
//! 3. [`TickPhase::Movement`]: moving agents step toward their destination
//! 4. [`TickPhase::Collision`]: overlapping circles are pushed apart
//! 5. [`TickPhase::Combat`]: projectiles advance, due swing/volley/slide
//!    continuations run, attacks start
//! 6. [`TickPhase::Retirement`]: dead agents and depleted nodes are removed
//!
//! # Determinism
//!
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - No randomness
//! - Agents are always visited in ascending id order
//! - Continuations due on the same tick run in scheduling order
//!
//! # Example
//!
//! ```
//! use skirmish_core::agent::Agent;
//! use skirmish_core::factions::Faction;
//! use skirmish_core::math::{Fixed, Vec2Fixed};
//! use skirmish_core::profile::{BehaviorProfile, WorkerProfile};
//! use skirmish_core::simulation::Simulation;
//!
//! let mut sim = Simulation::new();
//! let profile = BehaviorProfile::Worker(WorkerProfile {
//!     carry_capacity: 10,
//!     gather_rate: 2,
//!     fetch_range: Fixed::ONE,
//!     build_power: Fixed::ONE,
//! });
//! let worker = sim.spawn(
//!     Agent::new("worker", profile, Vec2Fixed::ZERO)
//!         .with_faction(Faction::Ally)
//!         .with_health(40)
//!         .with_mobility(Fixed::from_num(4), Fixed::from_num(8)),
//! );
//!
//! sim.issue_command(worker, Vec2Fixed::new(Fixed::from_num(10), Fixed::ZERO), None);
//! let events = sim.tick();
//! assert_eq!(events.tick, 0);
//! assert_eq!(sim.tick_count(), 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentState, AgentTable};
use crate::combat::{Environment, ProjectileStore};
use crate::components::{AgentId, Command};
use crate::config::SimConfig;
use crate::data::{AgentCatalog, AgentTemplate};
use crate::economy::{EconomyLedger, ResourceKind, Stockpile};
use crate::error::{Result, SimError};
use crate::events::{NullVisibility, SimEvent, TickEvents, VisibilityObserver};
use crate::factions::Faction;
use crate::math::{Fixed, Vec2Fixed};
use crate::scheduler::{Continuation, Scheduler};
use crate::selection::SelectionSet;
use crate::spatial::SpatialGrid;
use crate::targeting;

/// Phases of a tick, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TickPhase {
    /// Queued commands are applied.
    CommandIntake,
    /// Target acquisition, worker loop, behavior continuations.
    Behavior,
    /// Agents step toward their destinations.
    Movement,
    /// Overlaps are resolved.
    Collision,
    /// Projectiles, swings, volleys and attack starts.
    Combat,
    /// Dead agents and depleted nodes are removed.
    Retirement,
}

impl TickPhase {
    /// All phases in execution order.
    pub const ORDER: [TickPhase; 6] = [
        TickPhase::CommandIntake,
        TickPhase::Behavior,
        TickPhase::Movement,
        TickPhase::Collision,
        TickPhase::Combat,
        TickPhase::Retirement,
    ];
}

/// The simulation state.
pub struct Simulation {
    pub(crate) tick: u64,
    pub(crate) config: SimConfig,
    pub(crate) catalog: AgentCatalog,
    pub(crate) agents: AgentTable,
    pub(crate) grid: SpatialGrid,
    pub(crate) projectiles: ProjectileStore,
    pub(crate) scheduler: Scheduler,
    pub(crate) selection: SelectionSet,
    pub(crate) inbox: Vec<(AgentId, Command)>,
    pub(crate) ledgers: BTreeMap<Faction, Box<dyn EconomyLedger>>,
    pub(crate) environment: Environment,
    pub(crate) phase: TickPhase,
    pub(crate) events: Vec<SimEvent>,
    pub(crate) last_click: Option<(AgentId, u64)>,
    warned_templates: BTreeSet<String>,
    visibility: Box<dyn VisibilityObserver>,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.tick)
            .field("agents", &self.agents.len())
            .field("projectiles", &self.projectiles.len())
            .field("scheduled", &self.scheduler.len())
            .field("selection", &self.selection)
            .field("environment", &self.environment)
            .field("ledgers", &self.ledgers)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Create an empty simulation with default settings.
    #[must_use]
    pub fn new() -> Self {
        let config = SimConfig::default();
        let ledgers = Faction::ALL
            .into_iter()
            .map(|faction| (faction, Box::new(Stockpile::new()) as Box<dyn EconomyLedger>))
            .collect();

        Self {
            tick: 0,
            grid: SpatialGrid::new(config.cell_size),
            config,
            catalog: AgentCatalog::new(),
            agents: AgentTable::new(),
            projectiles: ProjectileStore::new(),
            scheduler: Scheduler::new(),
            selection: SelectionSet::new(),
            inbox: Vec::new(),
            ledgers,
            environment: Environment::default(),
            phase: TickPhase::CommandIntake,
            events: Vec::new(),
            last_click: None,
            warned_templates: BTreeSet::new(),
            visibility: Box::new(NullVisibility),
        }
    }

    /// Create an empty simulation with the given settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings fail validation.
    pub fn from_config(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let mut sim = Self::new();
        sim.grid = SpatialGrid::new(config.cell_size);
        sim.config = config;
        Ok(sim)
    }

    /// Use `catalog` for template lookups.
    #[must_use]
    pub fn with_catalog(mut self, catalog: AgentCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replace the ledger for `faction`.
    #[must_use]
    pub fn with_ledger(mut self, faction: Faction, ledger: impl EconomyLedger + 'static) -> Self {
        self.ledgers.insert(faction, Box::new(ledger));
        self
    }

    /// Attach a visibility observer.
    #[must_use]
    pub fn with_visibility(mut self, observer: impl VisibilityObserver + 'static) -> Self {
        self.visibility = Box::new(observer);
        self
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds elapsed.
    #[must_use]
    pub fn time(&self) -> Fixed {
        Fixed::saturating_from_num(self.tick) / Fixed::from_num(self.config.tick_rate.max(1))
    }

    /// Duration of one tick in seconds.
    #[must_use]
    pub fn dt(&self) -> Fixed {
        self.config.dt()
    }

    /// Whole ticks closest to `seconds`.
    #[must_use]
    pub fn ticks_for(&self, seconds: Fixed) -> u64 {
        self.config.ticks_for(seconds)
    }

    /// Fewest ticks lasting at least `seconds`.
    #[must_use]
    pub fn ticks_at_least(&self, seconds: Fixed) -> u64 {
        self.config.ticks_at_least(seconds)
    }

    /// Get an agent by id.
    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// Get the agent table.
    #[must_use]
    pub fn agents(&self) -> &AgentTable {
        &self.agents
    }

    /// Projectiles in flight.
    #[must_use]
    pub fn projectiles(&self) -> &ProjectileStore {
        &self.projectiles
    }

    /// Pending continuations.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The player's selection.
    #[must_use]
    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Ledger for `faction`.
    #[must_use]
    pub fn ledger(&self, faction: Faction) -> Option<&dyn EconomyLedger> {
        self.ledgers.get(&faction).map(AsRef::as_ref)
    }

    /// Mutable ledger for `faction`, for host-side grants.
    pub fn ledger_mut(&mut self, faction: Faction) -> Option<&mut (dyn EconomyLedger + 'static)> {
        self.ledgers.get_mut(&faction).map(AsMut::as_mut)
    }

    /// Current environment.
    #[must_use]
    pub const fn environment(&self) -> Environment {
        self.environment
    }

    /// Phase the simulation is in, or last ran.
    #[must_use]
    pub const fn phase(&self) -> TickPhase {
        self.phase
    }

    /// Active settings.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Template catalog.
    #[must_use]
    pub fn catalog(&self) -> &AgentCatalog {
        &self.catalog
    }

    /// Events recorded since the last tick, not yet handed out.
    #[must_use]
    pub fn pending_events(&self) -> &[SimEvent] {
        &self.events
    }

    /// Nearest valid enemy within the agent's sensing range.
    #[must_use]
    pub fn find_nearest_enemy(&self, id: AgentId) -> Option<AgentId> {
        targeting::find_nearest_enemy(&self.agents, &self.agents, id)
    }

    /// Register an agent and return its id.
    pub fn spawn(&mut self, agent: Agent) -> AgentId {
        let id = self.agents.insert(agent);
        tracing::debug!(agent = id, tick = self.tick, "Agent spawned");
        id
    }

    /// Instantiate a catalog template and register it.
    ///
    /// # Errors
    ///
    /// Returns an error if no template has the given name.
    pub fn spawn_from_template(
        &mut self,
        name: &str,
        faction: Option<Faction>,
        position: Vec2Fixed,
    ) -> Result<AgentId> {
        let template = self.catalog.get(name)?.clone();
        self.warn_missing_anchor(&template);
        Ok(self.spawn(template.instantiate(faction, position)))
    }

    /// Spend a building's cost and place it as a construction site.
    ///
    /// Templates without a build time are placed finished.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is unknown or not a building, or if
    /// the faction cannot afford it. Nothing is spent on error.
    pub fn place_building(
        &mut self,
        name: &str,
        faction: Faction,
        position: Vec2Fixed,
    ) -> Result<AgentId> {
        let template = self.catalog.get(name)?.clone();
        if !template.profile.is_building() {
            return Err(SimError::InvalidState(format!("'{name}' is not a building")));
        }

        let ledger = self
            .ledgers
            .get_mut(&faction)
            .ok_or_else(|| SimError::InvalidState(format!("No ledger for {faction}")))?;
        for (&resource, &required) in &template.cost {
            if !ledger.has_enough(resource, required) {
                return Err(SimError::InsufficientResources {
                    resource,
                    required,
                    available: ledger.amount(resource),
                });
            }
        }
        for (&resource, &required) in &template.cost {
            ledger.spend(resource, required);
        }

        self.warn_missing_anchor(&template);
        let site = if template.build_time > Fixed::ZERO {
            template.instantiate_site(faction, position)
        } else {
            template.instantiate(Some(faction), position)
        };
        let under_construction = site.is_under_construction();
        let id = self.spawn(site);
        if under_construction {
            self.emit(SimEvent::ConstructionStarted { site: id });
        }
        Ok(id)
    }

    /// Remove an agent immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the agent doesn't exist.
    pub fn despawn(&mut self, id: AgentId) -> Result<()> {
        if !self.agents.contains(id) {
            return Err(SimError::AgentNotFound(id));
        }
        self.retire(id);
        Ok(())
    }

    /// Change the environment. Setting the current value again does nothing.
    pub fn set_environment(&mut self, environment: Environment) {
        if self.environment == environment {
            return;
        }
        self.environment = environment;
        self.emit(SimEvent::EnvironmentChanged { environment });
        tracing::info!(?environment, tick = self.tick, "Environment changed");
    }

    /// Mark a resource node so idle workers move on to it after delivery.
    pub fn mark_gather_target(&mut self, node: AgentId) -> bool {
        match self
            .agents
            .get_mut(node)
            .and_then(|agent| agent.profile.as_resource_node_mut())
        {
            Some(resource) => {
                resource.marked = true;
                true
            }
            None => false,
        }
    }

    /// Advance the simulation by one tick.
    ///
    /// Returns every event recorded since the previous tick, including
    /// those emitted by selection and dispatch calls in between.
    pub fn tick(&mut self) -> TickEvents {
        self.phase = TickPhase::CommandIntake;
        self.run_command_intake();

        self.phase = TickPhase::Behavior;
        self.run_behavior_phase();

        let before: BTreeMap<AgentId, Vec2Fixed> = self
            .agents
            .iter()
            .map(|agent| (agent.id, agent.position))
            .collect();

        self.phase = TickPhase::Movement;
        self.run_movement_phase();

        self.phase = TickPhase::Collision;
        self.run_collision_phase();

        self.phase = TickPhase::Combat;
        self.run_combat_phase();

        self.notify_moved(&before);

        self.phase = TickPhase::Retirement;
        self.run_retirement_phase();

        let events = TickEvents {
            tick: self.tick,
            events: std::mem::take(&mut self.events),
        };
        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        events
    }

    /// Run `count` ticks, collecting every tick's events.
    pub fn run_ticks(&mut self, count: u64) -> Vec<TickEvents> {
        (0..count).map(|_| self.tick()).collect()
    }

    /// Compute a hash of the simulation state.
    ///
    /// Two simulations fed the same inputs produce the same hash on every
    /// tick.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.environment.hash(&mut hasher);

        // Agents in deterministic order
        let ids = self.agents.sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            if let Some(agent) = self.agents.get(id) {
                agent.hash(&mut hasher);
            }
        }

        for projectile in self.projectiles.iter() {
            projectile.hash(&mut hasher);
        }

        let mut pending: Vec<_> = self.scheduler.entries().to_vec();
        pending.sort_by_key(|entry| entry.seq);
        pending.hash(&mut hasher);

        for (faction, ledger) in &self.ledgers {
            faction.hash(&mut hasher);
            for kind in ResourceKind::ALL {
                ledger.amount(kind).hash(&mut hasher);
            }
        }

        self.selection.iter().for_each(|id| id.hash(&mut hasher));

        hasher.finish()
    }

    pub(crate) fn emit(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Change an agent's state, releasing whatever the old state held.
    pub(crate) fn set_state(&mut self, id: AgentId, next: AgentState) {
        let Some(previous) = self.agents.get(id).map(|agent| agent.state) else {
            return;
        };
        if previous == next {
            return;
        }

        match previous {
            AgentState::Gathering { .. } => {
                self.scheduler.cancel_where(id, |continuation| {
                    matches!(continuation, Continuation::GatherCollect { .. })
                });
            }
            AgentState::Constructing { .. } => self.deregister_builder(id),
            _ => {}
        }

        if let Some(agent) = self.agents.get_mut(id) {
            agent.state = next;
        }
        if previous.label() != next.label() {
            tracing::debug!(
                agent = id,
                from = previous.label(),
                to = next.label(),
                "State changed"
            );
        }
    }

    /// Drop the order and lock and stand still.
    pub(crate) fn go_idle(&mut self, id: AgentId) {
        if let Some(agent) = self.agents.get_mut(id) {
            agent.order = None;
            agent.lock = None;
        }
        self.set_state(id, AgentState::Idle);
    }

    /// Report an HP change and refresh the health-bar linger timer.
    pub(crate) fn on_health_changed(&mut self, id: AgentId, current: u32, max: u32) {
        self.emit(SimEvent::HpChanged {
            agent: id,
            current,
            max,
        });

        if !self.agents.get(id).is_some_and(|agent| agent.health_bar) {
            return;
        }
        self.emit(SimEvent::HealthBarShown { agent: id });
        self.scheduler.cancel_where(id, |continuation| {
            matches!(continuation, Continuation::HideHealthBar)
        });
        let due = self.tick + self.ticks_at_least(self.config.health_bar_linger).max(1);
        self.scheduler.schedule(id, due, Continuation::HideHealthBar);
    }

    fn warn_missing_anchor(&mut self, template: &AgentTemplate) {
        if template.lacks_health_bar_anchor() && self.warned_templates.insert(template.name.clone())
        {
            tracing::warn!(
                template = %template.name,
                "Template has health but no health bar anchor; health bar disabled"
            );
        }
    }

    fn notify_moved(&mut self, before: &BTreeMap<AgentId, Vec2Fixed>) {
        for agent in self.agents.iter() {
            if before.get(&agent.id) != Some(&agent.position) {
                self.visibility
                    .agent_moved(agent.id, agent.faction, agent.position);
            }
        }
    }

    /// Retirement phase: remove dead agents and exhausted resource nodes.
    fn run_retirement_phase(&mut self) {
        let retiring: Vec<AgentId> = self
            .agents
            .sorted_ids()
            .into_iter()
            .filter(|&id| {
                self.agents.get(id).is_some_and(|agent| {
                    agent.health.is_some_and(|health| health.is_dead())
                        || agent
                            .profile
                            .as_resource_node()
                            .is_some_and(|node| node.remaining == 0)
                })
            })
            .collect();

        for id in retiring {
            self.retire(id);
        }
    }

    fn retire(&mut self, id: AgentId) {
        self.deregister_builder(id);
        self.scheduler.cancel_owner(id);
        if self.agents.remove(id).is_none() {
            return;
        }
        self.inbox.retain(|(owner, _)| *owner != id);
        if self.selection.remove(id) {
            self.emit(SimEvent::Deselected { agent: id });
        }
        if self.last_click.is_some_and(|(clicked, _)| clicked == id) {
            self.last_click = None;
        }
        self.visibility.agent_retired(id);
        self.emit(SimEvent::AgentRetired { agent: id });
        tracing::debug!(agent = id, tick = self.tick, "Agent retired");
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::data::MobilityData;
    use crate::profile::{BehaviorProfile, BuildingProfile, MeleeProfile};

    fn melee() -> BehaviorProfile {
        BehaviorProfile::Melee(MeleeProfile {
            range: Fixed::from_num(1.5),
            cooldown: Fixed::from_num(2),
            damage: 10,
            sensing_range: Fixed::from_num(8),
            knockback: None,
        })
    }

    fn at(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    fn soldier(faction: Faction, x: i32) -> Agent {
        Agent::new("soldier", melee(), at(x, 0))
            .with_faction(faction)
            .with_health(25)
            .with_mobility(Fixed::from_num(3), Fixed::from_num(8))
    }

    fn barracks() -> AgentTemplate {
        AgentTemplate {
            name: "barracks".to_string(),
            profile: BehaviorProfile::ProductionBuilding(BuildingProfile {
                accepts_deposits: true,
            }),
            health: Some(200),
            radius: Fixed::from_num(2),
            height: Fixed::from_num(3),
            mobility: None,
            cost: [(ResourceKind::Wood, 100)].into_iter().collect(),
            build_time: Fixed::from_num(10),
            health_bar_anchor: Some("roof".to_string()),
        }
    }

    #[derive(Debug, Default)]
    struct Recorder {
        moved: Vec<AgentId>,
        retired: Vec<AgentId>,
    }

    struct SharedRecorder(Arc<Mutex<Recorder>>);

    impl VisibilityObserver for SharedRecorder {
        fn agent_moved(&mut self, agent: AgentId, _: Option<Faction>, _: Vec2Fixed) {
            self.0.lock().unwrap().moved.push(agent);
        }

        fn agent_retired(&mut self, agent: AgentId) {
            self.0.lock().unwrap().retired.push(agent);
        }
    }

    #[test]
    fn test_tick_increments() {
        let mut sim = Simulation::new();
        assert_eq!(sim.tick_count(), 0);
        let events = sim.tick();
        assert_eq!(events.tick, 0);
        assert_eq!(sim.tick_count(), 1);
        sim.tick();
        assert_eq!(sim.tick_count(), 2);
        assert_eq!(sim.time(), Fixed::from_num(2) / Fixed::from_num(20));
    }

    #[test]
    fn test_tick_phases_run_in_order() {
        let mut sorted = TickPhase::ORDER;
        sorted.sort();
        assert_eq!(sorted, TickPhase::ORDER);

        let mut sim = Simulation::new();
        sim.tick();
        assert_eq!(sim.phase(), TickPhase::Retirement);
    }

    #[test]
    fn test_ids_are_unique_and_not_reused() {
        let mut sim = Simulation::new();
        let a = sim.spawn(soldier(Faction::Ally, 0));
        let b = sim.spawn(soldier(Faction::Ally, 5));
        assert_ne!(a, b);

        sim.despawn(a).unwrap();
        let c = sim.spawn(soldier(Faction::Ally, 10));
        assert!(c > b);
        assert!(matches!(sim.despawn(a), Err(SimError::AgentNotFound(_))));
    }

    #[test]
    fn test_dead_agent_retires_and_leaves_selection() {
        let mut sim = Simulation::new();
        let id = sim.spawn(soldier(Faction::Ally, 0));
        sim.select(id);
        if let Some(health) = sim.agents.get_mut(id).and_then(|a| a.health.as_mut()) {
            health.apply_damage(100);
        }

        let events = sim.tick();
        assert!(sim.agent(id).is_none());
        assert!(sim.selection().is_empty());
        assert_eq!(events.retired(), vec![id]);
        assert!(events.events.contains(&SimEvent::Deselected { agent: id }));
    }

    #[test]
    fn test_retirement_cancels_owned_continuations() {
        let mut sim = Simulation::new();
        let id = sim.spawn(soldier(Faction::Ally, 0));
        sim.scheduler.schedule(id, 5, Continuation::SwingPeak);
        sim.despawn(id).unwrap();
        assert!(sim.scheduler().is_empty());
    }

    #[test]
    fn test_set_environment_is_idempotent() {
        let mut sim = Simulation::new();
        sim.set_environment(Environment::Night);
        sim.set_environment(Environment::Night);
        let changes = sim
            .tick()
            .events
            .iter()
            .filter(|event| matches!(event, SimEvent::EnvironmentChanged { .. }))
            .count();
        assert_eq!(changes, 1);
        assert_eq!(sim.environment(), Environment::Night);
    }

    #[test]
    fn test_place_building_spends_and_starts_construction() {
        let mut catalog = AgentCatalog::new();
        catalog.insert(barracks());
        let mut sim = Simulation::new()
            .with_catalog(catalog)
            .with_ledger(Faction::Ally, Stockpile::with_balances([(ResourceKind::Wood, 150)]));

        let site = sim.place_building("barracks", Faction::Ally, at(10, 10)).unwrap();
        let agent = sim.agent(site).unwrap();
        assert!(agent.is_under_construction());
        assert_eq!(agent.health.map(|h| h.current), Some(1));
        assert_eq!(sim.ledger(Faction::Ally).map(|l| l.amount(ResourceKind::Wood)), Some(50));
        assert!(sim
            .pending_events()
            .contains(&SimEvent::ConstructionStarted { site }));
    }

    #[test]
    fn test_place_building_rejects_shortfall() {
        let mut catalog = AgentCatalog::new();
        catalog.insert(barracks());
        let mut sim = Simulation::new()
            .with_catalog(catalog)
            .with_ledger(Faction::Ally, Stockpile::with_balances([(ResourceKind::Wood, 60)]));

        let err = sim.place_building("barracks", Faction::Ally, at(0, 0)).unwrap_err();
        assert!(matches!(
            err,
            SimError::InsufficientResources {
                resource: ResourceKind::Wood,
                required: 100,
                available: 60
            }
        ));
        assert!(sim.agents().is_empty());
        assert_eq!(sim.ledger(Faction::Ally).map(|l| l.amount(ResourceKind::Wood)), Some(60));
    }

    #[test]
    fn test_spawn_from_unknown_template_fails() {
        let mut sim = Simulation::new();
        assert!(matches!(
            sim.spawn_from_template("ghost", None, Vec2Fixed::ZERO),
            Err(SimError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_spawn_from_template_without_anchor_disables_health_bar() {
        let mut catalog = AgentCatalog::new();
        catalog.insert(AgentTemplate {
            name: "grunt".to_string(),
            profile: melee(),
            health: Some(30),
            radius: Fixed::from_num(0.5),
            height: Fixed::ZERO,
            mobility: Some(MobilityData {
                speed: Fixed::from_num(3),
                rotation_speed: Fixed::from_num(8),
            }),
            cost: BTreeMap::new(),
            build_time: Fixed::ZERO,
            health_bar_anchor: None,
        });
        let mut sim = Simulation::new().with_catalog(catalog);

        let first = sim.spawn_from_template("grunt", Some(Faction::Ally), at(0, 0)).unwrap();
        sim.spawn_from_template("grunt", Some(Faction::Ally), at(3, 0)).unwrap();
        assert!(!sim.agent(first).unwrap().health_bar);
        assert_eq!(sim.warned_templates.len(), 1);
    }

    #[test]
    fn test_health_bar_hides_after_linger() {
        let mut sim = Simulation::new();
        let mut agent = soldier(Faction::Ally, 0);
        agent.health_bar = true;
        let id = sim.spawn(agent);

        sim.on_health_changed(id, 20, 25);
        let linger = sim.ticks_at_least(sim.config().health_bar_linger);

        let mut hidden_at = None;
        for _ in 0..=linger {
            let events = sim.tick();
            if events
                .events
                .contains(&SimEvent::HealthBarHidden { agent: id })
            {
                hidden_at = Some(events.tick);
            }
        }
        assert_eq!(hidden_at, Some(linger));
    }

    #[test]
    fn test_visibility_observer_sees_moves_and_retirements() {
        let recorder = Arc::new(Mutex::new(Recorder::default()));
        let mut sim = Simulation::new().with_visibility(SharedRecorder(Arc::clone(&recorder)));
        let walker = sim.spawn(soldier(Faction::Ally, 0));
        let idle = sim.spawn(soldier(Faction::Ally, 50));

        sim.issue_command(walker, at(10, 0), None);
        sim.tick();
        sim.despawn(idle).unwrap();

        let recorder = recorder.lock().unwrap();
        assert_eq!(recorder.moved, vec![walker]);
        assert_eq!(recorder.retired, vec![idle]);
    }

    #[test]
    fn test_deterministic_hash() {
        fn build() -> Simulation {
            let mut sim = Simulation::new();
            sim.spawn(soldier(Faction::Ally, 0));
            sim.spawn(soldier(Faction::Enemy, 6));
            sim.spawn(soldier(Faction::Enemy, -5));
            sim
        }

        let mut a = build();
        let mut b = build();
        for _ in 0..120 {
            a.tick();
            b.tick();
            assert_eq!(a.state_hash(), b.state_hash());
        }
    }
}
