//! Economy: resource ledgers and the worker gather/deliver/construct loop.
//!
//! Workers cycle between resource nodes and depots:
//!
//! ```text
//! MovingToNode -> Gathering -> MovingToDepot -> Delivering -> MovingToNode
//!                                                          \-> MovingToNextMarkedTarget
//! ```
//!
//! Each periodic collection takes up to `gather_rate`, bounded by what the
//! node has left and by the worker's free capacity. All amounts are
//! integers so the loop stays deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agent::{AgentState, Intent};
use crate::components::AgentId;
use crate::events::SimEvent;
use crate::factions::Faction;
use crate::math::Fixed;
use crate::scheduler::Continuation;
use crate::simulation::Simulation;

/// Kinds of resource a node can yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Food.
    Food,
    /// Wood.
    Wood,
    /// Stone.
    Stone,
    /// Gold.
    Gold,
}

impl ResourceKind {
    /// All kinds, in stable order.
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Food,
        ResourceKind::Wood,
        ResourceKind::Stone,
        ResourceKind::Gold,
    ];
}

/// A faction's resource account.
///
/// The simulation talks to ledgers only through this trait, so a host can
/// inject its own bookkeeping.
pub trait EconomyLedger: std::fmt::Debug + Send {
    /// Check whether at least `amount` of `kind` is available.
    fn has_enough(&self, kind: ResourceKind, amount: u32) -> bool;

    /// Withdraw `amount` of `kind`. Returns `false` and changes nothing on
    /// shortfall.
    fn spend(&mut self, kind: ResourceKind, amount: u32) -> bool;

    /// Deposit `amount` of `kind`.
    fn add(&mut self, kind: ResourceKind, amount: u32);

    /// Current balance of `kind`.
    fn amount(&self, kind: ResourceKind) -> u32;
}

/// Default in-memory ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stockpile {
    balances: BTreeMap<ResourceKind, u32>,
}

impl Stockpile {
    /// Create an empty stockpile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stockpile with starting balances.
    #[must_use]
    pub fn with_balances(balances: impl IntoIterator<Item = (ResourceKind, u32)>) -> Self {
        let mut stockpile = Self::new();
        for (kind, amount) in balances {
            stockpile.add(kind, amount);
        }
        stockpile
    }
}

impl EconomyLedger for Stockpile {
    fn has_enough(&self, kind: ResourceKind, amount: u32) -> bool {
        self.amount(kind) >= amount
    }

    fn spend(&mut self, kind: ResourceKind, amount: u32) -> bool {
        if !self.has_enough(kind, amount) {
            return false;
        }
        if let Some(balance) = self.balances.get_mut(&kind) {
            *balance -= amount;
        }
        true
    }

    fn add(&mut self, kind: ResourceKind, amount: u32) {
        let balance = self.balances.entry(kind).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    fn amount(&self, kind: ResourceKind) -> u32 {
        self.balances.get(&kind).copied().unwrap_or(0)
    }
}

impl Simulation {
    /// Advance one worker's economy loop by a tick.
    pub(crate) fn drive_worker(&mut self, id: AgentId) {
        let Some(agent) = self.agents.get(id) else {
            return;
        };
        let Some(worker) = agent.profile.as_worker().copied() else {
            return;
        };
        let Some(faction) = agent.faction else {
            return;
        };
        let position = agent.position;
        let state = agent.state;
        let reach = agent.effective_reach(worker.fetch_range);

        match state {
            AgentState::Idle | AgentState::Moving { intent: Intent::Travel, .. } => {}
            AgentState::Moving { intent: Intent::Gather(node), .. } => {
                match self.agents.get(node).filter(|node| node.is_gatherable()) {
                    Some(target) if target.edge_distance_from(position) <= reach => {
                        self.begin_gathering(id, node);
                    }
                    Some(target) => {
                        let destination = target.position;
                        self.set_state(
                            id,
                            AgentState::Moving {
                                destination,
                                intent: Intent::Gather(node),
                            },
                        );
                    }
                    None => {
                        tracing::debug!(worker = id, node, "Gather target vanished");
                        self.seek_next_gather_target(id);
                    }
                }
            }
            AgentState::Gathering { node } => {
                if !self.agents.get(node).is_some_and(|node| node.is_gatherable()) {
                    self.head_to_depot_or_next_node(id);
                }
            }
            AgentState::Moving { intent: Intent::Deliver(depot), .. } => {
                let depot = self
                    .agents
                    .get(depot)
                    .filter(|depot| depot.is_depot_for(faction))
                    .map(|depot| depot.id)
                    .or_else(|| self.agents.nearest_depot(faction, position));

                match depot.and_then(|depot| self.agents.get(depot)) {
                    Some(target) if target.edge_distance_from(position) <= reach => {
                        let depot = target.id;
                        self.deliver(id, depot, faction);
                    }
                    Some(target) => {
                        let (depot, destination) = (target.id, target.position);
                        self.set_state(
                            id,
                            AgentState::Moving {
                                destination,
                                intent: Intent::Deliver(depot),
                            },
                        );
                    }
                    None => {
                        tracing::debug!(worker = id, "No depot to deliver to");
                        self.go_idle(id);
                    }
                }
            }
            AgentState::Delivering { .. } => self.resume_after_delivery(id),
            AgentState::Moving { intent: Intent::Construct(site), .. } => {
                match self
                    .agents
                    .get(site)
                    .filter(|site| site.faction == Some(faction) && site.is_under_construction())
                {
                    Some(target) if target.edge_distance_from(position) <= reach => {
                        self.begin_constructing(id, site);
                    }
                    Some(target) => {
                        let destination = target.position;
                        self.set_state(
                            id,
                            AgentState::Moving {
                                destination,
                                intent: Intent::Construct(site),
                            },
                        );
                    }
                    None => self.go_idle(id),
                }
            }
            AgentState::Constructing { site } => self.advance_construction(id, site, worker.build_power),
            AgentState::Moving { intent: Intent::Engage(_), .. } | AgentState::Attacking { .. } => {
                self.go_idle(id);
            }
        }
    }

    fn begin_gathering(&mut self, id: AgentId, node: AgentId) {
        let node_kind = self
            .agents
            .get(node)
            .and_then(|node| node.profile.as_resource_node())
            .map(|node| node.kind);

        if let Some(agent) = self.agents.get_mut(id) {
            agent.order = None;
            if agent.cargo.amount > 0 && agent.cargo.kind != node_kind {
                tracing::debug!(worker = id, dropped = agent.cargo.amount, "Dropping mixed cargo");
                agent.cargo.take();
            }
        }

        self.set_state(id, AgentState::Gathering { node });
        let due = self.tick + self.ticks_at_least(self.config.gather_interval).max(1);
        self.scheduler
            .schedule(id, due, Continuation::GatherCollect { node });
        tracing::debug!(worker = id, node, "Started gathering");
    }

    /// Collect one load step from `node`. Runs when a gather continuation fires.
    pub(crate) fn collect_from_node(&mut self, id: AgentId, node: AgentId) {
        let Some(agent) = self.agents.get(id) else {
            return;
        };
        if agent.state != (AgentState::Gathering { node }) {
            return;
        }
        let Some(worker) = agent.profile.as_worker().copied() else {
            return;
        };
        let free = agent.cargo.free_capacity(worker.carry_capacity);

        let Some(resource) = self
            .agents
            .get_mut(node)
            .and_then(|node| node.profile.as_resource_node_mut())
        else {
            self.head_to_depot_or_next_node(id);
            return;
        };

        let amount = worker.gather_rate.min(resource.remaining).min(free);
        resource.remaining -= amount;
        let (kind, remaining) = (resource.kind, resource.remaining);

        let mut full = false;
        if let Some(agent) = self.agents.get_mut(id) {
            agent.cargo.kind = Some(kind);
            agent.cargo.amount += amount;
            agent.cargo.source = Some(node);
            full = agent.cargo.free_capacity(worker.carry_capacity) == 0;
        }

        if amount > 0 {
            self.emit(SimEvent::ResourceGathered {
                worker: id,
                node,
                kind,
                amount,
            });
        }
        tracing::trace!(worker = id, node, amount, remaining, "Collected");

        if remaining == 0 {
            self.emit(SimEvent::NodeDepleted { node });
        }

        if full || remaining == 0 {
            self.head_to_depot_or_next_node(id);
        } else {
            let due = self.tick + self.ticks_at_least(self.config.gather_interval).max(1);
            self.scheduler
                .schedule(id, due, Continuation::GatherCollect { node });
        }
    }

    /// Take cargo to the nearest depot, or look for more work when empty-handed.
    fn head_to_depot_or_next_node(&mut self, id: AgentId) {
        let Some(agent) = self.agents.get(id) else {
            return;
        };
        if agent.cargo.is_empty() {
            self.seek_next_gather_target(id);
            return;
        }

        let depot = agent
            .faction
            .and_then(|faction| self.agents.nearest_depot(faction, agent.position))
            .and_then(|depot| self.agents.get(depot))
            .map(|depot| (depot.id, depot.position));

        match depot {
            Some((depot, destination)) => self.set_state(
                id,
                AgentState::Moving {
                    destination,
                    intent: Intent::Deliver(depot),
                },
            ),
            None => {
                tracing::debug!(worker = id, "Loaded but no depot available");
                self.go_idle(id);
            }
        }
    }

    fn deliver(&mut self, id: AgentId, depot: AgentId, faction: Faction) {
        let load = self.agents.get_mut(id).and_then(|agent| {
            agent.order = None;
            agent.cargo.take()
        });

        if let Some((kind, amount)) = load {
            if let Some(ledger) = self.ledgers.get_mut(&faction) {
                ledger.add(kind, amount);
            }
            self.emit(SimEvent::ResourceDeposited {
                worker: id,
                depot,
                faction,
                kind,
                amount,
            });
            tracing::debug!(worker = id, depot, amount, ?kind, "Delivered");
        }

        self.set_state(id, AgentState::Delivering { depot });
    }

    fn resume_after_delivery(&mut self, id: AgentId) {
        let source = self
            .agents
            .get(id)
            .and_then(|agent| agent.cargo.source)
            .filter(|&node| self.agents.get(node).is_some_and(|node| node.is_gatherable()));

        match source {
            Some(node) => self.move_to_gather(id, node),
            None => self.seek_next_gather_target(id),
        }
    }

    fn seek_next_gather_target(&mut self, id: AgentId) {
        let next = self
            .agents
            .get(id)
            .and_then(|agent| self.agents.nearest_marked_gather_target(agent.position));

        match next {
            Some(node) => self.move_to_gather(id, node),
            None => self.go_idle(id),
        }
    }

    fn move_to_gather(&mut self, id: AgentId, node: AgentId) {
        let Some(destination) = self.agents.get(node).map(|node| node.position) else {
            return;
        };
        self.set_state(
            id,
            AgentState::Moving {
                destination,
                intent: Intent::Gather(node),
            },
        );
    }

    fn begin_constructing(&mut self, id: AgentId, site: AgentId) {
        if let Some(agent) = self.agents.get_mut(id) {
            agent.order = None;
        }
        if let Some(construction) = self
            .agents
            .get_mut(site)
            .and_then(|site| site.construction.as_mut())
        {
            construction.builders.insert(id);
        }
        self.set_state(id, AgentState::Constructing { site });
        tracing::debug!(worker = id, site, "Started constructing");
    }

    fn advance_construction(&mut self, id: AgentId, site: AgentId, build_power: Fixed) {
        let dt = self.dt();
        let Some(target) = self.agents.get_mut(site) else {
            self.go_idle(id);
            return;
        };
        let Some(construction) = target.construction.as_mut() else {
            self.go_idle(id);
            return;
        };

        construction.advance(build_power, dt);
        let progress = construction.progress;
        let complete = construction.is_complete();

        let mut hp_changed = None;
        if let Some(health) = target.health.as_mut() {
            if health.set_from_progress(progress) {
                hp_changed = Some((health.current, health.max));
            }
        }

        if let Some((current, max)) = hp_changed {
            self.on_health_changed(site, current, max);
        }

        if complete {
            self.complete_construction(site);
        }
    }

    fn complete_construction(&mut self, site: AgentId) {
        let Some(construction) = self
            .agents
            .get_mut(site)
            .and_then(|site| site.construction.take())
        else {
            return;
        };

        for builder in construction.builders {
            if self
                .agents
                .get(builder)
                .is_some_and(|agent| agent.state == AgentState::Constructing { site })
            {
                self.go_idle(builder);
            }
        }

        self.emit(SimEvent::ConstructionCompleted { site });
        tracing::debug!(site, "Construction completed");
    }

    /// Remove a worker from any construction crew it is part of.
    pub(crate) fn deregister_builder(&mut self, id: AgentId) {
        let Some(AgentState::Constructing { site }) = self.agents.get(id).map(|agent| agent.state)
        else {
            return;
        };
        if let Some(construction) = self
            .agents
            .get_mut(site)
            .and_then(|site| site.construction.as_mut())
        {
            construction.builders.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stockpile_spend_and_add() {
        let mut stockpile = Stockpile::with_balances([(ResourceKind::Wood, 50)]);
        assert!(stockpile.has_enough(ResourceKind::Wood, 50));
        assert!(!stockpile.has_enough(ResourceKind::Gold, 1));

        assert!(stockpile.spend(ResourceKind::Wood, 30));
        assert_eq!(stockpile.amount(ResourceKind::Wood), 20);

        // Shortfall leaves the balance untouched
        assert!(!stockpile.spend(ResourceKind::Wood, 21));
        assert_eq!(stockpile.amount(ResourceKind::Wood), 20);

        stockpile.add(ResourceKind::Gold, 7);
        assert_eq!(stockpile.amount(ResourceKind::Gold), 7);
    }

    #[test]
    fn test_spend_zero_of_missing_kind() {
        let mut stockpile = Stockpile::new();
        assert!(stockpile.has_enough(ResourceKind::Stone, 0));
        assert!(stockpile.spend(ResourceKind::Stone, 0));
    }
}
