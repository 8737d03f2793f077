//! The behavior driver.
//!
//! One pass per tick over every agent in ascending id order, dispatching on
//! the agent's [`BehaviorProfile`](crate::profile::BehaviorProfile):
//!
//! - offensive profiles validate or acquire a target, then either attack
//!   (in range) or close in (out of range); with nothing to fight they
//!   resume a pending plain move or idle
//! - workers run the economy loop in [`economy`](crate::economy)
//! - buildings and resource nodes have no per-tick behavior
//!
//! Due behavior-phase continuations (gather collections, health-bar hides)
//! run before the driver pass.

use crate::agent::{AgentState, Intent};
use crate::components::{AgentId, TargetLock};
use crate::events::SimEvent;
use crate::scheduler::Continuation;
use crate::simulation::{Simulation, TickPhase};
use crate::targeting::{find_nearest_enemy, is_hostile_target, within_sensing};

impl Simulation {
    /// Behavior phase.
    pub(crate) fn run_behavior_phase(&mut self) {
        self.grid.rebuild(&self.agents);

        for entry in self.scheduler.take_due(TickPhase::Behavior, self.tick) {
            match entry.continuation {
                Continuation::GatherCollect { node } => self.collect_from_node(entry.owner, node),
                Continuation::HideHealthBar => {
                    if self.agents.contains(entry.owner) {
                        self.emit(SimEvent::HealthBarHidden { agent: entry.owner });
                    }
                }
                _ => {}
            }
        }

        for id in self.agents.sorted_ids() {
            let Some(agent) = self.agents.get(id) else {
                continue;
            };
            if !agent.is_alive() {
                continue;
            }
            if agent.profile.is_offensive() {
                self.drive_offensive(id);
            } else if agent.profile.as_worker().is_some() {
                self.drive_worker(id);
            }
        }
    }

    fn drive_offensive(&mut self, id: AgentId) {
        let Some(agent) = self.agents.get(id) else {
            return;
        };

        // Drop a lock whose target is gone, dead, friendly or out of sensing
        let mut lock = agent.lock;
        if let Some(current) = lock {
            let still_valid = self.agents.get(current.target).is_some_and(|target| {
                is_hostile_target(agent, target) && (current.explicit || within_sensing(agent, target))
            });
            if !still_valid {
                tracing::debug!(agent = id, target = current.target, "Target lost");
                lock = None;
            }
        }
        let dropped_explicit = agent.lock.is_some_and(|old| old.explicit) && lock.is_none();

        if lock.is_none() {
            lock = find_nearest_enemy(&self.agents, &self.grid, id).map(|target| TargetLock {
                target,
                explicit: false,
            });
            if let Some(acquired) = lock {
                tracing::debug!(agent = id, target = acquired.target, "Target acquired");
            }
        }

        if let Some(agent) = self.agents.get_mut(id) {
            agent.lock = lock;
            if dropped_explicit {
                agent.order = None;
            }
        }

        match lock {
            Some(lock) => self.engage(id, lock.target),
            None => self.resume_or_idle(id),
        }
    }

    /// Attack `target` if it is in range, otherwise walk toward it.
    fn engage(&mut self, id: AgentId, target: AgentId) {
        let (Some(agent), Some(target_agent)) = (self.agents.get(id), self.agents.get(target))
        else {
            return;
        };
        let Some(range) = agent.profile.attack_range(self.environment) else {
            return;
        };

        let next = if agent.within_reach(target_agent, range) {
            AgentState::Attacking { target }
        } else if agent.is_mobile() {
            AgentState::Moving {
                destination: target_agent.position,
                intent: Intent::Engage(target),
            }
        } else {
            AgentState::Idle
        };
        self.set_state(id, next);
    }

    /// With nothing to fight, continue a pending plain move or stand down.
    fn resume_or_idle(&mut self, id: AgentId) {
        let Some(agent) = self.agents.get(id) else {
            return;
        };
        match agent.order {
            Some(order) if order.is_plain_move() && agent.is_mobile() => {
                let resumed = AgentState::Moving {
                    destination: order.destination,
                    intent: Intent::Travel,
                };
                if agent.state != resumed {
                    tracing::debug!(agent = id, "Resuming move order");
                    self.set_state(id, resumed);
                }
            }
            _ => {
                if matches!(
                    agent.state,
                    AgentState::Attacking { .. }
                        | AgentState::Moving {
                            intent: Intent::Engage(_),
                            ..
                        }
                ) {
                    self.go_idle(id);
                }
            }
        }
    }
}
