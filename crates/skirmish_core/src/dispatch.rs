//! Selection handling and command dispatch.
//!
//! Input arrives as clicks on the ground plane (or on screen, projected
//! through a [`GroundProjector`]). Selection changes apply immediately and
//! emit `Selected`/`Deselected` events. Commands are queued and applied at
//! the start of the next tick, in the command-intake phase.

use std::cmp::Reverse;

use crate::agent::{AgentState, Intent};
use crate::components::{AgentId, Command, TargetLock};
use crate::error::Result;
use crate::events::SimEvent;
use crate::math::Vec2Fixed;
use crate::profile::BehaviorProfile;
use crate::simulation::Simulation;
use crate::spatial::{GroundProjector, ScreenPoint, SpatialQuery};
use crate::targeting::is_hostile_target;

impl Simulation {
    /// Add an agent to the selection.
    pub fn select(&mut self, id: AgentId) -> bool {
        if !self.agents.contains(id) || !self.selection.insert(id) {
            return false;
        }
        self.emit(SimEvent::Selected { agent: id });
        true
    }

    /// Remove an agent from the selection.
    pub fn deselect(&mut self, id: AgentId) -> bool {
        if !self.selection.remove(id) {
            return false;
        }
        self.emit(SimEvent::Deselected { agent: id });
        true
    }

    /// Deselect everything.
    pub fn clear_selection(&mut self) {
        for id in self.selection.clear() {
            self.emit(SimEvent::Deselected { agent: id });
        }
    }

    /// Topmost agent whose circle contains `point`.
    ///
    /// Highest height wins, then nearest centre, then lowest id.
    #[must_use]
    pub fn pick_topmost(&self, point: Vec2Fixed) -> Option<AgentId> {
        self.agents
            .query_circle(point, crate::math::Fixed::ZERO)
            .into_iter()
            .filter_map(|id| self.agents.get(id))
            .min_by_key(|agent| {
                (
                    Reverse(agent.height.to_bits()),
                    agent.position.distance_squared(point).to_bits(),
                    agent.id,
                )
            })
            .map(|agent| agent.id)
    }

    /// Single left-click on the ground.
    ///
    /// Clears the selection and selects the topmost agent under the cursor.
    /// A second click on the same agent within the double-click window
    /// requests camera focus instead and keeps the agent selected.
    pub fn left_click(&mut self, point: Vec2Fixed) {
        let picked = self.pick_topmost(point);
        let window = self.ticks_for(self.config.double_click_window);

        let double = match (picked, self.last_click) {
            (Some(id), Some((last, at))) => id == last && self.tick.saturating_sub(at) <= window,
            _ => false,
        };

        if let (true, Some(id)) = (double, picked) {
            let others: Vec<_> = self.selection.iter().filter(|&other| other != id).collect();
            for other in others {
                self.deselect(other);
            }
            self.select(id);
            self.emit(SimEvent::FocusRequested { agent: id });
            self.last_click = None;
            return;
        }

        self.clear_selection();
        if let Some(id) = picked {
            self.select(id);
        }
        self.last_click = picked.map(|id| (id, self.tick));
    }

    /// Left-click at a screen position.
    pub fn left_click_screen(&mut self, projector: &impl GroundProjector, point: ScreenPoint) {
        match projector.project_to_ground(point) {
            Some(ground) => self.left_click(ground),
            None => {
                self.clear_selection();
                self.last_click = None;
            }
        }
    }

    /// Box-select between two ground corners.
    ///
    /// Clears the selection, then selects every unit (melee, ranged or
    /// worker) whose position lies in the axis-aligned rectangle. Buildings
    /// and resource nodes are never box-selected. Returns how many agents
    /// were selected.
    pub fn box_select(&mut self, corner_a: Vec2Fixed, corner_b: Vec2Fixed) -> usize {
        self.clear_selection();
        self.last_click = None;

        let (min_x, max_x) = (corner_a.x.min(corner_b.x), corner_a.x.max(corner_b.x));
        let (min_y, max_y) = (corner_a.y.min(corner_b.y), corner_a.y.max(corner_b.y));

        let inside: Vec<AgentId> = self
            .agents
            .sorted_ids()
            .into_iter()
            .filter(|&id| {
                self.agents.get(id).is_some_and(|agent| {
                    agent.profile.is_unit()
                        && agent.is_alive()
                        && agent.position.x >= min_x
                        && agent.position.x <= max_x
                        && agent.position.y >= min_y
                        && agent.position.y <= max_y
                })
            })
            .collect();

        for &id in &inside {
            self.select(id);
        }
        inside.len()
    }

    /// Box-select between two screen corners.
    pub fn box_select_screen(
        &mut self,
        projector: &impl GroundProjector,
        corner_a: ScreenPoint,
        corner_b: ScreenPoint,
    ) -> usize {
        match (
            projector.project_to_ground(corner_a),
            projector.project_to_ground(corner_b),
        ) {
            (Some(a), Some(b)) => self.box_select(a, b),
            _ => {
                self.clear_selection();
                self.last_click = None;
                0
            }
        }
    }

    /// Right-click on the ground: command every selected agent that accepts
    /// commands.
    ///
    /// The agent under the cursor, if any, becomes the command target. A
    /// clicked resource node is marked as a gather target. Returns how many
    /// agents were commanded.
    pub fn right_click(&mut self, point: Vec2Fixed) -> usize {
        let target = self.pick_topmost(point);
        let player = self.config.player_faction;

        let accepted: Vec<AgentId> = self
            .selection
            .iter()
            .filter(|&id| {
                self.agents
                    .get(id)
                    .is_some_and(|agent| agent.accepts_commands_from(player))
            })
            .collect();

        for &id in &accepted {
            self.issue_command(id, point, target);
        }

        if !accepted.is_empty() {
            if let Some(node) = target {
                self.mark_gather_target(node);
            }
        }
        accepted.len()
    }

    /// Right-click at a screen position.
    pub fn right_click_screen(&mut self, projector: &impl GroundProjector, point: ScreenPoint) -> usize {
        projector
            .project_to_ground(point)
            .map_or(0, |ground| self.right_click(ground))
    }

    /// Queue a command for one agent.
    ///
    /// Returns `false` (and logs at debug level) when the agent does not
    /// accept commands from the player; nothing is queued in that case.
    pub fn issue_command(
        &mut self,
        id: AgentId,
        destination: Vec2Fixed,
        target: Option<AgentId>,
    ) -> bool {
        let player = self.config.player_faction;
        if !self
            .agents
            .get(id)
            .is_some_and(|agent| agent.accepts_commands_from(player))
        {
            tracing::debug!(agent = id, "Command ignored: agent does not accept commands");
            return false;
        }
        self.inbox.push((
            id,
            Command {
                destination,
                target,
                issued_at: self.tick,
            },
        ));
        true
    }

    /// Place a building for the player and send the selected workers to build it.
    pub fn build_at(&mut self, template: &str, position: Vec2Fixed) -> Result<AgentId> {
        let player = self.config.player_faction;
        let site = self.place_building(template, player, position)?;

        let builders: Vec<AgentId> = self
            .selection
            .iter()
            .filter(|&id| {
                self.agents.get(id).is_some_and(|agent| {
                    agent.profile.as_worker().is_some() && agent.accepts_commands_from(player)
                })
            })
            .collect();
        for id in builders {
            self.issue_command(id, position, Some(site));
        }
        Ok(site)
    }

    /// Commands waiting for the next intake phase.
    #[must_use]
    pub fn pending_commands(&self) -> &[(AgentId, Command)] {
        &self.inbox
    }

    /// Command-intake phase: apply every queued command in arrival order.
    pub(crate) fn run_command_intake(&mut self) {
        for (id, command) in std::mem::take(&mut self.inbox) {
            self.apply_command(id, command);
        }
    }

    /// Replace an agent's intent with `command`.
    ///
    /// Cancels in-flight attack, gather and construction work first, for
    /// every behavior variant.
    fn apply_command(&mut self, id: AgentId, command: Command) {
        let player = self.config.player_faction;
        let Some(agent) = self
            .agents
            .get(id)
            .filter(|agent| agent.accepts_commands_from(player))
        else {
            tracing::debug!(agent = id, "Queued command dropped: agent gone or not commandable");
            return;
        };

        let target = command.target.and_then(|target| self.agents.get(target));
        let intent = match (&agent.profile, target) {
            (profile, Some(target)) if profile.is_offensive() && is_hostile_target(agent, target) => {
                Intent::Engage(target.id)
            }
            (BehaviorProfile::Worker(_), Some(target)) if target.is_gatherable() => {
                Intent::Gather(target.id)
            }
            (BehaviorProfile::Worker(_), Some(target))
                if target.faction == agent.faction && target.is_under_construction() =>
            {
                Intent::Construct(target.id)
            }
            (BehaviorProfile::Worker(_), Some(target))
                if agent.faction.is_some_and(|faction| target.is_depot_for(faction)) =>
            {
                Intent::Deliver(target.id)
            }
            _ => Intent::Travel,
        };
        let is_rally = matches!(agent.profile, BehaviorProfile::ProductionBuilding(_));
        let within_reach =
            agent.position.distance(command.destination) <= self.config.arrival_epsilon;
        let mobile = agent.is_mobile();
        let target_position = target.map(|target| target.position);

        let accepted = Command {
            target: intent.target(),
            ..command
        };

        self.scheduler.cancel_intent(id);
        if let Some(agent) = self.agents.get_mut(id) {
            agent.order = Some(accepted);
            agent.lock = match intent {
                Intent::Engage(target) => Some(TargetLock {
                    target,
                    explicit: true,
                }),
                _ => None,
            };
        }
        self.emit(SimEvent::CommandIssued {
            agent: id,
            destination: accepted.destination,
            target: accepted.target,
        });
        tracing::debug!(agent = id, ?intent, "Command accepted");

        if is_rally {
            // Production buildings keep the command as a rally point
            self.set_state(id, AgentState::Idle);
            return;
        }

        match (intent, target_position) {
            (Intent::Travel, _) if within_reach || !mobile => self.go_idle(id),
            (Intent::Travel, _) | (_, None) => self.set_state(
                id,
                AgentState::Moving {
                    destination: accepted.destination,
                    intent: Intent::Travel,
                },
            ),
            (intent, Some(destination)) => {
                self.set_state(id, AgentState::Moving { destination, intent });
            }
        }
    }
}
