//! Steering and collision resolution.
//!
//! Moving agents head straight for their destination at `speed * dt` per
//! tick; there is no pathfinding. After movement, every overlapping pair of
//! circles is pushed apart along the centre line. Two mobile agents split
//! the correction evenly; an agent without mobility never moves and its
//! mobile partner takes the whole correction.

use crate::agent::{AgentState, Intent};
use crate::components::AgentId;
use crate::math::{Fixed, Vec2Fixed};
use crate::simulation::Simulation;
use crate::spatial::SpatialQuery;

/// One side of a collision test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Body {
    /// Centre.
    pub position: Vec2Fixed,
    /// Collision radius.
    pub radius: Fixed,
    /// Whether the body may be displaced.
    pub mobile: bool,
}

/// Push two overlapping circles apart.
///
/// Returns the corrected centres, or `None` when the circles do not
/// overlap or neither body may move. Coincident centres separate along
/// `fallback`, which must be a non-zero direction.
#[must_use]
pub fn resolve_pair(a: Body, b: Body, fallback: Vec2Fixed) -> Option<(Vec2Fixed, Vec2Fixed)> {
    if !a.mobile && !b.mobile {
        return None;
    }
    let min_distance = a.radius + b.radius;
    let offset = b.position - a.position;
    if offset.length_squared() >= min_distance * min_distance {
        return None;
    }

    let distance = offset.length();
    let overlap = min_distance - distance;
    if overlap <= Fixed::ZERO {
        return None;
    }
    let direction = offset.normalize_or(fallback.normalize_or(Vec2Fixed::UNIT_X));

    let (a_share, b_share) = match (a.mobile, b.mobile) {
        (true, true) => {
            let half = overlap / Fixed::from_num(2);
            (half, overlap - half)
        }
        (true, false) => (overlap, Fixed::ZERO),
        _ => (Fixed::ZERO, overlap),
    };

    Some((
        a.position - direction.scale(a_share),
        b.position + direction.scale(b_share),
    ))
}

impl Simulation {
    /// Movement phase: advance every agent in `Moving` toward its destination.
    pub(crate) fn run_movement_phase(&mut self) {
        for id in self.agents.sorted_ids() {
            self.step_agent(id);
        }
    }

    fn step_agent(&mut self, id: AgentId) {
        let dt = self.dt();
        let epsilon = self.config.arrival_epsilon;

        let Some(agent) = self.agents.get(id) else {
            return;
        };
        let AgentState::Moving {
            destination,
            intent,
        } = agent.state
        else {
            return;
        };
        let Some(mobility) = agent.mobility else {
            return;
        };

        // Approaching another agent stops at contact rather than at its centre
        let stop_distance = intent
            .target()
            .and_then(|target| self.agents.get(target))
            .map_or(Fixed::ZERO, |target| target.radius + agent.radius);

        let position = agent.position;
        let offset = destination - position;
        let distance = offset.length();
        let heading = offset.normalize();

        let facing = if heading.is_zero() {
            agent.facing
        } else {
            agent
                .facing
                .turn_toward(heading, mobility.rotation_speed * dt)
        };

        let travel = distance - stop_distance;
        let step = mobility.speed * dt;
        let next = if travel <= Fixed::ZERO {
            position
        } else if step >= travel {
            // Snap rather than overshoot
            destination - heading.scale(stop_distance)
        } else {
            position + heading.scale(step)
        };

        let arrived = intent == Intent::Travel && next.distance(destination) <= epsilon;

        if let Some(agent) = self.agents.get_mut(id) {
            agent.position = next;
            agent.facing = facing;
            if arrived {
                agent.order = None;
            }
        }
        if arrived {
            tracing::debug!(agent = id, "Arrived");
            self.set_state(id, AgentState::Idle);
        }
    }

    /// Collision phase: one symmetric push-apart pass over every overlapping pair.
    pub(crate) fn run_collision_phase(&mut self) {
        self.grid.rebuild(&self.agents);
        let fallback = self.config.collision_fallback;

        for id in self.agents.sorted_ids() {
            let Some(agent) = self.agents.get(id) else {
                continue;
            };
            let neighbours = self.grid.query_circle(agent.position, agent.radius);

            for other in neighbours.into_iter().filter(|&other| other > id) {
                let (Some(a), Some(b)) = (self.agents.get(id), self.agents.get(other)) else {
                    continue;
                };
                let a_body = Body {
                    position: a.position,
                    radius: a.radius,
                    mobile: a.is_mobile(),
                };
                let b_body = Body {
                    position: b.position,
                    radius: b.radius,
                    mobile: b.is_mobile(),
                };

                if let Some((a_position, b_position)) = resolve_pair(a_body, b_body, fallback) {
                    if let Some(a) = self.agents.get_mut(id) {
                        a.position = a_position;
                    }
                    if let Some(b) = self.agents.get_mut(other) {
                        b.position = b_position;
                    }
                }
            }
        }
    }
}
