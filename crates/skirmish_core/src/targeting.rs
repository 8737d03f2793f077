//! Target acquisition.
//!
//! A candidate is valid when it can take damage right now (has health, is
//! alive, is not an unfinished building) and belongs to a different faction
//! than the seeker. The smallest centre distance wins; equal distances go
//! to the lowest agent id so acquisition never depends on storage order.

use crate::agent::{Agent, AgentTable};
use crate::components::AgentId;
use crate::spatial::SpatialQuery;

/// Check whether `candidate` is a legal target for `seeker`.
#[must_use]
pub fn is_hostile_target(seeker: &Agent, candidate: &Agent) -> bool {
    seeker.id != candidate.id
        && candidate.is_damageable()
        && seeker
            .faction
            .is_some_and(|faction| faction.is_hostile_to(candidate.faction))
}

/// Nearest valid enemy within the seeker's sensing range.
///
/// Sensing reaches any candidate whose circle intersects the sensing disk.
/// Returns `None` for agents without a sensing range or when nothing
/// qualifies.
#[must_use]
pub fn find_nearest_enemy(
    agents: &AgentTable,
    spatial: &impl SpatialQuery,
    seeker: AgentId,
) -> Option<AgentId> {
    let seeker = agents.get(seeker)?;
    let sensing = seeker.profile.sensing_range()?;

    spatial
        .query_circle(seeker.position, sensing)
        .into_iter()
        .filter_map(|id| agents.get(id))
        .filter(|candidate| is_hostile_target(seeker, candidate))
        .min_by_key(|candidate| {
            (
                candidate.position.distance_squared(seeker.position).to_bits(),
                candidate.id,
            )
        })
        .map(|candidate| candidate.id)
}

/// Check whether `target` is still within the seeker's sensing range.
#[must_use]
pub fn within_sensing(seeker: &Agent, target: &Agent) -> bool {
    seeker
        .profile
        .sensing_range()
        .is_some_and(|sensing| target.edge_distance_from(seeker.position) <= sensing)
}
