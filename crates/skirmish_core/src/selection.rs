//! The player's selection set.
//!
//! Holds agent ids only. Membership changes report whether they took
//! effect, so callers can emit exactly one `Selected` on entry and exactly
//! one `Deselected` on exit.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::components::AgentId;

/// Agents currently under player control.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSet {
    members: BTreeSet<AgentId>,
}

impl SelectionSet {
    /// Create an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent. Returns `true` if it was not already selected.
    pub fn insert(&mut self, id: AgentId) -> bool {
        self.members.insert(id)
    }

    /// Remove an agent. Returns `true` if it was selected.
    pub fn remove(&mut self, id: AgentId) -> bool {
        self.members.remove(&id)
    }

    /// Empty the selection, returning the former members in ascending order.
    pub fn clear(&mut self) -> Vec<AgentId> {
        std::mem::take(&mut self.members).into_iter().collect()
    }

    /// Check membership.
    #[must_use]
    pub fn contains(&self, id: AgentId) -> bool {
        self.members.contains(&id)
    }

    /// Members in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.members.iter().copied()
    }

    /// Number of selected agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
