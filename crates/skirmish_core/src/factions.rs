//! Faction identity.
//!
//! Two sides contest the field. Resource nodes are neutral and carry no
//! faction at all, which is expressed as `Option<Faction>` on the agent.

use serde::{Deserialize, Serialize};

/// A side in the skirmish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Faction {
    /// The player's side.
    Ally,
    /// The opposing side.
    Enemy,
}

impl Faction {
    /// All factions, in stable order.
    pub const ALL: [Faction; 2] = [Faction::Ally, Faction::Enemy];

    /// The other side.
    #[must_use]
    pub const fn opposing(self) -> Self {
        match self {
            Self::Ally => Self::Enemy,
            Self::Enemy => Self::Ally,
        }
    }

    /// Whether an agent of this faction treats `other` as an enemy.
    ///
    /// Factionless agents are never hostile.
    #[must_use]
    pub fn is_hostile_to(self, other: Option<Faction>) -> bool {
        other.is_some_and(|other| other != self)
    }
}

impl std::fmt::Display for Faction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ally => write!(f, "ally"),
            Self::Enemy => write!(f, "enemy"),
        }
    }
}
