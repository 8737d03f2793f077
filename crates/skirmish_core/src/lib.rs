//! # Skirmish Core
//!
//! Deterministic simulation core for a small real-time strategy skirmish.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No randomness
//! - No floating-point math (uses fixed-point)
//!
//! A host drives it by calling [`Simulation::tick`](simulation::Simulation::tick)
//! at a fixed rate, feeding player input through the selection and dispatch
//! calls, and reading back [`TickEvents`](events::TickEvents).
//!
//! ## Crate Structure
//!
//! - [`agent`] - Agent record, behavior state and the agent table
//! - [`profile`] - Tagged behavior variants and their tuning
//! - [`simulation`] - Tick loop and phase ordering
//! - [`dispatch`] - Selection and command dispatch
//! - [`combat`] - Attack variants and projectiles
//! - [`economy`] - Ledgers and the worker loop
//! - [`scheduler`] - Timed continuations
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod agent;
mod behavior;
pub mod combat;
pub mod components;
pub mod config;
pub mod data;
pub mod dispatch;
pub mod economy;
pub mod error;
pub mod events;
pub mod factions;
pub mod math;
pub mod movement;
pub mod profile;
pub mod scheduler;
pub mod selection;
pub mod simulation;
pub mod spatial;
pub mod targeting;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{Agent, AgentState, AgentTable, Intent};
    pub use crate::combat::Environment;
    pub use crate::components::*;
    pub use crate::config::SimConfig;
    pub use crate::data::{AgentCatalog, AgentTemplate, MobilityData};
    pub use crate::economy::{EconomyLedger, ResourceKind, Stockpile};
    pub use crate::error::{Result, SimError};
    pub use crate::events::{SimEvent, TickEvents, VisibilityObserver};
    pub use crate::factions::Faction;
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::profile::{
        BehaviorProfile, BuildingProfile, EnvironmentalDebuff, Knockback, MeleeProfile,
        RangedProfile, ResourceNodeProfile, WorkerProfile,
    };
    pub use crate::simulation::{Simulation, TickPhase};
    pub use crate::spatial::{GroundProjector, OrthographicCamera, ScreenPoint};
}
