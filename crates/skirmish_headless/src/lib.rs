//! Headless scenario runner for CI verification.
//!
//! Loads a RON [`Scenario`], drives the simulation for a fixed number of
//! ticks without any presentation layer, and reports the outcome:
//!
//! - **Runs**: final state hash, survivors, damage and stockpiles
//! - **Determinism checks**: the same scenario run many times in parallel
//!   must end with identical hashes
//!
//! # Example
//!
//! ```bash
//! # Run the built-in skirmish for 30 seconds of game time
//! cargo run -p skirmish_headless -- run --ticks 600
//!
//! # Run a scenario file and print the report as JSON
//! cargo run -p skirmish_headless -- run --scenario scenarios/skirmish.ron --json
//!
//! # Verify determinism
//! cargo run -p skirmish_headless -- verify --runs 8
//! ```

pub mod runner;
pub mod scenario;

pub use runner::{run_scenario, verify_scenario, RunReport, VerifyReport};
pub use scenario::{Placement, Scenario, ScenarioError, ScriptAction, ScriptedInput};
