//! Fixtures and harnesses shared by the skirmish test suites.
//!
//! - [`fixtures`]: reference profiles, agents, catalogs and scenarios
//! - [`determinism`]: replay harness plus `proptest` strategies
//!
//! Only integration tests, benches and downstream crates should depend on
//! this crate. Unit tests inside `skirmish_core` build their own agents.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;

pub use proptest;
