//! Data-driven agent definitions.
//!
//! Templates are plain data deserialized from RON. This module contains no
//! file IO: callers hand in the text and get typed templates back.

mod agent_data;

pub use agent_data::{AgentCatalog, AgentTemplate, MobilityData};
