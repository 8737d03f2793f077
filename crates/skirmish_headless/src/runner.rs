//! Headless scenario runner.
//!
//! Drives a [`Scenario`] for a fixed number of ticks, feeding its script
//! into the simulation, and summarises the outcome in a [`RunReport`].
//! [`verify_scenario`] repeats a run in parallel and compares state hashes.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use skirmish_core::economy::{EconomyLedger, ResourceKind};
use skirmish_core::factions::Faction;
use skirmish_core::simulation::Simulation;

use crate::scenario::{Scenario, ScenarioError};

/// Outcome of one headless run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Scenario name.
    pub scenario: String,
    /// Ticks simulated.
    pub ticks: u64,
    /// Final state hash.
    pub state_hash: u64,
    /// Living units per side.
    pub survivors: BTreeMap<Faction, usize>,
    /// Hit points removed over the whole run.
    pub damage_dealt: u64,
    /// Agents removed over the whole run.
    pub retired: usize,
    /// Events recorded over the whole run.
    pub events: usize,
    /// Scripted inputs the simulation refused.
    pub rejected_inputs: usize,
    /// Final ledger balances per side.
    pub stockpiles: BTreeMap<Faction, BTreeMap<ResourceKind, u32>>,
}

impl RunReport {
    /// Save the report as pretty JSON.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load a report saved with [`Self::save`].
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }

    /// The only side with units left, if exactly one has any.
    #[must_use]
    pub fn sole_survivor(&self) -> Option<Faction> {
        let mut standing = self
            .survivors
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(faction, _)| *faction);
        match (standing.next(), standing.next()) {
            (Some(faction), None) => Some(faction),
            _ => None,
        }
    }
}

/// Result of repeating a run and comparing hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Scenario name.
    pub scenario: String,
    /// Ticks per run.
    pub ticks: u64,
    /// Final hash of every run, in run order.
    pub hashes: Vec<u64>,
}

impl VerifyReport {
    /// Check whether every run ended with the same hash.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|pair| pair[0] == pair[1])
    }
}

/// Run `scenario` for `ticks` ticks.
///
/// Script entries are applied before the tick they name. An input the
/// simulation rejects is logged and counted, and the run carries on.
pub fn run_scenario(scenario: &Scenario, ticks: u64) -> Result<RunReport, ScenarioError> {
    let start = Instant::now();
    let mut sim = scenario.build()?;
    let script = scenario.ordered_script();
    let mut next_input = 0;

    let mut damage_dealt = 0;
    let mut retired = 0;
    let mut events = 0;
    let mut rejected_inputs = 0;

    for _ in 0..ticks {
        while let Some(input) = script
            .get(next_input)
            .filter(|input| input.tick <= sim.tick_count())
        {
            if let Err(err) = input.action.apply(&mut sim) {
                warn!(tick = sim.tick_count(), error = %err, "Scripted input rejected");
                rejected_inputs += 1;
            }
            next_input += 1;
        }

        let tick_events = sim.tick();
        damage_dealt += tick_events.total_damage();
        retired += tick_events.retired().len();
        events += tick_events.events.len();
    }

    let report = RunReport {
        scenario: scenario.name.clone(),
        ticks: sim.tick_count(),
        state_hash: sim.state_hash(),
        survivors: count_survivors(&sim),
        damage_dealt,
        retired,
        events,
        rejected_inputs,
        stockpiles: stockpiles(&sim),
    };

    info!(
        scenario = %report.scenario,
        ticks = report.ticks,
        hash = format!("{:016x}", report.state_hash),
        elapsed_secs = start.elapsed().as_secs_f64(),
        "Run complete"
    );
    Ok(report)
}

/// Run `scenario` `runs` times in parallel and collect the final hashes.
pub fn verify_scenario(
    scenario: &Scenario,
    ticks: u64,
    runs: u32,
) -> Result<VerifyReport, ScenarioError> {
    let hashes = (0..runs)
        .into_par_iter()
        .map(|run| {
            let report = run_scenario(scenario, ticks)?;
            debug!(run, hash = report.state_hash, "Verification run finished");
            Ok(report.state_hash)
        })
        .collect::<Result<Vec<u64>, ScenarioError>>()?;

    let report = VerifyReport {
        scenario: scenario.name.clone(),
        ticks,
        hashes,
    };
    if !report.is_deterministic() {
        warn!(scenario = %report.scenario, hashes = ?report.hashes, "Runs diverged");
    }
    Ok(report)
}

fn count_survivors(sim: &Simulation) -> BTreeMap<Faction, usize> {
    let mut survivors: BTreeMap<Faction, usize> =
        Faction::ALL.iter().map(|&faction| (faction, 0)).collect();
    for agent in sim.agents().iter() {
        if !agent.profile.is_unit() || !agent.is_alive() {
            continue;
        }
        if let Some(faction) = agent.faction {
            *survivors.entry(faction).or_default() += 1;
        }
    }
    survivors
}

fn stockpiles(sim: &Simulation) -> BTreeMap<Faction, BTreeMap<ResourceKind, u32>> {
    Faction::ALL
        .iter()
        .filter_map(|&faction| {
            let ledger = sim.ledger(faction)?;
            let balances = ResourceKind::ALL
                .iter()
                .map(|&kind| (kind, ledger.amount(kind)))
                .collect();
            Some((faction, balances))
        })
        .collect()
}
