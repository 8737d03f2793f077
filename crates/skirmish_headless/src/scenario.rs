//! Scenario loading and configuration.
//!
//! A scenario bundles everything needed to start a headless run: the
//! simulation config, the agent templates, where to place agents, starting
//! stockpiles, and a script of player inputs keyed by tick.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use skirmish_core::combat::Environment;
use skirmish_core::config::SimConfig;
use skirmish_core::data::{AgentCatalog, AgentTemplate};
use skirmish_core::economy::{ResourceKind, Stockpile};
use skirmish_core::error::SimError;
use skirmish_core::factions::Faction;
use skirmish_core::math::{vec2_decimal, Fixed, Vec2Fixed};
use skirmish_core::simulation::Simulation;

/// Built-in scenario used when no file is given.
const DEFAULT_SCENARIO: &str = include_str!("../scenarios/skirmish.ron");

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The simulation rejected part of the setup.
    #[error("Scenario setup failed: {0}")]
    Setup(#[from] SimError),
}

/// One or more agents stamped from a template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Placement {
    /// Template name.
    pub template: String,
    /// Owning side. `None` for neutral agents such as resource nodes.
    #[serde(default)]
    pub faction: Option<Faction>,
    /// Position of the first agent.
    #[serde(with = "vec2_decimal")]
    pub position: Vec2Fixed,
    /// Number of agents to place.
    #[serde(default = "default_count")]
    pub count: u32,
    /// Offset between successive agents.
    #[serde(with = "vec2_decimal", default = "default_spacing")]
    pub spacing: Vec2Fixed,
    /// Mark placed resource nodes as gather targets.
    #[serde(default)]
    pub marked: bool,
}

fn default_count() -> u32 {
    1
}

fn default_spacing() -> Vec2Fixed {
    Vec2Fixed::new(Fixed::ZERO, Fixed::from_num(1.5))
}

impl Placement {
    /// Place `count` agents of `template` in a line starting at `(x, y)`.
    #[must_use]
    pub fn new(template: &str, faction: Option<Faction>, x: i32, y: i32, count: u32) -> Self {
        Self {
            template: template.to_string(),
            faction,
            position: Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y)),
            count,
            spacing: default_spacing(),
            marked: false,
        }
    }

    /// Positions of every agent this placement creates.
    pub fn positions(&self) -> impl Iterator<Item = Vec2Fixed> + '_ {
        (0..self.count).map(|i| self.position + self.spacing.scale(Fixed::from_num(i)))
    }
}

/// A player input fed to the simulation before a given tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptedInput {
    /// Tick before which the input is applied.
    pub tick: u64,
    /// What the player does.
    pub action: ScriptAction,
}

/// Player actions a script can perform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScriptAction {
    /// Click the ground; selects the topmost agent there.
    LeftClick {
        /// Ground point.
        #[serde(with = "vec2_decimal")]
        at: Vec2Fixed,
    },
    /// Drag a selection rectangle.
    BoxSelect {
        /// First corner.
        #[serde(with = "vec2_decimal")]
        from: Vec2Fixed,
        /// Opposite corner.
        #[serde(with = "vec2_decimal")]
        to: Vec2Fixed,
    },
    /// Command the selection toward a point or the agent under it.
    RightClick {
        /// Ground point.
        #[serde(with = "vec2_decimal")]
        at: Vec2Fixed,
    },
    /// Place a building and send selected workers to raise it.
    Build {
        /// Building template.
        template: String,
        /// Site centre.
        #[serde(with = "vec2_decimal")]
        at: Vec2Fixed,
    },
    /// Change the battlefield environment.
    SetEnvironment(Environment),
}

impl ScriptAction {
    /// Feed this action into the simulation.
    ///
    /// # Errors
    ///
    /// Returns the simulation's error when a build cannot be placed.
    pub fn apply(&self, sim: &mut Simulation) -> Result<(), SimError> {
        match self {
            Self::LeftClick { at } => sim.left_click(*at),
            Self::BoxSelect { from, to } => {
                sim.box_select(*from, *to);
            }
            Self::RightClick { at } => {
                sim.right_click(*at);
            }
            Self::Build { template, at } => {
                sim.build_at(template, *at)?;
            }
            Self::SetEnvironment(environment) => sim.set_environment(*environment),
        }
        Ok(())
    }
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Simulation tuning.
    #[serde(default)]
    pub config: SimConfig,
    /// Agent templates available to placements and builds.
    #[serde(default)]
    pub templates: Vec<AgentTemplate>,
    /// Agents present at tick zero.
    #[serde(default)]
    pub placements: Vec<Placement>,
    /// Opening stockpile per side.
    #[serde(default)]
    pub starting_resources: BTreeMap<Faction, BTreeMap<ResourceKind, u32>>,
    /// Player inputs by tick.
    #[serde(default)]
    pub script: Vec<ScriptedInput>,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// The built-in skirmish: two small armies, a worker camp and a forest.
    pub fn skirmish() -> Result<Self, ScenarioError> {
        Self::from_ron_str(DEFAULT_SCENARIO)
    }

    /// Template catalog built from [`Self::templates`].
    #[must_use]
    pub fn catalog(&self) -> AgentCatalog {
        let mut catalog = AgentCatalog::new();
        for template in &self.templates {
            catalog.insert(template.clone());
        }
        catalog
    }

    /// Script entries in the order they should be applied.
    #[must_use]
    pub fn ordered_script(&self) -> Vec<&ScriptedInput> {
        let mut script: Vec<&ScriptedInput> = self.script.iter().collect();
        script.sort_by_key(|input| input.tick);
        script
    }

    /// Build a ready-to-run simulation.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or a placement names an
    /// unknown template.
    pub fn build(&self) -> Result<Simulation, ScenarioError> {
        let mut sim = Simulation::from_config(self.config.clone())?.with_catalog(self.catalog());
        for faction in Faction::ALL {
            let balances = self
                .starting_resources
                .get(&faction)
                .cloned()
                .unwrap_or_default();
            sim = sim.with_ledger(faction, Stockpile::with_balances(balances));
        }

        for placement in &self.placements {
            for position in placement.positions() {
                let id = sim.spawn_from_template(&placement.template, placement.faction, position)?;
                if placement.marked {
                    sim.mark_gather_target(id);
                }
            }
        }

        tracing::debug!(
            scenario = %self.name,
            agents = sim.agents().len(),
            "Scenario built"
        );
        Ok(sim)
    }
}
