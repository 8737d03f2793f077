//! Agent templates and the catalog that holds them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::components::{Construction, Health, Mobility};
use crate::economy::ResourceKind;
use crate::error::{Result, SimError};
use crate::factions::Faction;
use crate::math::{fixed_decimal, Fixed, Vec2Fixed};
use crate::profile::BehaviorProfile;

/// Locomotion entry of a template.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MobilityData {
    /// Ground speed in units per second.
    #[serde(with = "fixed_decimal")]
    pub speed: Fixed,
    /// Turn rate used for facing interpolation.
    #[serde(with = "fixed_decimal", default = "default_rotation_speed")]
    pub rotation_speed: Fixed,
}

fn default_rotation_speed() -> Fixed {
    Fixed::from_num(8)
}

fn default_radius() -> Fixed {
    Fixed::from_num(0.5)
}

/// Data-driven agent definition.
///
/// # Example RON
///
/// ```ron
/// AgentTemplate(
///     name: "spearman",
///     profile: Melee((range: 1.5, cooldown: 2.0, damage: 10, sensing_range: 8.0)),
///     health: Some(25),
///     radius: 0.5,
///     mobility: Some((speed: 3.0)),
///     health_bar_anchor: Some("head"),
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentTemplate {
    /// Unique template name.
    pub name: String,

    /// Behavior variant and its tuning.
    pub profile: BehaviorProfile,

    /// Maximum hit points. `None` makes the agent undamageable.
    #[serde(default)]
    pub health: Option<u32>,

    /// Collision radius.
    #[serde(with = "fixed_decimal", default = "default_radius")]
    pub radius: Fixed,

    /// Height above the ground, used for picking order.
    #[serde(with = "fixed_decimal", default)]
    pub height: Fixed,

    /// Locomotion. `None` makes the agent static.
    #[serde(default)]
    pub mobility: Option<MobilityData>,

    /// Resources spent when the template is placed as a building.
    #[serde(default)]
    pub cost: BTreeMap<ResourceKind, u32>,

    /// Seconds of single-worker effort needed to construct the building.
    #[serde(with = "fixed_decimal", default)]
    pub build_time: Fixed,

    /// Attachment point the presentation layer hangs the health bar on.
    #[serde(default)]
    pub health_bar_anchor: Option<String>,
}

impl AgentTemplate {
    /// Build a fresh agent from this template.
    ///
    /// The id is assigned when the agent is registered with the simulation.
    #[must_use]
    pub fn instantiate(&self, faction: Option<Faction>, position: Vec2Fixed) -> Agent {
        let mut agent = Agent::new(self.name.clone(), self.profile, position)
            .with_radius(self.radius)
            .with_height(self.height);
        agent.faction = faction;
        agent.health = self.health.map(Health::new);
        agent.mobility = self.mobility.map(|mobility| Mobility {
            speed: mobility.speed,
            rotation_speed: mobility.rotation_speed,
        });
        agent.health_bar = self.health_bar_anchor.is_some();
        agent
    }

    /// Build an agent as an unfinished construction site.
    #[must_use]
    pub fn instantiate_site(&self, faction: Faction, position: Vec2Fixed) -> Agent {
        let mut agent = self.instantiate(Some(faction), position);
        let construction = Construction::new(self.build_time);
        if let Some(health) = agent.health.as_mut() {
            health.set_from_progress(construction.progress);
        }
        agent.construction = Some(construction);
        agent
    }

    /// Check whether the template expects a health bar but names no anchor.
    #[must_use]
    pub fn lacks_health_bar_anchor(&self) -> bool {
        self.health.is_some() && self.health_bar_anchor.is_none()
    }
}

/// All known templates, keyed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentCatalog {
    templates: BTreeMap<String, AgentTemplate>,
}

impl AgentCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a RON list of templates.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let templates: Vec<AgentTemplate> =
            ron::from_str(source).map_err(|err| SimError::DataParseError {
                source_name: "agent catalog".to_string(),
                message: err.to_string(),
            })?;

        let mut catalog = Self::new();
        for template in templates {
            catalog.insert(template);
        }
        Ok(catalog)
    }

    /// Add or replace a template.
    pub fn insert(&mut self, template: AgentTemplate) {
        if self.templates.contains_key(&template.name) {
            tracing::warn!(template = %template.name, "Replacing duplicate agent template");
        }
        self.templates.insert(template.name.clone(), template);
    }

    /// Look a template up by name.
    pub fn get(&self, name: &str) -> Result<&AgentTemplate> {
        self.templates
            .get(name)
            .ok_or_else(|| SimError::TemplateNotFound(name.to_string()))
    }

    /// Template names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Check whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        (
            name: "spearman",
            profile: Melee((range: 1.5, cooldown: 2.0, damage: 10, sensing_range: 8.0)),
            health: Some(25),
            mobility: Some((speed: 3.0)),
            health_bar_anchor: Some("head"),
        ),
        (
            name: "depot",
            profile: Static((accepts_deposits: true)),
            health: Some(400),
            radius: 2.0,
            cost: { Wood: 100 },
            build_time: 20.0,
        ),
        (
            name: "grove",
            profile: ResourceNode((kind: Wood, remaining: 300)),
            radius: 1.5,
        ),
    ]"#;

    #[test]
    fn test_catalog_parses_all_templates() {
        let catalog = AgentCatalog::from_ron_str(CATALOG).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["depot", "grove", "spearman"]);

        let depot = catalog.get("depot").unwrap();
        assert_eq!(depot.cost.get(&ResourceKind::Wood), Some(&100));
        assert_eq!(depot.radius, Fixed::from_num(2));
        assert!(depot.lacks_health_bar_anchor());

        let grove = catalog.get("grove").unwrap();
        assert!(!grove.lacks_health_bar_anchor());
        assert!(grove.mobility.is_none());
    }

    #[test]
    fn test_unknown_template_is_an_error() {
        let catalog = AgentCatalog::new();
        assert!(matches!(
            catalog.get("ghost"),
            Err(SimError::TemplateNotFound(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_malformed_catalog_reports_parse_error() {
        let err = AgentCatalog::from_ron_str("[ ( name: ").unwrap_err();
        assert!(matches!(err, SimError::DataParseError { .. }));
    }

    #[test]
    fn test_instantiate_copies_stats() {
        let catalog = AgentCatalog::from_ron_str(CATALOG).unwrap();
        let spearman = catalog
            .get("spearman")
            .unwrap()
            .instantiate(Some(Faction::Ally), Vec2Fixed::ZERO);

        assert_eq!(spearman.health, Some(Health::new(25)));
        assert_eq!(spearman.mobility.map(|m| m.speed), Some(Fixed::from_num(3)));
        assert_eq!(
            spearman.mobility.map(|m| m.rotation_speed),
            Some(Fixed::from_num(8))
        );
        assert!(spearman.health_bar);
    }

    #[test]
    fn test_site_starts_at_one_hp() {
        let catalog = AgentCatalog::from_ron_str(CATALOG).unwrap();
        let site = catalog
            .get("depot")
            .unwrap()
            .instantiate_site(Faction::Ally, Vec2Fixed::ZERO);
        assert_eq!(site.health.map(|h| h.current), Some(1));
        assert!(site.is_under_construction());
        assert!(!site.is_damageable());
    }
}
