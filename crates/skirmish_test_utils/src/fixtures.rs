//! Test fixtures and helpers.
//!
//! Pre-built profiles, agents and simulations for consistent testing. The
//! numbers match the reference scenarios used across the test suites: a
//! spearman with reach 1.5 hitting for 10 every 2 seconds, an archer with
//! range 10 firing projectiles at 20 units per second, and so on.

use fixed::types::I32F32;
use skirmish_core::agent::Agent;
use skirmish_core::data::{AgentCatalog, AgentTemplate, MobilityData};
use skirmish_core::economy::{ResourceKind, Stockpile};
use skirmish_core::factions::Faction;
use skirmish_core::math::Vec2Fixed;
use skirmish_core::profile::{
    BehaviorProfile, BuildingProfile, EnvironmentalDebuff, Knockback, MeleeProfile,
    RangedProfile, ResourceNodeProfile, WorkerProfile,
};
use skirmish_core::simulation::Simulation;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Ground point from floats.
#[must_use]
pub fn vec2(x: f64, y: f64) -> Vec2Fixed {
    Vec2Fixed::new(fixed_f(x), fixed_f(y))
}

/// Plain melee: reach 1.5, cooldown 2 s, 10 damage, sensing 8.
#[must_use]
pub fn melee_profile() -> MeleeProfile {
    MeleeProfile {
        range: fixed_f(1.5),
        cooldown: fixed(2),
        damage: 10,
        sensing_range: fixed(8),
        knockback: None,
    }
}

/// Melee with a 0.25 s expand, 0.25 s shrink and 0.5 s push.
#[must_use]
pub fn knockback_profile() -> MeleeProfile {
    MeleeProfile {
        range: fixed(2),
        knockback: Some(Knockback {
            expand_time: fixed_f(0.25),
            shrink_time: fixed_f(0.25),
            push_time: fixed_f(0.5),
        }),
        ..melee_profile()
    }
}

/// Single-shot ranged: range 10, cooldown 1.5 s, 8 damage, speed 20.
#[must_use]
pub fn ranged_profile() -> RangedProfile {
    RangedProfile {
        range: fixed(10),
        cooldown: fixed_f(1.5),
        damage: 8,
        sensing_range: fixed(12),
        projectile_count: 1,
        volley_delay: fixed_f(0.1),
        projectile_speed: fixed(20),
        environmental_debuff: None,
    }
}

/// Ranged that fires at half range and half damage at night.
#[must_use]
pub fn debuffed_ranged_profile() -> RangedProfile {
    RangedProfile {
        environmental_debuff: Some(EnvironmentalDebuff {
            range_factor: fixed_f(0.5),
            damage_factor: fixed_f(0.5),
        }),
        ..ranged_profile()
    }
}

/// Worker: carries 10, gathers 2 per collection, reaches 1 past an edge.
#[must_use]
pub fn worker_profile() -> WorkerProfile {
    WorkerProfile {
        carry_capacity: 10,
        gather_rate: 2,
        fetch_range: fixed(1),
        build_power: fixed(1),
    }
}

/// Mobile unit with health 25 and radius 0.5.
#[must_use]
pub fn unit(profile: BehaviorProfile, faction: Faction, position: Vec2Fixed) -> Agent {
    Agent::new(template_name(&profile), profile, position)
        .with_faction(faction)
        .with_health(25)
        .with_radius(fixed_f(0.5))
        .with_mobility(fixed(3), fixed(8))
}

/// Plain melee unit.
#[must_use]
pub fn melee_unit(faction: Faction, position: Vec2Fixed) -> Agent {
    unit(BehaviorProfile::Melee(melee_profile()), faction, position)
}

/// Ranged unit.
#[must_use]
pub fn ranged_unit(faction: Faction, position: Vec2Fixed) -> Agent {
    unit(BehaviorProfile::Ranged(ranged_profile()), faction, position)
}

/// Worker unit.
#[must_use]
pub fn worker(faction: Faction, position: Vec2Fixed) -> Agent {
    unit(BehaviorProfile::Worker(worker_profile()), faction, position)
        .with_health(40)
}

/// Finished depot building with radius 1.5.
#[must_use]
pub fn depot(faction: Faction, position: Vec2Fixed) -> Agent {
    Agent::new(
        "town_hall",
        BehaviorProfile::ProductionBuilding(BuildingProfile {
            accepts_deposits: true,
        }),
        position,
    )
    .with_faction(faction)
    .with_health(500)
    .with_radius(fixed_f(1.5))
    .with_height(fixed(4))
}

/// Finished static building (a wall segment).
#[must_use]
pub fn wall(faction: Faction, position: Vec2Fixed) -> Agent {
    Agent::new(
        "wall",
        BehaviorProfile::Static(BuildingProfile::default()),
        position,
    )
    .with_faction(faction)
    .with_health(300)
    .with_radius(fixed(1))
    .with_height(fixed(2))
}

/// Neutral resource node.
#[must_use]
pub fn resource_node(kind: ResourceKind, remaining: u32, position: Vec2Fixed) -> Agent {
    Agent::new(
        "resource_node",
        BehaviorProfile::ResourceNode(ResourceNodeProfile {
            kind,
            remaining,
            marked: false,
        }),
        position,
    )
    .with_radius(fixed(1))
}

fn template_name(profile: &BehaviorProfile) -> &'static str {
    match profile {
        BehaviorProfile::Melee(_) => "spearman",
        BehaviorProfile::Ranged(_) => "archer",
        BehaviorProfile::Worker(_) => "peasant",
        BehaviorProfile::Static(_) => "wall",
        BehaviorProfile::ProductionBuilding(_) => "barracks",
        BehaviorProfile::ResourceNode(_) => "resource_node",
    }
}

/// Catalog with a unit of every kind and two buildings.
#[must_use]
pub fn sample_catalog() -> AgentCatalog {
    let mobile = Some(MobilityData {
        speed: fixed(3),
        rotation_speed: fixed(8),
    });
    let mut catalog = AgentCatalog::new();

    for (name, profile, health) in [
        ("spearman", BehaviorProfile::Melee(melee_profile()), 25),
        ("ogre", BehaviorProfile::Melee(knockback_profile()), 60),
        ("archer", BehaviorProfile::Ranged(ranged_profile()), 20),
        (
            "crossbowman",
            BehaviorProfile::Ranged(debuffed_ranged_profile()),
            20,
        ),
        ("peasant", BehaviorProfile::Worker(worker_profile()), 40),
    ] {
        catalog.insert(AgentTemplate {
            name: name.to_string(),
            profile,
            health: Some(health),
            radius: fixed_f(0.5),
            height: fixed(1),
            mobility: mobile,
            cost: [(ResourceKind::Food, 50)].into_iter().collect(),
            build_time: fixed(0),
            health_bar_anchor: Some("head".to_string()),
        });
    }

    catalog.insert(AgentTemplate {
        name: "barracks".to_string(),
        profile: BehaviorProfile::ProductionBuilding(BuildingProfile {
            accepts_deposits: false,
        }),
        health: Some(400),
        radius: fixed(2),
        height: fixed(4),
        mobility: None,
        cost: [(ResourceKind::Wood, 100)].into_iter().collect(),
        build_time: fixed(8),
        health_bar_anchor: Some("roof".to_string()),
    });
    catalog.insert(AgentTemplate {
        name: "granary".to_string(),
        profile: BehaviorProfile::Static(BuildingProfile {
            accepts_deposits: true,
        }),
        health: Some(250),
        radius: fixed_f(1.5),
        height: fixed(3),
        mobility: None,
        cost: [(ResourceKind::Wood, 50), (ResourceKind::Stone, 20)]
            .into_iter()
            .collect(),
        build_time: fixed(4),
        health_bar_anchor: Some("roof".to_string()),
    });
    catalog
}

/// Simulation with the sample catalog and 500 of every resource for both sides.
#[must_use]
pub fn stocked_simulation() -> Simulation {
    let stockpile = || Stockpile::with_balances(ResourceKind::ALL.map(|kind| (kind, 500)));
    Simulation::new()
        .with_catalog(sample_catalog())
        .with_ledger(Faction::Ally, stockpile())
        .with_ledger(Faction::Enemy, stockpile())
}

/// Two lines of five melee and three ranged units facing each other.
#[must_use]
pub fn skirmish_scenario() -> Simulation {
    let mut sim = Simulation::new();
    for i in 0..5 {
        let y = f64::from(i) * 1.5;
        sim.spawn(melee_unit(Faction::Ally, vec2(0.0, y)));
        sim.spawn(melee_unit(Faction::Enemy, vec2(12.0, y)));
    }
    for i in 0..3 {
        let y = f64::from(i) * 2.0;
        sim.spawn(ranged_unit(Faction::Ally, vec2(-4.0, y)));
        sim.spawn(ranged_unit(Faction::Enemy, vec2(16.0, y)));
    }
    sim
}

/// Three workers, a depot and a marked wood node.
#[must_use]
pub fn economy_scenario() -> Simulation {
    let mut sim = Simulation::new();
    sim.spawn(depot(Faction::Ally, vec2(0.0, 0.0)));
    let node = sim.spawn(resource_node(ResourceKind::Wood, 60, vec2(10.0, 0.0)));
    sim.mark_gather_target(node);

    for i in 0..3 {
        let id = sim.spawn(worker(Faction::Ally, vec2(3.0, f64::from(i) * 1.5)));
        sim.issue_command(id, vec2(10.0, 0.0), Some(node));
    }
    sim
}
