//! Scenario tests that drive the full tick loop.
//!
//! Each test builds a small battlefield from the shared fixtures, feeds
//! input through the public dispatch calls and checks the observable
//! outcome: agent state, hit points, ledgers and emitted events.

use skirmish_core::agent::{AgentState, Intent};
use skirmish_core::combat::Environment;
use skirmish_core::economy::ResourceKind;
use skirmish_core::events::{SimEvent, TickEvents};
use skirmish_core::factions::Faction;
use skirmish_core::math::Fixed;
use skirmish_core::profile::BehaviorProfile;
use skirmish_core::scheduler::Continuation;
use skirmish_core::simulation::Simulation;
use skirmish_core::spatial::{OrthographicCamera, ScreenPoint};
use skirmish_test_utils::fixtures::{
    debuffed_ranged_profile, depot, fixed_f, knockback_profile, melee_unit, ranged_unit,
    resource_node, stocked_simulation, unit, vec2, wall, worker,
};

/// Tick until the simulation has completed tick `last`, collecting events.
fn run_through(sim: &mut Simulation, last: u64) -> Vec<TickEvents> {
    let mut collected = Vec::new();
    while sim.tick_count() <= last {
        collected.push(sim.tick());
    }
    collected
}

fn hp(sim: &Simulation, id: u64) -> Option<u32> {
    sim.agent(id).and_then(|agent| agent.health).map(|health| health.current)
}

fn damage_ticks(events: &[TickEvents], target: u64) -> Vec<u64> {
    events
        .iter()
        .filter(|tick| {
            tick.events.iter().any(|event| {
                matches!(event, SimEvent::DamageDealt { target: t, amount, .. } if *t == target && *amount > 0)
            })
        })
        .map(|tick| tick.tick)
        .collect()
}

fn close(a: Fixed, b: Fixed) -> bool {
    (a - b).abs() < fixed_f(0.001)
}

// =============================================================================
// Combat
// =============================================================================

#[test]
fn melee_contact_respects_cooldown() {
    let mut sim = Simulation::new();
    sim.spawn(melee_unit(Faction::Ally, vec2(0.0, 0.0)));
    let target = sim.spawn(melee_unit(Faction::Enemy, vec2(1.0, 0.0)));

    sim.tick();
    assert_eq!(hp(&sim, target), Some(15));

    run_through(&mut sim, 20);
    assert_eq!(hp(&sim, target), Some(15));

    run_through(&mut sim, 42);
    assert_eq!(hp(&sim, target), Some(5));
}

#[test]
fn melee_kill_retires_target() {
    let mut sim = Simulation::new();
    let attacker = sim.spawn(melee_unit(Faction::Ally, vec2(0.0, 0.0)));
    let target = sim.spawn(melee_unit(Faction::Enemy, vec2(1.0, 0.0)).with_health(15));

    let events = run_through(&mut sim, 40);
    assert!(sim.agent(target).is_none());
    assert!(events.iter().any(|tick| tick.retired() == vec![target]));

    // Nothing left to fight: the survivor stands down
    sim.tick();
    let survivor = sim.agent(attacker).unwrap();
    assert_eq!(survivor.state, AgentState::Idle);
    assert!(survivor.lock.is_none());
}

#[test]
fn repeated_trigger_inside_cooldown_is_idempotent() {
    let mut sim = Simulation::new();
    let attacker = sim.spawn(melee_unit(Faction::Ally, vec2(0.0, 0.0)));
    let target = sim.spawn(wall(Faction::Enemy, vec2(1.5, 0.0)));

    sim.tick();
    assert_eq!(hp(&sim, target), Some(290));

    assert!(!sim.trigger_attack(attacker));
    assert!(!sim.trigger_attack(attacker));
    sim.tick();
    assert_eq!(hp(&sim, target), Some(290));
}

#[test]
fn fractional_cooldown_never_fires_early() {
    // 0.32 s is 6.4 ticks at 20 Hz: starts must be 7 ticks apart
    let mut profile = skirmish_test_utils::fixtures::melee_profile();
    profile.cooldown = fixed_f(0.32);

    let mut sim = Simulation::new();
    let attacker = sim.spawn(unit(BehaviorProfile::Melee(profile), Faction::Ally, vec2(0.0, 0.0)));
    let target = sim.spawn(wall(Faction::Enemy, vec2(1.5, 0.0)));

    let starts: Vec<u64> = run_through(&mut sim, 40)
        .iter()
        .filter(|tick| tick.events.contains(&SimEvent::AttackStarted { attacker, target }))
        .map(|tick| tick.tick)
        .collect();

    assert!(starts.len() > 2);
    for pair in starts.windows(2) {
        let gap = (pair[1] - pair[0]) as f64 / 20.0;
        assert!(gap >= 0.32, "attack starts {gap}s apart");
    }
}

#[test]
fn short_reach_melee_attacks_from_contact() {
    // Reach 0.4 is shorter than the attacker's own radius of 0.5
    let mut profile = skirmish_test_utils::fixtures::melee_profile();
    profile.range = fixed_f(0.4);

    let mut sim = Simulation::new();
    let attacker = sim.spawn(unit(BehaviorProfile::Melee(profile), Faction::Ally, vec2(0.0, 0.0)));
    let target = sim.spawn(wall(Faction::Enemy, vec2(5.0, 0.0)));

    run_through(&mut sim, 200);
    assert!(hp(&sim, target).is_some_and(|hp| hp < 300));
    assert_eq!(
        sim.agent(attacker).unwrap().state,
        AgentState::Attacking { target }
    );
}

#[test]
fn ranged_projectile_lands_after_travel() {
    let mut sim = Simulation::new();
    let archer = sim.spawn(ranged_unit(Faction::Ally, vec2(0.0, 0.0)));
    let target = sim.spawn(wall(Faction::Enemy, vec2(8.0, 0.0)));

    let first = sim.tick();
    assert!(first.events.iter().any(|event| matches!(
        event,
        SimEvent::ProjectileSpawned { source, target: t, .. } if *source == archer && *t == target
    )));
    assert_eq!(sim.projectiles().len(), 1);

    let events = run_through(&mut sim, 10);
    assert_eq!(damage_ticks(&events, target), vec![8]);
    assert_eq!(hp(&sim, target), Some(292));
    assert!(sim.projectiles().is_empty());
}

#[test]
fn projectile_fizzles_when_target_dies_in_flight() {
    let mut sim = Simulation::new();
    sim.spawn(ranged_unit(Faction::Ally, vec2(0.0, 0.0)));
    let target = sim.spawn(wall(Faction::Enemy, vec2(8.0, 0.0)));

    sim.tick();
    sim.despawn(target).unwrap();
    let events = sim.tick();

    assert!(events
        .events
        .iter()
        .any(|event| matches!(event, SimEvent::ProjectileFizzled { .. })));
    assert!(sim.projectiles().is_empty());
}

#[test]
fn volley_fires_every_shot() {
    let mut profile = skirmish_test_utils::fixtures::ranged_profile();
    profile.projectile_count = 3;
    profile.volley_delay = fixed_f(0.1);

    let mut sim = Simulation::new();
    sim.spawn(unit(BehaviorProfile::Ranged(profile), Faction::Ally, vec2(0.0, 0.0)));
    let target = sim.spawn(wall(Faction::Enemy, vec2(6.0, 0.0)));

    let events = run_through(&mut sim, 12);
    let spawned = events
        .iter()
        .flat_map(|tick| tick.events.iter())
        .filter(|event| matches!(event, SimEvent::ProjectileSpawned { .. }))
        .count();
    assert_eq!(spawned, 3);
    assert_eq!(hp(&sim, target), Some(300 - 3 * 8));
}

#[test]
fn knockback_swing_pushes_enemy_out_of_reach() {
    let mut sim = Simulation::new();
    let mut ogre = unit(BehaviorProfile::Melee(knockback_profile()), Faction::Ally, vec2(0.0, 0.0));
    ogre.mobility = None;
    let ogre = sim.spawn(ogre);
    let victim = sim.spawn(melee_unit(Faction::Enemy, vec2(1.5, 0.0)));

    let events = run_through(&mut sim, 5);
    let peak = events.last().unwrap();
    assert_eq!(peak.tick, 5);
    assert!(peak.events.iter().any(|event| matches!(
        event,
        SimEvent::KnockedBack { attacker, target, .. } if *attacker == ogre && *target == victim
    )));
    assert_eq!(hp(&sim, victim), Some(15));

    run_through(&mut sim, 15);
    let pushed = sim.agent(victim).unwrap().position;
    // range 2 plus the default margin of 0.5
    assert!(close(pushed.x, fixed_f(2.5)));
    assert!(close(pushed.y, Fixed::ZERO));
}

#[test]
fn knockback_swing_finishes_after_shrink() {
    let mut sim = Simulation::new();
    let mut ogre = unit(BehaviorProfile::Melee(knockback_profile()), Faction::Ally, vec2(0.0, 0.0));
    ogre.mobility = None;
    let ogre = sim.spawn(ogre);
    sim.spawn(wall(Faction::Enemy, vec2(2.0, 0.0)));

    let events = run_through(&mut sim, 12);
    let finished: Vec<u64> = events
        .iter()
        .filter(|tick| {
            tick.events
                .contains(&SimEvent::SwingFinished { attacker: ogre })
        })
        .map(|tick| tick.tick)
        .collect();
    assert_eq!(finished, vec![10]);
}

#[test]
fn night_debuff_shortens_range_and_damage() {
    let mut sim = Simulation::new();
    let crossbow = sim.spawn(unit(
        BehaviorProfile::Ranged(debuffed_ranged_profile()),
        Faction::Ally,
        vec2(0.0, 0.0),
    ));
    let far = sim.spawn(wall(Faction::Enemy, vec2(7.0, 0.0)));

    sim.set_environment(Environment::Night);
    sim.tick();
    assert_eq!(
        sim.agent(crossbow).unwrap().state,
        AgentState::Moving {
            destination: vec2(7.0, 0.0),
            intent: Intent::Engage(far),
        }
    );

    let mut sim = Simulation::new();
    sim.spawn(unit(
        BehaviorProfile::Ranged(debuffed_ranged_profile()),
        Faction::Ally,
        vec2(0.0, 0.0),
    ));
    let near = sim.spawn(wall(Faction::Enemy, vec2(4.0, 0.0)));
    sim.set_environment(Environment::Night);

    let events = run_through(&mut sim, 6);
    assert_eq!(damage_ticks(&events, near), vec![4]);
    assert_eq!(hp(&sim, near), Some(296));
}

#[test]
fn daylight_debuffed_archer_fires_at_full_range() {
    let mut sim = Simulation::new();
    let crossbow = sim.spawn(unit(
        BehaviorProfile::Ranged(debuffed_ranged_profile()),
        Faction::Ally,
        vec2(0.0, 0.0),
    ));
    let target = sim.spawn(wall(Faction::Enemy, vec2(7.0, 0.0)));

    sim.tick();
    assert_eq!(
        sim.agent(crossbow).unwrap().state,
        AgentState::Attacking { target }
    );
}

#[test]
fn out_of_range_melee_closes_in_then_attacks() {
    let mut sim = Simulation::new();
    let attacker = sim.spawn(melee_unit(Faction::Ally, vec2(0.0, 0.0)));
    let target = sim.spawn(wall(Faction::Enemy, vec2(5.0, 0.0)));

    sim.tick();
    assert!(matches!(
        sim.agent(attacker).unwrap().state,
        AgentState::Moving { intent: Intent::Engage(t), .. } if t == target
    ));

    run_through(&mut sim, 60);
    assert_eq!(
        sim.agent(attacker).unwrap().state,
        AgentState::Attacking { target }
    );
    assert!(hp(&sim, target).unwrap() < 300);
}

#[test]
fn unfinished_buildings_are_not_targets() {
    let mut sim = stocked_simulation();
    let site = sim
        .place_building("barracks", Faction::Enemy, vec2(3.0, 0.0))
        .unwrap();
    let soldier = sim.spawn(melee_unit(Faction::Ally, vec2(0.0, 0.0)));

    run_through(&mut sim, 20);
    assert_eq!(sim.agent(soldier).unwrap().state, AgentState::Idle);
    assert_eq!(hp(&sim, site), Some(1));
}

// =============================================================================
// Selection and dispatch
// =============================================================================

#[test]
fn box_select_takes_units_only() {
    let mut sim = Simulation::new();
    let a = sim.spawn(worker(Faction::Ally, vec2(1.0, 1.0)));
    let b = sim.spawn(worker(Faction::Ally, vec2(2.0, 2.0)));
    let c = sim.spawn(worker(Faction::Ally, vec2(3.0, 1.0)));
    sim.spawn(depot(Faction::Ally, vec2(2.0, 4.0)));
    sim.spawn(worker(Faction::Ally, vec2(9.0, 9.0)));

    assert_eq!(sim.box_select(vec2(4.0, 5.0), vec2(0.0, 0.0)), 3);
    assert_eq!(sim.selection().iter().collect::<Vec<_>>(), vec![a, b, c]);

    let selected = sim
        .pending_events()
        .iter()
        .filter(|event| matches!(event, SimEvent::Selected { .. }))
        .count();
    assert_eq!(selected, 3);
}

#[test]
fn box_select_replaces_previous_selection() {
    let mut sim = Simulation::new();
    let first = sim.spawn(worker(Faction::Ally, vec2(0.0, 0.0)));
    let second = sim.spawn(worker(Faction::Ally, vec2(10.0, 0.0)));

    sim.box_select(vec2(-1.0, -1.0), vec2(1.0, 1.0));
    sim.box_select(vec2(9.0, -1.0), vec2(11.0, 1.0));

    assert!(!sim.selection().contains(first));
    assert!(sim.selection().contains(second));
    assert!(sim
        .pending_events()
        .contains(&SimEvent::Deselected { agent: first }));
}

#[test]
fn left_click_picks_topmost_agent() {
    let mut sim = Simulation::new();
    let peasant = sim.spawn(worker(Faction::Ally, vec2(0.8, 0.0)));
    let hall = sim.spawn(depot(Faction::Ally, vec2(0.0, 0.0)));

    sim.left_click(vec2(0.5, 0.0));
    assert_eq!(sim.selection().iter().collect::<Vec<_>>(), vec![hall]);

    sim.left_click(vec2(20.0, 20.0));
    assert!(sim.selection().is_empty());
    assert_ne!(peasant, hall);
}

#[test]
fn double_click_requests_focus() {
    let mut sim = Simulation::new();
    let peasant = sim.spawn(worker(Faction::Ally, vec2(0.0, 0.0)));

    sim.left_click(vec2(0.1, 0.0));
    sim.tick();
    sim.left_click(vec2(0.0, 0.1));

    assert!(sim
        .pending_events()
        .contains(&SimEvent::FocusRequested { agent: peasant }));
    assert!(sim.selection().contains(peasant));
}

#[test]
fn slow_second_click_is_not_a_double_click() {
    let mut sim = Simulation::new();
    let peasant = sim.spawn(worker(Faction::Ally, vec2(0.0, 0.0)));

    sim.left_click(vec2(0.0, 0.0));
    run_through(&mut sim, 20);
    sim.left_click(vec2(0.0, 0.0));

    assert!(!sim
        .pending_events()
        .contains(&SimEvent::FocusRequested { agent: peasant }));
    assert!(sim.selection().contains(peasant));
}

#[test]
fn screen_clicks_project_through_the_camera() {
    let mut sim = Simulation::new();
    let peasant = sim.spawn(worker(Faction::Ally, vec2(0.0, 0.0)));
    let camera = OrthographicCamera::top_down(vec2(0.0, 0.0), (800, 600), fixed_f(0.05));

    sim.left_click_screen(&camera, ScreenPoint::new(400, 300));
    assert!(sim.selection().contains(peasant));

    assert_eq!(sim.right_click_screen(&camera, ScreenPoint::new(600, 300)), 1);
    assert_eq!(sim.pending_commands().len(), 1);
}

#[test]
fn command_without_target_is_plain_travel() {
    let mut sim = Simulation::new();
    let soldier = sim.spawn(melee_unit(Faction::Ally, vec2(0.0, 0.0)));
    let peasant = sim.spawn(worker(Faction::Ally, vec2(0.0, 5.0)));

    sim.issue_command(soldier, vec2(20.0, 0.0), None);
    sim.issue_command(peasant, vec2(20.0, 5.0), None);
    sim.tick();

    for (id, destination) in [(soldier, vec2(20.0, 0.0)), (peasant, vec2(20.0, 5.0))] {
        let agent = sim.agent(id).unwrap();
        assert_eq!(
            agent.state,
            AgentState::Moving {
                destination,
                intent: Intent::Travel,
            }
        );
        assert!(agent.lock.is_none());
    }
}

#[test]
fn travel_arrives_and_idles() {
    let mut sim = Simulation::new();
    let peasant = sim.spawn(worker(Faction::Ally, vec2(0.0, 0.0)));
    sim.issue_command(peasant, vec2(3.0, 0.0), None);

    run_through(&mut sim, 40);
    let agent = sim.agent(peasant).unwrap();
    assert_eq!(agent.state, AgentState::Idle);
    assert!(agent.order.is_none());
    assert!(agent.position.distance(vec2(3.0, 0.0)) <= sim.config().arrival_epsilon);
}

#[test]
fn order_survives_deselection() {
    let mut sim = Simulation::new();
    let peasant = sim.spawn(worker(Faction::Ally, vec2(0.0, 0.0)));

    sim.left_click(vec2(0.0, 0.0));
    assert_eq!(sim.right_click(vec2(15.0, 0.0)), 1);
    sim.clear_selection();
    sim.tick();

    let agent = sim.agent(peasant).unwrap();
    assert!(agent.order.is_some());
    assert!(matches!(agent.state, AgentState::Moving { intent: Intent::Travel, .. }));
}

#[test]
fn enemy_and_static_agents_ignore_commands() {
    let mut sim = Simulation::new();
    let enemy = sim.spawn(melee_unit(Faction::Enemy, vec2(0.0, 0.0)));
    let barrier = sim.spawn(wall(Faction::Ally, vec2(10.0, 0.0)));

    assert!(!sim.issue_command(enemy, vec2(5.0, 5.0), None));
    assert!(!sim.issue_command(barrier, vec2(5.0, 5.0), None));
    assert!(sim.pending_commands().is_empty());
}

#[test]
fn attack_command_locks_target_explicitly() {
    let mut sim = Simulation::new();
    let soldier = sim.spawn(melee_unit(Faction::Ally, vec2(0.0, 0.0)));
    let near = sim.spawn(wall(Faction::Enemy, vec2(4.0, 0.0)));
    let far = sim.spawn(wall(Faction::Enemy, vec2(0.0, 20.0)));

    sim.issue_command(soldier, vec2(0.0, 20.0), Some(far));
    sim.tick();

    let agent = sim.agent(soldier).unwrap();
    assert_eq!(agent.lock.map(|lock| (lock.target, lock.explicit)), Some((far, true)));
    assert!(matches!(agent.state, AgentState::Moving { intent: Intent::Engage(t), .. } if t == far));
    assert_ne!(near, far);
}

#[test]
fn new_command_cancels_knockback_swing() {
    let mut sim = Simulation::new();
    let ogre = sim.spawn(unit(
        BehaviorProfile::Melee(knockback_profile()),
        Faction::Ally,
        vec2(0.0, 0.0),
    ));
    let victim = sim.spawn(wall(Faction::Enemy, vec2(2.0, 0.0)));

    sim.tick();
    assert!(sim.scheduler().pending_for(ogre).next().is_some());

    sim.issue_command(ogre, vec2(-20.0, 0.0), None);
    run_through(&mut sim, 8);
    assert_eq!(hp(&sim, victim), Some(300));
}

#[test]
fn production_building_keeps_rally_point() {
    let mut sim = stocked_simulation();
    let barracks = sim
        .place_building("barracks", Faction::Ally, vec2(0.0, 0.0))
        .unwrap();

    assert!(sim.issue_command(barracks, vec2(8.0, 8.0), None));
    sim.tick();
    let agent = sim.agent(barracks).unwrap();
    assert_eq!(agent.state, AgentState::Idle);
    assert_eq!(agent.order.map(|order| order.destination), Some(vec2(8.0, 8.0)));
}

// =============================================================================
// Economy
// =============================================================================

#[test]
fn worker_fills_up_and_heads_home() {
    let mut sim = Simulation::new();
    sim.spawn(depot(Faction::Ally, vec2(-10.0, 0.0)));
    let node = sim.spawn(resource_node(ResourceKind::Wood, 15, vec2(5.0, 0.0)));
    let peasant = sim.spawn(worker(Faction::Ally, vec2(3.5, 0.0)));

    sim.issue_command(peasant, vec2(5.0, 0.0), Some(node));
    let events = run_through(&mut sim, 100);

    let gathered: Vec<u32> = events
        .iter()
        .flat_map(|tick| tick.events.iter())
        .filter_map(|event| match event {
            SimEvent::ResourceGathered { amount, .. } => Some(*amount),
            _ => None,
        })
        .collect();
    assert_eq!(gathered, vec![2, 2, 2, 2, 2]);

    let agent = sim.agent(peasant).unwrap();
    assert_eq!(agent.cargo.amount, 10);
    assert!(matches!(agent.state, AgentState::Moving { intent: Intent::Deliver(_), .. }));

    let remaining = sim
        .agent(node)
        .and_then(|node| node.profile.as_resource_node())
        .map(|node| node.remaining);
    assert_eq!(remaining, Some(5));
}

#[test]
fn delivery_credits_ledger_and_returns_to_node() {
    let mut sim = Simulation::new();
    let hall = sim.spawn(depot(Faction::Ally, vec2(0.0, 0.0)));
    let node = sim.spawn(resource_node(ResourceKind::Gold, 100, vec2(6.0, 0.0)));
    let peasant = sim.spawn(worker(Faction::Ally, vec2(4.0, 0.0)));

    sim.issue_command(peasant, vec2(6.0, 0.0), Some(node));
    let events = run_through(&mut sim, 200);

    let deposited = events
        .iter()
        .flat_map(|tick| tick.events.iter())
        .find_map(|event| match event {
            SimEvent::ResourceDeposited { depot, kind, amount, .. } => Some((*depot, *kind, *amount)),
            _ => None,
        });
    assert_eq!(deposited, Some((hall, ResourceKind::Gold, 10)));
    assert!(sim.ledger(Faction::Ally).unwrap().amount(ResourceKind::Gold) >= 10);
    assert!(matches!(
        sim.agent(peasant).unwrap().state,
        AgentState::Gathering { node: n } | AgentState::Moving { intent: Intent::Gather(n), .. } if n == node
    ));
}

#[test]
fn depleted_node_retires_and_worker_moves_on() {
    let mut sim = Simulation::new();
    sim.spawn(depot(Faction::Ally, vec2(-10.0, 0.0)));
    let small = sim.spawn(resource_node(ResourceKind::Food, 4, vec2(5.0, 0.0)));
    let spare = sim.spawn(resource_node(ResourceKind::Food, 50, vec2(5.0, 10.0)));
    sim.mark_gather_target(spare);
    let peasant = sim.spawn(worker(Faction::Ally, vec2(3.5, 0.0)));

    sim.issue_command(peasant, vec2(5.0, 0.0), Some(small));
    let events = run_through(&mut sim, 40);

    assert!(sim.agent(small).is_none());
    assert!(events
        .iter()
        .any(|tick| tick.events.contains(&SimEvent::NodeDepleted { node: small })));
    // Carrying 4: deliver first, then the marked node
    assert!(matches!(
        sim.agent(peasant).unwrap().state,
        AgentState::Moving { intent: Intent::Deliver(_), .. }
    ));

    // Delivered at the depot, now walking to the marked node
    run_through(&mut sim, 160);
    assert!(matches!(
        sim.agent(peasant).unwrap().state,
        AgentState::Gathering { node } | AgentState::Moving { intent: Intent::Gather(node), .. } if node == spare
    ));
}

#[test]
fn short_fetch_range_worker_still_gathers() {
    let mut profile = skirmish_test_utils::fixtures::worker_profile();
    profile.fetch_range = fixed_f(0.2);

    let mut sim = Simulation::new();
    let node = sim.spawn(resource_node(ResourceKind::Wood, 50, vec2(5.0, 0.0)));
    let peasant = sim.spawn(unit(BehaviorProfile::Worker(profile), Faction::Ally, vec2(0.0, 0.0)));

    sim.issue_command(peasant, vec2(5.0, 0.0), Some(node));
    let events = run_through(&mut sim, 100);

    assert!(events.iter().any(|tick| tick
        .events
        .iter()
        .any(|event| matches!(event, SimEvent::ResourceGathered { worker, .. } if *worker == peasant))));
}

#[test]
fn new_order_stops_gathering() {
    let mut sim = Simulation::new();
    sim.spawn(depot(Faction::Ally, vec2(-10.0, 0.0)));
    let node = sim.spawn(resource_node(ResourceKind::Wood, 100, vec2(5.0, 0.0)));
    let peasant = sim.spawn(worker(Faction::Ally, vec2(3.5, 0.0)));

    sim.issue_command(peasant, vec2(5.0, 0.0), Some(node));
    for _ in 0..60 {
        sim.tick();
        if sim.agent(peasant).unwrap().state == (AgentState::Gathering { node }) {
            break;
        }
    }
    assert_eq!(sim.agent(peasant).unwrap().state, AgentState::Gathering { node });

    let remaining = |sim: &Simulation| {
        sim.agent(node)
            .and_then(|node| node.profile.as_resource_node())
            .map(|node| node.remaining)
    };
    let before = remaining(&sim);

    sim.issue_command(peasant, vec2(3.0, 10.0), None);
    sim.tick();
    assert!(matches!(
        sim.agent(peasant).unwrap().state,
        AgentState::Moving { intent: Intent::Travel, .. }
    ));
    assert!(sim
        .scheduler()
        .pending_for(peasant)
        .all(|entry| !matches!(entry.continuation, Continuation::GatherCollect { .. })));

    run_through(&mut sim, 100);
    assert_eq!(remaining(&sim), before);
}

#[test]
fn reassigned_builder_leaves_first_site() {
    let mut sim = stocked_simulation();
    let peasant = sim.spawn(worker(Faction::Ally, vec2(0.0, 0.0)));
    let first = sim
        .place_building("granary", Faction::Ally, vec2(2.0, 0.0))
        .unwrap();
    let second = sim
        .place_building("granary", Faction::Ally, vec2(-6.0, 0.0))
        .unwrap();

    let builders = |sim: &Simulation, site| {
        sim.agent(site)
            .and_then(|site| site.construction.as_ref())
            .map(|construction| construction.builders.clone())
            .unwrap_or_default()
    };
    let progress = |sim: &Simulation, site| {
        sim.agent(site)
            .and_then(|site| site.construction.as_ref())
            .map(|construction| construction.progress)
    };

    sim.issue_command(peasant, vec2(2.0, 0.0), Some(first));
    run_through(&mut sim, 20);
    assert_eq!(
        sim.agent(peasant).unwrap().state,
        AgentState::Constructing { site: first }
    );
    assert!(builders(&sim, first).contains(&peasant));

    sim.issue_command(peasant, vec2(-6.0, 0.0), Some(second));
    sim.tick();
    assert!(!builders(&sim, first).contains(&peasant));
    let stalled = progress(&sim, first);

    run_through(&mut sim, 80);
    assert_eq!(
        sim.agent(peasant).unwrap().state,
        AgentState::Constructing { site: second }
    );
    assert!(builders(&sim, second).contains(&peasant));
    assert_eq!(progress(&sim, first), stalled);
}

#[test]
fn right_click_on_node_marks_it() {
    let mut sim = Simulation::new();
    let node = sim.spawn(resource_node(ResourceKind::Stone, 30, vec2(6.0, 0.0)));
    let peasant = sim.spawn(worker(Faction::Ally, vec2(0.0, 0.0)));

    sim.select(peasant);
    sim.right_click(vec2(6.0, 0.0));

    let marked = sim
        .agent(node)
        .and_then(|node| node.profile.as_resource_node())
        .is_some_and(|node| node.marked);
    assert!(marked);
}

#[test]
fn workers_construct_placed_building() {
    let mut sim = stocked_simulation();
    let peasant = sim.spawn(worker(Faction::Ally, vec2(0.0, 0.0)));
    sim.select(peasant);

    let site = sim.build_at("granary", vec2(5.0, 0.0)).unwrap();
    let ledger = sim.ledger(Faction::Ally).unwrap();
    assert_eq!(ledger.amount(ResourceKind::Wood), 450);
    assert_eq!(ledger.amount(ResourceKind::Stone), 480);

    let events = run_through(&mut sim, 300);
    assert!(events
        .iter()
        .any(|tick| tick.events.contains(&SimEvent::ConstructionCompleted { site })));

    let building = sim.agent(site).unwrap();
    assert!(!building.is_under_construction());
    assert_eq!(hp(&sim, site), Some(250));
    assert_eq!(sim.agent(peasant).unwrap().state, AgentState::Idle);
}

#[test]
fn construction_progress_raises_hit_points() {
    let mut sim = stocked_simulation();
    let peasant = sim.spawn(worker(Faction::Ally, vec2(0.0, 0.0)));
    let site = sim
        .place_building("granary", Faction::Ally, vec2(2.0, 0.0))
        .unwrap();
    sim.issue_command(peasant, vec2(2.0, 0.0), Some(site));

    run_through(&mut sim, 30);
    let partial = hp(&sim, site).unwrap();
    assert!(partial > 1 && partial < 250, "hp {partial}");
    assert!(sim.agent(site).unwrap().is_under_construction());
}

#[test]
fn unaffordable_building_is_rejected() {
    let mut sim = Simulation::new().with_catalog(skirmish_test_utils::fixtures::sample_catalog());
    let result = sim.place_building("barracks", Faction::Ally, vec2(0.0, 0.0));
    assert!(result.is_err());
    assert!(sim.agents().is_empty());
}
