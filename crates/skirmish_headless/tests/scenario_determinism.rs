//! Determinism checks over scenarios built from RON.

use skirmish_headless::{run_scenario, Scenario};
use skirmish_test_utils::determinism::{first_divergence, replay_on_threads};

fn builtin() -> Scenario {
    Scenario::skirmish().unwrap()
}

#[test]
fn builtin_scenario_never_diverges() {
    let scenario = builtin();
    let divergence = first_divergence(|| scenario.build().unwrap(), 300);
    assert_eq!(divergence, None);
}

#[test]
fn builtin_scenario_agrees_across_threads() {
    let scenario = builtin();
    replay_on_threads(|| scenario.build().unwrap(), 4, 200).assert_deterministic();
}

#[test]
fn scripted_run_is_reproducible() {
    // Long enough for the gather order, the granary and nightfall
    let scenario = builtin();
    let first = run_scenario(&scenario, 600).unwrap();
    let second = run_scenario(&scenario, 600).unwrap();

    assert_eq!(first.state_hash, second.state_hash);
    assert_eq!(first.rejected_inputs, 0);
    assert!(first.damage_dealt > 0);
}

#[test]
fn scenario_file_round_trips_through_disk() {
    let scenario = builtin();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("skirmish.ron");
    let text = ron::ser::to_string_pretty(&scenario, ron::ser::PrettyConfig::default()).unwrap();
    std::fs::write(&path, text).unwrap();

    let loaded = Scenario::load(&path).unwrap();
    assert_eq!(loaded, scenario);
}
