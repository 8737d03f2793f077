//! Determinism testing utilities.
//!
//! The simulation must reach the same state hash from the same setup no
//! matter how often, or on which thread, it is run. The usual culprits when
//! it does not:
//!
//! - **Floats**: all simulation math goes through [`skirmish_core::math::Fixed`].
//! - **Hash map order**: agents are always visited in sorted id order.
//! - **Timer order**: continuations due on the same tick run in the order
//!   they were scheduled.
//!
//! [`replay_simulation`] and [`replay_on_threads`] compare final hashes;
//! [`first_divergence`] steps two runs in lockstep to find the tick where
//! they split.

use std::thread;

use skirmish_core::simulation::Simulation;

/// Final hashes of several runs of the same setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRun {
    /// Final hash of each run, in run order.
    pub hashes: Vec<u64>,
    /// Ticks every run simulated.
    pub ticks: u64,
}

impl HashRun {
    /// Check whether every run ended on the same hash.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|pair| pair[0] == pair[1])
    }

    /// Distinct hashes, sorted. One entry for a deterministic run.
    #[must_use]
    pub fn distinct(&self) -> Vec<u64> {
        let mut distinct = self.hashes.clone();
        distinct.sort_unstable();
        distinct.dedup();
        distinct
    }

    /// Panic with every hash listed if the runs disagree.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced more than one distinct hash.
    pub fn assert_deterministic(&self) {
        assert!(
            self.is_deterministic(),
            "Simulation is non-deterministic after {} ticks: {} runs, {} distinct hashes {:x?}",
            self.ticks,
            self.hashes.len(),
            self.distinct().len(),
            self.hashes
        );
    }
}

/// First tick at which two runs stopped agreeing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Divergence {
    /// Ticks completed when the hashes first differed.
    pub tick: u64,
    /// Hash of the first run.
    pub left: u64,
    /// Hash of the second run.
    pub right: u64,
}

/// Drive `runs` copies of any stepped state and collect their final hashes.
///
/// # Example
///
/// ```
/// use skirmish_test_utils::determinism::replay_hashes;
/// use skirmish_test_utils::fixtures::skirmish_scenario;
///
/// let run = replay_hashes(
///     3,
///     100,
///     skirmish_scenario,
///     |sim| { sim.tick(); },
///     |sim| sim.state_hash(),
/// );
/// run.assert_deterministic();
/// ```
pub fn replay_hashes<S>(
    runs: usize,
    ticks: u64,
    setup: impl Fn() -> S,
    step: impl Fn(&mut S),
    hash: impl Fn(&S) -> u64,
) -> HashRun {
    let hashes = (0..runs)
        .map(|_| {
            let mut state = setup();
            (0..ticks).for_each(|_| step(&mut state));
            hash(&state)
        })
        .collect();
    HashRun { hashes, ticks }
}

/// Run the simulation `runs` times one after another.
pub fn replay_simulation(setup: impl Fn() -> Simulation, runs: usize, ticks: u64) -> HashRun {
    replay_hashes(
        runs,
        ticks,
        setup,
        |sim| {
            sim.tick();
        },
        Simulation::state_hash,
    )
}

/// Run the simulation `runs` times on scoped threads.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences. A panicking run re-raises its panic here.
pub fn replay_on_threads<F>(setup: F, runs: usize, ticks: u64) -> HashRun
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|scope| {
        let handles: Vec<_> = (0..runs)
            .map(|_| {
                scope.spawn(|| {
                    let mut sim = setup();
                    sim.run_ticks(ticks);
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    });
    HashRun { hashes, ticks }
}

/// Step two runs side by side and report where their hashes first differ.
pub fn first_divergence(setup: impl Fn() -> Simulation, ticks: u64) -> Option<Divergence> {
    let mut left = setup();
    let mut right = setup();

    for tick in 0..=ticks {
        if tick > 0 {
            left.tick();
            right.tick();
        }
        let (left_hash, right_hash) = (left.state_hash(), right.state_hash());
        if left_hash != right_hash {
            tracing::warn!(tick, left_hash, right_hash, "Simulations diverged");
            return Some(Divergence {
                tick,
                left: left_hash,
                right: right_hash,
            });
        }
    }
    None
}

/// Compare the event streams of two runs; returns the first tick that differs.
pub fn first_event_divergence(setup: impl Fn() -> Simulation, ticks: u64) -> Option<u64> {
    let mut left = setup();
    let mut right = setup();
    (0..ticks).find(|_| left.tick() != right.tick())
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of simulation determinism.
pub mod strategies {
    use proptest::prelude::*;
    use skirmish_core::agent::Agent;
    use skirmish_core::factions::Faction;
    use skirmish_core::math::{Fixed, Vec2Fixed};

    use crate::fixtures;

    /// Generate a fixed-point coordinate on a small battlefield.
    ///
    /// Range: -100 to 100 in tenths.
    pub fn arb_fixed_position() -> impl Strategy<Value = Fixed> {
        (-1000i32..1000i32).prop_map(|tenths| Fixed::from_num(tenths) / Fixed::from_num(10))
    }

    /// Generate a fixed-point number for speeds.
    ///
    /// Range: 1 to 10 (units per second)
    pub fn arb_fixed_speed() -> impl Strategy<Value = Fixed> {
        (1i32..10i32).prop_map(Fixed::from_num)
    }

    /// Generate a collision radius between 0.1 and 3.0.
    pub fn arb_radius() -> impl Strategy<Value = Fixed> {
        (1i32..=30i32).prop_map(|tenths| Fixed::from_num(tenths) / Fixed::from_num(10))
    }

    /// Generate a fixed-point 2D vector for positions.
    pub fn arb_vec2_position() -> impl Strategy<Value = Vec2Fixed> {
        (arb_fixed_position(), arb_fixed_position()).prop_map(|(x, y)| Vec2Fixed::new(x, y))
    }

    /// Generate either faction.
    pub fn arb_faction() -> impl Strategy<Value = Faction> {
        prop_oneof![Just(Faction::Ally), Just(Faction::Enemy)]
    }

    /// Generate health values (1-1000).
    pub fn arb_health() -> impl Strategy<Value = u32> {
        1u32..1000u32
    }

    /// Generate damage values (1-100).
    pub fn arb_damage() -> impl Strategy<Value = u32> {
        1u32..100u32
    }

    /// Generate a melee, ranged or worker unit at a random spot.
    pub fn arb_unit() -> impl Strategy<Value = Agent> {
        (0u8..3, arb_faction(), arb_vec2_position(), arb_health()).prop_map(
            |(kind, faction, position, health)| {
                let agent = match kind {
                    0 => fixtures::melee_unit(faction, position),
                    1 => fixtures::ranged_unit(faction, position),
                    _ => fixtures::worker(faction, position),
                };
                agent.with_health(health)
            },
        )
    }

    /// Generate a list of units.
    pub fn arb_unit_list(max_units: usize) -> impl Strategy<Value = Vec<Agent>> {
        proptest::collection::vec(arb_unit(), 1..max_units)
    }

    /// Generate a sequence of move destinations.
    pub fn arb_destinations(max_len: usize) -> impl Strategy<Value = Vec<Vec2Fixed>> {
        proptest::collection::vec(arb_vec2_position(), 0..max_len)
    }
}
