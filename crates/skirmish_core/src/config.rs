//! Simulation tuning.
//!
//! [`SimConfig`] is loaded from RON alongside the agent catalog. Every field
//! has a default, so a config file only needs the values it changes.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::factions::Faction;
use crate::math::{fixed_decimal, vec2_decimal, Fixed, Vec2Fixed};

/// Rounding allowance when converting seconds to a tick count.
const TICK_SLACK: Fixed = Fixed::from_bits(1 << 12);

/// Global simulation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Ticks per simulated second.
    pub tick_rate: u32,
    /// A move destination closer than this counts as reached.
    #[serde(with = "fixed_decimal")]
    pub arrival_epsilon: Fixed,
    /// A projectile closer than this to its target hits.
    #[serde(with = "fixed_decimal")]
    pub projectile_arrival_epsilon: Fixed,
    /// Extra distance beyond attack range that knockback pushes enemies to.
    #[serde(with = "fixed_decimal")]
    pub knockback_margin: Fixed,
    /// Push direction used when two agents share a centre.
    #[serde(with = "vec2_decimal")]
    pub collision_fallback: Vec2Fixed,
    /// Seconds between resource collections.
    #[serde(with = "fixed_decimal")]
    pub gather_interval: Fixed,
    /// Seconds within which a second click on the same agent is a double-click.
    #[serde(with = "fixed_decimal")]
    pub double_click_window: Fixed,
    /// Seconds a health bar stays visible after the last HP change.
    #[serde(with = "fixed_decimal")]
    pub health_bar_linger: Fixed,
    /// Side length of a spatial grid cell.
    #[serde(with = "fixed_decimal")]
    pub cell_size: Fixed,
    /// Faction controlled through selection and commands.
    pub player_faction: Faction,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            arrival_epsilon: Fixed::from_num(0.5),
            projectile_arrival_epsilon: Fixed::from_num(0.1),
            knockback_margin: Fixed::from_num(0.5),
            collision_fallback: Vec2Fixed::UNIT_X,
            gather_interval: Fixed::ONE,
            double_click_window: Fixed::from_num(0.3),
            health_bar_linger: Fixed::from_num(3),
            cell_size: Fixed::from_num(4),
            player_faction: Faction::Ally,
        }
    }
}

impl SimConfig {
    /// Parse a config from RON text.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source).map_err(|err| SimError::DataParseError {
            source_name: "config".to_string(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the tick loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.tick_rate == 0 {
            return Err(SimError::InvalidState("tick_rate must be positive".into()));
        }
        if self.cell_size <= Fixed::ZERO {
            return Err(SimError::InvalidState("cell_size must be positive".into()));
        }
        if self.collision_fallback.is_zero() {
            return Err(SimError::InvalidState(
                "collision_fallback must have a direction".into(),
            ));
        }
        Ok(())
    }

    /// Duration of one tick in seconds.
    #[must_use]
    pub fn dt(&self) -> Fixed {
        Fixed::ONE / Fixed::from_num(self.tick_rate.max(1))
    }

    /// Number of whole ticks closest to `seconds`. Negative spans are zero.
    #[must_use]
    pub fn ticks_for(&self, seconds: Fixed) -> u64 {
        if seconds <= Fixed::ZERO {
            return 0;
        }
        (seconds * Fixed::from_num(self.tick_rate))
            .round()
            .to_num::<u64>()
    }

    /// Fewest whole ticks that last at least `seconds`.
    ///
    /// Used for gates that must never open early. A product a hair above a
    /// whole tick counts as that tick, so values that are not exact in
    /// binary do not gain a spare one.
    #[must_use]
    pub fn ticks_at_least(&self, seconds: Fixed) -> u64 {
        if seconds <= Fixed::ZERO {
            return 0;
        }
        (seconds.saturating_mul(Fixed::from_num(self.tick_rate)) - TICK_SLACK)
            .ceil()
            .to_num::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimConfig::default();
        assert_eq!(config.arrival_epsilon, Fixed::from_num(0.5));
        assert_eq!(config.ticks_for(Fixed::from_num(2)), 40);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ticks_for_rounds_to_nearest() {
        let config = SimConfig::default();
        // 0.3 s is not exact in binary but still six ticks
        assert_eq!(config.ticks_for(Fixed::from_num(0.3)), 6);
        assert_eq!(config.ticks_for(Fixed::from_num(-1)), 0);
        assert_eq!(config.ticks_for(Fixed::from_num(0.01)), 0);
    }

    #[test]
    fn test_ticks_at_least_never_rounds_down() {
        let config = SimConfig::default();
        // 0.32 s is 6.4 ticks at 20 Hz
        assert_eq!(config.ticks_for(Fixed::from_num(0.32)), 6);
        assert_eq!(config.ticks_at_least(Fixed::from_num(0.32)), 7);
        // 0.35 s is a whole seven ticks despite binary rounding
        assert_eq!(config.ticks_at_least(Fixed::from_num(0.35)), 7);
        assert_eq!(config.ticks_at_least(Fixed::from_num(2)), 40);
        assert_eq!(config.ticks_at_least(Fixed::from_num(0.01)), 1);
        assert_eq!(config.ticks_at_least(Fixed::ZERO), 0);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = SimConfig::from_ron_str("(tick_rate: 30, gather_interval: 0.5)").unwrap();
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.gather_interval, Fixed::from_num(0.5));
        assert_eq!(config.player_faction, Faction::Ally);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            SimConfig::from_ron_str("(tick_rate: 0)"),
            Err(SimError::InvalidState(_))
        ));
        assert!(matches!(
            SimConfig::from_ron_str("(tick_rate: "),
            Err(SimError::DataParseError { .. })
        ));
    }
}
