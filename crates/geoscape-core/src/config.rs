//! Tunables for a Geoscape campaign
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! { "time_ratio": 300.0, "max_concurrent_tasks": 2 }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GeoError, GeoResult};
use crate::time::{StepBounds, MS_PER_DAY, MS_PER_HOUR, MS_PER_MINUTE};

/// Named speeds for the host's time controls (game seconds per real second)
pub const TIME_RATIO_PRESETS: [f64; 6] = [1.0, 5.0, 60.0, 1_800.0, 3_600.0, 86_400.0];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    // Clock
    pub time_ratio: f64,
    pub max_step_ms: u64,
    /// Real milliseconds a frame may spend stepping; 0 disables the budget
    pub frame_budget_ms: u64,

    // UFO missions
    pub landing_wait_ms: u64,
    pub terror_delay_ms: u64,
    pub crash_grounding_ms: u64,
    pub nearby_site_radius_km: f64,
    pub research_landings: u32,
    pub terror_landings: u32,
    pub terror_attacks_city: bool,
    pub supply_landings: u32,
    pub infiltration_landings: u32,
    pub retaliation_landings: u32,

    // Craft
    pub attack_range_km: f64,
    pub arrival_tolerance_km: f64,
    pub base_radar_range_km: f64,
    pub craft_radar_range_km: f64,
    pub interceptor_speed_kmh: f64,
    pub interceptor_endurance_ms: u64,
    /// Turn home when endurance left < time home * this factor
    pub fuel_reserve_factor: f64,
    pub hangar_service_period_ms: u64,
    /// Fraction of a full tank restored per hangar service
    pub refuel_per_service: f64,

    // Overmind
    pub strategy_period_ms: u64,
    pub new_task_chance: f64,
    pub max_concurrent_tasks: usize,
    pub retaliation_chance: f64,
    pub research_launches: u32,
    pub terror_launches: u32,
    pub supply_launches: u32,
    pub infiltration_launches: u32,
    pub retaliation_launches: u32,
    pub first_launch_delay_ms: u64,
    pub launch_interval_ms: u64,

    // New game
    pub starting_interceptors: u32,
}

impl Default for GeoConfig {
    fn default() -> Self {
        let bounds = StepBounds::default();
        Self {
            time_ratio: 60.0,
            max_step_ms: bounds.max_step_ms,
            frame_budget_ms: 100,

            landing_wait_ms: 2 * MS_PER_HOUR,
            terror_delay_ms: 30 * MS_PER_MINUTE,
            crash_grounding_ms: 12 * MS_PER_HOUR,
            nearby_site_radius_km: 1_500.0,
            research_landings: 3,
            terror_landings: 5,
            terror_attacks_city: true,
            supply_landings: 1,
            infiltration_landings: 2,
            retaliation_landings: 1,

            attack_range_km: 20.0,
            arrival_tolerance_km: 1.0,
            base_radar_range_km: 1_200.0,
            craft_radar_range_km: 400.0,
            interceptor_speed_kmh: 2_200.0,
            interceptor_endurance_ms: 6 * MS_PER_HOUR,
            fuel_reserve_factor: 1.2,
            hangar_service_period_ms: 30 * MS_PER_MINUTE,
            refuel_per_service: 0.25,

            strategy_period_ms: MS_PER_DAY,
            new_task_chance: 0.35,
            max_concurrent_tasks: 3,
            retaliation_chance: 0.5,
            research_launches: 3,
            terror_launches: 2,
            supply_launches: 2,
            infiltration_launches: 2,
            retaliation_launches: 1,
            first_launch_delay_ms: MS_PER_HOUR,
            launch_interval_ms: 8 * MS_PER_HOUR,

            starting_interceptors: 2,
        }
    }
}

impl GeoConfig {
    pub fn from_json_str(json: &str) -> GeoResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> GeoResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> GeoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> GeoResult<()> {
        fn check(ok: bool, msg: &str) -> GeoResult<()> {
            if ok {
                Ok(())
            } else {
                Err(GeoError::InvalidConfig(msg.to_string()))
            }
        }

        check(
            self.time_ratio.is_finite() && self.time_ratio >= 0.0,
            "time_ratio must be finite and >= 0",
        )?;
        check(self.max_step_ms > 0, "max_step_ms must be > 0")?;
        check(
            self.hangar_service_period_ms > 0,
            "hangar_service_period_ms must be > 0",
        )?;
        check(self.strategy_period_ms > 0, "strategy_period_ms must be > 0")?;
        check(
            (0.0..=1.0).contains(&self.new_task_chance),
            "new_task_chance must be in [0, 1]",
        )?;
        check(
            (0.0..=1.0).contains(&self.retaliation_chance),
            "retaliation_chance must be in [0, 1]",
        )?;
        check(
            self.refuel_per_service > 0.0 && self.refuel_per_service <= 1.0,
            "refuel_per_service must be in (0, 1]",
        )?;
        check(
            self.fuel_reserve_factor >= 1.0,
            "fuel_reserve_factor must be >= 1",
        )?;
        check(
            self.interceptor_speed_kmh > 0.0,
            "interceptor_speed_kmh must be > 0",
        )?;
        check(
            self.interceptor_endurance_ms > 0,
            "interceptor_endurance_ms must be > 0",
        )?;
        check(
            self.nearby_site_radius_km > 0.0,
            "nearby_site_radius_km must be > 0",
        )?;
        check(
            self.arrival_tolerance_km > 0.0 && self.attack_range_km > 0.0,
            "arrival_tolerance_km and attack_range_km must be > 0",
        )?;
        check(
            self.research_landings > 0
                && self.terror_landings > 0
                && self.supply_landings > 0
                && self.infiltration_landings > 0
                && self.retaliation_landings > 0,
            "landing counts must be > 0",
        )?;
        Ok(())
    }

    pub fn step_bounds(&self) -> StepBounds {
        let budget = (self.frame_budget_ms > 0).then(|| Duration::from_millis(self.frame_budget_ms));
        StepBounds::default()
            .with_max_step(self.max_step_ms)
            .with_frame_budget(budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GeoConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.terror_delay_ms, 1_800_000);
        assert_eq!(config.crash_grounding_ms, 43_200_000);
        assert_eq!(config.step_bounds(), StepBounds::default());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = GeoConfig::from_json_str(r#"{ "time_ratio": 300.0, "max_concurrent_tasks": 1 }"#)
            .unwrap();
        assert_eq!(config.time_ratio, 300.0);
        assert_eq!(config.max_concurrent_tasks, 1);
        assert_eq!(config.landing_wait_ms, GeoConfig::default().landing_wait_ms);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = GeoConfig::from_json_str(r#"{ "new_task_chance": 1.5 }"#).unwrap_err();
        assert!(matches!(err, GeoError::InvalidConfig(_)));

        let err = GeoConfig::from_json_str(r#"{ "max_step_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, GeoError::InvalidConfig(_)));

        let err = GeoConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, GeoError::Config(_)));
    }

    #[test]
    fn test_zero_frame_budget_disables_budget() {
        let config = GeoConfig {
            frame_budget_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.step_bounds().frame_budget, None);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = GeoConfig {
            time_ratio: 5.0,
            ..Default::default()
        };
        let json = config.to_json_string().unwrap();
        assert_eq!(GeoConfig::from_json_str(&json).unwrap(), config);
    }
}
