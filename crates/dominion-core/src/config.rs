//! Engine configuration.
//!
//! Loaded once at startup and immutable afterwards. A missing file is
//! replaced with written defaults so operators always have a concrete file
//! to edit.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Static policy values governing the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    // Feature toggles
    pub enable_area_claims: bool,
    pub enable_badlands: bool,
    pub enable_decay_reduction: bool,
    pub enable_defensive_bonuses: bool,
    pub enable_restricted_pvp: bool,
    pub enable_taxation: bool,
    pub enable_towns: bool,
    pub enable_upkeep: bool,
    pub enable_war: bool,

    // Thresholds
    pub min_faction_members: usize,
    pub min_area_name_length: usize,
    pub min_justification_length: usize,
    pub default_tax_rate: f32,
    pub max_tax_rate: f32,
    pub claimed_land_gather_bonus: f32,
    pub town_gather_bonus: f32,
    pub badlands_gather_bonus: f32,
    pub claimed_land_decay_reduction: f32,
    pub town_decay_reduction: f32,

    // Tiered cost tables, indexed by a faction's current claim count.
    pub claim_costs: Vec<i64>,
    pub upkeep_costs: Vec<i64>,
    pub defensive_bonuses: Vec<f32>,

    /// Grid-provider labels that mark an area as dangerous.
    pub dangerous_zone_labels: BTreeSet<String>,

    // Scheduler timing
    pub upkeep_check_interval_mins: u32,
    pub upkeep_collection_period_hours: u32,
    pub upkeep_grace_period_hours: u32,
    /// Ceiling after which a war times out.
    pub war_duration_hours: u32,

    // Event zones
    pub zone_dome_darkness: u32,
    pub event_zone_radius: f32,
    pub event_zone_lifespan_secs: f32,

    // Display parameters consumed by the map renderer.
    pub map_image_url: String,
    pub map_image_size: u32,
    pub command_cooldown_secs: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            enable_area_claims: true,
            enable_badlands: true,
            enable_decay_reduction: true,
            enable_defensive_bonuses: true,
            enable_restricted_pvp: false,
            enable_taxation: true,
            enable_towns: true,
            enable_upkeep: true,
            enable_war: true,
            min_faction_members: 3,
            min_area_name_length: 3,
            min_justification_length: 50,
            default_tax_rate: 0.1,
            max_tax_rate: 0.2,
            claimed_land_gather_bonus: 0.1,
            town_gather_bonus: 0.1,
            badlands_gather_bonus: 0.1,
            claimed_land_decay_reduction: 0.5,
            town_decay_reduction: 1.0,
            claim_costs: vec![0, 100, 200, 300, 400, 500],
            upkeep_costs: vec![10, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100],
            defensive_bonuses: vec![0.0, 0.5, 1.0],
            dangerous_zone_labels: [
                "airfield",
                "sphere_tank",
                "junkyard",
                "launch_site",
                "military_tunnel",
                "powerplant",
                "satellite_dish",
                "trainyard",
                "water_treatment_plant",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            upkeep_check_interval_mins: 15,
            upkeep_collection_period_hours: 24,
            upkeep_grace_period_hours: 12,
            war_duration_hours: 72,
            zone_dome_darkness: 3,
            event_zone_radius: 100.0,
            event_zone_lifespan_secs: 600.0,
            map_image_url: String::new(),
            map_image_size: 1440,
            command_cooldown_secs: 10,
        }
    }
}

impl EngineOptions {
    /// Read the options file, or write the defaults and return them when the
    /// file does not exist yet.
    pub fn load_or_write_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let options: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
            options.validate()?;
            Ok(options)
        } else {
            warn!(path = %path.display(), "no configuration found, writing defaults");
            let options = Self::default();
            fs::write(path, serde_json::to_string_pretty(&options)?)?;
            Ok(options)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.claim_costs.is_empty() || self.upkeep_costs.is_empty() {
            return Err(ConfigError::Invalid("cost tables must not be empty".into()));
        }
        if self.defensive_bonuses.is_empty() {
            return Err(ConfigError::Invalid(
                "defensive bonus table must not be empty".into(),
            ));
        }
        if !is_non_decreasing(&self.claim_costs) || !is_non_decreasing(&self.upkeep_costs) {
            return Err(ConfigError::Invalid(
                "cost tables must be non-decreasing".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_tax_rate)
            || !(0.0..=self.max_tax_rate).contains(&self.default_tax_rate)
        {
            return Err(ConfigError::Invalid(format!(
                "tax rates must satisfy 0 <= default ({}) <= max ({}) <= 1",
                self.default_tax_rate, self.max_tax_rate
            )));
        }
        if self.upkeep_check_interval_mins == 0 || self.upkeep_collection_period_hours == 0 {
            return Err(ConfigError::Invalid(
                "upkeep intervals must be positive".into(),
            ));
        }
        if self.war_duration_hours == 0 {
            return Err(ConfigError::Invalid("war duration must be positive".into()));
        }
        Ok(())
    }

    /// Cost of a faction's next claim given its current claim count.
    /// Indexes past the table end clamp to the final tier.
    pub fn claim_cost(&self, claim_count: usize) -> i64 {
        tier(&self.claim_costs, claim_count)
    }

    /// Per-area upkeep due for a faction with the given claim count.
    pub fn upkeep_cost(&self, claim_count: usize) -> i64 {
        tier(&self.upkeep_costs, claim_count)
    }

    /// Defensive bonus magnitude exposed to the combat subsystem.
    pub fn defensive_bonus(&self, claim_count: usize) -> f32 {
        if !self.enable_defensive_bonuses {
            return 0.0;
        }
        tier(&self.defensive_bonuses, claim_count)
    }

    pub fn is_dangerous_label(&self, label: &str) -> bool {
        self.dangerous_zone_labels.contains(label)
    }

    pub fn collection_period(&self) -> Duration {
        Duration::hours(i64::from(self.upkeep_collection_period_hours))
    }

    pub fn grace_period(&self) -> Duration {
        Duration::hours(i64::from(self.upkeep_grace_period_hours))
    }

    pub fn war_duration(&self) -> Duration {
        Duration::hours(i64::from(self.war_duration_hours))
    }

    pub fn zone_lifespan(&self) -> Duration {
        Duration::milliseconds((f64::from(self.event_zone_lifespan_secs) * 1000.0) as i64)
    }

    pub fn upkeep_check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.upkeep_check_interval_mins) * 60)
    }
}

fn tier<T: Copy>(table: &[T], index: usize) -> T {
    table[index.min(table.len() - 1)]
}

fn is_non_decreasing(table: &[i64]) -> bool {
    table.windows(2).all(|w| w[0] <= w[1])
}
