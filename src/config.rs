// Configuration - Environment-driven settings for the search and impact models
// Values come from the process environment, optionally seeded from a `.env` file

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{ImpactError, Result};

pub const DEFAULT_SEARCH_DAYS: f64 = 1825.0;
pub const DEFAULT_STEP_DAYS: f64 = 0.1;

/// ~15,000 km: a couple of Earth radii, enough to absorb gravitational focusing
pub const DEFAULT_IMPACT_THRESHOLD_AU: f64 = 1.0e-4;

/// Potentially-hazardous MOID bound
pub const DEFAULT_CLOSE_APPROACH_AU: f64 = 0.05;

/// People per km² outside the city table
pub const DEFAULT_BACKGROUND_DENSITY: f64 = 25.0;

/// Upper bound on grid samples per search
pub const MAX_SEARCH_SAMPLES: usize = 10_000_000;

// =============================================================================
// SEARCH CONFIGURATION
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Length of the search window (days)
    pub search_days: f64,
    /// Sampling interval (days)
    pub step_days: f64,
    /// Miss distance below which the approach counts as an impact (AU)
    pub impact_threshold_au: f64,
    /// Miss distance below which the approach counts as close (AU)
    pub close_approach_au: f64,
    /// Refine the sampled minimum with a ternary search
    pub refine: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_days: DEFAULT_SEARCH_DAYS,
            step_days: DEFAULT_STEP_DAYS,
            impact_threshold_au: DEFAULT_IMPACT_THRESHOLD_AU,
            close_approach_au: DEFAULT_CLOSE_APPROACH_AU,
            refine: true,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.step_days.is_finite() || self.step_days <= 0.0 {
            return Err(ImpactError::InvalidSearchWindow(format!(
                "step must be positive, got {} days",
                self.step_days
            )));
        }
        if !self.search_days.is_finite() || self.search_days < self.step_days {
            return Err(ImpactError::InvalidSearchWindow(format!(
                "window of {} days is shorter than the {} day step",
                self.search_days, self.step_days
            )));
        }
        if self.search_days / self.step_days >= MAX_SEARCH_SAMPLES as f64 {
            return Err(ImpactError::InvalidSearchWindow(format!(
                "{} days at a {} day step exceeds {} samples",
                self.search_days, self.step_days, MAX_SEARCH_SAMPLES
            )));
        }
        Ok(())
    }

    /// Number of samples in the window, both ends included
    pub fn sample_count(&self) -> usize {
        ((self.search_days / self.step_days + 1e-9).floor() as usize).saturating_add(1)
    }
}

// =============================================================================
// APPLICATION CONFIGURATION
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Directory holding the `neo_all/` and `neo_one/` JSON files
    pub data_dir: PathBuf,
    pub search: SearchConfig,
    pub background_density: f64,
    /// tracing filter directive, e.g. "info" or "neo_impact=debug"
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            search: SearchConfig::default(),
            background_density: DEFAULT_BACKGROUND_DENSITY,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read overrides from the environment
    pub fn from_env() -> Result<Self> {
        // A missing .env file is normal
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("NEO_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(days) = parse_var(&lookup, "NEO_SEARCH_DAYS")? {
            config.search.search_days = days;
        }
        if let Some(step) = parse_var(&lookup, "NEO_STEP_DAYS")? {
            config.search.step_days = step;
        }
        if let Some(threshold) = parse_var(&lookup, "NEO_IMPACT_THRESHOLD_AU")? {
            config.search.impact_threshold_au = threshold;
        }
        if let Some(refine) = parse_var::<bool, _>(&lookup, "NEO_REFINE")? {
            config.search.refine = refine;
        }
        if let Some(density) = parse_var(&lookup, "NEO_BACKGROUND_DENSITY")? {
            config.background_density = density;
        }
        if let Some(level) = lookup("NEO_LOG_LEVEL") {
            config.log_level = level;
        }

        config.search.validate()?;
        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ImpactError::InvalidConfig {
                key: key.to_string(),
                value: raw,
            }),
    }
}
