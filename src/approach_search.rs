// Approach Search - Closest approach of a body to Earth over a sampled window
// Brute-force time stepping with optional ternary refinement, plus Monte Carlo over element uncertainty

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::error::{ImpactError, Result};
use crate::orbital_mechanics::{KeplerianElements, Planet, Vector3, AU_KM, SECONDS_PER_DAY};

/// Half-width of the central difference used for relative speed (days)
const VELOCITY_HALF_STEP_DAYS: f64 = 0.01;

const REFINE_ITERATIONS: usize = 60;

// =============================================================================
// EARTH TRACK
// =============================================================================

/// Earth's heliocentric positions on the search grid.
///
/// Computing these once lets a catalog scan or a Monte Carlo run share them.
#[derive(Debug, Clone)]
pub struct EarthTrack {
    pub start_jd: f64,
    pub step_days: f64,
    positions: Vec<Vector3>,
}

impl EarthTrack {
    pub fn new(start_jd: f64, config: &SearchConfig) -> Result<Self> {
        config.validate()?;
        if !start_jd.is_finite() {
            return Err(ImpactError::InvalidDate(format!("start JD {start_jd}")));
        }
        let earth = Planet::Earth.elements();
        let positions = (0..config.sample_count())
            .map(|i| earth.position(start_jd + i as f64 * config.step_days))
            .collect();

        Ok(Self {
            start_jd,
            step_days: config.step_days,
            positions,
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn day_offset(&self, index: usize) -> f64 {
        index as f64 * self.step_days
    }

    pub fn last_day(&self) -> f64 {
        self.day_offset(self.positions.len().saturating_sub(1))
    }
}

// =============================================================================
// APPROACH RESULT
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApproachClass {
    Impact,
    CloseApproach,
    Distant,
}

impl ApproachClass {
    pub fn classify(distance_au: f64, config: &SearchConfig) -> Self {
        if distance_au < config.impact_threshold_au {
            ApproachClass::Impact
        } else if distance_au < config.close_approach_au {
            ApproachClass::CloseApproach
        } else {
            ApproachClass::Distant
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproachResult {
    pub min_distance_au: f64,
    pub min_distance_km: f64,
    /// Days after the window start
    pub day_offset: f64,
    pub julian_date: f64,
    /// Speed of the body relative to Earth at closest approach (km/s)
    pub relative_speed_km_s: f64,
    pub class: ApproachClass,
}

impl ApproachResult {
    pub fn is_impact(&self) -> bool {
        self.class == ApproachClass::Impact
    }
}

// =============================================================================
// SEARCH
// =============================================================================

/// Search `config.search_days` days from `start_jd` for the minimum Earth distance
pub fn find_closest_approach(
    target: &KeplerianElements,
    start_jd: f64,
    config: &SearchConfig,
) -> Result<ApproachResult> {
    target.validate()?;
    let track = EarthTrack::new(start_jd, config)?;
    Ok(closest_approach_on_track(target, &track, config))
}

/// Same as [`find_closest_approach`] against a precomputed Earth track
pub fn closest_approach_on_track(
    target: &KeplerianElements,
    track: &EarthTrack,
    config: &SearchConfig,
) -> ApproachResult {
    let mut best_index = 0;
    let mut best_distance = f64::MAX;

    for (i, earth_pos) in track.positions.iter().enumerate() {
        let jd = track.start_jd + track.day_offset(i);
        let distance = target.position(jd).distance(earth_pos);
        if distance < best_distance {
            best_distance = distance;
            best_index = i;
        }
    }

    let mut day_offset = track.day_offset(best_index);

    if config.refine && track.len() > 1 {
        let lo = (day_offset - track.step_days).max(0.0);
        let hi = (day_offset + track.step_days).min(track.last_day());
        let (refined_day, refined_distance) =
            refine_minimum(target, track.start_jd, lo, hi);
        if refined_distance < best_distance {
            day_offset = refined_day;
            best_distance = refined_distance;
        }
    }

    let julian_date = track.start_jd + day_offset;
    let relative_speed_km_s = relative_speed_km_s(target, julian_date);
    let class = ApproachClass::classify(best_distance, config);

    debug!(
        distance_au = best_distance,
        day_offset,
        ?class,
        "closest approach located"
    );

    ApproachResult {
        min_distance_au: best_distance,
        min_distance_km: best_distance * AU_KM,
        day_offset,
        julian_date,
        relative_speed_km_s,
        class,
    }
}

/// Ternary search for the distance minimum inside `[lo, hi]` (day offsets)
fn refine_minimum(target: &KeplerianElements, start_jd: f64, lo: f64, hi: f64) -> (f64, f64) {
    let earth = Planet::Earth.elements();
    let distance_at = |day: f64| {
        let jd = start_jd + day;
        target.position(jd).distance(&earth.position(jd))
    };

    let (mut lo, mut hi) = (lo, hi);
    for _ in 0..REFINE_ITERATIONS {
        let m1 = lo + (hi - lo) / 3.0;
        let m2 = hi - (hi - lo) / 3.0;
        if distance_at(m1) < distance_at(m2) {
            hi = m2;
        } else {
            lo = m1;
        }
    }

    let day = 0.5 * (lo + hi);
    (day, distance_at(day))
}

/// Relative speed between the body and Earth at `julian_date` (km/s)
pub fn relative_speed_km_s(target: &KeplerianElements, julian_date: f64) -> f64 {
    let v_target = target.velocity(julian_date, VELOCITY_HALF_STEP_DAYS);
    let v_earth = Planet::Earth
        .elements()
        .velocity(julian_date, VELOCITY_HALF_STEP_DAYS);
    v_target.sub(&v_earth).magnitude() * AU_KM / SECONDS_PER_DAY
}

// =============================================================================
// CATALOG SCAN
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEntry {
    pub name: String,
    pub approach: ApproachResult,
}

/// Run the search for every named target, nearest approach first.
/// Targets with unusable elements are logged and skipped.
pub fn scan_catalog(
    targets: &[(String, KeplerianElements)],
    start_jd: f64,
    config: &SearchConfig,
) -> Result<Vec<ScanEntry>> {
    let track = EarthTrack::new(start_jd, config)?;

    let mut entries: Vec<ScanEntry> = targets
        .iter()
        .filter_map(|(name, elements)| match elements.validate() {
            Ok(()) => Some(ScanEntry {
                name: name.clone(),
                approach: closest_approach_on_track(elements, &track, config),
            }),
            Err(e) => {
                warn!(%name, error = %e, "skipping target");
                None
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        a.approach
            .min_distance_au
            .total_cmp(&b.approach.min_distance_au)
    });

    let impacts = entries.iter().filter(|e| e.approach.is_impact()).count();
    info!(
        scanned = entries.len(),
        impacts,
        "catalog scan complete"
    );

    Ok(entries)
}

// =============================================================================
// MONTE CARLO IMPACT PROBABILITY
// =============================================================================

/// One-sigma uncertainties on the sampled elements
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ElementUncertainty {
    /// AU
    pub semi_major_axis: f64,
    pub eccentricity: f64,
    /// degrees
    pub inclination: f64,
    /// degrees
    pub mean_longitude: f64,
}

/// Result of a Monte Carlo impact probability simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub num_runs: u32,
    pub num_impacts: u32,
    /// Impact probability (0.0 - 1.0)
    pub impact_probability: f64,
    /// Mean miss distance (km), `None` without runs
    pub mean_miss_km: Option<f64>,
    pub std_miss_km: Option<f64>,
    pub min_miss_km: Option<f64>,
    /// Length of the propagated window (days)
    pub window_days: f64,
}

/// Monte Carlo simulation for impact probability.
///
/// Each run draws Gaussian perturbations of a, e, I and L around `target`
/// (Box-Muller over a seeded `StdRng`) and repeats the closest-approach search.
pub fn monte_carlo_impact_probability(
    target: &KeplerianElements,
    sigma: &ElementUncertainty,
    num_runs: u32,
    seed: u64,
    start_jd: f64,
    config: &SearchConfig,
) -> Result<MonteCarloResult> {
    target.validate()?;
    let track = EarthTrack::new(start_jd, config)?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut impacts = 0u32;
    // Welford running mean and sum of squared deviations
    let mut miss_mean = 0.0f64;
    let mut miss_m2 = 0.0f64;
    let mut min_miss = f64::MAX;

    for run in 0..num_runs {
        let mut sample = *target;
        sample.semi_major_axis =
            (target.semi_major_axis + gaussian(&mut rng, sigma.semi_major_axis)).max(1e-3);
        sample.eccentricity =
            (target.eccentricity + gaussian(&mut rng, sigma.eccentricity)).clamp(0.0, 0.999);
        sample.inclination = target.inclination + gaussian(&mut rng, sigma.inclination);
        sample.mean_longitude = target.mean_longitude + gaussian(&mut rng, sigma.mean_longitude);

        let approach = closest_approach_on_track(&sample, &track, config);
        if approach.is_impact() {
            impacts += 1;
        }

        let miss_km = approach.min_distance_km;
        let delta = miss_km - miss_mean;
        miss_mean += delta / f64::from(run + 1);
        miss_m2 += delta * (miss_km - miss_mean);
        min_miss = min_miss.min(miss_km);
    }

    let (impact_probability, mean_miss_km, std_miss_km, min_miss_km) = if num_runs == 0 {
        (0.0, None, None, None)
    } else {
        let n = f64::from(num_runs);
        (
            f64::from(impacts) / n,
            Some(miss_mean),
            Some((miss_m2 / n).max(0.0).sqrt()),
            Some(min_miss),
        )
    };

    info!(num_runs, impacts, impact_probability, "monte carlo complete");

    Ok(MonteCarloResult {
        num_runs,
        num_impacts: impacts,
        impact_probability,
        mean_miss_km,
        std_miss_km,
        min_miss_km,
        window_days: config.search_days,
    })
}

/// Box-Muller transform for a zero-mean Gaussian sample
fn gaussian(rng: &mut StdRng, sigma: f64) -> f64 {
    if sigma <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.gen::<f64>().max(1e-12);
    let u2: f64 = rng.gen();
    sigma * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orbital_mechanics::J2000;

    fn short_window() -> SearchConfig {
        SearchConfig {
            search_days: 400.0,
            step_days: 0.5,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn test_earth_clone_is_an_impact() {
        let clone = Planet::Earth.elements();
        let result = find_closest_approach(&clone, J2000, &short_window()).unwrap();
        assert!(result.min_distance_au < 1e-12);
        assert_eq!(result.class, ApproachClass::Impact);
        assert!(result.relative_speed_km_s < 1e-6);
    }

    #[test]
    fn test_leading_companion_is_close_approach() {
        // Same orbit, one degree ahead: chord of ~0.0175 AU the whole time
        let mut companion = Planet::Earth.elements();
        companion.mean_longitude += 1.0;
        let result = find_closest_approach(&companion, J2000, &short_window()).unwrap();
        assert!(
            result.min_distance_au > 0.015 && result.min_distance_au < 0.02,
            "distance {}",
            result.min_distance_au
        );
        assert_eq!(result.class, ApproachClass::CloseApproach);
    }

    #[test]
    fn test_mars_is_distant() {
        let mars = Planet::Mars.elements();
        let result = find_closest_approach(&mars, J2000, &short_window()).unwrap();
        assert!(result.min_distance_au > 0.35);
        assert_eq!(result.class, ApproachClass::Distant);
        // Earth's and Mars' orbital speeds differ by ~5 km/s at best
        assert!(result.relative_speed_km_s > 1.0 && result.relative_speed_km_s < 60.0);
    }

    #[test]
    fn test_refinement_never_worse_than_grid() {
        let mut target = Planet::Venus.elements();
        target.inclination = 0.0;
        let mut coarse = short_window();
        coarse.refine = false;
        let grid = find_closest_approach(&target, J2000, &coarse).unwrap();
        let refined = find_closest_approach(&target, J2000, &short_window()).unwrap();
        assert!(refined.min_distance_au <= grid.min_distance_au + 1e-15);
        assert!((refined.day_offset - grid.day_offset).abs() <= 0.5 + 1e-9);
    }

    #[test]
    fn test_invalid_window_rejected() {
        let config = SearchConfig {
            step_days: -1.0,
            ..SearchConfig::default()
        };
        assert!(find_closest_approach(&Planet::Mars.elements(), J2000, &config).is_err());
    }

    #[test]
    fn test_non_finite_start_rejected() {
        let mars = Planet::Mars.elements();
        for start in [f64::NAN, f64::INFINITY] {
            assert!(matches!(
                find_closest_approach(&mars, start, &short_window()),
                Err(ImpactError::InvalidDate(_))
            ));
        }
    }

    #[test]
    fn test_scan_sorts_and_skips_invalid() {
        let mut broken = Planet::Mars.elements();
        broken.eccentricity = 1.5;
        let mut companion = Planet::Earth.elements();
        companion.mean_longitude += 1.0;

        let targets = vec![
            ("mars".to_string(), Planet::Mars.elements()),
            ("broken".to_string(), broken),
            ("companion".to_string(), companion),
        ];
        let entries = scan_catalog(&targets, J2000, &short_window()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "companion");
        assert_eq!(entries[1].name, "mars");
    }

    #[test]
    fn test_monte_carlo_certain_impact() {
        let clone = Planet::Earth.elements();
        let config = SearchConfig {
            search_days: 20.0,
            step_days: 1.0,
            ..SearchConfig::default()
        };
        let result = monte_carlo_impact_probability(
            &clone,
            &ElementUncertainty::default(),
            5,
            7,
            J2000,
            &config,
        )
        .unwrap();
        assert_eq!(result.num_impacts, 5);
        assert!((result.impact_probability - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_monte_carlo_zero_runs() {
        let result = monte_carlo_impact_probability(
            &Planet::Mars.elements(),
            &ElementUncertainty::default(),
            0,
            1,
            J2000,
            &short_window(),
        )
        .unwrap();
        assert_eq!(result.impact_probability, 0.0);
        assert!(result.mean_miss_km.is_none());
    }

    #[test]
    fn test_monte_carlo_without_spread_matches_single_search() {
        let mars = Planet::Mars.elements();
        let config = short_window();
        let direct = find_closest_approach(&mars, J2000, &config).unwrap();
        let result = monte_carlo_impact_probability(
            &mars,
            &ElementUncertainty::default(),
            8,
            3,
            J2000,
            &config,
        )
        .unwrap();

        assert_eq!(result.num_impacts, 0);
        assert_eq!(result.mean_miss_km, Some(direct.min_distance_km));
        assert_eq!(result.min_miss_km, Some(direct.min_distance_km));
        assert!(result.std_miss_km.unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_monte_carlo_spread_brackets_nominal() {
        let mars = Planet::Mars.elements();
        let config = short_window();
        let direct = find_closest_approach(&mars, J2000, &config).unwrap();
        let sigma = ElementUncertainty {
            semi_major_axis: 0.01,
            ..ElementUncertainty::default()
        };
        let result =
            monte_carlo_impact_probability(&mars, &sigma, 20, 11, J2000, &config).unwrap();

        let mean = result.mean_miss_km.unwrap();
        let min = result.min_miss_km.unwrap();
        assert!(result.std_miss_km.unwrap() > 0.0);
        assert!(min <= mean);
        // 0.01 AU of semi-major axis moves the miss by at most a few 1e6 km
        assert!((mean - direct.min_distance_km).abs() < 0.05 * AU_KM);
    }

    #[test]
    fn test_monte_carlo_is_reproducible() {
        let mut companion = Planet::Earth.elements();
        companion.mean_longitude += 0.5;
        let sigma = ElementUncertainty {
            semi_major_axis: 1e-3,
            eccentricity: 1e-3,
            inclination: 0.1,
            mean_longitude: 0.5,
        };
        let config = SearchConfig {
            search_days: 30.0,
            step_days: 1.0,
            ..SearchConfig::default()
        };
        let a = monte_carlo_impact_probability(&companion, &sigma, 10, 42, J2000, &config).unwrap();
        let b = monte_carlo_impact_probability(&companion, &sigma, 10, 42, J2000, &config).unwrap();
        assert_eq!(a.num_impacts, b.num_impacts);
        assert_eq!(a.mean_miss_km, b.mean_miss_km);
    }
}
