// NEO Impact - Command-line front end
// Loads config, installs logging and dispatches one subcommand

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

use neo_impact::approach_search::{
    find_closest_approach, monte_carlo_impact_probability, scan_catalog, ElementUncertainty,
};
use neo_impact::config::AppConfig;
use neo_impact::error::{ImpactError, Result};
use neo_impact::impact_effects::{assess_impact, palermo_scale, ImpactorProperties};
use neo_impact::logging::init_logging;
use neo_impact::neo_data::{read_json, NeoObject, NeoStore, ProcessedAsteroid};
use neo_impact::orbital_mechanics::{
    datetime_to_julian, julian_to_datetime, parse_julian_date, KeplerianElements, Planet,
};
use neo_impact::population::{GeoPoint, PopulationModel};
use neo_impact::sim_clock::{parse_clock_time, SimulationClock};

/// Keplerian propagation, closest-approach search and impact consequences for NEOs.
///
/// CLI values override settings loaded from the environment and `.env`.
#[derive(Parser, Debug)]
#[command(name = "neo-impact", about = "NEO orbit and impact consequence toolkit")]
struct Cli {
    /// Directory holding `neo_all/` and `neo_one/` NeoWs files.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Search window length in days.
    #[arg(long, global = true)]
    search_days: Option<f64>,

    /// Search step in days.
    #[arg(long, global = true)]
    step_days: Option<f64>,

    /// Background population density (people/km²).
    #[arg(long, global = true)]
    background_density: Option<f64>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Heliocentric ecliptic position of a planet or NEO.
    Position {
        /// Planet name; all planets when omitted.
        planet: Option<String>,

        /// NeoWs `neo/{id}` JSON file to propagate instead of a planet.
        #[arg(long, conflicts_with = "planet")]
        neo: Option<PathBuf>,

        /// Date (YYYY-MM-DD or RFC 3339); now when omitted.
        #[arg(long)]
        date: Option<String>,
    },

    /// Closest approach of a NEO to Earth over the search window.
    Approach {
        #[arg(long)]
        neo: PathBuf,

        #[arg(long)]
        date: Option<String>,
    },

    /// Consequences of an impact at a site.
    Impact {
        /// Impactor diameter (m).
        #[arg(long)]
        diameter: f64,

        /// Impact velocity (km/s).
        #[arg(long)]
        velocity: f64,

        /// Bulk density (kg/m³).
        #[arg(long)]
        density: Option<f64>,

        /// Entry angle above the horizontal (degrees).
        #[arg(long, default_value_t = 45.0)]
        angle: f64,

        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },

    /// Closest approaches for every NEO in a stored feed window.
    Scan {
        /// Feed start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// Feed end date (YYYY-MM-DD).
        #[arg(long)]
        end: String,

        /// Search start; the feed start date when omitted.
        #[arg(long)]
        date: Option<String>,

        /// Number of rows to print.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Impact probability from sampled element uncertainty.
    MonteCarlo {
        #[arg(long)]
        neo: PathBuf,

        #[arg(long, default_value_t = 100)]
        runs: u32,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// One-sigma semi-major axis (AU).
        #[arg(long, default_value_t = 1e-4)]
        sigma_a: f64,

        /// One-sigma eccentricity.
        #[arg(long, default_value_t = 1e-4)]
        sigma_e: f64,

        /// One-sigma inclination (degrees).
        #[arg(long, default_value_t = 0.01)]
        sigma_i: f64,

        /// One-sigma mean longitude (degrees).
        #[arg(long, default_value_t = 0.05)]
        sigma_l: f64,

        #[arg(long)]
        date: Option<String>,
    },

    /// Drive a simulated clock with JSON commands read line by line from stdin.
    Clock {
        /// Initial simulated time; now when omitted.
        #[arg(long)]
        start: Option<String>,
    },
}

fn apply_cli_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(ref dir) = cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(ref level) = cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(days) = cli.search_days {
        config.search.search_days = days;
    }
    if let Some(step) = cli.step_days {
        config.search.step_days = step;
    }
    if let Some(density) = cli.background_density {
        config.background_density = density;
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    apply_cli_overrides(&mut config, &cli);
    init_logging(&config.log_level);

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: &AppConfig) -> Result<()> {
    match &cli.command {
        Command::Position { planet, neo, date } => {
            let jd = julian_date_or_now(date.as_deref())?;
            position(cli.json, planet.as_deref(), neo.as_deref(), jd)
        }
        Command::Approach { neo, date } => {
            let jd = julian_date_or_now(date.as_deref())?;
            approach(cli.json, config, neo, jd)
        }
        Command::Impact {
            diameter,
            velocity,
            density,
            angle,
            lat,
            lon,
        } => {
            let mut impactor = ImpactorProperties::new(*diameter, *velocity);
            if let Some(density) = density {
                impactor.density_kg_m3 = *density;
            }
            impactor.angle_deg = *angle;
            let site = GeoPoint::new(*lat, *lon)?;
            impact(cli.json, config, &impactor, &site)
        }
        Command::Scan {
            start,
            end,
            date,
            limit,
        } => {
            let jd = parse_julian_date(date.as_deref().unwrap_or(start))?;
            scan(cli.json, config, start, end, jd, *limit)
        }
        Command::MonteCarlo {
            neo,
            runs,
            seed,
            sigma_a,
            sigma_e,
            sigma_i,
            sigma_l,
            date,
        } => {
            let jd = julian_date_or_now(date.as_deref())?;
            let sigma = ElementUncertainty {
                semi_major_axis: *sigma_a,
                eccentricity: *sigma_e,
                inclination: *sigma_i,
                mean_longitude: *sigma_l,
            };
            monte_carlo(cli.json, config, neo, &sigma, *runs, *seed, jd)
        }
        Command::Clock { start } => clock(start.as_deref()),
    }
}

// =============================================================================
// SUBCOMMANDS
// =============================================================================

#[derive(Serialize)]
struct PositionRow {
    name: String,
    julian_date: f64,
    x_au: f64,
    y_au: f64,
    z_au: f64,
    distance_au: f64,
}

fn position(json: bool, planet: Option<&str>, neo: Option<&Path>, jd: f64) -> Result<()> {
    let bodies: Vec<(String, KeplerianElements)> = match (planet, neo) {
        (_, Some(path)) => {
            let asteroid = load_asteroid(path)?;
            vec![(asteroid.name, asteroid.elements)]
        }
        (Some(name), None) => {
            let planet = Planet::from_name(name)
                .ok_or_else(|| ImpactError::InvalidElements(format!("unknown planet {name}")))?;
            vec![(planet.name().to_string(), planet.elements())]
        }
        (None, None) => Planet::ALL
            .iter()
            .map(|p| (p.name().to_string(), p.elements()))
            .collect(),
    };

    let rows: Vec<PositionRow> = bodies
        .into_iter()
        .map(|(name, elements)| {
            let r = elements.position(jd);
            PositionRow {
                name,
                julian_date: jd,
                x_au: r.x,
                y_au: r.y,
                z_au: r.z,
                distance_au: r.magnitude(),
            }
        })
        .collect();

    if json {
        return print_json(&rows);
    }
    println!("JD {jd:.5}");
    for row in &rows {
        println!(
            "{:<24} x={:>11.6} y={:>11.6} z={:>11.6}  r={:.6} AU",
            row.name, row.x_au, row.y_au, row.z_au, row.distance_au
        );
    }
    Ok(())
}

fn approach(json: bool, config: &AppConfig, neo: &Path, jd: f64) -> Result<()> {
    let asteroid = load_asteroid(neo)?;
    info!(name = %asteroid.name, "searching for closest approach");
    let result = find_closest_approach(&asteroid.elements, jd, &config.search)?;

    if json {
        return print_json(&result);
    }
    let when = julian_to_datetime(result.julian_date)?;
    println!("{}", asteroid.name);
    println!(
        "  closest approach: {:.6} AU ({:.0} km) on {} (day {:.2})",
        result.min_distance_au,
        result.min_distance_km,
        when.format("%Y-%m-%d %H:%M UTC"),
        result.day_offset
    );
    println!("  relative speed:   {:.2} km/s", result.relative_speed_km_s);
    println!("  class:            {:?}", result.class);
    if result.is_impact() {
        let impactor = asteroid.impactor(Some(result.relative_speed_km_s));
        println!("  impact energy:    {:.2} Mt", impactor.energy_megatons());
    }
    Ok(())
}

fn impact(
    json: bool,
    config: &AppConfig,
    impactor: &ImpactorProperties,
    site: &GeoPoint,
) -> Result<()> {
    let population = PopulationModel::new(config.background_density);
    let assessment = assess_impact(impactor, site, &population)?;

    if json {
        return print_json(&assessment);
    }
    println!(
        "Impactor: {:.0} m at {:.1} km/s, {:.0} kg/m³, {:.0}°",
        impactor.diameter_m, impactor.velocity_km_s, impactor.density_kg_m3, impactor.angle_deg
    );
    println!(
        "Energy:   {:.3e} J ({:.2} Mt)",
        assessment.energy_joules, assessment.energy_megatons
    );
    println!("Mode:     {:?}", assessment.entry.mode);
    if let Some(altitude) = assessment.entry.burst_altitude_m {
        println!("Burst at: {:.1} km", altitude / 1000.0);
    }
    println!("Blast:    {:.1} km", assessment.radii.blast_km);
    println!("Thermal:  {:.1} km", assessment.radii.thermal_km);
    println!(
        "Seismic:  {:.1} km (M{:.1})",
        assessment.radii.seismic_km, assessment.seismic_magnitude
    );
    if let Some(crater) = &assessment.crater {
        println!(
            "Crater:   {:.2} km wide, {:.2} km deep ({:?})",
            crater.final_diameter_km, crater.depth_km, crater.kind
        );
    }
    let casualties = &assessment.casualties;
    println!(
        "Deaths:   {:.0} (blast {:.0}, thermal {:.0}, seismic {:.0})",
        casualties.total_deaths,
        casualties.blast_deaths,
        casualties.thermal_deaths,
        casualties.seismic_deaths
    );
    for city in &casualties.affected_cities {
        println!(
            "  {:<20} {:>7.0} km  {:.0} deaths",
            city.name, city.distance_km, city.deaths
        );
    }
    Ok(())
}

fn scan(
    json: bool,
    config: &AppConfig,
    start: &str,
    end: &str,
    jd: f64,
    limit: usize,
) -> Result<()> {
    let store = NeoStore::new(&config.data_dir);
    let targets: Vec<(String, KeplerianElements)> = store
        .asteroids(start, end)?
        .into_iter()
        .map(|a| (a.name, a.elements))
        .collect();
    info!(count = targets.len(), start, end, "scanning feed window");

    let entries = scan_catalog(&targets, jd, &config.search)?;
    let shown = &entries[..entries.len().min(limit)];

    if json {
        return print_json(&shown);
    }
    for entry in shown {
        println!(
            "{:<28} {:>10.6} AU  day {:>7.1}  {:?}",
            entry.name,
            entry.approach.min_distance_au,
            entry.approach.day_offset,
            entry.approach.class
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct MonteCarloReport {
    name: String,
    #[serde(flatten)]
    result: neo_impact::approach_search::MonteCarloResult,
    energy_megatons: f64,
    palermo_scale: Option<f64>,
}

fn monte_carlo(
    json: bool,
    config: &AppConfig,
    neo: &Path,
    sigma: &ElementUncertainty,
    runs: u32,
    seed: u64,
    jd: f64,
) -> Result<()> {
    let asteroid = load_asteroid(neo)?;
    let result =
        monte_carlo_impact_probability(&asteroid.elements, sigma, runs, seed, jd, &config.search)?;

    let energy_megatons = asteroid.impactor(None).energy_megatons();
    let window_years = result.window_days / 365.25;
    let report = MonteCarloReport {
        name: asteroid.name,
        palermo_scale: palermo_scale(result.impact_probability, energy_megatons, window_years),
        energy_megatons,
        result,
    };

    if json {
        return print_json(&report);
    }
    println!("{}", report.name);
    println!(
        "  impacts:     {}/{} (p = {:.4})",
        report.result.num_impacts, report.result.num_runs, report.result.impact_probability
    );
    if let (Some(mean), Some(std), Some(min)) = (
        report.result.mean_miss_km,
        report.result.std_miss_km,
        report.result.min_miss_km,
    ) {
        println!("  miss:        {mean:.0} ± {std:.0} km (min {min:.0} km)");
    }
    match report.palermo_scale {
        Some(ps) => println!("  palermo:     {ps:.2}"),
        None => println!("  palermo:     n/a"),
    }
    Ok(())
}

fn clock(start: Option<&str>) -> Result<()> {
    let start = match start {
        Some(text) => parse_clock_time(text)?,
        None => Utc::now(),
    };
    let clock = SimulationClock::new(start).shared();

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event = clock.write().handle_message(&line);
        writeln!(stdout, "{}", serde_json::to_string(&event)?)?;
        stdout.flush()?;
    }
    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

fn julian_date_or_now(date: Option<&str>) -> Result<f64> {
    match date {
        Some(text) => parse_julian_date(text),
        None => Ok(datetime_to_julian(&Utc::now())),
    }
}

fn load_asteroid(path: &Path) -> Result<ProcessedAsteroid> {
    let neo: NeoObject = read_json(path)?;
    neo.to_processed()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let cli = Cli::try_parse_from([
            "neo-impact",
            "--data-dir",
            "/tmp/neo",
            "--step-days",
            "0.5",
            "--log-level",
            "debug",
            "position",
            "mars",
        ])
        .unwrap();
        let mut config = AppConfig::default();
        apply_cli_overrides(&mut config, &cli);

        assert_eq!(config.data_dir, PathBuf::from("/tmp/neo"));
        assert_eq!(config.search.step_days, 0.5);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.search.search_days, 1825.0);
    }

    #[test]
    fn test_impact_accepts_southern_western_site() {
        let cli = Cli::try_parse_from([
            "neo-impact",
            "impact",
            "--diameter",
            "50",
            "--velocity",
            "17",
            "--lat",
            "-33.87",
            "--lon",
            "-70.65",
        ])
        .unwrap();
        match cli.command {
            Command::Impact { lat, lon, angle, .. } => {
                assert_eq!(lat, -33.87);
                assert_eq!(lon, -70.65);
                assert_eq!(angle, 45.0);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_position_rejects_planet_and_neo_together() {
        let result = Cli::try_parse_from([
            "neo-impact",
            "position",
            "earth",
            "--neo",
            "apophis.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_planet_is_an_error() {
        let err = position(false, Some("pluto"), None, 2451545.0).unwrap_err();
        assert!(matches!(err, ImpactError::InvalidElements(_)));
    }
}
