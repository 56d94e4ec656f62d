// Impact Effects - Energy, damage radii, cratering and casualties for an impactor
// Scaling laws after Collins, Melosh & Marcus (2005) and Glasstone & Dolan (1977)

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

use crate::error::{ImpactError, Result};
use crate::population::{CasualtyEstimate, DamageRadii, GeoPoint, PopulationModel};

// =============================================================================
// PHYSICAL CONSTANTS (SI Units)
// =============================================================================

/// Joules per megaton of TNT
pub const JOULES_PER_MEGATON: f64 = 4.184e15;

/// Surface gravity (m/s²)
pub const G_SURFACE: f64 = 9.81;

/// Atmospheric scale height (m)
pub const SCALE_HEIGHT: f64 = 8000.0;

/// Sea-level air density used by the entry model (kg/m³)
pub const RHO_AIR_SURFACE: f64 = 1.0;

/// Drag coefficient
pub const DRAG_COEFFICIENT: f64 = 2.0;

/// Ratio of final pancake diameter to initial diameter at airburst
pub const PANCAKE_FACTOR: f64 = 7.0;

/// Sedimentary rock target density (kg/m³)
pub const TARGET_DENSITY: f64 = 2500.0;

/// Transition diameter between simple and complex craters on Earth (km)
pub const COMPLEX_CRATER_TRANSITION_KM: f64 = 3.2;

/// 5 psi overpressure radius for a 1 Mt burst (km)
pub const BLAST_RADIUS_1MT_KM: f64 = 4.6;

/// Third-degree burn radius for a 1 Mt burst (km)
pub const THERMAL_RADIUS_1MT_KM: f64 = 11.0;

pub const THERMAL_EXPONENT: f64 = 0.41;

/// Effective Richter magnitude at the edge of the seismic damage zone
pub const SEISMIC_DAMAGE_MAGNITUDE: f64 = 4.0;

/// Asteroid density by spectral type (kg/m³)
/// References: Carry (2012), DeMeo & Carry (2013)
pub mod asteroid_density {
    pub const C_TYPE: f64 = 1700.0; // Carbonaceous
    pub const S_TYPE: f64 = 2700.0; // Silicaceous
    pub const M_TYPE: f64 = 4000.0; // Metallic
    pub const DEFAULT: f64 = 2000.0; // Rubble pile average
}

/// Estimate asteroid density from a spectral or orbit class label
pub fn estimate_density(class: &str) -> f64 {
    match class.to_uppercase().as_str() {
        // NEA orbital classes carry no composition information
        "AMO" | "APO" | "ATE" | "IEO" => asteroid_density::DEFAULT,

        s if s.contains('C') => asteroid_density::C_TYPE,
        s if s.contains('B') => 1500.0, // primitive
        s if s.contains('D') => 1200.0, // organic-rich
        s if s.contains('P') => 1300.0,
        s if s.contains('S') => asteroid_density::S_TYPE,
        s if s.contains('Q') => 2500.0, // ordinary chondrite
        s if s.contains('V') => 3200.0, // basaltic
        s if s.contains('M') => asteroid_density::M_TYPE,
        s if s.contains('X') => 3500.0,

        _ => asteroid_density::DEFAULT,
    }
}

// =============================================================================
// IMPACTOR
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ImpactorProperties {
    pub diameter_m: f64,
    pub density_kg_m3: f64,
    pub velocity_km_s: f64,
    /// Entry angle above the horizontal (degrees)
    pub angle_deg: f64,
}

impl ImpactorProperties {
    pub fn new(diameter_m: f64, velocity_km_s: f64) -> Self {
        Self {
            diameter_m,
            density_kg_m3: asteroid_density::DEFAULT,
            velocity_km_s,
            angle_deg: 45.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.diameter_m) {
            return Err(ImpactError::InvalidImpactor(format!(
                "diameter must be positive, got {} m",
                self.diameter_m
            )));
        }
        if !positive(self.density_kg_m3) {
            return Err(ImpactError::InvalidImpactor(format!(
                "density must be positive, got {} kg/m³",
                self.density_kg_m3
            )));
        }
        if !positive(self.velocity_km_s) {
            return Err(ImpactError::InvalidImpactor(format!(
                "velocity must be positive, got {} km/s",
                self.velocity_km_s
            )));
        }
        if !(self.angle_deg > 0.0 && self.angle_deg <= 90.0) {
            return Err(ImpactError::InvalidImpactor(format!(
                "entry angle must be in (0, 90] degrees, got {}",
                self.angle_deg
            )));
        }
        Ok(())
    }

    pub fn mass_kg(&self) -> f64 {
        self.density_kg_m3 * PI / 6.0 * self.diameter_m.powi(3)
    }

    fn velocity_m_s(&self) -> f64 {
        self.velocity_km_s * 1000.0
    }

    pub fn kinetic_energy_j(&self) -> f64 {
        let v = self.velocity_m_s();
        0.5 * self.mass_kg() * v * v
    }

    pub fn energy_megatons(&self) -> f64 {
        self.kinetic_energy_j() / JOULES_PER_MEGATON
    }
}

// =============================================================================
// SCALING LAWS
// =============================================================================

/// Radius of 5 psi overpressure, cube-root yield scaling (km)
pub fn blast_radius_km(energy_megatons: f64) -> f64 {
    BLAST_RADIUS_1MT_KM * energy_megatons.max(0.0).cbrt()
}

/// Radius of third-degree burns (km)
pub fn thermal_radius_km(energy_megatons: f64) -> f64 {
    THERMAL_RADIUS_1MT_KM * energy_megatons.max(0.0).powf(THERMAL_EXPONENT)
}

/// Richter magnitude of the impact-generated quake
pub fn seismic_magnitude(energy_j: f64) -> f64 {
    0.67 * energy_j.log10() - 5.87
}

/// Effective magnitude felt `distance_km` from ground zero
pub fn effective_magnitude(magnitude: f64, distance_km: f64) -> f64 {
    if distance_km < 60.0 {
        magnitude - 0.0238 * distance_km
    } else if distance_km < 700.0 {
        magnitude - 0.0048 * distance_km - 1.1644
    } else {
        // log tail joined to the middle segment at 700 km
        magnitude - 4.5244 - 1.66 * (distance_km / 700.0).log10()
    }
}

/// Distance at which the effective magnitude falls to the damage threshold (km)
pub fn seismic_radius_km(magnitude: f64) -> f64 {
    let excess = magnitude - SEISMIC_DAMAGE_MAGNITUDE;
    if excess <= 0.0 {
        return 0.0;
    }
    if excess < 0.0238 * 60.0 {
        return excess / 0.0238;
    }
    let middle = ((excess - 1.1644) / 0.0048).max(60.0);
    if middle < 700.0 {
        return middle;
    }
    700.0 * 10f64.powf((excess - 4.5244) / 1.66)
}

/// Palermo technical scale for `probability` over `window_years`
pub fn palermo_scale(probability: f64, energy_megatons: f64, window_years: f64) -> Option<f64> {
    if probability <= 0.0 || energy_megatons <= 0.0 || window_years <= 0.0 {
        return None;
    }
    let background_per_year = 0.03 * energy_megatons.powf(-0.8);
    Some((probability / (background_per_year * window_years)).log10())
}

// =============================================================================
// ATMOSPHERIC ENTRY
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImpactMode {
    Airburst,
    Ground,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AtmosphericEntry {
    pub yield_strength_pa: f64,
    pub breakup_parameter: f64,
    /// Altitude where aerodynamic stress first exceeds strength (m)
    pub breakup_altitude_m: Option<f64>,
    /// Altitude where the pancaked fragments deposit their energy (m)
    pub burst_altitude_m: Option<f64>,
    pub mode: ImpactMode,
}

pub fn atmospheric_entry(impactor: &ImpactorProperties) -> AtmosphericEntry {
    let rho = impactor.density_kg_m3;
    let v = impactor.velocity_m_s();
    let sin_theta = impactor.angle_deg.to_radians().sin();
    let yield_strength_pa = 10f64.powf(2.107 + 0.0624 * rho.sqrt());

    let breakup_parameter = 4.07 * DRAG_COEFFICIENT * SCALE_HEIGHT * yield_strength_pa
        / (rho * impactor.diameter_m * v * v * sin_theta);

    let ground = |breakup_altitude_m| AtmosphericEntry {
        yield_strength_pa,
        breakup_parameter,
        breakup_altitude_m,
        burst_altitude_m: None,
        mode: ImpactMode::Ground,
    };

    // Strong enough to reach the surface intact
    if breakup_parameter >= 1.0 {
        return ground(None);
    }

    let breakup_altitude = -SCALE_HEIGHT
        * ((yield_strength_pa / (RHO_AIR_SURFACE * v * v)).ln() + 1.308
            - 0.314 * breakup_parameter
            - 1.303 * (1.0 - breakup_parameter).sqrt());
    if breakup_altitude <= 0.0 {
        return ground(None);
    }

    let air_density = RHO_AIR_SURFACE * (-breakup_altitude / SCALE_HEIGHT).exp();
    let dispersion_length =
        impactor.diameter_m * sin_theta * (rho / (DRAG_COEFFICIENT * air_density)).sqrt();
    let burst_altitude = breakup_altitude
        - 2.0
            * SCALE_HEIGHT
            * (1.0
                + dispersion_length / (2.0 * SCALE_HEIGHT)
                    * (PANCAKE_FACTOR * PANCAKE_FACTOR - 1.0).sqrt())
            .ln();

    if burst_altitude > 0.0 {
        AtmosphericEntry {
            yield_strength_pa,
            breakup_parameter,
            breakup_altitude_m: Some(breakup_altitude),
            burst_altitude_m: Some(burst_altitude),
            mode: ImpactMode::Airburst,
        }
    } else {
        ground(Some(breakup_altitude))
    }
}

// =============================================================================
// CRATER
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CraterKind {
    Simple,
    Complex,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Crater {
    pub transient_diameter_km: f64,
    pub final_diameter_km: f64,
    pub depth_km: f64,
    pub kind: CraterKind,
}

/// Pi-scaled crater dimensions for an intact impactor
pub fn crater(impactor: &ImpactorProperties) -> Crater {
    let transient_m = 1.161
        * (impactor.density_kg_m3 / TARGET_DENSITY).cbrt()
        * impactor.diameter_m.powf(0.78)
        * impactor.velocity_m_s().powf(0.44)
        * G_SURFACE.powf(-0.22)
        * impactor.angle_deg.to_radians().sin().cbrt();
    let transient_km = transient_m / 1000.0;

    let simple_diameter = 1.25 * transient_km;
    if simple_diameter < COMPLEX_CRATER_TRANSITION_KM {
        Crater {
            transient_diameter_km: transient_km,
            final_diameter_km: simple_diameter,
            depth_km: transient_km / (2.0 * 2.0_f64.sqrt()),
            kind: CraterKind::Simple,
        }
    } else {
        let final_km =
            1.17 * transient_km.powf(1.13) / COMPLEX_CRATER_TRANSITION_KM.powf(0.13);
        Crater {
            transient_diameter_km: transient_km,
            final_diameter_km: final_km,
            depth_km: 0.4 * final_km.powf(0.3),
            kind: CraterKind::Complex,
        }
    }
}

// =============================================================================
// FULL ASSESSMENT
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactAssessment {
    pub impactor: ImpactorProperties,
    pub site: GeoPoint,
    pub mass_kg: f64,
    pub energy_joules: f64,
    pub energy_megatons: f64,
    pub entry: AtmosphericEntry,
    pub radii: DamageRadii,
    pub seismic_magnitude: f64,
    /// `None` for airbursts
    pub crater: Option<Crater>,
    pub casualties: CasualtyEstimate,
}

pub fn assess_impact(
    impactor: &ImpactorProperties,
    site: &GeoPoint,
    population: &PopulationModel,
) -> Result<ImpactAssessment> {
    impactor.validate()?;

    let energy_joules = impactor.kinetic_energy_j();
    let energy_megatons = energy_joules / JOULES_PER_MEGATON;
    let entry = atmospheric_entry(impactor);
    let magnitude = seismic_magnitude(energy_joules);

    let radii = DamageRadii {
        blast_km: blast_radius_km(energy_megatons),
        thermal_km: thermal_radius_km(energy_megatons),
        // an airburst does not couple into the ground
        seismic_km: match entry.mode {
            ImpactMode::Ground => seismic_radius_km(magnitude),
            ImpactMode::Airburst => 0.0,
        },
    };

    let crater = match entry.mode {
        ImpactMode::Ground => Some(crater(impactor)),
        ImpactMode::Airburst => None,
    };

    let casualties = population.estimate_casualties(site, &radii);

    debug!(
        energy_megatons,
        mode = ?entry.mode,
        blast_km = radii.blast_km,
        deaths = casualties.total_deaths,
        "impact assessed"
    );

    Ok(ImpactAssessment {
        impactor: *impactor,
        site: *site,
        mass_kg: impactor.mass_kg(),
        energy_joules,
        energy_megatons,
        entry,
        radii,
        seismic_magnitude: magnitude,
        crater,
        casualties,
    })
}

// =============================================================================
// TESTS
// =============================================================================
