// Orbital Mechanics - Keplerian propagation in the J2000 ecliptic frame
// Implements the JPL approximate-position algorithm and a Newton-Raphson Kepler solver

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

use crate::error::{ImpactError, Result};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Julian Date of the J2000.0 epoch (2000-01-01 12:00 TT)
pub const J2000: f64 = 2451545.0;

/// Days per Julian century
pub const DAYS_PER_CENTURY: f64 = 36525.0;

/// Julian Date of the Unix epoch (1970-01-01 00:00 UTC)
pub const UNIX_EPOCH_JD: f64 = 2440587.5;

/// Astronomical Unit in kilometers
pub const AU_KM: f64 = 1.495978707e8;

/// Seconds per day
pub const SECONDS_PER_DAY: f64 = 86400.0;

const KEPLER_TOLERANCE: f64 = 1e-12;
const KEPLER_MAX_ITERATIONS: usize = 50;

// =============================================================================
// 3D VECTOR MATHEMATICS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > 1e-15 {
            self.scale(1.0 / mag)
        } else {
            Self::zero()
        }
    }

    pub fn dot(&self, other: &Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn scale(&self, s: f64) -> Self {
        Self {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }

    pub fn add(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }

    pub fn sub(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }

    pub fn distance(&self, other: &Vector3) -> f64 {
        self.sub(other).magnitude()
    }
}

// =============================================================================
// KEPLERIAN ORBITAL ELEMENTS (mean-longitude form)
// =============================================================================

/// Linear rates of change for each element, per Julian century
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct ElementRates {
    pub semi_major_axis: f64,
    pub eccentricity: f64,
    pub inclination: f64,
    pub mean_longitude: f64,
    pub longitude_perihelion: f64,
    pub longitude_ascending_node: f64,
}

/// The six classical elements (a, e, I, L, ϖ, Ω).
///
/// Angles are stored in degrees, distances in AU. `epoch` is the Julian Date at
/// which the values hold; `rates` advance them linearly in Julian centuries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct KeplerianElements {
    /// Semi-major axis (AU)
    pub semi_major_axis: f64,
    /// Eccentricity (0-1 for elliptical)
    pub eccentricity: f64,
    /// Inclination to the ecliptic (degrees)
    pub inclination: f64,
    /// Mean longitude L = M + ϖ (degrees)
    pub mean_longitude: f64,
    /// Longitude of perihelion ϖ = ω + Ω (degrees)
    pub longitude_perihelion: f64,
    /// Longitude of ascending node Ω (degrees)
    pub longitude_ascending_node: f64,
    /// Epoch (Julian Date)
    pub epoch: f64,
    pub rates: ElementRates,
}

impl KeplerianElements {
    /// Build mean-longitude elements from the osculating set published by
    /// NeoWs / JPL SBDB: a, e, i, Ω, ω, M at `epoch`, and mean motion n in deg/day.
    #[allow(clippy::too_many_arguments)]
    pub fn from_osculating(
        semi_major_axis: f64,
        eccentricity: f64,
        inclination: f64,
        ascending_node: f64,
        perihelion_argument: f64,
        mean_anomaly: f64,
        mean_motion_deg_per_day: f64,
        epoch: f64,
    ) -> Self {
        let longitude_perihelion = perihelion_argument + ascending_node;
        Self {
            semi_major_axis,
            eccentricity,
            inclination,
            mean_longitude: mean_anomaly + longitude_perihelion,
            longitude_perihelion,
            longitude_ascending_node: ascending_node,
            epoch,
            rates: ElementRates {
                mean_longitude: mean_motion_deg_per_day * DAYS_PER_CENTURY,
                ..ElementRates::default()
            },
        }
    }

    /// Mean motion implied by Kepler's third law for a heliocentric orbit (deg/day)
    pub fn kepler_mean_motion(semi_major_axis: f64) -> f64 {
        360.0 / orbital_period_days(semi_major_axis)
    }

    pub fn validate(&self) -> Result<()> {
        let finite = [
            self.semi_major_axis,
            self.eccentricity,
            self.inclination,
            self.mean_longitude,
            self.longitude_perihelion,
            self.longitude_ascending_node,
            self.epoch,
        ]
        .iter()
        .all(|v| v.is_finite());

        if !finite {
            return Err(ImpactError::InvalidElements(
                "non-finite element value".to_string(),
            ));
        }
        if self.semi_major_axis <= 0.0 {
            return Err(ImpactError::InvalidElements(format!(
                "semi-major axis must be positive, got {}",
                self.semi_major_axis
            )));
        }
        if !(0.0..1.0).contains(&self.eccentricity) {
            return Err(ImpactError::InvalidElements(format!(
                "eccentricity must be in [0, 1), got {}",
                self.eccentricity
            )));
        }
        Ok(())
    }

    /// Elements advanced to `julian_date` by their secular rates
    pub fn at(&self, julian_date: f64) -> KeplerianElements {
        let t = (julian_date - self.epoch) / DAYS_PER_CENTURY;
        let r = &self.rates;
        KeplerianElements {
            semi_major_axis: self.semi_major_axis + r.semi_major_axis * t,
            eccentricity: self.eccentricity + r.eccentricity * t,
            inclination: self.inclination + r.inclination * t,
            mean_longitude: self.mean_longitude + r.mean_longitude * t,
            longitude_perihelion: self.longitude_perihelion + r.longitude_perihelion * t,
            longitude_ascending_node: self.longitude_ascending_node
                + r.longitude_ascending_node * t,
            epoch: julian_date,
            rates: self.rates,
        }
    }

    /// Heliocentric position (AU) in the J2000 ecliptic frame at `julian_date`
    pub fn position(&self, julian_date: f64) -> Vector3 {
        let el = self.at(julian_date);
        let a = el.semi_major_axis;
        let e = el.eccentricity;

        let arg_perihelion = (el.longitude_perihelion - el.longitude_ascending_node).to_radians();
        let mean_anomaly = normalize_degrees(el.mean_longitude - el.longitude_perihelion).to_radians();

        let eccentric_anomaly = solve_kepler_equation(mean_anomaly, e);

        // Position in orbital plane (perifocal frame)
        let x_orb = a * (eccentric_anomaly.cos() - e);
        let y_orb = a * (1.0 - e * e).sqrt() * eccentric_anomaly.sin();

        let (sin_w, cos_w) = arg_perihelion.sin_cos();
        let (sin_node, cos_node) = el.longitude_ascending_node.to_radians().sin_cos();
        let (sin_i, cos_i) = el.inclination.to_radians().sin_cos();

        Vector3::new(
            (cos_w * cos_node - sin_w * sin_node * cos_i) * x_orb
                + (-sin_w * cos_node - cos_w * sin_node * cos_i) * y_orb,
            (cos_w * sin_node + sin_w * cos_node * cos_i) * x_orb
                + (-sin_w * sin_node + cos_w * cos_node * cos_i) * y_orb,
            (sin_w * sin_i) * x_orb + (cos_w * sin_i) * y_orb,
        )
    }

    /// Heliocentric velocity (AU/day) by central difference over `half_step_days`
    pub fn velocity(&self, julian_date: f64, half_step_days: f64) -> Vector3 {
        let ahead = self.position(julian_date + half_step_days);
        let behind = self.position(julian_date - half_step_days);
        ahead.sub(&behind).scale(0.5 / half_step_days)
    }

    pub fn perihelion_distance(&self) -> f64 {
        self.semi_major_axis * (1.0 - self.eccentricity)
    }

    pub fn aphelion_distance(&self) -> f64 {
        self.semi_major_axis * (1.0 + self.eccentricity)
    }

    pub fn period_days(&self) -> f64 {
        orbital_period_days(self.semi_major_axis)
    }
}

/// Sidereal period from Kepler's third law, heliocentric (days)
pub fn orbital_period_days(semi_major_axis_au: f64) -> f64 {
    365.25 * semi_major_axis_au.powf(1.5)
}

/// Reduce an angle in degrees to (-180, 180]
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Solve Kepler's equation M = E - e*sin(E) using Newton-Raphson (radians).
///
/// Steps that leave the bracket on E fall back to bisection, which keeps
/// near-parabolic orbits convergent close to perihelion.
pub fn solve_kepler_equation(mean_anomaly: f64, eccentricity: f64) -> f64 {
    // Reduce M to [-π, π); f(E) = E - e sin E - M is increasing with f(-π) ≤ 0 ≤ f(π)
    let offset = ((mean_anomaly + PI) / TAU).floor() * TAU;
    let m = mean_anomaly - offset;

    let (mut lo, mut hi) = (-PI, PI);
    let mut e_anom = m + eccentricity * m.sin();

    for _ in 0..KEPLER_MAX_ITERATIONS {
        let f = e_anom - eccentricity * e_anom.sin() - m;
        if f > 0.0 {
            hi = e_anom;
        } else if f < 0.0 {
            lo = e_anom;
        } else {
            break;
        }

        let f_prime = 1.0 - eccentricity * e_anom.cos();
        let delta = f / f_prime;
        if delta.abs() < KEPLER_TOLERANCE {
            e_anom -= delta;
            break;
        }

        let newton = e_anom - delta;
        e_anom = if newton > lo && newton < hi {
            newton
        } else {
            0.5 * (lo + hi)
        };

        if hi - lo < KEPLER_TOLERANCE {
            break;
        }
    }

    e_anom + offset
}

// =============================================================================
// PLANETS (JPL approximate elements, valid 1800-2050 AD)
// Reference: Standish, "Keplerian Elements for Approximate Positions of the
// Major Planets", JPL SSD
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Planet {
    Mercury,
    Venus,
    /// Earth-Moon barycentre
    Earth,
    Mars,
    Jupiter,
    Saturn,
    Uranus,
    Neptune,
}

impl Planet {
    pub const ALL: [Planet; 8] = [
        Planet::Mercury,
        Planet::Venus,
        Planet::Earth,
        Planet::Mars,
        Planet::Jupiter,
        Planet::Saturn,
        Planet::Uranus,
        Planet::Neptune,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Planet::Mercury => "Mercury",
            Planet::Venus => "Venus",
            Planet::Earth => "Earth",
            Planet::Mars => "Mars",
            Planet::Jupiter => "Jupiter",
            Planet::Saturn => "Saturn",
            Planet::Uranus => "Uranus",
            Planet::Neptune => "Neptune",
        }
    }

    pub fn from_name(name: &str) -> Option<Planet> {
        Planet::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn elements(&self) -> KeplerianElements {
        // (a, e, I, L, ϖ, Ω) followed by their rates per century
        let (values, rates) = match self {
            Planet::Mercury => (
                [0.38709927, 0.20563593, 7.00497902, 252.25032350, 77.45779628, 48.33076593],
                [0.00000037, 0.00001906, -0.00594749, 149472.67411175, 0.16047689, -0.12534081],
            ),
            Planet::Venus => (
                [0.72333566, 0.00677672, 3.39467605, 181.97909950, 131.60246718, 76.67984255],
                [0.00000390, -0.00004107, -0.00078890, 58517.81538729, 0.00268329, -0.27769418],
            ),
            Planet::Earth => (
                [1.00000261, 0.01671123, -0.00001531, 100.46457166, 102.93768193, 0.0],
                [0.00000562, -0.00004392, -0.01294668, 35999.37244981, 0.32327364, 0.0],
            ),
            Planet::Mars => (
                [1.52371034, 0.09339410, 1.84969142, -4.55343205, -23.94362959, 49.55953891],
                [0.00001847, 0.00007882, -0.00813131, 19140.30268499, 0.44441088, -0.29257343],
            ),
            Planet::Jupiter => (
                [5.20288700, 0.04838624, 1.30439695, 34.39644051, 14.72847983, 100.47390909],
                [-0.00011607, -0.00013253, -0.00183714, 3034.74612775, 0.21252668, 0.20469106],
            ),
            Planet::Saturn => (
                [9.53667594, 0.05386179, 2.48599187, 49.95424423, 92.59887831, 113.66242448],
                [-0.00125060, -0.00050991, 0.00193609, 1222.49362201, -0.41897216, -0.28867794],
            ),
            Planet::Uranus => (
                [19.18916464, 0.04725744, 0.77263783, 313.23810451, 170.95427630, 74.01692503],
                [-0.00196176, -0.00004397, -0.00242939, 428.48202785, 0.40805281, 0.04240589],
            ),
            Planet::Neptune => (
                [30.06992276, 0.00859048, 1.77004347, -55.12002969, 44.96476227, 131.78422574],
                [0.00026291, 0.00005105, 0.00035372, 218.45945325, -0.32241464, -0.00508664],
            ),
        };

        KeplerianElements {
            semi_major_axis: values[0],
            eccentricity: values[1],
            inclination: values[2],
            mean_longitude: values[3],
            longitude_perihelion: values[4],
            longitude_ascending_node: values[5],
            epoch: J2000,
            rates: ElementRates {
                semi_major_axis: rates[0],
                eccentricity: rates[1],
                inclination: rates[2],
                mean_longitude: rates[3],
                longitude_perihelion: rates[4],
                longitude_ascending_node: rates[5],
            },
        }
    }

    pub fn position(&self, julian_date: f64) -> Vector3 {
        self.elements().position(julian_date)
    }
}

// =============================================================================
// JULIAN DATE CONVERSION
// =============================================================================

pub fn datetime_to_julian(time: &DateTime<Utc>) -> f64 {
    let seconds = time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) * 1e-9;
    seconds / SECONDS_PER_DAY + UNIX_EPOCH_JD
}

pub fn julian_to_datetime(julian_date: f64) -> Result<DateTime<Utc>> {
    let millis = ((julian_date - UNIX_EPOCH_JD) * SECONDS_PER_DAY * 1000.0).round();
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return Err(ImpactError::InvalidDate(format!("JD {julian_date}")));
    }
    Utc.timestamp_millis_opt(millis as i64)
        .single()
        .ok_or_else(|| ImpactError::InvalidDate(format!("JD {julian_date}")))
}

/// Parse `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp into a Julian Date
pub fn parse_julian_date(text: &str) -> Result<f64> {
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Ok(datetime_to_julian(&time.with_timezone(&Utc)));
    }
    let date = chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| ImpactError::InvalidDate(format!("{text}: {e}")))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ImpactError::InvalidDate(text.to_string()))?;
    Ok(datetime_to_julian(&Utc.from_utc_datetime(&midnight)))
}

// =============================================================================
// TESTS
// =============================================================================
