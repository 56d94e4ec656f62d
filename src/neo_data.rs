// NEO Data - NASA NeoWs record model and the local JSON fallback store
// Reads the `neo_all/` feed files and `neo_one/` per-object files saved next to the app

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ImpactError, Result};
use crate::impact_effects::{estimate_density, ImpactorProperties};
use crate::orbital_mechanics::KeplerianElements;

/// Used when a record carries no estimated diameter (m)
pub const FALLBACK_DIAMETER_M: f64 = 100.0;

/// Used when a record carries no Earth close approach (km/s)
pub const FALLBACK_IMPACT_VELOCITY_KM_S: f64 = 20.0;

// =============================================================================
// API RESPONSE TYPES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeoWsResponse {
    pub links: Option<Links>,
    pub element_count: Option<i32>,
    /// Keyed by close-approach date (YYYY-MM-DD)
    pub near_earth_objects: Option<BTreeMap<String, Vec<NeoObject>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Links {
    pub next: Option<String>,
    pub prev: Option<String>,
    #[serde(rename = "self")]
    pub self_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeoObject {
    pub id: String,
    pub neo_reference_id: Option<String>,
    pub name: String,
    pub nasa_jpl_url: Option<String>,
    pub absolute_magnitude_h: Option<f64>,
    pub estimated_diameter: Option<EstimatedDiameter>,
    pub is_potentially_hazardous_asteroid: Option<bool>,
    pub close_approach_data: Option<Vec<CloseApproachData>>,
    pub orbital_data: Option<OrbitalData>,
    pub is_sentry_object: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatedDiameter {
    pub kilometers: Option<DiameterRange>,
    pub meters: Option<DiameterRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiameterRange {
    pub estimated_diameter_min: f64,
    pub estimated_diameter_max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseApproachData {
    pub close_approach_date: Option<String>,
    pub close_approach_date_full: Option<String>,
    pub epoch_date_close_approach: Option<i64>,
    pub relative_velocity: Option<RelativeVelocity>,
    pub miss_distance: Option<MissDistance>,
    pub orbiting_body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelativeVelocity {
    pub kilometers_per_second: Option<String>,
    pub kilometers_per_hour: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissDistance {
    pub astronomical: Option<String>,
    pub lunar: Option<String>,
    pub kilometers: Option<String>,
}

/// Orbit solution as NeoWs reports it; numbers arrive as strings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrbitalData {
    pub orbit_id: Option<String>,
    pub orbit_determination_date: Option<String>,
    pub first_observation_date: Option<String>,
    pub last_observation_date: Option<String>,
    pub data_arc_in_days: Option<i64>,
    pub observations_used: Option<i64>,
    pub orbit_uncertainty: Option<String>,
    pub minimum_orbit_intersection: Option<String>,
    pub jupiter_tisserand_invariant: Option<String>,
    pub epoch_osculation: Option<String>,
    pub eccentricity: Option<String>,
    pub semi_major_axis: Option<String>,
    pub inclination: Option<String>,
    pub ascending_node_longitude: Option<String>,
    pub orbital_period: Option<String>,
    pub perihelion_distance: Option<String>,
    pub perihelion_argument: Option<String>,
    pub aphelion_distance: Option<String>,
    pub perihelion_time: Option<String>,
    pub mean_anomaly: Option<String>,
    pub mean_motion: Option<String>,
    pub equinox: Option<String>,
    pub orbit_class: Option<OrbitClass>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitClass {
    pub orbit_class_type: Option<String>,
    pub orbit_class_description: Option<String>,
    pub orbit_class_range: Option<String>,
}

fn parse_field(value: &Option<String>) -> Option<f64> {
    value.as_ref().and_then(|s| s.trim().parse::<f64>().ok())
}

impl OrbitalData {
    pub fn orbit_class_type(&self) -> String {
        self.orbit_class
            .as_ref()
            .and_then(|c| c.orbit_class_type.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Minimum orbit intersection distance (AU), when reported
    pub fn moid_au(&self) -> Option<f64> {
        parse_field(&self.minimum_orbit_intersection)
    }

    /// Convert the osculating solution into propagator elements.
    /// `label` only flavours the error message.
    pub fn to_elements(&self, label: &str) -> Result<KeplerianElements> {
        let required = |value: &Option<String>, field: &str| {
            parse_field(value)
                .ok_or_else(|| ImpactError::MissingOrbitalData(format!("{label}: {field}")))
        };

        let a = required(&self.semi_major_axis, "semi_major_axis")?;
        let e = required(&self.eccentricity, "eccentricity")?;
        let i = required(&self.inclination, "inclination")?;
        let node = required(&self.ascending_node_longitude, "ascending_node_longitude")?;
        let peri = required(&self.perihelion_argument, "perihelion_argument")?;
        let m = required(&self.mean_anomaly, "mean_anomaly")?;
        let epoch = required(&self.epoch_osculation, "epoch_osculation")?;

        let mean_motion = parse_field(&self.mean_motion)
            .unwrap_or_else(|| KeplerianElements::kepler_mean_motion(a));

        let elements =
            KeplerianElements::from_osculating(a, e, i, node, peri, m, mean_motion, epoch);
        elements.validate()?;
        Ok(elements)
    }
}

// =============================================================================
// PROCESSED ASTEROID DATA
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedAsteroid {
    pub id: String,
    pub name: String,
    pub elements: KeplerianElements,
    pub estimated_diameter_m: f64,
    pub density_kg_m3: f64,
    pub estimated_mass_kg: f64,
    pub is_potentially_hazardous: bool,
    pub absolute_magnitude: f64,
    pub orbit_class: String,
    pub moid_au: Option<f64>,
    pub close_approaches: Vec<ProcessedCloseApproach>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedCloseApproach {
    pub date: String,
    pub miss_distance_km: f64,
    pub velocity_km_s: f64,
    pub orbiting_body: String,
}

impl ProcessedAsteroid {
    /// Relative speed of the first Earth encounter, if any was reported
    pub fn earth_encounter_velocity(&self) -> Option<f64> {
        self.close_approaches
            .iter()
            .filter(|ca| ca.orbiting_body.eq_ignore_ascii_case("earth") && ca.velocity_km_s > 0.0)
            .map(|ca| ca.velocity_km_s)
            .next()
    }

    /// Impactor for consequence modeling; `velocity_km_s` overrides the recorded one
    pub fn impactor(&self, velocity_km_s: Option<f64>) -> ImpactorProperties {
        ImpactorProperties {
            diameter_m: self.estimated_diameter_m,
            density_kg_m3: self.density_kg_m3,
            velocity_km_s: velocity_km_s
                .or_else(|| self.earth_encounter_velocity())
                .unwrap_or(FALLBACK_IMPACT_VELOCITY_KM_S),
            angle_deg: 45.0,
        }
    }
}

impl NeoObject {
    /// Convert NASA API response to our internal format
    pub fn to_processed(&self) -> Result<ProcessedAsteroid> {
        let orbital_data = self
            .orbital_data
            .as_ref()
            .ok_or_else(|| ImpactError::MissingOrbitalData(self.id.clone()))?;

        let elements = orbital_data.to_elements(&self.name)?;

        let diameter = self
            .estimated_diameter
            .as_ref()
            .and_then(|d| d.meters.as_ref())
            .map(|m| (m.estimated_diameter_min + m.estimated_diameter_max) / 2.0)
            .unwrap_or(FALLBACK_DIAMETER_M);

        let orbit_class = orbital_data.orbit_class_type();
        let impactor = ImpactorProperties {
            density_kg_m3: estimate_density(&orbit_class),
            ..ImpactorProperties::new(diameter, FALLBACK_IMPACT_VELOCITY_KM_S)
        };

        let close_approaches = self
            .close_approach_data
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|ca| ProcessedCloseApproach {
                date: ca.close_approach_date.clone().unwrap_or_default(),
                miss_distance_km: ca
                    .miss_distance
                    .as_ref()
                    .and_then(|m| parse_field(&m.kilometers))
                    .unwrap_or(0.0),
                velocity_km_s: ca
                    .relative_velocity
                    .as_ref()
                    .and_then(|v| parse_field(&v.kilometers_per_second))
                    .unwrap_or(0.0),
                orbiting_body: ca
                    .orbiting_body
                    .clone()
                    .unwrap_or_else(|| "Earth".to_string()),
            })
            .collect();

        Ok(ProcessedAsteroid {
            id: self.id.clone(),
            name: self.name.clone(),
            elements,
            estimated_diameter_m: diameter,
            density_kg_m3: impactor.density_kg_m3,
            estimated_mass_kg: impactor.mass_kg(),
            is_potentially_hazardous: self.is_potentially_hazardous_asteroid.unwrap_or(false),
            absolute_magnitude: self.absolute_magnitude_h.unwrap_or(0.0),
            orbit_class,
            moid_au: orbital_data.moid_au(),
            close_approaches,
        })
    }
}

// =============================================================================
// LOCAL STORE
// =============================================================================

/// Directory of saved NeoWs documents:
/// `neo_all/{start}_{end}.json` for feeds, `neo_one/{id}.json` for single objects.
#[derive(Debug, Clone)]
pub struct NeoStore {
    root: PathBuf,
}

impl NeoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn feed_path(&self, start_date: &str, end_date: &str) -> PathBuf {
        self.root
            .join("neo_all")
            .join(format!("{start_date}_{end_date}.json"))
    }

    pub fn neo_path(&self, neo_id: &str) -> PathBuf {
        self.root.join("neo_one").join(format!("{neo_id}.json"))
    }

    pub fn load_feed(&self, start_date: &str, end_date: &str) -> Result<NeoWsResponse> {
        read_json(&self.feed_path(start_date, end_date))
    }

    pub fn load_neo(&self, neo_id: &str) -> Result<NeoObject> {
        read_json(&self.neo_path(neo_id))
    }

    /// Every object in a feed, in date order
    pub fn feed_objects(&self, start_date: &str, end_date: &str) -> Result<Vec<NeoObject>> {
        let feed = self.load_feed(start_date, end_date)?;
        Ok(feed
            .near_earth_objects
            .unwrap_or_default()
            .into_values()
            .flatten()
            .collect())
    }

    pub fn feed_ids(&self, start_date: &str, end_date: &str) -> Result<Vec<String>> {
        Ok(self
            .feed_objects(start_date, end_date)?
            .into_iter()
            .map(|neo| neo.id)
            .collect())
    }

    /// Orbit solution per object name for a feed window.
    /// Objects whose detail file is missing or unusable are logged and skipped.
    pub fn orbital_catalog(
        &self,
        start_date: &str,
        end_date: &str,
    ) -> Result<BTreeMap<String, OrbitalData>> {
        let mut catalog = BTreeMap::new();
        for id in self.feed_ids(start_date, end_date)? {
            match self.load_neo(&id) {
                Ok(NeoObject {
                    name,
                    orbital_data: Some(orbital_data),
                    ..
                }) => {
                    catalog.insert(name, orbital_data);
                }
                Ok(_) => warn!(neo_id = %id, "record has no orbital data"),
                Err(e) => warn!(neo_id = %id, error = %e, "error processing NEO"),
            }
        }
        debug!(count = catalog.len(), "orbital catalog assembled");
        Ok(catalog)
    }

    /// Processed asteroids for a feed window, preferring the detailed per-object record
    pub fn asteroids(&self, start_date: &str, end_date: &str) -> Result<Vec<ProcessedAsteroid>> {
        let mut asteroids = Vec::new();
        for feed_neo in self.feed_objects(start_date, end_date)? {
            let record = match self.load_neo(&feed_neo.id) {
                Ok(detail) => detail,
                Err(e) => {
                    debug!(neo_id = %feed_neo.id, error = %e, "no detail file, using feed entry");
                    feed_neo
                }
            };
            match record.to_processed() {
                Ok(processed) => asteroids.push(processed),
                Err(e) => warn!(neo_id = %record.id, error = %e, "skipping NEO"),
            }
        }
        Ok(asteroids)
    }
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact_effects::asteroid_density;
    use std::fs;

    const APOPHIS: &str = r#"{
        "id": "2099942",
        "neo_reference_id": "2099942",
        "name": "99942 Apophis (2004 MN4)",
        "absolute_magnitude_h": 19.09,
        "estimated_diameter": {
            "meters": { "estimated_diameter_min": 340.0, "estimated_diameter_max": 380.0 }
        },
        "is_potentially_hazardous_asteroid": true,
        "close_approach_data": [
            {
                "close_approach_date": "2029-04-13",
                "relative_velocity": { "kilometers_per_second": "7.4223" },
                "miss_distance": { "kilometers": "38012.0" },
                "orbiting_body": "Earth"
            }
        ],
        "orbital_data": {
            "orbit_id": "220",
            "minimum_orbit_intersection": ".000149",
            "epoch_osculation": "2461000.5",
            "eccentricity": ".1911",
            "semi_major_axis": ".9224",
            "inclination": "3.336",
            "ascending_node_longitude": "203.96",
            "perihelion_argument": "126.6",
            "mean_anomaly": "142.8",
            "mean_motion": "1.1127",
            "orbit_class": { "orbit_class_type": "ATE" }
        },
        "is_sentry_object": false
    }"#;

    fn feed_json() -> String {
        r#"{
            "element_count": 2,
            "near_earth_objects": {
                "2029-04-13": [ { "id": "2099942", "name": "99942 Apophis (2004 MN4)" } ],
                "2029-04-12": [ { "id": "404", "name": "(2029 ZZ)" } ]
            }
        }"#
        .to_string()
    }

    fn store_with_files() -> (tempfile::TempDir, NeoStore) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("neo_all")).unwrap();
        fs::create_dir_all(dir.path().join("neo_one")).unwrap();
        fs::write(
            dir.path().join("neo_all/2029-04-12_2029-04-13.json"),
            feed_json(),
        )
        .unwrap();
        fs::write(dir.path().join("neo_one/2099942.json"), APOPHIS).unwrap();
        let store = NeoStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_parse_apophis() {
        let neo: NeoObject = serde_json::from_str(APOPHIS).unwrap();
        let processed = neo.to_processed().unwrap();

        assert_eq!(processed.orbit_class, "ATE");
        assert!((processed.estimated_diameter_m - 360.0).abs() < 1e-9);
        assert_eq!(processed.density_kg_m3, asteroid_density::DEFAULT);
        assert!(processed.is_potentially_hazardous);
        assert_eq!(processed.moid_au, Some(0.000149));

        let el = &processed.elements;
        assert!((el.longitude_perihelion - (126.6 + 203.96)).abs() < 1e-9);
        assert!((el.mean_longitude - (142.8 + 126.6 + 203.96)).abs() < 1e-9);
        assert!((el.rates.mean_longitude - 1.1127 * 36525.0).abs() < 1e-6);

        let impactor = processed.impactor(None);
        assert!((impactor.velocity_km_s - 7.4223).abs() < 1e-12);
        assert!((processed.impactor(Some(12.0)).velocity_km_s - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_orbital_field_is_reported() {
        let mut neo: NeoObject = serde_json::from_str(APOPHIS).unwrap();
        if let Some(od) = neo.orbital_data.as_mut() {
            od.eccentricity = None;
        }
        match neo.to_processed() {
            Err(ImpactError::MissingOrbitalData(msg)) => assert!(msg.contains("eccentricity")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_mean_motion_falls_back_to_kepler() {
        let od = OrbitalData {
            semi_major_axis: Some("1.0".into()),
            eccentricity: Some("0.1".into()),
            inclination: Some("1.0".into()),
            ascending_node_longitude: Some("10".into()),
            perihelion_argument: Some("20".into()),
            mean_anomaly: Some("30".into()),
            epoch_osculation: Some("2461000.5".into()),
            ..OrbitalData::default()
        };
        let el = od.to_elements("test").unwrap();
        assert_eq!(el.epoch, 2461000.5);
        assert!((el.rates.mean_longitude - 36000.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_epoch_rejected() {
        let mut neo: NeoObject = serde_json::from_str(APOPHIS).unwrap();
        if let Some(od) = neo.orbital_data.as_mut() {
            od.epoch_osculation = None;
        }
        match neo.to_processed() {
            Err(ImpactError::MissingOrbitalData(msg)) => {
                assert!(msg.contains("epoch_osculation"), "{msg}")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_store_paths_follow_backend_layout() {
        let store = NeoStore::new("/data");
        assert_eq!(
            store.feed_path("2024-01-01", "2024-01-07"),
            PathBuf::from("/data/neo_all/2024-01-01_2024-01-07.json")
        );
        assert_eq!(store.neo_path("3542519"), PathBuf::from("/data/neo_one/3542519.json"));
    }

    #[test]
    fn test_feed_ids_in_date_order() {
        let (_dir, store) = store_with_files();
        let ids = store.feed_ids("2029-04-12", "2029-04-13").unwrap();
        assert_eq!(ids, vec!["404".to_string(), "2099942".to_string()]);
    }

    #[test]
    fn test_orbital_catalog_skips_missing_records() {
        let (_dir, store) = store_with_files();
        let catalog = store.orbital_catalog("2029-04-12", "2029-04-13").unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains_key("99942 Apophis (2004 MN4)"));
    }

    #[test]
    fn test_asteroids_from_store() {
        let (_dir, store) = store_with_files();
        let asteroids = store.asteroids("2029-04-12", "2029-04-13").unwrap();
        assert_eq!(asteroids.len(), 1);
        assert_eq!(asteroids[0].id, "2099942");
    }

    #[test]
    fn test_missing_feed_is_io_error() {
        let (_dir, store) = store_with_files();
        assert!(matches!(
            store.load_feed("1999-01-01", "1999-01-02"),
            Err(ImpactError::Io(_))
        ));
    }

    #[test]
    fn test_malformed_json_is_json_error() {
        let (dir, store) = store_with_files();
        fs::write(dir.path().join("neo_one/bad.json"), "{ not json").unwrap();
        assert!(matches!(store.load_neo("bad"), Err(ImpactError::Json(_))));
    }
}
