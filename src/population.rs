// Population Model - Coordinate-keyed density lookup and ring-based casualty estimates

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

use crate::config::DEFAULT_BACKGROUND_DENSITY;
use crate::error::{ImpactError, Result};

/// Mean Earth radius (km)
pub const EARTH_MEAN_RADIUS_KM: f64 = 6371.0;

/// Fraction of the exposed population killed in each damage ring
pub mod fatality_rate {
    pub const BLAST: f64 = 0.8;
    pub const THERMAL: f64 = 0.3;
    pub const SEISMIC: f64 = 0.02;
}

// =============================================================================
// GEOGRAPHY
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

impl GeoPoint {
    pub fn new(lat_deg: f64, lon_deg: f64) -> Result<Self> {
        let valid = lat_deg.is_finite()
            && lon_deg.is_finite()
            && (-90.0..=90.0).contains(&lat_deg)
            && (-180.0..=180.0).contains(&lon_deg);
        if !valid {
            return Err(ImpactError::InvalidCoordinates {
                lat: lat_deg,
                lon: lon_deg,
            });
        }
        Ok(Self { lat_deg, lon_deg })
    }
}

/// Great-circle distance on a spherical Earth (km)
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat_deg.to_radians();
    let lat2 = b.lat_deg.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.lon_deg - a.lon_deg).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_MEAN_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Surface area of a spherical cap of great-circle radius `radius_km` (km²)
pub fn cap_area_km2(radius_km: f64) -> f64 {
    let angle = (radius_km / EARTH_MEAN_RADIUS_KM).min(PI);
    2.0 * PI * EARTH_MEAN_RADIUS_KM * EARTH_MEAN_RADIUS_KM * (1.0 - angle.cos())
}

/// Area shared by two discs with radii `r1`, `r2` and centres `d` apart (planar)
pub fn lens_area(r1: f64, r2: f64, d: f64) -> f64 {
    if r1 <= 0.0 || r2 <= 0.0 || d >= r1 + r2 {
        return 0.0;
    }
    if d <= (r1 - r2).abs() {
        let r = r1.min(r2);
        return PI * r * r;
    }

    let a1 = ((d * d + r1 * r1 - r2 * r2) / (2.0 * d * r1)).clamp(-1.0, 1.0).acos();
    let a2 = ((d * d + r2 * r2 - r1 * r1) / (2.0 * d * r2)).clamp(-1.0, 1.0).acos();
    let k = (-d + r1 + r2) * (d + r1 - r2) * (d - r1 + r2) * (d + r1 + r2);

    r1 * r1 * a1 + r2 * r2 * a2 - 0.5 * k.max(0.0).sqrt()
}

// =============================================================================
// CITY TABLE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct City {
    pub name: String,
    pub location: GeoPoint,
    /// Metropolitan population
    pub population: f64,
    /// Radius of the disc treated as urban (km)
    pub radius_km: f64,
}

impl City {
    fn entry(name: &str, lat_deg: f64, lon_deg: f64, population: f64, radius_km: f64) -> Self {
        Self {
            name: name.to_string(),
            location: GeoPoint { lat_deg, lon_deg },
            population,
            radius_km,
        }
    }

    pub fn area_km2(&self) -> f64 {
        PI * self.radius_km * self.radius_km
    }

    /// People per km²
    pub fn density(&self) -> f64 {
        self.population / self.area_km2()
    }
}

/// Large metropolitan areas (UN 2023 estimates, rounded)
pub fn world_cities() -> Vec<City> {
    vec![
        City::entry("Tokyo", 35.6762, 139.6503, 37.4e6, 50.0),
        City::entry("Delhi", 28.7041, 77.1025, 32.9e6, 40.0),
        City::entry("Shanghai", 31.2304, 121.4737, 29.2e6, 40.0),
        City::entry("Dhaka", 23.8103, 90.4125, 23.2e6, 25.0),
        City::entry("Sao Paulo", -23.5505, -46.6333, 22.6e6, 40.0),
        City::entry("Mexico City", 19.4326, -99.1332, 22.3e6, 35.0),
        City::entry("Cairo", 30.0444, 31.2357, 22.2e6, 30.0),
        City::entry("Beijing", 39.9042, 116.4074, 21.8e6, 40.0),
        City::entry("Mumbai", 19.0760, 72.8777, 21.3e6, 25.0),
        City::entry("Osaka", 34.6937, 135.5023, 19.0e6, 35.0),
        City::entry("New York", 40.7128, -74.0060, 18.9e6, 40.0),
        City::entry("Karachi", 24.8607, 67.0011, 17.2e6, 30.0),
        City::entry("Lagos", 6.5244, 3.3792, 15.9e6, 30.0),
        City::entry("Istanbul", 41.0082, 28.9784, 15.8e6, 30.0),
        City::entry("Buenos Aires", -34.6037, -58.3816, 15.5e6, 35.0),
        City::entry("Kolkata", 22.5726, 88.3639, 15.3e6, 25.0),
        City::entry("Manila", 14.5995, 120.9842, 14.7e6, 25.0),
        City::entry("Rio de Janeiro", -22.9068, -43.1729, 13.7e6, 30.0),
        City::entry("Moscow", 55.7558, 37.6173, 12.6e6, 35.0),
        City::entry("Los Angeles", 34.0522, -118.2437, 12.5e6, 45.0),
        City::entry("Paris", 48.8566, 2.3522, 11.2e6, 30.0),
        City::entry("Jakarta", -6.2088, 106.8456, 11.2e6, 30.0),
        City::entry("Lima", -12.0464, -77.0428, 11.2e6, 30.0),
        City::entry("Bangkok", 13.7563, 100.5018, 11.1e6, 30.0),
        City::entry("Seoul", 37.5665, 126.9780, 10.0e6, 25.0),
        City::entry("London", 51.5074, -0.1278, 9.6e6, 30.0),
        City::entry("Tehran", 35.6892, 51.3890, 9.5e6, 25.0),
        City::entry("Chicago", 41.8781, -87.6298, 8.9e6, 35.0),
        City::entry("Toronto", 43.6532, -79.3832, 6.4e6, 30.0),
        City::entry("Johannesburg", -26.2041, 28.0473, 6.1e6, 30.0),
        City::entry("Singapore", 1.3521, 103.8198, 5.9e6, 20.0),
        City::entry("Ankara", 39.9334, 32.8597, 5.7e6, 20.0),
        City::entry("Sydney", -33.8688, 151.2093, 5.4e6, 35.0),
    ]
}

// =============================================================================
// CASUALTY MODEL
// =============================================================================

/// Outer radii of the three damage zones (km)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DamageRadii {
    pub blast_km: f64,
    pub thermal_km: f64,
    pub seismic_km: f64,
}

impl DamageRadii {
    /// Nest the zones so each ring starts where the deadlier one ends
    fn nested(&self) -> [f64; 3] {
        let blast = self.blast_km.max(0.0);
        let thermal = self.thermal_km.max(blast);
        let seismic = self.seismic_km.max(thermal);
        [blast, thermal, seismic]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedCity {
    pub name: String,
    pub distance_km: f64,
    /// People of this city inside the outermost damage ring
    pub exposed: f64,
    pub deaths: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CasualtyEstimate {
    pub blast_deaths: f64,
    pub thermal_deaths: f64,
    pub seismic_deaths: f64,
    pub total_deaths: f64,
    pub exposed_population: f64,
    pub affected_cities: Vec<AffectedCity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationModel {
    pub cities: Vec<City>,
    /// People per km² wherever no city disc applies
    pub background_density: f64,
}

impl Default for PopulationModel {
    fn default() -> Self {
        Self::new(DEFAULT_BACKGROUND_DENSITY)
    }
}

impl PopulationModel {
    pub fn new(background_density: f64) -> Self {
        Self {
            cities: world_cities(),
            background_density: background_density.max(0.0),
        }
    }

    /// Density at `point`: the containing city's, otherwise the background
    pub fn density_at(&self, point: &GeoPoint) -> f64 {
        self.cities
            .iter()
            .filter(|c| haversine_km(point, &c.location) <= c.radius_km)
            .map(City::density)
            .fold(None, |best: Option<f64>, d| Some(best.map_or(d, |b| b.max(d))))
            .unwrap_or(self.background_density)
    }

    pub fn estimate_casualties(&self, site: &GeoPoint, radii: &DamageRadii) -> CasualtyEstimate {
        let rings = radii.nested();
        let rates = [
            fatality_rate::BLAST,
            fatality_rate::THERMAL,
            fatality_rate::SEISMIC,
        ];

        let mut ring_people = [0.0f64; 3];
        let mut affected_cities = Vec::new();

        // City discs, ring by ring
        let mut city_area_in_ring = [0.0f64; 3];
        for city in &self.cities {
            let distance_km = haversine_km(site, &city.location);
            if distance_km >= rings[2] + city.radius_km {
                continue;
            }

            let mut inner_overlap = 0.0;
            let mut city_deaths = 0.0;
            let mut city_exposed = 0.0;
            for (ring, outer) in rings.iter().enumerate() {
                let overlap = lens_area(*outer, city.radius_km, distance_km);
                let in_ring = (overlap - inner_overlap).max(0.0);
                inner_overlap = overlap;

                let people = in_ring * city.density();
                city_area_in_ring[ring] += in_ring;
                ring_people[ring] += people;
                city_exposed += people;
                city_deaths += people * rates[ring];
            }

            if city_exposed > 0.0 {
                affected_cities.push(AffectedCity {
                    name: city.name.clone(),
                    distance_km,
                    exposed: city_exposed,
                    deaths: city_deaths,
                });
            }
        }

        // Background population over whatever the city discs did not cover
        let mut inner_cap = 0.0;
        for (ring, outer) in rings.iter().enumerate() {
            let cap = cap_area_km2(*outer);
            let ring_area = (cap - inner_cap).max(0.0);
            inner_cap = cap;
            let open_area = (ring_area - city_area_in_ring[ring]).max(0.0);
            ring_people[ring] += open_area * self.background_density;
        }

        affected_cities.sort_by(|a, b| b.deaths.total_cmp(&a.deaths));

        let blast_deaths = ring_people[0] * rates[0];
        let thermal_deaths = ring_people[1] * rates[1];
        let seismic_deaths = ring_people[2] * rates[2];
        let total_deaths = blast_deaths + thermal_deaths + seismic_deaths;

        debug!(
            total_deaths,
            cities = affected_cities.len(),
            "casualty estimate"
        );

        CasualtyEstimate {
            blast_deaths,
            thermal_deaths,
            seismic_deaths,
            total_deaths,
            exposed_population: ring_people.iter().sum(),
            affected_cities,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn city_named(model: &PopulationModel, name: &str) -> City {
        model
            .cities
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint::new(45.0, 120.0).is_ok());
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -181.0).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_haversine_known_distance() {
        let london = GeoPoint::new(51.5074, -0.1278).unwrap();
        let paris = GeoPoint::new(48.8566, 2.3522).unwrap();
        let d = haversine_km(&london, &paris);
        assert!((d - 343.5).abs() < 3.0, "d={d}");
        assert!(haversine_km(&london, &london).abs() < 1e-9);
    }

    #[test]
    fn test_lens_area_limits() {
        assert_eq!(lens_area(1.0, 1.0, 3.0), 0.0);
        assert!((lens_area(5.0, 1.0, 1.0) - PI).abs() < 1e-12);
        // Two unit circles one radius apart
        let expected = 2.0 * PI / 3.0 - 3.0_f64.sqrt() / 2.0;
        assert!((lens_area(1.0, 1.0, 1.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_cap_area_matches_disc_for_small_radius() {
        let r = 10.0;
        assert!((cap_area_km2(r) - PI * r * r).abs() / (PI * r * r) < 1e-5);
    }

    #[test]
    fn test_density_lookup() {
        let model = PopulationModel::default();
        let tokyo = city_named(&model, "Tokyo");
        assert!((model.density_at(&tokyo.location) - tokyo.density()).abs() < 1e-9);

        let pacific = GeoPoint::new(-40.0, -130.0).unwrap();
        assert_eq!(model.density_at(&pacific), DEFAULT_BACKGROUND_DENSITY);
    }

    #[test]
    fn test_city_fully_inside_blast_ring() {
        let model = PopulationModel::new(0.0);
        let paris = city_named(&model, "Paris");
        let radii = DamageRadii {
            blast_km: 100.0,
            thermal_km: 150.0,
            seismic_km: 200.0,
        };
        let estimate = model.estimate_casualties(&paris.location, &radii);
        assert!((estimate.blast_deaths - paris.population * fatality_rate::BLAST).abs() < 1.0);
        // London is ~340 km away, out of reach
        assert_eq!(estimate.affected_cities.len(), 1);
        assert_eq!(estimate.affected_cities[0].name, "Paris");
    }

    #[test]
    fn test_open_ocean_uses_background_only() {
        let model = PopulationModel::new(10.0);
        let site = GeoPoint::new(-40.0, -130.0).unwrap();
        let radii = DamageRadii {
            blast_km: 10.0,
            thermal_km: 5.0,
            seismic_km: 0.0,
        };
        let estimate = model.estimate_casualties(&site, &radii);
        let blast_people = cap_area_km2(10.0) * 10.0;
        assert!((estimate.blast_deaths - blast_people * fatality_rate::BLAST).abs() < 1e-6);
        // Smaller zones collapse into the blast ring
        assert_eq!(estimate.thermal_deaths, 0.0);
        assert_eq!(estimate.seismic_deaths, 0.0);
        assert!(estimate.affected_cities.is_empty());
    }
}
