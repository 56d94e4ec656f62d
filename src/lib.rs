// NEO Impact - Orbital propagation, closest-approach search and impact consequences
// Library root shared by the command-line front end

pub mod approach_search;
pub mod config;
pub mod error;
pub mod impact_effects;
pub mod logging;
pub mod neo_data;
pub mod orbital_mechanics;
pub mod population;
pub mod sim_clock;

pub use approach_search::{
    find_closest_approach, monte_carlo_impact_probability, scan_catalog, ApproachClass,
    ApproachResult, EarthTrack, ElementUncertainty, MonteCarloResult, ScanEntry,
};
pub use config::{AppConfig, SearchConfig};
pub use error::{ImpactError, Result};
pub use impact_effects::{assess_impact, ImpactAssessment, ImpactorProperties};
pub use neo_data::{NeoStore, ProcessedAsteroid};
pub use orbital_mechanics::{KeplerianElements, Planet, Vector3};
pub use population::{GeoPoint, PopulationModel};
pub use sim_clock::{ClockCommand, ClockEvent, SharedClock, SimulationClock};
