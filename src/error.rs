// Error Types - Shared error enum for the propagator, search and impact models

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImpactError>;

#[derive(Error, Debug)]
pub enum ImpactError {
    #[error("Invalid orbital elements: {0}")]
    InvalidElements(String),

    #[error("Invalid search window: {0}")]
    InvalidSearchWindow(String),

    #[error("Invalid impactor: {0}")]
    InvalidImpactor(String),

    #[error("Invalid coordinates: lat={lat}, lon={lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    #[error("Missing orbital data for NEO {0}")]
    MissingOrbitalData(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidConfig { key: String, value: String },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Unable to perform file operation: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse NeoWs JSON: {0}")]
    Json(#[from] serde_json::Error),
}
