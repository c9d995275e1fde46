use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("{path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("failed to parse boundaries in {path}: {source}")]
    GeoJson {
        path: PathBuf,
        source: geojson::Error,
    },
    #[error("{path} is not a GeoJSON FeatureCollection")]
    NotFeatureCollection { path: PathBuf },
    #[error("{path} uses unsupported coordinate reference system '{crs}'")]
    UnsupportedCrs { path: PathBuf, crs: String },
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding is not configured")]
    NotConfigured,
    #[error("invalid geocoder url: {0}")]
    Url(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider returned {code}: {message}")]
    Provider { code: u16, message: String },
}

/// Conditions that stop a single query. No-match conditions are not errors,
/// they surface as notices on the response instead.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("{0}")]
    InvalidInput(String),
    #[error("Travel time threshold must be between 5 and 120 minutes in steps of 5, got {0}.")]
    InvalidThreshold(u32),
    #[error("Geocoding error: {0}")]
    Geocoding(#[from] GeocodeError),
    #[error("Could not geocode your address.")]
    AddressNotFound,
    #[error("Could not match your location to a census tract.")]
    NoEnclosingTract,
}

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("feedback message must not be empty")]
    EmptyMessage,
    #[error("failed to open feedback file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write feedback: {0}")]
    Write(#[from] csv::Error),
    #[error("feedback sink is unavailable")]
    Poisoned,
}
