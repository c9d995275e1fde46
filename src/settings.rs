use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::Secret;
use thiserror::Error;
use url::Url;

use crate::candidates::{DEFAULT_WIDEN_BY_MINUTES, MAX_WIDEN_BY_MINUTES};
use crate::filters::FilterFeatures;
use crate::geocoder::{Coordinate, OPENCAGE_URL};
use crate::pipeline::PipelineSettings;
use crate::presentation::MapDefaults;
use crate::reference::DataPaths;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: SocketAddr,
    pub data: DataPaths,
    pub feedback_csv: PathBuf,
    pub opencage_url: Url,
    pub opencage_api_key: Option<Secret<String>>,
    pub pipeline: PipelineSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build settings from any name lookup. Unset or blank values take the
    /// default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let path = |name: &str, default: &str| PathBuf::from(get(name).unwrap_or_else(|| default.to_string()));

        let defaults = MapDefaults::default();
        let center = Coordinate {
            longitude: parse_or(&get, "PANTRY_DEFAULT_LON", defaults.center.longitude)?,
            latitude: parse_or(&get, "PANTRY_DEFAULT_LAT", defaults.center.latitude)?,
        };

        Ok(Self {
            bind: parse_or(&get, "PANTRY_BIND", SocketAddr::from(([0, 0, 0, 0], 3030)))?,
            data: DataPaths {
                hours_csv: path("PANTRY_HOURS_CSV", "data/hours.csv"),
                matrix_csv: path("PANTRY_MATRIX_CSV", "data/matrix.csv"),
                tracts_geojson: path("PANTRY_TRACTS_GEOJSON", "data/tracts.geojson"),
            },
            feedback_csv: path("PANTRY_FEEDBACK_CSV", "data/feedback.csv"),
            opencage_url: opencage_url(get("OPENCAGE_URL"))?,
            opencage_api_key: get("OPENCAGE_API_KEY").map(Secret::new),
            pipeline: PipelineSettings {
                widen_by_minutes: widen_by_minutes(&get)?,
                features: FilterFeatures {
                    choice_filter: parse_or(&get, "PANTRY_CHOICE_FILTER", true)?,
                    day_filter: parse_or(&get, "PANTRY_DAY_FILTER", true)?,
                },
                map: MapDefaults {
                    center,
                    zoom: parse_or(&get, "PANTRY_MAP_ZOOM", defaults.zoom)?,
                },
            },
        })
    }
}

fn opencage_url(configured: Option<String>) -> Result<Url, SettingsError> {
    let value = configured.unwrap_or_else(|| OPENCAGE_URL.to_string());
    Url::parse(value.trim()).map_err(|_| SettingsError::Invalid {
        name: "OPENCAGE_URL",
        value,
    })
}

fn widen_by_minutes<G>(get: &G) -> Result<u32, SettingsError>
where
    G: Fn(&str) -> Option<String>,
{
    const NAME: &str = "PANTRY_WIDEN_MINUTES";
    let minutes = parse_or(get, NAME, DEFAULT_WIDEN_BY_MINUTES)?;
    if minutes > MAX_WIDEN_BY_MINUTES {
        return Err(SettingsError::Invalid {
            name: NAME,
            value: minutes.to_string(),
        });
    }
    Ok(minutes)
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, SettingsError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| SettingsError::Invalid { name, value }),
    }
}
