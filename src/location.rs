use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::geocoder::{Coordinate, Geocoder};
use crate::reference::{AgencyRecord, TractId, TractSet, TravelMatrix};

/// What the user typed, in one of the two input modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum LocationInput {
    Address(String),
    Zip(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedLocation {
    /// Address mode: the geocoded point and the tract that contains it.
    Tract {
        coordinate: Coordinate,
        tract: TractId,
    },
    /// ZIP mode: matrix rows for the ZIP, one per (agency name, address).
    Zip { zip: String, rows: Vec<AgencyRecord> },
    /// ZIP mode with no matching rows. Processing stops with a warning.
    EmptyZip { zip: String },
}

pub async fn resolve_location(
    input: &LocationInput,
    geocoder: &dyn Geocoder,
    tracts: &TractSet,
    matrix: &TravelMatrix,
) -> Result<ResolvedLocation, QueryError> {
    match input {
        LocationInput::Address(address) => {
            let address = address.trim();
            if address.is_empty() {
                return Err(QueryError::InvalidInput("Enter an address to search.".to_string()));
            }
            let coordinate = geocode_first(geocoder, address).await?;
            let tract = locate_tract(tracts, coordinate)?;
            Ok(ResolvedLocation::Tract { coordinate, tract })
        }
        LocationInput::Zip(zip) => {
            let zip = zip.trim();
            if zip.is_empty() {
                return Err(QueryError::InvalidInput("Enter a ZIP code to search.".to_string()));
            }
            let rows = zip_subset(&matrix.rows, zip);
            if rows.is_empty() {
                Ok(ResolvedLocation::EmptyZip {
                    zip: zip.to_string(),
                })
            } else {
                Ok(ResolvedLocation::Zip {
                    zip: zip.to_string(),
                    rows,
                })
            }
        }
    }
}

// Only the provider's first candidate is used; there is no re-ranking and no
// retry.
async fn geocode_first(geocoder: &dyn Geocoder, address: &str) -> Result<Coordinate, QueryError> {
    let candidates = geocoder.geocode(address).await?;
    candidates
        .into_iter()
        .next()
        .ok_or(QueryError::AddressNotFound)
}

pub fn locate_tract(tracts: &TractSet, coordinate: Coordinate) -> Result<TractId, QueryError> {
    tracts
        .locate(coordinate.point())
        .ok_or(QueryError::NoEnclosingTract)
}

/// Rows whose ZIP equals `zip`, collapsed to one row per (agency name,
/// address) since no single tract applies.
pub fn zip_subset(rows: &[AgencyRecord], zip: &str) -> Vec<AgencyRecord> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| row.zip.as_deref().map(str::trim) == Some(zip))
        .filter(|row| seen.insert((row.name.clone(), row.address.clone())))
        .cloned()
        .collect()
}
