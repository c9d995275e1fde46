//! Static reference tables: the operating schedule, the agency travel-time
//! matrix and the census tract boundaries. All three are read-only once
//! loaded and are loaded fresh for every query.

pub mod boundaries;
pub mod matrix;
pub mod schedule;

use std::fmt;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use serde::{Deserialize, Serialize};

use crate::error::LoadError;

pub use boundaries::{Tract, TractSet};
pub use matrix::{AgencyRecord, Capabilities, TravelMatrix};
pub use schedule::{Schedule, ScheduleEntry};

/// Integer identifier of a boundary unit (census tract GEOID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TractId(pub i64);

impl TractId {
    /// Stands in for identifiers that could not be parsed.
    pub const UNKNOWN: TractId = TractId(-1);

    /// Coerce a raw cell to an identifier. Fractional numerals such as
    /// `37183052101.0` are truncated; anything else unparsable becomes
    /// [`TractId::UNKNOWN`].
    pub fn coerce(raw: &str) -> TractId {
        let raw = raw.trim();
        if let Ok(id) = raw.parse::<i64>() {
            return TractId(id);
        }
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => TractId(value.trunc() as i64),
            _ => TractId::UNKNOWN,
        }
    }
}

impl Default for TractId {
    fn default() -> Self {
        TractId::UNKNOWN
    }
}

impl fmt::Display for TractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key joining the schedule to the matrix.
///
/// Neither source table carries a shared identifier, so agencies are matched
/// on their trimmed name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgencyKey(String);

impl AgencyKey {
    pub fn new(name: &str) -> Self {
        AgencyKey(name.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct DataPaths {
    pub hours_csv: PathBuf,
    pub matrix_csv: PathBuf,
    pub tracts_geojson: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub schedule: Schedule,
    pub matrix: TravelMatrix,
    pub tracts: TractSet,
}

impl ReferenceData {
    /// Load all three tables. Any unreadable source fails the whole load.
    pub fn load(paths: &DataPaths) -> Result<Self, LoadError> {
        let schedule = Schedule::load(&paths.hours_csv)?;
        let matrix = TravelMatrix::load(&paths.matrix_csv)?;
        let tracts = TractSet::load(&paths.tracts_geojson)?;

        tracing::debug!(
            schedule_rows = schedule.entries().len(),
            matrix_rows = matrix.rows.len(),
            tracts = tracts.len(),
            "reference data loaded"
        );

        Ok(Self {
            schedule,
            matrix,
            tracts,
        })
    }
}

pub(crate) fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}

pub(crate) fn normalized_headers(headers: &StringRecord) -> StringRecord {
    headers.iter().map(normalize_header).collect()
}

pub(crate) fn require_column(
    headers: &StringRecord,
    column: &'static str,
    path: &Path,
) -> Result<(), LoadError> {
    if headers.iter().any(|h| h == column) {
        Ok(())
    } else {
        Err(LoadError::MissingColumn {
            path: path.to_path_buf(),
            column,
        })
    }
}

pub(crate) fn csv_reader<R: std::io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new().has_headers(true).from_reader(reader)
}

pub(crate) fn open_csv(path: &Path) -> Result<csv::Reader<std::fs::File>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv_reader(file))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn coerces_tract_ids() {
        assert_eq!(TractId::coerce("37183052101"), TractId(37183052101));
        assert_eq!(TractId::coerce(" 42 "), TractId(42));
        assert_eq!(TractId::coerce("37183052101.0"), TractId(37183052101));
        assert_eq!(TractId::coerce("not a tract"), TractId::UNKNOWN);
        assert_eq!(TractId::coerce(""), TractId::UNKNOWN);
        assert_eq!(TractId::coerce("NaN"), TractId::UNKNOWN);
    }

    #[test]
    fn agency_keys_ignore_surrounding_whitespace() {
        assert_eq!(AgencyKey::new("  Hope Pantry "), AgencyKey::new("Hope Pantry"));
        assert_ne!(AgencyKey::new("Hope Pantry"), AgencyKey::new("hope pantry"));
    }

    #[test]
    fn headers_are_trimmed_and_lowercased() {
        let raw = StringRecord::from(vec![" Agency Name ", "ZIP", "Total_TravelTime"]);
        let normalized = normalized_headers(&raw);
        assert_eq!(
            normalized.iter().collect::<Vec<_>>(),
            vec!["agency name", "zip", "total_traveltime"]
        );
    }
}
