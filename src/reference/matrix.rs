use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use serde::{Deserialize, Serialize};

use super::{normalized_headers, open_csv, require_column, AgencyKey, TractId};
use crate::error::LoadError;

const LATITUDE_COLUMNS: [&str; 4] = ["latitude", "lat", "y", "ycoord"];
const LONGITUDE_COLUMNS: [&str; 4] = ["longitude", "lon", "x", "xcoord"];

// Row as it appears in the travel-time matrix once headers are normalized.
// Every optional cell is read as text and coerced afterwards so one bad value
// never rejects the row.
#[derive(Debug, Deserialize)]
struct RawMatrixRow {
    #[serde(rename = "agency name")]
    agency_name: String,
    address: String,
    #[serde(default)]
    zip: Option<String>,
    #[serde(default)]
    geoid: Option<String>,
    #[serde(default)]
    total_traveltime: Option<String>,
    #[serde(default)]
    total_miles: Option<String>,
    #[serde(default)]
    filter_1: Option<String>,
    #[serde(default)]
    filter_2: Option<String>,
    #[serde(default)]
    choice: Option<String>,
    #[serde(default)]
    contact: Option<String>,
    #[serde(default, rename = "operating hours")]
    operating_hours: Option<String>,
}

/// Which optional matrix columns the source provided. Each pipeline stage
/// consults these flags instead of looking at the data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub zip: bool,
    pub boundary_id: bool,
    pub travel_time: bool,
    pub distance: bool,
    pub category: bool,
    pub subcategory: bool,
    pub choice: bool,
    pub contact: bool,
    pub operating_hours: bool,
    pub coordinates: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            zip: true,
            boundary_id: true,
            travel_time: true,
            distance: true,
            category: true,
            subcategory: true,
            choice: true,
            contact: true,
            operating_hours: true,
            coordinates: true,
        }
    }

    fn from_headers(headers: &StringRecord) -> Self {
        let has = |name: &str| headers.iter().any(|h| h == name);
        let has_any = |names: &[&str]| names.iter().any(|name| has(name));
        Self {
            zip: has("zip"),
            boundary_id: has("geoid"),
            travel_time: has("total_traveltime"),
            distance: has("total_miles"),
            category: has("filter_1"),
            subcategory: has("filter_2"),
            choice: has("choice"),
            contact: has("contact"),
            operating_hours: has("operating hours"),
            coordinates: has_any(&LATITUDE_COLUMNS) && has_any(&LONGITUDE_COLUMNS),
        }
    }
}

/// One (agency, origin tract) row of the travel-time matrix.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgencyRecord {
    pub name: String,
    pub address: String,
    pub zip: Option<String>,
    pub tract: TractId,
    pub travel_time: Option<f64>,
    pub distance: Option<f64>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub choice: bool,
    pub contact: Option<String>,
    pub operating_hours: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl AgencyRecord {
    pub fn key(&self) -> AgencyKey {
        AgencyKey::new(&self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TravelMatrix {
    pub rows: Vec<AgencyRecord>,
    pub capabilities: Capabilities,
}

impl TravelMatrix {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        Self::from_reader(open_csv(path)?, path)
    }

    pub fn from_reader<R: Read>(mut rdr: csv::Reader<R>, path: &Path) -> Result<Self, LoadError> {
        let headers = normalized_headers(rdr.headers().map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?);
        require_column(&headers, "agency name", path)?;
        require_column(&headers, "address", path)?;

        let capabilities = Capabilities::from_headers(&headers);
        let latitude_idx = column_index(&headers, &LATITUDE_COLUMNS);
        let longitude_idx = column_index(&headers, &LONGITUDE_COLUMNS);

        let mut rows = Vec::new();
        let mut record = StringRecord::new();
        loop {
            match rdr.read_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) if e.is_io_error() => {
                    return Err(LoadError::Csv {
                        path: path.to_path_buf(),
                        source: e,
                    })
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping unreadable matrix row: {}", e);
                    continue;
                }
            }

            let raw: RawMatrixRow = match record.deserialize(Some(&headers)) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping malformed matrix row: {}", e);
                    continue;
                }
            };

            let coordinate = |idx: Option<usize>| idx.and_then(|i| record.get(i)).and_then(parse_number);
            let latitude = coordinate(latitude_idx);
            let longitude = coordinate(longitude_idx);

            rows.push(AgencyRecord {
                name: raw.agency_name.trim().to_string(),
                address: raw.address.trim().to_string(),
                zip: trimmed(raw.zip),
                tract: raw
                    .geoid
                    .as_deref()
                    .map(TractId::coerce)
                    .unwrap_or(TractId::UNKNOWN),
                travel_time: raw.total_traveltime.as_deref().and_then(parse_number),
                distance: raw.total_miles.as_deref().and_then(parse_number),
                category: trimmed(raw.filter_1),
                subcategory: trimmed(raw.filter_2),
                choice: raw
                    .choice
                    .as_deref()
                    .and_then(parse_number)
                    .is_some_and(|v| v == 1.0),
                contact: trimmed(raw.contact),
                operating_hours: trimmed(raw.operating_hours),
                latitude,
                longitude,
            });
        }

        Ok(Self { rows, capabilities })
    }

    /// Sorted distinct categories over the whole matrix.
    pub fn categories(&self) -> Vec<String> {
        crate::filters::category_options(&self.rows)
    }
}

fn column_index(headers: &StringRecord, candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|name| headers.iter().position(|h| h == *name))
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reference::csv_reader;

    const MATRIX: &str = "Agency Name,Address,ZIP,GEOID,Total_TravelTime,Total_Miles,Filter_1,Filter_2,Choice,Contact,Operating Hours,Lat,Lon
 Hope Pantry ,1 Main St ,27601,37183052101,12.345,3.21,Grocery,Weekday,1,555-0100,Mon 10-2,35.78,-78.64
Grace Kitchen,2 Oak Ave,27603,37183052101.0,25,9.9,Hot Meals,Weekend,0,,,35.70,-78.60
Loaves,3 Elm Rd,27601,unknown,n/a,,Grocery,,1.0,555-0300,Tue 9-1,,
";

    fn matrix() -> TravelMatrix {
        TravelMatrix::from_reader(csv_reader(MATRIX.as_bytes()), Path::new("odm.csv")).unwrap()
    }

    #[test]
    fn detects_capabilities_from_headers() {
        assert_eq!(matrix().capabilities, Capabilities::all());

        let sparse = "agency name,address,zip\nHope Pantry,1 Main St,27601\n";
        let matrix =
            TravelMatrix::from_reader(csv_reader(sparse.as_bytes()), Path::new("odm.csv")).unwrap();
        assert_eq!(
            matrix.capabilities,
            Capabilities {
                zip: true,
                ..Capabilities::default()
            }
        );
    }

    #[test]
    fn normalizes_rows() {
        let matrix = matrix();
        assert_eq!(matrix.rows.len(), 3);

        let hope = &matrix.rows[0];
        assert_eq!(hope.name, "Hope Pantry");
        assert_eq!(hope.address, "1 Main St");
        assert_eq!(hope.tract, TractId(37183052101));
        assert_eq!(hope.travel_time, Some(12.345));
        assert!(hope.choice);
        assert_eq!(hope.latitude, Some(35.78));
        assert_eq!(hope.longitude, Some(-78.64));

        let grace = &matrix.rows[1];
        assert_eq!(grace.tract, TractId(37183052101));
        assert!(!grace.choice);
        assert_eq!(grace.contact, None);
    }

    #[test]
    fn coerces_bad_values_instead_of_failing() {
        let loaves = &matrix().rows[2];
        assert_eq!(loaves.tract, TractId::UNKNOWN);
        assert_eq!(loaves.travel_time, None);
        assert_eq!(loaves.distance, None);
        assert_eq!(loaves.subcategory, None);
        assert!(loaves.choice);
        assert_eq!(loaves.latitude, None);
    }

    #[test]
    fn lists_categories() {
        assert_eq!(matrix().categories(), vec!["Grocery", "Hot Meals"]);
    }

    #[test]
    fn missing_agency_name_is_fatal() {
        let data = "name,address\nHope Pantry,1 Main St\n";
        let err = TravelMatrix::from_reader(csv_reader(data.as_bytes()), Path::new("odm.csv"))
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::MissingColumn {
                column: "agency name",
                ..
            }
        ));
    }
}
