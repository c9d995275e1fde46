use std::collections::HashSet;

use serde::Serialize;

use crate::geocoder::Coordinate;
use crate::reference::{AgencyRecord, Capabilities};

pub const USER_COLOR: [u8; 3] = [0, 0, 255];
pub const AGENCY_COLOR: [u8; 3] = [255, 0, 0];
pub const MARKER_RADIUS: u32 = 250;
pub const USER_LABEL: &str = "Your Location";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Address resolved to a tract; rows carry travel times from it.
    TravelTime,
    Zip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub agency_name: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_hours: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub color: [u8; 3],
    pub radius: u32,
    pub tooltip: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapView {
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
    pub pitch: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapLayer {
    pub points: Vec<MapPoint>,
    pub view: MapView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Presentation {
    pub columns: Vec<&'static str>,
    pub rows: Vec<ResultRow>,
    pub map: Option<MapLayer>,
}

/// Map defaults used when there is no user coordinate to center on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapDefaults {
    pub center: Coordinate,
    pub zoom: f64,
}

impl Default for MapDefaults {
    fn default() -> Self {
        Self {
            center: Coordinate {
                latitude: 35.78,
                longitude: -79.01,
            },
            zoom: 10.0,
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// Rows dropped by dedup keep the first occurrence.
fn display_key(row: &ResultRow) -> (String, String, Option<String>, Option<String>, Option<u64>, Option<u64>) {
    (
        row.agency_name.clone(),
        row.address.clone(),
        row.operating_hours.clone(),
        row.contact.clone(),
        row.travel_time.map(f64::to_bits),
        row.distance.map(f64::to_bits),
    )
}

pub fn columns(mode: SearchMode, capabilities: &Capabilities) -> Vec<&'static str> {
    let mut columns = vec!["agency name", "address"];
    if capabilities.operating_hours {
        columns.push("operating hours");
    }
    if mode == SearchMode::TravelTime {
        if capabilities.contact {
            columns.push("contact");
        }
        if capabilities.travel_time {
            columns.push("total_traveltime");
        }
        if capabilities.distance {
            columns.push("total_miles");
        }
    }
    columns
}

struct Displayed<'a> {
    row: ResultRow,
    source: &'a AgencyRecord,
}

fn to_display<'a>(
    record: &'a AgencyRecord,
    mode: SearchMode,
    capabilities: &Capabilities,
) -> Displayed<'a> {
    let travel_mode = mode == SearchMode::TravelTime;
    let row = ResultRow {
        agency_name: record.name.clone(),
        address: record.address.clone(),
        operating_hours: record
            .operating_hours
            .clone()
            .filter(|_| capabilities.operating_hours),
        contact: record
            .contact
            .clone()
            .filter(|_| travel_mode && capabilities.contact),
        travel_time: record
            .travel_time
            .map(round2)
            .filter(|_| travel_mode && capabilities.travel_time),
        distance: record
            .distance
            .map(round2)
            .filter(|_| travel_mode && capabilities.distance),
    };
    Displayed {
        row,
        source: record,
    }
}

/// Deduplicate, round and sort the filtered rows and build the map layer.
pub fn assemble(
    rows: &[AgencyRecord],
    mode: SearchMode,
    user: Option<Coordinate>,
    capabilities: &Capabilities,
    map_defaults: &MapDefaults,
) -> Presentation {
    let mut displayed: Vec<Displayed> = Vec::with_capacity(rows.len());
    match mode {
        SearchMode::TravelTime => {
            let mut seen = HashSet::new();
            for record in rows {
                let item = to_display(record, mode, capabilities);
                if seen.insert(display_key(&item.row)) {
                    displayed.push(item);
                }
            }
            if capabilities.travel_time {
                // Missing travel times sort last
                displayed.sort_by(|a, b| match (a.row.travel_time, b.row.travel_time) {
                    (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                });
            } else {
                displayed.sort_by(|a, b| a.row.agency_name.cmp(&b.row.agency_name));
            }
        }
        SearchMode::Zip => {
            let mut seen = HashSet::new();
            for record in rows {
                if seen.insert(record.name.clone()) {
                    displayed.push(to_display(record, mode, capabilities));
                }
            }
            displayed.sort_by(|a, b| a.row.agency_name.cmp(&b.row.agency_name));
        }
    }

    let map = if capabilities.coordinates {
        Some(build_map(&displayed, user, capabilities, map_defaults))
    } else {
        None
    };

    Presentation {
        columns: columns(mode, capabilities),
        rows: displayed.into_iter().map(|d| d.row).collect(),
        map,
    }
}

fn build_map(
    displayed: &[Displayed],
    user: Option<Coordinate>,
    capabilities: &Capabilities,
    map_defaults: &MapDefaults,
) -> MapLayer {
    let mut points = Vec::with_capacity(displayed.len() + 1);

    if let Some(user) = user {
        points.push(MapPoint {
            name: USER_LABEL.to_string(),
            latitude: user.latitude,
            longitude: user.longitude,
            color: USER_COLOR,
            radius: MARKER_RADIUS,
            tooltip: USER_LABEL.to_string(),
        });
    }

    for item in displayed {
        let (Some(latitude), Some(longitude)) = (item.source.latitude, item.source.longitude) else {
            continue;
        };
        points.push(MapPoint {
            name: item.row.agency_name.clone(),
            latitude,
            longitude,
            color: AGENCY_COLOR,
            radius: MARKER_RADIUS,
            tooltip: tooltip(item.source, capabilities),
        });
    }

    let center = user.unwrap_or(map_defaults.center);
    MapLayer {
        points,
        view: MapView {
            longitude: center.longitude,
            latitude: center.latitude,
            zoom: map_defaults.zoom,
            pitch: 0.0,
        },
    }
}

/// Hover text for an agency marker. Travel time and distance are included
/// only when the matrix has those columns.
pub fn tooltip(record: &AgencyRecord, capabilities: &Capabilities) -> String {
    let mut text = format!("Agency: {}", record.name);
    if capabilities.travel_time {
        text.push_str("<br>Travel Time (min): ");
        text.push_str(&format_figure(record.travel_time));
    }
    if capabilities.distance {
        text.push_str("<br>Distance (miles): ");
        text.push_str(&format_figure(record.distance));
    }
    text
}

fn format_figure(value: Option<f64>) -> String {
    match value.map(round2) {
        Some(v) if v.fract() == 0.0 => format!("{v:.1}"),
        Some(v) => v.to_string(),
        None => "n/a".to_string(),
    }
}
