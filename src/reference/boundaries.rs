use std::path::Path;

use geo::{BoundingRect, Contains, Coord, MapCoords, MultiPolygon, Point, Rect};
use geojson::{FeatureCollection, GeoJson, JsonObject, JsonValue};

use super::TractId;
use crate::error::LoadError;

const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Coordinate reference systems a boundary file may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceCrs {
    // Longitude/latitude degrees (WGS84, NAD83, CRS84)
    Geographic,
    WebMercator,
}

impl SourceCrs {
    fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        let code = upper
            .rsplit(|c: char| c == ':' || c == '/')
            .next()
            .unwrap_or_default();
        match code {
            "4326" | "4269" | "CRS84" => Some(SourceCrs::Geographic),
            "3857" | "900913" | "102100" => Some(SourceCrs::WebMercator),
            _ => None,
        }
    }

    fn to_lon_lat(self, c: Coord<f64>) -> Coord<f64> {
        match self {
            SourceCrs::Geographic => c,
            SourceCrs::WebMercator => Coord {
                x: (c.x / EARTH_RADIUS_M).to_degrees(),
                y: (2.0 * (c.y / EARTH_RADIUS_M).exp().atan() - std::f64::consts::FRAC_PI_2)
                    .to_degrees(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tract {
    pub id: TractId,
    pub geometry: MultiPolygon<f64>,
    bbox: Option<Rect<f64>>,
}

impl Tract {
    pub fn new(id: TractId, geometry: MultiPolygon<f64>) -> Self {
        let bbox = geometry.bounding_rect();
        Self { id, geometry, bbox }
    }

    pub fn contains(&self, point: &Point<f64>) -> bool {
        let Some(bbox) = self.bbox else {
            return false;
        };
        let (min, max) = (bbox.min(), bbox.max());
        if point.x() < min.x || point.x() > max.x || point.y() < min.y || point.y() > max.y {
            return false;
        }
        self.geometry.contains(point)
    }
}

/// Census tract polygons in longitude/latitude degrees, kept in file order.
#[derive(Debug, Clone, Default)]
pub struct TractSet {
    tracts: Vec<Tract>,
}

impl TractSet {
    pub fn new(tracts: Vec<Tract>) -> Self {
        Self { tracts }
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let raw = std::fs::read_to_string(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_geojson_str(&raw, path)
    }

    pub fn from_geojson_str(raw: &str, path: &Path) -> Result<Self, LoadError> {
        let geojson: GeoJson = raw.parse().map_err(|source| LoadError::GeoJson {
            path: path.to_path_buf(),
            source,
        })?;
        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(LoadError::NotFeatureCollection {
                path: path.to_path_buf(),
            });
        };

        let crs = declared_crs(&collection, path)?;

        let mut tracts = Vec::with_capacity(collection.features.len());
        for feature in collection.features {
            let id = feature
                .properties
                .as_ref()
                .and_then(geoid_property)
                .map(coerce_geoid)
                .unwrap_or(TractId::UNKNOWN);
            // Matrix rows with unparsable geoids share this sentinel, so a
            // tract carrying it would join to all of them.
            if id == TractId::UNKNOWN {
                tracing::warn!(path = %path.display(), "skipping tract without a usable GEOID");
                continue;
            }

            let Some(geometry) = feature.geometry else {
                tracing::warn!(tract = %id, "skipping tract without geometry");
                continue;
            };
            let geometry = match geo::Geometry::<f64>::try_from(geometry) {
                Ok(geo::Geometry::Polygon(polygon)) => MultiPolygon::new(vec![polygon]),
                Ok(geo::Geometry::MultiPolygon(multi)) => multi,
                Ok(_) => {
                    tracing::warn!(tract = %id, "skipping tract with non-polygonal geometry");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(tract = %id, "skipping tract with invalid geometry: {}", e);
                    continue;
                }
            };

            let geometry = geometry.map_coords(|c| crs.to_lon_lat(c));
            tracts.push(Tract::new(id, geometry));
        }

        Ok(Self { tracts })
    }

    /// First tract, in file order, whose polygon contains `point`.
    pub fn locate(&self, point: Point<f64>) -> Option<TractId> {
        self.tracts
            .iter()
            .find(|tract| tract.contains(&point))
            .map(|tract| tract.id)
    }

    pub fn len(&self) -> usize {
        self.tracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracts.is_empty()
    }
}

// Legacy GeoJSON files (GDAL exports among them) still carry the pre-RFC 7946
// `crs` member; without it coordinates are longitude/latitude.
fn declared_crs(collection: &FeatureCollection, path: &Path) -> Result<SourceCrs, LoadError> {
    let name = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.get("properties"))
        .and_then(|props| props.get("name"))
        .and_then(JsonValue::as_str);

    match name {
        None => Ok(SourceCrs::Geographic),
        Some(name) => SourceCrs::from_name(name).ok_or_else(|| LoadError::UnsupportedCrs {
            path: path.to_path_buf(),
            crs: name.to_string(),
        }),
    }
}

fn geoid_property(properties: &JsonObject) -> Option<&JsonValue> {
    properties
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("geoid"))
        .map(|(_, value)| value)
}

fn coerce_geoid(value: &JsonValue) -> TractId {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
            .map(TractId)
            .unwrap_or(TractId::UNKNOWN),
        JsonValue::String(s) => TractId::coerce(s),
        _ => TractId::UNKNOWN,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // Two unit squares side by side; the GEOIDs use both the string and
    // numeric encodings seen in census exports.
    const TRACTS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "GEOID": "37183052101", "NAME": "521.01" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-79.0, 35.0], [-78.0, 35.0], [-78.0, 36.0], [-79.0, 36.0], [-79.0, 35.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "geoid": 37183052102 },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[-78.0, 35.0], [-77.0, 35.0], [-77.0, 36.0], [-78.0, 36.0], [-78.0, 35.0]]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "GEOID": "bad" },
                "geometry": { "type": "Point", "coordinates": [-78.5, 35.5] }
            }
        ]
    }"#;

    fn tracts() -> TractSet {
        TractSet::from_geojson_str(TRACTS, Path::new("tracts.geojson")).unwrap()
    }

    #[test]
    fn keeps_polygonal_tracts_only() {
        assert_eq!(tracts().len(), 2);
    }

    #[test]
    fn locates_points_in_file_order() {
        let tracts = tracts();
        assert_eq!(
            tracts.locate(Point::new(-78.5, 35.5)),
            Some(TractId(37183052101))
        );
        assert_eq!(
            tracts.locate(Point::new(-77.5, 35.25)),
            Some(TractId(37183052102))
        );
    }

    #[test]
    fn points_outside_every_tract_are_unmatched() {
        assert_eq!(tracts().locate(Point::new(-80.5, 35.5)), None);
        assert_eq!(tracts().locate(Point::new(-78.5, 40.0)), None);
    }

    #[test]
    fn reprojects_web_mercator() {
        let raw = r#"{
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::3857" } },
            "features": [{
                "type": "Feature",
                "properties": { "GEOID": "1" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-8794239.77, 4163881.14], [-8682920.28, 4163881.14], [-8682920.28, 4300621.37], [-8794239.77, 4300621.37], [-8794239.77, 4163881.14]]]
                }
            }]
        }"#;
        let tracts = TractSet::from_geojson_str(raw, Path::new("mercator.geojson")).unwrap();
        assert_eq!(tracts.locate(Point::new(-78.5, 35.5)), Some(TractId(1)));
        assert_eq!(tracts.locate(Point::new(-8738623.8, 4232251.3)), None);
    }

    #[test]
    fn tracts_with_unparsable_geoids_are_skipped() {
        let raw = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "GEOID": "bad" },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[-79.0, 35.0], [-78.0, 35.0], [-78.0, 36.0], [-79.0, 36.0], [-79.0, 35.0]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": { "NAME": "no id" },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[-78.0, 35.0], [-77.0, 35.0], [-77.0, 36.0], [-78.0, 36.0], [-78.0, 35.0]]]
                    }
                }
            ]
        }"#;
        let tracts = TractSet::from_geojson_str(raw, Path::new("tracts.geojson")).unwrap();
        assert!(tracts.is_empty());
        assert_eq!(tracts.locate(Point::new(-78.5, 35.5)), None);
    }

    #[test]
    fn rejects_unknown_crs() {
        let raw = r#"{
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "EPSG:2264" } },
            "features": []
        }"#;
        let err = TractSet::from_geojson_str(raw, Path::new("stateplane.geojson")).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedCrs { .. }));
    }

    #[test]
    fn accepts_nad83() {
        let raw = r#"{
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::4269" } },
            "features": []
        }"#;
        assert!(TractSet::from_geojson_str(raw, Path::new("nad83.geojson"))
            .unwrap()
            .is_empty());
    }
}
