use geo::{Centroid, CoordsIter, GeodesicArea, LineString, Point, Polygon};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};

use crate::error::{DeforError, Result, ServiceError, ServiceErrorKind};
use crate::geo_core::BoundingBox;

/// One change region: a polygon in (lon, lat) and its properties
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeFeature {
    pub polygon: Polygon<f64>,
    pub properties: JsonObject,
}

impl ChangeFeature {
    pub fn new(polygon: Polygon<f64>, properties: JsonObject) -> Self {
        ChangeFeature {
            polygon,
            properties,
        }
    }

    /// Integer value of a property (e.g. the label)
    pub fn property_i64(&self, name: &str) -> Option<i64> {
        self.properties.get(name).and_then(|v| v.as_i64())
    }

    pub fn area_m2(&self) -> f64 {
        self.polygon.geodesic_area_unsigned()
    }

    pub fn centroid(&self) -> Option<Point<f64>> {
        self.polygon.centroid()
    }

    pub fn to_feature(&self) -> Feature {
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::from(&self.polygon))),
            id: None,
            properties: Some(self.properties.clone()),
            foreign_members: None,
        }
    }

    /// Accepts only Polygon geometries
    pub fn from_feature(feature: Feature) -> Result<Self> {
        let geometry = feature
            .geometry
            .ok_or_else(|| invalid_response("feature without geometry"))?;
        let polygon = match geometry.value {
            value @ Value::Polygon(_) => Polygon::<f64>::try_from(value)
                .map_err(|e| invalid_response(format!("bad polygon: {}", e)))?,
            other => {
                return Err(invalid_response(format!(
                    "expected Polygon geometry, got {}",
                    geometry_type(&other)
                )))
            }
        };
        Ok(ChangeFeature {
            polygon,
            properties: feature.properties.unwrap_or_default(),
        })
    }
}

/// Output of one pipeline run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeFeatureCollection {
    pub features: Vec<ChangeFeature>,
}

impl ChangeFeatureCollection {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self.features.iter().map(|f| f.to_feature()).collect(),
            foreign_members: None,
        }
    }

    pub fn to_geojson(&self) -> GeoJson {
        GeoJson::from(self.to_feature_collection())
    }

    pub fn to_geojson_string(&self) -> String {
        self.to_geojson().to_string()
    }

    pub fn to_geojson_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_feature_collection())?)
    }

    pub fn from_feature_collection(fc: FeatureCollection) -> Result<Self> {
        let features = fc
            .features
            .into_iter()
            .map(ChangeFeature::from_feature)
            .collect::<Result<Vec<_>>>()?;
        Ok(ChangeFeatureCollection { features })
    }

    /// Parse a GeoJSON document that must be a FeatureCollection
    pub fn parse(text: &str) -> Result<Self> {
        let geojson: GeoJson = text
            .parse()
            .map_err(|e| invalid_response(format!("not GeoJSON: {}", e)))?;
        match geojson {
            GeoJson::FeatureCollection(fc) => Self::from_feature_collection(fc),
            _ => Err(invalid_response("expected a FeatureCollection")),
        }
    }

    /// Whether every vertex of every feature lies inside `bbox`
    pub fn within(&self, bbox: &BoundingBox) -> bool {
        self.features.iter().all(|f| {
            f.polygon
                .coords_iter()
                .all(|c| bbox.contains(c.x, c.y))
        })
    }
}

/// Same rings as point sets, ignoring start vertex and winding
pub fn polygons_equivalent(a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
    if !rings_equivalent(a.exterior(), b.exterior()) {
        return false;
    }
    if a.interiors().len() != b.interiors().len() {
        return false;
    }
    a.interiors()
        .iter()
        .all(|ha| b.interiors().iter().any(|hb| rings_equivalent(ha, hb)))
}

fn rings_equivalent(a: &LineString<f64>, b: &LineString<f64>) -> bool {
    ring_points(a) == ring_points(b)
}

fn ring_points(ring: &LineString<f64>) -> Vec<(f64, f64)> {
    let mut points: Vec<(f64, f64)> = ring.0.iter().map(|c| (c.x, c.y)).collect();
    if ring.is_closed() && points.len() > 1 {
        points.pop();
    }
    points.sort_by(|p, q| p.0.total_cmp(&q.0).then(p.1.total_cmp(&q.1)));
    points.dedup();
    points
}

fn geometry_type(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

fn invalid_response(message: impl Into<String>) -> DeforError {
    ServiceError::new(ServiceErrorKind::InvalidResponse, message).into()
}
