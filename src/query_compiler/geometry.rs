//! Geometry collaborator
//!
//! GEOMETRY columns are never selected raw. Projection and bounding-box
//! predicates go through a [`GeometrySql`] implementation whose fragments are
//! used verbatim.

use super::param::Param;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box used by `Bbox` criteria.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// SQL generator for geometry reads and bounding-box filters.
///
/// `bbox_sql` must contain exactly as many `?` as `bbox_params` returns values.
pub trait GeometrySql: Send + Sync {
    /// Expression that reads a geometry column, e.g. `ST_AsText(t0."geom")`
    fn geometry_read_sql(&self, qualified_column: &str) -> String;

    /// Boolean expression testing the column against a bounding box
    fn bbox_sql(&self, qualified_column: &str) -> String;

    /// Values bound to the placeholders of [`GeometrySql::bbox_sql`]
    fn bbox_params(&self, bbox: &BoundingBox) -> Vec<Param> {
        vec![
            Param::Float(bbox.min_x),
            Param::Float(bbox.min_y),
            Param::Float(bbox.max_x),
            Param::Float(bbox.max_y),
        ]
    }
}

/// OGC simple-features functions (PostGIS, SpatiaLite, MySQL 8 spellings).
#[derive(Debug, Clone, Default)]
pub struct OgcGeometrySql {
    pub srid: Option<i32>,
}

impl OgcGeometrySql {
    pub fn new(srid: Option<i32>) -> Self {
        Self { srid }
    }
}

impl GeometrySql for OgcGeometrySql {
    fn geometry_read_sql(&self, qualified_column: &str) -> String {
        format!("ST_AsText({})", qualified_column)
    }

    fn bbox_sql(&self, qualified_column: &str) -> String {
        match self.srid {
            Some(srid) => format!(
                "ST_Intersects({}, ST_MakeEnvelope(?, ?, ?, ?, {}))",
                qualified_column, srid
            ),
            None => format!(
                "ST_Intersects({}, ST_MakeEnvelope(?, ?, ?, ?))",
                qualified_column
            ),
        }
    }
}
