//! Trail graph loading from authored JSON
//!
//! Points are authored with a human-readable `key`; edges and node attachments
//! refer to those keys. On load every point receives its coordinate-derived id
//! and all references are rewritten, so ids never depend on authoring order.

use crate::graph::{Attachment, Coordinate, Edge, MapPoint, Point, PointKind, TrailGraph};
use crate::{GraphError, Result, utils};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// The bundled sample site
const SAMPLE_SITE_JSON: &str = include_str!("../data/sample_site.json");

#[derive(Debug, Deserialize)]
struct SiteSource {
    #[serde(default)]
    points: Vec<PointSource>,
    #[serde(default)]
    edges: Vec<EdgeSource>,
    #[serde(default)]
    map_points: Vec<MapPoint>,
}

#[derive(Debug, Deserialize)]
struct PointSource {
    key: String,
    latitude: f64,
    longitude: f64,
    kind: PointKind,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EdgeSource {
    id: String,
    from: String,
    to: String,
    #[serde(default = "default_bidirectional")]
    bidirectional: bool,
    /// `[latitude, longitude]` pairs
    #[serde(default)]
    shape: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    direction_hint: Option<String>,
    #[serde(default)]
    note: Option<String>,
}

fn default_bidirectional() -> bool {
    true
}

/// Parse a site from a JSON string
pub fn from_json(json: &str) -> Result<TrailGraph> {
    let source: SiteSource = serde_json::from_str(json)?;
    build(source)
}

/// Parse a site from a JSON file on disk
pub fn from_path(path: &Path) -> Result<TrailGraph> {
    let json = std::fs::read_to_string(path)?;
    tracing::info!("Loading trail graph from {}", path.display());
    from_json(&json)
}

/// The sample site compiled into the library
pub fn sample_site() -> Result<TrailGraph> {
    from_json(SAMPLE_SITE_JSON)
}

/// Load the site once for the process lifetime and validate it.
///
/// Referential integrity failures are returned as errors; modelling
/// warnings are logged and otherwise ignored.
pub fn load_shared(path: Option<&Path>) -> Result<Arc<TrailGraph>> {
    let graph = match path {
        Some(path) => from_path(path)?,
        None => sample_site()?,
    };
    let report = graph.validate();
    tracing::info!(
        "Trail graph ready: {} points, {} edges, {} map points ({} warnings)",
        graph.points().len(),
        graph.edges().len(),
        graph.map_points().len(),
        report.warnings.len()
    );
    Ok(Arc::new(graph))
}

fn build(source: SiteSource) -> Result<TrailGraph> {
    let mut points: Vec<Point> = Vec::with_capacity(source.points.len());
    let mut id_for_key: HashMap<String, String> = HashMap::with_capacity(source.points.len());
    let mut index_for_id: HashMap<String, usize> = HashMap::with_capacity(source.points.len());

    for authored in source.points {
        if !utils::is_valid_wgs84(authored.latitude, authored.longitude) {
            return Err(GraphError::InvalidCoordinate {
                id: authored.key,
                latitude: authored.latitude,
                longitude: authored.longitude,
            });
        }

        let mut point = Point::new(authored.latitude, authored.longitude, authored.kind);
        point.label = authored.label;

        match index_for_id.get(&point.id) {
            Some(&existing) => {
                // Same physical location declared twice; keep the first declaration
                if points[existing].kind != point.kind {
                    tracing::warn!(
                        "Point key {} collapses onto {} with a different kind ({:?} vs {:?})",
                        authored.key,
                        point.id,
                        point.kind,
                        points[existing].kind
                    );
                } else {
                    tracing::debug!("Point key {} collapses onto {}", authored.key, point.id);
                }
            }
            None => {
                index_for_id.insert(point.id.clone(), points.len());
                points.push(point.clone());
            }
        }

        if id_for_key.insert(authored.key.clone(), point.id).is_some() {
            return Err(GraphError::DuplicatePointKey(authored.key));
        }
    }

    let resolve = |key: &str| -> Result<String> {
        id_for_key
            .get(key)
            .cloned()
            .ok_or_else(|| GraphError::UnknownPointKey(key.to_string()))
    };

    let edges = source
        .edges
        .into_iter()
        .map(|spec| {
            Ok(Edge {
                from: resolve(&spec.from)?,
                to: resolve(&spec.to)?,
                id: spec.id,
                bidirectional: spec.bidirectional,
                shape: spec.shape.map(|shape| {
                    shape
                        .into_iter()
                        .map(|[lat, lon]| Coordinate::new(lat, lon))
                        .collect()
                }),
                direction_hint: spec.direction_hint,
                note: spec.note,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // Node attachments are authored by key; unknown keys are left for validate()
    let map_points = source
        .map_points
        .into_iter()
        .map(|mut map_point| {
            if let Some(Attachment::Node(key)) = &map_point.attached_to
                && let Some(id) = id_for_key.get(key)
            {
                map_point.attached_to = Some(Attachment::Node(id.clone()));
            }
            map_point
        })
        .collect();

    TrailGraph::new(points, edges, map_points)
}
