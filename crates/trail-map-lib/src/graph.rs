//! Trail graph data model
//!
//! A [`TrailGraph`] holds the physical trail network of a site (points and the
//! edges between them) together with the points-of-interest overlay. It is
//! built once, validated for referential integrity, and is read-only afterwards.

use crate::{GraphError, Result, utils};
use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A WGS84 coordinate
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Distance to another coordinate in meters
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        utils::haversine_distance(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }

    /// Linear interpolation towards `other` (`t` in `[0, 1]`)
    pub fn lerp(self, other: Coordinate, t: f64) -> Coordinate {
        Coordinate {
            latitude: self.latitude + (other.latitude - self.latitude) * t,
            longitude: self.longitude + (other.longitude - self.longitude) * t,
        }
    }
}

/// Structural role of a trail node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    Path,
    #[serde(rename = "junction_3way")]
    Junction3Way,
    #[serde(rename = "junction_4way")]
    Junction4Way,
    Entrance,
    DeadEnd,
}

impl PointKind {
    /// Expected edge degree as an inclusive `(min, max)` range
    pub fn expected_degree(&self) -> (usize, Option<usize>) {
        match self {
            PointKind::Entrance | PointKind::DeadEnd => (1, Some(1)),
            PointKind::Junction3Way => (3, None),
            PointKind::Junction4Way => (4, None),
            PointKind::Path => (0, None),
        }
    }
}

/// A node of the trail graph
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: PointKind,
}

impl Point {
    /// Create a point whose id is derived from its coordinates
    pub fn new(latitude: f64, longitude: f64, kind: PointKind) -> Self {
        Self {
            id: utils::node_id(latitude, longitude),
            latitude,
            longitude,
            label: None,
            kind,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A traversable connection between two points
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub bidirectional: bool,
    /// Explicit polyline overriding the straight segment between endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<Coordinate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Edge {
    pub fn new(id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            bidirectional: true,
            shape: None,
            direction_hint: None,
            note: None,
        }
    }

    pub fn one_way(mut self) -> Self {
        self.bidirectional = false;
        self
    }

    pub fn with_shape(mut self, shape: Vec<Coordinate>) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn touches(&self, point_id: &str) -> bool {
        self.from == point_id || self.to == point_id
    }

    /// The point reachable from `point_id` along this edge, if any.
    ///
    /// One-way edges can only be followed from `from` to `to`.
    pub fn other_end(&self, point_id: &str) -> Option<&str> {
        if self.from == point_id {
            Some(&self.to)
        } else if self.to == point_id && self.bidirectional {
            Some(&self.from)
        } else {
            None
        }
    }
}

/// Category of a point of interest
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapPointType {
    Pagoda,
    Cave,
    Viewpoint,
    Checkin,
    Statue,
    Gate,
    Shop,
    Elevator,
    Event,
    Workshop,
    Attraction,
    Restroom,
    General,
    #[default]
    #[serde(other)]
    Default,
}

impl MapPointType {
    pub fn all() -> &'static [Self] {
        &[
            Self::Pagoda,
            Self::Cave,
            Self::Viewpoint,
            Self::Checkin,
            Self::Statue,
            Self::Gate,
            Self::Shop,
            Self::Elevator,
            Self::Event,
            Self::Workshop,
            Self::Attraction,
            Self::Restroom,
            Self::General,
            Self::Default,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pagoda => "Pagoda",
            Self::Cave => "Cave",
            Self::Viewpoint => "Viewpoint",
            Self::Checkin => "Check-in",
            Self::Statue => "Statue",
            Self::Gate => "Gate",
            Self::Shop => "Shop",
            Self::Elevator => "Elevator",
            Self::Event => "Event",
            Self::Workshop => "Workshop",
            Self::Attraction => "Attraction",
            Self::Restroom => "Restroom",
            Self::General => "General",
            Self::Default => "Other",
        }
    }
}

/// What a point of interest is attached to in the trail graph
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "ref_id", rename_all = "lowercase")]
pub enum Attachment {
    Node(String),
    Edge(String),
}

/// A point of interest rendered as a marker
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "type", default)]
    pub kind: MapPointType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_to: Option<Attachment>,
    /// Media URLs shown by the detail view
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl MapPoint {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A non-fatal finding from [`TrailGraph::validate`]
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationWarning {
    /// A point's edge count does not match its kind
    UnexpectedDegree {
        point_id: String,
        kind: PointKind,
        degree: usize,
    },
    /// A point of interest references a node or edge that does not exist
    DanglingAttachment {
        map_point_id: String,
        attachment: Attachment,
    },
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedDegree {
                point_id,
                kind,
                degree,
            } => write!(f, "point {point_id} ({kind:?}) has degree {degree}"),
            Self::DanglingAttachment {
                map_point_id,
                attachment,
            } => write!(f, "map point {map_point_id} attached to missing {attachment:?}"),
        }
    }
}

/// Result of a structural validation pass
#[derive(Clone, Debug, Default)]
pub struct ValidationReport {
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Static, validated trail network plus points of interest
#[derive(Clone, Debug, Default)]
pub struct TrailGraph {
    points: Vec<Point>,
    edges: Vec<Edge>,
    map_points: Vec<MapPoint>,
    /// Point id -> index into `points`
    point_index: HashMap<String, usize>,
    /// Point id -> indices into `edges` of incident edges
    incidence: HashMap<String, Vec<usize>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl TrailGraph {
    /// Build a graph, enforcing unique ids and edge referential integrity.
    ///
    /// Edges must join two distinct points, and an explicit shape needs at
    /// least two valid vertices.
    pub fn new(points: Vec<Point>, edges: Vec<Edge>, map_points: Vec<MapPoint>) -> Result<Self> {
        let mut point_index = HashMap::with_capacity(points.len());
        for (idx, point) in points.iter().enumerate() {
            if !utils::is_valid_wgs84(point.latitude, point.longitude) {
                return Err(GraphError::InvalidCoordinate {
                    id: point.id.clone(),
                    latitude: point.latitude,
                    longitude: point.longitude,
                });
            }
            if point_index.insert(point.id.clone(), idx).is_some() {
                return Err(GraphError::DuplicatePointId(point.id.clone()));
            }
        }

        let mut incidence: HashMap<String, Vec<usize>> = HashMap::new();
        let mut edge_ids = HashSet::with_capacity(edges.len());
        for (idx, edge) in edges.iter().enumerate() {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(GraphError::DuplicateEdgeId(edge.id.clone()));
            }
            for end in [&edge.from, &edge.to] {
                if !point_index.contains_key(end) {
                    return Err(GraphError::DanglingEdge {
                        edge_id: edge.id.clone(),
                        point_id: end.clone(),
                    });
                }
            }
            if edge.from == edge.to {
                return Err(GraphError::SelfLoop {
                    edge_id: edge.id.clone(),
                    point_id: edge.from.clone(),
                });
            }
            if let Some(shape) = &edge.shape {
                if shape.len() < 2 {
                    return Err(GraphError::DegenerateShape {
                        edge_id: edge.id.clone(),
                        vertices: shape.len(),
                    });
                }
                if let Some(bad) = shape
                    .iter()
                    .find(|c| !utils::is_valid_wgs84(c.latitude, c.longitude))
                {
                    return Err(GraphError::InvalidCoordinate {
                        id: edge.id.clone(),
                        latitude: bad.latitude,
                        longitude: bad.longitude,
                    });
                }
            }
            incidence.entry(edge.from.clone()).or_default().push(idx);
            incidence.entry(edge.to.clone()).or_default().push(idx);
        }

        let mut map_point_ids = HashSet::with_capacity(map_points.len());
        for map_point in &map_points {
            if !map_point_ids.insert(map_point.id.as_str()) {
                return Err(GraphError::DuplicateMapPointId(map_point.id.clone()));
            }
            if !utils::is_valid_wgs84(map_point.latitude, map_point.longitude) {
                return Err(GraphError::InvalidCoordinate {
                    id: map_point.id.clone(),
                    latitude: map_point.latitude,
                    longitude: map_point.longitude,
                });
            }
        }

        tracing::debug!(
            "Built trail graph: {} points, {} edges, {} map points",
            points.len(),
            edges.len(),
            map_points.len()
        );

        Ok(Self {
            points,
            edges,
            map_points,
            point_index,
            incidence,
        })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn map_points(&self) -> &[MapPoint] {
        &self.map_points
    }

    /// Look up a point by id
    pub fn point(&self, id: &str) -> Option<&Point> {
        self.point_index.get(id).map(|&idx| &self.points[idx])
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn map_point(&self, id: &str) -> Option<&MapPoint> {
        self.map_points.iter().find(|p| p.id == id)
    }

    /// Edges incident to a point, regardless of direction
    pub fn edges_for<'a>(&'a self, point_id: &str) -> impl Iterator<Item = &'a Edge> + use<'a> {
        self.incidence
            .get(point_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|&idx| &self.edges[idx])
    }

    /// Number of edges incident to a point
    pub fn degree(&self, point_id: &str) -> usize {
        self.incidence.get(point_id).map_or(0, Vec::len)
    }

    /// Points reachable in one step from `point_id`, honouring one-way edges
    pub fn neighbors(&self, point_id: &str) -> Vec<&Point> {
        self.edges_for(point_id)
            .filter_map(|edge| edge.other_end(point_id))
            .filter_map(|id| self.point(id))
            .collect()
    }

    /// Points of interest of a single category
    pub fn map_points_of_type(&self, kind: MapPointType) -> impl Iterator<Item = &MapPoint> {
        self.map_points.iter().filter(move |p| p.kind == kind)
    }

    /// Polyline for an edge: its explicit shape, or the straight segment
    pub fn edge_polyline(&self, edge: &Edge) -> Vec<Coordinate> {
        if let Some(shape) = &edge.shape {
            return shape.clone();
        }
        [&edge.from, &edge.to]
            .into_iter()
            .filter_map(|id| self.point(id))
            .map(Point::coordinate)
            .collect()
    }

    /// Bounding box over all points and points of interest.
    ///
    /// Uses `x = longitude`, `y = latitude`.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        let coords = self
            .points
            .iter()
            .map(Point::coordinate)
            .chain(self.map_points.iter().map(MapPoint::coordinate));

        let mut bounds: Option<(Coord<f64>, Coord<f64>)> = None;
        for c in coords {
            let (min, max) = bounds.get_or_insert((
                Coord {
                    x: c.longitude,
                    y: c.latitude,
                },
                Coord {
                    x: c.longitude,
                    y: c.latitude,
                },
            ));
            min.x = min.x.min(c.longitude);
            min.y = min.y.min(c.latitude);
            max.x = max.x.max(c.longitude);
            max.y = max.y.max(c.latitude);
        }
        bounds.map(|(min, max)| Rect::new(min, max))
    }

    /// Check the modelling invariants that are not enforced at construction
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        for point in &self.points {
            let degree = self.degree(&point.id);
            let (min, max) = point.kind.expected_degree();
            if degree < min || max.is_some_and(|max| degree > max) {
                report.warnings.push(ValidationWarning::UnexpectedDegree {
                    point_id: point.id.clone(),
                    kind: point.kind,
                    degree,
                });
            }
        }

        for map_point in &self.map_points {
            let Some(attachment) = &map_point.attached_to else {
                continue;
            };
            let resolves = match attachment {
                Attachment::Node(id) => self.point(id).is_some(),
                Attachment::Edge(id) => self.edge(id).is_some(),
            };
            if !resolves {
                report.warnings.push(ValidationWarning::DanglingAttachment {
                    map_point_id: map_point.id.clone(),
                    attachment: attachment.clone(),
                });
            }
        }

        for warning in &report.warnings {
            tracing::warn!("Trail graph validation: {warning}");
        }

        report
    }
}
