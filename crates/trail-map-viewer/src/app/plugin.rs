//! Walkers plugins that draw the site on the map
//!
//! Plugins are rebuilt every frame from owned data. Anything they learn about
//! the frame (the visible region, a clicked marker) goes back to the app
//! through the shared [`MapFeedback`].

use egui::{Color32, FontId, Pos2, Stroke, Vec2};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use trail_map_lib::markers::marker_appearances;
use trail_map_lib::utils::meters_to_latitude_degrees;
use trail_map_lib::{
    Attachment, Coordinate, Edge, MapPointType, MarkerLayers, Region, Rgb, TrailGraph,
};
use walkers::{Plugin, Projector};

use crate::app::camera::region_from_corners;

const TRAIL_COLOR: Color32 = Color32::from_rgb(121, 85, 72);
const TRAIL_HIGHLIGHT_COLOR: Color32 = Color32::from_rgb(255, 152, 0);
const NODE_COLOR: Color32 = Color32::from_rgb(62, 39, 35);
const USER_COLOR: Color32 = Color32::from_rgb(66, 133, 244);

const MARKER_RADIUS: f32 = 11.0;
const SELECTED_MARKER_RADIUS: f32 = 14.0;
/// Extra slack around a marker that still counts as a click on it
const PICK_SLACK: f32 = 4.0;
const USER_DOT_RADIUS: f32 = 7.0;

/// What the map learned this frame
#[derive(Clone, Debug, Default)]
pub struct MapFeedback {
    pub region: Option<Region>,
    pub clicked_poi: Option<String>,
}

pub type SharedFeedback = Arc<Mutex<MapFeedback>>;

pub fn lock_feedback(feedback: &Mutex<MapFeedback>) -> MutexGuard<'_, MapFeedback> {
    feedback.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn to_color(rgb: Rgb) -> Color32 {
    Color32::from_rgb(rgb.0, rgb.1, rgb.2)
}

fn to_screen(projector: &Projector, coordinate: Coordinate) -> Pos2 {
    projector
        .project(walkers::lat_lon(coordinate.latitude, coordinate.longitude))
        .to_pos2()
}

/// Whether an edge belongs to what the selected point of interest is attached to
pub fn is_highlighted(edge: &Edge, attachment: Option<&Attachment>) -> bool {
    match attachment {
        Some(Attachment::Edge(id)) => edge.id == *id,
        Some(Attachment::Node(id)) => edge.touches(id),
        None => false,
    }
}

/// Index of the marker closest to `pointer`, if any is within `radius`
pub fn pick_marker(markers: &[Pos2], pointer: Pos2, radius: f32) -> Option<usize> {
    markers
        .iter()
        .enumerate()
        .map(|(i, pos)| (i, pos.distance(pointer)))
        .filter(|(_, distance)| *distance <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// Heading wedge: tip in the direction of travel, base behind the dot
pub fn heading_wedge(center: Pos2, heading_deg: f64) -> [Pos2; 3] {
    let point_at = |angle_deg: f64, distance: f32| {
        let angle = angle_deg.to_radians();
        // Screen y grows downwards
        center + Vec2::new(angle.sin() as f32, -angle.cos() as f32) * distance
    };
    [
        point_at(heading_deg, USER_DOT_RADIUS * 3.2),
        point_at(heading_deg + 28.0, USER_DOT_RADIUS * 1.4),
        point_at(heading_deg - 28.0, USER_DOT_RADIUS * 1.4),
    ]
}

/// Trail edges as polylines, plus graph nodes when enabled
pub struct TrailPlugin {
    graph: Arc<TrailGraph>,
    width: f32,
    show_nodes: bool,
    highlight: Option<Attachment>,
}

impl TrailPlugin {
    pub fn new(graph: Arc<TrailGraph>, width: f32) -> Self {
        Self {
            graph,
            width,
            show_nodes: false,
            highlight: None,
        }
    }

    pub fn with_nodes(mut self, show: bool) -> Self {
        self.show_nodes = show;
        self
    }

    pub fn with_highlight(mut self, attachment: Option<Attachment>) -> Self {
        self.highlight = attachment;
        self
    }
}

impl Plugin for TrailPlugin {
    fn run(
        self: Box<Self>,
        ui: &mut egui::Ui,
        _response: &egui::Response,
        projector: &Projector,
        _map_memory: &walkers::MapMemory,
    ) {
        profiling::scope!("TrailPlugin::run");
        let painter = ui.painter();

        for edge in self.graph.edges() {
            let points: Vec<Pos2> = self
                .graph
                .edge_polyline(edge)
                .into_iter()
                .map(|c| to_screen(projector, c))
                .collect();
            if points.len() < 2 {
                continue;
            }

            let (color, width) = if is_highlighted(edge, self.highlight.as_ref()) {
                (TRAIL_HIGHLIGHT_COLOR, self.width * 1.5)
            } else {
                (TRAIL_COLOR, self.width)
            };
            let stroke = Stroke::new(width, color);

            if edge.bidirectional {
                painter.add(egui::Shape::line(points, stroke));
            } else {
                // One-way trails are dashed
                painter.extend(egui::Shape::dashed_line(
                    &points,
                    stroke,
                    width * 3.0,
                    width * 2.0,
                ));
            }
        }

        if self.show_nodes {
            for point in self.graph.points() {
                let pos = to_screen(projector, point.coordinate());
                painter.circle_filled(pos, self.width * 0.9, NODE_COLOR);
            }
        }
    }
}

/// Point-of-interest markers with zoom-dependent labels
pub struct PoiPlugin {
    graph: Arc<TrailGraph>,
    region: Region,
    filter: Option<MapPointType>,
    selected: Option<String>,
    feedback: SharedFeedback,
}

impl PoiPlugin {
    pub fn new(graph: Arc<TrailGraph>, region: Region, feedback: SharedFeedback) -> Self {
        Self {
            graph,
            region,
            filter: None,
            selected: None,
            feedback,
        }
    }

    pub fn with_filter(mut self, filter: Option<MapPointType>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_selected(mut self, selected: Option<String>) -> Self {
        self.selected = selected;
        self
    }
}

impl Plugin for PoiPlugin {
    fn run(
        self: Box<Self>,
        ui: &mut egui::Ui,
        response: &egui::Response,
        projector: &Projector,
        _map_memory: &walkers::MapMemory,
    ) {
        profiling::scope!("PoiPlugin::run");
        let painter = ui.painter();
        let text_color = ui.visuals().strong_text_color();

        let appearances: Vec<_> = marker_appearances(self.graph.map_points(), &self.region)
            .into_iter()
            .filter(|m| self.filter.is_none_or(|kind| kind == m.map_point.kind))
            .collect();
        let positions: Vec<Pos2> = appearances
            .iter()
            .map(|m| to_screen(projector, m.map_point.coordinate()))
            .collect();

        for (marker, &pos) in appearances.iter().zip(&positions) {
            if !response.rect.expand(SELECTED_MARKER_RADIUS).contains(pos) {
                continue;
            }
            let selected = self.selected.as_deref() == Some(marker.map_point.id.as_str());
            let radius = if selected {
                SELECTED_MARKER_RADIUS
            } else {
                MARKER_RADIUS
            };

            painter.circle_filled(pos, radius, to_color(marker.style.fill));
            painter.circle_stroke(
                pos,
                radius,
                Stroke::new(if selected { 3.0 } else { 2.0 }, to_color(marker.style.border)),
            );
            painter.text(
                pos,
                egui::Align2::CENTER_CENTER,
                marker.style.icon,
                FontId::proportional(radius * 1.1),
                Color32::WHITE,
            );

            if marker.show_label || selected {
                painter.text(
                    pos + Vec2::new(0.0, radius + 2.0),
                    egui::Align2::CENTER_TOP,
                    &marker.map_point.name,
                    FontId::proportional(12.0),
                    text_color,
                );
            }
        }

        if response.clicked()
            && let Some(pointer) = response.interact_pointer_pos()
            && let Some(index) = pick_marker(&positions, pointer, MARKER_RADIUS + PICK_SLACK)
        {
            let id = appearances[index].map_point.id.clone();
            tracing::debug!("Marker pressed: {id}");
            lock_feedback(&self.feedback).clicked_poi = Some(id);
        }
    }
}

/// Live position: pulse halo, accuracy ring and heading wedge
pub struct UserLocationPlugin {
    layers: MarkerLayers,
}

impl UserLocationPlugin {
    pub fn new(layers: MarkerLayers) -> Self {
        Self { layers }
    }
}

impl Plugin for UserLocationPlugin {
    fn run(
        self: Box<Self>,
        ui: &mut egui::Ui,
        _response: &egui::Response,
        projector: &Projector,
        _map_memory: &walkers::MapMemory,
    ) {
        profiling::scope!("UserLocationPlugin::run");
        let painter = ui.painter();
        let center_coordinate = self.layers.center;
        let center = to_screen(projector, center_coordinate);

        if let Some(accuracy_m) = self.layers.accuracy_radius_m {
            let edge = Coordinate::new(
                center_coordinate.latitude + meters_to_latitude_degrees(accuracy_m),
                center_coordinate.longitude,
            );
            let radius = center.distance(to_screen(projector, edge));
            painter.circle(
                center,
                radius,
                USER_COLOR.gamma_multiply(0.12),
                Stroke::new(1.0, USER_COLOR.gamma_multiply(0.5)),
            );
        }

        if let Some(pulse) = self.layers.pulse {
            painter.circle_filled(
                center,
                USER_DOT_RADIUS * pulse.scale,
                USER_COLOR.gamma_multiply(pulse.opacity),
            );
        }

        if let Some(heading) = self.layers.heading_deg {
            painter.add(egui::Shape::convex_polygon(
                heading_wedge(center, heading).to_vec(),
                USER_COLOR,
                Stroke::new(1.0, Color32::WHITE),
            ));
        }

        painter.circle_filled(center, USER_DOT_RADIUS + 2.0, Color32::WHITE);
        painter.circle_filled(center, USER_DOT_RADIUS, USER_COLOR);
    }
}

/// Reports the visible region back to the app
pub struct ViewportPlugin {
    feedback: SharedFeedback,
}

impl ViewportPlugin {
    pub fn new(feedback: SharedFeedback) -> Self {
        Self { feedback }
    }
}

impl Plugin for ViewportPlugin {
    fn run(
        self: Box<Self>,
        _ui: &mut egui::Ui,
        response: &egui::Response,
        projector: &Projector,
        _map_memory: &walkers::MapMemory,
    ) {
        let rect = response.rect;
        let top_left = projector.unproject(rect.min.to_vec2());
        let bottom_right = projector.unproject(rect.max.to_vec2());
        lock_feedback(&self.feedback).region = Some(region_from_corners(top_left, bottom_right));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_follows_attachment() {
        let edge = Edge::new("e1", "a", "b");
        assert!(!is_highlighted(&edge, None));
        assert!(is_highlighted(&edge, Some(&Attachment::Edge("e1".into()))));
        assert!(!is_highlighted(&edge, Some(&Attachment::Edge("e2".into()))));
        assert!(is_highlighted(&edge, Some(&Attachment::Node("b".into()))));
        assert!(!is_highlighted(&edge, Some(&Attachment::Node("c".into()))));
    }

    #[test]
    fn test_pick_marker_prefers_closest() {
        let markers = [Pos2::new(0.0, 0.0), Pos2::new(10.0, 0.0), Pos2::new(100.0, 0.0)];
        assert_eq!(pick_marker(&markers, Pos2::new(7.0, 0.0), 15.0), Some(1));
        assert_eq!(pick_marker(&markers, Pos2::new(2.0, 1.0), 15.0), Some(0));
        assert_eq!(pick_marker(&markers, Pos2::new(50.0, 0.0), 15.0), None);
        assert_eq!(pick_marker(&[], Pos2::ZERO, 15.0), None);
    }

    #[test]
    fn test_heading_wedge_points_along_heading() {
        let center = Pos2::new(100.0, 100.0);

        let [tip, ..] = heading_wedge(center, 0.0);
        assert!((tip.x - 100.0).abs() < 1e-3);
        assert!(tip.y < 100.0, "north is up on screen");

        let [tip, ..] = heading_wedge(center, 90.0);
        assert!(tip.x > 100.0, "east is right on screen");
        assert!((tip.y - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_feedback_survives_poisoning() {
        let feedback: SharedFeedback = Arc::default();
        let clone = Arc::clone(&feedback);
        let _ = std::thread::spawn(move || {
            let _guard = lock_feedback(&clone);
            panic!("poison the lock");
        })
        .join();
        lock_feedback(&feedback).clicked_poi = Some("poi".into());
        assert_eq!(lock_feedback(&feedback).clicked_poi.as_deref(), Some("poi"));
    }
}
