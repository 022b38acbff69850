//! Trail Map Library - Core Model and Controllers for an Interactive Site Map
//!
//! This library holds everything about the site map that does not depend on a
//! UI toolkit: the static trail graph, the location tracker, the camera follow
//! state machine and the marker styling rules. The viewer crate plugs these
//! into a map widget.
//!
//! # Architecture
//!
//! - **[`TrailGraph`]**: Immutable points, edges and points of interest
//! - **[`LocationTracker`]**: Permission lifecycle and live position feed over a [`LocationPlatform`]
//! - **[`FollowCameraController`]**: Follow/free camera state machine over a [`MapViewTarget`]
//! - **[`markers`]**: Type-keyed marker styles and zoom-dependent labels
//! - **[`UserLocationMarker`]**: Pulse, accuracy ring and heading wedge for the live position
//!
//! # Data Flow
//!
//! The graph is loaded once with [`loader::load_shared`]. The tracker emits
//! fixes, which the view forwards to the camera controller and the user
//! marker; manual drags flow back into the controller.

mod camera;
mod graph;
pub mod loader;
mod location;
pub mod markers;
mod user_marker;
pub mod utils;

// Public API exports
pub use camera::{
    CameraHandle, CameraTransition, FOLLOW_ANIMATION_MS, FollowCameraController, FollowState,
    MapViewTarget, Region,
};
pub use graph::{
    Attachment, Coordinate, Edge, MapPoint, MapPointType, Point, PointKind, TrailGraph,
    ValidationReport, ValidationWarning,
};
pub use location::{
    AccuracyTier, LocationPlatform, LocationSink, LocationSubscription, LocationTracker,
    PermissionStatus, TrackerState, TrackingOptions, UserLocation,
};
pub use markers::{MarkerAppearance, MarkerStyle, Rgb, marker_style};
pub use user_marker::{MarkerLayers, PulseAnimation, PulseFrame, UserLocationMarker};

/// Errors raised while building or loading a trail graph
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown point key: {0}")]
    UnknownPointKey(String),

    #[error("Duplicate point key: {0}")]
    DuplicatePointKey(String),

    #[error("Duplicate point id: {0}")]
    DuplicatePointId(String),

    #[error("Duplicate edge id: {0}")]
    DuplicateEdgeId(String),

    #[error("Duplicate map point id: {0}")]
    DuplicateMapPointId(String),

    #[error("Edge {edge_id} references missing point {point_id}")]
    DanglingEdge { edge_id: String, point_id: String },

    #[error("Edge {edge_id} starts and ends at point {point_id}")]
    SelfLoop { edge_id: String, point_id: String },

    #[error("Edge {edge_id} shape has {vertices} vertices, needs at least 2")]
    DegenerateShape { edge_id: String, vertices: usize },

    #[error("Invalid coordinate for {id}: ({latitude}, {longitude})")]
    InvalidCoordinate {
        id: String,
        latitude: f64,
        longitude: f64,
    },
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// Location acquisition failures, surfaced to the UI as tracker state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location permission not yet requested")]
    PermissionUndetermined,

    #[error("Location unavailable (GPS disabled or no fix)")]
    LocationUnavailable,

    #[error("Failed to acquire location: {0}")]
    AcquisitionFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that the main entry points are accessible
        let _: fn() -> Result<TrailGraph> = loader::sample_site;
        let _: fn(MapPointType) -> &'static MarkerStyle = marker_style;
    }

    #[test]
    fn test_permission_denied_message() {
        assert_eq!(
            LocationError::PermissionDenied.to_string(),
            "Location permission denied"
        );
    }
}
