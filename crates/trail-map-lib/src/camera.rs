//! Camera follow state machine
//!
//! [`FollowCameraController`] decides when the map camera should move to the
//! visitor's position. It starts in [`FollowState::Free`]; the follow toggle
//! enters [`FollowState::Following`], and any manual drag leaves it again.
//! The controller only reads locations it is handed and never owns the
//! location subscription.

use crate::graph::Coordinate;
use crate::location::UserLocation;
use crate::utils;

/// Default duration of follow animations
pub const FOLLOW_ANIMATION_MS: u32 = 500;

/// A visible map area: center plus latitude/longitude span
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl Region {
    pub fn new(latitude: f64, longitude: f64, latitude_delta: f64, longitude_delta: f64) -> Self {
        Self {
            latitude,
            longitude,
            latitude_delta,
            longitude_delta,
        }
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Same span, new center
    pub fn recentered(&self, center: Coordinate) -> Self {
        Self {
            latitude: center.latitude,
            longitude: center.longitude,
            ..*self
        }
    }

    /// `log2(360 / longitude_delta)`
    pub fn zoom(&self) -> f64 {
        utils::zoom_for_longitude_delta(self.longitude_delta)
    }

    pub fn labels_visible(&self) -> bool {
        utils::labels_visible(self.longitude_delta)
    }

    /// Linear interpolation of center and span
    pub fn lerp(&self, other: &Region, t: f64) -> Region {
        let center = self.center().lerp(other.center(), t);
        Region {
            latitude: center.latitude,
            longitude: center.longitude,
            latitude_delta: self.latitude_delta + (other.latitude_delta - self.latitude_delta) * t,
            longitude_delta: self.longitude_delta
                + (other.longitude_delta - self.longitude_delta) * t,
        }
    }
}

/// Camera follow mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FollowState {
    Following,
    #[default]
    Free,
}

/// The map view's imperative camera API
pub trait MapViewTarget {
    /// Start an animated transition; a later call supersedes an in-flight one
    fn animate_to_region(&mut self, region: Region, duration_ms: u32);
}

/// Imperative camera contract exposed to the parent view
pub trait CameraHandle {
    fn animate_to_region(&mut self, region: Region, duration_ms: u32);
    fn animate_to_coordinate(&mut self, coordinate: Coordinate, duration_ms: u32);
    fn set_follow_user(&mut self, follow: bool);
    fn is_following_user(&self) -> bool;
}

/// Reconciles automatic following with manual pan and zoom
pub struct FollowCameraController<T: MapViewTarget> {
    target: T,
    state: FollowState,
    /// Last viewport reported by the map, or the last region animated to
    region: Region,
    user_location: Option<UserLocation>,
    labels_visible: bool,
    animation_ms: u32,
}

impl<T: MapViewTarget> FollowCameraController<T> {
    pub fn new(target: T, initial_region: Region) -> Self {
        Self {
            target,
            state: FollowState::Free,
            region: initial_region,
            user_location: None,
            labels_visible: initial_region.labels_visible(),
            animation_ms: FOLLOW_ANIMATION_MS,
        }
    }

    pub fn with_animation_ms(mut self, animation_ms: u32) -> Self {
        self.animation_ms = animation_ms;
        self
    }

    pub fn state(&self) -> FollowState {
        self.state
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Whether marker labels should be drawn at the current zoom
    pub fn labels_visible(&self) -> bool {
        self.labels_visible
    }

    pub fn user_location(&self) -> Option<&UserLocation> {
        self.user_location.as_ref()
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// Flip follow mode; returns the new state
    pub fn toggle_follow(&mut self) -> FollowState {
        let follow = !self.is_following_user();
        self.set_follow_user(follow);
        self.state
    }

    /// A new fix from the tracker, in emission order
    pub fn on_user_location(&mut self, location: &UserLocation) {
        self.user_location = Some(location.clone());
        if self.state == FollowState::Following {
            self.animate_to_coordinate(location.coordinate(), self.animation_ms);
        }
    }

    /// Tracking stopped; following continues silently without a target
    pub fn clear_user_location(&mut self) {
        self.user_location = None;
    }

    /// The user dragged the map
    pub fn on_pan_drag(&mut self) {
        if self.state == FollowState::Following {
            tracing::debug!("Manual pan detected, leaving follow mode");
            self.state = FollowState::Free;
        }
    }

    /// The viewport settled after a change (user or animation)
    pub fn on_region_change_complete(&mut self, region: Region) {
        self.region = region;
        let visible = region.labels_visible();
        if visible != self.labels_visible {
            tracing::trace!("Marker labels visible: {visible} (zoom {:.2})", region.zoom());
        }
        self.labels_visible = visible;
    }
}

impl<T: MapViewTarget> CameraHandle for FollowCameraController<T> {
    fn animate_to_region(&mut self, region: Region, duration_ms: u32) {
        self.region = region;
        self.target.animate_to_region(region, duration_ms);
    }

    fn animate_to_coordinate(&mut self, coordinate: Coordinate, duration_ms: u32) {
        let region = self.region.recentered(coordinate);
        self.animate_to_region(region, duration_ms);
    }

    fn set_follow_user(&mut self, follow: bool) {
        match (self.state, follow) {
            (FollowState::Free, true) => {
                tracing::debug!("Entering follow mode");
                self.state = FollowState::Following;
                if let Some(coordinate) = self.user_location.as_ref().map(UserLocation::coordinate) {
                    self.animate_to_coordinate(coordinate, self.animation_ms);
                }
            }
            (FollowState::Following, false) => {
                tracing::debug!("Leaving follow mode");
                self.state = FollowState::Free;
            }
            _ => {}
        }
    }

    fn is_following_user(&self) -> bool {
        self.state == FollowState::Following
    }
}

/// A bounded-duration camera move, sampled by elapsed time
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraTransition {
    from: Region,
    to: Region,
    duration_ms: u32,
}

impl CameraTransition {
    pub fn new(from: Region, to: Region, duration_ms: u32) -> Self {
        Self {
            from,
            to,
            duration_ms,
        }
    }

    pub fn target(&self) -> Region {
        self.to
    }

    /// Region at `elapsed_ms` after the start, eased out
    pub fn sample(&self, elapsed_ms: f64) -> Region {
        if self.is_finished(elapsed_ms) {
            return self.to;
        }
        let t = utils::ease_out_cubic(elapsed_ms / self.duration_ms as f64);
        self.from.lerp(&self.to, t)
    }

    pub fn is_finished(&self, elapsed_ms: f64) -> bool {
        elapsed_ms >= self.duration_ms as f64
    }
}
