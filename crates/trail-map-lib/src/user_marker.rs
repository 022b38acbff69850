//! Live-position indicator
//!
//! The marker is a looping pulse around the visitor's position, with an
//! optional accuracy ring and an optional heading wedge. Time is passed in
//! explicitly (milliseconds since an arbitrary epoch), so the animation is
//! deterministic and the renderer decides when to repaint.

use crate::graph::Coordinate;
use crate::location::UserLocation;

/// Length of one pulse cycle
pub const PULSE_PERIOD_MS: f64 = 1500.0;

/// How long the marker glides to a new fix
pub const GLIDE_MS: f64 = 300.0;

const PULSE_MAX_SCALE: f32 = 2.0;
const PULSE_START_OPACITY: f32 = 0.4;

/// One frame of the pulse halo
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PulseFrame {
    /// Halo radius relative to the dot, 1.0 to 2.0
    pub scale: f32,
    /// Halo opacity, 0.4 down to 0.0
    pub opacity: f32,
}

/// Indefinitely repeating pulse, stopped only by [`PulseAnimation::dispose`]
#[derive(Clone, Debug)]
pub struct PulseAnimation {
    started_at_ms: f64,
    period_ms: f64,
    disposed: bool,
}

impl PulseAnimation {
    pub fn start(now_ms: f64) -> Self {
        Self::with_period(now_ms, PULSE_PERIOD_MS)
    }

    pub fn with_period(now_ms: f64, period_ms: f64) -> Self {
        Self {
            started_at_ms: now_ms,
            period_ms: period_ms.max(1.0),
            disposed: false,
        }
    }

    /// Frame at `now_ms`, or `None` once disposed
    pub fn frame(&self, now_ms: f64) -> Option<PulseFrame> {
        if self.disposed {
            return None;
        }
        let elapsed = (now_ms - self.started_at_ms).max(0.0);
        let phase = (elapsed % self.period_ms / self.period_ms) as f32;
        Some(PulseFrame {
            scale: 1.0 + (PULSE_MAX_SCALE - 1.0) * phase,
            opacity: PULSE_START_OPACITY * (1.0 - phase),
        })
    }

    pub fn is_running(&self) -> bool {
        !self.disposed
    }

    /// Break the loop; every later frame is `None`
    pub fn dispose(&mut self) {
        self.disposed = true;
    }
}

/// Layers to draw for the current frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerLayers {
    pub center: Coordinate,
    pub pulse: Option<PulseFrame>,
    /// Accuracy ring radius in meters; absent when no usable accuracy was reported
    pub accuracy_radius_m: Option<f64>,
    /// Wedge rotation in degrees, `[0, 360)`; absent without a usable heading
    pub heading_deg: Option<f64>,
}

#[derive(Clone, Copy, Debug)]
struct Glide {
    from: Coordinate,
    started_at_ms: f64,
}

/// Animated indicator for the visitor's live position
#[derive(Debug)]
pub struct UserLocationMarker {
    pulse: PulseAnimation,
    target: Option<Coordinate>,
    glide: Option<Glide>,
    accuracy_radius_m: Option<f64>,
    heading_deg: Option<f64>,
}

impl UserLocationMarker {
    pub fn new(now_ms: f64) -> Self {
        Self {
            pulse: PulseAnimation::start(now_ms),
            target: None,
            glide: None,
            accuracy_radius_m: None,
            heading_deg: None,
        }
    }

    /// Point the marker at a new fix (or hide it with `None`)
    pub fn set_location(&mut self, location: Option<&UserLocation>, now_ms: f64) {
        let Some(location) = location else {
            self.target = None;
            self.glide = None;
            self.accuracy_radius_m = None;
            self.heading_deg = None;
            return;
        };

        let next = location.coordinate();
        match self.target {
            Some(previous) if previous != next => {
                let from = self.position(now_ms).unwrap_or(previous);
                self.glide = Some(Glide {
                    from,
                    started_at_ms: now_ms,
                });
            }
            Some(_) => {}
            None => self.glide = None,
        }
        self.target = Some(next);
        self.accuracy_radius_m = location.accuracy.filter(|a| a.is_finite() && *a >= 0.0);
        self.heading_deg = location
            .heading
            .filter(|h| h.is_finite() && *h >= 0.0)
            .map(|h| h.rem_euclid(360.0));
    }

    /// Displayed position, including an in-progress glide
    pub fn position(&self, now_ms: f64) -> Option<Coordinate> {
        let target = self.target?;
        match self.glide {
            Some(glide) => {
                let t = ((now_ms - glide.started_at_ms) / GLIDE_MS).clamp(0.0, 1.0);
                if t >= 1.0 {
                    Some(target)
                } else {
                    Some(glide.from.lerp(target, crate::utils::ease_out_cubic(t)))
                }
            }
            None => Some(target),
        }
    }

    /// Whether the marker still needs repaints
    pub fn is_animating(&self) -> bool {
        self.target.is_some() && self.pulse.is_running()
    }

    pub fn layers(&self, now_ms: f64) -> Option<MarkerLayers> {
        Some(MarkerLayers {
            center: self.position(now_ms)?,
            pulse: self.pulse.frame(now_ms),
            accuracy_radius_m: self.accuracy_radius_m,
            heading_deg: self.heading_deg,
        })
    }

    pub fn dispose(&mut self) {
        self.pulse.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(accuracy: Option<f64>, heading: Option<f64>) -> UserLocation {
        UserLocation {
            accuracy,
            heading,
            ..UserLocation::new(16.0, 108.0, 1)
        }
    }

    #[test]
    fn test_pulse_curve() {
        let pulse = PulseAnimation::with_period(0.0, 1000.0);

        let start = pulse.frame(0.0).unwrap();
        assert_eq!(start.scale, 1.0);
        assert!((start.opacity - 0.4).abs() < 1e-6);

        let half = pulse.frame(500.0).unwrap();
        assert!((half.scale - 1.5).abs() < 1e-6);
        assert!((half.opacity - 0.2).abs() < 1e-6);

        // Wraps around instead of clamping
        let wrapped = pulse.frame(1250.0).unwrap();
        assert!((wrapped.scale - 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_pulse_stops_after_dispose() {
        let mut pulse = PulseAnimation::start(0.0);
        assert!(pulse.is_running());
        pulse.dispose();
        assert!(!pulse.is_running());
        assert!(pulse.frame(10.0).is_none());
    }

    #[test]
    fn test_hidden_without_location() {
        let marker = UserLocationMarker::new(0.0);
        assert!(marker.layers(0.0).is_none());
        assert!(!marker.is_animating());
    }

    #[test]
    fn test_absent_accuracy_and_heading_omit_layers() {
        let mut marker = UserLocationMarker::new(0.0);
        marker.set_location(Some(&location(None, None)), 0.0);
        let layers = marker.layers(0.0).unwrap();
        assert!(layers.accuracy_radius_m.is_none());
        assert!(layers.heading_deg.is_none());
        assert!(layers.pulse.is_some());
    }

    #[test]
    fn test_garbage_values_omit_layers() {
        let mut marker = UserLocationMarker::new(0.0);
        marker.set_location(Some(&location(Some(f64::NAN), Some(-1.0))), 0.0);
        let layers = marker.layers(0.0).unwrap();
        assert!(layers.accuracy_radius_m.is_none());
        assert!(layers.heading_deg.is_none());
    }

    #[test]
    fn test_accuracy_boundaries() {
        let mut marker = UserLocationMarker::new(0.0);
        marker.set_location(Some(&location(Some(0.0), None)), 0.0);
        assert_eq!(marker.layers(0.0).unwrap().accuracy_radius_m, Some(0.0));

        marker.set_location(Some(&location(Some(-0.5), None)), 0.0);
        assert!(marker.layers(0.0).unwrap().accuracy_radius_m.is_none());

        marker.set_location(Some(&location(Some(f64::INFINITY), None)), 0.0);
        assert!(marker.layers(0.0).unwrap().accuracy_radius_m.is_none());
    }

    #[test]
    fn test_layers_from_reported_values() {
        let mut marker = UserLocationMarker::new(0.0);
        marker.set_location(Some(&location(Some(12.5), Some(450.0))), 0.0);
        let layers = marker.layers(0.0).unwrap();
        assert_eq!(layers.accuracy_radius_m, Some(12.5));
        assert_eq!(layers.heading_deg, Some(90.0));
    }

    #[test]
    fn test_glides_to_new_fix() {
        let mut marker = UserLocationMarker::new(0.0);
        marker.set_location(Some(&location(None, None)), 0.0);

        let moved = UserLocation::new(16.001, 108.0, 2);
        marker.set_location(Some(&moved), 1000.0);

        let start = marker.position(1000.0).unwrap();
        assert_eq!(start, Coordinate::new(16.0, 108.0));
        let mid = marker.position(1000.0 + GLIDE_MS / 2.0).unwrap();
        assert!(mid.latitude > 16.0 && mid.latitude < 16.001);
        assert_eq!(
            marker.position(1000.0 + GLIDE_MS).unwrap(),
            moved.coordinate()
        );
    }

    #[test]
    fn test_clearing_location_hides_marker() {
        let mut marker = UserLocationMarker::new(0.0);
        marker.set_location(Some(&location(Some(5.0), Some(10.0))), 0.0);
        marker.set_location(None, 10.0);
        assert!(marker.layers(10.0).is_none());
    }

    #[test]
    fn test_dispose_stops_pulse_but_keeps_position() {
        let mut marker = UserLocationMarker::new(0.0);
        marker.set_location(Some(&location(None, None)), 0.0);
        marker.dispose();
        let layers = marker.layers(5.0).unwrap();
        assert!(layers.pulse.is_none());
        assert!(!marker.is_animating());
    }
}
