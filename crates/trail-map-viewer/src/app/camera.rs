//! Camera animation on top of walkers
//!
//! walkers moves the map instantly, so [`WalkersCamera`] keeps the active
//! [`CameraTransition`] and applies one sampled region per frame. It also
//! converts between walkers' tile zoom and the region spans the follow
//! controller works with.

use trail_map_lib::{CameraTransition, MapViewTarget, Region};
use walkers::{MapMemory, Position};

/// Pixel size of one map tile at integer zoom
const TILE_SIZE_PX: f64 = 256.0;

/// walkers zoom that shows `longitude_delta` degrees across `width_px` pixels
pub fn map_zoom_for_span(longitude_delta: f64, width_px: f64) -> f64 {
    (360.0 * width_px / (TILE_SIZE_PX * longitude_delta.max(f64::EPSILON))).log2()
}

/// Visible region from the unprojected viewport corners
pub fn region_from_corners(top_left: Position, bottom_right: Position) -> Region {
    let (north, south) = (top_left.y(), bottom_right.y());
    let (west, east) = (top_left.x(), bottom_right.x());
    Region::new(
        (north + south) / 2.0,
        (west + east) / 2.0,
        (north - south).abs(),
        (east - west).abs(),
    )
}

/// Region around a bounding box, padded and with a minimum span
pub fn region_for_bounds(bounds: geo::Rect<f64>, padding: f64, min_span: f64) -> Region {
    let center = bounds.center();
    Region::new(
        center.y,
        center.x,
        (bounds.height() * padding).max(min_span),
        (bounds.width() * padding).max(min_span),
    )
}

struct ActiveTransition {
    transition: CameraTransition,
    started_at_ms: f64,
}

/// [`MapViewTarget`] that animates a walkers [`MapMemory`]
pub struct WalkersCamera {
    /// Last region observed on screen
    current: Region,
    now_ms: f64,
    active: Option<ActiveTransition>,
}

impl WalkersCamera {
    pub fn new(initial: Region) -> Self {
        Self {
            current: initial,
            now_ms: 0.0,
            active: None,
        }
    }

    /// Advance the clock; transitions started this frame begin at `now_ms`
    pub fn set_time(&mut self, now_ms: f64) {
        self.now_ms = now_ms;
    }

    /// The region on screen, as reported by the map after drawing
    pub fn observe(&mut self, region: Region) {
        self.current = region;
    }

    pub fn current(&self) -> Region {
        self.current
    }

    pub fn is_animating(&self) -> bool {
        self.active.is_some()
    }

    /// Drop the transition in flight, leaving the map where it is
    pub fn interrupt(&mut self) {
        if self.active.take().is_some() {
            tracing::trace!("Camera transition interrupted");
        }
    }

    /// Region to show this frame, or `None` when no transition is running
    pub fn frame(&mut self) -> Option<Region> {
        let active = self.active.as_ref()?;
        let elapsed = self.now_ms - active.started_at_ms;
        let region = active.transition.sample(elapsed);
        if active.transition.is_finished(elapsed) {
            self.active = None;
        }
        Some(region)
    }

    /// Move walkers to this frame's region
    pub fn apply(&mut self, map_memory: &mut MapMemory, width_px: f32) {
        let Some(region) = self.frame() else {
            return;
        };
        map_memory.center_at(walkers::lat_lon(region.latitude, region.longitude));
        let zoom = map_zoom_for_span(region.longitude_delta, width_px.max(1.0) as f64);
        if map_memory.set_zoom(zoom).is_err() {
            tracing::debug!("Zoom {zoom:.2} out of range");
        }
    }
}

impl MapViewTarget for WalkersCamera {
    fn animate_to_region(&mut self, region: Region, duration_ms: u32) {
        let from = self.frame().unwrap_or(self.current);
        self.active = Some(ActiveTransition {
            transition: CameraTransition::new(from, region, duration_ms),
            started_at_ms: self.now_ms,
        });
    }
}
