//! Simulated location service
//!
//! [`ReplayPlatform`] stands in for the OS location service on machines
//! without GPS. It walks along a GPX track at a multiple of walking pace, or
//! sits still at a fixed coordinate, and answers the permission prompt the
//! way it was configured to.

use eframe_entrypoints::async_runtime;
use std::future::Future;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use trail_map_lib::{
    AccuracyTier, Coordinate, LocationError, LocationPlatform, LocationSink,
    LocationSubscription, PermissionStatus, TrackingOptions, UserLocation,
};

/// Average walking pace
pub const WALKING_SPEED_MPS: f64 = 1.4;

/// Fastest emission rate the replay will honour
const MIN_TICK_MS: u64 = 50;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GPX parsing error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),

    #[error("GPX file has no track or route points")]
    Empty,
}

/// A polyline with cumulative distances, sampled by distance walked
#[derive(Clone, Debug)]
pub struct ReplayTrack {
    points: Vec<Coordinate>,
    /// Distance from the first point to each point, in meters
    cumulative_m: Vec<f64>,
}

impl ReplayTrack {
    pub fn new(points: Vec<Coordinate>) -> Result<Self, ReplayError> {
        if points.is_empty() {
            return Err(ReplayError::Empty);
        }
        let mut cumulative_m = Vec::with_capacity(points.len());
        let mut total = 0.0;
        cumulative_m.push(0.0);
        for pair in points.windows(2) {
            total += pair[0].distance_to(&pair[1]);
            cumulative_m.push(total);
        }
        Ok(Self {
            points,
            cumulative_m,
        })
    }

    /// Track points first, then route points
    pub fn from_gpx(gpx: &gpx::Gpx) -> Result<Self, ReplayError> {
        let track_points = gpx
            .tracks
            .iter()
            .flat_map(|track| &track.segments)
            .flat_map(|segment| &segment.points);
        let route_points = gpx.routes.iter().flat_map(|route| &route.points);

        let points: Vec<Coordinate> = track_points
            .chain(route_points)
            .map(|waypoint| {
                let point = waypoint.point();
                Coordinate::new(point.y(), point.x())
            })
            .collect();
        Self::new(points)
    }

    pub fn from_path(path: &Path) -> Result<Self, ReplayError> {
        let file = std::fs::File::open(path)?;
        let gpx = gpx::read(BufReader::new(file))?;
        let track = Self::from_gpx(&gpx)?;
        tracing::info!(
            "Loaded replay track {} ({} points, {:.0} m)",
            path.display(),
            track.points.len(),
            track.length_m()
        );
        Ok(track)
    }

    pub fn length_m(&self) -> f64 {
        self.cumulative_m.last().copied().unwrap_or(0.0)
    }

    /// Position and direction of travel after walking `distance_m`.
    ///
    /// The walk wraps around to the start once the end is reached.
    pub fn sample(&self, distance_m: f64) -> (Coordinate, Option<f64>) {
        let length = self.length_m();
        if self.points.len() < 2 || length <= 0.0 {
            return (self.points[0], None);
        }
        let d = distance_m.max(0.0) % length;
        // Index of the segment containing `d`
        let i = self
            .cumulative_m
            .partition_point(|&c| c <= d)
            .clamp(1, self.points.len() - 1)
            - 1;
        let (a, b) = (self.points[i], self.points[i + 1]);
        let span = self.cumulative_m[i + 1] - self.cumulative_m[i];
        let t = if span > 0.0 {
            (d - self.cumulative_m[i]) / span
        } else {
            0.0
        };
        (a.lerp(b, t), Some(bearing_degrees(a, b)))
    }
}

/// Initial great-circle bearing from `a` to `b`, degrees clockwise from north
pub fn bearing_degrees(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let dlon = (b.longitude - a.longitude).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// Simulated horizontal accuracy for a requested tier
pub fn simulated_accuracy_m(tier: AccuracyTier) -> f64 {
    match tier {
        AccuracyTier::Lowest => 3000.0,
        AccuracyTier::Low => 1000.0,
        AccuracyTier::Balanced => 100.0,
        AccuracyTier::High => 10.0,
        AccuracyTier::Highest => 5.0,
        AccuracyTier::BestForNavigation => 3.0,
    }
}

#[derive(Clone, Debug)]
enum ReplaySource {
    Fixed(Coordinate),
    Track { track: ReplayTrack, speed_mps: f64 },
}

/// Position source shared with the emission task
#[derive(Clone, Debug)]
struct Replay {
    source: ReplaySource,
    started_at: Instant,
}

impl Replay {
    fn fix_at(&self, now: Instant, accuracy: AccuracyTier) -> UserLocation {
        let elapsed = now.saturating_duration_since(self.started_at);
        let (coordinate, heading, speed) = match &self.source {
            ReplaySource::Fixed(coordinate) => (*coordinate, None, Some(0.0)),
            ReplaySource::Track { track, speed_mps } => {
                let (coordinate, heading) = track.sample(elapsed.as_secs_f64() * speed_mps);
                (coordinate, heading, Some(*speed_mps))
            }
        };
        UserLocation {
            accuracy: Some(simulated_accuracy_m(accuracy)),
            heading,
            speed,
            ..UserLocation::new(coordinate.latitude, coordinate.longitude, unix_millis())
        }
    }
}

fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Location service backed by a replayed track or a fixed position
pub struct ReplayPlatform {
    replay: Replay,
    permission: Mutex<PermissionStatus>,
    prompt_answer: PermissionStatus,
}

impl ReplayPlatform {
    /// Sit still at `coordinate`
    pub fn fixed(coordinate: Coordinate, prompt_answer: PermissionStatus) -> Self {
        Self::with_source(ReplaySource::Fixed(coordinate), prompt_answer)
    }

    /// Walk along `track` at `speed` times walking pace
    pub fn track(track: ReplayTrack, speed: f64, prompt_answer: PermissionStatus) -> Self {
        let speed_mps = WALKING_SPEED_MPS * speed.max(0.0);
        Self::with_source(ReplaySource::Track { track, speed_mps }, prompt_answer)
    }

    fn with_source(source: ReplaySource, prompt_answer: PermissionStatus) -> Self {
        Self {
            replay: Replay {
                source,
                started_at: Instant::now(),
            },
            permission: Mutex::new(PermissionStatus::Undetermined),
            prompt_answer,
        }
    }

    fn status(&self) -> PermissionStatus {
        *self.permission.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to the emission task; cancelling aborts it
pub struct ReplaySubscription {
    task: tokio::task::JoinHandle<()>,
}

impl LocationSubscription for ReplaySubscription {
    fn cancel(self) {
        self.task.abort();
        tracing::debug!("Replay subscription cancelled");
    }
}

impl LocationPlatform for ReplayPlatform {
    type Subscription = ReplaySubscription;

    fn permission_status(&self) -> PermissionStatus {
        self.status()
    }

    fn request_permission(&self) -> impl Future<Output = PermissionStatus> + Send {
        let mut permission = self.permission.lock().unwrap_or_else(PoisonError::into_inner);
        // Like the OS, only an undetermined permission shows a prompt
        if *permission == PermissionStatus::Undetermined {
            *permission = self.prompt_answer;
            tracing::info!("Simulated permission prompt answered: {:?}", *permission);
        }
        std::future::ready(*permission)
    }

    fn current_position(
        &self,
        accuracy: AccuracyTier,
    ) -> impl Future<Output = Result<UserLocation, LocationError>> + Send {
        let result = match self.status() {
            PermissionStatus::Granted => Ok(self.replay.fix_at(Instant::now(), accuracy)),
            PermissionStatus::Denied => Err(LocationError::PermissionDenied),
            PermissionStatus::Undetermined => Err(LocationError::PermissionUndetermined),
        };
        std::future::ready(result)
    }

    fn watch_position(
        &self,
        options: &TrackingOptions,
        sink: LocationSink,
    ) -> Result<Self::Subscription, LocationError> {
        if !async_runtime::in_runtime_context() {
            return Err(LocationError::AcquisitionFailed(
                "no async runtime for the replay task".to_string(),
            ));
        }

        let replay = self.replay.clone();
        let accuracy = options.accuracy;
        let min_distance = options.min_distance_meters.max(0.0);
        let period = Duration::from_millis(options.min_time_interval_ms.max(MIN_TICK_MS));

        let task = async_runtime::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last_emitted: Option<Coordinate> = None;
            loop {
                let now = ticks.tick().await;
                let fix = replay.fix_at(now, accuracy);
                let moved_enough = last_emitted
                    .is_none_or(|last| last.distance_to(&fix.coordinate()) >= min_distance);
                if moved_enough {
                    last_emitted = Some(fix.coordinate());
                    sink(fix);
                }
            }
        });

        tracing::debug!("Replay subscription opened (every {period:?}, {min_distance} m)");
        Ok(ReplaySubscription { task })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use trail_map_lib::LocationTracker;

    const TRACK_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><name>walk</name><trkseg>
    <trkpt lat="16.0000" lon="108.0000"></trkpt>
    <trkpt lat="16.0000" lon="108.0010"></trkpt>
    <trkpt lat="16.0010" lon="108.0010"></trkpt>
  </trkseg></trk>
</gpx>"#;

    fn track() -> ReplayTrack {
        let gpx = gpx::read(BufReader::new(TRACK_GPX.as_bytes())).unwrap();
        ReplayTrack::from_gpx(&gpx).unwrap()
    }

    fn collecting_sink() -> (LocationSink, mpsc::UnboundedReceiver<UserLocation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink: LocationSink = Box::new(move |location| {
            let _ = tx.send(location);
        });
        (sink, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<UserLocation>) -> Vec<UserLocation> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[test]
    fn test_track_from_gpx() {
        let track = track();
        assert_eq!(track.points.len(), 3);
        // Two legs of roughly 107 m and 111 m
        assert!((track.length_m() - 218.0).abs() < 3.0);
    }

    #[test]
    fn test_empty_gpx_rejected() {
        let gpx = gpx::read(BufReader::new(
            r#"<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1"></gpx>"#
                .as_bytes(),
        ))
        .unwrap();
        assert!(matches!(
            ReplayTrack::from_gpx(&gpx),
            Err(ReplayError::Empty)
        ));
    }

    #[test]
    fn test_sample_interpolates_and_wraps() {
        let track = track();
        let first_leg = track.cumulative_m[1];

        let (start, heading) = track.sample(0.0);
        assert_eq!(start, Coordinate::new(16.0, 108.0));
        // First leg heads east
        assert!((heading.unwrap() - 90.0).abs() < 0.1);

        let (mid, _) = track.sample(first_leg / 2.0);
        assert!((mid.longitude - 108.0005).abs() < 1e-9);

        let (_, heading) = track.sample(first_leg + 1.0);
        // Second leg heads north
        assert!(heading.unwrap() < 0.1 || heading.unwrap() > 359.9);

        let (wrapped, _) = track.sample(track.length_m() + first_leg / 2.0);
        assert!((wrapped.longitude - mid.longitude).abs() < 1e-9);
    }

    #[test]
    fn test_single_point_track_has_no_heading() {
        let track = ReplayTrack::new(vec![Coordinate::new(1.0, 2.0)]).unwrap();
        assert_eq!(track.sample(50.0), (Coordinate::new(1.0, 2.0), None));
    }

    #[test]
    fn test_bearing() {
        let origin = Coordinate::new(0.0, 0.0);
        assert!((bearing_degrees(origin, Coordinate::new(1.0, 0.0)) - 0.0).abs() < 1e-9);
        assert!((bearing_degrees(origin, Coordinate::new(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((bearing_degrees(origin, Coordinate::new(-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((bearing_degrees(origin, Coordinate::new(0.0, -1.0)) - 270.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_prompt_answered_once() {
        let platform = ReplayPlatform::fixed(Coordinate::new(16.0, 108.0), PermissionStatus::Denied);
        assert_eq!(platform.permission_status(), PermissionStatus::Undetermined);
        assert_eq!(
            platform.current_position(AccuracyTier::High).await,
            Err(LocationError::PermissionUndetermined)
        );

        assert_eq!(platform.request_permission().await, PermissionStatus::Denied);
        assert_eq!(
            platform.current_position(AccuracyTier::High).await,
            Err(LocationError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn test_fixed_position_snapshot() {
        let platform =
            ReplayPlatform::fixed(Coordinate::new(16.0, 108.0), PermissionStatus::Granted);
        platform.request_permission().await;

        let fix = platform.current_position(AccuracyTier::Balanced).await.unwrap();
        assert_eq!(fix.coordinate(), Coordinate::new(16.0, 108.0));
        assert_eq!(fix.accuracy, Some(100.0));
        assert_eq!(fix.heading, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_position_emits_once_with_distance_filter() {
        let platform =
            ReplayPlatform::fixed(Coordinate::new(16.0, 108.0), PermissionStatus::Granted);
        let (sink, mut rx) = collecting_sink();
        let subscription = platform
            .watch_position(&TrackingOptions::default(), sink)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5500)).await;
        assert_eq!(drain(&mut rx).len(), 1);
        subscription.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_track_emits_every_interval_in_order() {
        let platform = ReplayPlatform::track(track(), 1.0, PermissionStatus::Granted);
        let (sink, mut rx) = collecting_sink();
        let subscription = platform
            .watch_position(&TrackingOptions::default(), sink)
            .unwrap();

        // Ticks at 0, 1, 2 and 3 seconds
        tokio::time::sleep(Duration::from_millis(3500)).await;
        let fixes = drain(&mut rx);
        assert_eq!(fixes.len(), 4);
        assert!(
            fixes
                .windows(2)
                .all(|pair| pair[0].longitude < pair[1].longitude)
        );
        assert_eq!(fixes[0].speed, Some(WALKING_SPEED_MPS));

        subscription.cancel();
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_watch_without_runtime_fails() {
        let platform =
            ReplayPlatform::fixed(Coordinate::new(16.0, 108.0), PermissionStatus::Granted);
        let (sink, _rx) = collecting_sink();
        assert!(matches!(
            platform.watch_position(&TrackingOptions::default(), sink),
            Err(LocationError::AcquisitionFailed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracker_over_replay() {
        let platform = Arc::new(ReplayPlatform::track(track(), 2.0, PermissionStatus::Granted));
        let mut tracker = LocationTracker::new(platform);

        assert!(tracker.request_permission().await);
        assert!(tracker.start_tracking(TrackingOptions::default()));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let updates = tracker.drain_updates();
        assert_eq!(updates.len(), 3);
        assert_eq!(tracker.location(), updates.last().cloned());

        tracker.stop_tracking();
        assert!(!tracker.is_tracking());
        assert!(tracker.location().is_none());
    }
}
