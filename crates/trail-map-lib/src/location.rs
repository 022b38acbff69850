//! Location permission lifecycle and live-position feed
//!
//! [`LocationTracker`] wraps a [`LocationPlatform`] (the OS location service,
//! or a simulator) and turns every platform failure into tracker state, so the
//! rendering code only ever reads a [`TrackerState`] snapshot.
//!
//! Continuous updates are pushed by the platform into a per-subscription
//! queue; the UI loop pulls them with [`LocationTracker::drain_updates`] in
//! emission order. At most one subscription is open at a time and it is
//! released on `stop_tracking`, on an options change, and on drop.

use crate::LocationError;
use crate::graph::Coordinate;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;

/// A single position fix. Each new fix replaces the previous one entirely.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters
    pub accuracy: Option<f64>,
    /// Degrees clockwise from true north
    pub heading: Option<f64>,
    /// Meters per second
    pub speed: Option<f64>,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl UserLocation {
    pub fn new(latitude: f64, longitude: f64, timestamp: u64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            heading: None,
            speed: None,
            timestamp,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Current grant state of the location permission
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    #[default]
    Undetermined,
}

/// Requested fix quality, from cheapest to most power-hungry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyTier {
    Lowest,
    Low,
    Balanced,
    #[default]
    High,
    Highest,
    BestForNavigation,
}

/// Options for a continuous position subscription
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingOptions {
    pub accuracy: AccuracyTier,
    /// Minimum time between emissions
    pub min_time_interval_ms: u64,
    /// Minimum movement between emissions
    pub min_distance_meters: f64,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            accuracy: AccuracyTier::High,
            min_time_interval_ms: 1000,
            min_distance_meters: 1.0,
        }
    }
}

/// Callback the platform invokes for every emitted fix
pub type LocationSink = Box<dyn Fn(UserLocation) + Send + Sync>;

/// Handle to an open position subscription.
///
/// `cancel` consumes the handle, so a subscription can be released only once.
pub trait LocationSubscription: Send {
    fn cancel(self);
}

/// The OS location service as seen by the tracker
pub trait LocationPlatform: Send + Sync + 'static {
    type Subscription: LocationSubscription;

    /// Current permission state, without prompting
    fn permission_status(&self) -> PermissionStatus;

    /// Prompt the user for permission
    fn request_permission(&self) -> impl Future<Output = PermissionStatus> + Send;

    /// One-shot position fix
    fn current_position(
        &self,
        accuracy: AccuracyTier,
    ) -> impl Future<Output = Result<UserLocation, LocationError>> + Send;

    /// Open a continuous subscription that feeds `sink`
    fn watch_position(
        &self,
        options: &TrackingOptions,
        sink: LocationSink,
    ) -> Result<Self::Subscription, LocationError>;
}

/// Snapshot of tracker state for rendering
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackerState {
    pub location: Option<UserLocation>,
    pub error: Option<String>,
    pub is_loading: bool,
    pub is_tracking: bool,
    pub permission: PermissionStatus,
}

/// State shared with in-flight permission and one-shot requests
#[derive(Debug, Default)]
struct Shared {
    location: Option<UserLocation>,
    error: Option<String>,
    is_loading: bool,
    permission: PermissionStatus,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Apply `f` if the owning tracker is still alive
fn update_if_alive(shared: &Weak<Mutex<Shared>>, f: impl FnOnce(&mut Shared)) -> bool {
    match shared.upgrade() {
        Some(shared) => {
            f(&mut lock(&shared));
            true
        }
        None => false,
    }
}

struct ActiveWatch<S> {
    subscription: S,
    options: TrackingOptions,
    updates: mpsc::UnboundedReceiver<UserLocation>,
}

/// Owns the permission lifecycle and at most one position subscription
pub struct LocationTracker<P: LocationPlatform> {
    platform: Arc<P>,
    shared: Arc<Mutex<Shared>>,
    active: Option<ActiveWatch<P::Subscription>>,
}

impl<P: LocationPlatform> LocationTracker<P> {
    pub fn new(platform: Arc<P>) -> Self {
        Self {
            platform,
            shared: Arc::new(Mutex::new(Shared::default())),
            active: None,
        }
    }

    /// Inspect the grant state without prompting
    pub fn check_permission(&self) -> PermissionStatus {
        let status = self.platform.permission_status();
        lock(&self.shared).permission = status;
        status
    }

    /// Prompt for permission; resolves to `true` when granted.
    ///
    /// The returned future does not borrow the tracker. If the tracker is
    /// dropped before it resolves, the answer is not recorded anywhere.
    pub fn request_permission(&self) -> impl Future<Output = bool> + Send + use<P> {
        let platform = Arc::clone(&self.platform);
        let shared = Arc::downgrade(&self.shared);
        async move {
            let status = platform.request_permission().await;
            let granted = status == PermissionStatus::Granted;
            let alive = update_if_alive(&shared, |s| {
                s.permission = status;
                s.error = if granted {
                    None
                } else {
                    Some(LocationError::PermissionDenied.to_string())
                };
            });
            if !alive {
                tracing::debug!("Tracker dropped before permission prompt resolved");
            } else if !granted {
                tracing::warn!("Location permission denied");
            }
            granted
        }
    }

    /// One-shot fetch, requesting permission first if needed.
    ///
    /// Resolves to `None` on any failure, with the reason recorded in the
    /// tracker's error state. Also resolves to `None` if the tracker was
    /// dropped in the meantime.
    pub fn current_location(
        &self,
        accuracy: AccuracyTier,
    ) -> impl Future<Output = Option<UserLocation>> + Send + use<P> {
        let platform = Arc::clone(&self.platform);
        let shared = Arc::downgrade(&self.shared);
        async move {
            if !update_if_alive(&shared, |s| s.is_loading = true) {
                return None;
            }

            let mut status = platform.permission_status();
            if status != PermissionStatus::Granted {
                status = platform.request_permission().await;
            }
            if status != PermissionStatus::Granted {
                tracing::warn!("Location permission denied for one-shot fetch");
                update_if_alive(&shared, |s| {
                    s.permission = status;
                    s.error = Some(LocationError::PermissionDenied.to_string());
                    s.is_loading = false;
                });
                return None;
            }

            let result = platform.current_position(accuracy).await;
            let mut location = None;
            let alive = update_if_alive(&shared, |s| {
                s.permission = status;
                s.is_loading = false;
                match &result {
                    Ok(fix) => {
                        s.location = Some(fix.clone());
                        s.error = None;
                        location = Some(fix.clone());
                    }
                    Err(e) => s.error = Some(e.to_string()),
                }
            });

            match (&result, alive) {
                (_, false) => tracing::debug!("Tracker dropped before one-shot fetch resolved"),
                (Err(e), true) => tracing::error!("One-shot location fetch failed: {e}"),
                (Ok(fix), true) => tracing::debug!(
                    "One-shot fix: ({:.6}, {:.6})",
                    fix.latitude,
                    fix.longitude
                ),
            }
            location
        }
    }

    /// Begin continuous updates.
    ///
    /// Returns `true` when a subscription is active after the call. Calling
    /// this while already tracking keeps the existing subscription.
    pub fn start_tracking(&mut self, options: TrackingOptions) -> bool {
        if self.active.is_some() {
            tracing::warn!("start_tracking called while already tracking; ignoring");
            return true;
        }

        let status = self.check_permission();
        let refusal = match status {
            PermissionStatus::Granted => None,
            PermissionStatus::Denied => Some(LocationError::PermissionDenied),
            PermissionStatus::Undetermined => Some(LocationError::PermissionUndetermined),
        };
        if let Some(error) = refusal {
            tracing::warn!("Cannot start tracking: {error}");
            lock(&self.shared).error = Some(error.to_string());
            return false;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let sink: LocationSink = Box::new(move |location| {
            // The receiver is gone once the subscription is released
            let _ = tx.send(location);
        });

        match self.platform.watch_position(&options, sink) {
            Ok(subscription) => {
                tracing::info!(
                    "Started location tracking ({:?}, {}ms, {}m)",
                    options.accuracy,
                    options.min_time_interval_ms,
                    options.min_distance_meters
                );
                let mut shared = lock(&self.shared);
                shared.error = None;
                shared.is_loading = shared.location.is_none();
                drop(shared);
                self.active = Some(ActiveWatch {
                    subscription,
                    options,
                    updates: rx,
                });
                true
            }
            Err(e) => {
                tracing::error!("Failed to start location tracking: {e}");
                lock(&self.shared).error = Some(e.to_string());
                false
            }
        }
    }

    /// Cancel the active subscription, if any, and forget the last fix
    pub fn stop_tracking(&mut self) {
        if self.release_subscription("stop") {
            let mut shared = lock(&self.shared);
            shared.location = None;
            shared.is_loading = false;
        } else {
            tracing::debug!("stop_tracking called while not tracking");
        }
    }

    /// Change tracking options, re-subscribing if they differ from the active ones
    pub fn set_options(&mut self, options: TrackingOptions) -> bool {
        match &self.active {
            Some(active) if active.options == options => true,
            Some(_) => {
                self.release_subscription("options changed");
                self.start_tracking(options)
            }
            None => false,
        }
    }

    /// Pull queued fixes in emission order, replacing the current location with each
    pub fn drain_updates(&mut self) -> Vec<UserLocation> {
        let Some(active) = self.active.as_mut() else {
            return Vec::new();
        };

        let mut updates = Vec::new();
        while let Ok(location) = active.updates.try_recv() {
            updates.push(location);
        }

        if let Some(last) = updates.last() {
            let mut shared = lock(&self.shared);
            shared.location = Some(last.clone());
            shared.is_loading = false;
        }
        updates
    }

    pub fn state(&self) -> TrackerState {
        let shared = lock(&self.shared);
        TrackerState {
            location: shared.location.clone(),
            error: shared.error.clone(),
            is_loading: shared.is_loading,
            is_tracking: self.active.is_some(),
            permission: shared.permission,
        }
    }

    pub fn location(&self) -> Option<UserLocation> {
        lock(&self.shared).location.clone()
    }

    pub fn is_tracking(&self) -> bool {
        self.active.is_some()
    }

    /// Options of the active subscription
    pub fn options(&self) -> Option<&TrackingOptions> {
        self.active.as_ref().map(|a| &a.options)
    }

    pub fn clear_error(&self) {
        lock(&self.shared).error = None;
    }

    /// Single release path shared by stop, options change and drop
    fn release_subscription(&mut self, reason: &str) -> bool {
        match self.active.take() {
            Some(active) => {
                // Dropping the receiver discards anything still queued
                drop(active.updates);
                active.subscription.cancel();
                tracing::info!("Released location subscription ({reason})");
                true
            }
            None => false,
        }
    }
}

impl<P: LocationPlatform> Drop for LocationTracker<P> {
    fn drop(&mut self) {
        self.release_subscription("tracker dropped");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Platform double that records prompts, watches and cancellations
    pub(crate) struct MockPlatform {
        status: Mutex<PermissionStatus>,
        prompt_answer: PermissionStatus,
        position: Mutex<std::result::Result<UserLocation, LocationError>>,
        watch_error: Mutex<Option<LocationError>>,
        sinks: Mutex<Vec<LocationSink>>,
        pub prompts: AtomicUsize,
        pub watches: AtomicUsize,
        pub cancels: Arc<AtomicUsize>,
    }

    pub(crate) struct MockSubscription {
        cancels: Arc<AtomicUsize>,
    }

    impl LocationSubscription for MockSubscription {
        fn cancel(self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl MockPlatform {
        pub(crate) fn new(status: PermissionStatus, prompt_answer: PermissionStatus) -> Self {
            Self {
                status: Mutex::new(status),
                prompt_answer,
                position: Mutex::new(Ok(fix(16.0, 108.0, 1))),
                watch_error: Mutex::new(None),
                sinks: Mutex::new(Vec::new()),
                prompts: AtomicUsize::new(0),
                watches: AtomicUsize::new(0),
                cancels: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub(crate) fn granted() -> Self {
            Self::new(PermissionStatus::Granted, PermissionStatus::Granted)
        }

        pub(crate) fn emit(&self, location: UserLocation) {
            for sink in self.sinks.lock().unwrap().iter() {
                sink(location.clone());
            }
        }

        fn fail_positions(&self, error: LocationError) {
            *self.position.lock().unwrap() = Err(error);
        }
    }

    impl LocationPlatform for MockPlatform {
        type Subscription = MockSubscription;

        fn permission_status(&self) -> PermissionStatus {
            *self.status.lock().unwrap()
        }

        fn request_permission(&self) -> impl Future<Output = PermissionStatus> + Send {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            *self.status.lock().unwrap() = self.prompt_answer;
            std::future::ready(self.prompt_answer)
        }

        fn current_position(
            &self,
            _accuracy: AccuracyTier,
        ) -> impl Future<Output = std::result::Result<UserLocation, LocationError>> + Send
        {
            std::future::ready(self.position.lock().unwrap().clone())
        }

        fn watch_position(
            &self,
            _options: &TrackingOptions,
            sink: LocationSink,
        ) -> std::result::Result<MockSubscription, LocationError> {
            if let Some(error) = self.watch_error.lock().unwrap().clone() {
                return Err(error);
            }
            self.watches.fetch_add(1, Ordering::SeqCst);
            self.sinks.lock().unwrap().push(sink);
            Ok(MockSubscription {
                cancels: Arc::clone(&self.cancels),
            })
        }
    }

    pub(crate) fn fix(latitude: f64, longitude: f64, timestamp: u64) -> UserLocation {
        UserLocation::new(latitude, longitude, timestamp)
    }

    #[test]
    fn test_check_permission_does_not_prompt() {
        let platform = Arc::new(MockPlatform::new(
            PermissionStatus::Undetermined,
            PermissionStatus::Granted,
        ));
        let tracker = LocationTracker::new(Arc::clone(&platform));
        assert_eq!(tracker.check_permission(), PermissionStatus::Undetermined);
        assert_eq!(platform.prompts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_denied_request_sets_error_and_never_watches() {
        let platform = Arc::new(MockPlatform::new(
            PermissionStatus::Undetermined,
            PermissionStatus::Denied,
        ));
        let mut tracker = LocationTracker::new(Arc::clone(&platform));

        assert!(!tracker.request_permission().await);
        assert_eq!(
            tracker.state().error.as_deref(),
            Some("Location permission denied")
        );
        assert_eq!(tracker.state().permission, PermissionStatus::Denied);

        assert!(!tracker.start_tracking(TrackingOptions::default()));
        assert_eq!(platform.watches.load(Ordering::SeqCst), 0);
        assert!(!tracker.is_tracking());
    }

    #[tokio::test]
    async fn test_granted_request_clears_error() {
        let platform = Arc::new(MockPlatform::new(
            PermissionStatus::Undetermined,
            PermissionStatus::Granted,
        ));
        let tracker = LocationTracker::new(platform);
        tracker.request_permission().await;
        assert!(tracker.state().error.is_none());
        assert_eq!(tracker.state().permission, PermissionStatus::Granted);
    }

    #[tokio::test]
    async fn test_one_shot_prompts_once_then_returns_fix() {
        let platform = Arc::new(MockPlatform::new(
            PermissionStatus::Undetermined,
            PermissionStatus::Granted,
        ));
        let tracker = LocationTracker::new(Arc::clone(&platform));

        let location = tracker.current_location(AccuracyTier::High).await;
        assert_eq!(location, Some(fix(16.0, 108.0, 1)));
        assert_eq!(platform.prompts.load(Ordering::SeqCst), 1);

        let state = tracker.state();
        assert_eq!(state.location, location);
        assert!(!state.is_loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_one_shot_denied_returns_none() {
        let platform = Arc::new(MockPlatform::new(
            PermissionStatus::Undetermined,
            PermissionStatus::Denied,
        ));
        let tracker = LocationTracker::new(Arc::clone(&platform));

        assert_eq!(tracker.current_location(AccuracyTier::High).await, None);
        assert_eq!(platform.prompts.load(Ordering::SeqCst), 1);
        assert_eq!(
            tracker.state().error.as_deref(),
            Some("Location permission denied")
        );
        assert!(!tracker.state().is_loading);
    }

    #[tokio::test]
    async fn test_one_shot_failure_is_state_not_panic() {
        let platform = Arc::new(MockPlatform::granted());
        platform.fail_positions(LocationError::LocationUnavailable);
        let tracker = LocationTracker::new(Arc::clone(&platform));

        assert_eq!(tracker.current_location(AccuracyTier::Low).await, None);
        assert_eq!(platform.prompts.load(Ordering::SeqCst), 0);
        let state = tracker.state();
        assert_eq!(
            state.error,
            Some(LocationError::LocationUnavailable.to_string())
        );
        assert!(!state.is_loading);
        assert!(state.location.is_none());
    }

    #[tokio::test]
    async fn test_pending_fetch_ignored_after_drop() {
        let platform = Arc::new(MockPlatform::granted());
        let tracker = LocationTracker::new(Arc::clone(&platform));

        let pending = tracker.current_location(AccuracyTier::High);
        let permission = tracker.request_permission();
        drop(tracker);

        assert_eq!(pending.await, None);
        assert!(permission.await);
    }

    #[test]
    fn test_start_requires_permission() {
        let platform = Arc::new(MockPlatform::new(
            PermissionStatus::Undetermined,
            PermissionStatus::Granted,
        ));
        let mut tracker = LocationTracker::new(Arc::clone(&platform));

        assert!(!tracker.start_tracking(TrackingOptions::default()));
        assert_eq!(
            tracker.state().error,
            Some(LocationError::PermissionUndetermined.to_string())
        );
        assert_eq!(platform.watches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_start_twice_keeps_single_subscription() {
        let platform = Arc::new(MockPlatform::granted());
        let mut tracker = LocationTracker::new(Arc::clone(&platform));

        assert!(tracker.start_tracking(TrackingOptions::default()));
        assert!(tracker.start_tracking(TrackingOptions::default()));
        assert_eq!(platform.watches.load(Ordering::SeqCst), 1);
        assert!(tracker.state().is_loading);
    }

    #[test]
    fn test_watch_failure_is_state() {
        let platform = Arc::new(MockPlatform::granted());
        *platform.watch_error.lock().unwrap() = Some(LocationError::AcquisitionFailed(
            "provider crashed".into(),
        ));
        let mut tracker = LocationTracker::new(Arc::clone(&platform));

        assert!(!tracker.start_tracking(TrackingOptions::default()));
        assert!(!tracker.is_tracking());
        assert!(
            tracker
                .state()
                .error
                .is_some_and(|e| e.contains("provider crashed"))
        );
    }

    #[test]
    fn test_updates_drain_in_emission_order() {
        let platform = Arc::new(MockPlatform::granted());
        let mut tracker = LocationTracker::new(Arc::clone(&platform));
        tracker.start_tracking(TrackingOptions::default());

        platform.emit(fix(16.0, 108.0, 1));
        platform.emit(fix(16.0, 108.0, 1));
        platform.emit(fix(16.1, 108.1, 2));

        let updates = tracker.drain_updates();
        let stamps: Vec<u64> = updates.iter().map(|u| u.timestamp).collect();
        assert_eq!(stamps, vec![1, 1, 2]);
        assert_eq!(tracker.location(), Some(fix(16.1, 108.1, 2)));
        assert!(!tracker.state().is_loading);
        assert!(tracker.drain_updates().is_empty());
    }

    #[test]
    fn test_stop_twice_and_never_started_is_safe() {
        let platform = Arc::new(MockPlatform::granted());
        let mut idle = LocationTracker::new(Arc::clone(&platform));
        idle.stop_tracking();
        idle.stop_tracking();
        assert_eq!(platform.cancels.load(Ordering::SeqCst), 0);

        let mut tracker = LocationTracker::new(Arc::clone(&platform));
        tracker.start_tracking(TrackingOptions::default());
        platform.emit(fix(16.0, 108.0, 1));
        tracker.drain_updates();

        tracker.stop_tracking();
        tracker.stop_tracking();
        assert_eq!(platform.cancels.load(Ordering::SeqCst), 1);
        assert!(tracker.location().is_none());
        assert!(!tracker.is_tracking());
    }

    #[test]
    fn test_drop_cancels_active_subscription() {
        let platform = Arc::new(MockPlatform::granted());
        {
            let mut tracker = LocationTracker::new(Arc::clone(&platform));
            tracker.start_tracking(TrackingOptions::default());
        }
        assert_eq!(platform.cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_then_drop_cancels_once() {
        let platform = Arc::new(MockPlatform::granted());
        let mut tracker = LocationTracker::new(Arc::clone(&platform));
        tracker.start_tracking(TrackingOptions::default());
        tracker.stop_tracking();
        drop(tracker);
        assert_eq!(platform.cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emissions_after_stop_are_discarded() {
        let platform = Arc::new(MockPlatform::granted());
        let mut tracker = LocationTracker::new(Arc::clone(&platform));
        tracker.start_tracking(TrackingOptions::default());
        tracker.stop_tracking();

        platform.emit(fix(16.0, 108.0, 9));
        assert!(tracker.drain_updates().is_empty());
        assert!(tracker.location().is_none());
    }

    #[test]
    fn test_options_change_resubscribes() {
        let platform = Arc::new(MockPlatform::granted());
        let mut tracker = LocationTracker::new(Arc::clone(&platform));
        tracker.start_tracking(TrackingOptions::default());

        assert!(tracker.set_options(TrackingOptions::default()));
        assert_eq!(platform.watches.load(Ordering::SeqCst), 1);

        let faster = TrackingOptions {
            min_time_interval_ms: 250,
            ..TrackingOptions::default()
        };
        assert!(tracker.set_options(faster.clone()));
        assert_eq!(platform.watches.load(Ordering::SeqCst), 2);
        assert_eq!(platform.cancels.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.options(), Some(&faster));
    }

    #[test]
    fn test_set_options_when_idle_does_not_subscribe() {
        let platform = Arc::new(MockPlatform::granted());
        let mut tracker = LocationTracker::new(Arc::clone(&platform));
        assert!(!tracker.set_options(TrackingOptions::default()));
        assert_eq!(platform.watches.load(Ordering::SeqCst), 0);
    }
}
