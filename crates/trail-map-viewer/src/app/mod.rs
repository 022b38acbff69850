//! Application module
//!
//! The map fills the window. Overlays carry the sidebar toggle, the follow
//! toggle and the location banner; the sidebar holds the places list, the
//! location controls and the settings. Each frame:
//!
//! 1. queued location fixes are drained into the follow camera and the
//!    user marker, in emission order
//! 2. panels render and collect [`ui_panels::UiAction`]s
//! 3. the map draws with the camera's animated region, and reports drags,
//!    the settled viewport and pressed markers back
//! 4. collected actions are applied

mod camera;
mod location_source;
mod plugin;
pub(crate) mod settings;
mod state;
mod ui_panels;

use crate::app::camera::{WalkersCamera, region_for_bounds};
use crate::app::location_source::{ReplayPlatform, ReplayTrack};
use crate::app::plugin::{
    MapFeedback, PoiPlugin, SharedFeedback, TrailPlugin, UserLocationPlugin, ViewportPlugin,
    lock_feedback,
};
use crate::app::settings::Settings;
use crate::app::state::{PERSISTED_SETTINGS_KEY, TilesProvider, UiSettings};
use crate::app::ui_panels::{PanelView, UiAction};
use eframe::egui;
use eframe_entrypoints::async_runtime;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use trail_map_lib::{
    CameraHandle, Coordinate, FOLLOW_ANIMATION_MS, FollowCameraController, LocationTracker,
    PermissionStatus, Region, TrackerState, TrailGraph, UserLocation, UserLocationMarker,
    ValidationReport, loader,
};
use walkers::{
    HttpTiles, Map, MapMemory, TileId,
    sources::{Attribution, OpenStreetMap, TileSource},
};

/// Padding around the site when fitting it on screen
const FIT_PADDING: f64 = 1.2;
/// Smallest span shown when fitting, in degrees
const FIT_MIN_SPAN: f64 = 0.001;
/// Span used when there is nothing to fit
const FALLBACK_SPAN: f64 = 0.01;
/// Repaint cadence while waiting on the location feed
const FEED_POLL: Duration = Duration::from_millis(100);

/// Custom OpenTopoMap tile source
pub struct OpenTopoMap;

impl TileSource for OpenTopoMap {
    fn tile_url(&self, tile_id: TileId) -> String {
        format!(
            "https://tile.opentopomap.org/{}/{}/{}.png",
            tile_id.zoom, tile_id.x, tile_id.y
        )
    }

    fn attribution(&self) -> Attribution {
        Attribution {
            text: "© OpenTopoMap (CC-BY-SA)",
            url: "https://opentopomap.org/",
            logo_light: None,
            logo_dark: None,
        }
    }

    fn max_zoom(&self) -> u8 {
        17
    }
}

/// Async requests whose answers are picked up on a later frame
#[derive(Default)]
struct PendingRequests {
    permission: Option<oneshot::Receiver<bool>>,
    locate: Option<oneshot::Receiver<Option<UserLocation>>>,
}

impl PendingRequests {
    fn is_empty(&self) -> bool {
        self.permission.is_none() && self.locate.is_none()
    }
}

/// Poll a oneshot without blocking; clears it once answered or abandoned
fn poll_oneshot<T>(slot: &mut Option<oneshot::Receiver<T>>) -> Option<T> {
    let receiver = slot.as_mut()?;
    match receiver.try_recv() {
        Ok(value) => {
            *slot = None;
            Some(value)
        }
        Err(oneshot::error::TryRecvError::Empty) => None,
        Err(oneshot::error::TryRecvError::Closed) => {
            *slot = None;
            None
        }
    }
}

/// Main application structure
pub struct TrailMapApp {
    cli: Settings,
    ui_settings: UiSettings,

    /// Site data, loaded once
    graph: Arc<TrailGraph>,
    validation: ValidationReport,
    /// Load failures shown in the settings tab
    notices: Vec<String>,

    tracker: LocationTracker<ReplayPlatform>,
    /// Snapshot taken once per frame for the panels
    tracker_state: TrackerState,
    replay_source: String,
    pending: PendingRequests,

    camera: FollowCameraController<WalkersCamera>,
    user_marker: UserLocationMarker,
    selected_poi: Option<String>,
    last_settled_region: Option<Region>,

    tiles_osm: HttpTiles,
    tiles_otm: HttpTiles,
    map_memory: MapMemory,
    feedback: SharedFeedback,

    clock: instant::Instant,
}

impl TrailMapApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let cli = Settings::from_cli();

        let ui_settings = match cc.storage.and_then(|s| s.get_string(PERSISTED_SETTINGS_KEY)) {
            Some(json) if !cli.ignore_persisted => {
                UiSettings::restore(&json, &cli).unwrap_or_else(|| UiSettings::from_cli(&cli))
            }
            Some(_) => {
                tracing::info!("Ignoring persisted state (--ignore-persisted flag)");
                UiSettings::from_cli(&cli)
            }
            None => UiSettings::from_cli(&cli),
        };

        let mut notices = Vec::new();
        let graph = load_graph(cli.data.as_deref(), &mut notices);
        let validation = graph.validate();

        let site_region = site_region(&graph);
        let (platform, replay_source) = replay_platform(&cli, &graph, &mut notices);
        let tracker = LocationTracker::new(Arc::new(platform));

        let mut camera = FollowCameraController::new(WalkersCamera::new(site_region), site_region)
            .with_animation_ms(FOLLOW_ANIMATION_MS);
        // Jump to the site on the first frame
        camera.animate_to_region(site_region, 0);

        let mut app = Self {
            tiles_osm: HttpTiles::new(OpenStreetMap, cc.egui_ctx.clone()),
            tiles_otm: HttpTiles::new(OpenTopoMap, cc.egui_ctx.clone()),
            map_memory: MapMemory::default(),
            feedback: Arc::new(std::sync::Mutex::new(MapFeedback::default())),
            cli,
            ui_settings,
            graph,
            validation,
            notices,
            tracker,
            tracker_state: TrackerState::default(),
            replay_source,
            pending: PendingRequests::default(),
            camera,
            user_marker: UserLocationMarker::new(0.0),
            selected_poi: None,
            last_settled_region: None,
            clock: instant::Instant::now(),
        };

        if app.cli.follow {
            app.camera.set_follow_user(true);
        }
        if app.ui_settings.tracking_enabled {
            app.ensure_tracking();
        }
        app
    }

    fn now_ms(&self) -> f64 {
        self.clock.elapsed().as_secs_f64() * 1000.0
    }

    /// Start the feed if allowed, prompting first when permission is undetermined
    fn ensure_tracking(&mut self) {
        if self.tracker.is_tracking() {
            return;
        }
        match self.tracker.check_permission() {
            PermissionStatus::Undetermined => self.request_permission(),
            // A denied start records the error for the banner
            PermissionStatus::Granted | PermissionStatus::Denied => {
                self.tracker.start_tracking(self.ui_settings.tracking.clone());
            }
        }
    }

    fn request_permission(&mut self) {
        if self.pending.permission.is_some() {
            return;
        }
        let Some(receiver) = spawn_request(self.tracker.request_permission()) else {
            return;
        };
        self.pending.permission = Some(receiver);
    }

    fn locate_me(&mut self) {
        if self.pending.locate.is_some() {
            return;
        }
        let request = self.tracker.current_location(self.ui_settings.accuracy());
        self.pending.locate = spawn_request(request);
    }

    fn stop_tracking(&mut self) {
        self.tracker.stop_tracking();
        self.camera.clear_user_location();
        self.user_marker.set_location(None, self.now_ms());
    }

    /// Feed one fix to everything that shows it
    fn forward_location(&mut self, location: &UserLocation, now_ms: f64) {
        self.camera.on_user_location(location);
        self.user_marker.set_location(Some(location), now_ms);
    }

    fn poll_pending(&mut self, now_ms: f64) {
        if let Some(granted) = poll_oneshot(&mut self.pending.permission)
            && granted
            && self.ui_settings.tracking_enabled
        {
            self.ensure_tracking();
        }
        if let Some(Some(location)) = poll_oneshot(&mut self.pending.locate) {
            self.forward_location(&location, now_ms);
            if !self.camera.is_following_user() {
                self.camera
                    .animate_to_coordinate(location.coordinate(), FOLLOW_ANIMATION_MS);
            }
        }
    }

    /// Swap the simulated feed for a replayed GPX track
    #[cfg_attr(target_os = "android", allow(dead_code))]
    fn replay_gpx(&mut self, path: &Path) {
        match ReplayTrack::from_path(path) {
            Ok(track) => {
                let platform =
                    ReplayPlatform::track(track, self.cli.replay_speed, self.cli.permission.status());
                // Dropping the old tracker releases its subscription
                self.stop_tracking();
                self.tracker = LocationTracker::new(Arc::new(platform));
                self.pending = PendingRequests::default();
                self.replay_source = format!("Replaying {}", path.display());
                if self.ui_settings.tracking_enabled {
                    self.ensure_tracking();
                }
            }
            Err(e) => {
                tracing::error!("Failed to load replay track {}: {e}", path.display());
                self.notices.push(format!("{}: {e}", path.display()));
            }
        }
    }

    fn apply_action(&mut self, action: UiAction) {
        match action {
            UiAction::ToggleFollow => {
                let state = self.camera.toggle_follow();
                tracing::debug!("Follow toggled: {state:?}");
            }
            UiAction::LocateMe => self.locate_me(),
            UiAction::RetryPermission => {
                self.tracker.clear_error();
                self.ui_settings.tracking_enabled = true;
                match self.tracker.check_permission() {
                    PermissionStatus::Granted => self.ensure_tracking(),
                    _ => {
                        // Ask again; the answer restarts tracking when granted
                        self.pending.permission = None;
                        self.request_permission();
                    }
                }
            }
            UiAction::SetTracking(true) => self.ensure_tracking(),
            UiAction::SetTracking(false) => self.stop_tracking(),
            UiAction::TrackingOptionsChanged => {
                self.tracker.set_options(self.ui_settings.tracking.clone());
            }
            UiAction::SelectPoi(id) => self.selected_poi = Some(id),
            UiAction::ClosePoi => self.selected_poi = None,
            UiAction::CenterOn(coordinate) => self.center_on(coordinate),
            UiAction::FitSite => {
                self.camera.set_follow_user(false);
                self.camera
                    .animate_to_region(site_region(&self.graph), FOLLOW_ANIMATION_MS);
            }
            UiAction::PickReplayGpx => {
                #[cfg(not(target_os = "android"))]
                {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("GPX", &["gpx"])
                        .set_title("Replay a GPX track as your position")
                        .pick_file()
                    {
                        self.replay_gpx(&path);
                    }
                }
            }
        }
    }

    /// Manual recentering leaves follow mode, like a drag would
    fn center_on(&mut self, coordinate: Coordinate) {
        self.camera.on_pan_drag();
        let region = self.camera.target().current().recentered(coordinate);
        self.camera.animate_to_region(region, FOLLOW_ANIMATION_MS);
    }

    fn panel_view(&self) -> PanelView<'_> {
        PanelView {
            graph: &self.graph,
            validation: &self.validation,
            tracker: &self.tracker_state,
            following: self.camera.is_following_user(),
            selected: self.selected_poi.as_deref().and_then(|id| self.graph.map_point(id)),
            replay_source: &self.replay_source,
            notices: &self.notices,
        }
    }
}

/// Run a request on the background runtime and hand back its answer channel
fn spawn_request<T: Send + 'static>(
    request: impl std::future::Future<Output = T> + Send + 'static,
) -> Option<oneshot::Receiver<T>> {
    if !async_runtime::in_runtime_context() {
        tracing::error!("No async runtime; location request dropped");
        return None;
    }
    let (tx, rx) = oneshot::channel();
    async_runtime::spawn(async move {
        // The app may have replaced the request in the meantime
        let _ = tx.send(request.await);
    });
    Some(rx)
}

/// Load the site, falling back to the bundled sample and then to an empty map
fn load_graph(path: Option<&Path>, notices: &mut Vec<String>) -> Arc<TrailGraph> {
    match loader::load_shared(path) {
        Ok(graph) => graph,
        Err(e) => {
            tracing::error!("Failed to load site data: {e}");
            notices.push(format!("Site data not loaded: {e}"));
            loader::load_shared(None).unwrap_or_else(|e| {
                tracing::error!("Bundled sample site is unusable: {e}");
                Arc::new(TrailGraph::default())
            })
        }
    }
}

fn site_region(graph: &TrailGraph) -> Region {
    match graph.bounds() {
        Some(bounds) => region_for_bounds(bounds, FIT_PADDING, FIT_MIN_SPAN),
        None => Region::new(0.0, 0.0, FALLBACK_SPAN, FALLBACK_SPAN),
    }
}

/// Replay the GPX given on the command line, or stand still at the first entrance
fn replay_platform(
    cli: &Settings,
    graph: &TrailGraph,
    notices: &mut Vec<String>,
) -> (ReplayPlatform, String) {
    let answer = cli.permission.status();
    if let Some(path) = &cli.replay_gpx {
        match ReplayTrack::from_path(path) {
            Ok(track) => {
                return (
                    ReplayPlatform::track(track, cli.replay_speed, answer),
                    format!("Replaying {}", path.display()),
                );
            }
            Err(e) => {
                tracing::error!("Failed to load replay track {}: {e}", path.display());
                notices.push(format!("{}: {e}", path.display()));
            }
        }
    }

    let start = graph
        .points()
        .iter()
        .find(|p| p.kind == trail_map_lib::PointKind::Entrance)
        .or_else(|| graph.points().first())
        .map(|p| p.coordinate())
        .unwrap_or_else(|| site_region(graph).center());
    (
        ReplayPlatform::fixed(start, answer),
        format!("Fixed at {:.5}, {:.5}", start.latitude, start.longitude),
    )
}

#[profiling::all_functions]
impl eframe::App for TrailMapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now_ms = self.now_ms();
        self.camera.target_mut().set_time(now_ms);

        self.poll_pending(now_ms);
        for location in self.tracker.drain_updates() {
            self.forward_location(&location, now_ms);
        }
        self.tracker_state = self.tracker.state();

        let mut actions = Vec::new();

        // Sidebar and detail window work on a copy of the settings so the
        // view can borrow the app
        let mut ui_settings = self.ui_settings.clone();
        {
            let view = self.panel_view();
            ui_panels::render_sidebar(ctx, &mut ui_settings, &view, &mut actions);
            ui_panels::poi_detail(ctx, &view, &mut actions);
        }
        self.ui_settings = ui_settings;

        let graph = Arc::clone(&self.graph);
        let feedback = Arc::clone(&self.feedback);
        let highlight = self
            .selected_poi
            .as_deref()
            .and_then(|id| graph.map_point(id))
            .and_then(|p| p.attached_to.clone());
        let layers = self.user_marker.layers(now_ms);
        let labels_region = self.camera.region();

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                profiling::scope!("map_panel");

                self.camera
                    .target_mut()
                    .apply(&mut self.map_memory, ui.available_width());

                let tiles: &mut HttpTiles = match self.ui_settings.tiles_provider {
                    TilesProvider::OpenStreetMap => &mut self.tiles_osm,
                    TilesProvider::OpenTopoMap => &mut self.tiles_otm,
                };

                let center = self.camera.target().current().center();
                let mut map = Map::new(
                    Some(tiles),
                    &mut self.map_memory,
                    walkers::lat_lon(center.latitude, center.longitude),
                )
                .with_plugin(
                    TrailPlugin::new(Arc::clone(&graph), self.ui_settings.trail_width)
                        .with_nodes(self.ui_settings.show_nodes)
                        .with_highlight(highlight),
                )
                .with_plugin(
                    PoiPlugin::new(Arc::clone(&graph), labels_region, Arc::clone(&feedback))
                        .with_filter(self.ui_settings.poi_filter)
                        .with_selected(self.selected_poi.clone()),
                )
                .with_plugin(ViewportPlugin::new(Arc::clone(&feedback)));
                if let Some(layers) = layers {
                    map = map.with_plugin(UserLocationPlugin::new(layers));
                }

                let response = ui.add(map);
                if response.dragged() {
                    self.camera.on_pan_drag();
                    self.camera.target_mut().interrupt();
                }

                ui_panels::sidebar_toggle_button(ui, &mut self.ui_settings);
                ui_panels::follow_button(ui, self.camera.is_following_user(), &mut actions);
                ui_panels::location_banner(ui, &self.tracker_state, &mut actions);

                let painter = ui.painter();
                let screen_rect = ui.max_rect();
                painter.text(
                    screen_rect.center_bottom() + egui::vec2(0.0, -5.0),
                    egui::Align2::CENTER_BOTTOM,
                    self.ui_settings.tiles_provider.attribution(),
                    egui::FontId::proportional(10.0),
                    egui::Color32::from_black_alpha(180),
                );

                let dragging = response.dragged();
                let MapFeedback {
                    region,
                    clicked_poi,
                } = std::mem::take(&mut *lock_feedback(&feedback));

                if let Some(region) = region {
                    self.camera.target_mut().observe(region);
                    let settled = !dragging && !self.camera.target().is_animating();
                    if settled && self.last_settled_region != Some(region) {
                        self.last_settled_region = Some(region);
                        self.camera.on_region_change_complete(region);
                    }
                }
                if let Some(id) = clicked_poi {
                    actions.push(UiAction::SelectPoi(id));
                }
            });

        for action in actions {
            self.apply_action(action);
        }

        if self.user_marker.is_animating() || self.camera.target().is_animating() {
            ctx.request_repaint();
        } else if self.tracker.is_tracking() || !self.pending.is_empty() {
            ctx.request_repaint_after(FEED_POLL);
        }
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        match self.ui_settings.to_json() {
            Ok(json) => {
                storage.set_string(PERSISTED_SETTINGS_KEY, json);
                tracing::debug!("Saved settings");
            }
            Err(e) => tracing::warn!("Failed to serialize settings: {e}"),
        }
    }
}
