//! UI state and persisted preferences
//!
//! Everything here is plain data; the trail graph, the tracker and the
//! camera live on the app itself.

use crate::app::settings::Settings;
use serde::{Deserialize, Serialize};
use trail_map_lib::{AccuracyTier, MapPointType, TrackingOptions};

/// Storage key for [`PersistedSettings`]
pub const PERSISTED_SETTINGS_KEY: &str = "persisted_settings";

/// Available map tile providers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum TilesProvider {
    #[default]
    OpenStreetMap,
    OpenTopoMap,
}

impl TilesProvider {
    pub fn attribution(&self) -> &'static str {
        match self {
            Self::OpenStreetMap => "© OpenStreetMap contributors",
            Self::OpenTopoMap => "© OpenTopoMap (CC-BY-SA)",
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::OpenStreetMap, Self::OpenTopoMap]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenStreetMap => "OpenStreetMap",
            Self::OpenTopoMap => "OpenTopoMap",
        }
    }
}

/// Sidebar tabs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SidebarTab {
    #[default]
    Places,
    Location,
    Settings,
}

/// UI settings that can be adjusted at runtime
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub tiles_provider: TilesProvider,
    pub sidebar_open: bool,
    pub active_tab: SidebarTab,
    /// Only show points of interest of this category
    pub poi_filter: Option<MapPointType>,
    /// Trail line width in pixels
    pub trail_width: f32,
    /// Draw graph nodes on top of trails
    pub show_nodes: bool,
    pub tracking: TrackingOptions,
    /// Resume tracking on the next start
    pub tracking_enabled: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            tiles_provider: TilesProvider::default(),
            sidebar_open: false,
            active_tab: SidebarTab::default(),
            poi_filter: None,
            trail_width: 4.0,
            show_nodes: false,
            tracking: TrackingOptions::default(),
            tracking_enabled: true,
        }
    }
}

impl UiSettings {
    /// Settings from the command line only
    pub fn from_cli(cli: &Settings) -> Self {
        let mut settings = Self {
            tracking: cli.tracking_options(),
            ..Self::default()
        };
        settings.apply_cli_overrides(cli);
        settings
    }

    /// Restore persisted settings, letting explicit flags win
    pub fn restore(json: &str, cli: &Settings) -> Option<Self> {
        let persisted: PersistedSettings = serde_json::from_str(json)
            .inspect_err(|e| tracing::warn!("Ignoring unreadable persisted settings: {e}"))
            .ok()?;
        if persisted.version != PersistedSettings::VERSION {
            tracing::info!(
                "Persisted settings version {} is stale, starting fresh",
                persisted.version
            );
            return None;
        }
        let mut settings = persisted.ui;
        settings.apply_cli_overrides(cli);
        Some(settings)
    }

    fn apply_cli_overrides(&mut self, cli: &Settings) {
        if let Some(tiles) = cli.tiles {
            self.tiles_provider = tiles;
        }
        let from_flags = cli.tracking_options();
        if from_flags != TrackingOptions::default() {
            self.tracking = from_flags;
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&PersistedSettings {
            version: PersistedSettings::VERSION,
            ui: self.clone(),
        })
    }

    /// Whether a point of interest passes the category filter
    pub fn shows(&self, kind: MapPointType) -> bool {
        self.poi_filter.is_none_or(|filter| filter == kind)
    }

    pub fn accuracy(&self) -> AccuracyTier {
        self.tracking.accuracy
    }
}

/// Preferences saved through eframe storage
#[derive(Serialize, Deserialize)]
struct PersistedSettings {
    version: u32,
    ui: UiSettings,
}

impl PersistedSettings {
    const VERSION: u32 = 1;
}
