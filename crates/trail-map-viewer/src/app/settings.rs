use crate::app::state::TilesProvider;
use clap::{Parser, ValueEnum};
use eframe_entrypoints::parse_args;
use std::path::PathBuf;
use trail_map_lib::{AccuracyTier, PermissionStatus, TrackingOptions};

/// How the simulated OS answers the location permission prompt
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PermissionAnswer {
    Grant,
    Deny,
}

impl PermissionAnswer {
    pub fn status(self) -> PermissionStatus {
        match self {
            Self::Grant => PermissionStatus::Granted,
            Self::Deny => PermissionStatus::Denied,
        }
    }
}

/// Accuracy tier as accepted on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AccuracyArg {
    Lowest,
    Low,
    Balanced,
    High,
    Highest,
    Navigation,
}

impl From<AccuracyArg> for AccuracyTier {
    fn from(arg: AccuracyArg) -> Self {
        match arg {
            AccuracyArg::Lowest => AccuracyTier::Lowest,
            AccuracyArg::Low => AccuracyTier::Low,
            AccuracyArg::Balanced => AccuracyTier::Balanced,
            AccuracyArg::High => AccuracyTier::High,
            AccuracyArg::Highest => AccuracyTier::Highest,
            AccuracyArg::Navigation => AccuracyTier::BestForNavigation,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Trail Map - interactive site map with live position and camera follow
pub struct Settings {
    /// Site data file (JSON); the bundled sample site is used when omitted
    #[clap(short, long, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// GPX track replayed as the live position; a fixed position is used when omitted
    #[clap(short, long, value_name = "FILE")]
    pub replay_gpx: Option<PathBuf>,

    /// Replay speed as a multiple of walking pace
    #[clap(long, default_value = "1.0")]
    pub replay_speed: f64,

    /// Answer given to the location permission prompt
    #[clap(long, value_enum, default_value = "grant")]
    pub permission: PermissionAnswer,

    /// Minimum time between location updates in milliseconds
    #[clap(long, default_value = "1000")]
    pub min_interval_ms: u64,

    /// Minimum movement between location updates in meters
    #[clap(long, default_value = "1.0")]
    pub min_distance_m: f64,

    /// Requested location accuracy
    #[clap(long, value_enum, default_value = "high")]
    pub accuracy: AccuracyArg,

    /// Start with the camera following the live position
    #[clap(long, default_value = "false")]
    pub follow: bool,

    /// Map tiles provider
    #[clap(long, value_enum)]
    pub tiles: Option<TilesProvider>,

    /// Ignore previously persisted state and start fresh
    #[clap(long, default_value = "false")]
    pub ignore_persisted: bool,
}

impl Settings {
    pub fn from_cli() -> Self {
        match parse_args::<Settings>() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    pub fn tracking_options(&self) -> TrackingOptions {
        TrackingOptions {
            accuracy: self.accuracy.into(),
            min_time_interval_ms: self.min_interval_ms,
            min_distance_meters: self.min_distance_m.max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::parse_from(["trail-map"]);
        assert!(settings.data.is_none());
        assert_eq!(settings.permission, PermissionAnswer::Grant);
        assert!(!settings.follow);
        assert_eq!(settings.tracking_options(), TrackingOptions::default());
    }

    #[test]
    fn test_tracking_flags() {
        let settings = Settings::parse_from([
            "trail-map",
            "--accuracy",
            "navigation",
            "--min-interval-ms",
            "250",
            "--min-distance-m=-3",
            "--permission",
            "deny",
            "--tiles",
            "open-topo-map",
        ]);
        let options = settings.tracking_options();
        assert_eq!(options.accuracy, AccuracyTier::BestForNavigation);
        assert_eq!(options.min_time_interval_ms, 250);
        assert_eq!(options.min_distance_meters, 0.0);
        assert_eq!(settings.permission.status(), PermissionStatus::Denied);
        assert_eq!(settings.tiles, Some(TilesProvider::OpenTopoMap));
    }
}
