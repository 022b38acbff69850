//! Trail Map - Application Library
//!
//! Puts the trail graph, the location tracker and the follow camera from
//! `trail-map-lib` on a walkers map, with the platform entry points provided
//! by `eframe-entrypoints`.

mod app;

pub use app::TrailMapApp;

eframe_entrypoints::eframe_app!("Trail Map", |cc| Box::new(TrailMapApp::new(cc)));
