//! UI panels for the application
//!
//! Panels never touch the tracker or the camera directly: they read a
//! [`PanelView`] snapshot, edit [`UiSettings`] in place and push
//! [`UiAction`]s that the app applies after drawing.

use crate::app::plugin::to_color;
use crate::app::state::{SidebarTab, TilesProvider, UiSettings};
use egui::{Color32, RichText, Ui};
use trail_map_lib::{
    AccuracyTier, Attachment, Coordinate, MapPoint, MapPointType, PermissionStatus, TrackerState,
    TrailGraph, ValidationReport, marker_style,
};

const ACCURACY_TIERS: [AccuracyTier; 6] = [
    AccuracyTier::Lowest,
    AccuracyTier::Low,
    AccuracyTier::Balanced,
    AccuracyTier::High,
    AccuracyTier::Highest,
    AccuracyTier::BestForNavigation,
];

/// Something the user asked for this frame
#[derive(Clone, Debug, PartialEq)]
pub enum UiAction {
    ToggleFollow,
    LocateMe,
    RetryPermission,
    SetTracking(bool),
    TrackingOptionsChanged,
    SelectPoi(String),
    ClosePoi,
    CenterOn(Coordinate),
    FitSite,
    PickReplayGpx,
}

/// Read-only state the panels render from
pub struct PanelView<'a> {
    pub graph: &'a TrailGraph,
    pub validation: &'a ValidationReport,
    pub tracker: &'a TrackerState,
    pub following: bool,
    pub selected: Option<&'a MapPoint>,
    pub replay_source: &'a str,
    pub notices: &'a [String],
}

/// Text for the persistent location banner, if one should show
pub fn banner_message(tracker: &TrackerState) -> Option<String> {
    if let Some(error) = &tracker.error {
        return Some(error.clone());
    }
    (tracker.permission == PermissionStatus::Denied)
        .then(|| "Location permission denied".to_string())
}

/// Render the sidebar toggle button (overlaid on top-right of map)
pub fn sidebar_toggle_button(ui: &mut Ui, ui_settings: &mut UiSettings) {
    let icon = if ui_settings.sidebar_open { "✕" } else { "☰" };
    if overlay_button(ui, 0, icon, false).clicked() {
        ui_settings.sidebar_open = !ui_settings.sidebar_open;
    }
}

/// Render the follow toggle below the sidebar button
pub fn follow_button(ui: &mut Ui, following: bool, actions: &mut Vec<UiAction>) {
    let response = overlay_button(ui, 1, "⌖", following).on_hover_text(if following {
        "Following your position (drag the map to stop)"
    } else {
        "Follow your position"
    });
    if response.clicked() {
        actions.push(UiAction::ToggleFollow);
    }
}

/// Square button stacked down the top-right corner of the map
fn overlay_button(ui: &mut Ui, slot: usize, icon: &str, active: bool) -> egui::Response {
    let button_size = egui::vec2(40.0, 40.0);
    let margin = 10.0;

    let rect = ui.max_rect();
    let button_pos = rect.right_top()
        + egui::vec2(
            -button_size.x - margin,
            margin + slot as f32 * (button_size.y + margin),
        );
    let button_rect = egui::Rect::from_min_size(button_pos, button_size);

    let response = ui.allocate_rect(button_rect, egui::Sense::click());

    let bg_color = if active {
        ui.visuals().selection.bg_fill
    } else if response.hovered() {
        ui.visuals().widgets.hovered.bg_fill
    } else {
        ui.visuals().widgets.inactive.bg_fill
    };
    ui.painter().rect_filled(button_rect, 5.0, bg_color);
    ui.painter().text(
        button_rect.center(),
        egui::Align2::CENTER_CENTER,
        icon,
        egui::FontId::proportional(20.0),
        ui.visuals().text_color(),
    );

    response
}

/// Persistent banner for denied or failed location, with a retry button
pub fn location_banner(ui: &mut Ui, tracker: &TrackerState, actions: &mut Vec<UiAction>) {
    let Some(message) = banner_message(tracker) else {
        return;
    };

    let rect = ui.max_rect();
    egui::Area::new(egui::Id::new("location_banner"))
        .fixed_pos(rect.left_top() + egui::vec2(10.0, 10.0))
        .show(ui.ctx(), |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new(format!("⚠ {message}"))
                            .color(ui.visuals().warn_fg_color),
                    );
                    if ui.button("Retry").clicked() {
                        actions.push(UiAction::RetryPermission);
                    }
                });
            });
        });
}

/// Floating detail panel for the pressed point of interest
pub fn poi_detail(ctx: &egui::Context, view: &PanelView<'_>, actions: &mut Vec<UiAction>) {
    let Some(map_point) = view.selected else {
        return;
    };
    let style = marker_style(map_point.kind);

    let mut open = true;
    egui::Window::new(RichText::new(&map_point.name).strong())
        .id(egui::Id::new("poi_detail"))
        .open(&mut open)
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::LEFT_BOTTOM, egui::vec2(10.0, -30.0))
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(RichText::new(style.icon).color(to_color(style.fill)));
                ui.label(map_point.kind.name());
            });
            if !map_point.description.is_empty() {
                ui.label(&map_point.description);
            }
            ui.label(
                RichText::new(format!(
                    "{:.6}, {:.6}",
                    map_point.latitude, map_point.longitude
                ))
                .small()
                .weak(),
            );
            if let Some(attachment) = &map_point.attached_to {
                ui.label(
                    RichText::new(attachment_label(view.graph, attachment))
                        .small()
                        .weak(),
                );
            }
            for image in &map_point.images {
                ui.hyperlink_to("🖼 Photo", image);
            }
            ui.add_space(4.0);
            if ui.button("🎯 Center on map").clicked() {
                actions.push(UiAction::CenterOn(map_point.coordinate()));
            }
        });

    if !open {
        actions.push(UiAction::ClosePoi);
    }
}

/// Human-readable description of where a point of interest sits on the trails
pub fn attachment_label(graph: &TrailGraph, attachment: &Attachment) -> String {
    match attachment {
        Attachment::Node(id) => match graph.point(id) {
            Some(point) => {
                let name = point.label.as_deref().unwrap_or(id);
                format!("On trail node {name} ({} trails)", graph.degree(id))
            }
            None => format!("Attached to missing node {id}"),
        },
        Attachment::Edge(id) => match graph.edge(id) {
            Some(edge) => match &edge.note {
                Some(note) => format!("Along trail {id}: {note}"),
                None => format!("Along trail {id}"),
            },
            None => format!("Attached to missing trail {id}"),
        },
    }
}

/// Render the main sidebar (responsive: side on landscape, bottom on portrait)
pub fn render_sidebar(
    ctx: &egui::Context,
    ui_settings: &mut UiSettings,
    view: &PanelView<'_>,
    actions: &mut Vec<UiAction>,
) {
    if !ui_settings.sidebar_open {
        return;
    }

    let screen_size = ctx.viewport_rect().size();
    if screen_size.y > screen_size.x {
        egui::TopBottomPanel::bottom("main_sidebar")
            .default_height(280.0)
            .min_height(180.0)
            .max_height(ctx.viewport_rect().height() * 0.6)
            .resizable(true)
            .show(ctx, |ui| render_sidebar_content(ui, ui_settings, view, actions));
    } else {
        egui::SidePanel::right("main_sidebar")
            .default_width(300.0)
            .min_width(260.0)
            .max_width(450.0)
            .resizable(true)
            .show(ctx, |ui| render_sidebar_content(ui, ui_settings, view, actions));
    }
}

fn render_sidebar_content(
    ui: &mut Ui,
    ui_settings: &mut UiSettings,
    view: &PanelView<'_>,
    actions: &mut Vec<UiAction>,
) {
    ui.horizontal(|ui| {
        ui.selectable_value(&mut ui_settings.active_tab, SidebarTab::Places, "📍 Places");
        ui.selectable_value(
            &mut ui_settings.active_tab,
            SidebarTab::Location,
            "⌖ Location",
        );
        ui.selectable_value(
            &mut ui_settings.active_tab,
            SidebarTab::Settings,
            "⚙ Settings",
        );
    });

    ui.separator();

    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui| match ui_settings.active_tab {
            SidebarTab::Places => render_places_tab(ui, ui_settings, view, actions),
            SidebarTab::Location => render_location_tab(ui, ui_settings, view, actions),
            SidebarTab::Settings => render_settings_tab(ui, ui_settings, view, actions),
        });
}

fn render_places_tab(
    ui: &mut Ui,
    ui_settings: &mut UiSettings,
    view: &PanelView<'_>,
    actions: &mut Vec<UiAction>,
) {
    egui::ComboBox::from_label("Category")
        .selected_text(ui_settings.poi_filter.map_or("All", |kind| kind.name()))
        .show_ui(ui, |ui| {
            ui.selectable_value(&mut ui_settings.poi_filter, None, "All");
            for &kind in MapPointType::all() {
                ui.selectable_value(&mut ui_settings.poi_filter, Some(kind), kind.name());
            }
        });

    ui.add_space(4.0);

    let selected_id = view.selected.map(|p| p.id.as_str());
    let mut shown = 0;
    for map_point in view
        .graph
        .map_points()
        .iter()
        .filter(|p| ui_settings.shows(p.kind))
    {
        shown += 1;
        let style = marker_style(map_point.kind);
        let selected = selected_id == Some(map_point.id.as_str());
        let text = RichText::new(format!("{} {}", style.icon, map_point.name));
        if ui.selectable_label(selected, text).clicked() {
            actions.push(UiAction::SelectPoi(map_point.id.clone()));
            actions.push(UiAction::CenterOn(map_point.coordinate()));
        }
    }

    if shown == 0 {
        ui.label(RichText::new("No places in this category").weak());
    }
}

fn render_location_tab(
    ui: &mut Ui,
    ui_settings: &mut UiSettings,
    view: &PanelView<'_>,
    actions: &mut Vec<UiAction>,
) {
    let tracker = view.tracker;

    let mut enabled = ui_settings.tracking_enabled;
    if ui.checkbox(&mut enabled, "Track my position").changed() {
        ui_settings.tracking_enabled = enabled;
        actions.push(UiAction::SetTracking(enabled));
    }

    ui.horizontal(|ui| {
        if ui.button("⌖ Locate me").clicked() {
            actions.push(UiAction::LocateMe);
        }
        let follow_text = if view.following {
            "Stop following"
        } else {
            "Follow"
        };
        if ui.button(follow_text).clicked() {
            actions.push(UiAction::ToggleFollow);
        }
    });

    ui.add_space(8.0);
    ui.separator();

    egui::Grid::new("location_status")
        .num_columns(2)
        .striped(true)
        .show(ui, |ui| {
            ui.label("Permission:");
            ui.label(format!("{:?}", tracker.permission));
            ui.end_row();

            ui.label("Status:");
            let status = if tracker.is_loading {
                "Acquiring fix…"
            } else if tracker.is_tracking {
                "Tracking"
            } else {
                "Idle"
            };
            ui.label(status);
            ui.end_row();

            if let Some(location) = &tracker.location {
                ui.label("Position:");
                ui.label(format!("{:.6}, {:.6}", location.latitude, location.longitude));
                ui.end_row();

                if let Some(accuracy) = location.accuracy {
                    ui.label("Accuracy:");
                    ui.label(format!("±{accuracy:.0} m"));
                    ui.end_row();
                }
                if let Some(heading) = location.heading {
                    ui.label("Heading:");
                    ui.label(format!("{heading:.0}°"));
                    ui.end_row();
                }
                if let Some(speed) = location.speed {
                    ui.label("Speed:");
                    ui.label(format!("{speed:.1} m/s"));
                    ui.end_row();
                }
            }
        });

    if let Some(error) = &tracker.error {
        ui.label(RichText::new(format!("⚠ {error}")).color(Color32::RED));
    }

    ui.add_space(8.0);
    ui.separator();
    ui.label(RichText::new("Tracking options").strong());

    let options = &mut ui_settings.tracking;
    let mut changed = false;
    egui::ComboBox::from_label("Accuracy")
        .selected_text(format!("{:?}", options.accuracy))
        .show_ui(ui, |ui| {
            for tier in ACCURACY_TIERS {
                changed |= ui
                    .selectable_value(&mut options.accuracy, tier, format!("{tier:?}"))
                    .changed();
            }
        });
    changed |= ui
        .add(
            egui::DragValue::new(&mut options.min_time_interval_ms)
                .range(100..=60_000)
                .suffix(" ms")
                .prefix("Every "),
        )
        .changed();
    changed |= ui
        .add(
            egui::DragValue::new(&mut options.min_distance_meters)
                .range(0.0..=500.0)
                .speed(0.5)
                .suffix(" m")
                .prefix("Moved "),
        )
        .changed();
    if changed {
        actions.push(UiAction::TrackingOptionsChanged);
    }

    ui.add_space(8.0);
    ui.separator();
    ui.label(RichText::new("Simulated position").strong());
    ui.label(view.replay_source);
    #[cfg(not(target_os = "android"))]
    {
        if ui.button("📂 Replay GPX…").clicked() {
            actions.push(UiAction::PickReplayGpx);
        }
    }
}

fn render_settings_tab(
    ui: &mut Ui,
    ui_settings: &mut UiSettings,
    view: &PanelView<'_>,
    actions: &mut Vec<UiAction>,
) {
    egui::ComboBox::from_label("Map tiles")
        .selected_text(ui_settings.tiles_provider.name())
        .show_ui(ui, |ui| {
            for &provider in TilesProvider::all() {
                ui.selectable_value(&mut ui_settings.tiles_provider, provider, provider.name());
            }
        });

    ui.add(egui::Slider::new(&mut ui_settings.trail_width, 1.0..=10.0).text("Trail width"));
    ui.checkbox(&mut ui_settings.show_nodes, "Show trail nodes");

    if ui.button("🗺 Fit site").clicked() {
        actions.push(UiAction::FitSite);
    }

    ui.add_space(8.0);
    ui.separator();
    ui.label(RichText::new("Site data").strong());
    ui.label(format!(
        "{} trail nodes, {} trails, {} places",
        view.graph.points().len(),
        view.graph.edges().len(),
        view.graph.map_points().len()
    ));

    if view.validation.is_clean() {
        ui.label(RichText::new("✔ Trail graph is consistent").color(Color32::DARK_GREEN));
    } else {
        ui.label(
            RichText::new(format!("⚠ {} warnings", view.validation.warnings.len()))
                .color(ui.visuals().warn_fg_color),
        );
        egui::ScrollArea::vertical()
            .id_salt("validation_scroll")
            .max_height(120.0)
            .show(ui, |ui| {
                for warning in &view.validation.warnings {
                    ui.label(RichText::new(format!("• {warning}")).small());
                }
            });
    }

    for notice in view.notices {
        ui.label(RichText::new(format!("⚠ {notice}")).color(Color32::RED));
    }

    ui.add_space(8.0);
    ui.separator();
    ui.label(RichText::new(eframe_entrypoints::short_version_info("Trail Map")).small().weak());
}

#[cfg(test)]
mod tests {
    use super::*;
    use trail_map_lib::{Edge, Point, PointKind, UserLocation, loader};

    #[test]
    fn test_banner_for_error_and_denial() {
        let mut state = TrackerState::default();
        assert_eq!(banner_message(&state), None);

        // No location while following is silent
        state.is_tracking = true;
        state.is_loading = true;
        assert_eq!(banner_message(&state), None);

        state.permission = PermissionStatus::Denied;
        assert_eq!(
            banner_message(&state).as_deref(),
            Some("Location permission denied")
        );

        state.error = Some("Location unavailable (GPS disabled or no fix)".into());
        assert_eq!(
            banner_message(&state).as_deref(),
            Some("Location unavailable (GPS disabled or no fix)")
        );
    }

    #[test]
    fn test_banner_clears_with_fix() {
        let state = TrackerState {
            location: Some(UserLocation::new(16.0, 108.0, 1)),
            permission: PermissionStatus::Granted,
            is_tracking: true,
            ..TrackerState::default()
        };
        assert_eq!(banner_message(&state), None);
    }

    #[test]
    fn test_attachment_labels() {
        let a = Point::new(16.0, 108.0, PointKind::Entrance).with_label("Main gate");
        let b = Point::new(16.001, 108.0, PointKind::DeadEnd);
        let mut edge = Edge::new("e1", a.id.clone(), b.id.clone());
        edge.note = Some("steep stairs".into());
        let graph = TrailGraph::new(vec![a.clone(), b], vec![edge], vec![]).unwrap();

        assert_eq!(
            attachment_label(&graph, &Attachment::Node(a.id.clone())),
            "On trail node Main gate (1 trails)"
        );
        assert_eq!(
            attachment_label(&graph, &Attachment::Edge("e1".into())),
            "Along trail e1: steep stairs"
        );
        assert_eq!(
            attachment_label(&graph, &Attachment::Edge("e9".into())),
            "Attached to missing trail e9"
        );
    }

    #[test]
    fn test_sample_site_attachments_resolve() {
        let graph = loader::sample_site().unwrap();
        for map_point in graph.map_points() {
            if let Some(attachment) = &map_point.attached_to {
                assert!(!attachment_label(&graph, attachment).starts_with("Attached to missing"));
            }
        }
    }
}
