//! Point-of-interest marker styling
//!
//! Styles are a closed table keyed by [`MapPointType`]; the only per-marker
//! computation is whether the label is drawn at the current zoom.

use crate::camera::Region;
use crate::graph::{MapPoint, MapPointType};

/// An sRGB color
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Visual style of a marker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkerStyle {
    pub fill: Rgb,
    pub border: Rgb,
    pub icon: &'static str,
}

const fn style(fill: Rgb, border: Rgb, icon: &'static str) -> MarkerStyle {
    MarkerStyle { fill, border, icon }
}

const PAGODA: MarkerStyle = style(Rgb(214, 69, 65), Rgb(140, 30, 28), "⛩");
const CAVE: MarkerStyle = style(Rgb(121, 85, 72), Rgb(62, 39, 35), "🕳");
const VIEWPOINT: MarkerStyle = style(Rgb(33, 150, 243), Rgb(13, 71, 161), "👁");
const CHECKIN: MarkerStyle = style(Rgb(233, 30, 99), Rgb(136, 14, 79), "📷");
const STATUE: MarkerStyle = style(Rgb(158, 158, 158), Rgb(66, 66, 66), "🗿");
const GATE: MarkerStyle = style(Rgb(255, 152, 0), Rgb(230, 81, 0), "🚪");
const SHOP: MarkerStyle = style(Rgb(76, 175, 80), Rgb(27, 94, 32), "🛍");
const ELEVATOR: MarkerStyle = style(Rgb(96, 125, 139), Rgb(38, 50, 56), "⇅");
const EVENT: MarkerStyle = style(Rgb(156, 39, 176), Rgb(74, 20, 140), "🎉");
const WORKSHOP: MarkerStyle = style(Rgb(255, 193, 7), Rgb(255, 111, 0), "🔨");
const ATTRACTION: MarkerStyle = style(Rgb(0, 150, 136), Rgb(0, 77, 64), "★");
const RESTROOM: MarkerStyle = style(Rgb(3, 169, 244), Rgb(1, 87, 155), "🚻");
const GENERAL: MarkerStyle = style(Rgb(63, 81, 181), Rgb(26, 35, 126), "ℹ");
const DEFAULT: MarkerStyle = style(Rgb(120, 120, 120), Rgb(50, 50, 50), "●");

/// Style for a point-of-interest category
pub fn marker_style(kind: MapPointType) -> &'static MarkerStyle {
    match kind {
        MapPointType::Pagoda => &PAGODA,
        MapPointType::Cave => &CAVE,
        MapPointType::Viewpoint => &VIEWPOINT,
        MapPointType::Checkin => &CHECKIN,
        MapPointType::Statue => &STATUE,
        MapPointType::Gate => &GATE,
        MapPointType::Shop => &SHOP,
        MapPointType::Elevator => &ELEVATOR,
        MapPointType::Event => &EVENT,
        MapPointType::Workshop => &WORKSHOP,
        MapPointType::Attraction => &ATTRACTION,
        MapPointType::Restroom => &RESTROOM,
        MapPointType::General => &GENERAL,
        MapPointType::Default => &DEFAULT,
    }
}

/// Everything needed to draw one marker
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerAppearance<'a> {
    pub map_point: &'a MapPoint,
    pub style: &'static MarkerStyle,
    pub show_label: bool,
}

/// Resolve marker appearance for every point of interest in a viewport
pub fn marker_appearances<'a>(
    map_points: &'a [MapPoint],
    region: &Region,
) -> Vec<MarkerAppearance<'a>> {
    let show_label = region.labels_visible();
    map_points
        .iter()
        .map(|map_point| MarkerAppearance {
            map_point,
            style: marker_style(map_point.kind),
            show_label,
        })
        .collect()
}
