//! Utility functions for coordinate handling and viewport math

/// Mean Earth radius in meters (used by the Haversine formula)
pub const EARTH_RADIUS_M: f64 = 6371000.0;

/// Approximate length of one degree of latitude in meters
pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Marker labels become visible at or above this zoom level
pub const LABEL_ZOOM_THRESHOLD: f64 = 17.5;

/// Fixed-point scale used when deriving node ids (6 decimal places, ~11cm)
const ID_SCALE: f64 = 1e6;

/// Derive a stable node id from a coordinate.
///
/// Coordinates are rounded to 6 decimal places before formatting, so two
/// points at the same physical location always produce the same id.
#[inline]
pub fn node_id(latitude: f64, longitude: f64) -> String {
    let lat = (latitude * ID_SCALE).round() as i64;
    let lon = (longitude * ID_SCALE).round() as i64;
    format!("pt_{lat}_{lon}")
}

/// Map zoom level implied by a viewport's longitude span.
///
/// `zoom = log2(360 / longitude_delta)`. A zero span yields infinity and a
/// negative or NaN span yields NaN, which compares false against any threshold.
#[inline]
pub fn zoom_for_longitude_delta(longitude_delta: f64) -> f64 {
    (360.0 / longitude_delta).log2()
}

/// Inverse of [`zoom_for_longitude_delta`]
#[inline]
pub fn longitude_delta_for_zoom(zoom: f64) -> f64 {
    360.0 / zoom.exp2()
}

/// Whether marker labels should be drawn for the given viewport span
#[inline]
pub fn labels_visible(longitude_delta: f64) -> bool {
    zoom_for_longitude_delta(longitude_delta) >= LABEL_ZOOM_THRESHOLD
}

/// Convert a north-south distance in meters to degrees of latitude
#[inline]
pub fn meters_to_latitude_degrees(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE_LAT
}

/// Haversine distance between two WGS84 coordinates in meters
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Ease-out cubic curve on `t` in `[0, 1]`
#[inline]
pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

/// Check that a latitude/longitude pair is finite and within WGS84 range
#[inline]
pub fn is_valid_wgs84(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}
