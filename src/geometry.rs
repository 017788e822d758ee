/// Geometry helpers for canal bridge tracking

const EARTH_RADIUS_M: f64 = 6371000.0;

// Local metric frame scale factors used by the line-crossing test.
const LAT_SCALE_M_PER_DEG: f64 = 111320.0;

/// Haversine distance between two lat/lon points in meters.
pub fn haversine_distance_m(lat1_deg: f64, lon1_deg: f64, lat2_deg: f64, lon2_deg: f64) -> f64 {
    let dlat_rad = (lat2_deg - lat1_deg).to_radians();
    let dlon_rad = (lon2_deg - lon1_deg).to_radians();

    let a = (dlat_rad / 2.0).sin().powi(2)
        + lat1_deg.to_radians().cos() * lat2_deg.to_radians().cos() * (dlon_rad / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial bearing from position 1 to position 2 in degrees (0 = North, 90 = East).
pub fn initial_bearing(lat1_deg: f64, lon1_deg: f64, lat2_deg: f64, lon2_deg: f64) -> f64 {
    let lat1_rad = lat1_deg.to_radians();
    let lat2_rad = lat2_deg.to_radians();
    let dlon_rad = (lon2_deg - lon1_deg).to_radians();

    let y = dlon_rad.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * dlon_rad.cos();
    let bearing = y.atan2(x).to_degrees();
    (bearing + 360.0) % 360.0
}

// Given two angles in degrees, compute the smallest difference between a and b (i.e., a - b)
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let mut xx = ((a - b) % 360.0 + 360.0) % 360.0;
    if xx > 180.0 {
        xx -= 360.0;
    } else if xx < -180.0 {
        xx += 360.0;
    }
    xx
}

pub fn normalize0_360(angle: f64) -> f64 {
    (angle % 360.0 + 360.0) % 360.0
}

/// Signed projection of a point onto the canal direction at a bridge, in meters.
///
/// The point is first converted into a local metric frame centered on the
/// bridge, then projected onto the unit vector at `axis_bearing - 90°` (the
/// direction boats travel through the bridge line). A passage shows up as a
/// sign change between two consecutive projections.
pub fn canal_axis_projection(
    lat_deg: f64,
    lon_deg: f64,
    bridge_lat: f64,
    bridge_lon: f64,
    axis_bearing: f64,
) -> Option<f64> {
    if !lat_deg.is_finite() || !lon_deg.is_finite() {
        return None;
    }

    let lon_scale = LAT_SCALE_M_PER_DEG * bridge_lat.to_radians().cos();
    let north_m = (lat_deg - bridge_lat) * LAT_SCALE_M_PER_DEG;
    let east_m = (lon_deg - bridge_lon) * lon_scale;

    let travel_bearing = normalize0_360(axis_bearing - 90.0).to_radians();
    // Bearing is measured clockwise from north, so north gets cos, east gets sin.
    let proj = north_m * travel_bearing.cos() + east_m * travel_bearing.sin();
    if proj.is_finite() { Some(proj) } else { None }
}
