//! Spatial math for distances, approximate coordinate matching and sampling.

use rand::Rng;

use crate::models::Coordinate;

/// Tolerance used when deciding whether two coordinates describe the same
/// place: about 1.1 meters on the Earth's surface.
pub const COORDINATE_TOLERANCE_DEG: f64 = 0.00001;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Calculate distance between two points in meters (Haversine formula).
///
/// # Arguments
/// * `lat1`, `lon1` - First point coordinates in decimal degrees
/// * `lat2`, `lon2` - Second point coordinates in decimal degrees
///
/// # Returns
/// Distance in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Distance in meters between two coordinates.
pub fn distance_m(a: Coordinate, b: Coordinate) -> f64 {
    haversine_distance(a.lat, a.lng, b.lat, b.lng)
}

/// Longest distance between consecutive points, in meters.
///
/// Returns 0 for fewer than two points.
pub fn max_leg_distance_m(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|pair| distance_m(pair[0], pair[1]))
        .fold(0.0, f64::max)
}

/// Offset a position by distance and bearing.
///
/// # Arguments
/// * `lat`, `lon` - Starting position in degrees
/// * `distance_m` - Distance in meters
/// * `bearing_rad` - Bearing in radians (0 = north, π/2 = east)
///
/// # Returns
/// (new_lat, new_lon) in degrees
pub fn offset_by_bearing(lat: f64, lon: f64, distance_m: f64, bearing_rad: f64) -> (f64, f64) {
    if distance_m.abs() <= f64::EPSILON {
        return (lat, lon);
    }

    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();
    let angular_distance = distance_m / EARTH_RADIUS_M;

    let sin_lat1 = lat1.sin();
    let cos_lat1 = lat1.cos();
    let sin_ad = angular_distance.sin();
    let cos_ad = angular_distance.cos();

    let sin_lat2 = sin_lat1 * cos_ad + cos_lat1 * sin_ad * bearing_rad.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

    let y = bearing_rad.sin() * sin_ad * cos_lat1;
    let x = cos_ad - sin_lat1 * sin_lat2;
    let mut lon2 = lon1 + y.atan2(x);
    lon2 =
        (lon2 + std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI) - std::f64::consts::PI;

    (lat2.to_degrees(), lon2.to_degrees())
}

/// True when both components differ by at most `tolerance` degrees.
pub fn approx_eq(a: Coordinate, b: Coordinate, tolerance: f64) -> bool {
    (a.lat - b.lat).abs() <= tolerance && (a.lng - b.lng).abs() <= tolerance
}

/// Directed segment match: `a.0` must match `b.0` and `a.1` must match `b.1`.
/// A segment never matches its own reversal.
pub fn segment_approx_eq(
    a: (Coordinate, Coordinate),
    b: (Coordinate, Coordinate),
    tolerance: f64,
) -> bool {
    approx_eq(a.0, b.0, tolerance) && approx_eq(a.1, b.1, tolerance)
}

/// Sample from `Normal(mean, stdev)` with the Box-Muller transform.
///
/// A zero or negative `stdev` collapses to `mean`.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f64, stdev: f64) -> f64 {
    if stdev <= 0.0 || !stdev.is_finite() {
        return mean;
    }
    // (0, 1] keeps ln() finite
    let u: f64 = 1.0 - rng.random::<f64>();
    let v: f64 = rng.random::<f64>();
    let z = (-2.0 * u.ln()).sqrt() * (2.0 * std::f64::consts::PI * v).cos();
    z * stdev + mean
}

/// Sample a point around the midpoint of `a` and `b`.
///
/// Latitude and longitude are drawn independently, each with a standard
/// deviation of a quarter of the coordinate delta, so roughly 95% of samples
/// fall inside the bounding box of the pair.
pub fn sample_midpoint<R: Rng + ?Sized>(rng: &mut R, a: Coordinate, b: Coordinate) -> Coordinate {
    let lat_mean = (a.lat + b.lat) / 2.0;
    let lat_stdev = (a.lat - b.lat).abs() / 4.0;
    let lng_mean = (a.lng + b.lng) / 2.0;
    let lng_stdev = (a.lng - b.lng).abs() / 4.0;

    clamp_coordinate(Coordinate {
        lat: gaussian(rng, lat_mean, lat_stdev),
        lng: gaussian(rng, lng_mean, lng_stdev),
    })
}

/// Clamp to valid WGS84 bounds.
pub fn clamp_coordinate(c: Coordinate) -> Coordinate {
    Coordinate {
        lat: c.lat.clamp(-90.0, 90.0),
        lng: c.lng.clamp(-180.0, 180.0),
    }
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate { lat, lng }
    }

    #[test]
    fn test_haversine_known_distance() {
        // Madison, WI to Milwaukee, WI is ~120 km
        let dist = haversine_distance(43.0731, -89.4012, 43.0389, -87.9065);
        assert!(dist > 110_000.0 && dist < 130_000.0, "got {}", dist);
    }

    #[test]
    fn test_haversine_same_point() {
        assert!(distance_m(c(43.07, -89.40), c(43.07, -89.40)) < 0.001);
    }

    #[test]
    fn offset_by_bearing_round_trips_distance() {
        let (lat, lon) = offset_by_bearing(43.07, -89.40, 10_000.0, std::f64::consts::FRAC_PI_2);
        let dist = haversine_distance(43.07, -89.40, lat, lon);
        assert!((dist - 10_000.0).abs() < 1.0, "got {}", dist);
    }

    #[test]
    fn max_leg_distance_picks_longest_leg() {
        let points = [c(0.0, 0.0), c(0.0, 0.01), c(0.0, 0.05)];
        let longest = max_leg_distance_m(&points);
        let expected = distance_m(points[1], points[2]);
        assert!((longest - expected).abs() < 1e-6);
        assert_eq!(max_leg_distance_m(&points[..1]), 0.0);
    }

    #[test]
    fn approx_eq_is_inclusive_at_tolerance() {
        let a = c(43.0, -89.0);
        assert!(approx_eq(a, c(43.000005, -89.000005), COORDINATE_TOLERANCE_DEG));
        assert!(!approx_eq(a, c(43.00002, -89.0), COORDINATE_TOLERANCE_DEG));
    }

    #[test]
    fn segment_match_is_directional() {
        let a = c(43.0, -89.0);
        let b = c(43.001, -89.001);
        assert!(segment_approx_eq((a, b), (a, b), COORDINATE_TOLERANCE_DEG));
        assert!(!segment_approx_eq((a, b), (b, a), COORDINATE_TOLERANCE_DEG));
    }

    #[test]
    fn gaussian_with_zero_stdev_returns_mean() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(gaussian(&mut rng, 4.5, 0.0), 4.5);
    }

    #[test]
    fn gaussian_sample_mean_is_close() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 20_000;
        let sum: f64 = (0..n).map(|_| gaussian(&mut rng, 4.0, 1.0)).sum();
        let mean = sum / n as f64;
        assert!((mean - 4.0).abs() < 0.05, "sample mean {}", mean);
    }

    #[test]
    fn sampled_midpoint_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let m = sample_midpoint(&mut rng, c(89.9, 179.9), c(89.0, 179.0));
            assert!(m.lat <= 90.0 && m.lng <= 180.0);
        }
    }

    #[test]
    fn round_to_two_decimals() {
        assert_eq!(round_to(4.456, 2), 4.46);
        assert_eq!(round_to(1.0, 2), 1.0);
    }
}
