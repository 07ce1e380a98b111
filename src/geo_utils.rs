//! Geographic utilities: great-circle distance, path length and bounds.
//!
//! Distances use the haversine formula on a sphere of radius
//! [`EARTH_RADIUS_M`], the same model the route lengths shown to users were
//! computed with, so remaining distances never drift from recorded totals.

use std::ops::RangeInclusive;

use geo::{BoundingRect, Coord, LineString};

use crate::{Bounds, GeoPoint};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_009.0;

/// Haversine distance between two points in meters.
///
/// # Example
/// ```
/// use route_pilot::GeoPoint;
/// use route_pilot::geo_utils::haversine_distance;
///
/// let london = GeoPoint::new(51.5074, -0.1278);
/// let paris = GeoPoint::new(48.8566, 2.3522);
/// let d = haversine_distance(&london, &paris);
/// assert!((d - 343_500.0).abs() < 1_000.0);
/// ```
pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = hav(dlat) + lat1.cos() * lat2.cos() * hav(dlng);

    // Rounding can push h just past 1 for antipodal points
    2.0 * EARTH_RADIUS_M * h.clamp(0.0, 1.0).sqrt().asin()
}

fn hav(x: f64) -> f64 {
    let sin_half = (x * 0.5).sin();
    sin_half * sin_half
}

/// Length in meters of the track between two indices, both inclusive.
///
/// A single-point range has zero length.
///
/// # Panics
/// If the range is reversed or ends past the track. Callers derive ranges
/// from indices into the same track, so this is a bug rather than bad input.
pub fn path_length(track: &[GeoPoint], range: RangeInclusive<usize>) -> f64 {
    let (start, end) = (*range.start(), *range.end());
    assert!(
        start <= end && end < track.len(),
        "path range {}..={} out of bounds for track of {} points",
        start,
        end,
        track.len()
    );

    track[start..=end]
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Total length of a polyline in meters.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    match points.len() {
        0 => 0.0,
        n => path_length(points, 0..=n - 1),
    }
}

/// Bounding box of a set of points, `None` if there are none.
pub fn compute_bounds(points: &[GeoPoint]) -> Option<Bounds> {
    let line: LineString<f64> = points
        .iter()
        .map(|p| Coord {
            x: p.longitude,
            y: p.latitude,
        })
        .collect();

    line.bounding_rect().map(|rect| Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng: rect.min().x,
        max_lng: rect.max().x,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(lat, lng)
    }

    /// Points along the equator spaced `step` meters apart.
    fn equator_track(count: usize, step: f64) -> Vec<GeoPoint> {
        let step_deg = (step / EARTH_RADIUS_M).to_degrees();
        (0..count).map(|i| pt(0.0, i as f64 * step_deg)).collect()
    }

    #[test]
    fn test_haversine_same_point() {
        let p = pt(48.2082, 16.3738);
        assert!(haversine_distance(&p, &p).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_known_distance() {
        // Vienna to Bratislava ~55 km
        let vienna = pt(48.2082, 16.3738);
        let bratislava = pt(48.1486, 17.1077);
        let dist = haversine_distance(&vienna, &bratislava);
        assert!(
            dist > 50_000.0 && dist < 60_000.0,
            "Expected ~55 km, got {:.0} m",
            dist
        );
    }

    #[test]
    fn test_haversine_symmetric() {
        let pairs = [
            (pt(51.5074, -0.1278), pt(48.8566, 2.3522)),
            (pt(-33.8688, 151.2093), pt(40.7128, -74.0060)),
            (pt(0.0, 179.9), pt(0.0, -179.9)),
            (pt(89.9, 10.0), pt(-89.9, -170.0)),
        ];
        for (a, b) in pairs {
            let ab = haversine_distance(&a, &b);
            let ba = haversine_distance(&b, &a);
            assert!((ab - ba).abs() < 1e-6, "{} vs {}", ab, ba);
        }
    }

    #[test]
    fn test_haversine_antipodal_is_finite() {
        let a = pt(0.0, 0.0);
        let b = pt(0.0, 180.0);
        let d = haversine_distance(&a, &b);
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_M).abs() < 1.0);
    }

    #[test]
    fn test_path_length_single_point_is_zero() {
        let track = equator_track(4, 100.0);
        assert_eq!(path_length(&track, 2..=2), 0.0);
    }

    #[test]
    fn test_path_length_straight_line() {
        let track = equator_track(4, 100.0);
        let len = path_length(&track, 0..=3);
        assert!((len - 300.0).abs() < 1e-4, "Expected 300 m, got {}", len);
    }

    #[test]
    fn test_path_length_additive() {
        let track = vec![
            pt(48.0, 16.0),
            pt(48.01, 16.02),
            pt(48.03, 16.01),
            pt(48.02, 16.05),
            pt(48.05, 16.06),
            pt(48.04, 16.09),
        ];
        for i in 0..track.len() {
            for j in i..track.len() {
                for k in j..track.len() {
                    let whole = path_length(&track, i..=k);
                    let split = path_length(&track, i..=j) + path_length(&track, j..=k);
                    assert!((whole - split).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_path_length_uses_range_start() {
        // Distance is measured from the range start, not the track start
        let track = equator_track(5, 100.0);
        let len = path_length(&track, 3..=4);
        assert!((len - 100.0).abs() < 1e-4);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_path_length_past_end_panics() {
        let track = equator_track(3, 100.0);
        path_length(&track, 1..=3);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    #[allow(clippy::reversed_empty_ranges)]
    fn test_path_length_reversed_panics() {
        let track = equator_track(3, 100.0);
        path_length(&track, 2..=1);
    }

    #[test]
    fn test_polyline_length() {
        assert_eq!(polyline_length(&[]), 0.0);
        let track = equator_track(3, 250.0);
        assert!((polyline_length(&track) - 500.0).abs() < 1e-4);
    }

    #[test]
    fn test_compute_bounds() {
        assert!(compute_bounds(&[]).is_none());

        let bounds = compute_bounds(&[pt(48.0, 16.5), pt(48.5, 16.0), pt(48.2, 17.0)]).unwrap();
        assert_eq!(bounds.min_lat, 48.0);
        assert_eq!(bounds.max_lat, 48.5);
        assert_eq!(bounds.min_lng, 16.0);
        assert_eq!(bounds.max_lng, 17.0);
        assert_eq!(bounds.center(), pt(48.25, 16.5));
    }
}
