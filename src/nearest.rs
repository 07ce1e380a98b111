//! Nearest track point search.
//!
//! A plain linear scan. Waypoint alignment needs the *first* minimum to be
//! picked when distances tie, which a spatial index doesn't promise, and the
//! scan range shrinks as projection advances along the track anyway.

use crate::geo_utils::haversine_distance;
use crate::GeoPoint;

/// Position of the first item yielding the smallest key, or `None` when the
/// iterator is empty.
///
/// Later items only win when strictly smaller, so ties keep the lowest
/// position. Incomparable keys (NaN) never win unless every key is
/// incomparable, in which case the first position is returned.
///
/// # Example
/// ```
/// use route_pilot::nearest::min_position_by;
///
/// assert_eq!(min_position_by(["12", "43", "4", "55"], |s| s.parse::<i32>().unwrap()), Some(2));
/// assert_eq!(min_position_by(Vec::<i32>::new(), |v| *v), None);
/// ```
pub fn min_position_by<I, K, F>(items: I, mut key: F) -> Option<usize>
where
    I: IntoIterator,
    K: PartialOrd,
    F: FnMut(&I::Item) -> K,
{
    let mut found = false;
    let mut min: Option<(usize, K)> = None;

    for (position, item) in items.into_iter().enumerate() {
        found = true;
        let value = key(&item);
        if value.partial_cmp(&value).is_none() {
            continue;
        }
        let smaller = match &min {
            Some((_, min_value)) => value < *min_value,
            None => true,
        };
        if smaller {
            min = Some((position, value));
        }
    }

    match min {
        Some((position, _)) => Some(position),
        // Nothing comparable: fall back to the first position
        None if found => Some(0),
        None => None,
    }
}

/// Absolute index of the track point closest to `target`, searching from
/// `start_offset` to the end.
///
/// Returns `None` only when there is nothing to search (empty track or an
/// offset at or past the end). Equidistant points resolve to the lower index.
pub fn nearest_index(points: &[GeoPoint], target: &GeoPoint, start_offset: usize) -> Option<usize> {
    let candidates = points.get(start_offset..)?;
    min_position_by(candidates, |p| haversine_distance(p, target)).map(|i| start_offset + i)
}
