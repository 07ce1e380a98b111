//! Display strings for telemetry values.
//!
//! Unknown values render as [`UNKNOWN`].

use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};

/// Placeholder for a value that isn't known.
pub const UNKNOWN: &str = "-";

/// `"12.3 km/h"`.
pub fn format_speed(speed_kmh: Option<f32>) -> String {
    match speed_kmh {
        Some(speed) if speed.is_finite() => format!("{:.1} km/h", speed),
        _ => UNKNOWN.to_string(),
    }
}

/// `"1 h 05 min"`, truncated to whole minutes.
pub fn format_remaining_time(remaining: Option<Duration>) -> String {
    let Some(remaining) = remaining else {
        return UNKNOWN.to_string();
    };
    let secs = remaining.as_secs();
    let hours = secs / 3600;
    let minutes = (secs - hours * 3600) / 60;
    format!("{} h {:02} min", hours, minutes)
}

/// Arrival time as local `HH:MM`.
pub fn format_eta(eta: Option<DateTime<Utc>>) -> String {
    format_eta_in(eta, &Local)
}

/// Arrival time as `HH:MM` in `tz`.
pub fn format_eta_in<Tz: TimeZone>(eta: Option<DateTime<Utc>>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match eta {
        Some(eta) => eta.with_timezone(tz).format("%H:%M").to_string(),
        None => UNKNOWN.to_string(),
    }
}

/// `"850 m"` below a kilometer, `"2.5 km"` above.
pub fn format_distance(distance_m: Option<f64>) -> String {
    match distance_m {
        Some(d) if d.is_finite() && d < 1000.0 => format!("{:.0} m", d),
        Some(d) if d.is_finite() => format!("{:.1} km", d / 1000.0),
        _ => UNKNOWN.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(Some(12.34)), "12.3 km/h");
        assert_eq!(format_speed(Some(0.0)), "0.0 km/h");
        assert_eq!(format_speed(None), "-");
        assert_eq!(format_speed(Some(f32::NAN)), "-");
    }

    #[test]
    fn test_format_remaining_time() {
        assert_eq!(
            format_remaining_time(Some(Duration::from_secs(3_900))),
            "1 h 05 min"
        );
        assert_eq!(
            format_remaining_time(Some(Duration::from_secs(59))),
            "0 h 00 min"
        );
        assert_eq!(
            format_remaining_time(Some(Duration::from_secs(10 * 3600 + 59 * 60 + 59))),
            "10 h 59 min"
        );
        assert_eq!(format_remaining_time(None), "-");
    }

    #[test]
    fn test_format_eta() {
        let eta = Utc.with_ymd_and_hms(2024, 6, 1, 21, 7, 0).unwrap();
        let cest = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(format_eta_in(Some(eta), &cest), "23:07");
        assert_eq!(format_eta_in(Some(eta), &Utc), "21:07");
        assert_eq!(format_eta(None), "-");
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(Some(849.6)), "850 m");
        assert_eq!(format_distance(Some(2_460.0)), "2.5 km");
        assert_eq!(format_distance(None), "-");
    }
}
