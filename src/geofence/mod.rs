//! Attendance geofence verifier.
//!
//! Pure functions: great-circle distance, point-in-geofence containment and
//! punctuality classification. All wall-clock math happens in the single
//! configured organizational offset, never the server's local zone.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};

use crate::models::{AttendanceStatus, GeofenceLocation};

/// Spherical Earth radius in meters.
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates via the haversine formula.
/// Symmetric, and zero for identical points.
pub fn distance_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// True when the point lies within at least one active geofence. With zero
/// active geofences configured this is fail-open: absence of configuration
/// is not a denial.
pub fn verify_location(lat: f64, lng: f64, geofences: &[GeofenceLocation]) -> bool {
    let active: Vec<&GeofenceLocation> = geofences.iter().filter(|g| g.active).collect();
    if active.is_empty() {
        return true;
    }

    active
        .iter()
        .any(|g| distance_meters(lat, lng, g.latitude, g.longitude) <= g.radius_meters)
}

/// Classify a check-in instant against the office start plus grace period.
/// Strictly after the threshold is LATE; at or before is PRESENT.
pub fn classify_punctuality(
    check_in: DateTime<Utc>,
    office_start_hour: u32,
    office_start_minute: u32,
    grace_minutes: i64,
    office_offset: FixedOffset,
) -> AttendanceStatus {
    let local = check_in.with_timezone(&office_offset);
    let start_of_day = local
        .date_naive()
        .and_hms_opt(office_start_hour, office_start_minute, 0)
        .expect("office start time out of range");
    let threshold = office_offset
        .from_local_datetime(&start_of_day)
        .single()
        .expect("fixed offsets have no ambiguous local times")
        + Duration::minutes(grace_minutes);

    if local > threshold {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

/// The office-local calendar day containing an instant. "Today" boundaries
/// follow the organizational offset, not the server zone.
pub fn office_local_day(instant: DateTime<Utc>, office_offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&office_offset).date_naive()
}

/// Worked hours for a completed attendance: checkout minus checkin minus the
/// break, rounded to two decimals. Negative or missing break data is zero.
pub fn total_hours(
    check_in: DateTime<Utc>,
    check_out: DateTime<Utc>,
    break_minutes: i64,
) -> f64 {
    let worked = check_out - check_in - Duration::minutes(break_minutes.max(0));
    let hours = worked.num_seconds() as f64 / 3600.0;
    (hours.max(0.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn fence(lat: f64, lng: f64, radius: f64, active: bool) -> GeofenceLocation {
        GeofenceLocation {
            id: "g1".to_string(),
            company_id: "T1".to_string(),
            name: "HQ".to_string(),
            latitude: lat,
            longitude: lng,
            radius_meters: radius,
            active,
        }
    }

    #[test]
    fn test_distance_symmetric_and_zero_at_identity() {
        let d1 = distance_meters(52.52, 13.405, 48.8566, 2.3522);
        let d2 = distance_meters(48.8566, 2.3522, 52.52, 13.405);
        assert!((d1 - d2).abs() < 1e-6);
        assert_eq!(distance_meters(10.0, 20.0, 10.0, 20.0), 0.0);
    }

    #[test]
    fn test_distance_known_value() {
        // Berlin to Paris is roughly 878 km
        let d = distance_meters(52.52, 13.405, 48.8566, 2.3522);
        assert!(d > 870_000.0 && d < 890_000.0);
    }

    #[test]
    fn test_distance_monotonic_with_separation() {
        let near = distance_meters(0.0, 0.0, 0.0, 0.1);
        let far = distance_meters(0.0, 0.0, 0.0, 0.2);
        assert!(far > near);
    }

    #[test]
    fn test_verify_location_fail_open_without_fences() {
        assert!(verify_location(52.52, 13.405, &[]));
        // Inactive fences count as unconfigured
        assert!(verify_location(52.52, 13.405, &[fence(0.0, 0.0, 10.0, false)]));
    }

    #[test]
    fn test_verify_location_containment() {
        let fences = vec![fence(52.52, 13.405, 200.0, true)];
        assert!(verify_location(52.52, 13.405, &fences));
        // ~1.1 km north of center
        assert!(!verify_location(52.53, 13.405, &fences));
    }

    #[test]
    fn test_punctuality_boundary_is_exclusive_on_late_side() {
        let offset = FixedOffset::east_opt(0).unwrap();
        // Office 09:00, grace 15 -> threshold 09:15
        let at_threshold = classify_punctuality(utc(2026, 8, 25, 9, 15), 9, 0, 15, offset);
        assert_eq!(at_threshold, AttendanceStatus::Present);

        let one_minute_late = classify_punctuality(utc(2026, 8, 25, 9, 16), 9, 0, 15, offset);
        assert_eq!(one_minute_late, AttendanceStatus::Late);
    }

    #[test]
    fn test_punctuality_uses_office_offset() {
        // UTC+2 office: 07:20 UTC is 09:20 local -> late past a 09:15 threshold
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let status = classify_punctuality(utc(2026, 8, 25, 7, 20), 9, 0, 15, offset);
        assert_eq!(status, AttendanceStatus::Late);

        let early = classify_punctuality(utc(2026, 8, 25, 6, 50), 9, 0, 15, offset);
        assert_eq!(early, AttendanceStatus::Present);
    }

    #[test]
    fn test_office_local_day_crosses_midnight() {
        let offset = FixedOffset::east_opt(5 * 3600).unwrap();
        // 22:00 UTC is 03:00 next day at UTC+5
        let day = office_local_day(utc(2026, 8, 25, 22, 0), offset);
        assert_eq!(day, NaiveDate::from_ymd_opt(2026, 8, 26).unwrap());
    }

    #[test]
    fn test_total_hours_rounding_and_break() {
        let check_in = utc(2026, 8, 25, 9, 0);
        let check_out = utc(2026, 8, 25, 17, 30);
        assert_eq!(total_hours(check_in, check_out, 30), 8.0);
        assert_eq!(total_hours(check_in, check_out, 0), 8.5);
        // Negative break treated as zero deduction
        assert_eq!(total_hours(check_in, check_out, -45), 8.5);
    }
}
