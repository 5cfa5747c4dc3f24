//! Attendance model: one record per employee per office-local calendar day.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Punctuality classification for a check-in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Late => "LATE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PRESENT" => Some(AttendanceStatus::Present),
            "LATE" => Some(AttendanceStatus::Late),
            _ => None,
        }
    }
}

/// An attendance record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: String,
    pub company_id: String,
    pub employee_id: String,
    /// Office-local calendar day; unique per employee
    pub day: NaiveDate,
    pub check_in_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_out_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_in_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_in_lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_out_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_out_lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: AttendanceStatus,
    /// Set on check-out: (out - in) minus break, two decimal places
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_hours: Option<f64>,
    pub break_minutes: i64,
    /// Whether the check-in point passed geofence verification
    pub is_verified: bool,
}

/// Request body for check-in and check-out.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendancePunchRequest {
    pub employee_id: String,
    pub company_id: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}
