// Copyright (C) 2025 The Geotrack Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ingestion request schema.
//!
//! Trackers send either one point or a batch:
//!
//! ```text
//! { "deviceId": "T-100", "lat": 34.05, "lng": -118.25, "timestamp": "2024-01-01T00:00:00Z",
//!   "speed": 40, "battery": 88, "ignition": true }
//!
//! { "deviceId": "T-100", "points": [ { "lat": .., "lng": .., "timestamp": .. }, .. ] }
//! ```
//!
//! The body is resolved exactly once into an [`IngestionRequest`]. Nothing
//! downstream looks at raw JSON again.
//!
//! # Field policy
//!
//! | Field | Required | Position log | Device state |
//! |-------|----------|--------------|--------------|
//! | `lat`, `lng` | yes, numbers | as sent | as sent |
//! | `timestamp` | yes | parsed, UTC | parsed, UTC |
//! | `speed` | no | NULL when absent | `0` when absent |
//! | `battery` | no | NULL when absent | NULL when absent |
//! | `ignition` | no | NULL when absent | `false` when absent |
//!
//! Accepted timestamps: RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.f]` (read as
//! UTC), bare `YYYY-MM-DD`, or integer epoch milliseconds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::model::{LastPosition, PositionSample};

/// A validated telemetry point.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Event time.
    pub timestamp: DateTime<Utc>,
    /// Speed, if reported.
    pub speed: Option<f64>,
    /// Battery level, if reported.
    pub battery: Option<f64>,
    /// Ignition state, if reported.
    pub ignition: Option<bool>,
}

impl TelemetryPoint {
    /// Build the position log row for this point. Optional fields stay raw.
    pub fn to_sample(&self, company_id: &str, device_id: &str) -> PositionSample {
        PositionSample {
            company_id: company_id.to_string(),
            device_id: device_id.to_string(),
            lat: self.lat,
            lng: self.lng,
            speed: self.speed,
            battery: self.battery,
            ignition: self.ignition,
            timestamp: self.timestamp,
        }
    }

    /// Build the device state cache value. Absent speed reads as 0 and absent
    /// ignition as `false`; battery stays nullable.
    pub fn to_last_position(&self) -> LastPosition {
        LastPosition {
            lat: Some(self.lat),
            lng: Some(self.lng),
            speed: Some(self.speed.unwrap_or(0.0)),
            battery: self.battery,
            ignition: Some(self.ignition.unwrap_or(false)),
            timestamp: Some(self.timestamp),
        }
    }
}

/// A validated ingestion submission.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestionRequest {
    /// The top-level object carried the point fields itself.
    SinglePoint {
        /// Trimmed external device identifier.
        device_id: String,
        /// The one point.
        point: TelemetryPoint,
    },
    /// The object carried a non-empty `points` array.
    Batch {
        /// Trimmed external device identifier.
        device_id: String,
        /// All points, in submission order.
        points: Vec<TelemetryPoint>,
    },
}

impl IngestionRequest {
    /// Parse and validate a raw request body.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| CoreError::invalid(format!("body is not valid JSON: {}", e)))?;
        Self::from_value(value)
    }

    /// Validate an already-decoded JSON body.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut body) = value else {
            return Err(CoreError::invalid("body must be a JSON object"));
        };

        let device_id = match body.get("deviceId") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::String(_)) => return Err(CoreError::invalid("deviceId must not be blank")),
            Some(Value::Null) | None => return Err(CoreError::invalid("deviceId is required")),
            Some(_) => return Err(CoreError::invalid("deviceId must be a string")),
        };

        match body.remove("points") {
            Some(Value::Array(items)) => {
                if items.is_empty() {
                    return Err(CoreError::invalid("points must not be empty"));
                }
                let points = items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| parse_point(item, &format!("points[{}]", index)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Batch { device_id, points })
            }
            // A non-array `points` does not select batch mode.
            _ => {
                let point = parse_point(Value::Object(body), "point")?;
                Ok(Self::SinglePoint { device_id, point })
            }
        }
    }

    /// External device identifier the tracker reported with.
    pub fn device_id(&self) -> &str {
        match self {
            Self::SinglePoint { device_id, .. } | Self::Batch { device_id, .. } => device_id,
        }
    }

    /// All points carried by the request.
    pub fn points(&self) -> &[TelemetryPoint] {
        match self {
            Self::SinglePoint { point, .. } => std::slice::from_ref(point),
            Self::Batch { points, .. } => points,
        }
    }

    /// Number of points carried by the request.
    pub fn len(&self) -> usize {
        self.points().len()
    }

    /// True for a batch with no points. Parsing never produces one, but a
    /// batch built directly can.
    pub fn is_empty(&self) -> bool {
        self.points().is_empty()
    }

    /// The point with the latest event time, or `None` for an empty batch.
    /// The earliest submitted point wins a tie.
    pub fn latest_point(&self) -> Option<&TelemetryPoint> {
        let (first, rest) = self.points().split_first()?;
        let mut latest = first;
        for point in rest {
            if point.timestamp > latest.timestamp {
                latest = point;
            }
        }
        Some(latest)
    }

    /// Build one position log row per point, all stamped with the same tenant
    /// and external identifier.
    pub fn to_samples(&self, company_id: &str) -> Vec<PositionSample> {
        let device_id = self.device_id();
        self.points()
            .iter()
            .map(|point| point.to_sample(company_id, device_id))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct WirePoint {
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lng: Option<f64>,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    battery: Option<f64>,
    #[serde(default)]
    ignition: Option<bool>,
}

fn parse_point(value: Value, label: &str) -> Result<TelemetryPoint> {
    if !value.is_object() {
        return Err(CoreError::invalid(format!("{} must be an object", label)));
    }

    let wire: WirePoint = serde_json::from_value(value)
        .map_err(|e| CoreError::invalid(format!("{}: {}", label, e)))?;

    let lat = wire
        .lat
        .ok_or_else(|| CoreError::invalid(format!("{}: lat is required", label)))?;
    let lng = wire
        .lng
        .ok_or_else(|| CoreError::invalid(format!("{}: lng is required", label)))?;
    let timestamp = wire
        .timestamp
        .ok_or_else(|| CoreError::invalid(format!("{}: timestamp is required", label)))?;
    let timestamp = parse_timestamp(&timestamp).ok_or_else(|| {
        CoreError::invalid(format!("{}: timestamp is not a valid date/time", label))
    })?;

    Ok(TelemetryPoint {
        lat,
        lng,
        timestamp,
        speed: wire.speed,
        battery: wire.battery,
        ignition: wire.ignition,
    })
}

/// Integer epoch milliseconds or one of the textual forms. Fractional
/// numbers are rejected.
fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::String(text) => parse_timestamp_str(text.trim()),
        _ => None,
    }
}

/// Parse a timestamp string in any of the accepted textual forms.
pub fn parse_timestamp_str(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_704_067_200 + secs, 0).unwrap()
    }

    fn expect_invalid(value: Value) -> String {
        match IngestionRequest::from_value(value) {
            Err(CoreError::InvalidRequest { message }) => message,
            other => panic!("expected InvalidRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_single_point() {
        let request = IngestionRequest::from_value(json!({
            "deviceId": "T-100",
            "lat": 34.05,
            "lng": -118.25,
            "timestamp": "2024-01-01T00:00:00Z",
            "speed": 40,
            "battery": 88,
            "ignition": true
        }))
        .unwrap();

        let IngestionRequest::SinglePoint { device_id, point } = &request else {
            panic!("expected single point, got {:?}", request);
        };
        assert_eq!(device_id, "T-100");
        assert_eq!(point.lat, 34.05);
        assert_eq!(point.lng, -118.25);
        assert_eq!(point.timestamp, ts(0));
        assert_eq!(point.speed, Some(40.0));
        assert_eq!(point.battery, Some(88.0));
        assert_eq!(point.ignition, Some(true));
        assert_eq!(request.len(), 1);
    }

    #[test]
    fn test_batch() {
        let request = IngestionRequest::from_value(json!({
            "deviceId": "T-100",
            "points": [
                { "lat": 1.0, "lng": 2.0, "timestamp": "2024-01-01T00:00:00Z" },
                { "lat": 3.0, "lng": 4.0, "timestamp": "2024-01-01T00:00:10Z", "speed": 12.5 }
            ]
        }))
        .unwrap();

        assert!(matches!(request, IngestionRequest::Batch { .. }));
        assert_eq!(request.len(), 2);
        assert_eq!(request.points()[1].speed, Some(12.5));
    }

    #[test]
    fn test_device_id_is_trimmed() {
        let request = IngestionRequest::from_value(json!({
            "deviceId": "  T-100 \n",
            "lat": 1.0, "lng": 2.0, "timestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(request.device_id(), "T-100");
    }

    #[test]
    fn test_missing_device_id() {
        let message = expect_invalid(json!({
            "lat": 1.0, "lng": 2.0, "timestamp": "2024-01-01T00:00:00Z"
        }));
        assert!(message.contains("deviceId"));
    }

    #[test]
    fn test_blank_device_id() {
        let message = expect_invalid(json!({
            "deviceId": "   ",
            "lat": 1.0, "lng": 2.0, "timestamp": "2024-01-01T00:00:00Z"
        }));
        assert!(message.contains("blank"));
    }

    #[test]
    fn test_non_string_device_id() {
        expect_invalid(json!({
            "deviceId": 100,
            "lat": 1.0, "lng": 2.0, "timestamp": "2024-01-01T00:00:00Z"
        }));
    }

    #[test]
    fn test_empty_points() {
        let message = expect_invalid(json!({ "deviceId": "T-100", "points": [] }));
        assert!(message.contains("empty"));
    }

    #[test]
    fn test_one_bad_point_rejects_batch() {
        let message = expect_invalid(json!({
            "deviceId": "T-100",
            "points": [
                { "lat": 1.0, "lng": 2.0, "timestamp": "2024-01-01T00:00:00Z" },
                { "lat": 1.0, "lng": 2.0, "timestamp": "2024-01-01T00:00:01Z" },
                { "lng": 2.0, "timestamp": "2024-01-01T00:00:02Z" },
                { "lat": 1.0, "lng": 2.0, "timestamp": "2024-01-01T00:00:03Z" },
                { "lat": 1.0, "lng": 2.0, "timestamp": "2024-01-01T00:00:04Z" }
            ]
        }));
        assert!(message.contains("points[2]"));
        assert!(message.contains("lat"));
    }

    #[test]
    fn test_null_lat_rejected() {
        let message = expect_invalid(json!({
            "deviceId": "T-100", "lat": null, "lng": 2.0, "timestamp": "2024-01-01T00:00:00Z"
        }));
        assert!(message.contains("lat is required"));
    }

    #[test]
    fn test_zero_coordinates_accepted() {
        let request = IngestionRequest::from_value(json!({
            "deviceId": "T-100", "lat": 0, "lng": 0, "timestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(request.points()[0].lat, 0.0);
    }

    #[test]
    fn test_unparseable_timestamp() {
        let message = expect_invalid(json!({
            "deviceId": "T-100", "lat": 1.0, "lng": 2.0, "timestamp": "yesterday"
        }));
        assert!(message.contains("timestamp"));
    }

    #[test]
    fn test_fractional_epoch_timestamp_rejected() {
        let message = expect_invalid(json!({
            "deviceId": "T-100", "lat": 1.0, "lng": 2.0, "timestamp": 1_704_067_200_000.5
        }));
        assert_eq!(message, "point: timestamp is not a valid date/time");

        let message = expect_invalid(json!({
            "deviceId": "T-100", "lat": 1.0, "lng": 2.0, "timestamp": true
        }));
        assert_eq!(message, "point: timestamp is not a valid date/time");
    }

    #[test]
    fn test_non_numeric_lat() {
        expect_invalid(json!({
            "deviceId": "T-100", "lat": "north", "lng": 2.0, "timestamp": "2024-01-01T00:00:00Z"
        }));
    }

    #[test]
    fn test_non_array_points_falls_back_to_single_point() {
        let request = IngestionRequest::from_value(json!({
            "deviceId": "T-100",
            "points": "not-a-list",
            "lat": 1.0, "lng": 2.0, "timestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(matches!(request, IngestionRequest::SinglePoint { .. }));

        expect_invalid(json!({ "deviceId": "T-100", "points": { "lat": 1.0 } }));
    }

    #[test]
    fn test_body_must_be_object() {
        expect_invalid(json!([1, 2, 3]));
        assert!(matches!(
            IngestionRequest::from_json(b"not json"),
            Err(CoreError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_timestamp_forms() {
        assert_eq!(parse_timestamp_str("2024-01-01T00:00:00Z"), Some(ts(0)));
        assert_eq!(parse_timestamp_str("2024-01-01T02:00:00+02:00"), Some(ts(0)));
        assert_eq!(parse_timestamp_str("2024-01-01T00:00:05"), Some(ts(5)));
        assert_eq!(parse_timestamp_str("2024-01-01 00:00:05.000"), Some(ts(5)));
        assert_eq!(parse_timestamp_str("2024-01-01"), Some(ts(0)));
        assert_eq!(parse_timestamp_str("01/01/2024"), None);

        let request = IngestionRequest::from_value(json!({
            "deviceId": "T-100", "lat": 1.0, "lng": 2.0, "timestamp": 1_704_067_210_000_i64
        }))
        .unwrap();
        assert_eq!(request.points()[0].timestamp, ts(10));
    }

    #[test]
    fn test_latest_point_is_by_timestamp_not_position() {
        let request = IngestionRequest::from_value(json!({
            "deviceId": "T-100",
            "points": [
                { "lat": 1.0, "lng": 1.0, "timestamp": "2024-01-01T00:00:00Z" },
                { "lat": 2.0, "lng": 2.0, "timestamp": "2024-01-01T00:00:10Z" },
                { "lat": 3.0, "lng": 3.0, "timestamp": "2024-01-01T00:00:05Z" }
            ]
        }))
        .unwrap();

        let latest = request.latest_point().unwrap();
        assert_eq!(latest.lat, 2.0);
        assert_eq!(latest.timestamp, ts(10));
    }

    #[test]
    fn test_latest_point_tie_keeps_first() {
        let request = IngestionRequest::from_value(json!({
            "deviceId": "T-100",
            "points": [
                { "lat": 1.0, "lng": 1.0, "timestamp": "2024-01-01T00:00:10Z" },
                { "lat": 2.0, "lng": 2.0, "timestamp": "2024-01-01T00:00:10Z" }
            ]
        }))
        .unwrap();
        assert_eq!(request.latest_point().unwrap().lat, 1.0);
    }

    #[test]
    fn test_latest_point_of_empty_batch() {
        let request = IngestionRequest::Batch {
            device_id: "T-100".to_string(),
            points: Vec::new(),
        };
        assert!(request.is_empty());
        assert!(request.latest_point().is_none());
    }

    #[test]
    fn test_default_policy() {
        let point = TelemetryPoint {
            lat: 1.0,
            lng: 2.0,
            timestamp: ts(0),
            speed: None,
            battery: None,
            ignition: None,
        };

        let sample = point.to_sample("acme", "T-100");
        assert_eq!(sample.speed, None);
        assert_eq!(sample.battery, None);
        assert_eq!(sample.ignition, None);

        let cached = point.to_last_position();
        assert_eq!(cached.speed, Some(0.0));
        assert_eq!(cached.battery, None);
        assert_eq!(cached.ignition, Some(false));
        assert_eq!(cached.timestamp, Some(ts(0)));
    }

    #[test]
    fn test_samples_carry_tenant_and_external_id() {
        let request = IngestionRequest::from_value(json!({
            "deviceId": "XYZ",
            "points": [
                { "lat": 1.0, "lng": 1.0, "timestamp": "2024-01-01T00:00:00Z" },
                { "lat": 2.0, "lng": 2.0, "timestamp": "2024-01-01T00:00:01Z" }
            ]
        }))
        .unwrap();

        let samples = request.to_samples("acme");
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.company_id == "acme" && s.device_id == "XYZ"));
    }
}
