//! Ingestion path parsing
//!
//! Paths look like `<prefix>/<site>/<deviceId>/<sensorKind>_<suffix>/...`.
//! Segment 2 is the device id; segment 3 up to its first `_` is the sensor
//! kind.

use fieldwatch_model::DeviceIdentity;

use crate::error::{Result, RuleError};

/// Minimum number of `/`-separated segments in a valid path
pub const MIN_PATH_SEGMENTS: usize = 4;

const DEVICE_SEGMENT: usize = 2;
const SENSOR_KIND_SEGMENT: usize = 3;

/// Extract device and sensor kind identifiers from an ingestion path
///
/// # Examples
/// ```
/// # use fieldwatch_rules::parse_identity;
/// let id = parse_identity("fw/site-a/dev-01/TH_v2/data").unwrap();
/// assert_eq!(id.device_id, "dev-01");
/// assert_eq!(id.sensor_kind, "TH");
/// ```
pub fn parse_identity(path: &str) -> Result<DeviceIdentity> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < MIN_PATH_SEGMENTS {
        return Err(RuleError::malformed(
            path,
            format!(
                "expected at least {} segments, got {}",
                MIN_PATH_SEGMENTS,
                segments.len()
            ),
        ));
    }

    let device_id = segments[DEVICE_SEGMENT];
    let kind_segment = segments[SENSOR_KIND_SEGMENT];
    let sensor_kind = kind_segment
        .split_once('_')
        .map_or(kind_segment, |(kind, _)| kind);

    if device_id.is_empty() {
        return Err(RuleError::malformed(path, "empty device segment"));
    }
    if sensor_kind.is_empty() {
        return Err(RuleError::malformed(path, "empty sensor kind"));
    }

    Ok(DeviceIdentity {
        device_id: device_id.to_string(),
        sensor_kind: sensor_kind.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_path() {
        let id = parse_identity("fw/site-a/dev-01/TH_v2/data").unwrap();
        assert_eq!(id.device_id, "dev-01");
        assert_eq!(id.sensor_kind, "TH");
    }

    #[test]
    fn test_parse_leading_slash() {
        // Leading slash produces an empty first segment
        let id = parse_identity("/devices/dev-07/TILT_x_y").unwrap();
        assert_eq!(id.device_id, "dev-07");
        assert_eq!(id.sensor_kind, "TILT");
    }

    #[test]
    fn test_sensor_kind_without_underscore() {
        let id = parse_identity("a/b/dev-02/DOOR").unwrap();
        assert_eq!(id.sensor_kind, "DOOR");
    }

    #[test]
    fn test_too_few_segments() {
        let err = parse_identity("a/b/dev-01").unwrap_err();
        assert!(matches!(err, RuleError::MalformedPath { .. }));
        assert!(parse_identity("").is_err());
    }

    #[test]
    fn test_empty_identifiers_rejected() {
        assert!(parse_identity("a/b//TH_1").is_err());
        assert!(parse_identity("a/b/dev/_1").is_err());
    }
}
