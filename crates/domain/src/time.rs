//! Time and timestamp helpers.

use chrono::{DateTime, SubsecRound, Utc};

/// UTC timestamp used for `last_updated`.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time, truncated to the microsecond precision
/// [`unix_seconds`] carries on the wire.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now().trunc_subsecs(6)
}

/// Serde adapter encoding a [`Timestamp`] as fractional Unix seconds
/// (`1700000000.25`), the form status payloads carry on the wire.
pub mod unix_seconds {
    use chrono::DateTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    use super::Timestamp;

    #[allow(clippy::cast_precision_loss)]
    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        let secs = ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_micros()) / 1e6;
        serializer.serialize_f64(secs)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() {
            return Err(de::Error::custom("timestamp must be finite"));
        }
        let micros = (secs * 1e6).round() as i64;
        DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| de::Error::custom("timestamp out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "unix_seconds")]
        at: Timestamp,
    }

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now().trunc_subsecs(6);
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_have_no_sub_microsecond_part() {
        assert_eq!(now().timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn should_round_trip_current_time_exactly() {
        let at = now();
        let json = serde_json::to_string(&Stamped { at }).unwrap();
        let parsed: Stamped = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.at, at);
    }

    #[test]
    fn should_encode_as_fractional_seconds() {
        let at = DateTime::from_timestamp_micros(1_700_000_000_250_000).unwrap();
        let json = serde_json::to_string(&Stamped { at }).unwrap();
        assert_eq!(json, r#"{"at":1700000000.25}"#);
    }

    #[test]
    fn should_decode_integer_seconds() {
        let parsed: Stamped = serde_json::from_str(r#"{"at":1700000000}"#).unwrap();
        assert_eq!(parsed.at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn should_reject_non_numeric_timestamp() {
        let result = serde_json::from_str::<Stamped>(r#"{"at":"yesterday"}"#);
        assert!(result.is_err());
    }
}
