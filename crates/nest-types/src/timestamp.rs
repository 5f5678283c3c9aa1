use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Creation time of a comment, kept as an ISO-8601 string.
///
/// Timestamps produced by [`Timestamp::now`] are UTC with millisecond
/// precision and a `Z` suffix (`2024-05-01T12:30:00.125Z`), so comparing the
/// strings byte-wise orders them in time. Ordering on this type is exactly
/// that byte-wise comparison and never depends on locale.
///
/// Values read back from storage are not re-validated: a record with an odd
/// timestamp still loads and simply sorts where its string sorts.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    /// The current wall-clock time.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Format a UTC instant in the canonical form.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// The raw string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpret the string as a UTC instant, if it is valid RFC 3339.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.0)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Timestamp {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Timestamp {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn canonical_format() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(
            Timestamp::from_datetime(at).as_str(),
            "2024-05-01T12:30:00.000Z"
        );
    }

    #[test]
    fn string_order_is_time_order() {
        let earlier = Timestamp::from_datetime(Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap());
        let later = Timestamp::from_datetime(Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap());
        assert!(earlier < later);
    }

    #[test]
    fn raw_strings_are_kept_verbatim() {
        let ts = Timestamp::from("t1");
        assert_eq!(ts.as_str(), "t1");
        assert!(ts.to_datetime().is_none());
        assert!(Timestamp::from("t1") < Timestamp::from("t2"));
    }

    #[test]
    fn now_roundtrips_through_datetime() {
        let ts = Timestamp::now();
        let dt = ts.to_datetime().expect("now() is valid RFC 3339");
        assert_eq!(Timestamp::from_datetime(dt), ts);
    }

    #[test]
    fn serde_is_a_bare_string() {
        let ts = Timestamp::from("2024-05-01T12:30:00.000Z");
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2024-05-01T12:30:00.000Z\"");
    }
}
