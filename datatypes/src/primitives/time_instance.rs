use crate::error;
use crate::util::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use snafu::OptionExt;

/// An instant in time in milliseconds since the Unix epoch
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(C)]
pub struct TimeInstance(i64);

impl TimeInstance {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn inner(self) -> i64 {
        self.0
    }

    /// Converts the instant into a calendar date
    ///
    /// # Errors
    ///
    /// Fails if the instant lies outside of the range that `chrono` can represent.
    ///
    pub fn as_utc_date_time(self) -> Result<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.0).context(error::InvalidTimeInstance { millis: self.0 })
    }
}

impl From<i64> for TimeInstance {
    fn from(millis: i64) -> Self {
        Self(millis)
    }
}

impl From<TimeInstance> for i64 {
    fn from(time: TimeInstance) -> Self {
        time.0
    }
}

impl From<DateTime<Utc>> for TimeInstance {
    fn from(date_time: DateTime<Utc>) -> Self {
        Self(date_time.timestamp_millis())
    }
}

impl std::fmt::Display for TimeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.as_utc_date_time() {
            Ok(date_time) => write!(f, "{}", date_time.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Err(_) => write!(f, "{}ms", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_time_conversion() {
        let date_time = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let time = TimeInstance::from(date_time);

        assert_eq!(time.inner(), 1_577_934_245_000);
        assert_eq!(time.as_utc_date_time().unwrap(), date_time);
        assert_eq!(time.to_string(), "2020-01-02T03:04:05.000Z");
    }

    #[test]
    fn out_of_range() {
        let time = TimeInstance::from_millis(i64::MAX);

        assert!(time.as_utc_date_time().is_err());
        assert_eq!(time.to_string(), format!("{}ms", i64::MAX));
    }
}
