//! # Units accepted by timeout attachment.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::UsageError;

/// Unit of a timeout amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    /// Milliseconds in one unit.
    pub fn millis(self) -> f64 {
        match self {
            TimeUnit::Milliseconds => 1.0,
            TimeUnit::Seconds => 1_000.0,
            TimeUnit::Minutes => 60_000.0,
            TimeUnit::Hours => 3_600_000.0,
        }
    }

    /// Converts `amount` of this unit into a duration.
    ///
    /// Returns `Ok(None)` for an infinite amount (no deadline) and an error for
    /// NaN or negative amounts.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use seqflow::TimeUnit;
    ///
    /// assert_eq!(TimeUnit::Seconds.to_duration(1.5).unwrap(), Some(Duration::from_millis(1500)));
    /// assert_eq!(TimeUnit::Hours.to_duration(f64::INFINITY).unwrap(), None);
    /// assert!(TimeUnit::Minutes.to_duration(-1.0).is_err());
    /// ```
    pub fn to_duration(self, amount: f64) -> Result<Option<Duration>, UsageError> {
        if amount.is_nan() || amount < 0.0 {
            return Err(UsageError::InvalidDuration {
                amount: amount.to_string(),
            });
        }
        if amount.is_infinite() {
            return Ok(None);
        }
        let ms = amount * self.millis();
        Duration::try_from_secs_f64(ms / 1_000.0)
            .map(Some)
            .map_err(|_| UsageError::InvalidDuration {
                amount: amount.to_string(),
            })
    }

    fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Milliseconds => "milliseconds",
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "millisecond" | "milliseconds" => Ok(TimeUnit::Milliseconds),
            "second" | "seconds" => Ok(TimeUnit::Seconds),
            "minute" | "minutes" => Ok(TimeUnit::Minutes),
            "hour" | "hours" => Ok(TimeUnit::Hours),
            other => Err(UsageError::UnknownUnit {
                unit: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plural_and_singular() {
        assert_eq!("seconds".parse::<TimeUnit>().unwrap(), TimeUnit::Seconds);
        assert_eq!("hour".parse::<TimeUnit>().unwrap(), TimeUnit::Hours);
    }

    #[test]
    fn unknown_unit_is_rejected() {
        let err = "fortnights".parse::<TimeUnit>().unwrap_err();
        assert_eq!(
            err,
            UsageError::UnknownUnit {
                unit: "fortnights".into()
            }
        );
    }

    #[test]
    fn converts_to_milliseconds() {
        assert_eq!(
            TimeUnit::Minutes.to_duration(2.0).unwrap(),
            Some(Duration::from_secs(120))
        );
        assert_eq!(
            TimeUnit::Milliseconds.to_duration(20.0).unwrap(),
            Some(Duration::from_millis(20))
        );
    }

    #[test]
    fn nan_is_invalid() {
        assert!(matches!(
            TimeUnit::Seconds.to_duration(f64::NAN),
            Err(UsageError::InvalidDuration { .. })
        ));
    }
}
