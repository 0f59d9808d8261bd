//! Parsing of the broadcast durations Twitch reports for videos.
//!
//! Helix reports video lengths in a compact form such as `1h2m3s`. We turn that into an ISO-8601
//! duration (`PT1H2M3S`), parse it into its components, and then measure it against a real
//! calendar so that month and year components resolve to the right number of days.

use jiff::{SignedDuration, Span, Zoned};
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^P(?:([0-9]+)Y)?(?:([0-9]+)M)?(?:([0-9]+)W)?(?:([0-9]+)D)?",
        r"(?:T(?:([0-9]+(?:\.[0-9]+)?)H)?(?:([0-9]+(?:\.[0-9]+)?)M)?(?:([0-9]+(?:\.[0-9]+)?)S)?)?$",
    ))
    .expect("ISO-8601 duration pattern is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum DurationError {
    #[error("invalid duration: {0}")]
    Invalid(String),
    #[error("only the smallest unit can be fractional: {0}")]
    MultipleFractions(String),
    #[error("duration does not fit the calendar")]
    OutOfRange(#[from] jiff::Error),
}

/// The components of an ISO-8601 duration, as written.
///
/// Components are kept separate (rather than normalized into seconds) because months and years
/// only have a length relative to a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IsoDuration {
    pub years: i64,
    pub months: i64,
    pub weeks: i64,
    pub days: i64,
    pub hours: f64,
    pub minutes: f64,
    pub seconds: f64,
}

impl IsoDuration {
    /// Parses `P[nY][nM][nW][nD][T[nH][nM][nS]]`.
    ///
    /// Time components may carry a fraction, with either `.` or `,` as the separator, but at most
    /// one component may be fractional.
    pub fn parse(input: &str) -> Result<Self, DurationError> {
        let normalized = input.replace(',', ".");
        let captures = ISO_DURATION
            .captures(&normalized)
            .ok_or_else(|| DurationError::Invalid(input.to_string()))?;

        let components: Vec<Option<&str>> = (1..=7)
            .map(|i| captures.get(i).map(|m| m.as_str()))
            .collect();
        if components.iter().all(Option::is_none) {
            return Err(DurationError::Invalid(input.to_string()));
        }
        if components.iter().flatten().filter(|c| c.contains('.')).count() > 1 {
            return Err(DurationError::MultipleFractions(input.to_string()));
        }

        let invalid = || DurationError::Invalid(input.to_string());
        let whole = |i: usize| -> Result<i64, DurationError> {
            components[i].map_or(Ok(0), |c| c.parse().map_err(|_| invalid()))
        };
        let fractional = |i: usize| -> Result<f64, DurationError> {
            components[i].map_or(Ok(0.0), |c| c.parse().map_err(|_| invalid()))
        };

        Ok(Self {
            years: whole(0)?,
            months: whole(1)?,
            weeks: whole(2)?,
            days: whole(3)?,
            hours: fractional(4)?,
            minutes: fractional(5)?,
            seconds: fractional(6)?,
        })
    }

    /// The instant this duration ends at when started at `reference`.
    ///
    /// Years, months and days are added first as calendar units, then the time components as an
    /// exact duration, and weeks last as seven calendar days each.
    pub fn end_from(&self, reference: &Zoned) -> Result<Zoned, DurationError> {
        let calendar = Span::new()
            .try_years(self.years)?
            .try_months(self.months)?
            .try_days(self.days)?;
        let time = SignedDuration::try_from_secs_f64(
            self.hours * 3600.0 + self.minutes * 60.0 + self.seconds,
        )?;
        let week_days = self
            .weeks
            .checked_mul(7)
            .ok_or_else(|| DurationError::Invalid(format!("{} weeks", self.weeks)))?;

        let end = reference
            .checked_add(calendar)?
            .checked_add(time)?
            .checked_add(Span::new().try_days(week_days)?)?;
        Ok(end)
    }

    /// Total length in seconds when started at `reference`.
    pub fn to_seconds_from(&self, reference: &Zoned) -> Result<f64, DurationError> {
        let end = self.end_from(reference)?;
        Ok(end
            .timestamp()
            .duration_since(reference.timestamp())
            .as_secs_f64())
    }

    /// Total length in seconds when started now, in the system time zone.
    pub fn to_seconds(&self) -> Result<f64, DurationError> {
        self.to_seconds_from(&Zoned::now())
    }
}

impl FromStr for IsoDuration {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Converts a Helix duration such as `1h2m3s` (unit letters in any case) to seconds.
pub fn twitch_duration_to_seconds(duration: &str) -> Result<f64, DurationError> {
    IsoDuration::parse(&format!("PT{}", duration.to_uppercase()))?.to_seconds()
}
