use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

use crate::error::{AppError, InvalidArgument};

const ISO8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// How range bounds are written, both on input and when a window is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    Seconds,
    Iso8601,
}

impl TimestampFormat {
    pub fn render(self, at: DateTime<Utc>) -> String {
        match self {
            Self::Seconds => at.timestamp().to_string(),
            Self::Iso8601 => at.format(ISO8601_FORMAT).to_string(),
        }
    }
}

/// A caller-supplied range bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timestamp {
    Seconds(i64),
    Iso8601(String),
}

impl Timestamp {
    pub fn format(&self) -> TimestampFormat {
        match self {
            Self::Seconds(_) => TimestampFormat::Seconds,
            Self::Iso8601(_) => TimestampFormat::Iso8601,
        }
    }

    pub fn to_datetime(&self) -> Result<DateTime<Utc>, AppError> {
        match self {
            Self::Seconds(secs) => DateTime::from_timestamp(*secs, 0)
                .ok_or_else(|| InvalidArgument::Timestamp(secs.to_string()).into()),
            Self::Iso8601(raw) => parse_iso8601(raw),
        }
    }

    /// Accepts either bare epoch seconds or an ISO-8601 string.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(secs) => Self::Seconds(secs),
            Err(_) => Self::Iso8601(trimmed.to_string()),
        }
    }
}

impl From<i64> for Timestamp {
    fn from(secs: i64) -> Self {
        Self::Seconds(secs)
    }
}

impl From<&str> for Timestamp {
    fn from(raw: &str) -> Self {
        Self::Iso8601(raw.to_string())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds(secs) => write!(f, "{}", secs),
            Self::Iso8601(raw) => f.write_str(raw),
        }
    }
}

/// RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.fff]` (taken as UTC), or a bare date.
fn parse_iso8601(raw: &str) -> Result<DateTime<Utc>, AppError> {
    let trimmed = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(at.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Some(naive) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(naive.and_utc());
    }
    Err(InvalidArgument::Timestamp(raw.to_string()).into())
}

/// A `[start, end]` sub-range sent to the exchange in one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, AppError> {
        if start > end {
            return Err(InvalidArgument::Range {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            }
            .into());
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// True for the single window produced by an empty range.
    pub fn is_zero_length(&self) -> bool {
        self.start == self.end
    }

    pub fn render(&self, format: TimestampFormat) -> (String, String) {
        (format.render(self.start), format.render(self.end))
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (start, end) = self.render(TimestampFormat::Iso8601);
        write!(f, "[{}, {}]", start, end)
    }
}

/// Ordered windows covering a range. Cloning restarts the walk.
#[derive(Debug, Clone)]
pub struct WindowSplit {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: TimeDelta,
    count: usize,
    next: usize,
    format: TimestampFormat,
}

impl WindowSplit {
    /// Representation the caller used for the range bounds.
    pub fn format(&self) -> TimestampFormat {
        self.format
    }

    pub fn window_span(&self) -> TimeDelta {
        self.step
    }

    fn window_at(&self, index: usize) -> TimeWindow {
        let start = self.start + TimeDelta::seconds(self.step.num_seconds() * index as i64);
        let end = if index + 1 == self.count {
            self.end
        } else {
            start + self.step
        };
        TimeWindow { start, end }
    }
}

impl Iterator for WindowSplit {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let window = self.window_at(self.next);
        self.next += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for WindowSplit {}

/// Divide `[start, end]` into windows of at most `granularity * max_samples_per_request` seconds.
pub fn split(
    start: &Timestamp,
    end: &Timestamp,
    granularity: u32,
    max_samples_per_request: u32,
) -> Result<WindowSplit, AppError> {
    let format = start.format();
    if end.format() != format {
        return Err(InvalidArgument::MismatchedTimestamps.into());
    }
    let start_at = start.to_datetime()?;
    let end_at = end.to_datetime()?;
    if start_at > end_at {
        return Err(InvalidArgument::Range {
            start: start.to_string(),
            end: end.to_string(),
        }
        .into());
    }
    split_range(start_at, end_at, granularity, max_samples_per_request, format)
}

/// Same as [`split`] for bounds that are already parsed.
pub fn split_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: u32,
    max_samples_per_request: u32,
    format: TimestampFormat,
) -> Result<WindowSplit, AppError> {
    if granularity == 0 {
        return Err(InvalidArgument::Granularity {
            granularity,
            allowed: "> 0".to_string(),
        }
        .into());
    }
    if max_samples_per_request == 0 {
        return Err(InvalidArgument::SampleCap.into());
    }
    let window = TimeWindow::new(start, end)?;

    let too_wide = || InvalidArgument::WindowSpan {
        granularity,
        max_samples_per_request,
    };
    let step_secs = i64::from(granularity)
        .checked_mul(i64::from(max_samples_per_request))
        .ok_or_else(too_wide)?;
    let step = TimeDelta::try_seconds(step_secs).ok_or_else(too_wide)?;
    let step_ms = step.num_milliseconds();
    let total_ms = window.duration().num_milliseconds();
    // An empty range still yields one zero-length window.
    let count = (total_ms / step_ms + i64::from(total_ms % step_ms != 0)).max(1) as usize;

    Ok(WindowSplit {
        start,
        end,
        step,
        count,
        next: 0,
        format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_iso_variants_to_the_same_instant() {
        let expected = DateTime::from_timestamp(1_577_836_800, 0).unwrap();
        for raw in [
            "2020-01-01T00:00:00",
            "2020-01-01T00:00:00.000",
            "2020-01-01T00:00:00Z",
            "2020-01-01T01:00:00+01:00",
            "2020-01-01",
        ] {
            assert_eq!(Timestamp::from(raw).to_datetime().unwrap(), expected, "{raw}");
        }
        assert!(Timestamp::from("not a date").to_datetime().is_err());
    }

    #[test]
    fn parse_detects_representation() {
        assert_eq!(Timestamp::parse("1577836800"), Timestamp::Seconds(1_577_836_800));
        assert_eq!(
            Timestamp::parse(" 2020-01-01 "),
            Timestamp::Iso8601("2020-01-01".to_string())
        );
    }

    #[test]
    fn zero_length_range_yields_one_window() {
        let windows: Vec<_> = split(&100_000.into(), &100_000.into(), 60, 300)
            .unwrap()
            .collect();
        assert_eq!(windows.len(), 1);
        assert!(windows[0].is_zero_length());
    }

    #[test]
    fn range_shorter_than_a_window_is_one_window() {
        let windows: Vec<_> = split(&0.into(), &1_000.into(), 60, 300).unwrap().collect();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start().timestamp(), 0);
        assert_eq!(windows[0].end().timestamp(), 1_000);
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_window() {
        let windows: Vec<_> = split(&0.into(), &36_000.into(), 60, 300).unwrap().collect();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].start().timestamp(), 18_000);
        assert_eq!(windows[1].end().timestamp(), 36_000);
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(split(&10.into(), &5.into(), 60, 300)
            .unwrap_err()
            .is_invalid_argument());
        assert!(split(&0.into(), &"2020-01-01".into(), 60, 300)
            .unwrap_err()
            .is_invalid_argument());
        assert!(split(&"garbage".into(), &"2020-01-01".into(), 60, 300)
            .unwrap_err()
            .is_invalid_argument());
        assert!(split(&0.into(), &10.into(), 0, 300).is_err());
        assert!(split(&0.into(), &10.into(), 60, 0).is_err());
    }

    #[test]
    fn oversized_window_span_is_an_error() {
        let err = split(&0.into(), &10.into(), u32::MAX, u32::MAX).unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidArgument(InvalidArgument::WindowSpan { .. })
        ));

        // fits in i64 seconds but not in a TimeDelta
        let err = split(&0.into(), &10.into(), 3_000_000_000, 3_100_000).unwrap_err();
        assert!(err.is_invalid_argument());

        let windows = split(&0.into(), &10.into(), 86_400, u32::MAX).unwrap();
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn split_is_restartable() {
        let split = split(&0.into(), &100_000.into(), 60, 300).unwrap();
        assert_eq!(split.len(), 6);
        let first: Vec<_> = split.clone().collect();
        let second: Vec<_> = split.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn window_renders_in_split_format() {
        let mut split = split(&"2020-01-01".into(), &"2020-01-02".into(), 3_600, 300).unwrap();
        assert_eq!(split.format(), TimestampFormat::Iso8601);
        let window = split.next().unwrap();
        assert_eq!(
            window.render(split.format()),
            ("2020-01-01T00:00:00".to_string(), "2020-01-02T00:00:00".to_string())
        );
        assert_eq!(
            window.render(TimestampFormat::Seconds),
            ("1577836800".to_string(), "1577923200".to_string())
        );
    }
}
