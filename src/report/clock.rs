//! Report timestamps
//!
//! A sealing operation reads the clock exactly once; the same value feeds the
//! watermark of every page and the artifact file name. Within one clock,
//! successive readings are strictly increasing at second granularity, so two
//! reports sealed in the same second still get distinct names.

use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Warsaw;

pub trait TimeSource: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// One clock reading in the report time zone
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportTimestamp {
    local: DateTime<Tz>,
}

impl ReportTimestamp {
    pub fn local(&self) -> &DateTime<Tz> {
        &self.local
    }

    /// `Timestamp: 2024-05-14 12:30:00 CEST`
    pub fn watermark_text(&self) -> String {
        format!("Timestamp: {}", self.local.format("%Y-%m-%d %H:%M:%S %Z"))
    }

    /// `2024_05_14_12_30_00`
    ///
    /// Local wall-clock time without an offset. Readings an hour apart across
    /// the autumn fall-back share a suffix; the sealer persists without
    /// clobbering, so the second report fails instead of replacing the first.
    pub fn file_suffix(&self) -> String {
        self.local.format("%Y_%m_%d_%H_%M_%S").to_string()
    }
}

pub struct ReportClock {
    timezone: Tz,
    source: Box<dyn TimeSource>,
    last_second: Mutex<Option<i64>>,
}

impl ReportClock {
    pub fn new(timezone: Tz) -> Self {
        Self::with_source(timezone, Box::new(SystemTimeSource))
    }

    pub fn with_source(timezone: Tz, source: Box<dyn TimeSource>) -> Self {
        Self {
            timezone,
            source,
            last_second: Mutex::new(None),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Read the clock once
    pub fn now(&self) -> ReportTimestamp {
        let observed = self.source.now_utc().timestamp();
        let second = {
            let mut last = self.last_second.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let second = match *last {
                Some(previous) if observed <= previous => previous + 1,
                _ => observed,
            };
            *last = Some(second);
            second
        };

        let utc = Utc.timestamp_opt(second, 0).single().unwrap_or_else(Utc::now);
        ReportTimestamp {
            local: utc.with_timezone(&self.timezone),
        }
    }
}

impl Default for ReportClock {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FixedTime, FIXTURE_EPOCH};

    #[test]
    fn test_formats_in_report_timezone() {
        let clock = ReportClock::with_source(DEFAULT_TIMEZONE, Box::new(FixedTime(FIXTURE_EPOCH)));
        let ts = clock.now();
        assert_eq!(ts.watermark_text(), "Timestamp: 2023-05-14 12:30:00 CEST");
        assert_eq!(ts.file_suffix(), "2023_05_14_12_30_00");
    }

    #[test]
    fn test_fall_back_hour_repeats_suffix() {
        // 02:30 CEST and 02:30 CET on 2023-10-29, one hour apart
        let summer = ReportClock::with_source(DEFAULT_TIMEZONE, Box::new(FixedTime(1_698_539_400))).now();
        let winter = ReportClock::with_source(DEFAULT_TIMEZONE, Box::new(FixedTime(1_698_543_000))).now();
        assert_eq!(summer.file_suffix(), "2023_10_29_02_30_00");
        assert_eq!(summer.file_suffix(), winter.file_suffix());
        assert_eq!(summer.watermark_text(), "Timestamp: 2023-10-29 02:30:00 CEST");
        assert_eq!(winter.watermark_text(), "Timestamp: 2023-10-29 02:30:00 CET");
    }

    #[test]
    fn test_readings_strictly_increase() {
        let clock = ReportClock::with_source(chrono_tz::UTC, Box::new(FixedTime(FIXTURE_EPOCH)));
        let suffixes: Vec<String> = (0..3).map(|_| clock.now().file_suffix()).collect();
        assert_eq!(
            suffixes,
            ["2023_05_14_10_30_00", "2023_05_14_10_30_01", "2023_05_14_10_30_02"]
        );
    }
}
