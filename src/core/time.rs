use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::time::Instant;

/// Wall clock anchored to tokio's monotonic clock, so deadlines follow the same
/// time source as the session tickers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionClock {
    wall: OffsetDateTime,
    mono: Instant,
}

impl SessionClock {
    pub(crate) fn start() -> Self {
        Self { wall: OffsetDateTime::now_utc(), mono: Instant::now() }
    }

    pub(crate) fn now(&self) -> OffsetDateTime {
        self.wall + self.mono.elapsed()
    }
}

pub(crate) fn format_offset(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

/// `HH:MM:SS`; negative values clamp to zero and hours may exceed 24.
pub(crate) fn format_hms(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, PrimitiveDateTime, Time, UtcOffset};

    #[test]
    fn format_offset_preserves_offset() {
        let date = Date::from_calendar_date(2025, time::Month::January, 2).unwrap();
        let time = Time::from_hms(10, 20, 30).unwrap();
        let utc = PrimitiveDateTime::new(date, time).assume_utc();
        let offset = UtcOffset::from_hms(3, 0, 0).unwrap();
        let shifted = utc.to_offset(offset);
        assert_eq!(format_offset(shifted), "2025-01-02T13:20:30+03:00");
        assert_eq!(format_offset(utc), "2025-01-02T10:20:30Z");
    }

    #[test]
    fn format_hms_pads_and_clamps() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(5 * 60), "00:05:00");
        assert_eq!(format_hms(3 * 3600 + 7 * 60 + 9), "03:07:09");
        assert_eq!(format_hms(-12), "00:00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn clock_follows_tokio_time() {
        let clock = SessionClock::start();
        let before = clock.now();
        tokio::time::advance(std::time::Duration::from_secs(90)).await;
        assert_eq!((clock.now() - before).whole_seconds(), 90);
    }
}
