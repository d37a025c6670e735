use time::OffsetDateTime;

/// Source of the current time.
///
/// Injectable so cache expiry can be driven by a controlled clock in tests.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall-clock time.
#[derive(Clone)]
pub struct SystemTime {}

impl TimeSource for SystemTime {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
