//! Calendar and clock provider.
//!
//! Timestamps are kept in UTC. Every "same day" or "same month" decision is
//! made on the calendar the clock reports through [`Clock::day_of`], which
//! must match the timezone the user sees dates in.

use chrono::{
    DateTime, Datelike, Days, FixedOffset, Local, NaiveDate, NaiveTime, Offset, TimeZone, Utc,
};

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    fn offset(&self) -> FixedOffset;

    /// Calendar day a timestamp falls on in this clock's timezone.
    fn day_of(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.offset()).date_naive()
    }

    fn today(&self) -> NaiveDate {
        self.day_of(self.now())
    }

    fn same_day(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.day_of(a) == self.day_of(b)
    }

    fn same_month_as(&self, ts: DateTime<Utc>, day: NaiveDate) -> bool {
        let d = self.day_of(ts);
        d.year() == day.year() && d.month() == day.month()
    }
}

/// Wall clock in the host's local timezone, or a pinned offset.
///
/// Unpinned, each timestamp is placed with the local offset in force at that
/// instant, so days on the far side of a DST change keep their own date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    pinned: Option<FixedOffset>,
}

impl SystemClock {
    pub fn with_offset(offset: FixedOffset) -> Self {
        SystemClock {
            pinned: Some(offset),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        self.pinned.unwrap_or_else(|| *Local::now().offset())
    }

    fn day_of(&self, ts: DateTime<Utc>) -> NaiveDate {
        match self.pinned {
            Some(offset) => ts.with_timezone(&offset).date_naive(),
            None => ts.with_timezone(&Local).date_naive(),
        }
    }
}

/// Clock frozen at one instant. Used to evaluate arbitrary dates.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        FixedClock { now, offset }
    }

    /// Noon on `day` in UTC.
    pub fn on_day(day: NaiveDate) -> Self {
        let offset = Utc.fix();
        FixedClock {
            now: at_local_time(day, NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default(), offset),
            offset,
        }
    }

    pub fn set(&mut self, now: DateTime<Utc>) {
        self.now = now;
    }

    pub fn advance_days(&mut self, n: u64) {
        self.now = self.now + Days::new(n);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// The UTC instant of a wall-clock time on `day` in `offset`.
pub fn at_local_time(day: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    match offset.from_local_datetime(&day.and_time(time)).single() {
        Some(dt) => dt.with_timezone(&Utc),
        // a fixed offset never has gaps or folds
        None => Utc.from_utc_datetime(&day.and_time(time)),
    }
}

pub fn days_before(day: NaiveDate, n: u64) -> NaiveDate {
    day - Days::new(n)
}
