//! Injected time source
//!
//! All deadline math (no-show cutoff, payment grace window, delivery SLA)
//! reads time through this capability instead of the ambient clock, so tests
//! can pin "now" without process-wide mutation.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Time source capability
pub trait Clock: Send + Sync + fmt::Debug {
    /// 현재 UTC 타임스탬프 (밀리초)
    fn now_millis(&self) -> i64;

    /// 현재 UTC 시각
    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_millis()).unwrap_or_else(Utc::now)
    }

    /// 영업 시간대 기준 오늘 날짜
    fn business_date(&self, tz: Tz) -> NaiveDate {
        self.now_utc().with_timezone(&tz).date_naive()
    }
}

/// Production clock — reads the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        shared::util::now_millis()
    }
}

/// Test clock pinned to an explicit instant, advanced manually.
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn at(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    /// 특정 날짜의 영업 시간대 정오로 고정 (날짜 경계 테스트용)
    pub fn at_noon(date: NaiveDate, tz: Tz) -> Self {
        let noon = date.and_time(chrono::NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default());
        let millis = noon
            .and_local_timezone(tz)
            .latest()
            .map(|dt| dt.timestamp_millis())
            .unwrap_or_else(|| noon.and_utc().timestamp_millis());
        Self::at(millis)
    }

    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_millis: i64) {
        self.millis.fetch_add(delta_millis, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
