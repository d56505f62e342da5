// src/clock.rs

use chrono::{Local, NaiveDateTime};
use std::sync::{Arc, Mutex};

/// Wall-clock seam so attendance cutoffs and "today" windows are
/// deterministic under test. Production uses the local system clock, matching
/// how check-in times are judged against office hours.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Fixed, settable clock for tests.
#[derive(Clone)]
pub struct TestClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl TestClock {
    /// Expects "%Y-%m-%d %H:%M:%S".
    pub fn new(datetime: &str) -> Self {
        Self {
            now: Arc::new(Mutex::new(Self::parse(datetime))),
        }
    }

    pub fn set(&self, datetime: &str) {
        *self.now.lock().unwrap() = Self::parse(datetime);
    }

    fn parse(datetime: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(datetime, "%Y-%m-%d %H:%M:%S")
            .unwrap_or_else(|_| panic!("Invalid datetime string format: {}", datetime))
    }
}

impl Clock for TestClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }
}
