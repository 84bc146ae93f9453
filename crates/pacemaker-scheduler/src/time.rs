//! Time as the scheduler sees it: a value the caller supplies, never a value
//! the scheduler reads off the wall clock.
//!
//! Two passes given identical `(configuration_xml, status_xml, now)` must
//! produce byte-identical output, so `schedule()` never touches
//! `SystemTime::now()`; every rule evaluation and every recheck calculation
//! is a pure function of the `Timestamp` passed in. The [`Clock`] trait below
//! exists purely for harness/test code that wants to generate a `Timestamp`
//! without hardcoding epoch arithmetic — the scheduler core never holds one.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch. Deliberately a plain integer rather than a
/// calendar type: the scheduler only ever compares and offsets timestamps,
/// it never needs calendar arithmetic (weekdays, months, leap seconds).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub const MAX: Timestamp = Timestamp(i64::MAX);

    pub fn from_epoch_seconds(seconds: i64) -> Self {
        Self(seconds)
    }

    pub fn epoch_seconds(self) -> i64 {
        self.0
    }

    pub fn checked_add_seconds(self, seconds: i64) -> Option<Timestamp> {
        self.0.checked_add(seconds).map(Timestamp)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Injectable source of "now", used by `pacemaker-cli` and by tests that
/// want to advance time deterministically instead of sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Reads the real wall clock. Only ever constructed by the CLI harness; the
/// scheduler library itself never instantiates this.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Timestamp(secs as i64)
    }
}

/// A clock tests can advance by hand, mirroring the teacher's `MockClock`
/// pattern for making retry/recheck logic reproducible without real sleeps.
#[derive(Clone)]
pub struct MockClock {
    now: Arc<Mutex<Timestamp>>,
}

impl MockClock {
    pub fn at(seconds: i64) -> Self {
        Self {
            now: Arc::new(Mutex::new(Timestamp(seconds))),
        }
    }

    pub fn advance(&self, seconds: i64) {
        let mut guard = self.now.lock().expect("mock clock mutex poisoned");
        *guard = Timestamp(guard.0 + seconds);
    }
}

impl Clock for MockClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().expect("mock clock mutex poisoned")
    }
}
