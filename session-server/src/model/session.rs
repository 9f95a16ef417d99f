//! Session timer storage
//!
//! The store keeps a single session record under a fixed key. Expiry is lazy: a record is never
//! removed because its time ran out, it is only reported as inactive when read.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, TimeDelta, Utc};
use derivative::Derivative;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::model::clock::Clock;

/// Key of the only session slot
const SESSION_KEY: &str = "timer-session";

const MILLIS_PER_MINUTE: i64 = 60 * 1000;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Valid minutes are required")]
    InvalidMinutes,
    #[error("Requested session length is out of range")]
    OutOfRange,
}

/// Validated, strictly positive session length
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Minutes(i64);

impl Minutes {
    pub fn new(minutes: i64) -> Result<Self, Error> {
        if minutes > 0 {
            Ok(Self(minutes))
        } else {
            Err(Error::InvalidMinutes)
        }
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// Session length as a duration, failing if it doesn't fit in the millisecond range
    pub fn duration(self) -> Result<TimeDelta, Error> {
        self.0
            .checked_mul(MILLIS_PER_MINUTE)
            .and_then(TimeDelta::try_milliseconds)
            .ok_or(Error::OutOfRange)
    }
}

/// Parses the leading integer of a string, ignoring anything following it.
///
/// `"15"`, `" 15"` and `"15 minutes"` are all 15 minutes.
impl FromStr for Minutes {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_start();
        let (negative, rest) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let digits = &rest[..end];

        if digits.is_empty() || negative {
            return Err(Error::InvalidMinutes);
        }

        let minutes = digits.parse().map_err(|_| Error::OutOfRange)?;
        Self::new(minutes)
    }
}

/// Accepts JSON integers, fractional numbers (truncated) and numeric strings
impl TryFrom<&Value> for Minutes {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Number(number) => {
                if let Some(minutes) = number.as_i64() {
                    return Self::new(minutes);
                }

                let minutes = number
                    .as_f64()
                    .filter(|minutes| minutes.is_finite())
                    .ok_or(Error::InvalidMinutes)?
                    .trunc();

                if minutes >= i64::MAX as f64 {
                    return Err(Error::OutOfRange);
                }
                Self::new(minutes as i64)
            }
            Value::String(minutes) => minutes.parse(),
            _ => Err(Error::InvalidMinutes),
        }
    }
}

/// Stored session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRecord {
    /// When the session expires
    pub end_time: DateTime<Utc>,
}

impl SessionRecord {
    /// Status of this session as seen at `now`
    pub fn status(&self, now: DateTime<Utc>) -> SessionStatus {
        let remaining_ms = (self.end_time - now).num_milliseconds().max(0);
        if remaining_ms > 0 {
            SessionStatus::Active { remaining_ms }
        } else {
            SessionStatus::Inactive
        }
    }
}

/// Freshly started session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Started {
    /// When the session expires
    pub end_time: DateTime<Utc>,
    /// Full session length in milliseconds
    pub remaining_ms: i64,
}

/// Session state as observed by a reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active { remaining_ms: i64 },
    Inactive,
}

impl SessionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Remaining time, `None` if the session is not active
    pub fn remaining_ms(&self) -> Option<i64> {
        match self {
            Self::Active { remaining_ms } => Some(*remaining_ms),
            Self::Inactive => None,
        }
    }
}

/// In-memory single slot session storage
///
/// Every operation takes the lock exactly once. Concurrent creates race and the last one wins.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct SessionStore {
    #[derivative(Debug = "ignore")]
    clock: Arc<dyn Clock>,
    records: RwLock<HashMap<&'static str, SessionRecord>>,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            records: RwLock::default(),
        }
    }

    /// Starts a session from the raw requested length, replacing any existing one.
    ///
    /// On error the store is left untouched.
    pub fn create(&self, requested: &Value) -> Result<Started, Error> {
        let minutes = Minutes::try_from(requested)?;
        self.start(minutes)
    }

    /// Starts a session for validated length, replacing any existing one
    pub fn start(&self, minutes: Minutes) -> Result<Started, Error> {
        let duration = minutes.duration()?;
        let end_time = self
            .clock
            .now()
            .checked_add_signed(duration)
            .ok_or(Error::OutOfRange)?;

        let previous = self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(SESSION_KEY, SessionRecord { end_time });

        debug!(
            minutes = minutes.get(),
            %end_time,
            replaced = previous.is_some(),
            "Session record stored"
        );

        Ok(Started {
            end_time,
            remaining_ms: duration.num_milliseconds(),
        })
    }

    /// Current session status. Expired records are reported as inactive but kept.
    pub fn read(&self) -> SessionStatus {
        match self.record() {
            Some(record) => record.status(self.clock.now()),
            None => SessionStatus::Inactive,
        }
    }

    /// Stored record, regardless of its expiry
    pub fn record(&self) -> Option<SessionRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(SESSION_KEY)
            .copied()
    }

    /// Removes the session if there is any, returning the removed record
    pub fn clear(&self) -> Option<SessionRecord> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(SESSION_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::model::clock::ManualClock;

    fn setup() -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (SessionStore::new(clock.clone()), clock)
    }

    mod minutes {
        use super::*;

        #[test]
        fn from_json_numbers() {
            assert_eq!(Minutes::try_from(&json!(5)).unwrap().get(), 5);
            assert_eq!(Minutes::try_from(&json!(5.9)).unwrap().get(), 5);
            assert_eq!(Minutes::try_from(&json!(1.0)).unwrap().get(), 1);

            assert_eq!(
                Minutes::try_from(&json!(0)).unwrap_err(),
                Error::InvalidMinutes
            );
            assert_eq!(
                Minutes::try_from(&json!(0.5)).unwrap_err(),
                Error::InvalidMinutes
            );
            assert_eq!(
                Minutes::try_from(&json!(-3)).unwrap_err(),
                Error::InvalidMinutes
            );
        }

        #[test]
        fn from_json_strings() {
            assert_eq!(Minutes::try_from(&json!("15")).unwrap().get(), 15);
            assert_eq!(Minutes::try_from(&json!("  15")).unwrap().get(), 15);
            assert_eq!(Minutes::try_from(&json!("+2")).unwrap().get(), 2);
            assert_eq!(Minutes::try_from(&json!("7min")).unwrap().get(), 7);
            assert_eq!(Minutes::try_from(&json!("3.5")).unwrap().get(), 3);

            for invalid in ["", "abc", "-5", "0", "min7", "-", " "] {
                assert_eq!(
                    Minutes::try_from(&json!(invalid)).unwrap_err(),
                    Error::InvalidMinutes,
                    "{invalid:?} should be rejected"
                );
            }
        }

        #[test]
        fn from_other_json_values() {
            for invalid in [json!(null), json!(true), json!([5]), json!({ "minutes": 5 })] {
                assert_eq!(
                    Minutes::try_from(&invalid).unwrap_err(),
                    Error::InvalidMinutes
                );
            }
        }

        #[test]
        fn out_of_range() {
            assert_eq!(
                Minutes::try_from(&json!("99999999999999999999999")).unwrap_err(),
                Error::OutOfRange
            );
            assert_eq!(
                Minutes::try_from(&json!(1e300)).unwrap_err(),
                Error::OutOfRange
            );
            assert_eq!(
                Minutes::new(i64::MAX).unwrap().duration().unwrap_err(),
                Error::OutOfRange
            );
        }

        #[test]
        fn duration() {
            assert_eq!(
                Minutes::new(5).unwrap().duration().unwrap(),
                TimeDelta::milliseconds(300_000)
            );
        }
    }

    #[test]
    fn empty_store_is_inactive() {
        let (store, _) = setup();

        assert_eq!(store.read(), SessionStatus::Inactive);
        assert_eq!(store.read().remaining_ms(), None);
        assert_eq!(store.record(), None);
    }

    #[test]
    fn create_then_read() {
        let (store, clock) = setup();

        for minutes in [1, 5, 30, 24 * 60] {
            let started = store.create(&json!(minutes)).unwrap();
            assert_eq!(started.remaining_ms, minutes * 60_000);
            assert_eq!(
                started.end_time,
                clock.now() + TimeDelta::minutes(minutes)
            );

            let status = store.read();
            assert!(status.is_active());
            let remaining = status.remaining_ms().unwrap();
            assert!(remaining > 0 && remaining <= minutes * 60_000);
        }
    }

    #[test]
    fn invalid_create_keeps_previous_session() {
        let (store, _) = setup();

        for invalid in [json!(0), json!(-1), json!("abc"), json!(null)] {
            assert_eq!(
                store.create(&invalid).unwrap_err(),
                Error::InvalidMinutes
            );
            assert_eq!(store.record(), None);
        }

        let started = store.create(&json!(5)).unwrap();
        let _ = store.create(&json!("nope")).unwrap_err();
        let _ = store.create(&json!(u64::MAX)).unwrap_err();

        assert_eq!(
            store.record(),
            Some(SessionRecord {
                end_time: started.end_time
            })
        );
    }

    #[test]
    fn create_overwrites_existing_session() {
        let (store, clock) = setup();

        store.create(&json!(10)).unwrap();
        clock.advance(TimeDelta::minutes(2));
        let second = store.create(&json!(1)).unwrap();

        assert_eq!(store.record().unwrap().end_time, second.end_time);
        assert_eq!(
            store.read(),
            SessionStatus::Active {
                remaining_ms: 60_000
            }
        );
    }

    #[test]
    fn session_expires_lazily() {
        let (store, clock) = setup();

        let started = store.create(&json!(1)).unwrap();

        clock.advance(TimeDelta::milliseconds(59_999));
        assert_eq!(store.read(), SessionStatus::Active { remaining_ms: 1 });

        clock.advance(TimeDelta::milliseconds(1));
        assert_eq!(store.read(), SessionStatus::Inactive);

        clock.advance(TimeDelta::milliseconds(1));
        assert_eq!(store.read(), SessionStatus::Inactive);
        assert_eq!(store.read().remaining_ms(), None);

        // Expired record is still there
        assert_eq!(
            store.record(),
            Some(SessionRecord {
                end_time: started.end_time
            })
        );
    }

    #[test]
    fn clear_is_idempotent() {
        let (store, _) = setup();

        let started = store.create(&json!(5)).unwrap();

        assert_eq!(
            store.clear(),
            Some(SessionRecord {
                end_time: started.end_time
            })
        );
        assert_eq!(store.read(), SessionStatus::Inactive);

        assert_eq!(store.clear(), None);
        assert_eq!(store.read(), SessionStatus::Inactive);
    }

    #[test]
    fn session_scenario() {
        let (store, clock) = setup();

        let started = store.create(&json!(5)).unwrap();
        assert_eq!(started.remaining_ms, 300_000);

        clock.advance(TimeDelta::milliseconds(250));
        assert_eq!(
            store.read(),
            SessionStatus::Active {
                remaining_ms: 299_750
            }
        );

        store.clear();
        assert_eq!(store.read(), SessionStatus::Inactive);
    }
}
