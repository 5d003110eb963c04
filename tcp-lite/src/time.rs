/*! Time structures.

The `time` module contains structures used to represent both absolute and relative time, and the
deadlines every blocking wait of the engine is bounded by.

 - [Instant] is used to represent absolute time.
 - [Duration] is used to represet relative time.
 - [Expiration] is a deadline that may also never expire.

[Instant]: struct.Instant.html
[Duration]: struct.Duration.html
[Expiration]: enum.Expiration.html
*/
use core::{cmp, fmt, ops};
use core::convert::TryFrom;
use std::sync::OnceLock;
pub use core::time::Duration;

/// A representation of an absolute time value.
///
/// The `Instant` type is a wrapper around a `i64` value that represents a number of milliseconds,
/// monotonically increasing since an arbitrary moment in time. For [`Instant::now`] that moment is
/// the first time the clock was queried in this process.
///
/// [`Instant::now`]: #method.now
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant {
    /// Milliseconds since the epoch of the clock.
    pub millis: i64,
}

/// An expiration time, inversion of `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Expires at the given instant.
    When(Instant),
    /// Never expires.
    Never,
}

use Expiration::{When, Never};

static EPOCH: OnceLock<std::time::Instant> = OnceLock::new();

impl Instant {
    /// Create a new `Instant` from a number of milliseconds.
    pub fn from_millis<T: Into<i64>>(millis: T) -> Instant {
        Instant { millis: millis.into() }
    }

    /// Create a new `Instant` from a number of seconds.
    pub fn from_secs<T: Into<i64>>(secs: T) -> Instant {
        Instant { millis: secs.into() * 1000 }
    }

    /// Read the monotonic clock.
    pub fn now() -> Instant {
        let epoch = EPOCH.get_or_init(std::time::Instant::now);
        Instant::from_millis(epoch.elapsed().as_millis() as i64)
    }

    /// The fractional number of milliseconds that have passed
    /// since the beginning of time.
    pub fn millis(&self) -> i64 {
        self.millis % 1000
    }

    /// The number of whole seconds that have passed since the
    /// beginning of time.
    pub fn secs(&self) -> i64 {
        self.millis / 1000
    }

    /// The total number of milliseconds that have passed since
    /// the biginning of time.
    pub fn total_millis(&self) -> i64 {
        self.millis
    }

    /// The instant `duration` later, or `None` if it is not representable.
    pub fn checked_add(self, duration: Duration) -> Option<Instant> {
        let millis = i64::try_from(duration.as_millis()).ok()?;
        self.millis.checked_add(millis).map(Instant::from_millis)
    }
}

/// Whole milliseconds of a duration, saturating at the largest representable value.
fn saturating_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::max_value())
}

impl Expiration {
    /// The deadline that is `timeout` from now, or never if there is no timeout.
    ///
    /// A timeout reaching beyond the range of the clock never expires either.
    pub fn after(timeout: Option<Duration>) -> Self {
        match timeout.and_then(|timeout| Instant::now().checked_add(timeout)) {
            Some(at) => When(at),
            None => Never,
        }
    }

    /// Time left until the deadline, or `None` if it never expires.
    ///
    /// A deadline in the past has zero time left.
    pub fn remaining(self, now: Instant) -> Option<Duration> {
        match self {
            When(at) if at > now => Some(at - now),
            When(_) => Some(Duration::from_millis(0)),
            Never => None,
        }
    }

    /// Check if the deadline has passed.
    pub fn is_expired(self, now: Instant) -> bool {
        match self {
            When(at) => at <= now,
            Never => false,
        }
    }

    /// The earlier of two deadlines.
    pub fn earliest(self, other: Self) -> Self {
        cmp::min(self, other)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}s", self.secs(), self.millis())
    }
}

impl ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis.saturating_add(saturating_millis(rhs)))
    }
}

impl ops::AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        self.millis = self.millis.saturating_add(saturating_millis(rhs));
    }
}

impl ops::Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis.saturating_sub(saturating_millis(rhs)))
    }
}

impl ops::Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        Duration::from_millis(self.millis.saturating_sub(rhs.millis).unsigned_abs())
    }
}

impl Default for Expiration {
    fn default() -> Self {
        Expiration::Never
    }
}

impl From<Option<Instant>> for Expiration {
    fn from(opt: Option<Instant>) -> Self {
        match opt {
            Some(instant) => When(instant),
            None => Never,
        }
    }
}

impl From<Expiration> for Option<Instant> {
    fn from(opt: Expiration) -> Self {
        match opt {
            When(instant) => Some(instant),
            Never => None,
        }
    }
}

impl cmp::PartialOrd<Self> for Expiration {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl cmp::Ord for Expiration {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        match (*self, *other) {
            (Never, Never) => cmp::Ordering::Equal,
            (Never, When(_)) => cmp::Ordering::Greater,
            (When(_), Never) => cmp::Ordering::Less,
            (When(ref a), When(ref b)) => a.cmp(b),
        }
    }
}
