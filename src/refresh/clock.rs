use chrono::{DateTime, Utc};

/// Source of "now" for expiry math. Injected so timer behavior can be
/// driven by tokio's paused test clock.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall time derived from tokio's monotonic `Instant`, anchored at creation.
/// Under `tokio::time::pause()` it advances only with virtual time.
#[derive(Debug, Clone)]
pub struct TokioClock {
    anchor: tokio::time::Instant,
    origin: DateTime<Utc>,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(origin: DateTime<Utc>) -> Self {
        Self {
            anchor: tokio::time::Instant::now(),
            origin,
        }
    }

    pub fn origin(&self) -> DateTime<Utc> {
        self.origin
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.anchor.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.origin + elapsed
    }
}

/// Whole seconds left before `expires_at`, floored and clamped at zero.
/// `None` when there is no expiry to count down to.
pub fn seconds_until(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<u64> {
    expires_at.map(|at| {
        let ms = (at - now).num_milliseconds();
        if ms <= 0 {
            0
        } else {
            (ms / 1000) as u64
        }
    })
}
