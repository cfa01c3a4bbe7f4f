use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::refresh::metadata::UrlMetadata;

/// Default safety margin before expiry at which a refresh is attempted
pub const DEFAULT_BUFFER: Duration = Duration::from_secs(5 * 60);

/// What the scheduler should do for a given metadata generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlinePlan {
    /// Auto refresh disabled or the URL never expires
    Unscheduled,
    /// Arm a one-shot timer for this long
    After(Duration),
    /// Inside the buffer window: refresh right away
    Immediate,
    /// More than one buffer length past the deadline. Left alone until a
    /// manual refresh.
    Overdue { past_expiry: Duration },
}

/// Decide when the next refresh is due.
///
/// `delay = expires_at - now - buffer`. A positive delay arms a timer, a delay
/// within one buffer length below zero fires immediately, anything older is
/// reported as overdue and not refreshed automatically.
pub fn plan_deadline(
    metadata: &UrlMetadata,
    buffer: Duration,
    auto_refresh: bool,
    now: DateTime<Utc>,
) -> DeadlinePlan {
    if !auto_refresh {
        return DeadlinePlan::Unscheduled;
    }
    let Some(expires_at) = metadata.expires_at else {
        return DeadlinePlan::Unscheduled;
    };

    let buffer_ms = i64::try_from(buffer.as_millis()).unwrap_or(i64::MAX);
    let remaining_ms = (expires_at - now).num_milliseconds();
    let delay_ms = remaining_ms.saturating_sub(buffer_ms);

    if delay_ms > 0 {
        DeadlinePlan::After(Duration::from_millis(delay_ms as u64))
    } else if delay_ms > buffer_ms.saturating_neg() {
        DeadlinePlan::Immediate
    } else {
        DeadlinePlan::Overdue {
            past_expiry: Duration::from_millis(remaining_ms.saturating_neg().max(0) as u64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Deadline,
    Tick,
    Retry,
}

/// Owned handle to a spawned timer task. Dropping it cancels the task, so
/// replacing a slot always cancels the timer it held.
#[derive(Debug)]
pub struct TimerHandle {
    id: u64,
    kind: TimerKind,
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    pub fn new(id: u64, kind: TimerKind, task: JoinHandle<()>) -> Self {
        Self {
            id,
            kind,
            task: Some(task),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    /// Release the handle without aborting. Used by a timer task that has
    /// fired and is removing itself from its slot.
    pub fn detach(mut self) {
        self.task.take();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            tracing::debug!("Cancelling {:?} timer #{}", self.kind, self.id);
            task.abort();
        }
    }
}
