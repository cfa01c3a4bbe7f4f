use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::config::RefreshConfig;
use crate::refresh::clock::{seconds_until, Clock, SystemClock};
use crate::refresh::error::{RefreshError, RefreshOutcome};
use crate::refresh::executor::{RefreshCallback, RetryPolicy};
use crate::refresh::metadata::{normalize, UrlInput, UrlMetadata};
use crate::refresh::scheduler::{plan_deadline, DeadlinePlan, TimerHandle, TimerKind, DEFAULT_BUFFER};
use crate::refresh::state::{RefreshEvent, RefreshPhase};

/// Tuning knobs for one manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOptions {
    pub buffer: Duration,
    pub auto_refresh: bool,
    pub retry: RetryPolicy,
    pub tick: Duration,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            buffer: DEFAULT_BUFFER,
            auto_refresh: true,
            retry: RetryPolicy::default(),
            tick: Duration::from_secs(1),
        }
    }
}

impl From<&RefreshConfig> for RefreshOptions {
    fn from(config: &RefreshConfig) -> Self {
        Self {
            buffer: Duration::from_millis(config.buffer_ms),
            auto_refresh: config.auto_refresh,
            retry: RetryPolicy::new(config.max_retries, Duration::from_millis(config.retry_base_ms)),
            tick: Duration::from_millis(config.tick_ms).max(MIN_TICK),
        }
    }
}

/// Point-in-time view of a manager, published on every change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlSnapshot {
    pub url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_refreshing: bool,
    pub error: Option<RefreshError>,
    pub time_until_expiry: Option<u64>,
    pub phase: RefreshPhase,
    pub retry_count: u32,
}

impl UrlSnapshot {
    fn idle() -> Self {
        Self {
            url: None,
            expires_at: None,
            is_refreshing: false,
            error: None,
            time_until_expiry: None,
            phase: RefreshPhase::Idle,
            retry_count: 0,
        }
    }
}

#[derive(Debug)]
struct ManagerState {
    metadata: Option<UrlMetadata>,
    phase: RefreshPhase,
    in_flight: u32,
    error: Option<RefreshError>,
    time_until_expiry: Option<u64>,
    retry_count: u32,
    // Bumped on dispose and on source reset; attempts started under an older
    // epoch never write back.
    epoch: u64,
    disposed: bool,
    deadline: Option<TimerHandle>,
    ticker: Option<TimerHandle>,
    retry: Option<TimerHandle>,
}

impl ManagerState {
    fn new() -> Self {
        Self {
            metadata: None,
            phase: RefreshPhase::Idle,
            in_flight: 0,
            error: None,
            time_until_expiry: None,
            retry_count: 0,
            epoch: 0,
            disposed: false,
            deadline: None,
            ticker: None,
            retry: None,
        }
    }

    fn apply(&mut self, event: RefreshEvent) {
        self.phase = self.phase.on(event);
    }

    fn snapshot(&self) -> UrlSnapshot {
        UrlSnapshot {
            url: self.metadata.as_ref().map(|m| m.url.clone()),
            expires_at: self.metadata.as_ref().and_then(|m| m.expires_at),
            is_refreshing: self.in_flight > 0,
            error: self.error.clone(),
            time_until_expiry: self.time_until_expiry,
            phase: self.phase,
            retry_count: self.retry_count,
        }
    }

    /// Remove the timer from its slot if it is still the armed one
    fn release_timer(&mut self, kind: TimerKind, id: u64) -> bool {
        let slot = match kind {
            TimerKind::Deadline => &mut self.deadline,
            TimerKind::Tick => &mut self.ticker,
            TimerKind::Retry => &mut self.retry,
        };
        if slot.as_ref().map(TimerHandle::id) != Some(id) {
            return false;
        }
        if let Some(handle) = slot.take() {
            handle.detach();
        }
        true
    }
}

/// `interval_at` panics on a zero period
const MIN_TICK: Duration = Duration::from_millis(1);

struct Shared {
    id: Uuid,
    options: RefreshOptions,
    callback: Option<Arc<dyn RefreshCallback>>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    state: Mutex<ManagerState>,
    updates: watch::Sender<UrlSnapshot>,
    next_timer_id: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &ManagerState) {
        self.updates.send_replace(state.snapshot());
    }

    /// Restart the countdown and the deadline timer from the current metadata.
    /// Both always move together so they never track different expiries.
    fn rearm(self: &Arc<Self>, state: &mut ManagerState) {
        state.deadline = None;
        state.ticker = None;

        let Some(metadata) = state.metadata.clone() else {
            state.time_until_expiry = None;
            return;
        };

        let now = self.clock.now();
        state.time_until_expiry = seconds_until(metadata.expires_at, now);
        match state.time_until_expiry {
            Some(0) => state.apply(RefreshEvent::CountdownElapsed),
            Some(_) => state.ticker = Some(self.spawn_ticker()),
            None => {}
        }

        match plan_deadline(&metadata, self.options.buffer, self.options.auto_refresh, now) {
            DeadlinePlan::Unscheduled => {
                tracing::debug!("URL manager {}: no refresh scheduled", self.id);
            }
            DeadlinePlan::After(delay) => {
                tracing::debug!("URL manager {}: refresh armed in {:?}", self.id, delay);
                state.deadline = Some(self.spawn_timer(TimerKind::Deadline, delay));
            }
            DeadlinePlan::Immediate => {
                tracing::debug!("URL manager {}: inside refresh buffer, refreshing now", self.id);
                state.deadline = Some(self.spawn_timer(TimerKind::Deadline, Duration::ZERO));
            }
            DeadlinePlan::Overdue { past_expiry } => {
                tracing::warn!(
                    "URL manager {}: URL expired {:?} ago, beyond the refresh buffer; waiting for a manual refresh",
                    self.id,
                    past_expiry
                );
            }
        }
    }

    fn spawn_timer(self: &Arc<Self>, kind: TimerKind, delay: Duration) -> TimerHandle {
        let id = self.next_timer_id.fetch_add(1, Ordering::Relaxed);
        let weak = Arc::downgrade(self);
        let task = self.runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Some(shared) = weak.upgrade() {
                shared.fire(kind, id).await;
            }
        });
        TimerHandle::new(id, kind, task)
    }

    fn spawn_ticker(self: &Arc<Self>) -> TimerHandle {
        let id = self.next_timer_id.fetch_add(1, Ordering::Relaxed);
        let weak: Weak<Shared> = Arc::downgrade(self);
        let period = self.options.tick.max(MIN_TICK);
        let task = self.runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else { break };
                if !shared.tick(id) {
                    break;
                }
            }
        });
        TimerHandle::new(id, TimerKind::Tick, task)
    }

    /// One countdown step. Returns false once the ticker should stop.
    fn tick(&self, id: u64) -> bool {
        let mut state = self.lock();
        if state.disposed || state.ticker.as_ref().map(TimerHandle::id) != Some(id) {
            return false;
        }

        let expires_at = state.metadata.as_ref().and_then(|m| m.expires_at);
        state.time_until_expiry = seconds_until(expires_at, self.clock.now());

        let keep_ticking = matches!(state.time_until_expiry, Some(remaining) if remaining > 0);
        if !keep_ticking {
            state.release_timer(TimerKind::Tick, id);
            if state.time_until_expiry == Some(0) {
                tracing::info!("URL manager {}: URL has expired", self.id);
                state.apply(RefreshEvent::CountdownElapsed);
            }
        }
        self.publish(&state);
        keep_ticking
    }

    /// Deadline or retry timer elapsed
    async fn fire(self: Arc<Self>, kind: TimerKind, id: u64) {
        {
            let mut state = self.lock();
            if state.disposed || !state.release_timer(kind, id) {
                tracing::debug!("URL manager {}: stale {:?} timer #{} ignored", self.id, kind, id);
                return;
            }
            if kind == TimerKind::Retry {
                state.apply(RefreshEvent::RetryFired);
            }
        }
        // Failures are already recorded in state and drive the retry policy.
        let _ = self.execute_refresh().await;
    }

    /// Shared path for scheduled, retried and manual refreshes
    async fn execute_refresh(self: &Arc<Self>) -> Result<RefreshOutcome, RefreshError> {
        let Some(callback) = self.callback.clone() else {
            tracing::warn!(
                "URL manager {}: refresh requested but no refresh callback is configured",
                self.id
            );
            return Ok(RefreshOutcome::NoCallback);
        };

        let epoch = {
            let mut state = self.lock();
            if state.disposed {
                return Err(RefreshError::Disposed);
            }
            state.in_flight += 1;
            state.error = None;
            state.apply(RefreshEvent::Started);
            self.publish(&state);
            state.epoch
        };

        tracing::debug!("URL manager {}: calling refresh callback", self.id);
        let result = callback.refresh().await;

        let mut state = self.lock();
        if state.epoch != epoch {
            tracing::debug!("URL manager {}: dropping refresh result from a previous source", self.id);
            return Ok(RefreshOutcome::Discarded);
        }
        state.in_flight = state.in_flight.saturating_sub(1);

        match result {
            Ok(input) => {
                let metadata = UrlMetadata::from(input);
                tracing::info!(
                    "URL manager {}: refreshed URL, expires at {:?}",
                    self.id,
                    metadata.expires_at
                );
                state.metadata = Some(metadata.clone());
                state.retry_count = 0;
                state.retry = None;
                state.apply(RefreshEvent::Succeeded);
                self.rearm(&mut state);
                self.publish(&state);
                Ok(RefreshOutcome::Refreshed(metadata))
            }
            Err(err) => {
                let error = RefreshError::from_callback(&err);
                state.error = Some(error.clone());

                match self.options.retry.delay_for(state.retry_count) {
                    Some(delay) => {
                        state.retry_count += 1;
                        tracing::warn!(
                            "URL manager {}: {}; retry {}/{} in {:?}",
                            self.id,
                            error,
                            state.retry_count,
                            self.options.retry.max_retries,
                            delay
                        );
                        state.retry = Some(self.spawn_timer(TimerKind::Retry, delay));
                        state.apply(RefreshEvent::Failed { will_retry: true });
                    }
                    None => {
                        tracing::warn!(
                            "URL manager {}: {}; retry budget exhausted, keeping last known URL",
                            self.id,
                            error
                        );
                        if state.metadata.is_none() {
                            // Never obtained a URL, nothing to hold on to
                            state.apply(RefreshEvent::Cleared);
                        } else {
                            state.apply(RefreshEvent::Failed { will_retry: false });
                            if state.time_until_expiry == Some(0) {
                                state.apply(RefreshEvent::CountdownElapsed);
                            }
                        }
                    }
                }
                self.publish(&state);
                Err(error)
            }
        }
    }

    fn load(self: &Arc<Self>, state: &mut ManagerState, input: Option<UrlInput>) {
        state.metadata = normalize(input);
        state.error = None;
        state.retry_count = 0;
        state.retry = None;
        state.in_flight = 0;
        state.apply(if state.metadata.is_some() {
            RefreshEvent::Loaded
        } else {
            RefreshEvent::Cleared
        });
        self.rearm(state);
    }

    fn dispose(&self) {
        let mut state = self.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.epoch += 1;
        state.deadline = None;
        state.ticker = None;
        state.retry = None;
        state.metadata = None;
        state.in_flight = 0;
        state.time_until_expiry = None;
        state.apply(RefreshEvent::Disposed);
        self.publish(&state);
        tracing::debug!("URL manager {}: disposed", self.id);
    }
}

/// Keeps one signed URL usable by refreshing it ahead of expiry.
///
/// Owns a deadline timer, a one-second countdown and a backoff retry timer.
/// `dispose()` (or dropping the manager) cancels all three; results of
/// attempts still in flight at that point are discarded.
pub struct UrlRefreshManager {
    shared: Arc<Shared>,
}

impl UrlRefreshManager {
    pub fn builder() -> UrlRefreshManagerBuilder {
        UrlRefreshManagerBuilder::default()
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Last known good URL. May be stale while a refresh is in flight.
    pub fn url(&self) -> Option<String> {
        self.shared.lock().metadata.as_ref().map(|m| m.url.clone())
    }

    /// Current URL, or the placeholder when no metadata was ever obtained
    pub fn url_or(&self, placeholder: &str) -> String {
        self.url().unwrap_or_else(|| placeholder.to_string())
    }

    pub fn metadata(&self) -> Option<UrlMetadata> {
        self.shared.lock().metadata.clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.shared.lock().in_flight > 0
    }

    pub fn error(&self) -> Option<RefreshError> {
        self.shared.lock().error.clone()
    }

    /// Whole seconds until expiry; `None` when the URL does not expire
    pub fn time_until_expiry(&self) -> Option<u64> {
        self.shared.lock().time_until_expiry
    }

    pub fn phase(&self) -> RefreshPhase {
        self.shared.lock().phase
    }

    pub fn retry_count(&self) -> u32 {
        self.shared.lock().retry_count
    }

    pub fn has_deadline(&self) -> bool {
        self.shared.lock().deadline.is_some()
    }

    pub fn has_pending_retry(&self) -> bool {
        self.shared.lock().retry.is_some()
    }

    pub fn is_counting_down(&self) -> bool {
        self.shared.lock().ticker.is_some()
    }

    pub fn snapshot(&self) -> UrlSnapshot {
        self.shared.lock().snapshot()
    }

    /// Receive a new snapshot every time observable state changes
    pub fn subscribe(&self) -> watch::Receiver<UrlSnapshot> {
        self.shared.updates.subscribe()
    }

    /// Refresh now. Same path as scheduled refreshes, including retry on
    /// failure. Resolves when this attempt completes.
    pub async fn refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        self.shared.execute_refresh().await
    }

    /// Replace the source metadata, e.g. after the owning resource changed.
    /// Pending timers are cancelled and in-flight results are discarded.
    pub fn set_source(&self, input: Option<UrlInput>) {
        let mut state = self.shared.lock();
        if state.disposed {
            return;
        }
        state.epoch += 1;
        self.shared.load(&mut state, input);
        self.shared.publish(&state);
    }

    /// Cancel every timer and drop the URL. Idempotent.
    pub fn dispose(&self) {
        self.shared.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.lock().disposed
    }
}

impl Drop for UrlRefreshManager {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}

impl std::fmt::Debug for UrlRefreshManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlRefreshManager")
            .field("id", &self.shared.id)
            .field("options", &self.shared.options)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

pub struct UrlRefreshManagerBuilder {
    options: RefreshOptions,
    callback: Option<Arc<dyn RefreshCallback>>,
    clock: Arc<dyn Clock>,
}

impl Default for UrlRefreshManagerBuilder {
    fn default() -> Self {
        Self {
            options: RefreshOptions::default(),
            callback: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl UrlRefreshManagerBuilder {
    pub fn options(mut self, options: RefreshOptions) -> Self {
        self.options = options;
        self.options.tick = self.options.tick.max(MIN_TICK);
        self
    }

    pub fn buffer(mut self, buffer: Duration) -> Self {
        self.options.buffer = buffer;
        self
    }

    pub fn auto_refresh(mut self, enabled: bool) -> Self {
        self.options.auto_refresh = enabled;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.options.retry = retry;
        self
    }

    pub fn tick_interval(mut self, tick: Duration) -> Self {
        self.options.tick = tick.max(MIN_TICK);
        self
    }

    pub fn callback<C>(mut self, callback: C) -> Self
    where
        C: RefreshCallback + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn shared_callback(mut self, callback: Arc<dyn RefreshCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Seed the manager and arm its timers. Must be called inside a tokio runtime.
    pub fn build(self, initial: Option<UrlInput>) -> Result<UrlRefreshManager, RefreshError> {
        let runtime = Handle::try_current().map_err(|_| RefreshError::NoRuntime)?;
        let (updates, _) = watch::channel(UrlSnapshot::idle());

        let shared = Arc::new(Shared {
            id: Uuid::new_v4(),
            options: self.options,
            callback: self.callback,
            clock: self.clock,
            runtime,
            state: Mutex::new(ManagerState::new()),
            updates,
            next_timer_id: AtomicU64::new(1),
        });

        {
            let mut state = shared.lock();
            shared.load(&mut state, initial);
            shared.publish(&state);
        }

        tracing::debug!(
            "URL manager {} created (buffer {:?}, auto refresh {})",
            shared.id,
            shared.options.buffer,
            shared.options.auto_refresh
        );
        Ok(UrlRefreshManager { shared })
    }
}
