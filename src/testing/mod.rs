use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::refresh::{Clock, RefreshCallback, TokioClock, UrlInput, UrlMetadata};

/// One scripted answer from the refresh source
#[derive(Debug, Clone)]
pub enum Step {
    /// Return `url` expiring `ttl` after the moment of the call
    SucceedFor { url: String, ttl: Duration },
    /// Return a bare URL without expiry
    SucceedBare(String),
    Fail(String),
}

/// Refresh source that replays a script and records when it was called.
/// Once the script runs out it repeats `fallback`.
pub struct ScriptedSource {
    clock: Arc<TokioClock>,
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    latency: Duration,
    calls: Mutex<Vec<DateTime<Utc>>>,
}

impl ScriptedSource {
    pub fn new(clock: Arc<TokioClock>) -> Self {
        Self {
            clock,
            steps: Mutex::new(VecDeque::new()),
            fallback: Step::Fail("script exhausted".to_string()),
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, step: Step) -> Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }

    pub fn then_succeed_for(self, url: &str, ttl: Duration) -> Self {
        self.then(Step::SucceedFor {
            url: url.to_string(),
            ttl,
        })
    }

    pub fn then_fail(self, message: &str) -> Self {
        self.then(Step::Fail(message.to_string()))
    }

    pub fn otherwise(mut self, step: Step) -> Self {
        self.fallback = step;
        self
    }

    /// Simulated network time per call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Milliseconds since the clock origin for every call so far
    pub fn call_offsets_ms(&self) -> Vec<i64> {
        let origin = self.clock.origin();
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|at| (*at - origin).num_milliseconds())
            .collect()
    }
}

#[async_trait]
impl RefreshCallback for ScriptedSource {
    async fn refresh(&self) -> anyhow::Result<UrlInput> {
        let step = {
            self.calls.lock().unwrap().push(self.clock.now());
            self.steps
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match step {
            Step::SucceedFor { url, ttl } => {
                let ttl_chrono = chrono::Duration::from_std(ttl)?;
                Ok(UrlMetadata::expiring(url, self.clock.now() + ttl_chrono)
                    .with_expires_in(ttl.as_secs())
                    .into())
            }
            Step::SucceedBare(url) => Ok(UrlInput::Url(url)),
            Step::Fail(message) => Err(anyhow::anyhow!(message)),
        }
    }
}

/// Assert that observed offsets match the expected ones within a few
/// milliseconds of timer rounding.
pub fn assert_offsets_near(actual: &[i64], expected: &[i64]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "call offsets {:?} vs expected {:?}",
        actual,
        expected
    );
    for (a, e) in actual.iter().zip(expected) {
        assert!(
            (a - e).abs() <= 5,
            "call offsets {:?} vs expected {:?}",
            actual,
            expected
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn replays_script_then_fallback() {
        let clock = Arc::new(TokioClock::new());
        let source = ScriptedSource::new(clock.clone())
            .then_succeed_for("https://blob/1", Duration::from_secs(60))
            .then_fail("boom");

        let first = UrlMetadata::from(source.refresh().await.unwrap());
        assert_eq!(first.url, "https://blob/1");
        assert_eq!(first.expires_in, Some(60));
        assert!(source.refresh().await.is_err());
        assert!(source.refresh().await.is_err());
        assert_eq!(source.call_count(), 3);
    }
}
