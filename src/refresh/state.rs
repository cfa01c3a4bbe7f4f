use serde::{Deserialize, Serialize};

/// Lifecycle of one managed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPhase {
    /// No resource
    Idle,
    /// Valid URL held, nothing in flight
    Holding,
    /// A refresh attempt is in flight
    Refreshing,
    /// An attempt failed and a backoff retry is pending
    Retrying,
    /// Countdown reached zero without a successful refresh
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshEvent {
    /// Fresh source metadata was loaded
    Loaded,
    /// Source reset to nothing
    Cleared,
    Started,
    Succeeded,
    Failed { will_retry: bool },
    RetryFired,
    CountdownElapsed,
    Disposed,
}

impl RefreshPhase {
    /// Pure transition table. Events that make no sense in the current phase
    /// leave it unchanged.
    pub fn on(self, event: RefreshEvent) -> Self {
        use RefreshEvent as E;
        use RefreshPhase as P;

        match (self, event) {
            (_, E::Disposed) | (_, E::Cleared) => P::Idle,
            (_, E::Loaded) | (_, E::Succeeded) => P::Holding,
            (_, E::Started) => P::Refreshing,
            (P::Idle, _) => P::Idle,
            (_, E::Failed { will_retry: true }) => P::Retrying,
            (_, E::Failed { will_retry: false }) => P::Holding,
            (P::Retrying, E::RetryFired) => P::Refreshing,
            (P::Holding, E::CountdownElapsed) => P::Expired,
            (phase, _) => phase,
        }
    }

    pub fn has_resource(&self) -> bool {
        !matches!(self, RefreshPhase::Idle)
    }
}

impl std::fmt::Display for RefreshPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RefreshPhase::Idle => "idle",
            RefreshPhase::Holding => "holding",
            RefreshPhase::Refreshing => "refreshing",
            RefreshPhase::Retrying => "retrying",
            RefreshPhase::Expired => "expired",
        };
        f.pad(name)
    }
}
