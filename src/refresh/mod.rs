// Auto-refreshing manager for signed, short-lived blob URLs

pub mod clock;
pub mod error;
pub mod executor;
pub mod manager;
pub mod metadata;
pub mod scheduler;
pub mod source;
pub mod state;

// Re-export core types
pub use clock::{seconds_until, Clock, SystemClock, TokioClock};
pub use error::{RefreshError, RefreshOutcome};
pub use executor::{RefreshCallback, RetryPolicy};
pub use manager::{RefreshOptions, UrlRefreshManager, UrlRefreshManagerBuilder, UrlSnapshot};
pub use metadata::{normalize, UrlInput, UrlMetadata};
pub use scheduler::{plan_deadline, DeadlinePlan, DEFAULT_BUFFER};
pub use source::{HttpUrlSource, SourceError};
pub use state::{RefreshEvent, RefreshPhase};
