//! Data synchronization infrastructure
//!
//! This module pulls legislative data from congress.gov under a shared
//! request budget and writes it to the local store.
//!
//! # Components
//!
//! - [`rate_limiter`]: Token bucket admission control with FIFO waiters
//! - [`retry`]: Retry manager with exponential backoff and full jitter
//! - [`http_client`]: Rate-limited HTTP client for upstream API calls
//! - [`pagination`]: Same-offset retry and error budget policy for paged streams
//! - [`orchestrator`]: One end-to-end sync run in dependency order
//! - [`scheduler`]: Periodic and manual triggering of runs
//!
//! # Example
//!
//! ```ignore
//! use congress_sync::sync::{RetryManager, TokenBucket};
//! use congress_sync::config::{RateLimitConfig, RetryConfig};
//!
//! let limiter = TokenBucket::from_config(&RateLimitConfig::default());
//! let retry = RetryManager::new(&RetryConfig::default());
//!
//! let result = retry
//!     .execute(|| async {
//!         limiter.acquire(std::time::Duration::from_secs(60)).await?;
//!         fetch_page().await
//!     })
//!     .await;
//! ```

pub mod http_client;
pub mod orchestrator;
pub mod pagination;
pub mod rate_limiter;
pub mod retry;
pub mod scheduler;

// Re-export main types for convenience
pub use http_client::RateLimitedHttpClient;
pub use orchestrator::SyncOrchestrator;
pub use pagination::{BudgetExceeded, ErrorBudget, PageStep, Paginator};
pub use rate_limiter::{AdmissionStats, TokenBucket};
pub use retry::{RetryManager, RetryPolicy};
pub use scheduler::{ManualSyncHandle, SchedulerConfig, SchedulerStatus, SyncScheduler, Syncable};
