//! Lifelog Sync — keeps a day-partitioned lifelog cache trustworthy.
//!
//! A cached past day is served without a network call only once observed data
//! on a strictly later day confirms it complete. This crate provides:
//! - The completeness tracker over a memoized cache scan
//! - The per-day fetch policy and per-call sessions with post-run confirmation upgrades
//! - Smart probes that manufacture evidence for ranges ending in the past
//! - Per-day, bulk and hybrid range strategies behind one trait
//! - TOML configuration and the `SyncManager` facade

pub mod completeness;
pub mod config;
pub mod fetch;
pub mod manager;
pub mod planner;
pub mod probe;
pub mod session;
pub mod strategy;

pub use completeness::{CompletenessTracker, ScanCache};
pub use config::{ApiConfig, CacheConfig, ConfigError, FetchConfig, SyncConfig};
pub use fetch::{decide, fetch_day, FetchDecision};
pub use manager::SyncManager;
pub use planner::{needs_remote, Gap, GapPlanner, GapStrategy};
pub use probe::{plan_probe, Prober};
pub use session::{SyncContext, SyncSession};
pub use strategy::{
    order_by_direction, BulkStreamer, DailyStreamer, FailureScope, FetchFailure, HybridStreamer,
    LogsByDay, RangeOutput, RangeRequest, RangeStreamingStrategy, StrategyKind,
};
