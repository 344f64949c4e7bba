//! The `SyncManager` facade: configuration in, a store, a remote and a strategy out.

use crate::completeness::CompletenessTracker;
use crate::config::{ConfigError, SyncConfig};
use crate::fetch;
use crate::session::{SyncContext, SyncSession};
use crate::strategy::{
    BulkStreamer, DailyStreamer, HybridStreamer, RangeOutput, RangeRequest, RangeStreamingStrategy,
    StrategyKind,
};
use chrono::NaiveDate;
use lifelog_core::{
    CacheStore, Clock, Direction, FilesystemStore, HttpSource, Lifelog, RemoteError, RemoteSource,
    SystemClock,
};
use std::sync::Arc;
use tracing::info;

/// Entry point for callers: owns the sync context and configuration, and
/// builds strategies on demand.
pub struct SyncManager {
    ctx: SyncContext,
    config: SyncConfig,
}

impl SyncManager {
    /// Filesystem cache, HTTP remote, system clock.
    pub fn from_config(config: &SyncConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let api_key = config.api.api_key()?;
        let remote = HttpSource::new(&config.api.http_config(), api_key)?;
        let store = FilesystemStore::new(config.cache.root.clone());
        info!(
            cache = %config.cache.root.display(),
            strategy = %config.fetch.strategy,
            timezone = %config.fetch.timezone,
            "sync manager ready"
        );
        Self::with_parts(Arc::new(store), Arc::new(remote), Arc::new(SystemClock), config.clone())
    }

    /// Explicit collaborators; the config still supplies query and strategy
    /// options.
    pub fn with_parts(
        store: Arc<dyn CacheStore>,
        remote: Arc<dyn RemoteSource>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let params = config.fetch.query_params()?;
        Ok(Self {
            ctx: SyncContext::new(store, remote, clock, params),
            config,
        })
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn execution_date(&self) -> NaiveDate {
        self.ctx.execution_date()
    }

    pub fn strategy(&self, kind: StrategyKind) -> Box<dyn RangeStreamingStrategy> {
        let fetch = &self.config.fetch;
        match kind {
            StrategyKind::PerDay => {
                Box::new(DailyStreamer::new(self.ctx.clone()).with_workers(fetch.daily_workers))
            }
            StrategyKind::Bulk => Box::new(BulkStreamer::new(self.ctx.clone())),
            StrategyKind::Hybrid => Box::new(
                HybridStreamer::new(self.ctx.clone())
                    .with_planner(fetch.planner())
                    .with_max_workers(fetch.hybrid_max_workers),
            ),
        }
    }

    /// Stream a range with the configured strategy.
    pub fn stream_range(&self, request: &RangeRequest) -> RangeOutput {
        self.stream_range_with(self.config.fetch.strategy, request)
    }

    pub fn stream_range_with(&self, kind: StrategyKind, request: &RangeRequest) -> RangeOutput {
        let strategy = self.strategy(kind);
        let output = strategy.stream_range(request);
        info!(
            strategy = strategy.name(),
            start = %request.start,
            end = %request.end,
            records = output.logs.len(),
            failures = output.failures.len(),
            "range streamed"
        );
        output
    }

    /// Serve a single day through the fetch policy. No probe, no upgrade.
    pub fn fetch_day(&self, day: NaiveDate) -> Result<Vec<Lifelog>, RemoteError> {
        let session = SyncSession::new(&self.ctx, Direction::default(), false);
        fetch::fetch_day(&session, day)
    }

    /// Latest cached day after `day` with non-empty logs, up to today.
    pub fn confirmation_frontier(&self, day: NaiveDate) -> Option<NaiveDate> {
        CompletenessTracker::new(Arc::clone(&self.ctx.store)).confirmed_after(day, self.execution_date())
    }
}
