//! Refresh scheduler: one periodic task per monitored target.
//!
//! Each task runs immediately on spawn and then every `interval`, measured
//! from the end of the previous refresh. A failed refresh is logged and
//! leaves the previously published gauges alone; the task simply waits for
//! its next tick. All tasks hang off one [`CancellationToken`] so the whole
//! set can be stopped together.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::LifecycleSource;
use crate::error::Result;
use crate::metrics::{MetricSample, MetricSchema};
use crate::normalize::normalize;
use crate::providers::MonitoredTarget;

/// Default time between refreshes of one target.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(24 * 3600);

/// Fetch → normalize → publish for a single target.
pub struct RefreshTask {
    target: MonitoredTarget,
    host: String,
    source: Arc<dyn LifecycleSource>,
    schema: Arc<MetricSchema>,
    interval: Duration,
    last: Option<MetricSample>,
}

impl RefreshTask {
    pub fn new(
        target: MonitoredTarget,
        host: String,
        source: Arc<dyn LifecycleSource>,
        schema: Arc<MetricSchema>,
        interval: Duration,
    ) -> Self {
        Self {
            target,
            host,
            source,
            schema,
            interval,
            last: None,
        }
    }

    pub fn target(&self) -> &MonitoredTarget {
        &self.target
    }

    /// One iteration. Nothing is published unless both lookups succeed;
    /// a published sample replaces every series of the one before it.
    pub async fn refresh_once(&mut self) -> Result<MetricSample> {
        let product = self.target.product.as_str();
        let (cycle, details) = tokio::join!(
            self.source.fetch_cycle(product, &self.target.version),
            self.source.fetch_details(product),
        );
        let (cycle, details) = normalize(&cycle?, &details?);

        let sample = MetricSample {
            host: self.host.clone(),
            product: self.target.product.clone(),
            cycle,
            details,
        };
        self.schema.replace(self.last.as_ref(), &sample);
        self.last = Some(sample.clone());
        Ok(sample)
    }

    /// Refresh until `token` is cancelled.
    pub async fn run(mut self, token: CancellationToken) {
        info!(
            product = %self.target.product,
            version = %self.target.version,
            origin = %self.target.origin,
            interval_secs = self.interval.as_secs(),
            "Refresh task started"
        );

        loop {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                outcome = self.refresh_once() => outcome,
            };
            match outcome {
                Ok(sample) => info!(
                    product = %self.target.product,
                    version = %self.target.version,
                    cycle = %sample.cycle.name,
                    eol = ?sample.cycle.eol.date,
                    "Lifecycle data refreshed"
                ),
                Err(e) => warn!(
                    product = %self.target.product,
                    version = %self.target.version,
                    kind = e.as_label(),
                    error = %e,
                    "Refresh failed, keeping previous values until next tick"
                ),
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        debug!(
            product = %self.target.product,
            version = %self.target.version,
            "Refresh task stopped"
        );
    }
}

/// Supervises the refresh tasks of all targets.
pub struct Scheduler {
    source: Arc<dyn LifecycleSource>,
    schema: Arc<MetricSchema>,
    host: String,
    interval: Duration,
    token: CancellationToken,
    tasks: JoinSet<()>,
}

impl Scheduler {
    pub fn new(
        source: Arc<dyn LifecycleSource>,
        schema: Arc<MetricSchema>,
        host: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            schema,
            host: host.into(),
            interval,
            token: CancellationToken::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Start the refresh task of `target`. Must be called within a Tokio
    /// runtime.
    pub fn spawn(&mut self, target: MonitoredTarget) {
        let task = RefreshTask::new(
            target,
            self.host.clone(),
            Arc::clone(&self.source),
            Arc::clone(&self.schema),
            self.interval,
        );
        self.tasks.spawn(task.run(self.token.child_token()));
    }

    pub fn spawn_all(&mut self, targets: impl IntoIterator<Item = MonitoredTarget>) {
        for target in targets {
            self.spawn(target);
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Token whose cancellation stops every task.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel all tasks and wait for them to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        while let Some(res) = self.tasks.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "Refresh task ended abnormally");
            }
        }
        info!("Scheduler stopped");
    }
}
