//! Fetch → normalize → present pipeline.
//!
//! Every update is one request followed by a synchronous render. Nothing is
//! retried and concurrent updates are not coordinated; callers log the error
//! and keep going.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::api::{DashboardClient, SyncStatus, TimeRange};
use crate::error::AppResult;
use crate::normalize::{Channel, EmptyDataPolicy, ScaledSample, UnknownChannelPolicy, normalize};
use crate::presenter::{GaugeIds, Renderer, WidgetRegistry};

pub struct Dashboard<R: Renderer> {
    client: DashboardClient,
    registry: WidgetRegistry<R>,
    empty_policy: EmptyDataPolicy,
    unknown_policy: UnknownChannelPolicy,
}

impl<R: Renderer> Dashboard<R> {
    pub fn new(client: DashboardClient, registry: WidgetRegistry<R>) -> Self {
        Self {
            client,
            registry,
            empty_policy: EmptyDataPolicy::default(),
            unknown_policy: UnknownChannelPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policies(mut self, empty: EmptyDataPolicy, unknown: UnknownChannelPolicy) -> Self {
        self.empty_policy = empty;
        self.unknown_policy = unknown;
        self
    }

    pub fn registry(&self) -> &WidgetRegistry<R> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut WidgetRegistry<R> {
        &mut self.registry
    }

    /// # Errors
    ///
    /// Propagates fetch and parse errors from [`DashboardClient::fetch_sync`].
    pub async fn latest_timestamps(&self) -> AppResult<SyncStatus> {
        self.client.fetch_sync().await
    }

    /// Fetch samples for `range` and convert them to physical units.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`DashboardClient::fetch_data`] and [`normalize`].
    pub async fn fetch_scaled(&self, range: &TimeRange) -> AppResult<ScaledSample> {
        let raw = self.client.fetch_data(range, self.empty_policy).await?;
        let scaled = normalize(&raw, self.unknown_policy)?;
        tracing::debug!(
            start = %range.start,
            stop = %range.stop,
            samples = scaled.len(),
            "Fetched samples"
        );
        Ok(scaled)
    }

    /// Fetch log rows for `range` into the table registered as `table_id`.
    ///
    /// # Errors
    ///
    /// Propagates fetch errors and renderer failures.
    pub async fn update_logs(&mut self, range: &TimeRange, table_id: &str, append: bool) -> AppResult<()> {
        let logs = self.client.fetch_logs(range).await?;
        tracing::debug!(rows = logs.data.len(), "Fetched logs");
        self.registry.update_table(table_id, &logs, append)
    }

    /// Fetch samples for `range`, show each channel's latest value on the
    /// gauges and plot the series on the line chart.
    ///
    /// A channel that is present but empty shows 0 on its gauge; an absent
    /// channel leaves its gauge untouched.
    ///
    /// # Errors
    ///
    /// Propagates fetch/normalize errors and renderer failures.
    pub async fn update_data(
        &mut self,
        range: &TimeRange,
        gauges: Option<&GaugeIds>,
        line_id: Option<&str>,
        append: bool,
    ) -> AppResult<ScaledSample> {
        let scaled = self.fetch_scaled(range).await?;

        if let Some(gauges) = gauges {
            self.registry.update_gauges(gauges, &gauge_values(&scaled))?;
        }
        if let Some(line_id) = line_id {
            self.registry.update_lines(line_id, &scaled, append)?;
        }

        Ok(scaled)
    }
}

/// Latest value per measured channel; 0 for channels without values.
#[must_use]
pub fn gauge_values(sample: &ScaledSample) -> BTreeMap<Channel, f64> {
    Channel::MEASURED
        .into_iter()
        .filter(|&c| sample.channel(c).is_some())
        .map(|c| (c, sample.last_value(c).unwrap_or(0.0)))
        .collect()
}

/// Polling window for one feed. The first fetch replaces, later ones append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollCursor {
    pub range: TimeRange,
    pub append: bool,
}

impl PollCursor {
    #[must_use]
    pub fn new(range: TimeRange) -> Self {
        Self { range, append: false }
    }

    /// Move past a fetched window, or widen a failed one so the next fetch
    /// covers the gap.
    pub fn advance(&mut self, succeeded: bool, now: DateTime<Utc>) {
        if succeeded {
            self.append = true;
            self.range = TimeRange::new(self.range.stop, now);
        } else {
            self.range.stop = now;
        }
    }
}
