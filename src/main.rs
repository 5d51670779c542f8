use std::time::Duration;

use chrono::Utc;
use tokio::signal;
use tokio::time::interval;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use well_monitor::api::{DashboardClient, TimeRange};
use well_monitor::config::Config;
use well_monitor::dashboard::{Dashboard, PollCursor};
use well_monitor::normalize::Channel;
use well_monitor::presenter::{GaugeIds, TracingRenderer, WidgetRegistry};

const LINES_ID: &str = "lines";
const LOGS_ID: &str = "logs";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,well_monitor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting well-monitor...");

    // Load configuration (fail-fast)
    let config = Config::from_env()?;
    tracing::info!(
        deployment = ?config.deployment,
        api = %config.api_base_url,
        poll_secs = config.poll_interval_seconds,
        "Configuration loaded"
    );

    let client = DashboardClient::new(&config)?;
    let registry = WidgetRegistry::new(TracingRenderer::default(), config.display_zone);
    let mut dashboard = Dashboard::new(client, registry)
        .with_policies(config.empty_data_policy, config.unknown_channel_policy);

    let gauges: GaugeIds = Channel::MEASURED
        .into_iter()
        .map(|c| (c, format!("{}-gauge", c.name().to_lowercase())))
        .collect();
    {
        let registry = dashboard.registry_mut();
        registry.plot_gauges(&gauges)?;
        registry.plot_lines(LINES_ID)?;
        registry.plot_table(LOGS_ID)?;
    }

    // Anchor the first window on the newest stored sample, not the wall clock
    let now = Utc::now();
    let last_data = match dashboard.latest_timestamps().await {
        Ok(status) => {
            tracing::info!(last_sync = ?status.last_sync, last_data = ?status.last_data, "Backend sync status");
            status.last_data.unwrap_or(now)
        }
        Err(e) => {
            tracing::warn!(error = %e.display_message(), "Could not fetch sync status");
            now
        }
    };
    let start = config.initial_window_start(last_data)?;

    // Logs and data advance independently
    let mut logs = PollCursor::new(TimeRange::new(start, last_data));
    let mut data = PollCursor::new(TimeRange::new(start, last_data));

    let mut ticker = interval(Duration::from_secs(config.poll_interval_seconds.max(1)));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        let logs_ok = match dashboard.update_logs(&logs.range, LOGS_ID, logs.append).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e.display_message(), "Failed to update logs");
                false
            }
        };
        let data_ok = match dashboard
            .update_data(&data.range, Some(&gauges), Some(LINES_ID), data.append)
            .await
        {
            Ok(sample) => {
                tracing::debug!(samples = sample.len(), "Data updated");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e.display_message(), "Failed to update data");
                false
            }
        };

        let now = Utc::now();
        logs.advance(logs_ok, now);
        data.advance(data_ok, now);
    }

    tracing::info!("Shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        },
    }
}
