//! Agent entry point.
//!
//! Usage: `twilight [CONFIG.json]`. Logging follows `RUST_LOG` (default `info`).

use std::process::ExitCode;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use twilight::{
    Controller, DeviceSelector, PresenceListener, Roster, RosterConsumer, RunSchedule,
    TwilightConfig, TwilightError,
};

/// Logs the cameras the configuration asks for, and the ones it cannot find
struct RosterLogger {
    selectors: Vec<DeviceSelector>,
}

#[async_trait]
impl RosterConsumer for RosterLogger {
    async fn consume(&self, roster: Roster) {
        for record in &roster.devices {
            let wanted =
                self.selectors.is_empty() || self.selectors.iter().any(|s| s.matches(record));
            if wanted {
                tracing::info!(
                    taken_at = %roster.taken_at,
                    host = %record.host(),
                    hostname = %record.hostname(),
                    mac = record.mac().unwrap_or_default(),
                    model = record.model().unwrap_or_default(),
                    version = record.version().unwrap_or_default(),
                    "Camera present"
                );
            }
        }

        for selector in &self.selectors {
            if !roster.devices.iter().any(|r| selector.matches(r)) {
                tracing::warn!(?selector, "Configured camera not announced");
            }
        }
    }
}

fn load_config() -> Result<TwilightConfig, TwilightError> {
    match std::env::args_os().nth(1) {
        Some(path) => TwilightConfig::from_json_file(path),
        None => Ok(TwilightConfig::default()),
    }
}

async fn run(config: TwilightConfig) -> Result<(), TwilightError> {
    let listener = PresenceListener::bind(&config.discovery).await?;
    let schedule = RunSchedule::from(&config.schedule);
    let consumer = RosterLogger {
        selectors: config.devices.clone(),
    };
    let controller = Controller::system(config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let receiver = {
        let controller = controller.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { controller.run_receiver(listener, shutdown).await })
    };
    let consumer = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.run_consumer(&consumer, schedule, shutdown_rx).await })
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for Ctrl-C");
    }
    tracing::info!("Shutting down");
    shutdown_tx.send_replace(true);

    // The loops finish their current receive or sleep tick first
    if let Err(e) = receiver.await {
        tracing::error!(error = %e, "Receive task failed");
    }
    if let Err(e) = consumer.await {
        tracing::error!(error = %e, "Consumer task failed");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Cannot load configuration");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(version = twilight::VERSION, "twilight starting");

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "twilight stopped");
            ExitCode::FAILURE
        }
    }
}
