use agrotrack::client::ApiClient;
use agrotrack::config::Config;
use agrotrack::scheduler::{RefreshScheduler, RefreshTrigger};
use agrotrack::weather::{ParcelSource, WeatherCoalescer, WeatherEvent};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,agrotrack=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Agrotrack weather service starting...");

    let config_path =
        std::env::var("AGROTRACK_CONFIG").unwrap_or_else(|_| "config/config.yaml".to_string());
    let config = Config::load(&config_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration from {}: {}\n\n\
             Make sure:\n\
             1. {} exists (or set AGROTRACK_CONFIG)\n\
             2. All required environment variables are set (check .env.example)\n\
             3. Create a .env file if needed",
            config_path,
            e,
            config_path
        )
    })?;
    info!("Configuration loaded");

    let client = Arc::new(ApiClient::new(&config.api, config.retry.clone())?);
    info!("API client ready for {}", config.api.base_url);

    let parcels = match client.list_parcels().await {
        Ok(parcels) => {
            info!("Loaded {} parcels", parcels.len());
            parcels
        }
        Err(e) => {
            warn!("Failed to load parcels, starting with none: {}", e);
            Vec::new()
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let mut coalescer =
        WeatherCoalescer::new(Arc::clone(&client), &config.weather, shutdown_rx.clone());
    coalescer.set_entities(parcels);

    tokio::spawn(log_weather_events(coalescer.subscribe()));

    let (trigger_tx, trigger_rx) = mpsc::channel(16);
    tokio::spawn(reload_on_hangup(Arc::clone(&client), trigger_tx));

    let mut scheduler = RefreshScheduler::new(coalescer, trigger_rx, shutdown_rx);

    if let Err(e) = scheduler.run().await {
        error!("Scheduler error: {}", e);
    }

    info!("Agrotrack weather service shutting down");
    Ok(())
}

async fn log_weather_events(mut events: broadcast::Receiver<WeatherEvent>) {
    loop {
        match events.recv().await {
            Ok(WeatherEvent::GroupUpdated {
                location,
                entity_ids,
                snapshot,
            }) => {
                for alert in snapshot.alerts() {
                    warn!("{} (parcels {:?}): {}", location, entity_ids, alert);
                }
            }
            Ok(WeatherEvent::GroupFailed {
                location, error, ..
            }) => {
                warn!("No weather for {}: {}", location, error);
            }
            Ok(WeatherEvent::CycleCompleted { fetched, failed }) => {
                info!("Weather cycle done: {} fetched, {} failed", fetched, failed);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Weather event listener lagged, {} events skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Reload parcels and request a focus refresh on SIGHUP
#[cfg(unix)]
async fn reload_on_hangup(client: Arc<ApiClient>, triggers: mpsc::Sender<RefreshTrigger>) {
    let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(sig) => sig,
        Err(e) => {
            error!("Failed to install SIGHUP handler: {}", e);
            // Keep the sender alive so the scheduler keeps running
            std::future::pending::<()>().await;
            return;
        }
    };

    while hangup.recv().await.is_some() {
        info!("Received SIGHUP, reloading parcels");
        match client.list_parcels().await {
            Ok(parcels) => {
                if triggers
                    .send(RefreshTrigger::EntitiesReplaced(parcels))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => error!("Failed to reload parcels: {}", e),
        }
        if triggers.send(RefreshTrigger::Focus).await.is_err() {
            break;
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(_client: Arc<ApiClient>, _triggers: mpsc::Sender<RefreshTrigger>) {
    std::future::pending::<()>().await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
