use crate::error::{AppError, Result};
use crate::shutdown::wait_for_shutdown;
use crate::weather::{GeoEntity, WeatherCoalescer, WeatherSource};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Signals from the data layer or UI that may warrant a weather refresh
#[derive(Debug, Clone)]
pub enum RefreshTrigger {
    /// The application regained foreground focus
    Focus,
    /// The tracked parcel set was reloaded
    EntitiesReplaced(Vec<GeoEntity>),
    /// One parcel's coordinates were edited
    CoordinatesChanged(GeoEntity),
}

/// Drives a [`WeatherCoalescer`] from the periodic timer and incoming triggers
pub struct RefreshScheduler<S> {
    coalescer: WeatherCoalescer<S>,
    triggers: mpsc::Receiver<RefreshTrigger>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<S: WeatherSource> RefreshScheduler<S> {
    pub fn new(
        coalescer: WeatherCoalescer<S>,
        triggers: mpsc::Receiver<RefreshTrigger>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            coalescer,
            triggers,
            shutdown_rx,
        }
    }

    pub fn coalescer(&self) -> &WeatherCoalescer<S> {
        &self.coalescer
    }

    pub fn into_coalescer(self) -> WeatherCoalescer<S> {
        self.coalescer
    }

    pub async fn run(&mut self) -> Result<()> {
        let periodic = self.coalescer.policy().periodic_interval;
        let periodic = if periodic.is_zero() {
            Duration::from_secs(60)
        } else {
            periodic
        };

        info!(
            "Weather refresh scheduler starting with {:?} periodic interval, {} min focus interval",
            periodic,
            self.coalescer.policy().focus_interval.num_minutes()
        );

        if self.coalescer.needs_initial_refresh() && !self.refresh_all().await {
            return Ok(());
        }

        // First tick one full period from now
        let mut ticker = interval_at(Instant::now() + periodic, periodic);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let keep_running = tokio::select! {
                _ = ticker.tick() => {
                    if self.coalescer.has_entities() {
                        info!("Periodic weather refresh");
                        self.refresh_all().await
                    } else {
                        debug!("Periodic tick with no tracked entities, skipping");
                        true
                    }
                }
                trigger = self.triggers.recv() => {
                    match trigger {
                        Some(trigger) => self.handle_trigger(trigger).await,
                        None => {
                            info!("Trigger channel closed, stopping weather scheduler");
                            false
                        }
                    }
                }
                _ = wait_for_shutdown(&mut self.shutdown_rx) => {
                    info!("Shutdown signal received, stopping weather scheduler");
                    false
                }
            };

            if !keep_running {
                break;
            }
        }

        Ok(())
    }

    /// Returns false once the scheduler should stop
    async fn handle_trigger(&mut self, trigger: RefreshTrigger) -> bool {
        match trigger {
            RefreshTrigger::Focus => {
                if self.coalescer.is_stale() {
                    info!("Focus regained with stale weather, refreshing");
                    self.refresh_all().await
                } else {
                    debug!("Focus regained, weather still fresh");
                    true
                }
            }
            RefreshTrigger::EntitiesReplaced(entities) => {
                self.coalescer.set_entities(entities);
                if self.coalescer.needs_initial_refresh() {
                    self.refresh_all().await
                } else {
                    true
                }
            }
            RefreshTrigger::CoordinatesChanged(entity) => {
                let id = entity.id;
                match self.coalescer.refresh_entity(entity).await {
                    Ok(report) => {
                        debug!(
                            "Coordinates changed for entity {}: {} entities updated",
                            id, report.updated_entities
                        );
                        true
                    }
                    Err(AppError::Cancelled) => false,
                    Err(e) => {
                        error!("Weather refresh for entity {} failed: {}", id, e);
                        true
                    }
                }
            }
        }
    }

    async fn refresh_all(&mut self) -> bool {
        match self.coalescer.refresh_all().await {
            Ok(_) => true,
            Err(AppError::Cancelled) => false,
            Err(e) => {
                error!("Weather refresh error: {}", e);
                true
            }
        }
    }
}
