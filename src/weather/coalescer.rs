use crate::config::WeatherConfig;
use crate::error::{AppError, Result};
use crate::shutdown::{is_shutdown, wait_for_shutdown};
use crate::weather::location::{GeoEntity, LocationKey};
use crate::weather::snapshot::WeatherSnapshot;
use crate::weather::source::WeatherSource;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Weather held for one entity, copied from its location group
#[derive(Debug, Clone, PartialEq)]
pub struct CachedWeather {
    pub snapshot: WeatherSnapshot,
    pub location_label: String,
    pub location_key: LocationKey,
}

/// Entities that share a rounded location and therefore one lookup
#[derive(Debug, Clone, PartialEq)]
pub struct LocationGroup {
    pub key: LocationKey,
    pub label: String,
    pub entity_ids: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshState {
    #[default]
    Idle,
    Fetching {
        group_index: usize,
        group_count: usize,
    },
}

/// Published as each group resolves so listeners see partial results
#[derive(Debug, Clone)]
pub enum WeatherEvent {
    GroupUpdated {
        location: String,
        entity_ids: Vec<i64>,
        snapshot: WeatherSnapshot,
    },
    GroupFailed {
        location: String,
        entity_ids: Vec<i64>,
        error: String,
    },
    CycleCompleted {
        fetched: usize,
        failed: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    pub groups: usize,
    pub fetched: usize,
    pub failures: Vec<GroupFailure>,
    /// Entities left out because they have no usable coordinates
    pub skipped: Vec<i64>,
    pub updated_entities: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupFailure {
    pub location: String,
    pub entity_ids: Vec<i64>,
    pub error: String,
}

/// When a focus event warrants a full refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub focus_interval: chrono::Duration,
    pub periodic_interval: Duration,
}

impl RefreshPolicy {
    pub fn from_config(config: &WeatherConfig) -> Self {
        Self {
            focus_interval: config.focus_refresh_interval(),
            periodic_interval: config.periodic_refresh_interval(),
        }
    }

    pub fn is_due_on_focus(&self, last_refresh: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_refresh {
            None => true,
            Some(last) => now.signed_duration_since(last) > self.focus_interval,
        }
    }

    /// Same rule as [`Self::is_due_on_focus`], from time elapsed since the last refresh
    pub fn is_due_after(&self, elapsed: Option<Duration>) -> bool {
        match elapsed {
            None => true,
            Some(elapsed) => chrono::Duration::from_std(elapsed)
                .map(|elapsed| elapsed > self.focus_interval)
                .unwrap_or(true),
        }
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::from_config(&WeatherConfig::default())
    }
}

/// Partition entities by rounded location, keeping first-seen order
///
/// Returns the groups and the ids of entities that could not be located.
pub fn group_by_location(entities: &[GeoEntity], precision: u32) -> (Vec<LocationGroup>, Vec<i64>) {
    let mut groups: Vec<LocationGroup> = Vec::new();
    let mut index_by_key: HashMap<LocationKey, usize> = HashMap::new();
    let mut skipped = Vec::new();

    for entity in entities {
        let Some(key) = entity.location_key(precision) else {
            skipped.push(entity.id);
            continue;
        };

        match index_by_key.get(&key) {
            Some(&index) => groups[index].entity_ids.push(entity.id),
            None => {
                let label = entity.display_location.trim();
                let label = if label.is_empty() {
                    key.to_string()
                } else {
                    label.to_string()
                };
                index_by_key.insert(key, groups.len());
                groups.push(LocationGroup {
                    key,
                    label,
                    entity_ids: vec![entity.id],
                });
            }
        }
    }

    (groups, skipped)
}

/// Per-entity weather cache fed by one lookup per distinct location
pub struct WeatherCoalescer<S> {
    source: Arc<S>,
    precision: u32,
    request_delay: Duration,
    policy: RefreshPolicy,
    entities: Vec<GeoEntity>,
    cache: HashMap<i64, CachedWeather>,
    last_refresh: Option<DateTime<Utc>>,
    refreshed_at: Option<Instant>,
    state_tx: watch::Sender<RefreshState>,
    events_tx: broadcast::Sender<WeatherEvent>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<S: WeatherSource> WeatherCoalescer<S> {
    pub fn new(source: Arc<S>, config: &WeatherConfig, shutdown_rx: watch::Receiver<bool>) -> Self {
        let (state_tx, _) = watch::channel(RefreshState::Idle);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            source,
            precision: config.coordinate_precision,
            request_delay: config.request_delay(),
            policy: RefreshPolicy::from_config(config),
            entities: Vec::new(),
            cache: HashMap::new(),
            last_refresh: None,
            refreshed_at: None,
            state_tx,
            events_tx,
            shutdown_rx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WeatherEvent> {
        self.events_tx.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<RefreshState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> RefreshState {
        *self.state_tx.borrow()
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    pub fn entities(&self) -> &[GeoEntity] {
        &self.entities
    }

    pub fn has_entities(&self) -> bool {
        !self.entities.is_empty()
    }

    pub fn weather_for(&self, entity_id: i64) -> Option<&CachedWeather> {
        self.cache.get(&entity_id)
    }

    pub fn cached(&self) -> &HashMap<i64, CachedWeather> {
        &self.cache
    }

    /// Time of the last full refresh in which at least one lookup succeeded
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    /// Replace the tracked entity set
    ///
    /// Cached weather is dropped for entities that left the set or can no
    /// longer be located.
    pub fn set_entities(&mut self, entities: Vec<GeoEntity>) {
        let locatable: HashMap<i64, bool> = entities
            .iter()
            .map(|e| (e.id, e.location_key(self.precision).is_some()))
            .collect();
        self.cache
            .retain(|id, _| locatable.get(id).copied().unwrap_or(false));

        debug!(
            "Tracking {} entities ({} cached)",
            entities.len(),
            self.cache.len()
        );
        self.entities = entities;
    }

    /// Some locatable entity has never received weather
    pub fn needs_initial_refresh(&self) -> bool {
        if self.last_refresh.is_none() && self.has_entities() {
            return true;
        }
        self.entities.iter().any(|e| {
            e.location_key(self.precision).is_some() && !self.cache.contains_key(&e.id)
        })
    }

    pub fn is_due_on_focus(&self, now: DateTime<Utc>) -> bool {
        self.policy.is_due_on_focus(self.last_refresh, now)
    }

    /// Whether a focus event should refresh now, measured on the monotonic clock
    pub fn is_stale(&self) -> bool {
        self.policy.is_due_after(self.refreshed_at.map(|at| at.elapsed()))
    }

    /// Fetch every distinct location once and fan the results out
    ///
    /// Returns `AppError::Cancelled` if shutdown is requested mid-cycle; groups
    /// completed before that keep their new weather.
    pub async fn refresh_all(&mut self) -> Result<RefreshReport> {
        let (groups, skipped) = group_by_location(&self.entities, self.precision);
        for id in &skipped {
            self.cache.remove(id);
        }

        info!(
            "Refreshing weather for {} entities across {} locations ({} without coordinates)",
            self.entities.len(),
            groups.len(),
            skipped.len()
        );

        let mut report = RefreshReport {
            groups: groups.len(),
            skipped,
            ..Default::default()
        };

        self.fetch_groups(groups, &mut report).await?;

        if report.fetched > 0 {
            self.last_refresh = Some(Utc::now());
            self.refreshed_at = Some(Instant::now());
        }

        let _ = self.events_tx.send(WeatherEvent::CycleCompleted {
            fetched: report.fetched,
            failed: report.failures.len(),
        });

        info!(
            "Weather refresh complete: {}/{} locations fetched, {} entities updated",
            report.fetched, report.groups, report.updated_entities
        );

        Ok(report)
    }

    /// Record new coordinates for one entity and refresh only its location
    pub async fn refresh_entity(&mut self, entity: GeoEntity) -> Result<RefreshReport> {
        let id = entity.id;
        match self.entities.iter_mut().find(|e| e.id == id) {
            Some(existing) => *existing = entity.clone(),
            None => self.entities.push(entity.clone()),
        }

        let Some(key) = entity.location_key(self.precision) else {
            debug!("Entity {} has no usable coordinates, dropping its weather", id);
            self.cache.remove(&id);
            return Ok(RefreshReport {
                skipped: vec![id],
                ..Default::default()
            });
        };

        let (groups, _) = group_by_location(&self.entities, self.precision);
        let groups: Vec<LocationGroup> = groups.into_iter().filter(|g| g.key == key).collect();

        let mut report = RefreshReport {
            groups: groups.len(),
            ..Default::default()
        };
        self.fetch_groups(groups, &mut report).await?;

        Ok(report)
    }

    async fn fetch_groups(
        &mut self,
        groups: Vec<LocationGroup>,
        report: &mut RefreshReport,
    ) -> Result<()> {
        if is_shutdown(&self.shutdown_rx) {
            return Err(AppError::Cancelled);
        }

        let group_count = groups.len();
        let result = self.fetch_groups_inner(groups, group_count, report).await;
        self.state_tx.send_replace(RefreshState::Idle);
        result
    }

    async fn fetch_groups_inner(
        &mut self,
        groups: Vec<LocationGroup>,
        group_count: usize,
        report: &mut RefreshReport,
    ) -> Result<()> {
        let source = Arc::clone(&self.source);

        for (group_index, group) in groups.into_iter().enumerate() {
            // Pace lookups against the provider
            if group_index > 0 && !self.request_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.request_delay) => {}
                    _ = wait_for_shutdown(&mut self.shutdown_rx) => {
                        info!("Shutdown requested, abandoning weather refresh");
                        return Err(AppError::Cancelled);
                    }
                }
            }

            self.state_tx.send_replace(RefreshState::Fetching {
                group_index,
                group_count,
            });

            debug!(
                "Fetching weather for {} ({}/{}, {} entities)",
                group.label,
                group_index + 1,
                group_count,
                group.entity_ids.len()
            );

            let outcome = tokio::select! {
                result = source.current_weather(group.key.latitude(), group.key.longitude()) => result,
                _ = wait_for_shutdown(&mut self.shutdown_rx) => {
                    info!("Shutdown requested, abandoning weather lookup for {}", group.label);
                    return Err(AppError::Cancelled);
                }
            };

            match outcome {
                Ok(snapshot) => {
                    report.fetched += 1;
                    report.updated_entities += group.entity_ids.len();
                    self.apply(group, snapshot);
                }
                Err(e) => {
                    warn!(
                        "Weather lookup failed for {} ({} entities keep previous data): {}",
                        group.label,
                        group.entity_ids.len(),
                        e
                    );
                    let _ = self.events_tx.send(WeatherEvent::GroupFailed {
                        location: group.label.clone(),
                        entity_ids: group.entity_ids.clone(),
                        error: e.to_string(),
                    });
                    report.failures.push(GroupFailure {
                        location: group.label,
                        entity_ids: group.entity_ids,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    fn apply(&mut self, group: LocationGroup, snapshot: WeatherSnapshot) {
        for id in &group.entity_ids {
            self.cache.insert(
                *id,
                CachedWeather {
                    snapshot: snapshot.clone(),
                    location_label: group.label.clone(),
                    location_key: group.key,
                },
            );
        }

        let _ = self.events_tx.send(WeatherEvent::GroupUpdated {
            location: group.label,
            entity_ids: group.entity_ids,
            snapshot,
        });
    }
}
