use crate::config::ScheduleConfig;
use crate::error::{AppError, Result};
use crate::schedule::templates::{
    template_for_key, ActivityTemplateEntry, Priority, DEFAULT_CROP_TYPE, HARVEST_ACTIVITY,
};
use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Inputs for deriving a crop's activity plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRequest {
    pub crop_id: i64,
    pub user_id: i64,
    pub crop_type: String,
    pub sowing_date: NaiveDate,
    pub variety: Option<String>,
}

impl ScheduleRequest {
    /// Build a request from a raw sowing date as sent by a form
    ///
    /// Accepts `YYYY-MM-DD`, or a `YYYY-MM-DDTHH:MM:SS` timestamp whose date
    /// part is used as-is.
    pub fn from_raw(
        crop_id: i64,
        user_id: i64,
        crop_type: &str,
        sowing_date: &str,
        variety: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            crop_id,
            user_id,
            crop_type: crop_type.to_string(),
            sowing_date: parse_sowing_date(sowing_date)?,
            variety: variety.map(str::to_string),
        })
    }
}

/// A template entry anchored to a concrete date for one crop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledActivity {
    pub name: String,
    pub description: String,
    pub execution_date: NaiveDate,
    pub priority: Priority,
    pub crop_id: i64,
    pub user_id: i64,
}

pub fn parse_sowing_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::InvalidDate("sowing date is required".to_string()));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }

    let timestamp = raw.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|dt| dt.date())
        .map_err(|_| {
            AppError::InvalidDate(format!(
                "'{}' is not a calendar date (expected YYYY-MM-DD)",
                raw
            ))
        })
}

pub struct ScheduleGenerator {
    fallback: &'static [ActivityTemplateEntry],
}

impl Default for ScheduleGenerator {
    fn default() -> Self {
        Self {
            fallback: template_for_key(DEFAULT_CROP_TYPE).unwrap_or(&[]),
        }
    }
}

impl ScheduleGenerator {
    /// Create a generator that falls back to `default_crop_type` for unknown crops
    pub fn new(default_crop_type: &str) -> Result<Self> {
        let key = normalize_crop_type(default_crop_type);
        let fallback = template_for_key(&key).ok_or_else(|| {
            AppError::InvalidData(format!(
                "No activity template for default crop type '{}'",
                default_crop_type
            ))
        })?;
        Ok(Self { fallback })
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        Self::new(&config.default_crop_type)
    }

    /// Template that applies to `crop_type`, falling back to the default
    pub fn template_for(&self, crop_type: &str) -> &'static [ActivityTemplateEntry] {
        let key = normalize_crop_type(crop_type);
        match template_for_key(&key) {
            Some(template) => template,
            None => {
                debug!(
                    "No activity template for crop type '{}', using default",
                    crop_type
                );
                self.fallback
            }
        }
    }

    /// Derive the dated activities for a crop, in template order
    pub fn generate(&self, request: &ScheduleRequest) -> Result<Vec<ScheduledActivity>> {
        let template = self.template_for(&request.crop_type);
        let suffix = description_suffix(&request.crop_type, request.variety.as_deref());

        template
            .iter()
            .map(|entry| {
                let execution_date = offset_date(request.sowing_date, entry.offset_days)?;
                let mut description = entry.description.to_string();
                if let Some(suffix) = &suffix {
                    description.push_str(suffix);
                }

                Ok(ScheduledActivity {
                    name: entry.name.to_string(),
                    description,
                    execution_date,
                    priority: entry.priority,
                    crop_id: request.crop_id,
                    user_id: request.user_id,
                })
            })
            .collect()
    }

    /// Date of the harvest step for a crop sown on `sowing_date`
    pub fn estimated_harvest_date(
        &self,
        crop_type: &str,
        sowing_date: NaiveDate,
    ) -> Result<Option<NaiveDate>> {
        self.template_for(crop_type)
            .iter()
            .rev()
            .find(|entry| entry.name == HARVEST_ACTIVITY)
            .map(|entry| offset_date(sowing_date, entry.offset_days))
            .transpose()
    }
}

fn normalize_crop_type(crop_type: &str) -> String {
    crop_type.trim().to_lowercase()
}

fn description_suffix(crop_type: &str, variety: Option<&str>) -> Option<String> {
    let variety = variety.map(str::trim).filter(|v| !v.is_empty())?;
    Some(format!(" - {} ({})", crop_type.trim(), variety))
}

fn offset_date(sowing_date: NaiveDate, offset_days: u32) -> Result<NaiveDate> {
    sowing_date
        .checked_add_days(Days::new(u64::from(offset_days)))
        .ok_or_else(|| {
            AppError::InvalidDate(format!(
                "{} + {} days is outside the supported calendar range",
                sowing_date, offset_days
            ))
        })
}
