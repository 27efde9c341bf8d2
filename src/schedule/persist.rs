use crate::error::Result;
use crate::schedule::generator::ScheduledActivity;
use crate::schedule::templates::Priority;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{error, info};

/// An activity as stored by the remote API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub execution_date: NaiveDate,
    pub priority: Priority,
    pub crop_id: i64,
    #[serde(default)]
    pub completed: bool,
}

/// Destination for generated activities
pub trait ActivitySink {
    fn create_activity(
        &self,
        activity: &ScheduledActivity,
    ) -> impl Future<Output = Result<Activity>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistFailure {
    /// Position of the activity in the generated schedule
    pub index: usize,
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub created_count: usize,
    pub total_count: usize,
    pub failures: Vec<PersistFailure>,
    pub created: Vec<Activity>,
}

impl PersistReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.created_count == self.total_count
    }

    /// Nothing was stored even though there was something to store
    pub fn is_total_failure(&self) -> bool {
        self.total_count > 0 && self.created_count == 0
    }
}

/// Store each activity in order, continuing past individual failures
pub async fn persist_schedule<S: ActivitySink>(
    sink: &S,
    activities: &[ScheduledActivity],
) -> PersistReport {
    let mut report = PersistReport {
        total_count: activities.len(),
        ..Default::default()
    };

    for (index, activity) in activities.iter().enumerate() {
        match sink.create_activity(activity).await {
            Ok(created) => {
                report.created_count += 1;
                report.created.push(created);
            }
            Err(e) => {
                error!(
                    "Failed to create activity '{}' for crop {} ({}/{}): {}",
                    activity.name,
                    activity.crop_id,
                    index + 1,
                    activities.len(),
                    e
                );
                report.failures.push(PersistFailure {
                    index,
                    name: activity.name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        "Created {}/{} scheduled activities ({} failures)",
        report.created_count,
        report.total_count,
        report.failures.len()
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::schedule::{ScheduleGenerator, ScheduleRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fails every call whose position is listed in `fail_at`
    struct FlakySink {
        calls: AtomicUsize,
        fail_at: Vec<usize>,
        seen: Mutex<Vec<String>>,
    }

    impl ActivitySink for FlakySink {
        async fn create_activity(&self, activity: &ScheduledActivity) -> Result<Activity> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(activity.name.clone());
            if self.fail_at.contains(&call) {
                return Err(AppError::Api {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(Activity {
                id: call as i64 + 100,
                name: activity.name.clone(),
                description: activity.description.clone(),
                execution_date: activity.execution_date,
                priority: activity.priority,
                crop_id: activity.crop_id,
                completed: false,
            })
        }
    }

    fn schedule() -> Vec<ScheduledActivity> {
        let request = ScheduleRequest::from_raw(1, 2, "lettuce", "2025-03-01", None).unwrap();
        ScheduleGenerator::default().generate(&request).unwrap()
    }

    #[tokio::test]
    async fn test_continues_after_failure() {
        let activities = schedule();
        let sink = FlakySink {
            calls: AtomicUsize::new(0),
            fail_at: vec![1],
            seen: Mutex::new(Vec::new()),
        };

        let report = persist_schedule(&sink, &activities).await;

        assert_eq!(report.total_count, activities.len());
        assert_eq!(report.created_count, activities.len() - 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[0].name, activities[1].name);
        assert_eq!(sink.seen.lock().unwrap().len(), activities.len());
        assert!(!report.is_complete());
        assert!(!report.is_total_failure());
    }

    #[tokio::test]
    async fn test_all_created() {
        let activities = schedule();
        let sink = FlakySink {
            calls: AtomicUsize::new(0),
            fail_at: vec![],
            seen: Mutex::new(Vec::new()),
        };

        let report = persist_schedule(&sink, &activities).await;
        assert!(report.is_complete());
        assert_eq!(report.created.len(), activities.len());
    }

    #[tokio::test]
    async fn test_empty_schedule() {
        let sink = FlakySink {
            calls: AtomicUsize::new(0),
            fail_at: vec![],
            seen: Mutex::new(Vec::new()),
        };
        let report = persist_schedule(&sink, &[]).await;
        assert_eq!(report.total_count, 0);
        assert!(report.is_complete());
        assert!(!report.is_total_failure());
    }
}
