pub mod generator;
pub mod persist;
pub mod templates;

pub use generator::{parse_sowing_date, ScheduleGenerator, ScheduleRequest, ScheduledActivity};
pub use persist::{persist_schedule, Activity, ActivitySink, PersistFailure, PersistReport};
pub use templates::{template_for_key, ActivityTemplateEntry, Priority};
