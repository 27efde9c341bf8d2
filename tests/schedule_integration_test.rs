use agrotrack::client::ApiClient;
use agrotrack::config::{ApiConfig, RetryPolicy};
use agrotrack::error::AppError;
use agrotrack::schedule::{
    persist_schedule, ScheduleGenerator, ScheduleRequest, ScheduledActivity,
};
use chrono::NaiveDate;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_config(base_url: &str) -> ApiConfig {
    ApiConfig {
        base_url: base_url.to_string(),
        token: Some("test-token".to_string()),
        timeout_seconds: 5,
    }
}

fn created(id: i64, activity: &ScheduledActivity) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": activity.name,
        "description": activity.description,
        "executionDate": activity.execution_date.to_string(),
        "priority": activity.priority,
        "cropId": activity.crop_id,
        "completed": false
    })
}

/// Tomato sown on 2025-07-13 lands its harvest on 2025-11-10
#[test]
fn test_tomato_schedule_from_form_input() {
    let request =
        ScheduleRequest::from_raw(42, 7, "Tomate", "2025-07-13", Some("Río Grande")).unwrap();
    let activities = ScheduleGenerator::default().generate(&request).unwrap();

    let first = activities.first().unwrap();
    assert_eq!(first.name, "Preparación del suelo");
    assert_eq!(first.execution_date, NaiveDate::from_ymd_opt(2025, 7, 13).unwrap());
    assert!(first.description.ends_with(" - Tomate (Río Grande)"));

    let harvest = activities.last().unwrap();
    assert_eq!(harvest.name, "Cosecha");
    assert_eq!(harvest.execution_date, NaiveDate::from_ymd_opt(2025, 11, 10).unwrap());
    assert!(activities.iter().all(|a| a.crop_id == 42 && a.user_id == 7));
}

/// Malformed dates are reported to the caller before anything is generated
#[test]
fn test_malformed_sowing_date_is_rejected() {
    let result = ScheduleRequest::from_raw(1, 1, "tomato", "not-a-date", None);
    assert!(matches!(result, Err(AppError::InvalidDate(_))));
}

/// Unknown crops produce the default plan
#[test]
fn test_unknown_crop_matches_default_plan() {
    let generator = ScheduleGenerator::default();
    let sowing = "2025-07-13";
    let unknown = ScheduleRequest::from_raw(1, 1, "dragonfruit", sowing, None).unwrap();
    let tomato = ScheduleRequest::from_raw(1, 1, "tomato", sowing, None).unwrap();
    assert_eq!(
        generator.generate(&unknown).unwrap(),
        generator.generate(&tomato).unwrap()
    );
}

/// Activities serialize with the field names the API expects
#[test]
fn test_scheduled_activity_wire_format() {
    let request = ScheduleRequest::from_raw(3, 9, "onion", "2025-01-01", None).unwrap();
    let activities = ScheduleGenerator::default().generate(&request).unwrap();
    let json = serde_json::to_value(&activities[0]).unwrap();

    assert_eq!(json["executionDate"], "2025-01-01");
    assert_eq!(json["priority"], "high");
    assert_eq!(json["cropId"], 3);
    assert_eq!(json["userId"], 9);
}

/// Each activity is posted; one rejected activity doesn't stop the rest
#[tokio::test]
async fn test_persist_schedule_through_api_with_partial_failure() {
    let mock_server = MockServer::start().await;

    let request = ScheduleRequest::from_raw(5, 2, "carrot", "2025-04-01", None).unwrap();
    let activities = ScheduleGenerator::default().generate(&request).unwrap();
    let rejected = &activities[2];

    Mock::given(method("POST"))
        .and(path("/actividades"))
        .and(body_partial_json(serde_json::json!({ "name": rejected.name })))
        .respond_with(ResponseTemplate::new(422).set_body_string("fecha inválida"))
        .expect(1)
        .mount(&mock_server)
        .await;

    for (index, activity) in activities.iter().enumerate() {
        if index == 2 {
            continue;
        }
        Mock::given(method("POST"))
            .and(path("/actividades"))
            .and(body_partial_json(serde_json::json!({ "name": activity.name })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(created(index as i64 + 1, activity)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let client = ApiClient::new(&api_config(&mock_server.uri()), RetryPolicy::none()).unwrap();
    let report = persist_schedule(&client, &activities).await;

    assert_eq!(report.total_count, activities.len());
    assert_eq!(report.created_count, activities.len() - 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 2);
    assert!(report.failures[0].error.contains("422"));
    assert_eq!(report.created[0].id, 1);
}
