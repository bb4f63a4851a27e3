//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use booking_store::InMemoryBookingStore;
use chrono::{Duration, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use reservation::InMemoryFastStore;
use tower::ServiceExt;
use uuid::Uuid;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> Router {
    let (state, _engine) = api::create_state(InMemoryBookingStore::new(), InMemoryFastStore::new());
    api::create_app(state, get_metrics_handle())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn schedule_body(quota: i32, days_ahead: i64) -> String {
    let date = Utc::now().date_naive() + Duration::days(days_ahead);
    serde_json::to_string(&serde_json::json!({
        "doctor_id": Uuid::new_v4(),
        "schedule_date": date,
        "start_time": "09:00:00",
        "end_time": "12:00:00",
        "total_quota": quota,
    }))
    .unwrap()
}

async fn create_schedule(app: &Router, quota: i32, days_ahead: i64) -> i64 {
    let (status, json) = send(
        app,
        Request::builder()
            .method("POST")
            .uri("/schedules")
            .header("content-type", "application/json")
            .header("x-user-id", Uuid::new_v4().to_string())
            .body(Body::from(schedule_body(quota, days_ahead)))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_i64().unwrap()
}

fn booking_request(schedule_id: i64, patient: Uuid) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/bookings")
        .header("content-type", "application/json")
        .header("x-patient-id", patient.to_string())
        .body(Body::from(
            serde_json::json!({ "schedule_id": schedule_id }).to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, json) = send(
        &app,
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_booking_happy_path() {
    let app = setup();
    let schedule_id = create_schedule(&app, 3, 1).await;

    let (status, json) = send(&app, booking_request(schedule_id, Uuid::new_v4())).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["queue_number"], 1);
    assert_eq!(json["status"], "pending");
    assert!(json["booking_code"].as_str().unwrap().starts_with("BK-"));
    assert_eq!(json["schedule"]["id"].as_i64().unwrap(), schedule_id);
}

#[tokio::test]
async fn test_booking_requires_patient_identity() {
    let app = setup();
    let schedule_id = create_schedule(&app, 3, 1).await;

    let (status, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/bookings")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({ "schedule_id": schedule_id }).to_string(),
            ))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_double_booking_conflicts() {
    let app = setup();
    let schedule_id = create_schedule(&app, 3, 1).await;
    let patient = Uuid::new_v4();

    let (first, _) = send(&app, booking_request(schedule_id, patient)).await;
    assert_eq!(first, StatusCode::CREATED);

    let (second, json) = send(&app, booking_request(schedule_id, patient)).await;
    assert_eq!(second, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("already booked"));
}

#[tokio::test]
async fn test_sold_out_schedule_conflicts() {
    let app = setup();
    let schedule_id = create_schedule(&app, 1, 1).await;

    let (first, _) = send(&app, booking_request(schedule_id, Uuid::new_v4())).await;
    assert_eq!(first, StatusCode::CREATED);

    let (second, json) = send(&app, booking_request(schedule_id, Uuid::new_v4())).await;
    assert_eq!(second, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("quota"));
}

#[tokio::test]
async fn test_booking_past_schedule_is_rejected() {
    let app = setup();
    let schedule_id = create_schedule(&app, 3, -1).await;

    let (status, _) = send(&app, booking_request(schedule_id, Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_booking_unknown_schedule_is_not_found() {
    let app = setup();
    let (status, _) = send(&app, booking_request(404, Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_flow() {
    let app = setup();
    let schedule_id = create_schedule(&app, 2, 1).await;
    let patient = Uuid::new_v4();

    let (_, booking) = send(&app, booking_request(schedule_id, patient)).await;
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let cancel = |requester: Uuid| {
        Request::builder()
            .method("PUT")
            .uri(format!("/bookings/{booking_id}/cancel"))
            .header("x-patient-id", requester.to_string())
            .body(Body::empty())
            .unwrap()
    };

    // Another patient may not cancel it.
    let (forbidden, _) = send(&app, cancel(Uuid::new_v4())).await;
    assert_eq!(forbidden, StatusCode::FORBIDDEN);

    let (status, json) = send(&app, cancel(patient)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "cancelled");

    // Cancelling again conflicts instead of double-restoring quota.
    let (again, _) = send(&app, cancel(patient)).await;
    assert_eq!(again, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_unknown_booking_is_not_found() {
    let app = setup();
    let (status, _) = send(
        &app,
        Request::builder()
            .method("PUT")
            .uri(format!("/bookings/{}/cancel", Uuid::new_v4()))
            .header("x-patient-id", Uuid::new_v4().to_string())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_my_bookings_listing() {
    let app = setup();
    let s1 = create_schedule(&app, 2, 1).await;
    let s2 = create_schedule(&app, 2, 2).await;
    let patient = Uuid::new_v4();

    send(&app, booking_request(s1, patient)).await;
    send(&app, booking_request(s2, patient)).await;

    let (status, json) = send(
        &app,
        Request::builder()
            .uri("/bookings")
            .header("x-patient-id", patient.to_string())
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);
    assert_eq!(json["bookings"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_schedule_lifecycle() {
    let app = setup();
    let schedule_id = create_schedule(&app, 5, 1).await;

    // Live remaining quota drops as bookings land.
    send(&app, booking_request(schedule_id, Uuid::new_v4())).await;
    let (status, json) = send(
        &app,
        Request::builder()
            .uri(format!("/schedules/{schedule_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["remaining_quota"], 4);

    // Capacity change is reflected in the live value.
    let (status, json) = send(
        &app,
        Request::builder()
            .method("PUT")
            .uri(format!("/schedules/{schedule_id}"))
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({ "total_quota": 3 }).to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_quota"], 3);
    assert_eq!(json["remaining_quota"], 2);

    let (status, json) = send(
        &app,
        Request::builder()
            .uri("/schedules")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);

    // Deleting fails while bookings reference the schedule.
    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/schedules/{schedule_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // An untouched schedule deletes cleanly.
    let empty_id = create_schedule(&app, 2, 1).await;
    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/schedules/{empty_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        Request::builder()
            .uri(format!("/schedules/{empty_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_schedule_is_rejected() {
    let app = setup();
    let date = Utc::now().date_naive() + Duration::days(1);
    let body = serde_json::json!({
        "doctor_id": Uuid::new_v4(),
        "schedule_date": date,
        "start_time": "12:00:00",
        "end_time": "09:00:00",
        "total_quota": 5,
    });

    let (status, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/schedules")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_schedule_list_filters_by_doctor() {
    let app = setup();
    let doctor = Uuid::new_v4();
    let date = Utc::now().date_naive() + Duration::days(1);

    let body = serde_json::json!({
        "doctor_id": doctor,
        "schedule_date": date,
        "start_time": "09:00:00",
        "end_time": "12:00:00",
        "total_quota": 4,
    });
    let (status, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/schedules")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    create_schedule(&app, 2, 1).await;

    let (status, json) = send(
        &app,
        Request::builder()
            .uri(format!("/schedules?doctor_id={doctor}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert_eq!(json["schedules"][0]["doctor_id"], doctor.to_string());
}
