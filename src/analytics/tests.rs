use super::models::{Event, ParamValue};
use super::*;
use crate::events::{self, FirebaseEvent};
use httpmock::prelude::*;
use reqwest::{Client, StatusCode};
use reqwest_middleware::ClientBuilder;
use serde_json::json;

fn create_analytics(server: &MockServer) -> FirebaseAnalytics {
    let client = ClientBuilder::new(Client::new()).build();
    FirebaseAnalytics::new_with_client(
        client,
        server.url(""),
        "secret".to_string(),
        "G-TEST".to_string(),
        "instance-1".to_string(),
    )
}

#[tokio::test]
async fn test_send_events_success() {
    let server = MockServer::start();
    let (tx, mut rx) = events::channel();
    let analytics = create_analytics(&server).with_events(tx);

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/mp/collect")
            .query_param("api_secret", "secret")
            .query_param("measurement_id", "G-TEST")
            .header("content-type", "application/json")
            .json_body(json!({
                "app_instance_id": "instance-1",
                "events": [
                    { "name": "level_up", "params": { "level": 4, "character": "mage" } }
                ]
            }));
        then.status(200);
    });

    let event = Event::new("level_up")
        .with_param("level", 4)
        .with_param("character", "mage");
    analytics.send_events(&[event]).await.unwrap();
    assert_eq!(rx.try_recv().unwrap(), FirebaseEvent::AnalyticsSent);

    mock.assert();
}

#[tokio::test]
async fn test_no_content_is_reported_as_failure() {
    let server = MockServer::start();
    let (tx, mut rx) = events::channel();
    let analytics = create_analytics(&server).with_events(tx);

    let mock = server.mock(|when, then| {
        when.method(POST).path("/mp/collect");
        then.status(204);
    });

    let result = analytics.send_event(Event::new("tutorial_begin")).await;
    assert!(matches!(result, Err(AnalyticsError::Rejected)));
    assert_eq!(rx.try_recv().unwrap(), FirebaseEvent::AnalyticsFailed);

    mock.assert();
}

#[tokio::test]
async fn test_batch_over_limit_is_not_sent() {
    let server = MockServer::start();
    let (tx, mut rx) = events::channel();
    let analytics = create_analytics(&server).with_events(tx);

    let mock = server.mock(|when, then| {
        when.method(POST).path("/mp/collect");
        then.status(200);
    });

    let batch: Vec<Event> = (0..26).map(|i| Event::new(format!("event_{}", i))).collect();
    let result = analytics.send_events(&batch).await;
    assert!(matches!(result, Err(AnalyticsError::BatchTooLarge(26))));
    assert_eq!(rx.try_recv().unwrap(), FirebaseEvent::AnalyticsFailed);

    mock.assert_calls(0);
}

#[tokio::test]
async fn test_batch_at_limit_is_sent() {
    let server = MockServer::start();
    let analytics = create_analytics(&server);

    let mock = server.mock(|when, then| {
        when.method(POST).path("/mp/collect");
        then.status(200);
    });

    let batch: Vec<Event> = (0..MAX_EVENTS_PER_BATCH)
        .map(|i| Event::new(format!("event_{}", i)))
        .collect();
    analytics.send_events(&batch).await.unwrap();

    mock.assert();
}

#[tokio::test]
async fn test_screen_view_with_user_id() {
    let server = MockServer::start();
    let mut analytics = create_analytics(&server);
    analytics.set_user_id(Some("uid-1".to_string()));

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/mp/collect")
            .json_body(json!({
                "app_instance_id": "instance-1",
                "user_id": "uid-1",
                "events": [
                    {
                        "name": "screen_view",
                        "params": { "screen_name": "main_menu", "engagement_time_msec": 1 }
                    }
                ]
            }));
        then.status(200);
    });

    analytics.send_screen_view("main_menu").await.unwrap();

    mock.assert();
}

#[tokio::test]
async fn test_server_error_is_failure() {
    let server = MockServer::start();
    let (tx, mut rx) = events::channel();
    let analytics = create_analytics(&server).with_events(tx);

    let mock = server.mock(|when, then| {
        when.method(POST).path("/mp/collect");
        then.status(500).body("backend unavailable");
    });

    let result = analytics.send_event(Event::new("purchase")).await;
    assert!(matches!(
        result,
        Err(AnalyticsError::ApiError { status, .. }) if status == StatusCode::INTERNAL_SERVER_ERROR
    ));
    assert_eq!(rx.try_recv().unwrap(), FirebaseEvent::AnalyticsFailed);

    mock.assert();
}

#[test]
fn test_param_values_serialize_as_scalars() {
    let params = vec![
        ParamValue::from("x"),
        ParamValue::from(3),
        ParamValue::from(0.5),
        ParamValue::from(true),
    ];
    assert_eq!(serde_json::to_value(&params).unwrap(), json!(["x", 3, 0.5, true]));
}
