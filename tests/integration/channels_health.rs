use rocket::http::Status;

use crate::common::{register_agent, test_client};

#[test]
fn health_reports_room_count() {
    let client = test_client();
    register_agent(&client, "A");

    let res = client.get("/aic/v0.1/health").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["data"]["roomCount"], 1);
}

#[test]
fn metrics_counts_requests() {
    let client = test_client();
    register_agent(&client, "A");
    register_agent(&client, "B");

    let res = client.get("/aic/v0.1/metrics").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert!(body["data"]["requestsTotal"].as_u64().unwrap() >= 2);
    // Each register() both dispatches an intent (join) and appends a
    // presence.join event, so these must be nonzero too, not just wired
    // up and stuck at zero.
    assert!(body["data"]["intentsProcessed"].as_u64().unwrap() >= 2);
    assert!(body["data"]["eventsAppended"].as_u64().unwrap() >= 2);
    assert_eq!(body["data"]["activeSessions"].as_u64().unwrap(), 2);
}
