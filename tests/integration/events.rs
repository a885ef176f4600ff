use rocket::http::{ContentType, Status};

use crate::common::{auth_header, register_agent, test_client};

// pollEvents with sinceCursor = last received returns no events until
// something new is appended.
#[test]
fn poll_events_with_current_cursor_returns_empty_without_waiting() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    let res = client
        .post("/aic/v0.1/pollEvents")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","limit":50,"waitMs":0}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    let events = body["data"]["events"].as_array().unwrap();
    // join already produced at least one presence.join envelope.
    assert!(!events.is_empty());
    let cursor = body["data"]["nextCursor"].as_str().unwrap().to_string();

    let res = client
        .post("/aic/v0.1/pollEvents")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","sinceCursor":"{cursor}","limit":50,"waitMs":0}}"#
        ))
        .dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["data"]["events"].as_array().unwrap().len(), 0);
    assert_eq!(body["data"]["nextCursor"], cursor);
    assert_eq!(body["data"]["cursorExpired"], false);
}

#[test]
fn poll_events_sees_a_second_agents_join() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    let res = client
        .post("/aic/v0.1/pollEvents")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","limit":50,"waitMs":0}}"#
        ))
        .dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    let cursor = body["data"]["nextCursor"].as_str().unwrap().to_string();

    // A second agent joins the same room, producing a fresh presence.join.
    client
        .post("/aic/v0.1/register")
        .header(ContentType::JSON)
        .body(format!(r#"{{"name":"B","roomId":"{room_id}"}}"#))
        .dispatch();

    let res = client
        .post("/aic/v0.1/pollEvents")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","sinceCursor":"{cursor}","limit":50,"waitMs":5000}}"#
        ))
        .dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    let events = body["data"]["events"].as_array().unwrap();
    assert!(events.iter().any(|e| e["type"] == "presence.join"));
}

#[test]
fn poll_events_wait_ms_over_limit_is_bad_request() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    let res = client
        .post("/aic/v0.1/pollEvents")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","limit":50,"waitMs":25001}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}
