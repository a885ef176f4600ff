use rocket::http::{ContentType, Status};

use crate::common::{auth_header, register_agent, test_client};

// register returns an agt_* id, an auto-assigned room, and a session
// token.
#[test]
fn register_assigns_agent_and_auto_room() {
    let client = test_client();
    let res = client
        .post("/aic/v0.1/register")
        .header(ContentType::JSON)
        .body(r#"{"name":"A","roomId":"auto"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["data"]["agentId"].as_str().unwrap().starts_with("agt_"));
    assert_eq!(body["data"]["roomId"], "channel-1");
    assert!(!body["data"]["sessionToken"].as_str().unwrap().is_empty());
}

// roomId is camelCase on the wire; registering into an explicit named
// room must not silently fall back to auto-join.
#[test]
fn register_honors_explicit_room_id() {
    let client = test_client();
    let res = client
        .post("/aic/v0.1/register")
        .header(ContentType::JSON)
        .body(r#"{"name":"A","roomId":"lobby"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["data"]["roomId"], "lobby");
}

#[test]
fn register_rejects_empty_name() {
    let client = test_client();
    let res = client
        .post("/aic/v0.1/register")
        .header(ContentType::JSON)
        .body(r#"{"name":""}"#)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[test]
fn observe_without_bearer_is_unauthorized() {
    let client = test_client();
    let (agent_id, room_id, _token) = register_agent(&client, "A");
    let res = client
        .post("/aic/v0.1/observe")
        .header(ContentType::JSON)
        .body(format!(r#"{{"agentId":"{agent_id}","roomId":"{room_id}","radius":100}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn observe_with_wrong_token_is_unauthorized() {
    let client = test_client();
    let (agent_id, room_id, _token) = register_agent(&client, "A");
    let res = client
        .post("/aic/v0.1/observe")
        .header(ContentType::JSON)
        .header(auth_header("not-the-real-token"))
        .body(format!(r#"{{"agentId":"{agent_id}","roomId":"{room_id}","radius":100}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn heartbeat_updates_last_heartbeat() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");
    let res = client
        .post("/aic/v0.1/heartbeat")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(r#"{{"agentId":"{agent_id}","roomId":"{room_id}"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert!(body["data"]["lastHeartbeatMs"].as_i64().unwrap() > 0);
}

#[test]
fn unregister_requires_auth_then_emits_leave() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    let res = client
        .post("/aic/v0.1/unregister")
        .header(ContentType::JSON)
        .body(format!(r#"{{"agentId":"{agent_id}","roomId":"{room_id}"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);

    let res = client
        .post("/aic/v0.1/unregister")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(r#"{{"agentId":"{agent_id}","roomId":"{room_id}"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn list_channels_needs_no_auth() {
    let client = test_client();
    register_agent(&client, "A");
    let res = client.get("/aic/v0.1/channels").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    let channels = body["data"]["channels"].as_array().unwrap();
    assert!(channels.iter().any(|c| c["channelId"] == "channel-1"));
}
