use rocket::http::{ContentType, Status};

use crate::common::{auth_header, register_agent, test_client};

fn register_in_room(client: &rocket::local::blocking::Client, name: &str, room_id: &str) -> (String, String) {
    let res = client
        .post("/aic/v0.1/register")
        .header(ContentType::JSON)
        .body(format!(r#"{{"name":"{name}","roomId":"{room_id}"}}"#))
        .dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    (
        body["data"]["agentId"].as_str().unwrap().to_string(),
        body["data"]["sessionToken"].as_str().unwrap().to_string(),
    )
}

#[test]
fn global_chat_round_trips_through_observe() {
    let client = test_client();
    let (a_id, a_token) = register_in_room(&client, "A", "room-chat");
    let (b_id, _) = register_in_room(&client, "B", "room-chat");

    let res = client
        .post("/aic/v0.1/chatSend")
        .header(ContentType::JSON)
        .header(auth_header(&a_token))
        .body(format!(
            r#"{{"agentId":"{a_id}","roomId":"room-chat","txId":"tx_chat00001","channel":"global","message":"hello :wave:"}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["data"]["result"], "sent");

    let observed = client
        .post("/aic/v0.1/chatObserve")
        .header(ContentType::JSON)
        .header(auth_header(&a_token))
        .body(format!(
            r#"{{"agentId":"{a_id}","roomId":"room-chat","windowSec":60}}"#
        ))
        .dispatch();
    let observed_body: serde_json::Value = observed.into_json().unwrap();
    let messages = observed_body["data"]["messages"].as_array().unwrap();
    assert!(messages.iter().any(|m| m["message"] == "hello :wave:" && m["fromEntityId"] == a_id));

    let _ = b_id;
}

#[test]
fn team_chat_without_membership_is_rejected() {
    let client = test_client();
    let (a_id, a_token) = register_in_room(&client, "A", "room-chat-team");

    let res = client
        .post("/aic/v0.1/chatSend")
        .header(ContentType::JSON)
        .header(auth_header(&a_token))
        .body(format!(
            r#"{{"agentId":"{a_id}","roomId":"room-chat-team","txId":"tx_chat00002","channel":"team","message":"sync up","teamId":"team-x"}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["data"]["result"], "rejected");
}

#[test]
fn dm_requires_target_entity_id() {
    let client = test_client();
    let (a_id, a_token) = register_in_room(&client, "A", "room-chat-dm");

    let res = client
        .post("/aic/v0.1/chatSend")
        .header(ContentType::JSON)
        .header(auth_header(&a_token))
        .body(format!(
            r#"{{"agentId":"{a_id}","roomId":"room-chat-dm","txId":"tx_chat00003","channel":"dm","message":"psst"}}"#
        ))
        .dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["data"]["result"], "rejected");
}

#[test]
fn oversized_message_is_bad_request() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");
    let too_long = "x".repeat(501);

    let res = client
        .post("/aic/v0.1/chatSend")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","txId":"tx_chat00004","channel":"global","message":"{too_long}"}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}
