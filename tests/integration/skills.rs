use rocket::http::{ContentType, Status};

use crate::common::{auth_header, register_agent, test_client};

#[test]
fn skill_list_includes_builtins() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    let res = client
        .post("/aic/v0.1/skill/list")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(r#"{{"agentId":"{agent_id}","roomId":"{room_id}"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    let skills = body["data"]["skills"].as_array().unwrap();
    assert!(skills.iter().any(|s| s["id"] == "basics.wave"));
}

#[test]
fn skill_install_is_idempotent() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    let install = || {
        client
            .post("/aic/v0.1/skill/install")
            .header(ContentType::JSON)
            .header(auth_header(&token))
            .body(format!(
                r#"{{"agentId":"{agent_id}","roomId":"{room_id}","skillId":"basics.wave"}}"#
            ))
            .dispatch()
    };

    let first: serde_json::Value = install().into_json().unwrap();
    assert_eq!(first["data"]["alreadyInstalled"], false);

    let second: serde_json::Value = install().into_json().unwrap();
    assert_eq!(second["data"]["alreadyInstalled"], true);
}

#[test]
fn skill_invoke_rejects_before_install() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    let res = client
        .post("/aic/v0.1/skill/invoke")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","txId":"tx_skill00001","skillId":"basics.wave","actionId":"wave"}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["data"]["result"], "rejected");
    assert_eq!(body["data"]["reason"], "action_not_installed");
}

#[test]
fn skill_invoke_after_install_is_pending() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    client
        .post("/aic/v0.1/skill/install")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","skillId":"basics.wave"}}"#
        ))
        .dispatch();

    let res = client
        .post("/aic/v0.1/skill/invoke")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","txId":"tx_skill00002","skillId":"basics.wave","actionId":"wave"}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["data"]["result"], "pending");
    assert!(body["data"]["completionTimeMs"].as_i64().is_some());
}

#[test]
fn skill_cancel_without_pending_cast_reports_false() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    let res = client
        .post("/aic/v0.1/skill/cancel")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(r#"{{"agentId":"{agent_id}","roomId":"{room_id}"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["data"]["cancelled"], false);
}

#[test]
fn skill_cancel_clears_a_pending_cast() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    client
        .post("/aic/v0.1/skill/install")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","skillId":"basics.haste"}}"#
        ))
        .dispatch();
    let invoke: serde_json::Value = client
        .post("/aic/v0.1/skill/invoke")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","txId":"tx_skill00003","skillId":"basics.haste","actionId":"haste"}}"#
        ))
        .dispatch()
        .into_json()
        .unwrap();
    assert_eq!(invoke["data"]["result"], "pending");

    let res = client
        .post("/aic/v0.1/skill/cancel")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(r#"{{"agentId":"{agent_id}","roomId":"{room_id}"}}"#))
        .dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["data"]["cancelled"], true);
}
