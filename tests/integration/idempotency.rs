use rocket::http::{ContentType, Status};

use crate::common::{auth_header, register_agent, test_client};

#[test]
fn interact_with_unknown_target_replays_on_same_tx() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    let make_request = || {
        client
            .post("/aic/v0.1/interact")
            .header(ContentType::JSON)
            .header(auth_header(&token))
            .body(format!(
                r#"{{"agentId":"{agent_id}","roomId":"{room_id}","txId":"tx_interact01","targetId":"obj_missing","action":"open"}}"#
            ))
            .dispatch()
    };

    let first: serde_json::Value = make_request().into_json().unwrap();
    assert_eq!(first["data"]["result"], "not_found");

    let second: serde_json::Value = make_request().into_json().unwrap();
    assert_eq!(second, first);
}

#[test]
fn interact_same_tx_different_body_conflicts() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    let res = client
        .post("/aic/v0.1/interact")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","txId":"tx_interact02","targetId":"obj_a","action":"open"}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .post("/aic/v0.1/interact")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","txId":"tx_interact02","targetId":"obj_b","action":"open"}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::Conflict);
}

#[test]
fn malformed_tx_id_is_bad_request() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    let res = client
        .post("/aic/v0.1/moveTo")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","txId":"short","dest":{{"tx":1,"ty":1}}}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}
