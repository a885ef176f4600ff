use std::collections::HashMap;

use rocket::http::{ContentType, Status};
use rocket::local::blocking::Client;

use world_server::config::AppConfig;
use world_server::grid::WorldGrid;
use world_server::pack::{LoadedPack, LoadedZone, Manifest};

use crate::common::{auth_header, register_agent, test_client};

#[test]
fn move_to_current_tile_is_no_op() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    let res = client
        .post("/aic/v0.1/moveTo")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","txId":"tx_abcdef12","dest":{{"tx":0,"ty":0}}}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["data"]["result"], "no_op");
}

// Idempotent moveTo: the same txId + body replays the prior result; the
// same txId with a different body conflicts.
#[test]
fn move_to_is_idempotent_and_conflicts_on_body_change() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    let first = client
        .post("/aic/v0.1/moveTo")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","txId":"tx_abcdef12","dest":{{"tx":5,"ty":5}}}}"#
        ))
        .dispatch();
    assert_eq!(first.status(), Status::Ok);
    let first_body: serde_json::Value = first.into_json().unwrap();
    assert_eq!(first_body["data"]["result"], "accepted");

    let replay = client
        .post("/aic/v0.1/moveTo")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","txId":"tx_abcdef12","dest":{{"tx":5,"ty":5}}}}"#
        ))
        .dispatch();
    assert_eq!(replay.status(), Status::Ok);
    let replay_body: serde_json::Value = replay.into_json().unwrap();
    assert_eq!(replay_body, first_body);

    let conflict = client
        .post("/aic/v0.1/moveTo")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","txId":"tx_abcdef12","dest":{{"tx":6,"ty":5}}}}"#
        ))
        .dispatch();
    assert_eq!(conflict.status(), Status::Conflict);
    let conflict_body: serde_json::Value = conflict.into_json().unwrap();
    assert_eq!(conflict_body["error"]["code"], "conflict");
    assert_eq!(conflict_body["error"]["retryable"], false);
}

#[test]
fn move_to_out_of_bounds_is_rejected_ok() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    let res = client
        .post("/aic/v0.1/moveTo")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","txId":"tx_abcdef99","dest":{{"tx":999,"ty":999}}}}"#
        ))
        .dispatch();
    // Structural success: the request succeeded, the action didn't.
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["data"]["result"], "rejected");
}

/// A 5x5 grid where tile (4,4) has collision=1 — an unreachable, blocked
/// destination, used to exercise the collision-rejection path.
fn blocked_client() -> Client {
    let width = 5;
    let height = 5;
    let mut collision = vec![0; width * height];
    collision[(4 * width + 4) as usize] = 1;
    let ground = vec![0; width * height];

    let grid = WorldGrid::load_from_tiled_data(width as i32, height as i32, 32.0, &ground, &collision, |_| None)
        .expect("valid grid");

    let mut zones = HashMap::new();
    zones.insert(
        "plaza".to_string(),
        LoadedZone {
            grid,
            bounds: Vec::new(),
            spawn_point: None,
        },
    );
    let pack = LoadedPack {
        manifest: Manifest {
            name: "blocked".to_string(),
            version: "1".to_string(),
            zones: vec!["plaza".to_string()],
            entry_zone: "plaza".to_string(),
        },
        zones,
    };

    let rocket = world_server::build_rocket(pack, AppConfig::default());
    Client::tracked(rocket).expect("valid rocket instance")
}

#[test]
fn move_to_blocked_tile_is_rejected_with_no_state_change() {
    let client = blocked_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    let res = client
        .post("/aic/v0.1/moveTo")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","txId":"tx_abcdef12","dest":{{"tx":4,"ty":4}}}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["data"]["result"], "rejected");

    let observe = client
        .post("/aic/v0.1/observe")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","radius":2000,"includeSelf":true}}"#
        ))
        .dispatch();
    let observe_body: serde_json::Value = observe.into_json().unwrap();
    let me = observe_body["data"]["entities"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["id"] == agent_id)
        .unwrap();
    assert_eq!(me["tile"]["tx"], 0);
    assert_eq!(me["tile"]["ty"], 0);
}

#[test]
fn observe_lite_detail_omits_meta_and_status() {
    let client = test_client();
    let (agent_id, room_id, token) = register_agent(&client, "A");

    let observe = client
        .post("/aic/v0.1/observe")
        .header(ContentType::JSON)
        .header(auth_header(&token))
        .body(format!(
            r#"{{"agentId":"{agent_id}","roomId":"{room_id}","radius":2000,"detail":"lite","includeSelf":true}}"#
        ))
        .dispatch();
    assert_eq!(observe.status(), Status::Ok);
    let body: serde_json::Value = observe.into_json().unwrap();
    let me = body["data"]["entities"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["id"] == agent_id)
        .unwrap();
    assert!(me.get("pos").is_some() && me.get("tile").is_some());
    assert!(me.get("status").is_none());
    assert!(me.get("meta").is_none());
}
