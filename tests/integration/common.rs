use std::collections::HashMap;

use rocket::local::blocking::Client;

use world_server::config::AppConfig;
use world_server::grid::WorldGrid;
use world_server::pack::{LoadedPack, LoadedZone, Manifest};
use world_server::zone::ZoneBounds;

/// A 20x20 open-floor grid (tile size 32, so a 640x640 world) split into
/// two zones by a horizontal line at y=320: `lobby` to the north,
/// `hall` to the south. The default spawn (first passable tile, (0,0))
/// lands in `lobby`.
fn test_pack() -> LoadedPack {
    let size = 20 * 20;
    let grid = WorldGrid::load_from_tiled_data(20, 20, 32.0, &vec![0; size], &vec![0; size], |_| None)
        .expect("open grid is always valid");

    let bounds = vec![
        ZoneBounds {
            zone_id: "lobby".to_string(),
            min_x: 0.0,
            min_y: 0.0,
            max_x: 640.0,
            max_y: 320.0,
        },
        ZoneBounds {
            zone_id: "hall".to_string(),
            min_x: 0.0,
            min_y: 320.0,
            max_x: 640.0,
            max_y: 640.0,
        },
    ];

    let mut zones = HashMap::new();
    zones.insert(
        "plaza".to_string(),
        LoadedZone {
            grid,
            bounds,
            spawn_point: None,
        },
    );

    LoadedPack {
        manifest: Manifest {
            name: "test-pack".to_string(),
            version: "1".to_string(),
            zones: vec!["plaza".to_string()],
            entry_zone: "plaza".to_string(),
        },
        zones,
    }
}

pub fn test_client() -> Client {
    let rocket = world_server::build_rocket(test_pack(), AppConfig::default());
    Client::tracked(rocket).expect("valid rocket instance")
}

/// Registers a fresh agent into its own auto-assigned room and returns
/// `(agentId, roomId, sessionToken)`.
pub fn register_agent(client: &Client, name: &str) -> (String, String, String) {
    use rocket::http::ContentType;

    let res = client
        .post("/aic/v0.1/register")
        .header(ContentType::JSON)
        .body(format!(r#"{{"name":"{name}"}}"#))
        .dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    let data = &body["data"];
    (
        data["agentId"].as_str().unwrap().to_string(),
        data["roomId"].as_str().unwrap().to_string(),
        data["sessionToken"].as_str().unwrap().to_string(),
    )
}

pub fn auth_header(token: &str) -> rocket::http::Header<'static> {
    rocket::http::Header::new("Authorization", format!("Bearer {token}"))
}
