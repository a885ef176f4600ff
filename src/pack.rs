//! Startup map-pack loader: a `manifest.json` plus per-zone Tiled-schema
//! JSON files (layers `ground`, `collision`, `objects`), loaded once at
//! process start into immutable `WorldGrid`s and `ZoneBounds` sets.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::grid::{InvalidMap, WorldGrid};
use crate::zone::ZoneBounds;

#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub zones: Vec<String>,
    #[serde(rename = "entryZone")]
    pub entry_zone: String,
}

#[derive(Debug, Deserialize)]
struct TiledLayer {
    name: String,
    #[serde(default)]
    data: Vec<i32>,
    #[serde(default)]
    objects: Vec<TiledObject>,
}

#[derive(Debug, Deserialize, Clone)]
struct TiledObject {
    #[serde(default)]
    name: String,
    x: f64,
    y: f64,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
}

#[derive(Debug, Deserialize)]
struct TiledMap {
    width: i32,
    height: i32,
    #[serde(default = "default_tile_size")]
    tilewidth: f64,
    layers: Vec<TiledLayer>,
}

fn default_tile_size() -> f64 {
    32.0
}

#[derive(Debug, Error)]
pub enum PackLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("zone map {zone} is missing required layer {layer}")]
    MissingLayer { zone: String, layer: &'static str },
    #[error("zone map {zone} has more than one {layer} layer")]
    DuplicateLayer { zone: String, layer: &'static str },
    #[error("zone {zone} grid invalid: {source}")]
    Grid {
        zone: String,
        #[source]
        source: InvalidMap,
    },
}

/// One fully-loaded zone: its tile grid and the rectangular zone bounds
/// declared by its `objects` layer (used by the Zone Tracker).
pub struct LoadedZone {
    pub grid: WorldGrid,
    pub bounds: Vec<ZoneBounds>,
    pub spawn_point: Option<crate::grid::TileCoord>,
}

pub struct LoadedPack {
    pub manifest: Manifest,
    pub zones: HashMap<String, LoadedZone>,
}

pub fn load_pack(dir: &Path) -> Result<LoadedPack, PackLoadError> {
    let manifest_path = dir.join("manifest.json");
    let manifest: Manifest = read_json(&manifest_path)?;

    let mut zones = HashMap::new();
    for zone_name in &manifest.zones {
        let zone_path = dir.join(format!("{zone_name}.json"));
        let tiled: TiledMap = read_json(&zone_path)?;
        let zone = build_zone(zone_name, tiled)?;
        zones.insert(zone_name.clone(), zone);
    }

    Ok(LoadedPack { manifest, zones })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, PackLoadError> {
    let text = std::fs::read_to_string(path).map_err(|e| PackLoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| PackLoadError::Parse {
        path: path.display().to_string(),
        source: e,
    })
}

fn build_zone(zone_name: &str, tiled: TiledMap) -> Result<LoadedZone, PackLoadError> {
    let mut ground: Option<&Vec<i32>> = None;
    let mut collision: Option<&Vec<i32>> = None;
    let mut objects: Vec<TiledObject> = Vec::new();

    for layer in &tiled.layers {
        match layer.name.as_str() {
            "ground" => {
                if ground.is_some() {
                    return Err(PackLoadError::DuplicateLayer {
                        zone: zone_name.to_string(),
                        layer: "ground",
                    });
                }
                ground = Some(&layer.data);
            }
            "collision" => {
                if collision.is_some() {
                    return Err(PackLoadError::DuplicateLayer {
                        zone: zone_name.to_string(),
                        layer: "collision",
                    });
                }
                collision = Some(&layer.data);
            }
            "objects" => objects.extend(layer.objects.iter().cloned()),
            _ => {}
        }
    }

    let ground = ground.ok_or_else(|| PackLoadError::MissingLayer {
        zone: zone_name.to_string(),
        layer: "ground",
    })?;
    let collision = collision.ok_or_else(|| PackLoadError::MissingLayer {
        zone: zone_name.to_string(),
        layer: "collision",
    })?;

    let grid = WorldGrid::load_from_tiled_data(
        tiled.width,
        tiled.height,
        tiled.tilewidth,
        ground,
        collision,
        |_ground_gid| None,
    )
    .map_err(|e| PackLoadError::Grid {
        zone: zone_name.to_string(),
        source: e,
    })?;

    let mut bounds = Vec::new();
    let mut spawn_point = None;
    for obj in &objects {
        if obj.name == "spawn" {
            spawn_point = Some(grid.world_to_tile(crate::grid::WorldPos { x: obj.x, y: obj.y }));
            continue;
        }
        if obj.width > 0.0 && obj.height > 0.0 {
            bounds.push(ZoneBounds {
                zone_id: obj.name.clone(),
                min_x: obj.x,
                min_y: obj.y,
                max_x: obj.x + obj.width,
                max_y: obj.y + obj.height,
            });
        }
    }

    Ok(LoadedZone {
        grid,
        bounds,
        spawn_point,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_a_minimal_pack() {
        let dir = tempdir();
        std::fs::write(
            dir.join("manifest.json"),
            r#"{"name":"test","version":"1","zones":["plaza"],"entryZone":"plaza"}"#,
        )
        .unwrap();
        let mut f = std::fs::File::create(dir.join("plaza.json")).unwrap();
        write!(
            f,
            r#"{{"width":2,"height":2,"tilewidth":32,"layers":[
                {{"name":"ground","data":[0,0,0,0]}},
                {{"name":"collision","data":[0,0,0,1]}},
                {{"name":"objects","objects":[{{"name":"plaza","x":0,"y":0,"width":64,"height":64}}]}}
            ]}}"#
        )
        .unwrap();

        let pack = load_pack(&dir).unwrap();
        assert_eq!(pack.manifest.zones, vec!["plaza".to_string()]);
        let zone = pack.zones.get("plaza").unwrap();
        assert!(zone.grid.is_blocked(1, 1));
        assert_eq!(zone.bounds.len(), 1);
    }

    fn tempdir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("world_pack_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
