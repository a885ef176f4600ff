//! Entity sum type: the shared record for humans, agents, objects, and
//! NPCs, each exclusively owned and mutated by its Room Runtime.

use serde::{Deserialize, Serialize};

use crate::grid::{TileCoord, WorldPos};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Human,
    Agent,
    Object,
    Npc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Online,
    Focus,
    Dnd,
    Afk,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    pub name: String,
    pub room_id: String,
    pub pos: WorldPos,
    pub tile: TileCoord,
    pub facing: Facing,
    pub speed: f64,
    pub status: EntityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_zone: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl Entity {
    pub fn new(
        id: String,
        kind: EntityKind,
        name: String,
        room_id: String,
        pos: WorldPos,
        tile: TileCoord,
    ) -> Self {
        Self {
            id,
            kind,
            name,
            room_id,
            pos,
            tile,
            facing: Facing::Down,
            speed: 64.0,
            status: EntityStatus::Online,
            current_zone: None,
            meta: serde_json::Map::new(),
        }
    }

    /// Direction of travel from `from` to an adjacent `to` tile.
    pub fn facing_for_step(from: TileCoord, to: TileCoord) -> Facing {
        let dx = to.tx - from.tx;
        let dy = to.ty - from.ty;
        if dy < 0 {
            Facing::Up
        } else if dy > 0 {
            Facing::Down
        } else if dx < 0 {
            Facing::Left
        } else {
            Facing::Right
        }
    }

    pub fn distance_to(&self, other: &Entity) -> f64 {
        let dx = self.pos.x - other.pos.x;
        let dy = self.pos.y - other.pos.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Which fields an `observe` call returns (`ObserveRequest.detail`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObserveDetail {
    Lite,
    Full,
}

impl Default for ObserveDetail {
    fn default() -> Self {
        ObserveDetail::Full
    }
}

/// Trimmed projection of [`Entity`] for `detail=lite` observes: enough to
/// render positions and identity, without per-entity `meta`/`speed`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiteEntity {
    pub id: String,
    pub kind: EntityKind,
    pub name: String,
    pub pos: WorldPos,
    pub tile: TileCoord,
    pub facing: Facing,
}

impl From<&Entity> for LiteEntity {
    fn from(e: &Entity) -> Self {
        LiteEntity {
            id: e.id.clone(),
            kind: e.kind,
            name: e.name.clone(),
            pos: e.pos,
            tile: e.tile,
            facing: e.facing,
        }
    }
}

/// Observed entities at the detail level the caller asked for.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ObservedEntities {
    Lite(Vec<LiteEntity>),
    Full(Vec<Entity>),
}
