//! World Grid: an immutable tile + collision grid for a room's lifetime,
//! with tile<->world coordinate conversion and neighbor-passability
//! rules used by pathfinding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCoord {
    pub tx: i32,
    pub ty: i32,
}

impl TileCoord {
    pub fn new(tx: i32, ty: i32) -> Self {
        Self { tx, ty }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone)]
pub struct Tile {
    pub tile_type: i32,
    pub blocking: bool,
    pub is_door: bool,
    pub zone_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum InvalidMap {
    #[error("ground layer length {got} does not match width*height {expected}")]
    GroundLengthMismatch { got: usize, expected: usize },
    #[error("collision layer length {got} does not match width*height {expected}")]
    CollisionLengthMismatch { got: usize, expected: usize },
    #[error("collision value at index {index} must be 0 or 1, got {value}")]
    InvalidCollisionValue { index: usize, value: i32 },
    #[error("width and height must be positive")]
    InvalidDimensions,
}

/// Immutable tile+collision grid for a room's map. Tile size (pixels per
/// tile) is a room-wide constant.
#[derive(Debug, Clone)]
pub struct WorldGrid {
    pub width: i32,
    pub height: i32,
    pub tile_size: f64,
    tiles: Vec<Tile>,
}

impl WorldGrid {
    /// Validates and builds a grid from Tiled-style flat layer arrays.
    pub fn load_from_tiled_data(
        width: i32,
        height: i32,
        tile_size: f64,
        ground: &[i32],
        collision: &[i32],
        zone_of_ground: impl Fn(i32) -> Option<String>,
    ) -> Result<Self, InvalidMap> {
        if width <= 0 || height <= 0 {
            return Err(InvalidMap::InvalidDimensions);
        }
        let expected = (width * height) as usize;
        if ground.len() != expected {
            return Err(InvalidMap::GroundLengthMismatch {
                got: ground.len(),
                expected,
            });
        }
        if collision.len() != expected {
            return Err(InvalidMap::CollisionLengthMismatch {
                got: collision.len(),
                expected,
            });
        }
        for (i, &c) in collision.iter().enumerate() {
            if c != 0 && c != 1 {
                return Err(InvalidMap::InvalidCollisionValue { index: i, value: c });
            }
        }

        let tiles = ground
            .iter()
            .zip(collision.iter())
            .map(|(&g, &c)| Tile {
                tile_type: g,
                blocking: c == 1,
                is_door: false,
                zone_id: zone_of_ground(g),
            })
            .collect();

        Ok(Self {
            width,
            height,
            tile_size,
            tiles,
        })
    }

    fn index(&self, tx: i32, ty: i32) -> Option<usize> {
        if tx < 0 || ty < 0 || tx >= self.width || ty >= self.height {
            return None;
        }
        Some((ty * self.width + tx) as usize)
    }

    pub fn tile_at(&self, tx: i32, ty: i32) -> Option<&Tile> {
        self.index(tx, ty).map(|i| &self.tiles[i])
    }

    /// Out-of-bounds or collision=1 both count as blocked.
    pub fn is_blocked(&self, tx: i32, ty: i32) -> bool {
        match self.index(tx, ty) {
            None => true,
            Some(i) => self.tiles[i].blocking,
        }
    }

    pub fn in_bounds(&self, tx: i32, ty: i32) -> bool {
        tx >= 0 && ty >= 0 && tx < self.width && ty < self.height
    }

    /// Permits only 4- or 8-neighbor moves. For diagonals, at least one
    /// orthogonal neighbor must be passable (prevents corner cutting).
    pub fn can_move_to(&self, from: TileCoord, to: TileCoord) -> bool {
        if self.is_blocked(to.tx, to.ty) {
            return false;
        }
        let dx = to.tx - from.tx;
        let dy = to.ty - from.ty;
        if dx.abs() > 1 || dy.abs() > 1 || (dx == 0 && dy == 0) {
            return false;
        }
        if dx != 0 && dy != 0 {
            let ortho1_blocked = self.is_blocked(from.tx + dx, from.ty);
            let ortho2_blocked = self.is_blocked(from.tx, from.ty + dy);
            if ortho1_blocked && ortho2_blocked {
                return false;
            }
        }
        true
    }

    pub fn world_to_tile(&self, pos: WorldPos) -> TileCoord {
        TileCoord::new(
            (pos.x / self.tile_size).floor() as i32,
            (pos.y / self.tile_size).floor() as i32,
        )
    }

    pub fn tile_center(&self, tile: TileCoord) -> WorldPos {
        WorldPos {
            x: tile.tx as f64 * self.tile_size + self.tile_size / 2.0,
            y: tile.ty as f64 * self.tile_size + self.tile_size / 2.0,
        }
    }

    /// First passable tile, scanning row-major from (0,0). Used as the
    /// spawn fallback when no `DEFAULT_SPAWN_POINT` is configured.
    pub fn first_passable_tile(&self) -> Option<TileCoord> {
        for ty in 0..self.height {
            for tx in 0..self.width {
                if !self.is_blocked(tx, ty) {
                    return Some(TileCoord::new(tx, ty));
                }
            }
        }
        None
    }
}
