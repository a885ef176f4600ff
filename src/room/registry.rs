//! Room Registry: matches clients to rooms, tracks per-room occupancy
//! against a capacity, and creates rooms on demand. Process-wide,
//! sharded (`dashmap`) so no single lock serializes every join.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::pack::LoadedPack;
use crate::safety::SafetyRegistry;
use crate::session::SessionStore;
use crate::skill::builtin_skills;

use super::{RoomHandle, RoomRuntime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOrCreateError {
    ChannelFull,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSummary {
    pub channel_id: String,
    pub occupancy: usize,
    pub max_occupancy: usize,
}

/// Maintains `{channelId -> RoomHandle}` plus the next auto-generated
/// channel name counter.
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<RoomHandle>>,
    next_auto: AtomicUsize,
    pack: Arc<LoadedPack>,
    config: Arc<AppConfig>,
    sessions: Arc<SessionStore>,
    safety: Arc<SafetyRegistry>,
    metrics: Arc<Metrics>,
}

impl RoomRegistry {
    pub fn new(
        pack: Arc<LoadedPack>,
        config: Arc<AppConfig>,
        sessions: Arc<SessionStore>,
        safety: Arc<SafetyRegistry>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            rooms: DashMap::new(),
            next_auto: AtomicUsize::new(1),
            pack,
            config,
            sessions,
            safety,
            metrics,
        }
    }

    pub fn list_channels(&self) -> Vec<ChannelSummary> {
        self.rooms
            .iter()
            .map(|entry| ChannelSummary {
                channel_id: entry.key().clone(),
                occupancy: entry.value().occupancy(),
                max_occupancy: entry.value().max_occupancy(),
            })
            .collect()
    }

    pub fn get(&self, channel_id: &str) -> Option<Arc<RoomHandle>> {
        self.rooms.get(channel_id).map(|r| r.clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// `joinOrCreate`: an explicit, existing, non-full channel attaches;
    /// an explicit full channel fails `ChannelFull`; an omitted/`"auto"`
    /// id picks the first non-full room or creates `channel-(N+1)`.
    pub fn join_or_create(&self, channel_id: Option<&str>) -> Result<Arc<RoomHandle>, JoinOrCreateError> {
        match channel_id {
            Some(id) if id != "auto" => {
                if let Some(existing) = self.rooms.get(id) {
                    if existing.occupancy() >= existing.max_occupancy() {
                        return Err(JoinOrCreateError::ChannelFull);
                    }
                    return Ok(existing.clone());
                }
                Ok(self.create_room(id.to_string()))
            }
            _ => {
                if let Some(room) = self
                    .rooms
                    .iter()
                    .find(|entry| entry.value().occupancy() < entry.value().max_occupancy())
                {
                    return Ok(room.value().clone());
                }
                let id = format!("channel-{}", self.next_auto.fetch_add(1, Ordering::SeqCst));
                Ok(self.create_room(id))
            }
        }
    }

    fn create_room(&self, channel_id: String) -> Arc<RoomHandle> {
        let zone = self
            .pack
            .zones
            .get(&self.pack.manifest.entry_zone)
            .expect("pack's entryZone must be among its loaded zones");

        let handle = Arc::new(RoomRuntime::spawn(
            channel_id.clone(),
            zone.grid.clone(),
            zone.bounds.clone(),
            builtin_skills(),
            zone.spawn_point,
            &self.config,
            self.sessions.clone(),
            self.safety.clone(),
            self.metrics.clone(),
        ));
        tracing::info!(channel_id = %channel_id, "room created");
        self.rooms.insert(channel_id, handle.clone());
        handle
    }
}
