//! Zone Tracker: maps entity positions to rectangular zones by
//! configured insertion order, emitting `zone.enter`/`zone.exit`
//! transitions and maintaining never-negative population counters.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::event_log::EventLog;
use crate::grid::WorldPos;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneBounds {
    pub zone_id: String,
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl ZoneBounds {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }
}

pub struct ZoneUpdate {
    pub previous: Option<String>,
    pub current: Option<String>,
    pub changed: bool,
}

pub struct ZoneTracker {
    zones: Vec<ZoneBounds>,
    entity_zone: HashMap<String, String>,
    population: HashMap<String, u64>,
}

impl ZoneTracker {
    pub fn new(zones: Vec<ZoneBounds>) -> Self {
        Self {
            zones,
            entity_zone: HashMap::new(),
            population: HashMap::new(),
        }
    }

    /// First zone (in configured insertion order) whose rectangle
    /// contains the point.
    pub fn zone_at(&self, x: f64, y: f64) -> Option<&str> {
        self.zones
            .iter()
            .find(|z| z.contains(x, y))
            .map(|z| z.zone_id.as_str())
    }

    /// Updates an entity's tracked zone for its new position. When the
    /// zone changed, emits `zone.exit` then `zone.enter` (in that order)
    /// to the given event log and adjusts population counters.
    pub fn update(&mut self, entity_id: &str, pos: WorldPos, log: &mut EventLog) -> ZoneUpdate {
        let previous = self.entity_zone.get(entity_id).cloned();
        let current = self.zone_at(pos.x, pos.y).map(|s| s.to_string());

        if previous == current {
            return ZoneUpdate {
                previous,
                current,
                changed: false,
            };
        }

        if let Some(prev_zone) = &previous {
            let count = self.population.entry(prev_zone.clone()).or_insert(0);
            *count = count.saturating_sub(1);
            log.append(
                "zone.exit",
                serde_json::json!({
                    "entityId": entity_id,
                    "zoneId": prev_zone,
                    "nextZoneId": current,
                }),
            );
        }

        if let Some(cur_zone) = &current {
            *self.population.entry(cur_zone.clone()).or_insert(0) += 1;
            log.append(
                "zone.enter",
                serde_json::json!({
                    "entityId": entity_id,
                    "zoneId": cur_zone,
                    "previousZoneId": previous,
                }),
            );
        }

        match &current {
            Some(z) => {
                self.entity_zone.insert(entity_id.to_string(), z.clone());
            }
            None => {
                self.entity_zone.remove(entity_id);
            }
        }

        ZoneUpdate {
            previous,
            current,
            changed: true,
        }
    }

    /// Removes an entity from zone tracking entirely (on `leave`),
    /// decrementing its zone's population.
    pub fn remove_entity(&mut self, entity_id: &str) {
        if let Some(zone) = self.entity_zone.remove(entity_id) {
            let count = self.population.entry(zone).or_insert(0);
            *count = count.saturating_sub(1);
        }
    }

    pub fn population_of(&self, zone_id: &str) -> u64 {
        *self.population.get(zone_id).unwrap_or(&0)
    }

    pub fn total_population(&self) -> u64 {
        self.entity_zone.len() as u64
    }
}
