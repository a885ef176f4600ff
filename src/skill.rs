//! Skill Engine: installable actions with cast time, cooldown, range
//! checks, and timed effects.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::event_log::{now_ms, EventLog};
use crate::grid::WorldPos;

/// Entities "moved" (for cast-cancellation purposes) once they cross this
/// many world units from their cast's `startPos`.
const MOVE_CANCEL_EPSILON: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectSpec {
    pub effect_type: String,
    pub duration_ms: i64,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub speed_multiplier: f64,
}

fn one() -> f64 {
    1.0
}
fn is_one(v: &f64) -> bool {
    *v == 1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    pub id: String,
    pub cooldown_ms: i64,
    pub cast_time_ms: i64,
    pub range_units: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect: Option<EffectSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDefinition {
    pub id: String,
    pub name: String,
    pub category: String,
    pub actions: Vec<ActionDefinition>,
}

impl SkillDefinition {
    pub fn action(&self, action_id: &str) -> Option<&ActionDefinition> {
        self.actions.iter().find(|a| a.id == action_id)
    }
}

/// Ships at startup so the engine is exercised without a map pack
/// defining any skills of its own.
pub fn builtin_skills() -> Vec<SkillDefinition> {
    vec![
        SkillDefinition {
            id: "basics.wave".to_string(),
            name: "Wave".to_string(),
            category: "social".to_string(),
            actions: vec![ActionDefinition {
                id: "wave".to_string(),
                cooldown_ms: 1_000,
                cast_time_ms: 0,
                range_units: 256.0,
                effect: None,
            }],
        },
        SkillDefinition {
            id: "basics.haste".to_string(),
            name: "Haste".to_string(),
            category: "buff".to_string(),
            actions: vec![ActionDefinition {
                id: "haste".to_string(),
                cooldown_ms: 15_000,
                cast_time_ms: 1_000,
                range_units: 128.0,
                effect: Some(EffectSpec {
                    effect_type: "haste".to_string(),
                    duration_ms: 5_000,
                    speed_multiplier: 1.5,
                }),
            }],
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCast {
    pub tx_id: String,
    pub skill_id: String,
    pub action_id: String,
    pub target_id: String,
    pub start_pos: WorldPos,
    pub completion_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveEffect {
    pub effect_id: String,
    pub effect_type: String,
    pub speed_multiplier: f64,
    pub expires_at: i64,
}

#[derive(Debug, Default)]
struct EntitySkillState {
    installed: HashSet<String>,
    cooldown_until: HashMap<String, i64>,
    pending_cast: Option<PendingCast>,
    active_effects: Vec<ActiveEffect>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeRejection {
    ActionNotInstalled,
    OnCooldown,
    OutOfRange,
    AlreadyCasting,
}

pub enum InvokeOutcome {
    Pending { completion_time: i64 },
    Rejected(InvokeRejection),
}

pub struct SkillEngine {
    definitions: HashMap<String, SkillDefinition>,
    entities: HashMap<String, EntitySkillState>,
}

impl SkillEngine {
    pub fn new(definitions: Vec<SkillDefinition>) -> Self {
        Self {
            definitions: definitions.into_iter().map(|d| (d.id.clone(), d)).collect(),
            entities: HashMap::new(),
        }
    }

    pub fn definition(&self, skill_id: &str) -> Option<&SkillDefinition> {
        self.definitions.get(skill_id)
    }

    pub fn list_definitions(&self) -> Vec<&SkillDefinition> {
        self.definitions.values().collect()
    }

    /// Idempotent: a second install on the same entity is a no-op that
    /// reports `already_installed = true`.
    pub fn install(&mut self, entity_id: &str, skill_id: &str) -> bool {
        let state = self.entities.entry(entity_id.to_string()).or_default();
        !state.installed.insert(skill_id.to_string())
    }

    pub fn is_installed(&self, entity_id: &str, skill_id: &str) -> bool {
        self.entities
            .get(entity_id)
            .map(|s| s.installed.contains(skill_id))
            .unwrap_or(false)
    }

    pub fn effective_speed(&self, entity_id: &str, base_speed: f64) -> f64 {
        match self.entities.get(entity_id) {
            None => base_speed,
            Some(state) => state
                .active_effects
                .iter()
                .fold(base_speed, |speed, e| speed * e.speed_multiplier),
        }
    }

    pub fn has_pending_cast(&self, entity_id: &str) -> bool {
        self.entities
            .get(entity_id)
            .map(|s| s.pending_cast.is_some())
            .unwrap_or(false)
    }

    pub fn invoke(
        &mut self,
        entity_id: &str,
        skill_id: &str,
        action_id: &str,
        target_id: &str,
        tx_id: &str,
        entity_pos: WorldPos,
        target_pos: WorldPos,
    ) -> InvokeOutcome {
        let Some(def) = self.definitions.get(skill_id) else {
            return InvokeOutcome::Rejected(InvokeRejection::ActionNotInstalled);
        };
        let Some(action) = def.action(action_id) else {
            return InvokeOutcome::Rejected(InvokeRejection::ActionNotInstalled);
        };

        let state = self.entities.entry(entity_id.to_string()).or_default();

        if !state.installed.contains(skill_id) {
            return InvokeOutcome::Rejected(InvokeRejection::ActionNotInstalled);
        }

        let now = now_ms();
        if let Some(&until) = state.cooldown_until.get(action_id) {
            if now < until {
                return InvokeOutcome::Rejected(InvokeRejection::OnCooldown);
            }
        }

        let dx = entity_pos.x - target_pos.x;
        let dy = entity_pos.y - target_pos.y;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance > action.range_units {
            return InvokeOutcome::Rejected(InvokeRejection::OutOfRange);
        }

        if state.pending_cast.is_some() {
            return InvokeOutcome::Rejected(InvokeRejection::AlreadyCasting);
        }

        let completion_time = now + action.cast_time_ms;
        state.pending_cast = Some(PendingCast {
            tx_id: tx_id.to_string(),
            skill_id: skill_id.to_string(),
            action_id: action_id.to_string(),
            target_id: target_id.to_string(),
            start_pos: entity_pos,
            completion_time,
        });

        InvokeOutcome::Pending { completion_time }
    }

    /// While casting, cancels with `reason="user"` (no cooldown applied).
    pub fn cancel(&mut self, entity_id: &str, log: &mut EventLog) -> bool {
        let Some(state) = self.entities.get_mut(entity_id) else {
            return false;
        };
        if state.pending_cast.take().is_some() {
            log.append(
                "skill.cast_cancelled",
                serde_json::json!({ "entityId": entity_id, "reason": "user" }),
            );
            true
        } else {
            false
        }
    }

    /// Advances pending casts past their completion time and expires
    /// active effects. `position_of` must return the current world
    /// position of the given entity id (used to detect cancel-on-move).
    pub fn tick(&mut self, log: &mut EventLog, position_of: impl Fn(&str) -> Option<WorldPos>) {
        let now = now_ms();

        // First pass only takes each caster's own due cast — applying the
        // effect to the target entity needs a second, independent mutable
        // borrow of `self.entities`, which can't happen while this map is
        // still under iteration.
        let mut due = Vec::new();
        for (entity_id, state) in self.entities.iter_mut() {
            if matches!(&state.pending_cast, Some(cast) if cast.completion_time <= now) {
                due.push((entity_id.clone(), state.pending_cast.take().unwrap()));
            }
        }

        for (entity_id, cast) in due {
            let current_pos = position_of(&entity_id);
            let moved = match current_pos {
                Some(pos) => {
                    let dx = pos.x - cast.start_pos.x;
                    let dy = pos.y - cast.start_pos.y;
                    (dx * dx + dy * dy).sqrt() > MOVE_CANCEL_EPSILON
                }
                None => true,
            };

            if moved {
                log.append(
                    "skill.cast_cancelled",
                    serde_json::json!({ "entityId": entity_id, "reason": "moved" }),
                );
                continue;
            }

            let def = self.definitions.get(&cast.skill_id);
            let action = def.and_then(|d| d.action(&cast.action_id));

            if let Some(action) = action {
                if let Some(effect) = &action.effect {
                    let effect_id = format!("eff_{now}_{entity_id}");
                    let target_state = self.entities.entry(cast.target_id.clone()).or_default();
                    target_state.active_effects.push(ActiveEffect {
                        effect_id: effect_id.clone(),
                        effect_type: effect.effect_type.clone(),
                        speed_multiplier: effect.speed_multiplier,
                        expires_at: now + effect.duration_ms,
                    });
                    log.append(
                        "effect.applied",
                        serde_json::json!({
                            "entityId": cast.target_id,
                            "effectId": effect_id,
                            "effectType": effect.effect_type,
                        }),
                    );
                }
                log.append(
                    "skill.cast_complete",
                    serde_json::json!({
                        "entityId": entity_id,
                        "skillId": cast.skill_id,
                        "actionId": cast.action_id,
                        "targetId": cast.target_id,
                    }),
                );
                let caster_state = self.entities.entry(entity_id.clone()).or_default();
                caster_state
                    .cooldown_until
                    .insert(cast.action_id.clone(), now + action.cooldown_ms);
            }
        }

        for (entity_id, state) in self.entities.iter_mut() {
            let (expired, kept): (Vec<_>, Vec<_>) =
                state.active_effects.drain(..).partition(|e| e.expires_at <= now);
            state.active_effects = kept;
            for effect in expired {
                log.append(
                    "effect.expired",
                    serde_json::json!({
                        "entityId": entity_id,
                        "effectId": effect.effect_id,
                        "effectType": effect.effect_type,
                    }),
                );
            }
        }
    }

    pub fn remove_entity(&mut self, entity_id: &str) {
        self.entities.remove(entity_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn origin() -> WorldPos {
        WorldPos { x: 0.0, y: 0.0 }
    }

    #[test]
    fn install_is_idempotent() {
        let mut engine = SkillEngine::new(builtin_skills());
        assert!(!engine.install("agt_a", "basics.wave"));
        assert!(engine.install("agt_a", "basics.wave"));
    }

    #[test]
    fn invoke_rejects_uninstalled_action() {
        let mut engine = SkillEngine::new(builtin_skills());
        let outcome = engine.invoke(
            "agt_a", "basics.wave", "wave", "agt_b", "tx_abcdef12", origin(), origin(),
        );
        assert!(matches!(
            outcome,
            InvokeOutcome::Rejected(InvokeRejection::ActionNotInstalled)
        ));
    }

    #[test]
    fn invoke_rejects_out_of_range_and_already_casting() {
        let mut engine = SkillEngine::new(builtin_skills());
        engine.install("agt_a", "basics.haste");
        let far = WorldPos { x: 1000.0, y: 0.0 };
        let outcome = engine.invoke(
            "agt_a", "basics.haste", "haste", "agt_a", "tx_abcdef12", origin(), far,
        );
        assert!(matches!(
            outcome,
            InvokeOutcome::Rejected(InvokeRejection::OutOfRange)
        ));

        let outcome = engine.invoke(
            "agt_a", "basics.haste", "haste", "agt_a", "tx_abcdef12", origin(), origin(),
        );
        assert!(matches!(outcome, InvokeOutcome::Pending { .. }));

        let outcome = engine.invoke(
            "agt_a", "basics.haste", "haste", "agt_a", "tx_abcdef34", origin(), origin(),
        );
        assert!(matches!(
            outcome,
            InvokeOutcome::Rejected(InvokeRejection::AlreadyCasting)
        ));
    }

    #[test]
    fn cast_cancelled_when_entity_moved() {
        let mut engine = SkillEngine::new(builtin_skills());
        let mut log = EventLog::new("room-1", 100, Duration::from_secs(60));
        engine.install("agt_a", "basics.haste");
        engine.invoke(
            "agt_a", "basics.haste", "haste", "agt_a", "tx_abcdef12", origin(), origin(),
        );
        engine.tick(&mut log, |_| Some(WorldPos { x: 500.0, y: 500.0 }));
        assert!(!engine.has_pending_cast("agt_a"));
        let (events, _, _) = log.since(Some("0"), 10);
        assert!(events.iter().any(|e| e.event_type == "skill.cast_cancelled"));
    }

    #[test]
    fn zero_cast_time_completes_on_next_tick() {
        // basics.wave has cast_time_ms=0, so its completion_time is already
        // due by the time tick() runs.
        let mut engine = SkillEngine::new(builtin_skills());
        let mut log = EventLog::new("room-1", 100, Duration::from_secs(60));
        engine.install("agt_a", "basics.wave");
        engine.invoke(
            "agt_a", "basics.wave", "wave", "agt_b", "tx_abcdef12", origin(), origin(),
        );
        engine.tick(&mut log, |_| Some(origin()));
        assert!(!engine.has_pending_cast("agt_a"));
        let (events, _, _) = log.since(Some("0"), 10);
        assert!(events.iter().any(|e| e.event_type == "skill.cast_complete"));
    }

    #[test]
    fn cast_complete_applies_effect_to_target_not_caster() {
        let instant_haste = SkillDefinition {
            id: "test.haste".to_string(),
            name: "Haste".to_string(),
            category: "buff".to_string(),
            actions: vec![ActionDefinition {
                id: "haste".to_string(),
                cooldown_ms: 1_000,
                cast_time_ms: 0,
                range_units: 256.0,
                effect: Some(EffectSpec {
                    effect_type: "haste".to_string(),
                    duration_ms: 5_000,
                    speed_multiplier: 1.5,
                }),
            }],
        };
        let mut engine = SkillEngine::new(vec![instant_haste]);
        let mut log = EventLog::new("room-1", 100, Duration::from_secs(60));
        engine.install("agt_a", "test.haste");
        engine.invoke(
            "agt_a", "test.haste", "haste", "agt_b", "tx_abcdef12", origin(), origin(),
        );
        engine.tick(&mut log, |_| Some(origin()));

        assert_eq!(engine.effective_speed("agt_b", 100.0), 150.0);
        assert_eq!(engine.effective_speed("agt_a", 100.0), 100.0);

        let (events, _, _) = log.since(Some("0"), 10);
        let applied = events
            .iter()
            .find(|e| e.event_type == "effect.applied")
            .expect("effect.applied event");
        assert_eq!(applied.payload["entityId"], "agt_b");
    }
}
