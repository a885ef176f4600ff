//! Room Runtime: the authoritative per-room actor. Owns `entities`, the
//! grid, event log, chat store, zone tracker, and skill engine; accepts
//! validated intents over a bounded queue and advances the simulation on
//! a fixed tick via an intake `mpsc` channel plus a tick `interval`.

pub mod entity;
pub mod path;
pub mod registry;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::chat::{Channel, ChatMessage, ChatStore, MembershipCheck, SendOptions};
use crate::config::AppConfig;
use crate::event_log::{now_ms, EventLog};
use crate::grid::{TileCoord, WorldGrid, WorldPos};
use crate::metrics::Metrics;
use crate::safety::SafetyRegistry;
use crate::session::SessionStore;
use crate::skill::{InvokeOutcome, InvokeRejection, SkillDefinition, SkillEngine};
use crate::zone::ZoneBounds;

use entity::{Entity, EntityKind, EntityStatus, Facing, ObserveDetail, ObservedEntities};

type Reply<T> = oneshot::Sender<T>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveOutcome {
    Accepted,
    NoOp,
    Rejected { reason: String },
    NoPath,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractOutcome {
    Applied { patch: serde_json::Value },
    TooFar,
    NotFound,
    InvalidAction,
}

pub struct JoinOutcome {
    pub entity: Entity,
}

pub struct ObserveOutcome {
    pub entities: ObservedEntities,
    pub grid: Option<GridSummary>,
}

#[derive(Serialize)]
pub struct GridSummary {
    pub width: i32,
    pub height: i32,
    pub tile_size: f64,
}

pub struct PollEventsOutcome {
    pub events: Vec<crate::event_log::Envelope>,
    pub next_cursor: String,
    pub cursor_expired: bool,
}

#[derive(Serialize)]
pub struct EntityPatch {
    pub id: String,
    pub patch: serde_json::Value,
}

#[derive(Clone, Serialize)]
pub struct RoomDiff {
    pub added: Vec<Entity>,
    pub removed: Vec<String>,
    pub changed: Vec<EntityPatch>,
}

pub enum Intent {
    Join {
        name: String,
        kind: EntityKind,
        reply: Reply<JoinOutcome>,
    },
    /// Restores the entity at `entity_id` if it's still present (e.g. a
    /// dropped websocket whose session never timed out), otherwise
    /// respawns it fresh under the same id.
    Reconnect {
        entity_id: String,
        name: String,
        reply: Reply<Entity>,
    },
    Leave {
        entity_id: String,
        reason: String,
    },
    MoveTo {
        entity_id: String,
        dest: TileCoord,
        reply: Reply<MoveOutcome>,
    },
    Interact {
        entity_id: String,
        target_id: String,
        action: String,
        reply: Reply<InteractOutcome>,
    },
    ChatSend {
        entity_id: String,
        channel: Channel,
        message: String,
        opts: SendOptions,
        reply: Reply<Option<(String, i64)>>,
    },
    ChatObserve {
        viewer_id: String,
        channel: Option<Channel>,
        window_sec: u64,
        reply: Reply<Vec<ChatMessage>>,
    },
    Observe {
        entity_id: String,
        radius: f64,
        detail: ObserveDetail,
        include_self: bool,
        include_grid: bool,
        reply: Reply<ObserveOutcome>,
    },
    ProfileUpdate {
        entity_id: String,
        status: Option<EntityStatus>,
        title: Option<String>,
        department: Option<String>,
        reply: Reply<()>,
    },
    SkillList {
        reply: Reply<Vec<SkillDefinition>>,
    },
    SkillInstall {
        entity_id: String,
        skill_id: String,
        reply: Reply<bool>,
    },
    SkillInvoke {
        entity_id: String,
        skill_id: String,
        action_id: String,
        target_id: String,
        tx_id: String,
        reply: Reply<Result<InvokeOutcomeView, InvokeRejection>>,
    },
    /// While casting, the entity may cancel its own pending cast; emits
    /// `skill.cast_cancelled(reason="user")`, no cooldown applied.
    SkillCancel {
        entity_id: String,
        reply: Reply<bool>,
    },
    PollEvents {
        since_cursor: Option<String>,
        limit: usize,
        wait_ms: u64,
        reply: Reply<PollEventsOutcome>,
    },
    /// Meeting rooms: a lightweight grouping layered on top of
    /// `entity.meta["meetingRoomId"]`, reusing the `profile.updated`
    /// event rather than a dedicated event type.
    MeetingJoin {
        entity_id: String,
        meeting_room_id: String,
        reply: Reply<()>,
    },
    MeetingLeave {
        entity_id: String,
        reply: Reply<()>,
    },
    MeetingList {
        reply: Reply<Vec<MeetingSummary>>,
    },
}

#[derive(Serialize)]
pub struct InvokeOutcomeView {
    pub completion_time_ms: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSummary {
    pub meeting_room_id: String,
    pub participant_count: u64,
}

struct PendingPoll {
    since_cursor: Option<String>,
    limit: usize,
    deadline: Instant,
    reply: Reply<PollEventsOutcome>,
}

struct RoomMembership<'a> {
    entities: &'a HashMap<String, Entity>,
}

impl<'a> MembershipCheck for RoomMembership<'a> {
    fn is_team_member(&self, team_id: &str, entity_id: &str) -> bool {
        self.entities
            .get(entity_id)
            .and_then(|e| e.meta.get("teamId"))
            .and_then(|v| v.as_str())
            .map(|v| v == team_id)
            .unwrap_or(false)
    }

    fn is_meeting_participant(&self, meeting_room_id: &str, entity_id: &str) -> bool {
        self.entities
            .get(entity_id)
            .and_then(|e| e.meta.get("meetingRoomId"))
            .and_then(|v| v.as_str())
            .map(|v| v == meeting_room_id)
            .unwrap_or(false)
    }
}

pub struct RoomHandle {
    pub room_id: String,
    intake: mpsc::Sender<Intent>,
    occupancy: Arc<AtomicUsize>,
    max_occupancy: usize,
    diff_tx: broadcast::Sender<RoomDiff>,
    chat_tx: broadcast::Sender<ChatMessage>,
}

impl RoomHandle {
    pub fn occupancy(&self) -> usize {
        self.occupancy.load(Ordering::Relaxed)
    }

    pub fn max_occupancy(&self) -> usize {
        self.max_occupancy
    }

    pub fn subscribe_diffs(&self) -> broadcast::Receiver<RoomDiff> {
        self.diff_tx.subscribe()
    }

    pub fn subscribe_chat(&self) -> broadcast::Receiver<ChatMessage> {
        self.chat_tx.subscribe()
    }

    pub async fn send(&self, intent: Intent) -> Result<(), mpsc::error::SendError<Intent>> {
        self.intake.send(intent).await
    }

    #[cfg(test)]
    pub fn occupancy_for_test_fill(&self) {
        self.occupancy.store(self.max_occupancy, Ordering::Relaxed);
    }
}

pub struct RoomRuntime {
    room_id: String,
    grid: WorldGrid,
    entities: HashMap<String, Entity>,
    pending_paths: HashMap<String, Vec<TileCoord>>,
    event_log: EventLog,
    chat: ChatStore,
    zone: crate::zone::ZoneTracker,
    skills: SkillEngine,
    proximate_pairs: HashSet<(String, String)>,
    last_snapshot: HashMap<String, Entity>,
    pending_polls: Vec<PendingPoll>,
    spawn_point: TileCoord,
    interaction_radius: f64,
    proximity_radius: f64,
    max_explored_nodes: usize,
    session_timeout_ms: i64,
    sessions: Arc<SessionStore>,
    safety: Arc<SafetyRegistry>,
    metrics: Arc<Metrics>,
    occupancy: Arc<AtomicUsize>,
    diff_tx: broadcast::Sender<RoomDiff>,
    chat_tx: broadcast::Sender<ChatMessage>,
}

impl RoomRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        room_id: String,
        grid: WorldGrid,
        zones: Vec<ZoneBounds>,
        skill_defs: Vec<SkillDefinition>,
        spawn_point: Option<TileCoord>,
        config: &AppConfig,
        sessions: Arc<SessionStore>,
        safety: Arc<SafetyRegistry>,
        metrics: Arc<Metrics>,
    ) -> RoomHandle {
        let (intake_tx, intake_rx) = mpsc::channel(config.queue_bound);
        let (diff_tx, _) = broadcast::channel(256);
        let (chat_tx, _) = broadcast::channel(256);
        let occupancy = Arc::new(AtomicUsize::new(0));

        let spawn_point = spawn_point
            .or_else(|| grid.first_passable_tile())
            .unwrap_or(TileCoord::new(0, 0));

        let runtime = RoomRuntime {
            room_id: room_id.clone(),
            grid,
            entities: HashMap::new(),
            pending_paths: HashMap::new(),
            event_log: EventLog::new(room_id.clone(), config.event_ring_capacity, config.event_ttl),
            chat: ChatStore::new(room_id.clone(), config.chat_ring_capacity),
            zone: crate::zone::ZoneTracker::new(zones),
            skills: SkillEngine::new(skill_defs),
            proximate_pairs: HashSet::new(),
            last_snapshot: HashMap::new(),
            pending_polls: Vec::new(),
            spawn_point,
            interaction_radius: config.interaction_radius,
            proximity_radius: config.proximity_radius,
            max_explored_nodes: 2000,
            session_timeout_ms: config.session_timeout.as_millis() as i64,
            sessions,
            safety,
            metrics,
            occupancy: occupancy.clone(),
            diff_tx: diff_tx.clone(),
            chat_tx: chat_tx.clone(),
        };

        let tick_period = Duration::from_secs_f64(1.0 / config.tick_hz as f64);
        tokio::spawn(runtime.run(intake_rx, tick_period));

        RoomHandle {
            room_id,
            intake: intake_tx,
            occupancy,
            max_occupancy: config.room_capacity,
            diff_tx,
            chat_tx,
        }
    }

    async fn run(mut self, mut intake: mpsc::Receiver<Intent>, tick_period: Duration) {
        let mut ticker = tokio::time::interval(tick_period);
        loop {
            tokio::select! {
                maybe_intent = intake.recv() => {
                    match maybe_intent {
                        Some(intent) => {
                            let cursor_before = self.event_log.tail_cursor();
                            self.handle_intent(intent);
                            self.metrics.record_intent();
                            self.metrics
                                .record_events(self.event_log.tail_cursor() - cursor_before);
                        }
                        None => break,
                    }
                    self.resolve_pending_polls();
                }
                _ = ticker.tick() => {
                    let cursor_before = self.event_log.tail_cursor();
                    self.tick();
                    self.metrics.record_tick();
                    self.metrics
                        .record_events(self.event_log.tail_cursor() - cursor_before);
                }
            }
        }
    }

    fn handle_intent(&mut self, intent: Intent) {
        match intent {
            Intent::Join { name, kind, reply } => {
                let entity = self.do_join(name, kind);
                let _ = reply.send(JoinOutcome { entity });
            }
            Intent::Reconnect { entity_id, name, reply } => {
                let entity = self.do_reconnect(entity_id, name);
                let _ = reply.send(entity);
            }
            Intent::Leave { entity_id, reason } => {
                self.do_leave(&entity_id, &reason);
            }
            Intent::MoveTo { entity_id, dest, reply } => {
                let outcome = self.do_move_to(&entity_id, dest);
                let _ = reply.send(outcome);
            }
            Intent::Interact {
                entity_id,
                target_id,
                action,
                reply,
            } => {
                let outcome = self.do_interact(&entity_id, &target_id, &action);
                let _ = reply.send(outcome);
            }
            Intent::ChatSend {
                entity_id,
                channel,
                message,
                opts,
                reply,
            } => {
                let outcome = self.do_chat_send(&entity_id, channel, &message, opts);
                let _ = reply.send(outcome);
            }
            Intent::ChatObserve {
                viewer_id,
                channel,
                window_sec,
                reply,
            } => {
                let messages = self.chat.read_for(&viewer_id, channel, window_sec, &self.safety);
                let _ = reply.send(messages);
            }
            Intent::Observe {
                entity_id,
                radius,
                detail,
                include_self,
                include_grid,
                reply,
            } => {
                let outcome = self.do_observe(&entity_id, radius, detail, include_self, include_grid);
                let _ = reply.send(outcome);
            }
            Intent::ProfileUpdate {
                entity_id,
                status,
                title,
                department,
                reply,
            } => {
                self.do_profile_update(&entity_id, status, title, department);
                let _ = reply.send(());
            }
            Intent::SkillList { reply } => {
                let defs = self.skills.list_definitions().into_iter().cloned().collect();
                let _ = reply.send(defs);
            }
            Intent::SkillInstall {
                entity_id,
                skill_id,
                reply,
            } => {
                let already_installed = self.skills.install(&entity_id, &skill_id);
                let _ = reply.send(already_installed);
            }
            Intent::SkillInvoke {
                entity_id,
                skill_id,
                action_id,
                target_id,
                tx_id,
                reply,
            } => {
                let outcome = self.do_skill_invoke(&entity_id, &skill_id, &action_id, &target_id, &tx_id);
                let _ = reply.send(outcome);
            }
            Intent::SkillCancel { entity_id, reply } => {
                let cancelled = self.skills.cancel(&entity_id, &mut self.event_log);
                let _ = reply.send(cancelled);
            }
            Intent::PollEvents {
                since_cursor,
                limit,
                wait_ms,
                reply,
            } => {
                self.do_poll_events(since_cursor, limit, wait_ms, reply);
            }
            Intent::MeetingJoin {
                entity_id,
                meeting_room_id,
                reply,
            } => {
                self.do_meeting_join(&entity_id, meeting_room_id);
                let _ = reply.send(());
            }
            Intent::MeetingLeave { entity_id, reply } => {
                self.do_meeting_leave(&entity_id);
                let _ = reply.send(());
            }
            Intent::MeetingList { reply } => {
                let summaries = self.do_meeting_list();
                let _ = reply.send(summaries);
            }
        }
    }

    fn do_join(&mut self, name: String, kind: EntityKind) -> Entity {
        let id = match kind {
            EntityKind::Human => crate::ids::new_human_id(),
            EntityKind::Agent => crate::ids::new_agent_id(),
            EntityKind::Object | EntityKind::Npc => crate::ids::new_object_id(),
        };
        self.spawn_entity(id, kind, name)
    }

    /// Restores `entity_id` if it's still present in the room, otherwise
    /// respawns it fresh under the same id (agent ids double as entity
    /// ids, so the bearer session keeps pointing at the right entity).
    fn do_reconnect(&mut self, entity_id: String, name: String) -> Entity {
        if let Some(entity) = self.entities.get(&entity_id) {
            return entity.clone();
        }
        self.spawn_entity(entity_id, EntityKind::Agent, name)
    }

    fn spawn_entity(&mut self, id: String, kind: EntityKind, name: String) -> Entity {
        let pos = self.grid.tile_center(self.spawn_point);
        let mut entity = Entity::new(id.clone(), kind, name, self.room_id.clone(), pos, self.spawn_point);
        let update = self.zone.update(&id, pos, &mut self.event_log);
        entity.current_zone = update.current;
        self.entities.insert(id.clone(), entity.clone());
        self.occupancy.store(self.entities.len(), Ordering::Relaxed);
        self.event_log.append(
            "presence.join",
            serde_json::json!({ "entityId": id, "name": entity.name, "kind": entity.kind }),
        );
        entity
    }

    fn do_leave(&mut self, entity_id: &str, reason: &str) {
        if self.entities.remove(entity_id).is_some() {
            self.pending_paths.remove(entity_id);
            self.zone.remove_entity(entity_id);
            self.skills.remove_entity(entity_id);
            self.occupancy.store(self.entities.len(), Ordering::Relaxed);
            self.event_log.append(
                "presence.leave",
                serde_json::json!({ "entityId": entity_id, "reason": reason }),
            );
        }
    }

    fn do_move_to(&mut self, entity_id: &str, dest: TileCoord) -> MoveOutcome {
        let Some(entity) = self.entities.get(entity_id) else {
            return MoveOutcome::Rejected {
                reason: "agent_not_in_room".to_string(),
            };
        };
        if !self.grid.in_bounds(dest.tx, dest.ty) {
            return MoveOutcome::Rejected {
                reason: "out_of_bounds".to_string(),
            };
        }
        if entity.tile == dest {
            return MoveOutcome::NoOp;
        }
        if self.grid.is_blocked(dest.tx, dest.ty) {
            return MoveOutcome::Rejected {
                reason: "blocked".to_string(),
            };
        }

        match path::find_path(&self.grid, entity.tile, dest, self.max_explored_nodes) {
            None => MoveOutcome::NoPath,
            Some(steps) => {
                self.pending_paths.insert(entity_id.to_string(), steps);
                MoveOutcome::Accepted
            }
        }
    }

    fn do_interact(&mut self, entity_id: &str, target_id: &str, action: &str) -> InteractOutcome {
        let Some(actor) = self.entities.get(entity_id) else {
            return InteractOutcome::NotFound;
        };
        let Some(target) = self.entities.get(target_id) else {
            return InteractOutcome::NotFound;
        };
        if actor.distance_to(target) > self.interaction_radius {
            return InteractOutcome::TooFar;
        }
        let advertises = target
            .meta
            .get("affordances")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().any(|a| a.as_str() == Some(action)))
            .unwrap_or(false);
        if !advertises {
            return InteractOutcome::InvalidAction;
        }

        let current_state = target
            .meta
            .get("state")
            .and_then(|v| v.as_str())
            .unwrap_or("closed")
            .to_string();
        let next_state = if current_state == "closed" { "open" } else { "closed" };
        let patch = serde_json::json!({ "state": next_state });

        if let Some(target_mut) = self.entities.get_mut(target_id) {
            target_mut
                .meta
                .insert("state".to_string(), serde_json::Value::String(next_state.to_string()));
        }

        self.event_log.append(
            "object.state_changed",
            serde_json::json!({ "entityId": target_id, "patch": patch, "action": action, "by": entity_id }),
        );

        InteractOutcome::Applied { patch }
    }

    fn do_chat_send(
        &mut self,
        entity_id: &str,
        channel: Channel,
        message: &str,
        opts: SendOptions,
    ) -> Option<(String, i64)> {
        let from_name = self
            .entities
            .get(entity_id)
            .map(|e| e.name.clone())
            .unwrap_or_default();
        let membership = RoomMembership {
            entities: &self.entities,
        };
        let result = self
            .chat
            .send_message(channel, entity_id, &from_name, message, opts, &membership);
        if let Some((msg_id, ts_ms)) = &result {
            self.event_log.append(
                "chat.message",
                serde_json::json!({ "id": msg_id, "entityId": entity_id, "channel": channel, "tsMs": ts_ms }),
            );
            if let Some(msgs) = self
                .chat
                .read_for(entity_id, None, 1, &self.safety)
                .into_iter()
                .find(|m| &m.id == msg_id)
            {
                let _ = self.chat_tx.send(msgs);
            }
        }
        result
    }

    fn do_observe(
        &self,
        entity_id: &str,
        radius: f64,
        detail: ObserveDetail,
        include_self: bool,
        include_grid: bool,
    ) -> ObserveOutcome {
        let observer_pos = self.entities.get(entity_id).map(|e| e.pos);
        let nearby: Vec<&Entity> = self
            .entities
            .values()
            .filter(|e| include_self || e.id != entity_id)
            .filter(|e| match observer_pos {
                Some(pos) => distance(pos, e.pos) <= radius,
                None => true,
            })
            .collect();
        let entities = match detail {
            ObserveDetail::Lite => ObservedEntities::Lite(nearby.iter().map(|e| (*e).into()).collect()),
            ObserveDetail::Full => ObservedEntities::Full(nearby.into_iter().cloned().collect()),
        };
        let grid = include_grid.then(|| GridSummary {
            width: self.grid.width,
            height: self.grid.height,
            tile_size: self.grid.tile_size,
        });
        ObserveOutcome { entities, grid }
    }

    fn do_profile_update(
        &mut self,
        entity_id: &str,
        status: Option<EntityStatus>,
        title: Option<String>,
        department: Option<String>,
    ) {
        let Some(entity) = self.entities.get_mut(entity_id) else {
            return;
        };
        if let Some(status) = status {
            entity.status = status;
        }
        if let Some(title) = &title {
            entity
                .meta
                .insert("title".to_string(), serde_json::Value::String(title.clone()));
        }
        if let Some(department) = &department {
            entity
                .meta
                .insert("department".to_string(), serde_json::Value::String(department.clone()));
        }
        self.event_log.append(
            "profile.updated",
            serde_json::json!({ "entityId": entity_id, "title": title, "department": department }),
        );
    }

    fn do_meeting_join(&mut self, entity_id: &str, meeting_room_id: String) {
        let Some(entity) = self.entities.get_mut(entity_id) else {
            return;
        };
        entity.meta.insert(
            "meetingRoomId".to_string(),
            serde_json::Value::String(meeting_room_id.clone()),
        );
        self.event_log.append(
            "profile.updated",
            serde_json::json!({ "entityId": entity_id, "meetingRoomId": meeting_room_id }),
        );
    }

    fn do_meeting_leave(&mut self, entity_id: &str) {
        let Some(entity) = self.entities.get_mut(entity_id) else {
            return;
        };
        if entity.meta.remove("meetingRoomId").is_none() {
            return;
        }
        self.event_log.append(
            "profile.updated",
            serde_json::json!({ "entityId": entity_id, "meetingRoomId": serde_json::Value::Null }),
        );
    }

    fn do_meeting_list(&self) -> Vec<MeetingSummary> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for entity in self.entities.values() {
            if let Some(room_id) = entity.meta.get("meetingRoomId").and_then(|v| v.as_str()) {
                *counts.entry(room_id.to_string()).or_insert(0) += 1;
            }
        }
        counts
            .into_iter()
            .map(|(meeting_room_id, participant_count)| MeetingSummary {
                meeting_room_id,
                participant_count,
            })
            .collect()
    }

    fn do_skill_invoke(
        &mut self,
        entity_id: &str,
        skill_id: &str,
        action_id: &str,
        target_id: &str,
        tx_id: &str,
    ) -> Result<InvokeOutcomeView, InvokeRejection> {
        let Some(entity_pos) = self.entities.get(entity_id).map(|e| e.pos) else {
            return Err(InvokeRejection::ActionNotInstalled);
        };
        let target_pos = self
            .entities
            .get(target_id)
            .map(|e| e.pos)
            .unwrap_or(entity_pos);

        match self
            .skills
            .invoke(entity_id, skill_id, action_id, target_id, tx_id, entity_pos, target_pos)
        {
            InvokeOutcome::Pending { completion_time } => {
                self.event_log.append(
                    "skill.invoked",
                    serde_json::json!({
                        "entityId": entity_id, "skillId": skill_id, "actionId": action_id, "targetId": target_id,
                    }),
                );
                Ok(InvokeOutcomeView {
                    completion_time_ms: completion_time,
                })
            }
            InvokeOutcome::Rejected(reason) => Err(reason),
        }
    }

    fn do_poll_events(
        &mut self,
        since_cursor: Option<String>,
        limit: usize,
        wait_ms: u64,
        reply: Reply<PollEventsOutcome>,
    ) {
        let (events, next_cursor, cursor_expired) = self.event_log.since(since_cursor.as_deref(), limit);
        if !events.is_empty() || cursor_expired || wait_ms == 0 {
            let _ = reply.send(PollEventsOutcome {
                events,
                next_cursor,
                cursor_expired,
            });
            return;
        }

        self.pending_polls.push(PendingPoll {
            since_cursor,
            limit,
            deadline: Instant::now() + Duration::from_millis(wait_ms),
            reply,
        });
    }

    fn resolve_pending_polls(&mut self) {
        let now = Instant::now();
        let mut remaining = Vec::with_capacity(self.pending_polls.len());
        for poll in self.pending_polls.drain(..) {
            let (events, next_cursor, cursor_expired) =
                self.event_log.since(poll.since_cursor.as_deref(), poll.limit);
            if !events.is_empty() || cursor_expired || now >= poll.deadline {
                let _ = poll.reply.send(PollEventsOutcome {
                    events,
                    next_cursor,
                    cursor_expired,
                });
            } else {
                remaining.push(poll);
            }
        }
        self.pending_polls = remaining;
    }

    fn tick(&mut self) {
        self.advance_pending_moves();
        self.apply_session_timeouts();
        self.update_proximity();
        self.skills.tick(&mut self.event_log, |id| {
            self.entities.get(id).map(|e| e.pos)
        });
        self.resolve_pending_polls();
        self.publish_diff();
    }

    fn advance_pending_moves(&mut self) {
        let mut occupied: HashMap<(i32, i32), String> = self
            .entities
            .values()
            .filter(|e| e.kind != EntityKind::Object)
            .map(|e| ((e.tile.tx, e.tile.ty), e.id.clone()))
            .collect();

        let mut moved_ids = Vec::new();
        let ids: Vec<String> = self.pending_paths.keys().cloned().collect();

        for id in ids {
            let Some(next_tile) = self.pending_paths.get(&id).and_then(|p| p.first()).copied() else {
                continue;
            };
            let Some(entity) = self.entities.get(&id) else {
                self.pending_paths.remove(&id);
                continue;
            };
            let from_tile = entity.tile;
            let slot_free = occupied
                .get(&(next_tile.tx, next_tile.ty))
                .map(|occ| occ == &id)
                .unwrap_or(true);

            if self.grid.can_move_to(from_tile, next_tile) && slot_free {
                occupied.remove(&(from_tile.tx, from_tile.ty));
                occupied.insert((next_tile.tx, next_tile.ty), id.clone());

                if let Some(entity) = self.entities.get_mut(&id) {
                    entity.facing = Entity::facing_for_step(from_tile, next_tile);
                    entity.tile = next_tile;
                    entity.pos = self.grid.tile_center(next_tile);
                }
                if let Some(path) = self.pending_paths.get_mut(&id) {
                    path.remove(0);
                }
                moved_ids.push(id);
            }
        }

        self.pending_paths.retain(|_, path| !path.is_empty());

        for id in moved_ids {
            if let Some(entity) = self.entities.get(&id) {
                let pos = entity.pos;
                let update = self.zone.update(&id, pos, &mut self.event_log);
                if let Some(entity) = self.entities.get_mut(&id) {
                    entity.current_zone = update.current;
                }
            }
        }
    }

    fn apply_session_timeouts(&mut self) {
        let timed_out = self.sessions.timed_out(self.session_timeout_ms);
        for session in timed_out {
            if self.entities.contains_key(&session.agent_id) {
                self.do_leave(&session.agent_id, "timeout");
                self.sessions.unregister(&session.agent_id);
            }
        }
    }

    fn update_proximity(&mut self) {
        let ids: Vec<String> = self.entities.keys().cloned().collect();
        let mut current_pairs = HashSet::new();

        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (a, b) = (&ids[i], &ids[j]);
                let (pos_a, pos_b) = match (self.entities.get(a), self.entities.get(b)) {
                    (Some(ea), Some(eb)) => (ea.pos, eb.pos),
                    _ => continue,
                };
                if distance(pos_a, pos_b) <= self.proximity_radius {
                    let key = pair_key(a, b);
                    current_pairs.insert(key);
                }
            }
        }

        for key in current_pairs.difference(&self.proximate_pairs) {
            self.event_log.append(
                "proximity.enter",
                serde_json::json!({ "a": key.0, "b": key.1 }),
            );
        }
        for key in self.proximate_pairs.difference(&current_pairs) {
            self.event_log.append(
                "proximity.exit",
                serde_json::json!({ "a": key.0, "b": key.1 }),
            );
        }
        self.proximate_pairs = current_pairs;
    }

    fn publish_diff(&mut self) {
        let mut added = Vec::new();
        let mut changed = Vec::new();

        for (id, entity) in &self.entities {
            match self.last_snapshot.get(id) {
                None => added.push(entity.clone()),
                Some(prev) => {
                    if let Some(patch) = diff_entity(prev, entity) {
                        changed.push(EntityPatch {
                            id: id.clone(),
                            patch,
                        });
                    }
                }
            }
        }

        let removed: Vec<String> = self
            .last_snapshot
            .keys()
            .filter(|id| !self.entities.contains_key(*id))
            .cloned()
            .collect();

        if !added.is_empty() || !removed.is_empty() || !changed.is_empty() {
            let _ = self.diff_tx.send(RoomDiff {
                added,
                removed,
                changed,
            });
        }

        self.last_snapshot = self.entities.clone();
    }
}

fn distance(a: WorldPos, b: WorldPos) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a < b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

fn diff_entity(prev: &Entity, current: &Entity) -> Option<serde_json::Value> {
    let mut patch = serde_json::Map::new();
    if prev.pos != current.pos {
        patch.insert("pos".to_string(), serde_json::to_value(current.pos).ok()?);
    }
    if prev.facing != current.facing {
        patch.insert("facing".to_string(), serde_json::to_value(current.facing).ok()?);
    }
    if prev.status != current.status {
        patch.insert("status".to_string(), serde_json::to_value(current.status).ok()?);
    }
    if prev.current_zone != current.current_zone {
        patch.insert(
            "currentZone".to_string(),
            serde_json::to_value(&current.current_zone).ok()?,
        );
    }
    if patch.is_empty() {
        None
    } else {
        Some(serde_json::Value::Object(patch))
    }
}
