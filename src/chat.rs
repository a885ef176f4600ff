//! Chat Store: a bounded ring of chat messages scoped by channel, with
//! emote extraction and a blocklist/mute-aware read filter.

use std::collections::VecDeque;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::event_log::now_ms;
use crate::ids::new_message_id;
use crate::safety::SafetyRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Proximity,
    Global,
    Team,
    Meeting,
    Dm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub room_id: String,
    pub channel: Channel,
    pub from_entity_id: String,
    pub from_name: String,
    pub message: String,
    pub ts_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_room_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub emotes: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct SendOptions {
    pub team_id: Option<String>,
    pub meeting_room_id: Option<String>,
    pub target_entity_id: Option<String>,
}

static EMOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r":([a-z]+):").unwrap());

const EMOTE_WHITELIST: &[&str] = &[
    "wave", "smile", "laugh", "sad", "thumbsup", "thumbsdown", "heart", "clap", "wink", "shrug",
];

fn extract_emotes(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    for cap in EMOTE_RE.captures_iter(text) {
        let name = cap[1].to_string();
        if EMOTE_WHITELIST.contains(&name.as_str()) && !found.contains(&name) {
            found.push(name);
        }
    }
    found
}

/// A membership check for `team`/`meeting` channels: is `entity_id` a
/// member of the given team/meeting room?
pub trait MembershipCheck {
    fn is_team_member(&self, team_id: &str, entity_id: &str) -> bool;
    fn is_meeting_participant(&self, meeting_room_id: &str, entity_id: &str) -> bool;
}

pub struct ChatStore {
    room_id: String,
    capacity: usize,
    messages: VecDeque<ChatMessage>,
}

impl ChatStore {
    pub fn new(room_id: impl Into<String>, capacity: usize) -> Self {
        Self {
            room_id: room_id.into(),
            capacity,
            messages: VecDeque::with_capacity(capacity),
        }
    }

    /// Validates and appends a message. Returns `None` on any validation
    /// failure: `team` needs `team_id` + membership, `meeting` needs
    /// `meeting_room_id` + participation, `dm` needs `target_entity_id`.
    pub fn send_message(
        &mut self,
        channel: Channel,
        from_entity_id: &str,
        from_name: &str,
        text: &str,
        opts: SendOptions,
        membership: &dyn MembershipCheck,
    ) -> Option<(String, i64)> {
        match channel {
            Channel::Team => {
                let team_id = opts.team_id.clone()?;
                if !membership.is_team_member(&team_id, from_entity_id) {
                    return None;
                }
            }
            Channel::Meeting => {
                let meeting_room_id = opts.meeting_room_id.clone()?;
                if !membership.is_meeting_participant(&meeting_room_id, from_entity_id) {
                    return None;
                }
            }
            Channel::Dm => {
                opts.target_entity_id.as_ref()?;
            }
            Channel::Proximity | Channel::Global => {}
        }

        let id = new_message_id();
        let ts_ms = now_ms();
        let emotes = extract_emotes(text);

        let msg = ChatMessage {
            id: id.clone(),
            room_id: self.room_id.clone(),
            channel,
            from_entity_id: from_entity_id.to_string(),
            from_name: from_name.to_string(),
            message: text.to_string(),
            ts_ms,
            target_entity_id: opts.target_entity_id,
            team_id: opts.team_id,
            meeting_room_id: opts.meeting_room_id,
            emotes,
        };

        if self.messages.len() >= self.capacity {
            let evict = (self.capacity as f64 * 0.1).ceil() as usize;
            for _ in 0..evict.max(1) {
                if self.messages.pop_front().is_none() {
                    break;
                }
            }
        }
        self.messages.push_back(msg);

        Some((id, ts_ms))
    }

    /// Returns messages visible to `viewer_id`: matching `channel` (if
    /// given) and `ts_ms >= now - window_sec*1000`, DMs only to sender
    /// or target, and excluding anything from/to a party blocked either
    /// way per the Safety Registry.
    pub fn read_for(
        &self,
        viewer_id: &str,
        channel: Option<Channel>,
        window_sec: u64,
        safety: &SafetyRegistry,
    ) -> Vec<ChatMessage> {
        let cutoff = now_ms() - (window_sec as i64) * 1000;
        self.messages
            .iter()
            .filter(|m| m.ts_ms >= cutoff)
            .filter(|m| channel.map(|c| c == m.channel).unwrap_or(true))
            .filter(|m| {
                if m.channel == Channel::Dm {
                    let target = m.target_entity_id.as_deref().unwrap_or("");
                    m.from_entity_id == viewer_id || target == viewer_id
                } else {
                    true
                }
            })
            .filter(|m| !safety.is_blocked_either_way(viewer_id, &m.from_entity_id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoMembership;
    impl MembershipCheck for NoMembership {
        fn is_team_member(&self, _team_id: &str, _entity_id: &str) -> bool {
            true
        }
        fn is_meeting_participant(&self, _meeting_room_id: &str, _entity_id: &str) -> bool {
            true
        }
    }

    #[test]
    fn team_channel_requires_team_id() {
        let mut store = ChatStore::new("room-1", 10);
        let result = store.send_message(
            Channel::Team,
            "agt_a",
            "A",
            "hi",
            SendOptions::default(),
            &NoMembership,
        );
        assert!(result.is_none());
    }

    #[test]
    fn extracts_whitelisted_emotes_only() {
        let mut store = ChatStore::new("room-1", 10);
        store.send_message(
            Channel::Global,
            "agt_a",
            "A",
            "hello :wave: :notreal: :smile:",
            SendOptions::default(),
            &NoMembership,
        );
        let msgs = store.read_for("agt_a", None, 300, &SafetyRegistry::new());
        assert_eq!(msgs[0].emotes, vec!["wave".to_string(), "smile".to_string()]);
    }

    #[test]
    fn ring_evicts_oldest_tenth_when_full() {
        let mut store = ChatStore::new("room-1", 10);
        for i in 0..10 {
            store.send_message(
                Channel::Global,
                "agt_a",
                "A",
                &format!("msg {i}"),
                SendOptions::default(),
                &NoMembership,
            );
        }
        assert_eq!(store.len(), 10);
        store.send_message(
            Channel::Global,
            "agt_a",
            "A",
            "overflow",
            SendOptions::default(),
            &NoMembership,
        );
        assert!(store.len() <= 10);
    }

    #[test]
    fn dm_visible_only_to_sender_and_target() {
        let mut store = ChatStore::new("room-1", 10);
        store.send_message(
            Channel::Dm,
            "agt_a",
            "A",
            "secret",
            SendOptions {
                target_entity_id: Some("agt_b".to_string()),
                ..Default::default()
            },
            &NoMembership,
        );
        let safety = SafetyRegistry::new();
        assert_eq!(store.read_for("agt_a", None, 300, &safety).len(), 1);
        assert_eq!(store.read_for("agt_b", None, 300, &safety).len(), 1);
        assert_eq!(store.read_for("agt_c", None, 300, &safety).len(), 0);
    }
}
