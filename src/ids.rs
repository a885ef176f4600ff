//! ID/token generation plus the authoritative format regexes.
//!
//! Generation formats a `Uuid::new_v4` as lowercase hex, which is a
//! subset of every ID regex's allowed alphabet.

use once_cell::sync::Lazy;
use regex::Regex;

pub static ROOM_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,64}$").unwrap());
pub static AGENT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,64}$").unwrap());
pub static ENTITY_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(hum|agt|obj)_[A-Za-z0-9._-]{1,64}$").unwrap());
pub static NPC_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(npc_)?[a-z][a-z0-9-]{0,63}$").unwrap());
pub static TX_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^tx_[A-Za-z0-9._-]{8,128}$").unwrap());
pub static MESSAGE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^msg_[A-Za-z0-9._-]{8,128}$").unwrap());

fn hex_uuid() -> String {
    format!("{:032x}", uuid::Uuid::new_v4().as_u128())
}

pub fn new_human_id() -> String {
    format!("hum_{}", hex_uuid())
}

pub fn new_agent_id() -> String {
    format!("agt_{}", hex_uuid())
}

pub fn new_object_id() -> String {
    format!("obj_{}", hex_uuid())
}

pub fn new_message_id() -> String {
    format!("msg_{}", hex_uuid())
}

pub fn new_session_token() -> String {
    format!("tok_{}", hex_uuid())
}

pub fn is_valid_tx_id(tx_id: &str) -> bool {
    TX_ID_RE.is_match(tx_id)
}

pub fn is_valid_room_id(room_id: &str) -> bool {
    ROOM_ID_RE.is_match(room_id)
}

pub fn is_valid_agent_id(agent_id: &str) -> bool {
    AGENT_ID_RE.is_match(agent_id)
}

pub fn is_valid_entity_id(entity_id: &str) -> bool {
    ENTITY_ID_RE.is_match(entity_id) || NPC_ID_RE.is_match(entity_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_match_their_own_regex() {
        assert!(ENTITY_ID_RE.is_match(&new_human_id()));
        assert!(ENTITY_ID_RE.is_match(&new_agent_id()));
        assert!(ENTITY_ID_RE.is_match(&new_object_id()));
        assert!(MESSAGE_ID_RE.is_match(&new_message_id()));
    }

    #[test]
    fn tx_id_format() {
        assert!(is_valid_tx_id("tx_abcdef12"));
        assert!(!is_valid_tx_id("tx_short"));
        assert!(!is_valid_tx_id("abcdef12"));
    }
}
