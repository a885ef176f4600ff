use std::env;
use std::time::Duration;

/// Every tunable knob the server exposes, read from the environment with
/// sensible defaults applied when unset.
///
/// Environment variables (all optional, sensible defaults applied):
/// - `WORLD_TICK_HZ` — room simulation tick rate (default 10)
/// - `WORLD_ROOM_CAPACITY` — max occupancy per room (default 64)
/// - `WORLD_QUEUE_BOUND` — bounded intake queue size per room (default 4096)
/// - `WORLD_EVENT_RING_CAPACITY` — event log ring size (default 1000)
/// - `WORLD_EVENT_TTL_SECS` — event log entry TTL (default 60)
/// - `WORLD_CHAT_RING_CAPACITY` — chat ring size (default 1000)
/// - `WORLD_SESSION_TIMEOUT_SECS` — presence timeout (default 90)
/// - `WORLD_IDEMPOTENCY_TTL_SECS` — idempotency record TTL (default 600)
/// - `WORLD_INTERACTION_RADIUS` — interact() distance bound (default 64.0)
/// - `WORLD_PROXIMITY_RADIUS` — proximity.enter/exit threshold (default 128.0)
/// - `WORLD_PACK_DIR` — map pack directory (default "pack")
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tick_hz: u32,
    pub room_capacity: usize,
    pub queue_bound: usize,
    pub event_ring_capacity: usize,
    pub event_ttl: Duration,
    pub chat_ring_capacity: usize,
    pub session_timeout: Duration,
    pub idempotency_ttl: Duration,
    pub interaction_radius: f64,
    pub proximity_radius: f64,
    pub pack_dir: String,
    pub rate_limits: RateLimitConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_hz: 10,
            room_capacity: 64,
            queue_bound: 4096,
            event_ring_capacity: 1000,
            event_ttl: Duration::from_secs(60),
            chat_ring_capacity: 1000,
            session_timeout: Duration::from_secs(90),
            idempotency_ttl: Duration::from_secs(600),
            interaction_radius: 64.0,
            proximity_radius: 128.0,
            pack_dir: "pack".to_string(),
            rate_limits: RateLimitConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(n) = env_parse::<u32>("WORLD_TICK_HZ") {
            cfg.tick_hz = n;
        }
        if let Some(n) = env_parse::<usize>("WORLD_ROOM_CAPACITY") {
            cfg.room_capacity = n;
        }
        if let Some(n) = env_parse::<usize>("WORLD_QUEUE_BOUND") {
            cfg.queue_bound = n;
        }
        if let Some(n) = env_parse::<usize>("WORLD_EVENT_RING_CAPACITY") {
            cfg.event_ring_capacity = n;
        }
        if let Some(n) = env_parse::<u64>("WORLD_EVENT_TTL_SECS") {
            cfg.event_ttl = Duration::from_secs(n);
        }
        if let Some(n) = env_parse::<usize>("WORLD_CHAT_RING_CAPACITY") {
            cfg.chat_ring_capacity = n;
        }
        if let Some(n) = env_parse::<u64>("WORLD_SESSION_TIMEOUT_SECS") {
            cfg.session_timeout = Duration::from_secs(n);
        }
        if let Some(n) = env_parse::<u64>("WORLD_IDEMPOTENCY_TTL_SECS") {
            cfg.idempotency_ttl = Duration::from_secs(n);
        }
        if let Some(n) = env_parse::<f64>("WORLD_INTERACTION_RADIUS") {
            cfg.interaction_radius = n;
        }
        if let Some(n) = env_parse::<f64>("WORLD_PROXIMITY_RADIUS") {
            cfg.proximity_radius = n;
        }
        if let Ok(dir) = env::var("WORLD_PACK_DIR") {
            cfg.pack_dir = dir;
        }

        cfg.rate_limits = RateLimitConfig::from_env();
        cfg
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

/// Per-endpoint-class token bucket limits.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub observation_rate: u32,
    pub observation_burst: u32,
    pub action_rate: u32,
    pub action_burst: u32,
    pub chat_rate: u32,
    pub chat_burst: u32,
    pub events_rate: u32,
    pub events_burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            observation_rate: 20,
            observation_burst: 40,
            action_rate: 10,
            action_burst: 20,
            chat_rate: 5,
            chat_burst: 10,
            events_rate: 10,
            events_burst: 20,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(n) = env_parse::<u32>("WORLD_RATE_OBSERVATION") {
            cfg.observation_rate = n;
        }
        if let Some(n) = env_parse::<u32>("WORLD_RATE_OBSERVATION_BURST") {
            cfg.observation_burst = n;
        }
        if let Some(n) = env_parse::<u32>("WORLD_RATE_ACTION") {
            cfg.action_rate = n;
        }
        if let Some(n) = env_parse::<u32>("WORLD_RATE_ACTION_BURST") {
            cfg.action_burst = n;
        }
        if let Some(n) = env_parse::<u32>("WORLD_RATE_CHAT") {
            cfg.chat_rate = n;
        }
        if let Some(n) = env_parse::<u32>("WORLD_RATE_CHAT_BURST") {
            cfg.chat_burst = n;
        }
        if let Some(n) = env_parse::<u32>("WORLD_RATE_EVENTS") {
            cfg.events_rate = n;
        }
        if let Some(n) = env_parse::<u32>("WORLD_RATE_EVENTS_BURST") {
            cfg.events_burst = n;
        }
        cfg
    }
}

/// Endpoint classes a rate limit key falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    Observation,
    Action,
    Chat,
    Events,
}

impl EndpointClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::Observation => "observation",
            EndpointClass::Action => "action",
            EndpointClass::Chat => "chat",
            EndpointClass::Events => "events",
        }
    }
}
