//! Rate Limiter: a token bucket per `(agentId, endpointClass)`, built on
//! `governor`'s keyed limiter, which models burst + sustained-rate
//! semantics natively.

use std::num::NonZeroU32;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorLimiter};
use nonzero_ext::nonzero;

use crate::config::{EndpointClass, RateLimitConfig};

type KeyedLimiter = DefaultKeyedRateLimiter<String>;

/// One bucket per endpoint class, each keyed by `agentId`.
pub struct RateLimiter {
    observation: KeyedLimiter,
    action: KeyedLimiter,
    chat: KeyedLimiter,
    events: KeyedLimiter,
}

fn quota(rate: u32, burst: u32) -> Quota {
    let rate = NonZeroU32::new(rate.max(1)).unwrap_or(nonzero!(1u32));
    let burst = NonZeroU32::new(burst.max(1)).unwrap_or(nonzero!(1u32));
    Quota::per_second(rate).allow_burst(burst)
}

fn keyed_limiter(rate: u32, burst: u32) -> KeyedLimiter {
    GovernorLimiter::keyed(quota(rate, burst))
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            observation: keyed_limiter(config.observation_rate, config.observation_burst),
            action: keyed_limiter(config.action_rate, config.action_burst),
            chat: keyed_limiter(config.chat_rate, config.chat_burst),
            events: keyed_limiter(config.events_rate, config.events_burst),
        }
    }

    /// `true` if the call is allowed (a token was consumed).
    pub fn check(&self, agent_id: &str, class: EndpointClass) -> bool {
        let limiter = match class {
            EndpointClass::Observation => &self.observation,
            EndpointClass::Action => &self.action,
            EndpointClass::Chat => &self.chat,
            EndpointClass::Events => &self.events,
        };
        limiter.check_key(&agent_id.to_string()).is_ok()
    }
}
