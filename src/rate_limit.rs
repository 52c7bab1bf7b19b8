use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Mutex;

/// Group of exchange endpoints sharing one call budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointClass {
    Public,
    Private,
}

impl EndpointClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// At most `limit` back-to-back calls, then a pause of `pause`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u32,
    pub pause: Duration,
}

impl RateLimit {
    pub fn new(limit: u32, pause: Duration) -> Self {
        Self {
            limit: limit.max(1),
            pause,
        }
    }
}

/// How a call was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    Immediate,
    AfterPause(Duration),
}

impl Permit {
    pub fn paused(&self) -> bool {
        matches!(self, Self::AfterPause(_))
    }
}

#[derive(Debug)]
struct RateLimitState {
    count: u32,
    limit: RateLimit,
}

/// Fixed-count throttle per endpoint class.
///
/// The state lock is held across the pause, so concurrent callers queue
/// behind it and the bound holds for every caller of this instance.
/// Classes with no configured limit pass straight through.
#[derive(Debug)]
pub struct RateLimiter {
    states: Mutex<HashMap<EndpointClass, RateLimitState>>,
}

impl RateLimiter {
    pub fn new(limits: impl IntoIterator<Item = (EndpointClass, RateLimit)>) -> Self {
        let states = limits
            .into_iter()
            .map(|(class, limit)| (class, RateLimitState { count: 0, limit }))
            .collect();
        Self {
            states: Mutex::new(states),
        }
    }

    /// Coinbase public endpoints: 3 calls, private: 5 calls, then a 500ms pause.
    pub fn coinbase() -> Self {
        Self::new([
            (
                EndpointClass::Public,
                RateLimit::new(3, Duration::from_millis(500)),
            ),
            (
                EndpointClass::Private,
                RateLimit::new(5, Duration::from_millis(500)),
            ),
        ])
    }

    /// Wait until a call against `class` is allowed.
    pub async fn acquire(&self, class: EndpointClass) -> Permit {
        let mut states = self.states.lock().await;
        let Some(state) = states.get_mut(&class) else {
            return Permit::Immediate;
        };

        if state.count < state.limit.limit {
            state.count += 1;
            return Permit::Immediate;
        }

        let pause = state.limit.pause;
        tracing::debug!(
            class = %class,
            limit = state.limit.limit,
            pause_ms = pause.as_millis() as u64,
            "Rate limit reached, pausing"
        );
        tokio::time::sleep(pause).await;
        // The call that waited opens the next budget.
        state.count = 1;
        Permit::AfterPause(pause)
    }

    /// Calls counted against `class` since the last pause.
    pub async fn used(&self, class: EndpointClass) -> Option<u32> {
        self.states.lock().await.get(&class).map(|s| s.count)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::coinbase()
    }
}
