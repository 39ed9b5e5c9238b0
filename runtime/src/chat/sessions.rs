use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info};
use uuid::Uuid;

use super::generator::{ConversationalGenerator, GeneratorBuilder};

pub type SharedGenerator = Arc<Mutex<ConversationalGenerator>>;

/// Lifetime policy for conversations. `0` disables the corresponding bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions untouched for this long are dropped by the sweeper.
    pub idle_ttl_secs: u64,
    /// Creating a session beyond this count drops the least recently used one.
    pub max_sessions: usize,
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 1800,
            max_sessions: 1000,
            sweep_interval_secs: 60,
        }
    }
}

impl SessionConfig {
    fn idle_ttl(&self) -> Option<Duration> {
        (self.idle_ttl_secs > 0).then(|| Duration::from_secs(self.idle_ttl_secs))
    }
}

struct Session {
    generator: SharedGenerator,
    last_used: Instant,
}

/// One generator per conversation. The per-session mutex keeps at most one
/// request in flight for a given session, so history appends never race.
pub struct SessionRegistry {
    template: GeneratorBuilder,
    config: SessionConfig,
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionRegistry {
    pub fn new(template: GeneratorBuilder, config: SessionConfig) -> Self {
        Self {
            template,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self) -> (Uuid, SharedGenerator) {
        let id = Uuid::new_v4();
        let generator = Arc::new(Mutex::new(self.template.build()));

        let mut sessions = self.sessions.write().await;
        if self.config.max_sessions > 0 && sessions.len() >= self.config.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, session)| session.last_used)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                info!(session_id = %oldest, "session limit reached, dropped least recently used");
            }
        }
        sessions.insert(
            id,
            Session {
                generator: generator.clone(),
                last_used: Instant::now(),
            },
        );
        info!(session_id = %id, "session created");
        (id, generator)
    }

    /// Looks a session up and marks it as used.
    pub async fn get(&self, id: &Uuid) -> Option<SharedGenerator> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id)?;
        session.last_used = Instant::now();
        Some(session.generator.clone())
    }

    pub async fn remove(&self, id: &Uuid) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now()).await
    }

    /// Drops sessions idle for at least the TTL as of `now`. A request that
    /// already holds a session keeps its generator alive until it finishes.
    pub async fn evict_idle_at(&self, now: Instant) -> usize {
        let Some(ttl) = self.config.idle_ttl() else {
            return 0;
        };
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| now.saturating_duration_since(session.last_used) < ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "idle sessions evicted");
        }
        evicted
    }

    /// Periodic idle sweep. `None` when no TTL is configured.
    pub fn spawn_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        self.config.idle_ttl()?;
        let every = Duration::from_secs(self.config.sweep_interval_secs.max(1));
        let registry = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = registry.evict_idle().await;
                debug!(evicted, "session sweep");
            }
        }))
    }
}
