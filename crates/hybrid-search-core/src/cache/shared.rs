//! Narrow abstraction over a shared, cross-instance cache/counter backend
//! (Redis in production), plus an in-memory fallback and a wrapper that
//! soft-fails from one to the other.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// The operations the cache and rate-limiter layers need from whatever is
/// backing them. Kept intentionally narrow so an in-memory and a Redis
/// implementation can both satisfy it without leaking Redis types upward.
#[async_trait]
pub trait SharedBacking: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> anyhow::Result<()>;
    async fn incr(&self, key: &str) -> anyhow::Result<i64>;
    async fn expire(&self, key: &str, ttl: Duration) -> anyhow::Result<()>;
}

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

/// Process-local backing: the degrade target when no shared backend is
/// configured, or when the shared one has started failing.
#[derive(Default)]
pub struct InMemoryBacking {
    store: Mutex<HashMap<String, Entry>>,
}

impl InMemoryBacking {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedBacking for InMemoryBacking {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let mut store = self.store.lock().unwrap();
        if let Some(entry) = store.get(key) {
            if entry.expires_at.is_some_and(|at| Instant::now() > at) {
                store.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> anyhow::Result<()> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.store.lock().unwrap().insert(
            key.to_string(),
            Entry {
                value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> anyhow::Result<i64> {
        let mut store = self.store.lock().unwrap();
        let entry = store.entry(key.to_string()).or_insert(Entry {
            value: b"0".to_vec(),
            expires_at: None,
        });
        let current: i64 = std::str::from_utf8(&entry.value)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let next = current + 1;
        entry.value = next.to_string().into_bytes();
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> anyhow::Result<()> {
        if let Some(entry) = self.store.lock().unwrap().get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }
}

/// Redis-backed implementation, for sharing cache/rate-limit state across
/// server instances.
pub struct RedisBacking {
    manager: redis::aio::ConnectionManager,
}

impl RedisBacking {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl SharedBacking for RedisBacking {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> anyhow::Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        match ttl {
            Some(d) => {
                let _: () = conn.set_ex(key, value, d.as_secs().max(1)).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn incr(&self, key: &str) -> anyhow::Result<i64> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        let value: i64 = conn.incr(key, 1).await?;
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> anyhow::Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        let _: () = conn.expire(key, ttl.as_secs() as i64).await?;
        Ok(())
    }
}

/// Wraps an optional shared backend with a local one, soft-failing from
/// shared to local the first time the shared backend errors and staying
/// local for the rest of this instance's lifetime. This mirrors the
/// fallback behavior the rate limiter and caches both need when Redis
/// becomes unreachable mid-run.
pub struct SoftFailBacking {
    shared: Option<Box<dyn SharedBacking>>,
    local: InMemoryBacking,
    degraded: AtomicBool,
}

impl SoftFailBacking {
    pub fn new(shared: Option<Box<dyn SharedBacking>>) -> Self {
        Self {
            shared,
            local: InMemoryBacking::new(),
            degraded: AtomicBool::new(false),
        }
    }

    pub fn local_only() -> Self {
        Self::new(None)
    }

    fn use_shared(&self) -> bool {
        self.shared.is_some() && !self.degraded.load(Ordering::Relaxed)
    }

    fn mark_degraded(&self) {
        self.degraded.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl SharedBacking for SoftFailBacking {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        if self.use_shared() {
            match self.shared.as_ref().unwrap().get(key).await {
                Ok(v) => return Ok(v),
                Err(_) => self.mark_degraded(),
            }
        }
        self.local.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> anyhow::Result<()> {
        if self.use_shared() {
            match self
                .shared
                .as_ref()
                .unwrap()
                .set(key, value.clone(), ttl)
                .await
            {
                Ok(()) => return Ok(()),
                Err(_) => self.mark_degraded(),
            }
        }
        self.local.set(key, value, ttl).await
    }

    async fn incr(&self, key: &str) -> anyhow::Result<i64> {
        if self.use_shared() {
            match self.shared.as_ref().unwrap().incr(key).await {
                Ok(v) => return Ok(v),
                Err(_) => self.mark_degraded(),
            }
        }
        self.local.incr(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> anyhow::Result<()> {
        if self.use_shared() {
            match self.shared.as_ref().unwrap().expire(key, ttl).await {
                Ok(()) => return Ok(()),
                Err(_) => self.mark_degraded(),
            }
        }
        self.local.expire(key, ttl).await
    }
}
