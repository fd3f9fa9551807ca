//! TTL response cache for the POST endpoints.
//!
//! Backed by Redis when `REDIS_URL` is reachable, otherwise by a process-local
//! map. Cached bodies contain clinical text, so they are stored encrypted with
//! the field cipher and keyed by a SHA-256 of route and request body.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};

use crate::crypto::FieldCipher;

pub const TRIAGE_TTL: Duration = Duration::from_secs(60);
pub const NOTE_TTL: Duration = Duration::from_secs(300);

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const KEY_PREFIX: &str = "er-suite:cache:";
const MEMORY_SWEEP_THRESHOLD: usize = 1000;

#[derive(Clone)]
enum Backend {
    Memory(Arc<Mutex<HashMap<String, (Instant, String)>>>),
    Redis(ConnectionManager),
}

#[derive(Clone)]
pub struct ResponseCache {
    backend: Backend,
    cipher: Arc<FieldCipher>,
}

impl ResponseCache {
    pub fn in_memory(cipher: Arc<FieldCipher>) -> Self {
        Self {
            backend: Backend::Memory(Arc::new(Mutex::new(HashMap::new()))),
            cipher,
        }
    }

    /// Connect to Redis, falling back to memory when the URL is absent or
    /// the server cannot be reached.
    pub async fn connect(redis_url: Option<&str>, cipher: Arc<FieldCipher>) -> Self {
        let Some(url) = redis_url else {
            tracing::info!("No REDIS_URL configured, using in-memory response cache");
            return Self::in_memory(cipher);
        };

        match open_redis(url).await {
            Ok(manager) => {
                tracing::info!("Connected to Redis response cache");
                Self {
                    backend: Backend::Redis(manager),
                    cipher,
                }
            }
            Err(reason) => {
                tracing::warn!(%reason, "Redis unavailable, using in-memory response cache");
                Self::in_memory(cipher)
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Memory(_) => "memory",
            Backend::Redis(_) => "redis",
        }
    }

    /// Cache key for a route and its raw request body.
    pub fn key_for(route: &str, body: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(route.as_bytes());
        hasher.update([0u8]);
        hasher.update(body);
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        format!("{KEY_PREFIX}{hex}")
    }

    /// Cached body for `key`. Backend or decryption failures count as a miss.
    pub async fn get(&self, key: &str) -> Option<String> {
        let stored = match &self.backend {
            Backend::Memory(map) => {
                let mut map = map.lock().ok()?;
                match map.get(key) {
                    Some((expires, value)) if *expires > Instant::now() => Some(value.clone()),
                    Some(_) => {
                        map.remove(key);
                        None
                    }
                    None => None,
                }
            }
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                match conn.get::<_, Option<String>>(key).await {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::warn!(error = %e, "Redis cache read failed");
                        None
                    }
                }
            }
        }?;

        match self.cipher.decrypt_field(&stored) {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding undecryptable cache entry");
                None
            }
        }
    }

    pub async fn put(&self, key: &str, body: &str, ttl: Duration) {
        let sealed = match self.cipher.encrypt_field(body) {
            Ok(sealed) => sealed,
            Err(e) => {
                tracing::warn!(error = %e, "Cache entry encryption failed, not caching");
                return;
            }
        };

        match &self.backend {
            Backend::Memory(map) => {
                let Ok(mut map) = map.lock() else { return };
                let now = Instant::now();
                if map.len() > MEMORY_SWEEP_THRESHOLD {
                    map.retain(|_, (expires, _)| *expires > now);
                }
                map.insert(key.to_string(), (now + ttl, sealed));
            }
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                if let Err(e) = conn
                    .set_ex::<_, _, ()>(key, sealed, ttl.as_secs().max(1))
                    .await
                {
                    tracing::warn!(error = %e, "Redis cache write failed");
                }
            }
        }
    }
}

async fn open_redis(url: &str) -> Result<ConnectionManager, String> {
    let client = redis::Client::open(url).map_err(|e| e.to_string())?;
    tokio::time::timeout(REDIS_CONNECT_TIMEOUT, ConnectionManager::new(client))
        .await
        .map_err(|_| "connection timed out".to_string())?
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::FieldKey;

    fn cache() -> ResponseCache {
        ResponseCache::in_memory(Arc::new(FieldCipher::new(FieldKey::generate())))
    }

    #[tokio::test]
    async fn stores_and_returns_body() {
        let cache = cache();
        let key = ResponseCache::key_for("/api/triage", b"{}");
        assert_eq!(cache.get(&key).await, None);
        cache.put(&key, r#"{"esi_level":3}"#, TRIAGE_TTL).await;
        assert_eq!(cache.get(&key).await.as_deref(), Some(r#"{"esi_level":3}"#));
    }

    #[tokio::test]
    async fn entries_expire() {
        let cache = cache();
        let key = ResponseCache::key_for("/api/triage", b"body");
        cache.put(&key, "value", Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(cache.get(&key).await, None);
    }

    #[tokio::test]
    async fn stored_value_is_encrypted() {
        let cache = cache();
        let key = ResponseCache::key_for("/api/generate-note", b"x");
        cache.put(&key, "Chest pain since morning", NOTE_TTL).await;
        let Backend::Memory(map) = &cache.backend else {
            panic!("expected memory backend");
        };
        let raw = map.lock().unwrap().get(&key).unwrap().1.clone();
        assert!(!raw.contains("Chest pain"));
    }

    #[test]
    fn keys_differ_by_route_and_body() {
        let a = ResponseCache::key_for("/api/triage", b"{\"a\":1}");
        let b = ResponseCache::key_for("/api/generate-note", b"{\"a\":1}");
        let c = ResponseCache::key_for("/api/triage", b"{\"a\":2}");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with(KEY_PREFIX));
        assert_eq!(a.len(), KEY_PREFIX.len() + 64);
    }

    #[tokio::test]
    async fn missing_redis_url_uses_memory() {
        let cipher = Arc::new(FieldCipher::new(FieldKey::generate()));
        let cache = ResponseCache::connect(None, cipher).await;
        assert_eq!(cache.backend_name(), "memory");
    }

    #[tokio::test]
    async fn unreachable_redis_falls_back_to_memory() {
        let cipher = Arc::new(FieldCipher::new(FieldKey::generate()));
        let cache = ResponseCache::connect(Some("redis://127.0.0.1:1/"), cipher).await;
        assert_eq!(cache.backend_name(), "memory");
    }
}
