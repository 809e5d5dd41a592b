use super::redis_db::{self, RedisPool};
use crate::constants;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Read-through cache over JSON values. Never authoritative: backend failures read as a
/// miss and writes that fail are dropped.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Json>;
    async fn set(&self, key: &str, value: Json, ttl: Duration);
    async fn remove(&self, key: &str);
    /// Removes every tracked key starting with `prefix`.
    async fn remove_by_prefix(&self, prefix: &str);
}

pub async fn get_as<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    let v = cache.get(key).await?;
    match serde_json::from_value(v) {
        Ok(x) => Some(x),
        Err(e) => {
            tracing::warn!("dropping undecodable cache entry {}: {}", key, e);
            cache.remove(key).await;
            None
        }
    }
}

pub async fn set_as<T: Serialize>(cache: &dyn Cache, key: &str, value: &T, ttl: Duration) {
    match serde_json::to_value(value) {
        Ok(v) => cache.set(key, v, ttl).await,
        Err(e) => tracing::warn!("not caching {}: {}", key, e),
    }
}

struct Entry {
    value: Json,
    deadline: Instant,
    last_access: Instant,
}

impl Entry {
    fn alive(&self, now: Instant, sliding: Duration) -> bool {
        now < self.deadline && now < self.last_access + sliding
    }
}

/// In-process cache. An entry lives until its absolute deadline, but only while it keeps
/// being read: one left untouched for a full sliding window is dropped early.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    /// Live keys, for prefix removal. Lock order: `entries` then `keys`.
    keys: Mutex<HashSet<String>>,
    sliding: Duration,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(constants::DEFAULT_SLIDING_WINDOW)
    }
}

impl MemoryCache {
    pub fn new(sliding: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            keys: Mutex::new(HashSet::new()),
            sliding,
        }
    }

    fn untrack(&self, keys: &[String]) {
        if let Ok(mut tracked) = self.keys.lock() {
            for k in keys {
                tracked.remove(k);
            }
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.keys.lock().unwrap().len()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Json> {
        let now = Instant::now();
        let mut entries = self.entries.lock().ok()?;
        let e = entries.get_mut(key)?;
        if e.alive(now, self.sliding) {
            e.last_access = now;
            return Some(e.value.clone());
        }
        entries.remove(key);
        self.untrack(&[key.to_string()]);
        None
    }

    async fn set(&self, key: &str, value: Json, ttl: Duration) {
        let now = Instant::now();
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(_) => return,
        };
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, e)| !e.alive(now, self.sliding))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &stale {
            entries.remove(k);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                deadline: now + ttl,
                last_access: now,
            },
        );
        if let Ok(mut tracked) = self.keys.lock() {
            for k in &stale {
                tracked.remove(k);
            }
            tracked.insert(key.to_string());
        }
    }

    async fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
            self.untrack(&[key.to_string()]);
        }
    }

    async fn remove_by_prefix(&self, prefix: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            let matched: Vec<String> = match self.keys.lock() {
                Ok(tracked) => tracked
                    .iter()
                    .filter(|k| k.starts_with(prefix))
                    .cloned()
                    .collect(),
                Err(_) => return,
            };
            for k in &matched {
                entries.remove(k);
            }
            self.untrack(&matched);
        }
    }
}

const TRACKED_KEYS: &str = "cache:keys";

#[derive(Serialize, Deserialize)]
struct Envelope {
    value: Json,
    /// Absolute deadline, unix millis.
    deadline: i64,
}

/// Redis-backed cache. The sliding window is the Redis TTL, refreshed on every hit and
/// capped by the absolute deadline stored next to the value. Live keys are tracked in a
/// Redis set so any instance can run prefix removal.
pub struct RedisCache {
    pool: RedisPool,
    sliding: Duration,
}

impl RedisCache {
    pub fn new(pool: RedisPool, sliding: Duration) -> Self {
        Self { pool, sliding }
    }

    fn window_ms(&self, deadline: i64, now: i64) -> u64 {
        let remaining = (deadline - now).max(0) as u64;
        remaining.min(self.sliding.as_millis() as u64)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Option<Json> {
        let raw = match redis_db::get(&self.pool, key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                // expired by Redis itself; forget it in the index too
                let keys = [key.to_string()];
                if let Err(e) = redis_db::srem(&self.pool, TRACKED_KEYS, &keys).await {
                    tracing::warn!("cache untrack {}: {}", key, e);
                }
                return None;
            }
            Err(e) => {
                tracing::warn!("cache get {}: {}", key, e);
                return None;
            }
        };
        let env: Envelope = serde_json::from_str(raw.as_str()).ok()?;
        let now = chrono::Utc::now().timestamp_millis();
        let window = self.window_ms(env.deadline, now);
        if window == 0 {
            self.remove(key).await;
            return None;
        }
        if let Err(e) = redis_db::pexpire(&self.pool, key, window).await {
            tracing::warn!("cache touch {}: {}", key, e);
        }
        Some(env.value)
    }

    async fn set(&self, key: &str, value: Json, ttl: Duration) {
        let now = chrono::Utc::now().timestamp_millis();
        let env = Envelope {
            value,
            deadline: now + ttl.as_millis() as i64,
        };
        let body = match serde_json::to_string(&env) {
            Ok(body) => body,
            Err(_) => return,
        };
        let window = self.window_ms(env.deadline, now);
        let res = async {
            redis_db::set_px(&self.pool, key, body.as_str(), window).await?;
            redis_db::sadd(&self.pool, TRACKED_KEYS, key).await
        };
        if let Err(e) = res.await {
            tracing::warn!("cache set {}: {}", key, e);
        }
    }

    async fn remove(&self, key: &str) {
        let keys = [key.to_string()];
        let res = async {
            redis_db::del(&self.pool, &keys).await?;
            redis_db::srem(&self.pool, TRACKED_KEYS, &keys).await
        };
        if let Err(e) = res.await {
            tracing::warn!("cache remove {}: {}", key, e);
        }
    }

    async fn remove_by_prefix(&self, prefix: &str) {
        let res = async {
            let members = redis_db::smembers(&self.pool, TRACKED_KEYS).await?;
            let live = redis_db::exists_each(&self.pool, &members).await?;
            let (doomed, untracked) = sweep_index(members, &live, prefix);
            redis_db::del(&self.pool, &doomed).await?;
            redis_db::srem(&self.pool, TRACKED_KEYS, &untracked).await
        };
        if let Err(e) = res.await {
            tracing::warn!("cache remove prefix {}: {}", prefix, e);
        }
    }
}

/// Splits the tracked key index for a prefix removal. Returns the live keys under `prefix`
/// to delete, and every member to drop from the index: those keys plus any whose value
/// Redis has already expired.
fn sweep_index(members: Vec<String>, live: &[bool], prefix: &str) -> (Vec<String>, Vec<String>) {
    let mut doomed = Vec::new();
    let mut untracked = Vec::new();
    for (key, alive) in members.into_iter().zip(live.iter().copied()) {
        if alive && key.starts_with(prefix) {
            doomed.push(key.clone());
            untracked.push(key);
        } else if !alive {
            untracked.push(key);
        }
    }
    (doomed, untracked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MIN: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn hot_key_lives_until_deadline() {
        let cache = MemoryCache::new(MIN);
        cache.set("k", json!(1), 5 * MIN).await;
        for _ in 0..4 {
            tokio::time::advance(Duration::from_secs(50)).await;
            assert_eq!(cache.get("k").await, Some(json!(1)));
        }
        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(cache.get("k").await, Some(json!(1)));
        // read 55s ago, still inside the window, but past the absolute deadline
        tokio::time::advance(Duration::from_secs(55)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_key_slides_out() {
        let cache = MemoryCache::new(MIN);
        cache.set("k", json!("v"), 5 * MIN).await;
        tokio::time::advance(MIN + Duration::from_secs(1)).await;
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.tracked(), 0);
    }

    #[tokio::test]
    async fn prefix_removal_leaves_neighbours() {
        let cache = MemoryCache::default();
        cache.set("user_subscriptions:1:all", json!([]), MIN).await;
        cache.set("user_subscriptions:1:type:2", json!([]), MIN).await;
        cache.set("user_subscriptions:12:all", json!([]), MIN).await;
        cache.set("subscribers:2:5", json!([1]), MIN).await;

        cache.remove_by_prefix("user_subscriptions:1:").await;

        assert_eq!(cache.get("user_subscriptions:1:all").await, None);
        assert_eq!(cache.get("user_subscriptions:1:type:2").await, None);
        assert!(cache.get("user_subscriptions:12:all").await.is_some());
        assert!(cache.get("subscribers:2:5").await.is_some());
        assert_eq!(cache.tracked(), 2);
    }

    #[tokio::test]
    async fn typed_helpers_round_trip() {
        let cache = MemoryCache::default();
        set_as(&cache, "ids", &vec![3i64, 4], MIN).await;
        assert_eq!(get_as::<Vec<i64>>(&cache, "ids").await, Some(vec![3, 4]));
        // wrong shape reads as a miss and evicts
        assert_eq!(get_as::<String>(&cache, "ids").await, None);
        assert_eq!(cache.get("ids").await, None);
    }

    #[test]
    fn prefix_sweep_also_untracks_expired_keys() {
        let members = vec![
            "user_subscriptions:1:all".to_string(),
            "user_subscriptions:1:type:2".to_string(),
            "subscribers:2:5".to_string(),
            "user_subscriptions:12:all".to_string(),
        ];
        let live = [true, false, false, true];
        let (doomed, untracked) = sweep_index(members, &live, "user_subscriptions:1:");
        assert_eq!(doomed, vec!["user_subscriptions:1:all".to_string()]);
        assert_eq!(
            untracked,
            vec![
                "user_subscriptions:1:all".to_string(),
                "user_subscriptions:1:type:2".to_string(),
                "subscribers:2:5".to_string(),
            ]
        );
    }
}
