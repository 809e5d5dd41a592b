use super::cache::{self, Cache};
use super::store::Store;
use crate::constants;
use crate::model::user::{AccessLevel, User};
use crate::types::error::{Error, Result};
use crate::utils::jwt::TokenCodec;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub fn user_key(user_id: i64) -> String {
    format!("{}{}", constants::USER_KEY, user_id)
}

/// Cached user lookups shared by every engine.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn Cache>) -> Self {
        Self { store, cache }
    }

    pub async fn get(&self, user_id: i64) -> Result<Option<User>> {
        let key = user_key(user_id);
        if let Some(user) = cache::get_as::<User>(self.cache.as_ref(), &key).await {
            return Ok(Some(user));
        }
        let user = self.store.get_user(user_id).await?;
        if let Some(user) = &user {
            cache::set_as(self.cache.as_ref(), &key, user, constants::USER_TTL).await;
        }
        Ok(user)
    }

    pub async fn require(&self, user_id: i64) -> Result<User> {
        self.get(user_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("user {} not found", user_id).as_str()))
    }

    /// Looks up each distinct id once; unknown ids are left out.
    pub async fn get_many(&self, ids: impl IntoIterator<Item = i64>) -> Result<HashMap<i64, User>> {
        let mut out = HashMap::new();
        for id in ids {
            if out.contains_key(&id) {
                continue;
            }
            if let Some(user) = self.get(id).await? {
                out.insert(id, user);
            }
        }
        Ok(out)
    }
}

/// Turns a bearer token into an identity. Nothing here issues tokens.
#[async_trait]
pub trait AuthResolver: Send + Sync {
    async fn resolve_user_id(&self, bearer: &str) -> Option<i64>;
    async fn access_level(&self, user_id: i64) -> Option<AccessLevel>;
}

pub struct JwtResolver {
    codec: TokenCodec,
    users: UserDirectory,
}

impl JwtResolver {
    pub fn new(codec: TokenCodec, users: UserDirectory) -> Self {
        Self { codec, users }
    }
}

#[async_trait]
impl AuthResolver for JwtResolver {
    async fn resolve_user_id(&self, bearer: &str) -> Option<i64> {
        match self.codec.decode(bearer) {
            Ok(claims) => Some(claims.id),
            Err(e) => {
                tracing::debug!("rejected bearer token: {:?}", e);
                None
            }
        }
    }

    async fn access_level(&self, user_id: i64) -> Option<AccessLevel> {
        match self.users.get(user_id).await {
            Ok(user) => user.map(|u| u.access_level),
            Err(e) => {
                tracing::warn!("access level lookup for user {}: {}", user_id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::cache::MemoryCache;
    use crate::dao::memory::MemStore;

    #[tokio::test]
    async fn resolves_token_and_level() {
        let store = Arc::new(MemStore::new());
        let tutor = store.add_user(User {
            name: "Tess".into(),
            email: "tess@campus.test".into(),
            access_level: AccessLevel::Tutor,
            ..Default::default()
        });
        let users = UserDirectory::new(store, Arc::new(MemoryCache::default()));
        let codec = TokenCodec::new("secret", 3600);
        let token = codec.issue(tutor.user_id);
        let resolver = JwtResolver::new(codec, users);

        assert_eq!(resolver.resolve_user_id(&token).await, Some(tutor.user_id));
        assert_eq!(resolver.resolve_user_id("nope").await, None);
        assert_eq!(resolver.access_level(tutor.user_id).await, Some(AccessLevel::Tutor));
        assert_eq!(resolver.access_level(999).await, None);
    }

    #[tokio::test]
    async fn lookups_are_cached() {
        let store = Arc::new(MemStore::new());
        let ada = store.add_user(User {
            name: "Ada".into(),
            ..Default::default()
        });
        let cache = Arc::new(MemoryCache::default());
        let users = UserDirectory::new(store, cache.clone());
        assert_eq!(users.require(ada.user_id).await.unwrap().name, "Ada");
        assert!(cache.get(&user_key(ada.user_id)).await.is_some());
        assert!(users.require(12345).await.unwrap_err().is_not_found());
    }
}
