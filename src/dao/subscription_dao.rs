use super::cache::{self, Cache};
use super::store::Store;
use crate::constants;
use crate::model::subscription::{SubscribableKind, Subscription, SubscriptionTarget};
use crate::types::error::{Error, Result};
use crate::utils::now_millis;
use std::convert::TryFrom;
use std::sync::Arc;

pub fn user_subscriptions_prefix(user_id: i64) -> String {
    format!("{}{}:", constants::USER_SUBSCRIPTIONS_KEY, user_id)
}

pub fn user_subscriptions_key(user_id: i64, kind: Option<SubscribableKind>) -> String {
    match kind {
        None => format!("{}all", user_subscriptions_prefix(user_id)),
        Some(k) => format!("{}type:{}", user_subscriptions_prefix(user_id), k as i32),
    }
}

pub fn subscription_check_key(user_id: i64, target: SubscriptionTarget) -> String {
    format!(
        "{}{}:{}:{}",
        constants::SUBSCRIPTION_CHECK_KEY,
        user_id,
        target.kind() as i32,
        target.id()
    )
}

pub fn subscribers_key(target: SubscriptionTarget) -> String {
    format!(
        "{}{}:{}",
        constants::SUBSCRIBERS_KEY,
        target.kind() as i32,
        target.id()
    )
}

/// Parses the raw `(type, id)` pair clients send.
pub fn parse_target(kind: i32, id: i64) -> Result<SubscriptionTarget> {
    let kind = SubscribableKind::try_from(kind)
        .map_err(|_| Error::bad_request("subscribable type must be 1 (topic) or 2 (module)"))?;
    Ok(SubscriptionTarget::new(kind, id))
}

/// Who follows what. Reads go through the cache; every write clears the views it changes
/// before returning.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
}

impl SubscriptionRegistry {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn Cache>) -> Self {
        Self { store, cache }
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<Subscription>> {
        self.list_cached(user_id, None, constants::USER_SUBSCRIPTIONS_TTL)
            .await
    }

    pub async fn list_by_type(&self, user_id: i64, kind: SubscribableKind) -> Result<Vec<Subscription>> {
        self.list_cached(user_id, Some(kind), constants::SUBSCRIPTION_CHECK_TTL)
            .await
    }

    async fn list_cached(
        &self,
        user_id: i64,
        kind: Option<SubscribableKind>,
        ttl: std::time::Duration,
    ) -> Result<Vec<Subscription>> {
        let key = user_subscriptions_key(user_id, kind);
        if let Some(v) = cache::get_as(self.cache.as_ref(), &key).await {
            return Ok(v);
        }
        let v = self.store.list_subscriptions(user_id, kind).await?;
        cache::set_as(self.cache.as_ref(), &key, &v, ttl).await;
        Ok(v)
    }

    pub async fn is_subscribed(&self, user_id: i64, target: SubscriptionTarget) -> Result<bool> {
        let key = subscription_check_key(user_id, target);
        if let Some(v) = cache::get_as(self.cache.as_ref(), &key).await {
            return Ok(v);
        }
        let v = self.store.find_subscription(user_id, target).await?.is_some();
        cache::set_as(self.cache.as_ref(), &key, &v, constants::SUBSCRIPTION_CHECK_TTL).await;
        Ok(v)
    }

    /// Idempotent: an existing row comes back unchanged.
    pub async fn subscribe(&self, user_id: i64, target: SubscriptionTarget) -> Result<Subscription> {
        if let Some(existing) = self.store.find_subscription(user_id, target).await? {
            return Ok(existing);
        }
        self.ensure_target(target).await?;
        let s = self
            .store
            .upsert_subscription(user_id, target, now_millis())
            .await?;
        self.invalidate(user_id, target).await;
        tracing::info!("user {} subscribed to {:?}", user_id, target);
        Ok(s)
    }

    /// `false` when there was nothing to remove.
    pub async fn unsubscribe(&self, user_id: i64, target: SubscriptionTarget) -> Result<bool> {
        if !self.store.delete_subscription(user_id, target).await? {
            return Ok(false);
        }
        self.invalidate(user_id, target).await;
        tracing::info!("user {} unsubscribed from {:?}", user_id, target);
        Ok(true)
    }

    /// Distinct non-zero user ids following `target`.
    pub async fn subscribers(&self, target: SubscriptionTarget) -> Result<Vec<i64>> {
        let key = subscribers_key(target);
        if let Some(v) = cache::get_as(self.cache.as_ref(), &key).await {
            return Ok(v);
        }
        let mut v = self.store.list_subscribers(target).await?;
        v.retain(|id| *id > 0);
        v.sort_unstable();
        v.dedup();
        cache::set_as(self.cache.as_ref(), &key, &v, constants::SUBSCRIBERS_TTL).await;
        Ok(v)
    }

    async fn ensure_target(&self, target: SubscriptionTarget) -> Result<()> {
        let exists = match target {
            SubscriptionTarget::Topic(id) => self.store.get_post(id).await?.is_some(),
            SubscriptionTarget::Module(id) => self.store.get_module(id).await?.is_some(),
        };
        if !exists {
            return Err(Error::not_found(
                format!("{} {} does not exist", target.kind().name(), target.id()).as_str(),
            ));
        }
        Ok(())
    }

    async fn invalidate(&self, user_id: i64, target: SubscriptionTarget) {
        self.cache
            .remove_by_prefix(&user_subscriptions_prefix(user_id))
            .await;
        self.cache
            .remove(&subscription_check_key(user_id, target))
            .await;
        self.cache.remove(&subscribers_key(target)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::fixtures::Fixture;
    use crate::model::user::AccessLevel;

    #[tokio::test]
    async fn subscribe_twice_yields_one_row() {
        let fx = Fixture::new();
        let u = fx.user("Ada", AccessLevel::Student);
        let topic = fx.topic(u.user_id, "Recursion", None).await;
        let target = SubscriptionTarget::Topic(topic.post_id);

        let first = fx.state.subscriptions.subscribe(u.user_id, target).await.unwrap();
        let second = fx.state.subscriptions.subscribe(u.user_id, target).await.unwrap();
        assert_eq!(first.subscription_id, second.subscription_id);
        assert_eq!(fx.state.subscriptions.list(u.user_id).await.unwrap().len(), 1);
        assert_eq!(
            fx.state.subscriptions.subscribers(target).await.unwrap(),
            vec![u.user_id]
        );
    }

    #[tokio::test]
    async fn unsubscribe_clears_cached_answers() {
        let fx = Fixture::new();
        let u = fx.user("Ada", AccessLevel::Student);
        let module = fx.module("Algorithms").await;
        let target = SubscriptionTarget::Module(module.module_id);
        let reg = &fx.state.subscriptions;

        reg.subscribe(u.user_id, target).await.unwrap();
        // warm every cached view
        assert!(reg.is_subscribed(u.user_id, target).await.unwrap());
        assert_eq!(reg.list(u.user_id).await.unwrap().len(), 1);
        assert_eq!(
            reg.list_by_type(u.user_id, SubscribableKind::Module).await.unwrap().len(),
            1
        );
        assert_eq!(reg.subscribers(target).await.unwrap(), vec![u.user_id]);

        assert!(reg.unsubscribe(u.user_id, target).await.unwrap());
        assert!(!reg.is_subscribed(u.user_id, target).await.unwrap());
        assert!(reg.list(u.user_id).await.unwrap().is_empty());
        assert!(reg
            .list_by_type(u.user_id, SubscribableKind::Module)
            .await
            .unwrap()
            .is_empty());
        assert!(reg.subscribers(target).await.unwrap().is_empty());
        assert!(!reg.unsubscribe(u.user_id, target).await.unwrap());
    }

    #[tokio::test]
    async fn subscribe_sees_fresh_state_after_cached_false() {
        let fx = Fixture::new();
        let u = fx.user("Ada", AccessLevel::Student);
        let module = fx.module("Databases").await;
        let target = SubscriptionTarget::Module(module.module_id);
        let reg = &fx.state.subscriptions;
        assert!(!reg.is_subscribed(u.user_id, target).await.unwrap());
        reg.subscribe(u.user_id, target).await.unwrap();
        assert!(reg.is_subscribed(u.user_id, target).await.unwrap());
    }

    #[tokio::test]
    async fn missing_targets_and_bad_types_are_rejected() {
        let fx = Fixture::new();
        let u = fx.user("Ada", AccessLevel::Student);
        let err = fx
            .state
            .subscriptions
            .subscribe(u.user_id, SubscriptionTarget::Module(404))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        let err = fx
            .state
            .subscriptions
            .subscribe(u.user_id, SubscriptionTarget::Topic(405))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(parse_target(3, 1).is_err());
        assert_eq!(parse_target(2, 9).unwrap(), SubscriptionTarget::Module(9));
    }
}
