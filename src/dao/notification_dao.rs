use super::store::Store;
use super::subscription_dao::SubscriptionRegistry;
use super::user_dao::UserDirectory;
use crate::model::{
    notification::{NewNotification, Notification, NotificationType},
    post::{Post, PostKind},
    subscription::SubscriptionTarget,
    user::User,
};
use crate::types::error::{Error, Result};
use crate::utils::now_millis;
use crate::utils::outbox::{EmailJob, Envelope, Outbox};
use std::sync::Arc;

fn envelope_for(user: &User, n: &Notification) -> Option<Envelope> {
    let to_address = user.email_address()?.to_string();
    Some(Envelope {
        to_address,
        to_name: user.display_name(),
        kind: n.kind,
        title: n.title.clone(),
        message: n.message.clone(),
    })
}

/// Persists notifications and hands their emails to the outbox. Email is best-effort: it is
/// scheduled after the rows are written and never fails the call.
#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn Store>,
    users: UserDirectory,
    outbox: Outbox,
}

impl Notifier {
    pub fn new(store: Arc<dyn Store>, users: UserDirectory, outbox: Outbox) -> Self {
        Self {
            store,
            users,
            outbox,
        }
    }

    pub async fn notify(&self, item: NewNotification) -> Result<Notification> {
        let stored = self
            .store
            .insert_notifications(vec![item], now_millis())
            .await?
            .pop()
            .ok_or_else(|| Error::system_error("notification was not stored"))?;

        match self.users.get(stored.user_id).await {
            Ok(Some(user)) => match envelope_for(&user, &stored) {
                Some(env) => self.outbox.post(EmailJob::Single(env)),
                None => tracing::debug!("user {} has no email address", user.user_id),
            },
            Ok(None) => tracing::warn!("notification {} for unknown user {}", stored.notification_id, stored.user_id),
            Err(e) => tracing::warn!("no email for notification {}: {}", stored.notification_id, e),
        }
        Ok(stored)
    }

    /// Writes every row in one batch and schedules one email job for the recipients that
    /// have an address. Returns how many rows were written.
    pub async fn notify_bulk(&self, items: Vec<NewNotification>) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        let stored = self.store.insert_notifications(items, now_millis()).await?;

        match self.users.get_many(stored.iter().map(|n| n.user_id).collect::<Vec<i64>>()).await {
            Ok(users) => {
                let envelopes: Vec<Envelope> = stored
                    .iter()
                    .filter_map(|n| users.get(&n.user_id).and_then(|u| envelope_for(u, n)))
                    .collect();
                tracing::info!(
                    "stored {} notification(s), emailing {}",
                    stored.len(),
                    envelopes.len()
                );
                if !envelopes.is_empty() {
                    self.outbox.post(EmailJob::Batch(envelopes));
                }
            }
            Err(e) => tracing::warn!("skipping bulk email for {} notification(s): {}", stored.len(), e),
        }
        Ok(stored.len())
    }

    pub async fn list(&self, user_id: i64, unread_only: bool) -> Result<Vec<Notification>> {
        self.store.list_notifications(user_id, unread_only).await
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<i64> {
        self.store.unread_notifications(user_id).await
    }

    pub async fn mark_read(&self, notification_id: i64, user_id: i64) -> Result<bool> {
        self.store.mark_notification_read(notification_id, user_id).await
    }

    pub async fn mark_all_read(&self, user_id: i64) -> Result<u64> {
        self.store.mark_all_notifications_read(user_id).await
    }

    pub async fn delete(&self, notification_id: i64, user_id: i64) -> Result<bool> {
        self.store.delete_notification(notification_id, user_id).await
    }

    pub async fn delete_all_read(&self, user_id: i64) -> Result<u64> {
        self.store.delete_read_notifications(user_id).await
    }
}

/// Turns new posts into notifications for whoever follows their topic or module.
#[derive(Clone)]
pub struct FanOut {
    store: Arc<dyn Store>,
    subscriptions: SubscriptionRegistry,
    notifier: Notifier,
}

impl FanOut {
    pub fn new(store: Arc<dyn Store>, subscriptions: SubscriptionRegistry, notifier: Notifier) -> Self {
        Self {
            store,
            subscriptions,
            notifier,
        }
    }

    /// Tells the followers of the comment's topic, minus its author.
    pub async fn comment_added(&self, topic_id: i64, author_id: i64) -> Result<usize> {
        let topic = match self.store.get_post(topic_id).await? {
            Some(topic) => topic,
            None => return Ok(0),
        };
        let message = format!("New comment on \"{}\"", topic.title_or("a topic"));
        let audience = self
            .audience(SubscriptionTarget::Topic(topic_id), author_id)
            .await?;
        let items = audience
            .into_iter()
            .map(|user_id| {
                NewNotification::new(
                    user_id,
                    "New comment on subscribed topic",
                    message.as_str(),
                    NotificationType::Comment,
                    Some(topic_id),
                )
            })
            .collect();
        self.notifier.notify_bulk(items).await
    }

    /// Tells the followers of the post's module, minus its author.
    pub async fn post_added(&self, post: &Post) -> Result<usize> {
        let module_id = match post.module_id {
            Some(id) => id,
            None => return Ok(0),
        };
        let module_name = match self.store.get_module(module_id).await? {
            Some(m) => m.name,
            None => return Ok(0),
        };
        let (word, kind) = match post.kind {
            PostKind::Topic => ("topic", NotificationType::NewTopic),
            _ => ("post", NotificationType::NewPost),
        };
        let title = format!("New {} in {}", word, module_name);
        let message = format!("\"{}\"", post.title_or("Untitled"));
        let audience = self
            .audience(SubscriptionTarget::Module(module_id), post.user_id)
            .await?;
        let items = audience
            .into_iter()
            .map(|user_id| {
                NewNotification::new(user_id, title.as_str(), message.as_str(), kind, Some(post.post_id))
            })
            .collect();
        self.notifier.notify_bulk(items).await
    }

    async fn audience(&self, target: SubscriptionTarget, author_id: i64) -> Result<Vec<i64>> {
        let mut users = self.subscriptions.subscribers(target).await?;
        users.retain(|id| *id != author_id);
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::fixtures::Fixture;
    use crate::model::user::AccessLevel;

    #[tokio::test]
    async fn bulk_emails_only_reachable_users() {
        let mut fx = Fixture::new();
        let mut items = Vec::new();
        for i in 0..50 {
            let user = if i % 17 == 0 {
                fx.user_without_email(format!("Quiet{}", i).as_str())
            } else {
                fx.user(format!("User{}", i).as_str(), AccessLevel::Student)
            };
            items.push(NewNotification::new(
                user.user_id,
                "Maintenance",
                "The portal is down tonight",
                NotificationType::System,
                None,
            ));
        }

        let stored = fx.state.notifier.notify_bulk(items).await.unwrap();
        assert_eq!(stored, 50);
        let jobs = fx.drain_mail();
        assert_eq!(jobs.len(), 1);
        assert!(matches!(&jobs[0], EmailJob::Batch(v) if v.len() == 47));
    }

    #[tokio::test]
    async fn single_notification_captures_recipient() {
        let mut fx = Fixture::new();
        let ada = fx.user("Ada", AccessLevel::Student);
        let n = fx
            .state
            .notifier
            .notify(NewNotification::new(
                ada.user_id,
                "Welcome",
                "Hello there",
                NotificationType::System,
                None,
            ))
            .await
            .unwrap();
        assert!(!n.is_read);
        let jobs = fx.drain_mail();
        assert_eq!(
            jobs,
            vec![EmailJob::Single(Envelope {
                to_address: ada.email.clone(),
                to_name: ada.display_name(),
                kind: NotificationType::System,
                title: "Welcome".into(),
                message: "Hello there".into(),
            })]
        );

        let quiet = fx.user_without_email("Quiet");
        fx.state
            .notifier
            .notify(NewNotification::new(quiet.user_id, "t", "m", NotificationType::System, None))
            .await
            .unwrap();
        assert!(fx.drain_mail().is_empty());
    }

    #[tokio::test]
    async fn owner_scoped_operations() {
        let fx = Fixture::new();
        let ada = fx.user("Ada", AccessLevel::Student);
        let bob = fx.user("Bob", AccessLevel::Student);
        let notifier = &fx.state.notifier;
        let n = notifier
            .notify(NewNotification::new(ada.user_id, "t", "m", NotificationType::System, None))
            .await
            .unwrap();
        notifier
            .notify(NewNotification::new(ada.user_id, "t2", "m2", NotificationType::System, None))
            .await
            .unwrap();

        assert!(!notifier.mark_read(n.notification_id, bob.user_id).await.unwrap());
        assert!(!notifier.delete(n.notification_id, bob.user_id).await.unwrap());
        assert_eq!(notifier.mark_all_read(bob.user_id).await.unwrap(), 0);
        assert_eq!(notifier.unread_count(ada.user_id).await.unwrap(), 2);

        assert!(notifier.mark_read(n.notification_id, ada.user_id).await.unwrap());
        assert_eq!(notifier.unread_count(ada.user_id).await.unwrap(), 1);
        assert_eq!(notifier.list(ada.user_id, true).await.unwrap().len(), 1);
        assert_eq!(notifier.delete_all_read(ada.user_id).await.unwrap(), 1);
        assert_eq!(notifier.mark_all_read(ada.user_id).await.unwrap(), 1);
        assert_eq!(notifier.list(ada.user_id, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn comment_reaches_followers_except_author() {
        let fx = Fixture::new();
        let a = fx.user("A", AccessLevel::Student);
        let b = fx.user("B", AccessLevel::Student);
        let c = fx.user("C", AccessLevel::Student);
        let d = fx.user("D", AccessLevel::Student);
        let topic = fx.topic(a.user_id, "Recursion", None).await;
        for u in [&a, &b, &c] {
            fx.state
                .subscriptions
                .subscribe(u.user_id, SubscriptionTarget::Topic(topic.post_id))
                .await
                .unwrap();
        }

        let sent = fx.state.fan_out.comment_added(topic.post_id, b.user_id).await.unwrap();
        assert_eq!(sent, 2);
        for (user, expected) in [(&a, 1), (&b, 0), (&c, 1), (&d, 0)] {
            let got = fx.state.notifier.list(user.user_id, false).await.unwrap();
            assert_eq!(got.len(), expected, "user {}", user.name);
            for n in got {
                assert_eq!(n.kind, NotificationType::Comment);
                assert_eq!(n.related_id, Some(topic.post_id));
                assert_eq!(n.message, "New comment on \"Recursion\"");
            }
        }
    }
}
