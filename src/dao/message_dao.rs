use super::notification_dao::Notifier;
use super::store::Store;
use super::user_dao::UserDirectory;
use crate::model::{
    message::{Conversation, DirectMessage, MessageView},
    notification::{NewNotification, NotificationType},
};
use crate::types::error::{Error, Result};
use crate::utils::now_millis;
use std::collections::HashMap;
use std::sync::Arc;

/// Direct messages between two users.
#[derive(Clone)]
pub struct MessageEngine {
    store: Arc<dyn Store>,
    users: UserDirectory,
    notifier: Notifier,
}

impl MessageEngine {
    pub fn new(store: Arc<dyn Store>, users: UserDirectory, notifier: Notifier) -> Self {
        Self {
            store,
            users,
            notifier,
        }
    }

    pub async fn send(
        &self,
        sender_id: i64,
        recipient_id: i64,
        content: &str,
        material_id: Option<i64>,
    ) -> Result<MessageView> {
        if content.trim().is_empty() {
            return Err(Error::bad_request("message content is required"));
        }
        if sender_id == recipient_id {
            return Err(Error::bad_request("cannot message yourself"));
        }
        let recipient = self.users.require(recipient_id).await?;
        if let Some(id) = material_id {
            if self.store.get_material(id).await?.is_none() {
                return Err(Error::not_found(format!("material {} not found", id).as_str()));
            }
        }
        let sender = self.users.get(sender_id).await?;

        let msg = self
            .store
            .insert_message(DirectMessage {
                message_id: 0,
                sender_id,
                recipient_id,
                content: content.to_string(),
                material_id,
                is_read: false,
                time_created: now_millis(),
            })
            .await?;
        tracing::debug!("message {} from {} to {}", msg.message_id, sender_id, recipient_id);

        let who = sender
            .as_ref()
            .map(|u| u.display_name())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Someone".to_string());
        let item = NewNotification::new(
            recipient_id,
            format!("New message from {}", who).as_str(),
            preview(content).as_str(),
            NotificationType::Message,
            Some(msg.message_id),
        );
        if let Err(e) = self.notifier.notify(item).await {
            tracing::warn!("message notice for message {} failed: {}", msg.message_id, e);
        }
        Ok(MessageView::project(&msg, sender.as_ref(), Some(&recipient)))
    }

    /// One entry per peer, most recent exchange first.
    pub async fn conversations(&self, user_id: i64) -> Result<Vec<Conversation>> {
        let all = self.store.messages_of(user_id).await?;
        let mut order: Vec<i64> = Vec::new();
        let mut latest: HashMap<i64, &DirectMessage> = HashMap::new();
        let mut unread: HashMap<i64, i64> = HashMap::new();
        for msg in &all {
            let peer = msg.peer_of(user_id);
            if !latest.contains_key(&peer) {
                order.push(peer);
                latest.insert(peer, msg);
            }
            if msg.recipient_id == user_id && !msg.is_read {
                *unread.entry(peer).or_insert(0) += 1;
            }
        }

        let me = self.users.get(user_id).await?;
        let mut out = Vec::with_capacity(order.len());
        for peer in order {
            let other = match self.users.get(peer).await? {
                Some(u) => u,
                None => continue,
            };
            let last = latest.get(&peer).map(|m| {
                let (sender, recipient) = if m.sender_id == user_id {
                    (me.as_ref(), Some(&other))
                } else {
                    (Some(&other), me.as_ref())
                };
                MessageView::project(m, sender, recipient)
            });
            out.push(Conversation {
                user_id: other.user_id,
                user_name: other.display_name(),
                user_email: other.email.clone(),
                last_message: last,
                unread_count: unread.get(&peer).copied().unwrap_or(0),
            });
        }
        Ok(out)
    }

    /// The whole thread, oldest first. Reading it marks the incoming side as read.
    pub async fn with_user(&self, user_id: i64, other_id: i64) -> Result<Vec<MessageView>> {
        let marked = self.store.mark_messages_read(user_id, other_id).await?;
        if marked > 0 {
            tracing::debug!("user {} read {} message(s) from {}", user_id, marked, other_id);
        }
        let thread = self.store.messages_between(user_id, other_id).await?;
        let people = self.users.get_many([user_id, other_id]).await?;
        Ok(thread
            .iter()
            .map(|m| MessageView::project(m, people.get(&m.sender_id), people.get(&m.recipient_id)))
            .collect())
    }

    /// Recipient only; anyone else gets `false`.
    pub async fn mark_read(&self, message_id: i64, user_id: i64) -> Result<bool> {
        self.store.mark_message_read(message_id, user_id).await
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<i64> {
        self.store.unread_messages(user_id).await
    }
}

fn preview(content: &str) -> String {
    const LIMIT: usize = 100;
    let content = content.trim();
    if content.chars().count() <= LIMIT {
        return content.to_string();
    }
    let cut: String = content.chars().take(LIMIT).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::fixtures::Fixture;
    use crate::model::user::AccessLevel;

    #[tokio::test]
    async fn conversation_flow() {
        let fx = Fixture::new();
        let ada = fx.user("Ada", AccessLevel::Student);
        let bob = fx.user("Bob", AccessLevel::Tutor);
        let cat = fx.user("Cat", AccessLevel::Student);
        let messages = &fx.state.messages;

        messages.send(ada.user_id, bob.user_id, "Hi Bob", None).await.unwrap();
        messages.send(ada.user_id, bob.user_id, "Are you there?", None).await.unwrap();
        let reply = messages.send(bob.user_id, ada.user_id, "Yes", None).await.unwrap();
        messages.send(cat.user_id, bob.user_id, "Hello", None).await.unwrap();
        assert_eq!(reply.sender_name, bob.display_name());

        assert_eq!(messages.unread_count(bob.user_id).await.unwrap(), 3);
        let convs = messages.conversations(bob.user_id).await.unwrap();
        assert_eq!(convs.len(), 2);
        assert_eq!(convs[0].user_id, cat.user_id);
        assert_eq!(convs[1].user_id, ada.user_id);
        assert_eq!(convs[1].unread_count, 2);
        assert_eq!(
            convs[1].last_message.as_ref().map(|m| m.content.as_str()),
            Some("Yes")
        );

        let thread = messages.with_user(bob.user_id, ada.user_id).await.unwrap();
        assert_eq!(thread.len(), 3);
        assert_eq!(thread[0].content, "Hi Bob");
        assert!(thread.iter().filter(|m| m.recipient_id == bob.user_id).all(|m| m.is_read));
        assert_eq!(messages.unread_count(bob.user_id).await.unwrap(), 1);

        let bob_notes = fx.state.notifier.list(bob.user_id, false).await.unwrap();
        assert_eq!(bob_notes.len(), 3);
        assert!(bob_notes.iter().all(|n| n.kind == NotificationType::Message));
    }

    #[tokio::test]
    async fn sending_is_checked() {
        let fx = Fixture::new();
        let ada = fx.user("Ada", AccessLevel::Student);
        let bob = fx.user("Bob", AccessLevel::Student);
        let messages = &fx.state.messages;
        assert!(messages.send(ada.user_id, 4040, "hello?", None).await.unwrap_err().is_not_found());
        assert!(messages.send(ada.user_id, bob.user_id, "   ", None).await.is_err());

        let m = messages.send(ada.user_id, bob.user_id, "ping", None).await.unwrap();
        assert!(!messages.mark_read(m.message_id, ada.user_id).await.unwrap());
        assert!(messages.mark_read(m.message_id, bob.user_id).await.unwrap());
        assert_eq!(messages.unread_count(bob.user_id).await.unwrap(), 0);
    }

    #[test]
    fn long_messages_are_trimmed_in_notices() {
        assert_eq!(preview("  short "), "short");
        let long = "y".repeat(150);
        assert_eq!(preview(&long).chars().count(), 103);
    }
}
