use super::store::*;
use crate::constants;
use crate::model::{
    material::{Material, Upload},
    message::DirectMessage,
    module::{Module, NewModule},
    notification::{NewNotification, Notification},
    post::{Post, PostKind},
    subscription::{SubscribableKind, Subscription, SubscriptionTarget},
    ticket::{QueryTicket, TicketRecord, TicketResponse, TicketStatus},
    user::User,
};
use crate::types::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    modules: BTreeMap<i64, Module>,
    posts: BTreeMap<i64, Post>,
    likes: HashSet<(i64, i64)>,
    subscriptions: BTreeMap<i64, Subscription>,
    notifications: BTreeMap<i64, Notification>,
    tickets: BTreeMap<i64, QueryTicket>,
    responses: BTreeMap<i64, TicketResponse>,
    materials: BTreeMap<i64, (Material, Vec<u8>)>,
    messages: BTreeMap<i64, DirectMessage>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn add_material(&mut self, title: &str, upload: &Upload, now: i64) -> Material {
        let m = Material {
            material_id: self.next_id(),
            title: title.to_string(),
            file_name: upload.file_name.clone(),
            file_type: upload.content_type.clone(),
            file_size: upload.bytes.len() as i64,
            time_created: now,
        };
        self.materials
            .insert(m.material_id, (m.clone(), upload.bytes.clone()));
        m
    }

    fn record(&self, ticket: &QueryTicket) -> TicketRecord {
        let responses = self
            .responses
            .values()
            .filter(|r| r.query_id == ticket.ticket_id)
            .cloned()
            .collect();
        TicketRecord::new(ticket.clone(), responses)
    }

    fn comments_of(&self, post_id: i64) -> impl Iterator<Item = &Post> {
        self.posts
            .values()
            .filter(move |p| p.kind == PostKind::Comment && p.parent_post_id == Some(post_id))
    }
}

/// Process-local backend. Every call takes the one table lock, so each check-and-set
/// below is atomic with respect to every other call.
#[derive(Default)]
pub struct MemStore {
    tables: Mutex<Tables>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| Error::system_error("memory store lock poisoned"))
    }

    #[cfg(test)]
    pub fn add_user(&self, mut user: User) -> User {
        let mut t = self.tables.lock().unwrap();
        if user.user_id == 0 {
            user.user_id = t.next_id();
        } else {
            t.next_id = t.next_id.max(user.user_id);
        }
        t.users.insert(user.user_id, user.clone());
        user
    }

    #[cfg(test)]
    pub fn material_count(&self) -> usize {
        self.tables.lock().unwrap().materials.len()
    }
}

fn newest_first<T>(mut v: Vec<T>, key: impl Fn(&T) -> (i64, i64)) -> Vec<T> {
    v.sort_by_key(|x| std::cmp::Reverse(key(x)));
    v
}

#[async_trait]
impl UserStore for MemStore {
    async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        Ok(self.tables()?.users.get(&user_id).cloned())
    }
}

#[async_trait]
impl ModuleStore for MemStore {
    async fn get_module(&self, module_id: i64) -> Result<Option<Module>> {
        Ok(self.tables()?.modules.get(&module_id).cloned())
    }

    async fn list_modules(&self) -> Result<Vec<Module>> {
        let mut v: Vec<_> = self.tables()?.modules.values().cloned().collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(v)
    }

    async fn insert_module(&self, module: NewModule) -> Result<Module> {
        let mut t = self.tables()?;
        let m = Module {
            module_id: t.next_id(),
            name: module.name,
            tag: module.tag,
            description: module.description,
        };
        t.modules.insert(m.module_id, m.clone());
        Ok(m)
    }
}

#[async_trait]
impl PostStore for MemStore {
    async fn insert_post(&self, mut post: Post) -> Result<Post> {
        let mut t = self.tables()?;
        post.post_id = t.next_id();
        t.posts.insert(post.post_id, post.clone());
        Ok(post)
    }

    async fn get_post(&self, post_id: i64) -> Result<Option<Post>> {
        Ok(self.tables()?.posts.get(&post_id).cloned())
    }

    async fn find_posts(&self, filter: PostFilter) -> Result<Vec<Post>> {
        let t = self.tables()?;
        let all = t.posts.values();
        let picked: Vec<Post> = match &filter {
            PostFilter::TopLevel => all.filter(|p| p.parent_post_id.is_none()).cloned().collect(),
            PostFilter::PostsBy(uid) => all
                .filter(|p| p.user_id == *uid && p.kind != PostKind::Comment)
                .cloned()
                .collect(),
            PostFilter::CommentsBy(uid) => all
                .filter(|p| p.user_id == *uid && p.kind == PostKind::Comment)
                .cloned()
                .collect(),
            PostFilter::CommentsOf(pid) => {
                let mut v: Vec<Post> = t.comments_of(*pid).cloned().collect();
                v.sort_by_key(|p| (p.time_created, p.post_id));
                return Ok(v);
            }
            PostFilter::InModule(mid) => all
                .filter(|p| p.module_id == Some(*mid) && p.parent_post_id.is_none())
                .cloned()
                .collect(),
            PostFilter::LikedBy(uid) => all
                .filter(|p| t.likes.contains(&(*uid, p.post_id)))
                .cloned()
                .collect(),
            PostFilter::Search(q) => {
                let q = q.to_lowercase();
                all.filter(|p| {
                    p.content.to_lowercase().contains(&q)
                        || p.title.as_deref().map_or(false, |s| s.to_lowercase().contains(&q))
                })
                .cloned()
                .collect()
            }
        };
        Ok(newest_first(picked, |p| (p.time_created, p.post_id)))
    }

    async fn update_post(
        &self,
        post_id: i64,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Option<Post>> {
        let mut t = self.tables()?;
        Ok(t.posts.get_mut(&post_id).map(|p| {
            if let Some(title) = title {
                p.title = Some(title);
            }
            if let Some(content) = content {
                p.content = content;
            }
            p.clone()
        }))
    }

    async fn delete_post(&self, post_id: i64) -> Result<bool> {
        let mut t = self.tables()?;
        if t.posts.remove(&post_id).is_none() {
            return Ok(false);
        }
        let children: Vec<i64> = t.comments_of(post_id).map(|p| p.post_id).collect();
        for id in &children {
            t.posts.remove(id);
        }
        t.likes
            .retain(|(_, pid)| *pid != post_id && !children.contains(pid));
        Ok(true)
    }

    async fn toggle_like(&self, user_id: i64, post_id: i64, _now: i64) -> Result<bool> {
        let mut t = self.tables()?;
        if t.likes.remove(&(user_id, post_id)) {
            return Ok(false);
        }
        t.likes.insert((user_id, post_id));
        Ok(true)
    }

    async fn has_liked(&self, user_id: i64, post_id: i64) -> Result<bool> {
        Ok(self.tables()?.likes.contains(&(user_id, post_id)))
    }

    async fn like_count(&self, post_id: i64) -> Result<i64> {
        Ok(self.tables()?.likes.iter().filter(|(_, p)| *p == post_id).count() as i64)
    }

    async fn comment_count(&self, post_id: i64) -> Result<i64> {
        Ok(self.tables()?.comments_of(post_id).count() as i64)
    }
}

fn same_target(s: &Subscription, user_id: i64, target: SubscriptionTarget) -> bool {
    s.user_id == user_id && s.target() == target
}

#[async_trait]
impl SubscriptionStore for MemStore {
    async fn find_subscription(
        &self,
        user_id: i64,
        target: SubscriptionTarget,
    ) -> Result<Option<Subscription>> {
        let t = self.tables()?;
        Ok(t.subscriptions
            .values()
            .find(|s| same_target(s, user_id, target))
            .cloned())
    }

    async fn upsert_subscription(
        &self,
        user_id: i64,
        target: SubscriptionTarget,
        now: i64,
    ) -> Result<Subscription> {
        let mut t = self.tables()?;
        if let Some(s) = t
            .subscriptions
            .values()
            .find(|s| same_target(s, user_id, target))
        {
            return Ok(s.clone());
        }
        let s = Subscription {
            subscription_id: t.next_id(),
            user_id,
            subscribable_type: target.kind(),
            subscribable_id: target.id(),
            time_created: now,
        };
        t.subscriptions.insert(s.subscription_id, s.clone());
        Ok(s)
    }

    async fn delete_subscription(&self, user_id: i64, target: SubscriptionTarget) -> Result<bool> {
        let mut t = self.tables()?;
        let before = t.subscriptions.len();
        t.subscriptions.retain(|_, s| !same_target(s, user_id, target));
        Ok(t.subscriptions.len() != before)
    }

    async fn list_subscriptions(
        &self,
        user_id: i64,
        kind: Option<SubscribableKind>,
    ) -> Result<Vec<Subscription>> {
        let t = self.tables()?;
        let v = t
            .subscriptions
            .values()
            .filter(|s| s.user_id == user_id && kind.map_or(true, |k| s.subscribable_type == k))
            .cloned()
            .collect();
        Ok(newest_first(v, |s| (s.time_created, s.subscription_id)))
    }

    async fn list_subscribers(&self, target: SubscriptionTarget) -> Result<Vec<i64>> {
        let t = self.tables()?;
        let mut seen = HashSet::new();
        Ok(t.subscriptions
            .values()
            .filter(|s| s.target() == target && s.user_id > 0)
            .map(|s| s.user_id)
            .filter(|uid| seen.insert(*uid))
            .collect())
    }
}

#[async_trait]
impl NotificationStore for MemStore {
    async fn insert_notifications(
        &self,
        items: Vec<NewNotification>,
        now: i64,
    ) -> Result<Vec<Notification>> {
        let mut t = self.tables()?;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let mut n = item.into_notification(now);
            n.notification_id = t.next_id();
            t.notifications.insert(n.notification_id, n.clone());
            out.push(n);
        }
        Ok(out)
    }

    async fn list_notifications(&self, user_id: i64, unread_only: bool) -> Result<Vec<Notification>> {
        let t = self.tables()?;
        let v = t
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.is_read))
            .cloned()
            .collect();
        Ok(newest_first(v, |n| (n.time_created, n.notification_id)))
    }

    async fn unread_notifications(&self, user_id: i64) -> Result<i64> {
        let t = self.tables()?;
        Ok(t.notifications
            .values()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as i64)
    }

    async fn mark_notification_read(&self, notification_id: i64, user_id: i64) -> Result<bool> {
        let mut t = self.tables()?;
        match t.notifications.get_mut(&notification_id) {
            Some(n) if n.user_id == user_id => {
                n.is_read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_notifications_read(&self, user_id: i64) -> Result<u64> {
        let mut t = self.tables()?;
        let mut count = 0;
        for n in t.notifications.values_mut() {
            if n.user_id == user_id && !n.is_read {
                n.is_read = true;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete_notification(&self, notification_id: i64, user_id: i64) -> Result<bool> {
        let mut t = self.tables()?;
        let owned = t
            .notifications
            .get(&notification_id)
            .map_or(false, |n| n.user_id == user_id);
        if owned {
            t.notifications.remove(&notification_id);
        }
        Ok(owned)
    }

    async fn delete_read_notifications(&self, user_id: i64) -> Result<u64> {
        let mut t = self.tables()?;
        let before = t.notifications.len();
        t.notifications
            .retain(|_, n| !(n.user_id == user_id && n.is_read));
        Ok((before - t.notifications.len()) as u64)
    }
}

#[async_trait]
impl TicketStore for MemStore {
    async fn insert_ticket(
        &self,
        mut ticket: QueryTicket,
        attachment: Option<&Upload>,
    ) -> Result<(QueryTicket, Option<Material>)> {
        let mut t = self.tables()?;
        // same refusal the ticket's foreign key gives in Postgres, checked before any write
        if !t.modules.contains_key(&ticket.module_id) {
            return Err(Error::system_error(
                format!("ticket references missing module {}", ticket.module_id).as_str(),
            ));
        }
        let material =
            attachment.map(|upload| t.add_material(&upload.file_name, upload, ticket.time_created));
        ticket.material_id = material.as_ref().map(|m| m.material_id);
        ticket.ticket_id = t.next_id();
        t.tickets.insert(ticket.ticket_id, ticket.clone());
        Ok((ticket, material))
    }

    async fn get_ticket(&self, ticket_id: i64) -> Result<Option<TicketRecord>> {
        let t = self.tables()?;
        Ok(t.tickets.get(&ticket_id).map(|ticket| t.record(ticket)))
    }

    async fn find_tickets(&self, filter: TicketFilter) -> Result<Vec<TicketRecord>> {
        let t = self.tables()?;
        let v: Vec<TicketRecord> = t
            .tickets
            .values()
            .filter(|ticket| match &filter {
                TicketFilter::All => true,
                TicketFilter::Open(modules) => {
                    ticket.status == TicketStatus::Sent
                        && modules
                            .as_ref()
                            .map_or(true, |ids| ids.contains(&ticket.module_id))
                }
                TicketFilter::OwnedBy(uid) => ticket.user_id == *uid,
                TicketFilter::RespondedBy(uid) => t
                    .responses
                    .values()
                    .any(|r| r.query_id == ticket.ticket_id && r.user_id == *uid),
            })
            .map(|ticket| t.record(ticket))
            .collect();
        Ok(newest_first(v, |r| (r.ticket.time_created, r.ticket.ticket_id)))
    }

    async fn claim_ticket(&self, ticket_id: i64, tutor_id: i64, now: i64) -> Result<ClaimOutcome> {
        let mut t = self.tables()?;
        let status = match t.tickets.get(&ticket_id) {
            None => return Ok(ClaimOutcome::NotFound),
            Some(ticket) => ticket.status,
        };
        if status != TicketStatus::Sent {
            return Ok(ClaimOutcome::Rejected(status));
        }
        let response_id = t.next_id();
        t.responses.insert(
            response_id,
            TicketResponse {
                response_id,
                query_id: ticket_id,
                user_id: tutor_id,
                content: constants::CLAIM_SENTINEL.to_string(),
                material_id: None,
                time_created: now,
            },
        );
        let ticket = match t.tickets.get_mut(&ticket_id) {
            Some(ticket) => {
                ticket.status = TicketStatus::Received;
                ticket.clone()
            }
            None => return Ok(ClaimOutcome::NotFound),
        };
        Ok(ClaimOutcome::Claimed(t.record(&ticket)))
    }

    async fn respond_ticket(
        &self,
        ticket_id: i64,
        tutor_id: i64,
        content: &str,
        material_id: Option<i64>,
        now: i64,
    ) -> Result<RespondOutcome> {
        let mut t = self.tables()?;
        let ticket = match t.tickets.get(&ticket_id) {
            None => return Ok(RespondOutcome::NotFound),
            Some(ticket) => ticket.clone(),
        };
        if !t.record(&ticket).has_response_from(tutor_id) {
            return Ok(RespondOutcome::NotClaimedByCaller(ticket.status));
        }
        let response_id = t.next_id();
        t.responses.insert(
            response_id,
            TicketResponse {
                response_id,
                query_id: ticket_id,
                user_id: tutor_id,
                content: content.to_string(),
                material_id,
                time_created: now,
            },
        );
        let ticket = match t.tickets.get_mut(&ticket_id) {
            Some(ticket) => {
                ticket.status = TicketStatus::Responded;
                ticket.clone()
            }
            None => return Ok(RespondOutcome::NotFound),
        };
        Ok(RespondOutcome::Responded(t.record(&ticket)))
    }
}

#[async_trait]
impl MaterialStore for MemStore {
    async fn insert_material(&self, title: &str, upload: &Upload, now: i64) -> Result<Material> {
        Ok(self.tables()?.add_material(title, upload, now))
    }

    async fn get_material(&self, material_id: i64) -> Result<Option<Material>> {
        Ok(self.tables()?.materials.get(&material_id).map(|(m, _)| m.clone()))
    }

    async fn fetch_material(&self, material_id: i64) -> Result<Option<(Material, Vec<u8>)>> {
        Ok(self.tables()?.materials.get(&material_id).cloned())
    }
}

#[async_trait]
impl MessageStore for MemStore {
    async fn insert_message(&self, mut message: DirectMessage) -> Result<DirectMessage> {
        let mut t = self.tables()?;
        message.message_id = t.next_id();
        t.messages.insert(message.message_id, message.clone());
        Ok(message)
    }

    async fn messages_of(&self, user_id: i64) -> Result<Vec<DirectMessage>> {
        let t = self.tables()?;
        let v = t
            .messages
            .values()
            .filter(|m| m.sender_id == user_id || m.recipient_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(v, |m| (m.time_created, m.message_id)))
    }

    async fn messages_between(&self, user_id: i64, other_id: i64) -> Result<Vec<DirectMessage>> {
        let t = self.tables()?;
        let mut v: Vec<DirectMessage> = t
            .messages
            .values()
            .filter(|m| {
                (m.sender_id == user_id && m.recipient_id == other_id)
                    || (m.sender_id == other_id && m.recipient_id == user_id)
            })
            .cloned()
            .collect();
        v.sort_by_key(|m| (m.time_created, m.message_id));
        Ok(v)
    }

    async fn mark_messages_read(&self, recipient_id: i64, sender_id: i64) -> Result<u64> {
        let mut t = self.tables()?;
        let mut count = 0;
        for m in t.messages.values_mut() {
            if m.recipient_id == recipient_id && m.sender_id == sender_id && !m.is_read {
                m.is_read = true;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn mark_message_read(&self, message_id: i64, recipient_id: i64) -> Result<bool> {
        let mut t = self.tables()?;
        match t.messages.get_mut(&message_id) {
            Some(m) if m.recipient_id == recipient_id => {
                m.is_read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn unread_messages(&self, user_id: i64) -> Result<i64> {
        let t = self.tables()?;
        Ok(t.messages
            .values()
            .filter(|m| m.recipient_id == user_id && !m.is_read)
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::post::NewPost;

    #[tokio::test]
    async fn upsert_keeps_one_row() {
        let store = MemStore::new();
        let a = store
            .upsert_subscription(1, SubscriptionTarget::Topic(4), 10)
            .await
            .unwrap();
        let b = store
            .upsert_subscription(1, SubscriptionTarget::Topic(4), 20)
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(store.list_subscriptions(1, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_post_drops_comments_and_likes() {
        let store = MemStore::new();
        let post = store
            .insert_post(NewPost::post("t", "body", None).into_post(1, 1))
            .await
            .unwrap();
        let comment = store
            .insert_post(NewPost::comment(post.post_id, "hi").into_post(2, 2))
            .await
            .unwrap();
        assert!(store.toggle_like(2, post.post_id, 3).await.unwrap());
        assert!(store.toggle_like(1, comment.post_id, 3).await.unwrap());
        assert_eq!(store.comment_count(post.post_id).await.unwrap(), 1);

        assert!(store.delete_post(post.post_id).await.unwrap());
        assert!(store.get_post(comment.post_id).await.unwrap().is_none());
        assert_eq!(store.like_count(comment.post_id).await.unwrap(), 0);
        assert!(!store.delete_post(post.post_id).await.unwrap());
    }

    #[tokio::test]
    async fn like_toggles() {
        let store = MemStore::new();
        assert!(store.toggle_like(1, 9, 0).await.unwrap());
        assert!(store.has_liked(1, 9).await.unwrap());
        assert!(!store.toggle_like(1, 9, 0).await.unwrap());
        assert_eq!(store.like_count(9).await.unwrap(), 0);
    }

    fn ticket_for(module_id: i64) -> QueryTicket {
        QueryTicket {
            ticket_id: 0,
            user_id: 1,
            module_id,
            title: "Lab".to_string(),
            content: "help".to_string(),
            status: TicketStatus::Sent,
            material_id: None,
            time_created: 5,
        }
    }

    #[tokio::test]
    async fn failed_ticket_insert_keeps_no_attachment() {
        let store = MemStore::new();
        let upload = Upload::new("notes.pdf", "application/pdf", b"%PDF".to_vec());
        assert!(store.insert_ticket(ticket_for(77), Some(&upload)).await.is_err());
        assert_eq!(store.material_count(), 0);

        let module = store
            .insert_module(NewModule {
                name: "Maths".to_string(),
                tag: None,
                description: None,
            })
            .await
            .unwrap();
        let (ticket, material) = store
            .insert_ticket(ticket_for(module.module_id), Some(&upload))
            .await
            .unwrap();
        let material = material.unwrap();
        assert_eq!(ticket.material_id, Some(material.material_id));
        assert_eq!(material.file_size, 4);
        assert_eq!(store.material_count(), 1);
    }
}
