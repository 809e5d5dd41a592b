use crate::model::{
    material::{Material, Upload},
    message::DirectMessage,
    module::{Module, NewModule},
    notification::{NewNotification, Notification},
    post::Post,
    subscription::{SubscribableKind, Subscription, SubscriptionTarget},
    ticket::{QueryTicket, TicketRecord, TicketStatus},
    user::User,
};
use crate::types::error::Result;
use async_trait::async_trait;

/// Which posts a listing wants. Comment threads come back oldest first, everything else
/// newest first.
#[derive(Debug, Clone, PartialEq)]
pub enum PostFilter {
    TopLevel,
    PostsBy(i64),
    CommentsBy(i64),
    CommentsOf(i64),
    InModule(i64),
    LikedBy(i64),
    Search(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TicketFilter {
    All,
    /// Unclaimed tickets, optionally limited to some modules.
    Open(Option<Vec<i64>>),
    OwnedBy(i64),
    /// Tickets carrying at least one response row by this user.
    RespondedBy(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed(TicketRecord),
    NotFound,
    /// The ticket had left `Sent` before the claim landed.
    Rejected(TicketStatus),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RespondOutcome {
    Responded(TicketRecord),
    NotFound,
    /// Caller holds no response row on the ticket; carries the status seen under lock.
    NotClaimedByCaller(TicketStatus),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, user_id: i64) -> Result<Option<User>>;
}

#[async_trait]
pub trait ModuleStore: Send + Sync {
    async fn get_module(&self, module_id: i64) -> Result<Option<Module>>;
    async fn list_modules(&self) -> Result<Vec<Module>>;
    async fn insert_module(&self, module: NewModule) -> Result<Module>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn insert_post(&self, post: Post) -> Result<Post>;
    async fn get_post(&self, post_id: i64) -> Result<Option<Post>>;
    async fn find_posts(&self, filter: PostFilter) -> Result<Vec<Post>>;
    /// `None` fields are left untouched.
    async fn update_post(
        &self,
        post_id: i64,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Option<Post>>;
    /// Removes the post with its comments and likes.
    async fn delete_post(&self, post_id: i64) -> Result<bool>;
    /// Flips the like atomically; returns whether the post is liked afterwards.
    async fn toggle_like(&self, user_id: i64, post_id: i64, now: i64) -> Result<bool>;
    async fn has_liked(&self, user_id: i64, post_id: i64) -> Result<bool>;
    async fn like_count(&self, post_id: i64) -> Result<i64>;
    async fn comment_count(&self, post_id: i64) -> Result<i64>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn find_subscription(
        &self,
        user_id: i64,
        target: SubscriptionTarget,
    ) -> Result<Option<Subscription>>;
    /// Inserts unless the row exists; either way returns the stored row.
    async fn upsert_subscription(
        &self,
        user_id: i64,
        target: SubscriptionTarget,
        now: i64,
    ) -> Result<Subscription>;
    async fn delete_subscription(&self, user_id: i64, target: SubscriptionTarget) -> Result<bool>;
    async fn list_subscriptions(
        &self,
        user_id: i64,
        kind: Option<SubscribableKind>,
    ) -> Result<Vec<Subscription>>;
    async fn list_subscribers(&self, target: SubscriptionTarget) -> Result<Vec<i64>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notifications(
        &self,
        items: Vec<NewNotification>,
        now: i64,
    ) -> Result<Vec<Notification>>;
    async fn list_notifications(&self, user_id: i64, unread_only: bool) -> Result<Vec<Notification>>;
    async fn unread_notifications(&self, user_id: i64) -> Result<i64>;
    async fn mark_notification_read(&self, notification_id: i64, user_id: i64) -> Result<bool>;
    async fn mark_all_notifications_read(&self, user_id: i64) -> Result<u64>;
    async fn delete_notification(&self, notification_id: i64, user_id: i64) -> Result<bool>;
    async fn delete_read_notifications(&self, user_id: i64) -> Result<u64>;
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Writes the attachment (if any) and the ticket pointing at it as one unit: either both
    /// rows exist afterwards or neither does.
    async fn insert_ticket(
        &self,
        ticket: QueryTicket,
        attachment: Option<&Upload>,
    ) -> Result<(QueryTicket, Option<Material>)>;
    async fn get_ticket(&self, ticket_id: i64) -> Result<Option<TicketRecord>>;
    async fn find_tickets(&self, filter: TicketFilter) -> Result<Vec<TicketRecord>>;
    /// `Sent -> Received` plus the claim marker, as one step.
    async fn claim_ticket(&self, ticket_id: i64, tutor_id: i64, now: i64) -> Result<ClaimOutcome>;
    /// Appends an answer if the caller already has a response row, as one step.
    async fn respond_ticket(
        &self,
        ticket_id: i64,
        tutor_id: i64,
        content: &str,
        material_id: Option<i64>,
        now: i64,
    ) -> Result<RespondOutcome>;
}

#[async_trait]
pub trait MaterialStore: Send + Sync {
    async fn insert_material(&self, title: &str, upload: &Upload, now: i64) -> Result<Material>;
    async fn get_material(&self, material_id: i64) -> Result<Option<Material>>;
    async fn fetch_material(&self, material_id: i64) -> Result<Option<(Material, Vec<u8>)>>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert_message(&self, message: DirectMessage) -> Result<DirectMessage>;
    /// Every message the user sent or received, newest first.
    async fn messages_of(&self, user_id: i64) -> Result<Vec<DirectMessage>>;
    /// Both directions between two users, oldest first.
    async fn messages_between(&self, user_id: i64, other_id: i64) -> Result<Vec<DirectMessage>>;
    async fn mark_messages_read(&self, recipient_id: i64, sender_id: i64) -> Result<u64>;
    async fn mark_message_read(&self, message_id: i64, recipient_id: i64) -> Result<bool>;
    async fn unread_messages(&self, user_id: i64) -> Result<i64>;
}

pub trait Store:
    UserStore
    + ModuleStore
    + PostStore
    + SubscriptionStore
    + NotificationStore
    + TicketStore
    + MaterialStore
    + MessageStore
{
}

impl<T> Store for T where
    T: UserStore
        + ModuleStore
        + PostStore
        + SubscriptionStore
        + NotificationStore
        + TicketStore
        + MaterialStore
        + MessageStore
{
}
