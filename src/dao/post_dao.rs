use super::notification_dao::{FanOut, Notifier};
use super::store::{PostFilter, Store};
use super::subscription_dao::SubscriptionRegistry;
use super::user_dao::UserDirectory;
use crate::constants;
use crate::model::{
    notification::{NewNotification, NotificationType},
    post::{NewPost, Post, PostRole, PostView, MAX_POST_TITLE_LEN},
    subscription::SubscriptionTarget,
    user::User,
};
use crate::types::error::{Error, Result};
use crate::utils::now_millis;
use std::sync::Arc;

/// `"Name Surname (Role)"`, or the anonymous placeholder.
pub fn author_of(post: &Post, author: Option<&User>) -> (String, String) {
    if post.is_anonymous {
        return (
            constants::ANONYMOUS_AUTHOR.to_string(),
            constants::ANONYMOUS_EMAIL.to_string(),
        );
    }
    match author {
        Some(u) => {
            let name = match u.display_name() {
                n if n.is_empty() => "Unknown".to_string(),
                n => n,
            };
            (format!("{} ({})", name, u.access_level.name()), u.email.clone())
        }
        None => (
            "Unknown (Student)".to_string(),
            "unknown@campuslearn.com".to_string(),
        ),
    }
}

#[derive(Clone)]
pub struct PostEngine {
    store: Arc<dyn Store>,
    users: UserDirectory,
    subscriptions: SubscriptionRegistry,
    notifier: Notifier,
    fan_out: FanOut,
}

impl PostEngine {
    pub fn new(
        store: Arc<dyn Store>,
        users: UserDirectory,
        subscriptions: SubscriptionRegistry,
        notifier: Notifier,
        fan_out: FanOut,
    ) -> Self {
        Self {
            store,
            users,
            subscriptions,
            notifier,
            fan_out,
        }
    }

    /// Stores the post, then tells its audience. A failed fan-out is logged and the post
    /// still stands.
    pub async fn create(&self, author_id: i64, new: NewPost) -> Result<Post> {
        new.validate()?;
        if let Some(parent) = new.parent_post_id() {
            if self.store.get_post(parent).await?.is_none() {
                return Err(Error::not_found(
                    format!("parent post {} not found", parent).as_str(),
                ));
            }
        }
        if let Some(module_id) = new.module_id {
            if self.store.get_module(module_id).await?.is_none() {
                return Err(Error::not_found(
                    format!("module {} not found", module_id).as_str(),
                ));
            }
        }
        if let Some(material_id) = new.material_id {
            if self.store.get_material(material_id).await?.is_none() {
                return Err(Error::not_found(
                    format!("material {} not found", material_id).as_str(),
                ));
            }
        }

        let post = self
            .store
            .insert_post(new.into_post(author_id, now_millis()))
            .await?;
        tracing::info!(
            "user {} created {} {}",
            author_id,
            post.kind.name(),
            post.post_id
        );
        self.announce(&post).await;
        Ok(post)
    }

    async fn announce(&self, post: &Post) {
        let res = match post.role() {
            PostRole::Comment { parent } => self.fan_out.comment_added(parent, post.user_id).await,
            PostRole::Topic | PostRole::Post => self.fan_out.post_added(post).await,
        };
        match res {
            Ok(n) => tracing::debug!("post {} notified {} follower(s)", post.post_id, n),
            Err(e) => tracing::warn!("fan-out for post {} failed: {}", post.post_id, e),
        }
    }

    pub async fn get(&self, post_id: i64, viewer: Option<i64>) -> Result<PostView> {
        let post = self.require(post_id).await?;
        self.view(post, viewer).await
    }

    pub async fn list(&self, filter: PostFilter, viewer: Option<i64>) -> Result<Vec<PostView>> {
        if let PostFilter::CommentsOf(post_id) = filter {
            self.require(post_id).await?;
        }
        let posts = self.store.find_posts(filter).await?;
        let mut out = Vec::with_capacity(posts.len());
        for post in posts {
            out.push(self.view(post, viewer).await?);
        }
        Ok(out)
    }

    /// Substring match over title and content.
    pub async fn search(&self, query: &str, viewer: Option<i64>) -> Result<Vec<PostView>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::bad_request("search query is required"));
        }
        self.list(PostFilter::Search(query.to_string()), viewer).await
    }

    /// Author only. Blank fields are left as they are.
    pub async fn update(
        &self,
        post_id: i64,
        editor_id: i64,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<PostView> {
        let post = self.require(post_id).await?;
        if post.user_id != editor_id {
            return Err(Error::forbidden("only the author may edit this post"));
        }
        let title = title.filter(|t| !t.trim().is_empty());
        let content = content.filter(|c| !c.trim().is_empty());
        if let Some(t) = &title {
            if t.chars().count() > MAX_POST_TITLE_LEN {
                return Err(Error::bad_request("title is too long"));
            }
        }
        let updated = self
            .store
            .update_post(post_id, title, content)
            .await?
            .ok_or_else(|| Error::not_found(format!("post {} not found", post_id).as_str()))?;
        self.view(updated, Some(editor_id)).await
    }

    /// Removes the post with its comments and likes.
    pub async fn delete(&self, post_id: i64) -> Result<()> {
        if !self.store.delete_post(post_id).await? {
            return Err(Error::not_found(format!("post {} not found", post_id).as_str()));
        }
        tracing::info!("post {} deleted", post_id);
        Ok(())
    }

    /// Returns whether the post is liked afterwards.
    pub async fn toggle_like(&self, post_id: i64, user_id: i64) -> Result<bool> {
        let post = self.require(post_id).await?;
        let liked = self.store.toggle_like(user_id, post_id, now_millis()).await?;
        if liked && post.user_id != user_id {
            let who = match self.users.get(user_id).await {
                Ok(Some(u)) if !u.display_name().is_empty() => u.display_name(),
                _ => "Someone".to_string(),
            };
            let message = format!("{} liked \"{}\"", who, post.title_or("your comment"));
            let item = NewNotification::new(
                post.user_id,
                "New like on your post",
                message.as_str(),
                NotificationType::Like,
                Some(post_id),
            );
            if let Err(e) = self.notifier.notify(item).await {
                tracing::warn!("like notification for post {} failed: {}", post_id, e);
            }
        }
        Ok(liked)
    }

    async fn require(&self, post_id: i64) -> Result<Post> {
        self.store
            .get_post(post_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("post {} not found", post_id).as_str()))
    }

    async fn view(&self, post: Post, viewer: Option<i64>) -> Result<PostView> {
        let like_count = self.store.like_count(post.post_id).await?;
        let comment_count = self.store.comment_count(post.post_id).await?;
        let (liked, subscribed) = match viewer {
            Some(v) => (
                self.store.has_liked(v, post.post_id).await?,
                self.subscriptions
                    .is_subscribed(v, SubscriptionTarget::Topic(post.post_id))
                    .await?,
            ),
            None => (false, false),
        };
        let module_name = match post.module_id {
            Some(id) => self.store.get_module(id).await?.map(|m| m.name),
            None => None,
        };
        let author = if post.is_anonymous {
            None
        } else {
            self.users.get(post.user_id).await?
        };
        let (author_name, author_email) = author_of(&post, author.as_ref());

        Ok(PostView {
            post_id: post.post_id,
            user_id: if post.is_anonymous { None } else { Some(post.user_id) },
            parent_post_id: post.parent_post_id,
            type_name: post.kind.name().to_string(),
            kind: post.kind,
            title: post.title,
            content: post.content,
            module_id: post.module_id,
            module_name,
            time_created: post.time_created,
            material_id: post.material_id,
            like_count,
            comment_count,
            is_liked_by_current_user: liked,
            is_subscribed_by_current_user: subscribed,
            is_anonymous: post.is_anonymous,
            author_name,
            author_email,
        })
    }
}
