use super::traits::Model;
use crate::constants;
use crate::types::error::{Error, Result};
use campus_learn::{FromPgRow, PgEnum};
use serde::{Deserialize, Serialize};

pub const MAX_POST_TITLE_LEN: usize = 255;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, PgEnum)]
#[serde(try_from = "i32", into = "i32")]
pub enum PostKind {
    #[default]
    Comment = 1,
    Post = 2,
    Topic = 3,
}

impl PostKind {
    pub fn name(&self) -> &'static str {
        match self {
            PostKind::Comment => "Comment",
            PostKind::Post => "Post",
            PostKind::Topic => "Topic",
        }
    }
}

/// Topics, posts and comments share one table; comments point at their parent.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, FromPgRow)]
pub struct Post {
    pub post_id: i64,
    pub user_id: i64,
    pub parent_post_id: Option<i64>,
    pub title: Option<String>,
    pub content: String,
    pub kind: PostKind,
    pub module_id: Option<i64>,
    pub material_id: Option<i64>,
    pub is_anonymous: bool,
    pub time_created: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostRole {
    Topic,
    Post,
    Comment { parent: i64 },
}

impl Post {
    pub fn role(&self) -> PostRole {
        match (self.kind, self.parent_post_id) {
            (PostKind::Comment, Some(parent)) => PostRole::Comment { parent },
            (PostKind::Topic, _) => PostRole::Topic,
            _ => PostRole::Post,
        }
    }

    pub fn title_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.title.as_deref().filter(|t| !t.trim().is_empty()).unwrap_or(fallback)
    }
}

impl Model for Post {
    fn table_name() -> &'static str {
        constants::POST_TABLE_NAME
    }
    fn id_column() -> &'static str {
        "post_id"
    }
}

/// A post waiting to be written. The role decides both the kind tag and the parent link, so a
/// comment without a parent (or a topic with one) cannot be built.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    role: PostRole,
    pub title: Option<String>,
    pub content: String,
    pub module_id: Option<i64>,
    pub material_id: Option<i64>,
    pub is_anonymous: bool,
}

impl NewPost {
    fn with_role(role: PostRole, title: Option<&str>, content: &str, module_id: Option<i64>) -> Self {
        Self {
            role,
            title: title.map(|t| t.to_string()),
            content: content.to_string(),
            module_id,
            material_id: None,
            is_anonymous: false,
        }
    }

    pub fn topic(title: &str, content: &str, module_id: Option<i64>) -> Self {
        Self::with_role(PostRole::Topic, Some(title), content, module_id)
    }

    pub fn post(title: &str, content: &str, module_id: Option<i64>) -> Self {
        Self::with_role(PostRole::Post, Some(title), content, module_id)
    }

    pub fn comment(parent: i64, content: &str) -> Self {
        Self::with_role(PostRole::Comment { parent }, None, content, None)
    }

    /// From the loose `(type, parentPostId)` pair clients send.
    pub fn from_parts(
        kind: PostKind,
        parent_post_id: Option<i64>,
        title: Option<&str>,
        content: &str,
        module_id: Option<i64>,
    ) -> Result<Self> {
        let role = match (kind, parent_post_id) {
            (PostKind::Comment, Some(parent)) => PostRole::Comment { parent },
            (PostKind::Comment, None) => {
                return Err(Error::bad_request("a comment needs a parent post"))
            }
            (PostKind::Topic, None) => PostRole::Topic,
            (PostKind::Post, None) => PostRole::Post,
            (_, Some(_)) => {
                return Err(Error::bad_request("only comments may have a parent post"))
            }
        };
        Ok(Self::with_role(role, title, content, module_id))
    }

    pub fn anonymous(mut self, is_anonymous: bool) -> Self {
        self.is_anonymous = is_anonymous;
        self
    }

    pub fn with_material(mut self, material_id: Option<i64>) -> Self {
        self.material_id = material_id;
        self
    }

    pub fn role(&self) -> PostRole {
        self.role
    }

    pub fn kind(&self) -> PostKind {
        match self.role {
            PostRole::Topic => PostKind::Topic,
            PostRole::Post => PostKind::Post,
            PostRole::Comment { .. } => PostKind::Comment,
        }
    }

    pub fn parent_post_id(&self) -> Option<i64> {
        match self.role {
            PostRole::Comment { parent } => Some(parent),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.content.trim().is_empty() {
            return Err(Error::bad_request("content is required"));
        }
        if let Some(title) = &self.title {
            if title.chars().count() > MAX_POST_TITLE_LEN {
                return Err(Error::bad_request("title is too long"));
            }
        }
        Ok(())
    }

    pub fn into_post(self, user_id: i64, time_created: i64) -> Post {
        let kind = self.kind();
        let parent_post_id = self.parent_post_id();
        Post {
            post_id: 0,
            user_id,
            parent_post_id,
            title: self.title,
            content: self.content,
            kind,
            module_id: self.module_id,
            material_id: self.material_id,
            is_anonymous: self.is_anonymous,
            time_created,
        }
    }
}

/// Read model handed to clients.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PostView {
    pub post_id: i64,
    /// Hidden for anonymous posts.
    pub user_id: Option<i64>,
    pub parent_post_id: Option<i64>,
    pub title: Option<String>,
    pub content: String,
    pub kind: PostKind,
    pub type_name: String,
    pub module_id: Option<i64>,
    pub module_name: Option<String>,
    pub time_created: i64,
    pub material_id: Option<i64>,
    pub like_count: i64,
    pub comment_count: i64,
    pub is_liked_by_current_user: bool,
    pub is_subscribed_by_current_user: bool,
    pub is_anonymous: bool,
    pub author_name: String,
    pub author_email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_fix_kind_and_parent() {
        let c = NewPost::comment(7, "nice");
        assert_eq!(c.kind(), PostKind::Comment);
        assert_eq!(c.parent_post_id(), Some(7));
        let t = NewPost::topic("Midterm schedule", "when?", Some(5));
        assert_eq!(t.kind(), PostKind::Topic);
        assert_eq!(t.parent_post_id(), None);
    }

    #[test]
    fn loose_parts_are_checked() {
        assert!(NewPost::from_parts(PostKind::Comment, None, None, "x", None).is_err());
        assert!(NewPost::from_parts(PostKind::Topic, Some(3), Some("t"), "x", None).is_err());
        assert!(NewPost::from_parts(PostKind::Post, Some(3), Some("t"), "x", None).is_err());
        let ok = NewPost::from_parts(PostKind::Comment, Some(3), None, "x", None).unwrap();
        assert_eq!(ok.role(), PostRole::Comment { parent: 3 });
    }

    #[test]
    fn blank_content_is_rejected() {
        assert!(NewPost::post("t", "   ", None).validate().is_err());
        let long = "x".repeat(MAX_POST_TITLE_LEN + 1);
        assert!(NewPost::post(&long, "body", None).validate().is_err());
        assert!(NewPost::post("t", "body", None).validate().is_ok());
    }

    #[test]
    fn stored_rows_report_their_role() {
        let post = NewPost::comment(11, "hi").into_post(2, 0);
        assert_eq!(post.role(), PostRole::Comment { parent: 11 });
        let post = NewPost::topic("t", "hi", None).into_post(2, 0);
        assert_eq!(post.role(), PostRole::Topic);
        assert_eq!(post.title_or("a topic"), "t");
    }
}
