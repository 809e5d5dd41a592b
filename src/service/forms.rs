use crate::model::{
    module::NewModule,
    post::{NewPost, PostKind},
    ticket::NewTicket,
};
use crate::types::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::convert::TryFrom;
use validator::{Validate, ValidationError, ValidationErrors};

pub fn from_validation_errors(e: ValidationErrors) -> String {
    let mut err_str = "".to_string();
    let errors_map: HashMap<&'static str, &Vec<ValidationError>> = e.field_errors();
    let mut fields: Vec<_> = errors_map.into_iter().collect();
    fields.sort_by_key(|(name, _)| *name);
    for (_, value) in fields {
        for item in value {
            if let Some(s) = item.message.as_ref() {
                if !err_str.is_empty() {
                    err_str.push_str(" , ");
                }
                err_str.push_str(s)
            }
        }
    }
    err_str
}

/// Runs the form's validators and turns the failures into one bad request.
pub fn check<T: Validate>(form: &T) -> Result<()> {
    form.validate()
        .map_err(|e| Error::bad_request(from_validation_errors(e).as_str()))
}

fn not_blank(s: &str, message: &'static str) -> std::result::Result<(), ValidationError> {
    if s.trim().is_empty() {
        return Err(ValidationError {
            code: Cow::from("blank"),
            message: Some(Cow::from(message)),
            params: Default::default(),
        });
    }
    Ok(())
}

fn required_title(s: &str) -> std::result::Result<(), ValidationError> {
    not_blank(s, "title is required")
}

fn required_content(s: &str) -> std::result::Result<(), ValidationError> {
    not_blank(s, "content is required")
}

fn required_name(s: &str) -> std::result::Result<(), ValidationError> {
    not_blank(s, "module name is required")
}

#[derive(Validate, Serialize, Deserialize, Debug)]
pub struct CreatePostForm {
    #[serde(rename = "type")]
    pub kind: i32,
    pub parent_post_id: Option<i64>,
    #[validate(length(max = 255, message = "title is too long"))]
    pub title: Option<String>,
    #[validate(custom = "required_content")]
    pub content: String,
    pub module_id: Option<i64>,
    pub material_id: Option<i64>,
    #[serde(default)]
    pub is_anonymous: bool,
}

impl CreatePostForm {
    pub fn into_new_post(self) -> Result<NewPost> {
        check(&self)?;
        let kind = PostKind::try_from(self.kind).map_err(|e| Error::bad_request(e.as_str()))?;
        Ok(NewPost::from_parts(
            kind,
            self.parent_post_id,
            self.title.as_deref(),
            self.content.as_str(),
            self.module_id,
        )?
        .anonymous(self.is_anonymous)
        .with_material(self.material_id))
    }
}

#[derive(Validate, Serialize, Deserialize, Debug)]
pub struct UpdatePostForm {
    #[validate(length(max = 255, message = "title is too long"))]
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct SubscribeForm {
    pub subscribable_type: i32,
    pub subscribable_id: i64,
}

#[derive(Validate, Serialize, Deserialize, Debug)]
pub struct CreateTicketForm {
    #[validate(custom = "required_title")]
    #[validate(length(max = 200, message = "title is too long"))]
    pub title: String,
    #[validate(custom = "required_content")]
    pub content: String,
    #[validate(range(min = 1, message = "module_id is required"))]
    pub module_id: i64,
}

impl CreateTicketForm {
    pub fn into_new_ticket(self) -> Result<NewTicket> {
        check(&self)?;
        Ok(NewTicket {
            title: self.title,
            content: self.content,
            module_id: self.module_id,
        })
    }
}

#[derive(Validate, Serialize, Deserialize, Debug)]
pub struct RespondForm {
    #[validate(custom = "required_content")]
    pub content: String,
    pub material_id: Option<i64>,
}

#[derive(Validate, Serialize, Deserialize, Debug)]
pub struct SendMessageForm {
    #[validate(range(min = 1, message = "recipient_id is required"))]
    pub recipient_id: i64,
    #[validate(custom = "required_content")]
    pub content: String,
    pub material_id: Option<i64>,
}

#[derive(Validate, Serialize, Deserialize, Debug)]
pub struct CreateModuleForm {
    #[validate(custom = "required_name")]
    #[validate(length(max = 100, message = "module name is too long"))]
    pub name: String,
    pub tag: Option<String>,
    pub description: Option<String>,
}

impl From<CreateModuleForm> for NewModule {
    fn from(f: CreateModuleForm) -> Self {
        NewModule {
            name: f.name,
            tag: f.tag,
            description: f.description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::post::PostRole;

    fn post_form(kind: i32, parent: Option<i64>, content: &str) -> CreatePostForm {
        CreatePostForm {
            kind,
            parent_post_id: parent,
            title: Some("Exam prep".to_string()),
            content: content.to_string(),
            module_id: None,
            material_id: None,
            is_anonymous: true,
        }
    }

    #[test]
    fn builds_posts_from_loose_fields() {
        let comment = post_form(1, Some(4), "agreed").into_new_post().unwrap();
        assert_eq!(comment.role(), PostRole::Comment { parent: 4 });
        assert!(comment.is_anonymous);
        assert!(post_form(1, None, "orphan").into_new_post().is_err());
        assert!(post_form(3, Some(4), "topic with parent").into_new_post().is_err());
        assert!(post_form(9, None, "unknown kind").into_new_post().is_err());
        assert!(post_form(2, None, "   ").into_new_post().is_err());
    }

    #[test]
    fn ticket_form_reports_every_problem() {
        let form = CreateTicketForm {
            title: " ".to_string(),
            content: "".to_string(),
            module_id: 0,
        };
        let err = form.into_new_ticket().unwrap_err();
        assert!(err.error.contains("title is required"));
        assert!(err.error.contains("content is required"));
        assert!(err.error.contains("module_id is required"));
    }

    #[test]
    fn parses_client_json() {
        let form: CreatePostForm = serde_json::from_str(
            r#"{"type": 3, "title": "Welcome", "content": "Hello", "module_id": 2}"#,
        )
        .unwrap();
        assert_eq!(form.kind, 3);
        assert!(!form.is_anonymous);
        assert_eq!(form.into_new_post().unwrap().role(), PostRole::Topic);
    }
}
