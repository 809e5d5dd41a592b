use super::forms::{check, CreateTicketForm, RespondForm};
use crate::config::init::AppState;
use crate::model::{material::Upload, user::Caller};
use crate::types::{
    error_response::ErrorResponse,
    response::{Response, ResponseResult},
};
use axum::{
    extract::{ContentLengthLimit, Extension, Json as AxumJson, Multipart, Path, Query},
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

pub async fn create_ticket(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    AxumJson(form): AxumJson<CreateTicketForm>,
) -> ResponseResult {
    let view = state
        .tickets
        .create(caller.user_id, form.into_new_ticket()?, None)
        .await?;
    Ok(Response::new("ticket created", view).into_response())
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ErrorResponse {
    ErrorResponse::bad_request_with_str(format!("malformed upload: {}", e).as_str())
}

/// Fields `title`, `content`, `module_id` and an optional `file`.
pub async fn create_ticket_with_file(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ContentLengthLimit(mut multipart): ContentLengthLimit<Multipart, { 12 * 1024 * 1024 }>,
) -> ResponseResult {
    let mut title = String::new();
    let mut content = String::new();
    let mut module_id: Option<i64> = None;
    let mut upload: Option<Upload> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field
                    .content_type()
                    .map(|m| m.to_string())
                    .unwrap_or_default();
                let data = field.bytes().await.map_err(multipart_error)?;
                upload = Some(Upload::new(&file_name, &content_type, data.to_vec()));
            }
            "title" | "content" | "module_id" => {
                let text = field.text().await.map_err(multipart_error)?;
                match name.as_str() {
                    "title" => title = text,
                    "content" => content = text,
                    _ => {
                        module_id = Some(text.trim().parse().map_err(|_| {
                            ErrorResponse::bad_request_with_str("module_id must be a number")
                        })?)
                    }
                }
            }
            _ => continue,
        }
    }
    let form = CreateTicketForm {
        title,
        content,
        module_id: module_id.unwrap_or(0),
    };
    let view = state
        .tickets
        .create(caller.user_id, form.into_new_ticket()?, upload)
        .await?;
    Ok(Response::new("ticket created", view).into_response())
}

pub async fn get_ticket(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(ticket_id): Path<i64>,
) -> ResponseResult {
    Ok(Response::from(state.tickets.get(ticket_id, caller).await?).into_response())
}

pub async fn list_tickets(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ResponseResult {
    Ok(Response::from(state.tickets.list(caller).await?).into_response())
}

#[derive(Deserialize, Default)]
pub struct OpenQuery {
    /// Comma separated module ids.
    pub module_ids: Option<String>,
}

fn parse_ids(raw: &str) -> Result<Vec<i64>, ErrorResponse> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| ErrorResponse::bad_request_with_str("module_ids must be numbers"))
        })
        .collect()
}

pub async fn list_open(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<OpenQuery>,
) -> ResponseResult {
    let modules = match query.module_ids.as_deref() {
        Some(raw) => Some(parse_ids(raw)?).filter(|ids: &Vec<i64>| !ids.is_empty()),
        None => None,
    };
    Ok(Response::from(state.tickets.list_open(caller, modules).await?).into_response())
}

pub async fn list_for_student(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(student_id): Path<i64>,
) -> ResponseResult {
    let tickets = state.tickets.list_for_student(caller, student_id).await?;
    Ok(Response::from(tickets).into_response())
}

pub async fn list_for_tutor(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(tutor_id): Path<i64>,
) -> ResponseResult {
    let tickets = state.tickets.list_for_tutor(caller, tutor_id).await?;
    Ok(Response::from(tickets).into_response())
}

pub async fn claim(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(ticket_id): Path<i64>,
) -> ResponseResult {
    let view = state.tickets.claim(ticket_id, caller).await?;
    Ok(Response::new("ticket claimed", view).into_response())
}

pub async fn respond(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(ticket_id): Path<i64>,
    AxumJson(form): AxumJson<RespondForm>,
) -> ResponseResult {
    check(&form)?;
    let view = state
        .tickets
        .respond(ticket_id, caller, form.content.as_str(), form.material_id)
        .await?;
    Ok(Response::new("response submitted", view).into_response())
}
