use super::forms::{check, CreateModuleForm};
use super::require_tutor;
use crate::config::init::AppState;
use crate::model::user::Caller;
use crate::types::{
    error_response::ErrorResponse,
    response::{Response, ResponseResult},
};
use axum::{
    body::Full,
    extract::{Extension, Json as AxumJson, Path},
    http::{
        header::{HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response as AxumResponse},
};
use std::sync::Arc;

pub async fn list_modules(Extension(state): Extension<Arc<AppState>>) -> ResponseResult {
    Ok(Response::from(state.catalog.modules().await?).into_response())
}

pub async fn get_module(
    Extension(state): Extension<Arc<AppState>>,
    Path(module_id): Path<i64>,
) -> ResponseResult {
    Ok(Response::from(state.catalog.module(module_id).await?).into_response())
}

pub async fn create_module(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    AxumJson(form): AxumJson<CreateModuleForm>,
) -> ResponseResult {
    require_tutor(&caller)?;
    check(&form)?;
    let module = state.catalog.create_module(form.into()).await?;
    Ok(Response::new("module created", module).into_response())
}

pub async fn material_info(
    Extension(state): Extension<Arc<AppState>>,
    Path(material_id): Path<i64>,
) -> ResponseResult {
    let (material, _) = state.catalog.material(material_id).await?;
    Ok(Response::from(material).into_response())
}

fn header(value: &str) -> Result<HeaderValue, ErrorResponse> {
    HeaderValue::from_str(value).map_err(|e| {
        tracing::warn!("bad header value {:?}: {}", value, e);
        ErrorResponse::server_error_default()
    })
}

pub async fn download_material(
    Extension(state): Extension<Arc<AppState>>,
    Path(material_id): Path<i64>,
) -> ResponseResult {
    let (material, data) = state.catalog.material(material_id).await?;
    let content_type = match material.file_type.as_str() {
        "" => "application/octet-stream",
        t => t,
    };
    let disposition = HeaderValue::from_str(
        format!("attachment; filename=\"{}\"", material.file_name.replace('"', "")).as_str(),
    )
    .or_else(|_| header("attachment"))?;
    let response = AxumResponse::new(Full::from(data));
    let (mut parts, body) = response.into_parts();
    parts.status = StatusCode::OK;
    parts
        .headers
        .insert(CONTENT_TYPE, header(content_type).or_else(|_| header("application/octet-stream"))?);
    parts.headers.insert(CONTENT_DISPOSITION, disposition);
    Ok(AxumResponse::from_parts(parts, body).into_response())
}
