// ==========================================
// HTTP 处理器 - 表单配置
// ==========================================
// 约定: 处理器只做 提取 -> 调用 API -> 响应；业务规则全部在 API/Engine 层
// 约定: API 为同步阻塞调用（SQLite），统一经 spawn_blocking 执行
// ==========================================

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::api::form_config_api::FormConfigApi;
use crate::app::http::common::{config_response, AppJson};
use crate::app::state::AppState;
use crate::domain::form_config::{
    CreateFormConfigRequest, FormField, FormSection, ReorderSectionsRequest,
    UpdateFormConfigRequest,
};
use crate::domain::types::CallerContext;

const DEFAULT_ACTION_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ActionQuery {
    pub limit: Option<i64>,
}

async fn run_blocking<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&FormConfigApi) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let api = state.form_config_api.clone();
    tokio::task::spawn_blocking(move || f(&api))
        .await
        .map_err(|e| ApiError::InternalError(format!("后台任务执行失败: {}", e)))?
}

pub async fn healthz_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// ==========================================
// 查询
// ==========================================

pub async fn get_active_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let config = run_blocking(&state, |api| api.get_active()).await?;
    Ok(config_response(StatusCode::OK, config))
}

pub async fn list_all_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let summaries = run_blocking(&state, |api| api.list_summaries()).await?;
    Ok(Json(summaries).into_response())
}

pub async fn get_by_id_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let config = run_blocking(&state, move |api| api.get_by_id(&id)).await?;
    Ok(config_response(StatusCode::OK, config))
}

pub async fn list_actions_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ActionQuery>,
) -> Result<Response, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_ACTION_LIMIT);
    let actions = run_blocking(&state, move |api| api.list_actions(&id, limit)).await?;
    Ok(Json(actions).into_response())
}

// ==========================================
// 创建 / 版本状态迁移
// ==========================================

pub async fn create_handler(
    State(state): State<AppState>,
    ctx: CallerContext,
    AppJson(request): AppJson<CreateFormConfigRequest>,
) -> Result<Response, ApiError> {
    let config = run_blocking(&state, move |api| api.create(request, &ctx)).await?;
    Ok(config_response(StatusCode::CREATED, config))
}

pub async fn save_draft_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: CallerContext,
    AppJson(request): AppJson<UpdateFormConfigRequest>,
) -> Result<Response, ApiError> {
    let config = run_blocking(&state, move |api| api.save_draft(&id, request, &ctx)).await?;
    Ok(config_response(StatusCode::OK, config))
}

pub async fn publish_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: CallerContext,
) -> Result<Response, ApiError> {
    let config = run_blocking(&state, move |api| api.publish(&id, &ctx)).await?;
    Ok(config_response(StatusCode::OK, config))
}

pub async fn discard_draft_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: CallerContext,
) -> Result<Response, ApiError> {
    let config = run_blocking(&state, move |api| api.discard_draft(&id, &ctx)).await?;
    Ok(config_response(StatusCode::OK, config))
}

pub async fn rollback_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: CallerContext,
) -> Result<Response, ApiError> {
    let config = run_blocking(&state, move |api| api.rollback(&id, &ctx)).await?;
    Ok(config_response(StatusCode::OK, config))
}

pub async fn restore_default_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: CallerContext,
) -> Result<Response, ApiError> {
    let config = run_blocking(&state, move |api| api.restore_default(&id, &ctx)).await?;
    Ok(config_response(StatusCode::OK, config))
}

pub async fn activate_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: CallerContext,
) -> Result<Response, ApiError> {
    let config = run_blocking(&state, move |api| api.activate(&id, &ctx)).await?;
    Ok(config_response(StatusCode::OK, config))
}

// ==========================================
// 结构编辑
// ==========================================

pub async fn reorder_sections_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: CallerContext,
    AppJson(request): AppJson<ReorderSectionsRequest>,
) -> Result<Response, ApiError> {
    let config = run_blocking(&state, move |api| api.reorder_sections(&id, request, &ctx)).await?;
    Ok(config_response(StatusCode::OK, config))
}

pub async fn add_section_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: CallerContext,
    AppJson(section): AppJson<FormSection>,
) -> Result<Response, ApiError> {
    let config = run_blocking(&state, move |api| api.add_section(&id, section, &ctx)).await?;
    Ok(config_response(StatusCode::OK, config))
}

pub async fn add_field_handler(
    State(state): State<AppState>,
    Path((id, section_key)): Path<(String, String)>,
    ctx: CallerContext,
    AppJson(field): AppJson<FormField>,
) -> Result<Response, ApiError> {
    let config = run_blocking(&state, move |api| {
        api.add_field(&id, &section_key, field, &ctx)
    })
    .await?;
    Ok(config_response(StatusCode::OK, config))
}

pub async fn remove_section_handler(
    State(state): State<AppState>,
    Path((id, section_key)): Path<(String, String)>,
    ctx: CallerContext,
) -> Result<Response, ApiError> {
    let config = run_blocking(&state, move |api| {
        api.remove_section(&id, &section_key, &ctx)
    })
    .await?;
    Ok(config_response(StatusCode::OK, config))
}

pub async fn remove_field_handler(
    State(state): State<AppState>,
    Path((id, section_key, field_key)): Path<(String, String, String)>,
    ctx: CallerContext,
) -> Result<Response, ApiError> {
    let config = run_blocking(&state, move |api| {
        api.remove_field(&id, &section_key, &field_key, &ctx)
    })
    .await?;
    Ok(config_response(StatusCode::OK, config))
}
