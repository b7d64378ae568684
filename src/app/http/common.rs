// ==========================================
// HTTP 公共组件
// ==========================================
// 错误响应 / JSON 提取器 / 调用方上下文提取 / ETag
// ==========================================

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::domain::form_config::FormConfiguration;
use crate::domain::types::CallerContext;

/// 调用方身份请求头（由上游认证协作方注入）
pub const USER_ID_HEADER: &str = "x-user-id";
/// 未携带身份头时记录的操作人
pub const ANONYMOUS_USER: &str = "anonymous";

/// 错误响应结构
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,

    /// 错误消息
    pub message: String,

    /// 详细信息（可选）
    pub details: Option<serde_json::Value>,
}

/// ApiError -> HTTP 状态码
pub fn status_for(err: &ApiError) -> StatusCode {
    match err {
        ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        ApiError::InvalidState(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
        ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        ApiError::BusinessRuleViolation(_) | ApiError::OptimisticLockFailure(_) => {
            StatusCode::CONFLICT
        }
        ApiError::DatabaseError(_)
        | ApiError::DatabaseConnectionError(_)
        | ApiError::DatabaseTransactionError(_)
        | ApiError::InternalError(_)
        | ApiError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if self.is_internal() {
            tracing::error!("请求失败: code={}, error={}", self.code(), self);
        } else {
            tracing::debug!("请求被拒绝: code={}, error={}", self.code(), self);
        }

        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

// ==========================================
// AppJson - JSON 请求体提取器
// ==========================================
// 反序列化失败（类型不符、未知字段、非数组的排序列表等）统一为 VALIDATION_ERROR
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(ApiError::ValidationError(rejection.body_text())),
        }
    }
}

// ==========================================
// CallerContext 提取
// ==========================================
// x-user-id: 操作人
// If-Match:  期望 revision（"*" 表示不校验）
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers)
    }
}

pub fn caller_from_headers(headers: &HeaderMap) -> Result<CallerContext, ApiError> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_USER);

    let mut ctx = CallerContext::new(user_id);
    if let Some(raw) = headers.get(header::IF_MATCH) {
        if let Some(revision) = parse_if_match(raw)? {
            ctx = ctx.with_expected_revision(revision);
        }
    }
    Ok(ctx)
}

fn parse_if_match(raw: &HeaderValue) -> Result<Option<i32>, ApiError> {
    let text = raw
        .to_str()
        .map_err(|_| ApiError::ValidationError("If-Match 不是有效文本".to_string()))?
        .trim();
    if text == "*" {
        return Ok(None);
    }

    let unquoted = text.strip_prefix("W/").unwrap_or(text).trim_matches('"');
    unquoted
        .parse::<i32>()
        .map(Some)
        .map_err(|_| ApiError::ValidationError(format!("If-Match 不是有效的 revision: {}", text)))
}

// ==========================================
// 配置响应（带 ETag）
// ==========================================
pub fn config_response(status: StatusCode, config: FormConfiguration) -> Response {
    let etag = format!("\"{}\"", config.revision);
    let mut resp = (status, Json(config)).into_response();
    if let Ok(value) = HeaderValue::from_str(&etag) {
        resp.headers_mut().insert(header::ETAG, value);
    }
    resp
}
