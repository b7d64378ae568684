// ==========================================
// 新品工单表单配置 - HTTP 路由
// ==========================================
// 前缀: /api/form-config
// 健康检查: /healthz
// ==========================================

pub mod common;
pub mod handlers;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::app::state::AppState;

pub const API_PREFIX: &str = "/api/form-config";

/// 构建完整路由
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz_handler))
        .nest(API_PREFIX, form_config_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn form_config_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_handler))
        .route("/active", get(handlers::get_active_handler))
        .route("/all", get(handlers::list_all_handler))
        .route(
            "/{id}",
            get(handlers::get_by_id_handler).put(handlers::save_draft_handler),
        )
        .route("/{id}/publish", post(handlers::publish_handler))
        .route("/{id}/discard-draft", post(handlers::discard_draft_handler))
        .route("/{id}/rollback", post(handlers::rollback_handler))
        .route("/{id}/restore-default", post(handlers::restore_default_handler))
        .route("/{id}/activate", patch(handlers::activate_handler))
        .route("/{id}/actions", get(handlers::list_actions_handler))
        .route("/{id}/sections", post(handlers::add_section_handler))
        .route(
            "/{id}/sections/reorder",
            patch(handlers::reorder_sections_handler),
        )
        .route(
            "/{id}/sections/{section_key}",
            delete(handlers::remove_section_handler),
        )
        .route(
            "/{id}/sections/{section_key}/fields",
            post(handlers::add_field_handler),
        )
        .route(
            "/{id}/sections/{section_key}/fields/{field_key}",
            delete(handlers::remove_field_handler),
        )
}
