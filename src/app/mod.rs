// ==========================================
// 新品工单表单配置 - 应用层
// ==========================================
// 职责: HTTP 集成,连接管理端调用方与后端
// ==========================================

pub mod http;
pub mod state;

// 重导出
pub use http::build_router;
pub use state::AppState;
