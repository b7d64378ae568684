// ==========================================
// 新品工单表单配置 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供 HTTP 处理器调用
// ==========================================

pub mod error;
pub mod form_config_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use form_config_api::{CacheSettings, FormConfigApi};
