// ==========================================
// 新品工单表单配置 - 配置层
// ==========================================
// 职责: 运行配置加载（环境变量 + 默认值）
// ==========================================

pub mod app_config;

// 重导出核心配置
pub use app_config::{env_keys, get_default_db_path, AppConfig, ConfigError};
