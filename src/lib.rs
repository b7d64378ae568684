// ==========================================
// 新品工单表单配置 - 核心库
// ==========================================
// 职责: 新品工单录入表单的动态配置与版本管理
// 技术栈: axum + Rust + SQLite
// 系统定位: 管理端配置服务（工单表单的结构由此决定）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 版本状态机 / 结构编辑 / 激活
pub mod engine;

// 配置层 - 运行配置
pub mod config;

// 读穿透缓存
pub mod cache;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 性能观测
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - HTTP 集成
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CallerContext, FieldType, FormVersion};

// 领域实体
pub use domain::{FormConfigAction, FormConfigSummary, FormConfiguration, FormField, FormSection};

// 引擎
pub use engine::{ActivationManager, StructureEditor, VersionController};

// API
pub use api::{ApiError, ApiResult, FormConfigApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "新品工单表单配置服务";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
