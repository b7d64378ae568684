// ==========================================
// 新品工单表单配置 - 领域模型层
// ==========================================
// 职责: 定义表单配置实体、类型、结构操作
// 红线: 不含数据访问逻辑,不含状态机逻辑
// ==========================================

pub mod action_log;
pub mod defaults;
pub mod form_config;
pub mod schema;
pub mod types;

// 重导出核心类型
pub use action_log::{FormConfigAction, FormConfigActionType};
pub use form_config::{
    CreateFormConfigRequest, FieldOption, FieldValidation, FormConfigSummary, FormConfiguration,
    FormField, FormSection, ReorderSectionsRequest, SectionOrder, UpdateFormConfigRequest,
    VisibleWhen,
};
pub use schema::SchemaError;
pub use types::{CallerContext, FieldType, FormVersion, VersionParseError};
