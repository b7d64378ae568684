// ==========================================
// 新品工单表单配置 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::domain::schema::SchemaError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// 配置/分区/字段不存在
    #[error("{entity}不存在: {key}")]
    NotFound { entity: String, key: String },

    /// 状态前置条件不满足（例如没有草稿可丢弃）
    #[error("状态不允许该操作: {0}")]
    InvalidState(String),

    /// 尝试修改内置元素
    #[error("禁止操作: {0}")]
    Forbidden(String),

    /// 请求载荷不合法
    #[error("数据验证失败: {0}")]
    Validation(String),
}

impl EngineError {
    pub fn section_not_found(section_key: &str) -> Self {
        EngineError::NotFound {
            entity: "Section".to_string(),
            key: section_key.to_string(),
        }
    }

    pub fn field_not_found(section_key: &str, field_key: &str) -> Self {
        EngineError::NotFound {
            entity: "Field".to_string(),
            key: format!("{}.{}", section_key, field_key),
        }
    }
}

impl From<SchemaError> for EngineError {
    fn from(err: SchemaError) -> Self {
        EngineError::Validation(err.to_string())
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
