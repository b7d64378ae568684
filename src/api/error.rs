// ==========================================
// 新品工单表单配置 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository/Engine错误为用户友好的错误消息
// 约束: 所有错误信息必须包含显式原因
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 状态前置条件不满足（no draft to discard 等）
    #[error("{0}")]
    InvalidState(String),

    /// 尝试删除内置分区/字段
    #[error("禁止操作: {0}")]
    Forbidden(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("乐观锁冲突: {0}")]
    OptimisticLockFailure(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 校验错误
    // ==========================================
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定的错误码（返回给客户端）
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidState(_) => "INVALID_STATE",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::BusinessRuleViolation(_) => "BUSINESS_RULE_VIOLATION",
            ApiError::OptimisticLockFailure(_) => "OPTIMISTIC_LOCK_FAILURE",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::DatabaseTransactionError(_) => "DATABASE_TRANSACTION_ERROR",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为持久化/内部故障（调用方无法通过修正请求解决）
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ApiError::DatabaseError(_)
                | ApiError::DatabaseConnectionError(_)
                | ApiError::DatabaseTransactionError(_)
                | ApiError::InternalError(_)
                | ApiError::Other(_)
        )
    }
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::OptimisticLockFailure {
                config_id,
                expected,
                actual,
            } => ApiError::OptimisticLockFailure(format!(
                "配置{}已被其他用户修改（期望revision={}，实际revision={}）",
                config_id, expected, actual
            )),

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }

            // 数据质量错误（存储内容无法解析）
            RepositoryError::FieldValueError { field, message } => {
                ApiError::DatabaseError(format!("字段{}错误: {}", field, message))
            }

            // 通用错误
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound { entity, key } => {
                ApiError::NotFound(format!("{}(key={})不存在", entity, key))
            }
            EngineError::InvalidState(msg) => ApiError::InvalidState(msg),
            EngineError::Forbidden(msg) => ApiError::Forbidden(msg),
            EngineError::Validation(msg) => ApiError::ValidationError(msg),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_conversion() {
        // NotFound错误转换
        let repo_err = RepositoryError::NotFound {
            entity: "FormConfiguration".to_string(),
            id: "cfg-001".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("FormConfiguration"));
                assert!(msg.contains("cfg-001"));
            }
            _ => panic!("Expected NotFound"),
        }

        // OptimisticLockFailure转换
        let repo_err = RepositoryError::OptimisticLockFailure {
            config_id: "cfg-001".to_string(),
            expected: 1,
            actual: 2,
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::OptimisticLockFailure(msg) => {
                assert!(msg.contains("cfg-001"));
                assert!(msg.contains("已被其他用户修改"));
            }
            _ => panic!("Expected OptimisticLockFailure"),
        }

        // 名称唯一约束 -> 业务规则违反
        let api_err: ApiError =
            RepositoryError::UniqueConstraintViolation("form_configuration.name".to_string()).into();
        assert_eq!(api_err.code(), "BUSINESS_RULE_VIOLATION");
        assert!(!api_err.is_internal());

        let api_err: ApiError = RepositoryError::LockError("poisoned".to_string()).into();
        assert!(api_err.is_internal());
    }

    #[test]
    fn test_engine_error_conversion() {
        let api_err: ApiError = EngineError::InvalidState("no draft to discard".to_string()).into();
        assert_eq!(api_err.to_string(), "no draft to discard");
        assert_eq!(api_err.code(), "INVALID_STATE");

        let api_err: ApiError = EngineError::Forbidden("内置分区不可删除: pricing".to_string()).into();
        assert!(matches!(api_err, ApiError::Forbidden(_)));

        let api_err: ApiError = EngineError::section_not_found("ghost").into();
        match api_err {
            ApiError::NotFound(msg) => assert!(msg.contains("ghost")),
            _ => panic!("Expected NotFound"),
        }

        let api_err: ApiError = EngineError::Validation("字段键不能为空".to_string()).into();
        assert_eq!(api_err.code(), "VALIDATION_ERROR");
    }
}
