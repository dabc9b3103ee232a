// ==========================================
// 表格批量导入系统 - API层错误类型
// ==========================================
// 职责: 将仓储层与导入层错误转换为面向调用方的错误消息
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("导入任务不可重试: id={id}, status={status}")]
    NotRetryable { id: String, status: String },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("消息派发失败: {0}")]
    QueueError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::Serialization(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::ImportNotFound { id } => {
                ApiError::NotFound(format!("ImportJob(id={})不存在", id))
            }
            ImportError::UnknownSchema { id, schema } => {
                ApiError::InvalidInput(format!("导入任务 {} 引用了未知 schema: {}", id, schema))
            }
            ImportError::Validation(msg) => ApiError::ValidationError(msg),
            ImportError::Queue(msg) => ApiError::QueueError(msg),
            ImportError::Repository(err) => err.into(),
            ImportError::Other(err) => ApiError::Other(err),
            other => ApiError::ImportError(other.to_string()),
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
        let repo_err = RepositoryError::NotFound {
            entity: "ImportJob".to_string(),
            id: "J001".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("ImportJob"));
                assert!(msg.contains("J001"));
            }
            _ => panic!("Expected NotFound"),
        }
    }

    #[test]
    fn test_import_error_conversion() {
        let api_err: ApiError = ImportError::UnknownSchema {
            id: "J001".to_string(),
            schema: "ghost".to_string(),
        }
        .into();
        assert!(matches!(api_err, ApiError::InvalidInput(_)));

        let api_err: ApiError = ImportError::FileNotFound("a.csv".to_string()).into();
        match api_err {
            ApiError::ImportError(msg) => assert!(msg.contains("a.csv")),
            _ => panic!("Expected ImportError"),
        }

        let api_err: ApiError =
            ImportError::Repository(RepositoryError::LockError("poisoned".to_string())).into();
        assert!(matches!(api_err, ApiError::DatabaseConnectionError(_)));
    }
}
