// ==========================================
// 表格批量导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分级:
// - 致命错误（任务不存在/schema 未知）: 向调用方传播，任务记录不改动
// - 其余错误: 由编排器捕获，转换为任务 status_code
// ==========================================

use crate::repository::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 致命错误 =====
    #[error("导入任务不存在: {id}")]
    ImportNotFound { id: String },

    #[error("导入任务 {id} 引用了未知 schema: {schema}")]
    UnknownSchema { id: String, schema: String },

    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("Excel 写入失败: {0}")]
    ExcelWriteError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("文件存储失败: {0}")]
    StorageError(String),

    // ===== 协作方错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("行处理失败: {0}")]
    AdapterError(String),

    #[error("消息派发失败: {0}")]
    Queue(String),

    #[error("数据验证失败: {0}")]
    Validation(String),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否为需要向调用方传播的致命错误
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ImportError::ImportNotFound { .. } | ImportError::UnknownSchema { .. }
        )
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::XlsxError>
impl From<calamine::XlsxError> for ImportError {
    fn from(err: calamine::XlsxError) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<rust_xlsxwriter::XlsxError>
impl From<rust_xlsxwriter::XlsxError> for ImportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ImportError::ExcelWriteError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
