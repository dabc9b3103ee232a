// ==========================================
// 表格批量导入系统 - 任务级错误码
// ==========================================
// 写入 import_job.status_code，封闭集合
// ==========================================

use std::fmt;

pub const ERROR_COPY_FILE: &str = "error_copy_file";
pub const UNREADABLE_FILE: &str = "unreadable_file";
pub const UNDEFINED_ADAPTER: &str = "undefined_adapter";
pub const NO_ADAPTER_AVAILABLE: &str = "no_adapter_available";
pub const UNEXPECTED_ERROR: &str = "unexpected_error";

/// 任务级错误码
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportErrorCode {
    /// 上传文件无法复制到工作区
    ErrorCopyFile,
    /// 工作区文件无法识别或读取
    UnreadableFile,
    /// 任务指定的适配器不存在
    UndefinedAdapter,
    /// 没有适配器接受该任务
    NoAdapterAvailable,
    /// 其他异常（携带错误详情）
    UnexpectedError(String),
}

impl ImportErrorCode {
    /// 转换为 status_code 字符串
    pub fn to_status_code(&self) -> String {
        match self {
            ImportErrorCode::ErrorCopyFile => ERROR_COPY_FILE.to_string(),
            ImportErrorCode::UnreadableFile => UNREADABLE_FILE.to_string(),
            ImportErrorCode::UndefinedAdapter => UNDEFINED_ADAPTER.to_string(),
            ImportErrorCode::NoAdapterAvailable => NO_ADAPTER_AVAILABLE.to_string(),
            ImportErrorCode::UnexpectedError(detail) if detail.is_empty() => {
                UNEXPECTED_ERROR.to_string()
            }
            ImportErrorCode::UnexpectedError(detail) => format!("{}: {}", UNEXPECTED_ERROR, detail),
        }
    }

    /// 从 status_code 字符串解析（非错误码返回 None）
    pub fn from_status_code(code: &str) -> Option<Self> {
        match code {
            ERROR_COPY_FILE => Some(ImportErrorCode::ErrorCopyFile),
            UNREADABLE_FILE => Some(ImportErrorCode::UnreadableFile),
            UNDEFINED_ADAPTER => Some(ImportErrorCode::UndefinedAdapter),
            NO_ADAPTER_AVAILABLE => Some(ImportErrorCode::NoAdapterAvailable),
            UNEXPECTED_ERROR => Some(ImportErrorCode::UnexpectedError(String::new())),
            other => other
                .strip_prefix(UNEXPECTED_ERROR)
                .and_then(|rest| rest.strip_prefix(": "))
                .map(|detail| ImportErrorCode::UnexpectedError(detail.to_string())),
        }
    }
}

impl fmt::Display for ImportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_status_code())
    }
}
