// ==========================================
// 表格批量导入系统 - API 层
// ==========================================
// 职责: 提供任务控制 API，供命令行调用
// ==========================================

pub mod error;
pub mod import_api;
pub mod retry_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, SubmitImportRequest};
pub use retry_api::RetryService;
