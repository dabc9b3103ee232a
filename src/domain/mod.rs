// ==========================================
// 表格批量导入系统 - 领域层
// ==========================================
// 职责: 导入任务、目标 schema、目标记录的纯数据模型
// 红线: 领域层不依赖仓储层与导入层
// ==========================================

pub mod import_job;
pub mod record;
pub mod schema;
pub mod types;

// 重导出核心类型
pub use import_job::ImportJob;
pub use record::{DomainRecord, RecordPayload, RowStatus, UpsertOutcome, Violation};
pub use schema::{AssociationMetadata, FieldKind, FieldMetadata, SchemaMetadata, SchemaRegistry};
pub use types::{AdapterKind, ImportStatus, UnknownColumnPolicy};
