// ==========================================
// 表格批量导入系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含状态机规则
// ==========================================
// 职责: 提供数据访问接口，屏蔽数据库细节
// 约束: 所有查询使用参数化
// ==========================================

pub mod error;
pub mod import_job_repo;
pub mod import_job_repo_impl;
pub mod record_domain;
pub mod record_domain_impl;

pub use error::{RepositoryError, RepositoryResult};
pub use import_job_repo::ImportJobRepository;
pub use import_job_repo_impl::ImportJobRepositoryImpl;
pub use record_domain::{RecordDomain, UpsertOptions};
pub use record_domain_impl::SqliteRecordDomain;
