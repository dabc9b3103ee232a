// ==========================================
// 表格批量导入系统 - 导入任务 Repository Trait
// ==========================================
// 职责: 定义导入任务数据访问接口（不包含业务逻辑）
// 红线: Repository 不含状态机规则，只做数据 CRUD 与写入钩子
// ==========================================

use crate::domain::{ImportJob, ImportStatus};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// ImportJobRepository Trait
// ==========================================
// 用途: 导入任务持久化
// 实现者: ImportJobRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait ImportJobRepository: Send + Sync {
    /// 按 ID 查询任务
    ///
    /// # 返回
    /// - Ok(Some(job)): 找到
    /// - Ok(None): 不存在
    async fn find(&self, id: &str) -> RepositoryResult<Option<ImportJob>>;

    /// 插入新任务
    ///
    /// 写入钩子: locale 为空时填充默认语言
    async fn insert(&self, job: &mut ImportJob) -> RepositoryResult<()>;

    /// 更新已有任务（不存在时返回 NotFound）
    ///
    /// 写入钩子: locale 为空时填充默认语言，刷新 updated_at
    async fn update(&self, job: &mut ImportJob) -> RepositoryResult<()>;

    /// 插入或更新
    async fn upsert(&self, job: &mut ImportJob) -> RepositoryResult<()>;

    /// 删除任务
    ///
    /// # 约束
    /// - status = in_progress 的任务拒绝删除（BusinessRuleViolation）
    ///
    /// # 返回
    /// - Ok(true): 已删除
    /// - Ok(false): 任务不存在
    async fn delete(&self, id: &str) -> RepositoryResult<bool>;

    /// 按状态列出任务（按创建时间升序）
    async fn list_by_status(&self, status: ImportStatus) -> RepositoryResult<Vec<ImportJob>>;
}
