// ==========================================
// 表格批量导入系统 - 目标记录 Domain Trait
// ==========================================
// 职责: 定义校验/持久化协作方接口
// 说明: 编排器只消费该接口，不关心记录如何存储、规则如何表达
// ==========================================

use crate::domain::{DomainRecord, RecordPayload, SchemaMetadata, UpsertOutcome};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

/// 写入选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOptions {
    /// 是否要求请求防伪令牌（后台导入不在 Web 请求内，恒为 false）
    pub csrf_protection: bool,
    /// 载荷中缺失的字段是否清空
    pub clear_missing: bool,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self {
            csrf_protection: true,
            clear_missing: true,
        }
    }
}

impl UpsertOptions {
    /// 后台导入使用的选项
    pub fn for_import() -> Self {
        Self {
            csrf_protection: false,
            clear_missing: false,
        }
    }
}

// ==========================================
// RecordDomain Trait
// ==========================================
// 实现者: SqliteRecordDomain
#[async_trait]
pub trait RecordDomain: Send + Sync {
    /// 按主键查找记录（不存在返回 None，属于行级错误而非任务级错误）
    async fn find(
        &self,
        schema: &SchemaMetadata,
        id: &str,
    ) -> RepositoryResult<Option<DomainRecord>>;

    /// 创建新实例（未落库）
    fn new_instance(&self, schema: &SchemaMetadata) -> DomainRecord;

    /// 将载荷应用到记录并校验、落库
    ///
    /// # 返回
    /// - Ok(outcome): 校验结果（含违规明细与实际记录）
    /// - Err: 存储层异常（由编排器归为任务级 unexpected_error）
    async fn upsert(
        &self,
        schema: &SchemaMetadata,
        record: DomainRecord,
        payload: &RecordPayload,
        options: UpsertOptions,
    ) -> RepositoryResult<UpsertOutcome>;
}
