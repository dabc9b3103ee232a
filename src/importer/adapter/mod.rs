// ==========================================
// 表格批量导入系统 - 行处理适配器
// ==========================================
// 职责: 可插拔的逐行处理策略
// - validate: 轻量兼容性检查（自动选择时使用）
// - import: 执行逐行写入，返回整体是否全部成功
// 选择逻辑由编排器负责，适配器本身不参与
// ==========================================

pub mod row_loop;
pub mod standard;
pub mod trimmed;

use crate::domain::{AdapterKind, UpsertOutcome};
use crate::importer::error::ImportResult;
use crate::importer::import_context::ImportContext;
use async_trait::async_trait;
use std::sync::Arc;

pub use standard::StandardImportAdapter;
pub use trimmed::TrimmedImportAdapter;

// ==========================================
// ImportAdapter Trait
// ==========================================
#[async_trait]
pub trait ImportAdapter: Send + Sync {
    /// 适配器标识（与任务上的 adapter 字段匹配）
    fn kind(&self) -> AdapterKind;

    /// 是否接受该上下文
    fn validate(&self, context: &ImportContext) -> bool;

    /// 处理全部数据行
    ///
    /// # 返回
    /// - Ok(true): 所有行均写入成功
    /// - Ok(false): 存在行级错误（已记录在结果文件与计数器中）
    /// - Err: 文件或存储层异常（编排器记为 unexpected_error）
    async fn import(&self, context: &mut ImportContext) -> ImportResult<bool>;
}

// ==========================================
// RowPostProcessor Trait
// ==========================================
// 用途: 每行写入完成后的自定义处理（如补充结果列）
#[async_trait]
pub trait RowPostProcessor: Send + Sync {
    async fn after_row(
        &self,
        context: &mut ImportContext,
        row: u32,
        outcome: &UpsertOutcome,
    ) -> ImportResult<()>;
}

/// 默认适配器列表（自动选择时按顺序尝试）
pub fn default_adapters() -> Vec<Arc<dyn ImportAdapter>> {
    vec![
        Arc::new(TrimmedImportAdapter::new()),
        Arc::new(StandardImportAdapter::new()),
    ]
}
