// ==========================================
// 表格批量导入系统 - 截断适配器
// ==========================================
// 遇到首个全空数据行视为数据结束:
// - 停止处理后续行
// - total_count 截断为实际处理的行数
// 仅在至少映射了一个字段或关联时接受任务
// ==========================================

use crate::domain::AdapterKind;
use crate::importer::adapter::row_loop::{process_rows, RowLoopOptions};
use crate::importer::adapter::{ImportAdapter, RowPostProcessor};
use crate::importer::error::ImportResult;
use crate::importer::import_context::ImportContext;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Default)]
pub struct TrimmedImportAdapter {
    post_processor: Option<Arc<dyn RowPostProcessor>>,
}

impl TrimmedImportAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_post_processor(mut self, post_processor: Arc<dyn RowPostProcessor>) -> Self {
        self.post_processor = Some(post_processor);
        self
    }
}

#[async_trait]
impl ImportAdapter for TrimmedImportAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Trimmed
    }

    fn validate(&self, context: &ImportContext) -> bool {
        !context.mapping_fields().is_empty() || !context.mapping_associations().is_empty()
    }

    async fn import(&self, context: &mut ImportContext) -> ImportResult<bool> {
        process_rows(
            context,
            RowLoopOptions {
                stop_at_blank_row: true,
            },
            self.post_processor.as_deref(),
        )
        .await
    }
}
