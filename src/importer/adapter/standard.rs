// ==========================================
// 表格批量导入系统 - 标准适配器
// ==========================================
// 处理第 2 行至最后一行的全部数据行（空行也会尝试写入）
// ==========================================

use crate::domain::AdapterKind;
use crate::importer::adapter::row_loop::{process_rows, RowLoopOptions};
use crate::importer::adapter::{ImportAdapter, RowPostProcessor};
use crate::importer::error::ImportResult;
use crate::importer::import_context::ImportContext;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Default)]
pub struct StandardImportAdapter {
    post_processor: Option<Arc<dyn RowPostProcessor>>,
}

impl StandardImportAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 挂载逐行后处理
    pub fn with_post_processor(mut self, post_processor: Arc<dyn RowPostProcessor>) -> Self {
        self.post_processor = Some(post_processor);
        self
    }
}

#[async_trait]
impl ImportAdapter for StandardImportAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Standard
    }

    fn validate(&self, _context: &ImportContext) -> bool {
        true
    }

    async fn import(&self, context: &mut ImportContext) -> ImportResult<bool> {
        process_rows(
            context,
            RowLoopOptions::default(),
            self.post_processor.as_deref(),
        )
        .await
    }
}
