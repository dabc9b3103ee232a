// ==========================================
// 执行即失败的适配器
// ==========================================

use async_trait::async_trait;
use sheet_import::domain::AdapterKind;
use sheet_import::importer::{ImportAdapter, ImportContext, ImportError, ImportResult};

pub struct FailingAdapter {
    pub accepts: bool,
}

impl FailingAdapter {
    pub fn new() -> Self {
        Self { accepts: true }
    }
}

#[async_trait]
impl ImportAdapter for FailingAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Standard
    }

    fn validate(&self, _context: &ImportContext) -> bool {
        self.accepts
    }

    async fn import(&self, _context: &mut ImportContext) -> ImportResult<bool> {
        Err(ImportError::AdapterError("disk full".to_string()))
    }
}
