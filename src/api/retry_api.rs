// ==========================================
// 表格批量导入系统 - 重试API
// ==========================================
// 职责: 重置失败任务并重新投递运行消息
// 流程: 查找 → reset → 持久化 → 投递
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::engine::{ImportManager, ImportQueue, ImportRunMessage};
use crate::i18n;
use std::sync::Arc;
use tracing::{info, instrument};

pub struct RetryService {
    manager: Arc<ImportManager>,
    queue: Arc<dyn ImportQueue>,
}

impl RetryService {
    pub fn new(manager: Arc<ImportManager>, queue: Arc<dyn ImportQueue>) -> Self {
        Self { manager, queue }
    }

    /// 重试导入任务
    ///
    /// # 参数
    /// - id: 任务 ID
    ///
    /// # 返回
    /// - Ok(msg): 已重新入队，msg 为按任务语言翻译的提示
    /// - Err(NotFound): 任务不存在
    /// - Err(NotRetryable): 当前状态不允许重置
    /// - Err(ValidationError): 重置后持久化失败
    #[instrument(skip(self))]
    pub async fn retry(&self, id: &str) -> ApiResult<String> {
        let repo = self.manager.job_repository();
        let mut job = repo
            .find(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("ImportJob(id={})不存在", id)))?;

        let status = job.status;
        if !self.manager.reset(&mut job).await? {
            return Err(ApiError::NotRetryable {
                id: id.to_string(),
                status: status.to_db_str().to_string(),
            });
        }

        repo.upsert(&mut job)
            .await
            .map_err(|e| ApiError::ValidationError(e.to_string()))?;

        self.queue.dispatch(ImportRunMessage::new(&job.id)).await?;
        info!(import_id = %job.id, "导入任务已重新入队");

        let locale = job
            .locale
            .clone()
            .unwrap_or_else(|| self.manager.settings().default_locale.clone());
        Ok(i18n::tr("retry.success", &locale))
    }
}
