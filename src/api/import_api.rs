// ==========================================
// 表格批量导入系统 - 导入任务API
// ==========================================
// 职责: 登记导入任务、同步运行、查询任务
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::{ImportJob, SchemaRegistry};
use crate::engine::ImportManager;
use crate::importer::content_storage::ContentStorage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// 登记任务请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitImportRequest {
    pub schema_name: String,
    /// 本地源文件路径（会被复制进存储目录）
    pub source_path: String,
    pub adapter: Option<String>,
    pub locale: Option<String>,
    pub created_by: Option<String>,
}

pub struct ImportApi {
    manager: Arc<ImportManager>,
    schemas: Arc<SchemaRegistry>,
    storage: Arc<dyn ContentStorage>,
}

impl ImportApi {
    pub fn new(
        manager: Arc<ImportManager>,
        schemas: Arc<SchemaRegistry>,
        storage: Arc<dyn ContentStorage>,
    ) -> Self {
        Self {
            manager,
            schemas,
            storage,
        }
    }

    /// 登记导入任务（状态 waiting）
    ///
    /// # 流程
    /// 1. 校验 schema 已注册、源文件存在
    /// 2. 将源文件存入 `<任务ID>/<文件名>`
    /// 3. 写入任务记录
    #[instrument(skip(self, request), fields(schema = %request.schema_name))]
    pub async fn submit(&self, request: SubmitImportRequest) -> ApiResult<ImportJob> {
        if !self.schemas.has_by_name(&request.schema_name) {
            return Err(ApiError::InvalidInput(format!(
                "未注册的 schema: {}",
                request.schema_name
            )));
        }

        let source = Path::new(&request.source_path);
        if !source.is_file() {
            return Err(ApiError::InvalidInput(format!(
                "源文件不存在: {}",
                request.source_path
            )));
        }
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ApiError::InvalidInput(format!("无效文件路径: {}", request.source_path)))?;

        let mut job = ImportJob::new(request.schema_name.as_str(), "");
        job.file_path = format!("{}/{}", job.id, file_name);
        job.adapter = request.adapter;
        job.locale = request.locale;
        job.created_by = request.created_by;

        let namespace = self.storage.uploader_name(&job);
        self.storage.store(&namespace, source, &job.file_path).await?;

        self.manager.job_repository().insert(&mut job).await?;
        info!(import_id = %job.id, file = %job.file_path, "导入任务已登记");
        Ok(job)
    }

    /// 同步执行一次导入
    pub async fn run(&self, id: &str) -> ApiResult<ImportJob> {
        Ok(self.manager.run(id).await?)
    }

    /// 查询任务
    pub async fn get_job(&self, id: &str) -> ApiResult<ImportJob> {
        self.manager
            .job_repository()
            .find(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("ImportJob(id={})不存在", id)))
    }
}
