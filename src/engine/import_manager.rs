// ==========================================
// 表格批量导入系统 - 导入编排器
// ==========================================
// 状态机:
//   waiting → in_progress → {success, error}
//   error → waiting (reset)
//   success / in_progress 不可重置，in_progress 不可重入
// 主流程（任一步失败即跳到 finish_import，记为 error）:
// 1. 加载任务（不存在 / schema 未知 → 致命错误，向上抛出）
// 2. prepare_import: 防重入检查，进入 in_progress
// 3. duplicate_file: 首次运行时复制原文件为结果文件
// 4. find_columns: 读取结果文件表头
// 5. import_data: 列映射 → 注入保留列 → 选择适配器 → 逐行处理
// 6. finish_import: 写入终态（持久化失败只记录日志）
// ==========================================

use crate::config::ImportSettings;
use crate::domain::{AdapterKind, ImportJob, ImportStatus, SchemaMetadata, SchemaRegistry};
use crate::engine::events::{ImportEvent, ImportEventPublisher, OptionalEventPublisher};
use crate::importer::adapter::{default_adapters, ImportAdapter};
use crate::importer::column_mapper::{find_columns, ColumnMap, ColumnMapper, MappingOptions};
use crate::importer::content_storage::ContentStorage;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::error_codes::ImportErrorCode;
use crate::importer::import_context::ImportContext;
use crate::importer::sheet_io::{SheetIo, UniversalSheetIo, Workbook};
use crate::repository::{ImportJobRepository, RecordDomain};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

// ==========================================
// ImportManager - 导入编排器
// ==========================================
pub struct ImportManager {
    // ===== 协作方 =====
    job_repo: Arc<dyn ImportJobRepository>,
    domain: Arc<dyn RecordDomain>,
    schemas: Arc<SchemaRegistry>,
    storage: Arc<dyn ContentStorage>,
    sheet_io: Arc<dyn SheetIo>,

    // ===== 策略 =====
    adapters: Vec<Arc<dyn ImportAdapter>>,
    events: OptionalEventPublisher,
    settings: ImportSettings,
}

impl ImportManager {
    /// 创建编排器（默认适配器、通用表格读写、默认配置）
    pub fn new(
        job_repo: Arc<dyn ImportJobRepository>,
        domain: Arc<dyn RecordDomain>,
        schemas: Arc<SchemaRegistry>,
        storage: Arc<dyn ContentStorage>,
    ) -> Self {
        Self {
            job_repo,
            domain,
            schemas,
            storage,
            sheet_io: Arc::new(UniversalSheetIo),
            adapters: default_adapters(),
            events: OptionalEventPublisher::none(),
            settings: ImportSettings::default(),
        }
    }

    /// 替换适配器列表（顺序即自动选择顺序）
    pub fn with_adapters(mut self, adapters: Vec<Arc<dyn ImportAdapter>>) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn with_sheet_io(mut self, sheet_io: Arc<dyn SheetIo>) -> Self {
        self.sheet_io = sheet_io;
        self
    }

    pub fn with_event_publisher(mut self, publisher: Arc<dyn ImportEventPublisher>) -> Self {
        self.events = OptionalEventPublisher::with_publisher(publisher);
        self
    }

    pub fn with_settings(mut self, settings: ImportSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn job_repository(&self) -> Arc<dyn ImportJobRepository> {
        Arc::clone(&self.job_repo)
    }

    // ==========================================
    // 重置
    // ==========================================

    /// 将任务重置为 waiting
    ///
    /// # 返回
    /// - Ok(true): 已重置并持久化（状态码、时间戳、计数器全部清空）
    /// - Ok(false): 当前状态不允许重置（in_progress / success），任务未改动
    /// - Err: 持久化失败
    pub async fn reset(&self, job: &mut ImportJob) -> ImportResult<bool> {
        if !job.status.is_resettable() {
            debug!(import_id = %job.id, status = %job.status, "任务状态不允许重置");
            return Ok(false);
        }

        job.status = ImportStatus::Waiting;
        job.status_code = None;
        job.total_count = 0;
        job.success_count = 0;
        job.error_count = 0;
        job.started_at = None;
        job.ended_at = None;

        self.job_repo.upsert(job).await?;
        info!(import_id = %job.id, "任务已重置为 waiting");
        Ok(true)
    }

    // ==========================================
    // 运行
    // ==========================================

    /// 按任务对象运行（以库中最新状态为准）
    pub async fn run_job(&self, job: &ImportJob) -> ImportResult<ImportJob> {
        self.run(&job.id).await
    }

    /// 执行一次完整导入
    ///
    /// # 返回
    /// - Ok(job): 任务最终内存状态（成功或失败都通过 status/status_code 表达）
    /// - Err(ImportNotFound | UnknownSchema): 致命错误，任务未改动
    #[instrument(skip_all, fields(import_id = %id))]
    pub async fn run(&self, id: &str) -> ImportResult<ImportJob> {
        let mut job = self
            .job_repo
            .find(id)
            .await?
            .ok_or_else(|| ImportError::ImportNotFound { id: id.to_string() })?;

        let schema = self.schemas.get_by_name(&job.schema_name).ok_or_else(|| {
            ImportError::UnknownSchema {
                id: id.to_string(),
                schema: job.schema_name.clone(),
            }
        })?;

        info!(schema = %schema.name, status = %job.status, "导入任务已加载");
        self.events
            .publish(ImportEvent::pre_import(&job.id, &job.schema_name));

        let mut has_error = false;

        if !self.prepare_import(&mut job).await {
            has_error = true;
        }

        if !has_error && !self.duplicate_file(&mut job).await {
            has_error = true;
        }

        let mut header = None;
        if !has_error {
            header = self.find_columns(&mut job);
            if header.is_none() {
                has_error = true;
            }
        }

        if let Some((columns, workbook)) = header {
            let (returned, ok) = self.import_data(job, schema, columns, workbook).await;
            job = returned;
            if !ok {
                has_error = true;
            }
        }

        self.finish_import(&mut job, has_error).await;
        self.events.publish(ImportEvent::post_import(
            &job.id,
            &job.schema_name,
            has_error,
        ));

        Ok(job)
    }

    // ==========================================
    // 步骤 2: 进入 in_progress
    // ==========================================
    async fn prepare_import(&self, job: &mut ImportJob) -> bool {
        if job.status == ImportStatus::InProgress {
            warn!(import_id = %job.id, "任务已在执行中，拒绝重入");
            return false;
        }

        job.status = ImportStatus::InProgress;
        job.status_code = None;
        job.started_at = Some(Utc::now());
        job.ended_at = None;

        match self.job_repo.update(job).await {
            Ok(()) => {
                info!(import_id = %job.id, "任务状态: in_progress");
                true
            }
            Err(e) => {
                warn!(import_id = %job.id, error = %e, "任务状态持久化失败");
                false
            }
        }
    }

    // ==========================================
    // 步骤 3: 复制结果文件
    // ==========================================
    async fn duplicate_file(&self, job: &mut ImportJob) -> bool {
        if job.result_file_path.is_some() {
            debug!(import_id = %job.id, "结果文件已存在，跳过复制");
            return true;
        }

        let namespace = self.storage.uploader_name(job);
        let origin_path = job.file_path.clone();
        let result_path = build_result_path(&origin_path, &self.settings.result_suffix);

        if let Err(e) = self.storage.copy(&namespace, &origin_path, &result_path).await {
            warn!(import_id = %job.id, error = %e, "结果文件复制失败");
            job.status_code = Some(ImportErrorCode::ErrorCopyFile.to_status_code());
            if let Err(e) = self.job_repo.update(job).await {
                warn!(import_id = %job.id, error = %e, "任务状态持久化失败");
            }
            return false;
        }

        job.result_file_path = Some(result_path.clone());
        match self.job_repo.update(job).await {
            Ok(()) => {
                info!(import_id = %job.id, result_file = %result_path, "结果文件已创建");
                true
            }
            Err(e) => {
                warn!(import_id = %job.id, error = %e, "结果文件路径持久化失败，删除副本");
                job.result_file_path = None;
                // 删除失败不影响结果
                let _ = self.storage.remove(&namespace, &result_path).await;
                false
            }
        }
    }

    /// 结果文件绝对路径
    fn result_file(&self, job: &ImportJob) -> Option<PathBuf> {
        let namespace = self.storage.uploader_name(job);
        job.result_file_path
            .as_deref()
            .map(|path| self.storage.build_absolute_path(&namespace, path))
    }

    // ==========================================
    // 步骤 4: 读取表头
    // ==========================================
    fn find_columns(&self, job: &mut ImportJob) -> Option<(ColumnMap, Workbook)> {
        let loaded = self
            .result_file(job)
            .ok_or_else(|| ImportError::Validation("结果文件路径为空".to_string()))
            .and_then(|file| self.sheet_io.load(&file));

        match loaded {
            Ok(workbook) => {
                let columns = find_columns(&workbook.sheet);
                debug!(import_id = %job.id, columns = ?columns.names(), "表头已读取");
                Some((columns, workbook))
            }
            Err(e) => {
                warn!(import_id = %job.id, error = %e, "结果文件无法读取");
                job.status_code = Some(ImportErrorCode::UnreadableFile.to_status_code());
                None
            }
        }
    }

    // ==========================================
    // 步骤 5: 导入数据
    // ==========================================
    async fn import_data(
        &self,
        mut job: ImportJob,
        schema: Arc<SchemaMetadata>,
        columns: ColumnMap,
        mut workbook: Workbook,
    ) -> (ImportJob, bool) {
        let file = match self.result_file(&job) {
            Some(file) => file,
            None => {
                job.status_code = Some(ImportErrorCode::UnreadableFile.to_status_code());
                return (job, false);
            }
        };

        // ===== 列映射 =====
        let options = MappingOptions {
            unknown_columns: self.settings.unknown_column_policy,
            register_identifier_field: self.settings.register_identifier_field,
        };
        let mapper = ColumnMapper::new(&schema, options);
        let mut mapping = mapper.classify(&columns);

        job.total_count = i64::from(workbook.sheet.highest_row().saturating_sub(1));

        // ===== 注入保留列 =====
        let first_free = workbook.sheet.highest_column() + 1;
        let added = mapper.inject_reserved(&mut mapping, first_free);
        if !added.is_empty() {
            for (name, position) in &added {
                workbook.sheet.set_cell(*position, 1, name.as_str());
                workbook.sheet.set_auto_size(*position, true);
            }
            if let Err(e) = self.sheet_io.save(&workbook, &file) {
                warn!(import_id = %job.id, error = %e, "结果文件表头写入失败");
                job.status_code = Some(ImportErrorCode::UnexpectedError(e.to_string()).to_status_code());
                return (job, false);
            }
            debug!(import_id = %job.id, added = ?added, "保留列已注入");
        }

        // ===== 构建上下文 =====
        let mut context = ImportContext::new(
            job,
            schema,
            mapping,
            workbook,
            file,
            Arc::clone(&self.sheet_io),
            Arc::clone(&self.job_repo),
            Arc::clone(&self.domain),
            self.settings.batch_size,
        );

        // ===== 选择适配器 =====
        let adapter = match self.select_adapter(&context) {
            Ok(adapter) => adapter,
            Err(code) => {
                warn!(import_id = %context.job().id, status_code = %code, "未找到可用适配器");
                context.job_mut().status_code = Some(code.to_status_code());
                return (context.into_job(), false);
            }
        };

        info!(import_id = %context.job().id, adapter = %adapter.kind(), "开始逐行处理");
        let ok = match adapter.import(&mut context).await {
            Ok(ok) => ok,
            Err(e) => {
                error!(import_id = %context.job().id, error = %e, "行处理异常中止");
                context.job_mut().status_code =
                    Some(ImportErrorCode::UnexpectedError(e.to_string()).to_status_code());
                false
            }
        };

        (context.into_job(), ok)
    }

    /// 选择适配器
    ///
    /// 规则:
    /// 1. 任务显式指定 → 按标识匹配，无匹配为 undefined_adapter
    /// 2. 未指定 → 第一个 validate 通过的适配器，无则为 no_adapter_available
    fn select_adapter(
        &self,
        context: &ImportContext,
    ) -> Result<Arc<dyn ImportAdapter>, ImportErrorCode> {
        if let Some(tag) = context.job().adapter.as_deref() {
            let kind = AdapterKind::from_db_str(tag).ok_or(ImportErrorCode::UndefinedAdapter)?;
            return self
                .adapters
                .iter()
                .find(|a| a.kind() == kind)
                .cloned()
                .ok_or(ImportErrorCode::UndefinedAdapter);
        }

        self.adapters
            .iter()
            .find(|a| a.validate(context))
            .cloned()
            .ok_or(ImportErrorCode::NoAdapterAvailable)
    }

    // ==========================================
    // 步骤 6: 写入终态
    // ==========================================
    async fn finish_import(&self, job: &mut ImportJob, has_error: bool) {
        job.status = if has_error {
            ImportStatus::Error
        } else {
            ImportStatus::Success
        };
        job.ended_at = Some(Utc::now());

        if let Err(e) = self.job_repo.update(job).await {
            error!(import_id = %job.id, error = %e, "任务终态持久化失败");
        }

        info!(
            import_id = %job.id,
            status = %job.status,
            status_code = ?job.status_code,
            total = job.total_count,
            success = job.success_count,
            error = job.error_count,
            "导入任务结束"
        );
    }
}

/// 在扩展名前插入后缀: `dir/a.xlsx` → `dir/a_result.xlsx`
pub fn build_result_path(origin: &str, suffix: &str) -> String {
    let path = Path::new(origin);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => path
            .with_file_name(format!(
                "{}{}.{}",
                stem.to_string_lossy(),
                suffix,
                ext.to_string_lossy()
            ))
            .to_string_lossy()
            .to_string(),
        _ => format!("{}{}", origin, suffix),
    }
}
