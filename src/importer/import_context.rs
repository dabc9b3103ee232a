// ==========================================
// 表格批量导入系统 - 导入上下文
// ==========================================
// 职责: 持有单次运行的全部状态（任务、映射表、结果文件、语言）
// 协议:
// - set_result: 写回 主键/状态/错误信息 三个保留列，并计入成功/失败计数
// - set_result_error: 无法定位记录时写入固定错误状态，仅计入失败计数
// - save_writer / save_import: 检查点持久化（结果文件 / 任务计数器）
// 所有权: 上下文在运行期间独占任务对象，结束后由 into_job 交还编排器
// ==========================================

use crate::domain::{ImportJob, RowStatus, SchemaMetadata, UpsertOutcome};
use crate::i18n::{LocaleHandle, DEFAULT_LOCALE};
use crate::importer::column_mapper::{
    ColumnMap, ColumnMapping, IMPORT_MESSAGE_COLUMN, IMPORT_STATUS_COLUMN,
};
use crate::importer::error::ImportResult;
use crate::importer::sheet_io::{CellValue, SheetIo, Workbook, Worksheet, DEFAULT_ROW_HEIGHT};
use crate::repository::{ImportJobRepository, RecordDomain};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

// ==========================================
// ImportContext
// ==========================================
pub struct ImportContext {
    // ===== 任务与目标 =====
    job: ImportJob,
    schema: Arc<SchemaMetadata>,
    mapping: ColumnMapping,

    // ===== 结果文件 =====
    workbook: Workbook,
    file: PathBuf,
    sheet_io: Arc<dyn SheetIo>,

    // ===== 协作方 =====
    job_repo: Arc<dyn ImportJobRepository>,
    domain: Arc<dyn RecordDomain>,

    // ===== 运行参数 =====
    locale: LocaleHandle,
    batch_size: usize,
}

impl ImportContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job: ImportJob,
        schema: Arc<SchemaMetadata>,
        mapping: ColumnMapping,
        workbook: Workbook,
        file: PathBuf,
        sheet_io: Arc<dyn SheetIo>,
        job_repo: Arc<dyn ImportJobRepository>,
        domain: Arc<dyn RecordDomain>,
        batch_size: usize,
    ) -> Self {
        let locale = LocaleHandle::new(job.locale.as_deref().unwrap_or(DEFAULT_LOCALE));
        Self {
            job,
            schema,
            mapping,
            workbook,
            file,
            sheet_io,
            job_repo,
            domain,
            locale,
            batch_size: batch_size.max(1),
        }
    }

    // ===== 访问器 =====

    pub fn job(&self) -> &ImportJob {
        &self.job
    }

    pub fn job_mut(&mut self) -> &mut ImportJob {
        &mut self.job
    }

    /// 交还任务对象
    pub fn into_job(self) -> ImportJob {
        self.job
    }

    pub fn schema(&self) -> &SchemaMetadata {
        &self.schema
    }

    pub fn schema_handle(&self) -> Arc<SchemaMetadata> {
        Arc::clone(&self.schema)
    }

    pub fn mapping_columns(&self) -> &ColumnMap {
        &self.mapping.columns
    }

    pub fn mapping_fields(&self) -> &ColumnMap {
        &self.mapping.fields
    }

    pub fn mapping_associations(&self) -> &ColumnMap {
        &self.mapping.associations
    }

    pub fn sheet(&self) -> &Worksheet {
        &self.workbook.sheet
    }

    pub fn sheet_mut(&mut self) -> &mut Worksheet {
        &mut self.workbook.sheet
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn domain(&self) -> Arc<dyn RecordDomain> {
        Arc::clone(&self.domain)
    }

    /// 任务语言（未指定时为 en）
    pub fn locale(&self) -> String {
        self.job
            .locale
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string())
    }

    /// 本上下文的活动语言句柄
    pub fn locale_handle(&self) -> &LocaleHandle {
        &self.locale
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    // ===== 保留列位置 =====

    pub fn field_identifier_index(&self) -> u32 {
        self.mapping
            .columns
            .get(self.schema.field_identifier())
            .unwrap_or(self.mapping.columns.len() as u32 + 1)
    }

    pub fn import_status_index(&self) -> u32 {
        self.mapping
            .columns
            .get(IMPORT_STATUS_COLUMN)
            .unwrap_or(self.mapping.columns.len() as u32 + 2)
    }

    pub fn import_message_index(&self) -> u32 {
        self.mapping
            .columns
            .get(IMPORT_MESSAGE_COLUMN)
            .unwrap_or(self.mapping.columns.len() as u32 + 3)
    }

    // ===== 结果回写 =====

    /// 记录一行的写入结果
    pub fn set_result(&mut self, outcome: &UpsertOutcome, row: u32) {
        let has_error = !outcome.is_valid || outcome.has_violations();
        if has_error {
            self.job.error_count += 1;
        } else {
            self.job.success_count += 1;
        }

        let identifier = self.schema.field_identifier().to_string();
        let id_value = outcome
            .record
            .value(&identifier, &identifier)
            .map(|v| CellValue::from_json(&v))
            .unwrap_or_default();
        let status = if has_error {
            RowStatus::Error
        } else {
            outcome.status
        };
        let message = if has_error {
            CellValue::Text(self.build_errors(outcome))
        } else {
            CellValue::Empty
        };

        let (id_col, status_col, message_col) = (
            self.field_identifier_index(),
            self.import_status_index(),
            self.import_message_index(),
        );
        let sheet = &mut self.workbook.sheet;
        sheet.set_cell(id_col, row, id_value);
        sheet.set_cell(status_col, row, status.as_str());
        if let CellValue::Text(text) = &message {
            grow_row_height(sheet, row, text);
        }
        sheet.set_cell(message_col, row, message);
    }

    /// 记录一行无法定位目标记录的错误
    pub fn set_result_error(&mut self, row: u32, message: &str) {
        self.job.error_count += 1;

        let (status_col, message_col) = (self.import_status_index(), self.import_message_index());
        let sheet = &mut self.workbook.sheet;
        sheet.set_cell(status_col, row, RowStatus::Error.as_str());
        sheet.set_cell(message_col, row, message);
        grow_row_height(sheet, row, message);
    }

    /// 构建错误信息块
    ///
    /// 格式:
    /// ```text
    ///
    /// Errors:
    ///   - Field "name": This value should not be blank.
    ///   - This form should not contain extra fields.
    /// ```
    pub fn build_errors(&self, outcome: &UpsertOutcome) -> String {
        let mut message = String::from("\n");
        message.push_str(&self.locale.tr("import.errors_header"));

        for violation in outcome.field_errors.iter().chain(outcome.record_errors.iter()) {
            message.push_str("\n  - ");
            if let Some(path) = &violation.property_path {
                message.push_str(&self.locale.tr_with_args("import.field_prefix", &[("field", path.as_str())]));
            }
            message.push_str(&violation.message);
        }

        if !outcome.has_violations() {
            message.push_str("\n  - ");
            message.push_str(&self.locale.tr("import.error_without_message"));
        }

        message
    }

    // ===== 持久化 =====

    /// 写回结果文件
    pub fn save_writer(&self) -> ImportResult<()> {
        self.sheet_io.save(&self.workbook, &self.file)?;
        debug!(import_id = %self.job.id, file = %self.file.display(), "结果文件已保存");
        Ok(())
    }

    /// 持久化任务（计数器）
    pub async fn save_import(&mut self) -> ImportResult<()> {
        self.job_repo.update(&mut self.job).await?;
        Ok(())
    }

    /// 检查点: 结果文件 + 任务计数器
    pub async fn checkpoint(&mut self) -> ImportResult<()> {
        self.save_writer()?;
        self.save_import().await?;
        debug!(
            import_id = %self.job.id,
            success = self.job.success_count,
            error = self.job.error_count,
            "检查点已持久化"
        );
        Ok(())
    }
}

/// 按行数放大行高（只增不减）
fn grow_row_height(sheet: &mut Worksheet, row: u32, text: &str) {
    let lines = text.lines().count().max(1) as f64;
    let height = lines * DEFAULT_ROW_HEIGHT;
    if height > sheet.row_height(row) {
        sheet.set_row_height(row, height);
    }
}
