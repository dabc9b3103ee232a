// ==========================================
// 表格批量导入系统 - 逐行处理主循环
// ==========================================
// 流程（每个数据行，从第 2 行开始）:
// 0. 截断模式下，整行为空（忽略结果状态/消息列）即停止
// 1. 读取主键列（空 → 新建记录）
// 2. 读取字段/关联列构建载荷
// 3. 定位目标记录（按主键查找 / 新建实例）
// 4. 找不到 → 行级错误；否则 upsert 并回写结果
// 5. 每 batch_size 行（含第 0 行）检查点持久化
// 结束: 保留列自适应列宽，保存结果文件，恢复语言
// ==========================================

use crate::domain::RecordPayload;
use crate::importer::adapter::RowPostProcessor;
use crate::importer::error::ImportResult;
use crate::importer::import_context::ImportContext;
use crate::repository::UpsertOptions;
use tracing::{debug, info};

/// 主循环选项
#[derive(Debug, Clone, Copy, Default)]
pub struct RowLoopOptions {
    /// 遇到首个全空数据行即停止，并将 total_count 截断为已处理行数
    pub stop_at_blank_row: bool,
}

/// 执行逐行处理
pub async fn process_rows(
    context: &mut ImportContext,
    options: RowLoopOptions,
    post_processor: Option<&dyn RowPostProcessor>,
) -> ImportResult<bool> {
    let locale = context.locale();
    let locale_scope = context.locale_handle().clone().scope(&locale);
    debug!(
        import_id = %context.job().id,
        locale = %locale,
        previous_locale = ?locale_scope.previous(),
        "切换导入语言"
    );

    let schema = context.schema_handle();
    let domain = context.domain();
    let identifier = schema.field_identifier().to_string();
    let id_column = context.mapping_columns().get(&identifier);
    let value_columns: Vec<(String, u32)> = context
        .mapping_fields()
        .iter()
        .chain(context.mapping_associations().iter())
        .map(|(name, position)| (name.to_string(), position))
        .collect();
    let highest_row = context.sheet().highest_row();
    let batch_size = context.batch_size();
    let annotation_columns = [context.import_status_index(), context.import_message_index()];

    let mut final_res = true;
    let mut processed: i64 = 0;

    for (i, row) in (2..=highest_row).enumerate() {
        // 结果状态/消息列不参与空行判断
        if options.stop_at_blank_row && context.sheet().is_row_empty(row, &annotation_columns) {
            info!(
                import_id = %context.job().id,
                row,
                processed,
                "遇到空行，停止处理"
            );
            context.job_mut().total_count = processed;
            break;
        }

        // ===== 主键与载荷 =====
        let id_value = id_column
            .map(|col| context.sheet().cell(col, row))
            .filter(|cell| !cell.is_empty())
            .map(|cell| cell.as_text().trim().to_string());

        let mut payload = RecordPayload::new();
        for (name, col) in &value_columns {
            payload.insert(name.clone(), context.sheet().cell(*col, row).to_json());
        }

        // ===== 定位目标记录 =====
        let record = match &id_value {
            Some(id) => domain.find(&schema, id).await?,
            None => Some(domain.new_instance(&schema)),
        };

        match record {
            None => {
                let message = context.locale_handle().tr("import.object_does_not_exist");
                context.set_result_error(row, &message);
            }
            Some(record) => {
                let outcome = domain
                    .upsert(&schema, record, &payload, UpsertOptions::for_import())
                    .await?;
                final_res = final_res && outcome.is_valid;
                context.set_result(&outcome, row);

                if let Some(post) = post_processor {
                    post.after_row(context, row, &outcome).await?;
                }
            }
        }

        // ===== 检查点 =====
        if i % batch_size == 0 {
            context.checkpoint().await?;
        }

        processed += 1;
    }

    // ===== 收尾 =====
    let reserved = [
        context.field_identifier_index(),
        context.import_status_index(),
        context.import_message_index(),
    ];
    for col in reserved {
        context.sheet_mut().set_auto_size(col, true);
    }
    context.save_writer()?;
    drop(locale_scope);

    info!(
        import_id = %context.job().id,
        processed,
        success = context.job().success_count,
        error = context.job().error_count,
        "数据行处理完成"
    );
    Ok(final_res)
}
