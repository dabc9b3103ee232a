// ==========================================
// ImportManager 集成测试
// ==========================================
// 测试目标: 状态机、结果文件、列注入、适配器选择、检查点
// ==========================================

mod helpers;

use async_trait::async_trait;
use helpers::{FailingAdapter, FailingStorage, RecordingPublisher};
use serde_json::Value;
use sheet_import::config::ImportSettings;
use sheet_import::domain::{ImportJob, ImportStatus, UpsertOutcome};
use sheet_import::engine::{ImportEventKind, ImportManager};
use sheet_import::importer::{
    CellValue, ImportContext, ImportError, ImportResult, RowPostProcessor, SheetFormat, SheetIo,
    StandardImportAdapter, TrimmedImportAdapter, UniversalSheetIo, Workbook, Worksheet,
    XlsxSheetIo, IMPORT_MESSAGE_COLUMN, IMPORT_STATUS_COLUMN,
};
use sheet_import::logging;
use sheet_import::repository::{ImportJobRepository, ImportJobRepositoryImpl, RecordDomain};
use std::sync::{Arc, Mutex};
use test_helpers::{product_schema, values, TestEnv};

fn text(s: &str) -> CellValue {
    CellValue::Text(s.to_string())
}

// ==========================================
// 重置
// ==========================================

#[tokio::test]
async fn test_reset_depends_on_prior_status() {
    logging::init_test();
    let env = TestEnv::new();
    let manager = env.manager();

    for status in ImportStatus::ALL {
        let mut job = ImportJob::new("product", "products.csv");
        job.status = status;
        job.status_code = Some("unreadable_file".to_string());
        job.total_count = 5;
        job.success_count = 3;
        job.error_count = 2;
        job.started_at = Some(chrono::Utc::now());
        job.ended_at = Some(chrono::Utc::now());
        let mut job = env.insert_job(job).await;

        let reset = manager.reset(&mut job).await.unwrap();
        let expected = !matches!(status, ImportStatus::InProgress | ImportStatus::Success);
        assert_eq!(reset, expected, "status={}", status);

        let stored = env.reload(&job.id).await;
        if expected {
            assert_eq!(stored.status, ImportStatus::Waiting);
            assert_eq!(stored.status_code, None);
            assert!(stored.started_at.is_none());
            assert!(stored.ended_at.is_none());
            assert_eq!(
                (stored.total_count, stored.success_count, stored.error_count),
                (0, 0, 0)
            );
        } else {
            assert_eq!(stored.status, status);
            assert_eq!(stored.success_count, 3);
        }
    }
}

// ==========================================
// 致命错误
// ==========================================

#[tokio::test]
async fn test_run_missing_job_is_fatal() {
    let env = TestEnv::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let manager = env.manager().with_event_publisher(publisher.clone());

    let err = manager.run("does-not-exist").await.unwrap_err();
    assert!(matches!(err, ImportError::ImportNotFound { .. }));
    assert!(err.is_fatal());
    assert!(publisher.events().is_empty());
}

#[tokio::test]
async fn test_unknown_schema_is_fatal_and_job_untouched() {
    let env = TestEnv::new();
    env.write_upload("orders.csv", b"ref\nA-1\n");
    let job = env.insert_job(ImportJob::new("order", "orders.csv")).await;

    let err = env.manager().run(&job.id).await.unwrap_err();
    match err {
        ImportError::UnknownSchema { schema, .. } => assert_eq!(schema, "order"),
        other => panic!("Expected UnknownSchema, got {:?}", other),
    }

    let stored = env.reload(&job.id).await;
    assert_eq!(stored.status, ImportStatus::Waiting);
    assert!(stored.started_at.is_none());
    assert!(stored.result_file_path.is_none());
}

// ==========================================
// 状态机
// ==========================================

#[tokio::test]
async fn test_in_progress_job_is_not_reentered() {
    let env = TestEnv::new();
    let storage = Arc::new(FailingStorage::counting(env.storage.clone()));
    let mut job = ImportJob::new("product", "products.csv");
    job.status = ImportStatus::InProgress;
    env.write_upload("products.csv", b"name\nChair\n");
    let job = env.insert_job(job).await;

    let finished = env.manager_with_storage(storage.clone()).run(&job.id).await.unwrap();
    assert_eq!(finished.status, ImportStatus::Error);
    assert_eq!(finished.status_code, None);
    assert!(finished.ended_at.is_some());
    assert_eq!(storage.copy_calls(), 0);
    assert!(finished.result_file_path.is_none());

    let stored = env.reload(&job.id).await;
    assert_eq!(stored.status, ImportStatus::Error);
    assert_eq!(env.domain.count("product").unwrap(), 0);
}

#[tokio::test]
async fn test_full_run_creates_records_and_result_file() {
    logging::init_test();
    let env = TestEnv::new();
    let job = env
        .create_job("products.csv", "name,price,stock\nChair,12.5,3\nDesk,99,1\n")
        .await;

    let finished = env.manager().run(&job.id).await.unwrap();
    assert_eq!(finished.status, ImportStatus::Success);
    assert_eq!(finished.status_code, None);
    assert_eq!(finished.total_count, 2);
    assert_eq!(finished.success_count, 2);
    assert_eq!(finished.error_count, 0);
    assert!(finished.started_at.is_some());
    assert!(finished.ended_at.is_some());
    assert_eq!(finished.result_file_path.as_deref(), Some("products_result.csv"));
    assert_eq!(env.domain.count("product").unwrap(), 2);

    let sheet = env.result_sheet(&finished);
    assert_eq!(sheet.cell(4, 1), &text("id"));
    assert_eq!(sheet.cell(5, 1), &text(IMPORT_STATUS_COLUMN));
    assert_eq!(sheet.cell(6, 1), &text(IMPORT_MESSAGE_COLUMN));
    assert_eq!(sheet.cell(5, 2), &text("created"));
    assert_eq!(sheet.cell(5, 3), &text("created"));
    assert!(!sheet.cell(4, 2).is_empty());
    assert!(sheet.cell(6, 2).is_empty());

    // 原文件不被改动
    let origin = UniversalSheetIo.load(&env.upload_path("products.csv")).unwrap();
    assert_eq!(origin.sheet.highest_column(), 3);

    let stored = env.reload(&job.id).await;
    assert_eq!(stored.status, ImportStatus::Success);
    assert_eq!(stored.success_count, 2);
    assert_eq!(stored.result_file_path, finished.result_file_path);
}

#[tokio::test]
async fn test_update_missing_and_blank_row_scenario() {
    let env = TestEnv::new();
    env.seed_product("rec-1", "Chair");
    let job = env
        .create_job("products.csv", "name,id\nChair v2,rec-1\nGhost,missing-id\n,\n")
        .await;

    let finished = env.manager().run(&job.id).await.unwrap();
    assert_eq!(finished.total_count, 2);
    assert_eq!(finished.success_count, 1);
    assert_eq!(finished.error_count, 1);
    // 定位失败只计入行级错误
    assert_eq!(finished.status, ImportStatus::Success);

    let schema = product_schema();
    let updated = env.domain.find(&schema, "rec-1").await.unwrap().unwrap();
    assert_eq!(updated.values["name"], Value::from("Chair v2"));
    assert_eq!(env.domain.count("product").unwrap(), 1);

    let sheet = env.result_sheet(&finished);
    assert_eq!(sheet.cell(3, 1), &text(IMPORT_STATUS_COLUMN));
    assert_eq!(sheet.cell(2, 2), &text("rec-1"));
    assert_eq!(sheet.cell(3, 2), &text("updated"));
    assert_eq!(sheet.cell(3, 3), &text("error"));
    assert_eq!(sheet.cell(4, 3), &text("This object does not exist"));
    assert!(sheet.cell(3, 4).is_empty());
}

#[tokio::test]
async fn test_row_with_only_unmapped_content_is_not_end_of_data() {
    let env = TestEnv::new();
    let job = env
        .create_job("products.csv", "name,notes\nChair,a\n,see next row\nDesk,b\n")
        .await;

    let finished = env.manager().run(&job.id).await.unwrap();
    assert_eq!(finished.total_count, 3);
    assert_eq!(finished.success_count, 2);
    assert_eq!(finished.error_count, 1);
    assert_eq!(finished.status, ImportStatus::Error);
    assert_eq!(env.domain.count("product").unwrap(), 2);

    // 表头: name, notes, id, @import_status, @import_message
    let sheet = env.result_sheet(&finished);
    assert_eq!(sheet.cell(4, 3), &text("error"));
    assert_eq!(sheet.cell(4, 4), &text("created"));
    assert_eq!(sheet.cell(2, 3), &text("see next row"));
}

#[tokio::test]
async fn test_explicit_standard_adapter_processes_blank_rows() {
    let env = TestEnv::new();
    env.write_upload("products.csv", b"name\nChair\n\"\"\nLamp\n");
    let job = env
        .insert_job(ImportJob::new("product", "products.csv").with_adapter("standard"))
        .await;

    let finished = env.manager().run(&job.id).await.unwrap();
    assert_eq!(finished.total_count, 3);
    assert_eq!(finished.success_count, 2);
    assert_eq!(finished.error_count, 1);
    assert_eq!(finished.status, ImportStatus::Error);
    assert_eq!(finished.status_code, None);

    let sheet = env.result_sheet(&finished);
    let message = sheet.cell(4, 3).as_text();
    assert!(message.contains("Errors:"));
    assert!(message.contains("Field \"name\": This value should not be blank."));
}

#[tokio::test]
async fn test_field_violations_are_written_to_message_column() {
    let env = TestEnv::new();
    env.domain
        .seed("category", "cat-1", values(&[("label", Value::from("Seating"))]))
        .unwrap();
    let job = env
        .create_job(
            "products.csv",
            "name,price,category,sku\nChair,abc,cat-1,\nDesk,10,cat-x,\nLamp,5,cat-1,\n",
        )
        .await;

    let finished = env.manager().run(&job.id).await.unwrap();
    assert_eq!(finished.success_count, 1);
    assert_eq!(finished.error_count, 2);
    assert_eq!(finished.status, ImportStatus::Error);

    // 表头: name, price, category, sku, id, @import_status, @import_message
    let sheet = env.result_sheet(&finished);
    let price_error = sheet.cell(7, 2).as_text();
    assert!(price_error.starts_with("\nErrors:"));
    assert!(price_error.contains("Field \"price\": This value should be of type float."));
    assert!(sheet
        .cell(7, 3)
        .as_text()
        .contains("Field \"category\": This value is not valid."));
    assert_eq!(sheet.cell(6, 4), &text("created"));
}

#[tokio::test]
async fn test_result_messages_follow_job_locale() {
    let env = TestEnv::new();
    env.write_upload("products.csv", b"name,id\nGhost,missing\n");
    let job = env
        .insert_job(ImportJob::new("product", "products.csv").with_locale("fr"))
        .await;

    let finished = env.manager().run(&job.id).await.unwrap();
    let sheet = env.result_sheet(&finished);
    assert_eq!(sheet.cell(4, 2), &text("Cet objet n'existe pas"));
    assert_eq!(sheet.cell(3, 2), &text("error"));
}

#[tokio::test]
async fn test_xlsx_round_trip() {
    let env = TestEnv::new();
    let mut sheet = Worksheet::new("products");
    for (col, title) in ["name", "price", "stock"].iter().enumerate() {
        sheet.set_cell(col as u32 + 1, 1, *title);
    }
    sheet.set_cell(1, 2, "Chair");
    sheet.set_cell(2, 2, 12.5);
    sheet.set_cell(3, 2, 3.0);
    sheet.set_cell(1, 3, "Desk");
    sheet.set_cell(2, 3, "not a number");
    let path = env.upload_path("products.xlsx");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    XlsxSheetIo
        .save(&Workbook::new(SheetFormat::Xlsx, sheet), &path)
        .unwrap();
    let job = env.insert_job(ImportJob::new("product", "products.xlsx")).await;

    let finished = env.manager().run(&job.id).await.unwrap();
    assert_eq!(finished.result_file_path.as_deref(), Some("products_result.xlsx"));
    assert_eq!(finished.success_count, 1);
    assert_eq!(finished.error_count, 1);

    let result = UniversalSheetIo
        .load(&env.upload_path("products_result.xlsx"))
        .unwrap();
    assert_eq!(result.format, SheetFormat::Xlsx);
    assert_eq!(result.sheet.cell(5, 1), &text(IMPORT_STATUS_COLUMN));
    assert_eq!(result.sheet.cell(5, 2), &text("created"));
    assert_eq!(result.sheet.cell(5, 3), &text("error"));
    assert!(result
        .sheet
        .cell(6, 3)
        .as_text()
        .contains("This value should be of type float."));
}

#[tokio::test]
async fn test_xlsx_date_cells_keep_their_type() {
    let env = TestEnv::new();
    let released = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut sheet = Worksheet::new("products");
    sheet.set_cell(1, 1, "name");
    sheet.set_cell(2, 1, "released");
    sheet.set_cell(1, 2, "Chair");
    sheet.set_cell(2, 2, released);
    let path = env.upload_path("products.xlsx");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    XlsxSheetIo
        .save(&Workbook::new(SheetFormat::Xlsx, sheet), &path)
        .unwrap();
    let job = env.insert_job(ImportJob::new("product", "products.xlsx")).await;

    let finished = env.manager().run(&job.id).await.unwrap();
    assert_eq!(finished.status, ImportStatus::Success);

    // 表头: name, released, id, @import_status, @import_message
    let result = env.result_sheet(&finished);
    assert_eq!(result.cell(2, 2), &CellValue::DateTime(released));
    assert_eq!(result.cell(4, 2), &text("created"));

    let id = result.cell(3, 2).as_text();
    let record = env.domain.find(&product_schema(), &id).await.unwrap().unwrap();
    assert_eq!(record.values["released"], Value::from("2024-01-01"));
}

// ==========================================
// 结果文件
// ==========================================

#[tokio::test]
async fn test_copy_failure_marks_job_error() {
    let env = TestEnv::new();
    let storage = Arc::new(FailingStorage::failing(env.storage.clone()));
    let job = env.create_job("products.csv", "name\nChair\n").await;

    let finished = env.manager_with_storage(storage.clone()).run(&job.id).await.unwrap();
    assert_eq!(finished.status, ImportStatus::Error);
    assert_eq!(finished.status_code.as_deref(), Some("error_copy_file"));
    assert!(finished.result_file_path.is_none());
    assert_eq!(storage.copy_calls(), 1);

    let stored = env.reload(&job.id).await;
    assert_eq!(stored.status_code.as_deref(), Some("error_copy_file"));
    assert!(stored.result_file_path.is_none());
    assert!(!env.upload_path("products_result.csv").exists());
}

#[tokio::test]
async fn test_result_file_is_duplicated_once() {
    let env = TestEnv::new();
    let storage = Arc::new(FailingStorage::counting(env.storage.clone()));
    let manager = env.manager_with_storage(storage.clone());
    let job = env.create_job("products.csv", "name\nChair\n\"\"\n").await;

    let first = manager.run(&job.id).await.unwrap();
    let path = first.result_file_path.clone();
    assert!(path.is_some());

    let mut job = env.reload(&job.id).await;
    job.status = ImportStatus::Error;
    env.job_repo.update(&mut job).await.unwrap();
    assert!(manager.reset(&mut job).await.unwrap());

    let second = manager.run(&job.id).await.unwrap();
    assert_eq!(storage.copy_calls(), 1);
    assert_eq!(second.result_file_path, path);

    // 第二次运行不重复注入保留列，首轮写回的主键使该行变为更新
    let sheet = env.result_sheet(&second);
    assert_eq!(sheet.highest_column(), 4);
    assert_eq!(sheet.cell(3, 2), &text("updated"));
    assert_eq!(env.domain.count("product").unwrap(), 1);
}

#[tokio::test]
async fn test_unreadable_result_file() {
    let env = TestEnv::new();
    let mut ole = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
    ole.extend_from_slice(&[0u8; 64]);
    env.write_upload("legacy.xls", &ole);
    let job = env.insert_job(ImportJob::new("product", "legacy.xls")).await;

    let finished = env.manager().run(&job.id).await.unwrap();
    assert_eq!(finished.status, ImportStatus::Error);
    assert_eq!(finished.status_code.as_deref(), Some("unreadable_file"));
    assert_eq!(finished.result_file_path.as_deref(), Some("legacy_result.xls"));

    let stored = env.reload(&job.id).await;
    assert_eq!(stored.status_code.as_deref(), Some("unreadable_file"));
}

// ==========================================
// 适配器选择
// ==========================================

#[tokio::test]
async fn test_unknown_adapter_tag_is_undefined() {
    let env = TestEnv::new();
    env.write_upload("products.csv", b"name\nChair\n");
    let job = env
        .insert_job(ImportJob::new("product", "products.csv").with_adapter("bogus"))
        .await;

    let finished = env.manager().run(&job.id).await.unwrap();
    assert_eq!(finished.status, ImportStatus::Error);
    assert_eq!(finished.status_code.as_deref(), Some("undefined_adapter"));
    assert_eq!(env.domain.count("product").unwrap(), 0);
}

#[tokio::test]
async fn test_unregistered_adapter_is_undefined() {
    let env = TestEnv::new();
    env.write_upload("products.csv", b"name\nChair\n");
    let job = env
        .insert_job(ImportJob::new("product", "products.csv").with_adapter("trimmed"))
        .await;

    let manager = env
        .manager()
        .with_adapters(vec![Arc::new(StandardImportAdapter::new())]);
    let finished = manager.run(&job.id).await.unwrap();
    assert_eq!(finished.status_code.as_deref(), Some("undefined_adapter"));
}

#[tokio::test]
async fn test_no_adapter_available() {
    let env = TestEnv::new();
    let job = env.create_job("products.csv", "color,size\nred,L\n").await;

    let manager = env
        .manager()
        .with_adapters(vec![Arc::new(TrimmedImportAdapter::new())]);
    let finished = manager.run(&job.id).await.unwrap();
    assert_eq!(finished.status, ImportStatus::Error);
    assert_eq!(finished.status_code.as_deref(), Some("no_adapter_available"));
    assert_eq!(finished.total_count, 1);
}

#[tokio::test]
async fn test_adapter_failure_is_unexpected_error() {
    let env = TestEnv::new();
    let job = env.create_job("products.csv", "name\nChair\n").await;

    let manager = env.manager().with_adapters(vec![Arc::new(FailingAdapter::new())]);
    let finished = manager.run(&job.id).await.unwrap();
    assert_eq!(finished.status, ImportStatus::Error);
    let code = finished.status_code.unwrap();
    assert!(code.starts_with("unexpected_error: "), "{}", code);
    assert!(code.contains("disk full"));
}

#[tokio::test]
async fn test_default_adapters_fall_back_to_standard() {
    let env = TestEnv::new();
    // 无可写字段: trimmed 拒绝，standard 接受
    let job = env.create_job("products.csv", "color\nred\n").await;

    let finished = env.manager().run(&job.id).await.unwrap();
    assert_eq!(finished.status_code, None);
    assert_eq!(finished.error_count, 1);
    let sheet = env.result_sheet(&finished);
    assert_eq!(sheet.cell(3, 2), &text("error"));
    assert!(sheet.cell(4, 2).as_text().contains("This value should not be blank."));
}

// ==========================================
// 事件
// ==========================================

#[tokio::test]
async fn test_lifecycle_events_are_published() {
    let env = TestEnv::new();
    let publisher = Arc::new(RecordingPublisher::default());
    let job = env.create_job("products.csv", "name\nChair\n").await;

    env.manager()
        .with_event_publisher(publisher.clone())
        .run(&job.id)
        .await
        .unwrap();

    let kinds: Vec<ImportEventKind> = publisher.events().into_iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ImportEventKind::PreImport,
            ImportEventKind::PostImport { has_errors: false }
        ]
    );
}

// ==========================================
// 检查点
// ==========================================

/// 每行处理后观察已持久化的状态
struct CheckpointRecorder {
    repo: Arc<ImportJobRepositoryImpl>,
    seen: Mutex<Vec<(u32, i64, bool)>>,
}

#[async_trait]
impl RowPostProcessor for CheckpointRecorder {
    async fn after_row(
        &self,
        context: &mut ImportContext,
        row: u32,
        _outcome: &UpsertOutcome,
    ) -> ImportResult<()> {
        let persisted = self
            .repo
            .find(&context.job().id)
            .await?
            .ok_or_else(|| ImportError::ImportNotFound {
                id: context.job().id.clone(),
            })?;
        let on_disk = UniversalSheetIo.load(context.file())?;
        let first_row_saved = !on_disk.sheet.cell(context.import_status_index(), 2).is_empty();
        self.seen
            .lock()
            .unwrap()
            .push((row, persisted.success_count, first_row_saved));
        Ok(())
    }
}

#[tokio::test]
async fn test_checkpoint_after_first_row() {
    let env = TestEnv::new();
    let job = env
        .create_job("products.csv", "name\nChair\nDesk\nLamp\n")
        .await;
    let recorder = Arc::new(CheckpointRecorder {
        repo: env.job_repo.clone(),
        seen: Mutex::new(Vec::new()),
    });

    let manager = env.manager().with_adapters(vec![Arc::new(
        StandardImportAdapter::new().with_post_processor(recorder.clone()),
    )]);
    manager.run(&job.id).await.unwrap();

    assert_eq!(
        *recorder.seen.lock().unwrap(),
        vec![(2, 0, false), (3, 1, true), (4, 1, true)]
    );
}

#[tokio::test]
async fn test_checkpoint_interval_follows_settings() {
    let env = TestEnv::new();
    let job = env
        .create_job("products.csv", "name\nChair\nDesk\nLamp\n")
        .await;
    let recorder = Arc::new(CheckpointRecorder {
        repo: env.job_repo.clone(),
        seen: Mutex::new(Vec::new()),
    });

    let settings = ImportSettings {
        batch_size: 1,
        ..ImportSettings::default()
    };
    let manager: ImportManager = env
        .manager()
        .with_settings(settings)
        .with_adapters(vec![Arc::new(
            StandardImportAdapter::new().with_post_processor(recorder.clone()),
        )]);
    manager.run(&job.id).await.unwrap();

    assert_eq!(
        *recorder.seen.lock().unwrap(),
        vec![(2, 0, false), (3, 1, true), (4, 2, true)]
    );
}
