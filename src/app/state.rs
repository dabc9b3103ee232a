// ==========================================
// 表格批量导入系统 - 应用状态
// ==========================================
// 职责: 组装共享连接、仓储、编排器、队列与 API 实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{ImportApi, RetryService};
use crate::config::{ConfigManager, ImportSettings};
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::SchemaRegistry;
use crate::engine::{
    ChannelImportQueue, ImportManager, ImportRunHandler, ImportWorker, LoggingEventPublisher,
};
use crate::importer::LocalContentStorage;
use crate::repository::{ImportJobRepositoryImpl, SqliteRecordDomain};

/// 应用状态
///
/// 所有组件共享同一个 SQLite 连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 已解析的导入配置
    pub settings: ImportSettings,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 导入编排器
    pub import_manager: Arc<ImportManager>,

    /// 导入任务API
    pub import_api: Arc<ImportApi>,

    /// 重试API
    pub retry_service: Arc<RetryService>,

    /// 目标记录仓储（查询导入结果）
    pub record_domain: Arc<SqliteRecordDomain>,

    /// 队列消费端
    worker: tokio::sync::Mutex<ImportWorker>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - schemas: 已注册的目标 schema
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub async fn new(db_path: String, schemas: SchemaRegistry) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("配置管理器初始化失败: {}", e))?,
        );
        let settings = config_manager
            .load_settings()
            .await
            .map_err(|e| format!("配置读取失败: {}", e))?;
        tracing::debug!(?settings, "导入配置已加载");

        // ==========================================
        // 仓储层
        // ==========================================
        let job_repo = Arc::new(
            ImportJobRepositoryImpl::from_connection(conn.clone(), &settings.default_locale)
                .map_err(|e| format!("任务仓储初始化失败: {}", e))?,
        );
        let record_domain = Arc::new(
            SqliteRecordDomain::from_connection(conn)
                .map_err(|e| format!("记录仓储初始化失败: {}", e))?,
        );
        let storage = Arc::new(LocalContentStorage::new(&settings.storage_root));
        let schemas = Arc::new(schemas);

        // ==========================================
        // 引擎层
        // ==========================================
        let import_manager = Arc::new(
            ImportManager::new(job_repo, record_domain.clone(), schemas.clone(), storage.clone())
                .with_settings(settings.clone())
                .with_event_publisher(Arc::new(LoggingEventPublisher)),
        );
        let (queue, receiver) = ChannelImportQueue::new();
        let worker = ImportWorker::new(ImportRunHandler::new(import_manager.clone()), receiver);

        // ==========================================
        // API 层
        // ==========================================
        let import_api = Arc::new(ImportApi::new(import_manager.clone(), schemas, storage));
        let retry_service = Arc::new(RetryService::new(import_manager.clone(), Arc::new(queue)));

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            settings,
            config_manager,
            import_manager,
            import_api,
            retry_service,
            record_domain,
            worker: tokio::sync::Mutex::new(worker),
        })
    }

    /// 处理队列中已有的全部运行消息
    pub async fn drain_queue(&self) -> usize {
        self.worker.lock().await.drain().await
    }
}

/// 获取默认数据库路径
///
/// # 规则
/// 1. 环境变量 SHEET_IMPORT_DB_PATH
/// 2. `<data_dir>/sheet-import/sheet_import.db`
/// 3. `./sheet_import.db`
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("SHEET_IMPORT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./sheet_import.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("sheet-import");
        // 目录创建失败时仍返回该路径，由打开连接时报错
        std::fs::create_dir_all(&dir).ok();
        path = dir.join("sheet_import.db");
    }

    path.to_string_lossy().to_string()
}
