// ==========================================
// 表格批量导入系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + calamine/csv
// 系统定位: 表格文件批量导入编排引擎
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "en");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 导入编排
pub mod engine;

// 导入层 - 表格读写与逐行处理
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 任务控制接口
pub mod api;

// 应用层 - 组件装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{AdapterKind, ImportJob, ImportStatus, SchemaMetadata, SchemaRegistry};

// 引擎
pub use engine::{ImportManager, ImportRunHandler, ImportWorker};

// 导入层
pub use importer::{ImportError, ImportErrorCode, ImportResult};

// API
pub use api::{ApiError, ImportApi, RetryService};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "表格批量导入系统";
