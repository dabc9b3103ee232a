// ==========================================
// 表格批量导入系统 - 配置层
// ==========================================
// 职责: 导入配置管理，未配置或非法时回落默认值
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;
pub mod import_settings;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::ImportConfigReader;
pub use import_settings::{default_storage_root, ImportSettings};
