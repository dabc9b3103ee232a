// ==========================================
// 表格批量导入系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::config::import_settings::{default_storage_root, ImportSettings};
use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use crate::domain::UnknownColumnPolicy;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tracing::warn;

type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            configure_sqlite_connection(&conn_guard)?;
            init_schema(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_config_value(key)?
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string()))
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON 格式，按键排序）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&config_map)?)
    }

    /// 解析全部导入配置为快照
    pub async fn load_settings(&self) -> ConfigResult<ImportSettings> {
        Ok(ImportSettings {
            batch_size: self.get_batch_size().await?,
            default_locale: self.get_default_locale().await?,
            result_suffix: self.get_result_suffix().await?,
            storage_root: self.get_storage_root().await?,
            unknown_column_policy: self.get_unknown_column_policy().await?,
            register_identifier_field: self.get_register_identifier_field().await?,
        })
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    // ===== 行处理配置 =====

    async fn get_batch_size(&self) -> ConfigResult<usize> {
        let value = self.get_config_or_default(config_keys::BATCH_SIZE, "20")?;
        match value.trim().parse::<usize>() {
            Ok(size) if size > 0 => Ok(size),
            _ => {
                warn!(config_key = config_keys::BATCH_SIZE, value = %value, "配置值非法，使用默认值 20");
                Ok(20)
            }
        }
    }

    // ===== 本地化配置 =====

    async fn get_default_locale(&self) -> ConfigResult<String> {
        let value = self.get_config_or_default(config_keys::DEFAULT_LOCALE, crate::i18n::DEFAULT_LOCALE)?;
        Ok(crate::i18n::normalize_locale(&value))
    }

    // ===== 文件配置 =====

    async fn get_result_suffix(&self) -> ConfigResult<String> {
        self.get_config_or_default(config_keys::RESULT_SUFFIX, "_result")
    }

    async fn get_storage_root(&self) -> ConfigResult<String> {
        let default = default_storage_root();
        self.get_config_or_default(config_keys::STORAGE_ROOT, &default)
    }

    // ===== 列映射配置 =====

    async fn get_unknown_column_policy(&self) -> ConfigResult<UnknownColumnPolicy> {
        let value = self.get_config_or_default(config_keys::UNKNOWN_COLUMN_POLICY, "keep")?;
        Ok(UnknownColumnPolicy::from_db_str(&value).unwrap_or_default())
    }

    async fn get_register_identifier_field(&self) -> ConfigResult<bool> {
        let value = self.get_config_or_default(config_keys::REGISTER_IDENTIFIER_FIELD, "false")?;
        Ok(matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes"
        ))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 行处理
    pub const BATCH_SIZE: &str = "import_batch_size";

    // 本地化
    pub const DEFAULT_LOCALE: &str = "default_locale";

    // 文件
    pub const RESULT_SUFFIX: &str = "result_file_suffix";
    pub const STORAGE_ROOT: &str = "storage_root";

    // 列映射
    pub const UNKNOWN_COLUMN_POLICY: &str = "unknown_column_policy";
    pub const REGISTER_IDENTIFIER_FIELD: &str = "register_identifier_field";
}
