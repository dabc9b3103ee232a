// ==========================================
// 表格批量导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入编排所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::UnknownColumnPolicy;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入编排所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 行处理配置 =====

    /// 获取检查点间隔（每处理多少行持久化一次进度）
    ///
    /// # 默认值
    /// - 20
    async fn get_batch_size(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;

    // ===== 本地化配置 =====

    /// 获取默认语言（任务未指定 locale 时使用）
    ///
    /// # 默认值
    /// - "en"
    async fn get_default_locale(&self) -> Result<String, Box<dyn Error + Send + Sync>>;

    // ===== 文件配置 =====

    /// 获取结果文件名后缀（插入在扩展名之前）
    ///
    /// # 默认值
    /// - "_result"
    async fn get_result_suffix(&self) -> Result<String, Box<dyn Error + Send + Sync>>;

    /// 获取上传文件存储根目录
    ///
    /// # 默认值
    /// - `<data_dir>/sheet-import/uploads`
    async fn get_storage_root(&self) -> Result<String, Box<dyn Error + Send + Sync>>;

    // ===== 列映射配置 =====

    /// 获取未知列处理策略
    ///
    /// # 默认值
    /// - keep
    async fn get_unknown_column_policy(
        &self,
    ) -> Result<UnknownColumnPolicy, Box<dyn Error + Send + Sync>>;

    /// 主键列出现在表头时，是否同时作为可写字段注册
    ///
    /// # 默认值
    /// - false
    async fn get_register_identifier_field(&self)
        -> Result<bool, Box<dyn Error + Send + Sync>>;
}
