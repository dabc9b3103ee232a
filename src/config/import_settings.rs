// ==========================================
// 表格批量导入系统 - 导入配置快照
// ==========================================

use crate::domain::UnknownColumnPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 已解析的导入配置（一次运行内不变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSettings {
    /// 检查点间隔（行）
    pub batch_size: usize,
    pub default_locale: String,
    pub result_suffix: String,
    pub storage_root: String,
    pub unknown_column_policy: UnknownColumnPolicy,
    pub register_identifier_field: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            batch_size: 20,
            default_locale: crate::i18n::DEFAULT_LOCALE.to_string(),
            result_suffix: "_result".to_string(),
            storage_root: default_storage_root(),
            unknown_column_policy: UnknownColumnPolicy::Keep,
            register_identifier_field: false,
        }
    }
}

/// 默认上传目录: `<data_dir>/sheet-import/uploads`，无法获取时退回 `./uploads`
pub fn default_storage_root() -> String {
    dirs::data_dir()
        .map(|dir| dir.join("sheet-import").join("uploads"))
        .unwrap_or_else(|| PathBuf::from("./uploads"))
        .to_string_lossy()
        .to_string()
}
