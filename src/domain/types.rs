// ==========================================
// 表格批量导入系统 - 领域类型定义
// ==========================================
// 导入任务状态机:
//   waiting → in_progress → {success, error}
//   error → waiting (重试)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 导入状态 (Import Status)
// ==========================================
// 序列化格式: snake_case (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Waiting,    // 等待执行
    InProgress, // 执行中
    Success,    // 已成功
    Error,      // 已失败
}

impl ImportStatus {
    /// 所有合法取值
    pub const ALL: [ImportStatus; 4] = [
        ImportStatus::Waiting,
        ImportStatus::InProgress,
        ImportStatus::Success,
        ImportStatus::Error,
    ];

    /// 从数据库字符串解析（非法值返回 None）
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "waiting" => Some(ImportStatus::Waiting),
            "in_progress" => Some(ImportStatus::InProgress),
            "success" => Some(ImportStatus::Success),
            "error" => Some(ImportStatus::Error),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ImportStatus::Waiting => "waiting",
            ImportStatus::InProgress => "in_progress",
            ImportStatus::Success => "success",
            ImportStatus::Error => "error",
        }
    }

    /// 是否允许重置为 waiting
    ///
    /// in_progress 与 success 不可重置
    pub fn is_resettable(&self) -> bool {
        !matches!(self, ImportStatus::InProgress | ImportStatus::Success)
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportStatus::Success | ImportStatus::Error)
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

// ==========================================
// 适配器类型 (Adapter Kind)
// ==========================================
// 任务上记录的适配器标识，用于显式选择行处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    Standard, // 处理所有数据行
    Trimmed,  // 遇到首个全空行即停止
}

impl AdapterKind {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Some(AdapterKind::Standard),
            "trimmed" => Some(AdapterKind::Trimmed),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            AdapterKind::Standard => "standard",
            AdapterKind::Trimmed => "trimmed",
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

// ==========================================
// 未知列策略 (Unknown Column Policy)
// ==========================================
// 表头中既非字段也非关联的列如何处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownColumnPolicy {
    #[default]
    Keep, // 保留，交由记录校验报告
    Drop, // 丢弃，不进入载荷
}

impl UnknownColumnPolicy {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "keep" => Some(UnknownColumnPolicy::Keep),
            "drop" => Some(UnknownColumnPolicy::Drop),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            UnknownColumnPolicy::Keep => "keep",
            UnknownColumnPolicy::Drop => "drop",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_db_round_trip() {
        for status in ImportStatus::ALL {
            assert_eq!(ImportStatus::from_db_str(status.to_db_str()), Some(status));
        }
        assert_eq!(ImportStatus::from_db_str("IN_PROGRESS"), Some(ImportStatus::InProgress));
        assert_eq!(ImportStatus::from_db_str("running"), None);
    }

    #[test]
    fn test_status_resettable() {
        assert!(ImportStatus::Waiting.is_resettable());
        assert!(ImportStatus::Error.is_resettable());
        assert!(!ImportStatus::InProgress.is_resettable());
        assert!(!ImportStatus::Success.is_resettable());
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&ImportStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_adapter_kind_parse() {
        assert_eq!(AdapterKind::from_db_str("Trimmed"), Some(AdapterKind::Trimmed));
        assert_eq!(AdapterKind::from_db_str("custom"), None);
        assert_eq!(AdapterKind::Standard.to_string(), "standard");
    }

    #[test]
    fn test_unknown_column_policy_parse() {
        assert_eq!(UnknownColumnPolicy::from_db_str("DROP"), Some(UnknownColumnPolicy::Drop));
        assert_eq!(UnknownColumnPolicy::default(), UnknownColumnPolicy::Keep);
        assert_eq!(UnknownColumnPolicy::from_db_str("ignore"), None);
    }
}
