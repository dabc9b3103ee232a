// ==========================================
// 表格批量导入系统 - 目标记录与写入结果
// ==========================================
// 职责: 描述校验/持久化层的输入输出
// 红线: 行级结果不单独持久化，只回写结果文件并计入任务计数器
// ==========================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// 一行数据构建出的更新载荷（字段名 → 原始单元格值）
pub type RecordPayload = Map<String, Value>;

// ==========================================
// DomainRecord - 目标记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DomainRecord {
    /// 主键（新建记录在落库前为 None）
    pub id: Option<String>,
    pub values: Map<String, Value>,
    /// 是否为新实例
    #[serde(default)]
    pub is_new: bool,
}

impl DomainRecord {
    pub fn new_instance() -> Self {
        Self {
            id: None,
            values: Map::new(),
            is_new: true,
        }
    }

    pub fn existing(id: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            id: Some(id.into()),
            values,
            is_new: false,
        }
    }

    /// 读取字段值；`identifier` 字段优先返回主键
    pub fn value(&self, field: &str, identifier: &str) -> Option<Value> {
        if field == identifier {
            if let Some(id) = &self.id {
                return Some(Value::String(id.clone()));
            }
        }
        self.values.get(field).cloned()
    }
}

// ==========================================
// Violation - 校验违规
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// 字段路径（记录级违规为 None）
    pub property_path: Option<String>,
    pub message: String,
}

impl Violation {
    pub fn field(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property_path: Some(path.into()),
            message: message.into(),
        }
    }

    pub fn record(message: impl Into<String>) -> Self {
        Self {
            property_path: None,
            message: message.into(),
        }
    }
}

// ==========================================
// RowStatus - 结果列中的状态标记
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Created,
    Updated,
    Error,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Created => "created",
            RowStatus::Updated => "updated",
            RowStatus::Error => "error",
        }
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// UpsertOutcome - 写入结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub is_valid: bool,
    pub status: RowStatus,
    /// 字段级违规
    pub field_errors: Vec<Violation>,
    /// 记录级违规
    pub record_errors: Vec<Violation>,
    /// 实际写入（或尝试写入）的记录
    pub record: DomainRecord,
}

impl UpsertOutcome {
    pub fn success(record: DomainRecord, status: RowStatus) -> Self {
        Self {
            is_valid: true,
            status,
            field_errors: Vec::new(),
            record_errors: Vec::new(),
            record,
        }
    }

    pub fn failure(
        record: DomainRecord,
        field_errors: Vec<Violation>,
        record_errors: Vec<Violation>,
    ) -> Self {
        Self {
            is_valid: false,
            status: RowStatus::Error,
            field_errors,
            record_errors,
            record,
        }
    }

    pub fn has_violations(&self) -> bool {
        !self.field_errors.is_empty() || !self.record_errors.is_empty()
    }
}
