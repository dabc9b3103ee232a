// ==========================================
// 表格批量导入系统 - 导入任务领域模型
// ==========================================
// 用途: 上传流程创建（status = waiting），编排器推进生命周期
// 对齐: import_job 表
// 红线: in_progress 的任务不可删除、不可重置、不可并发执行
// ==========================================

use crate::domain::types::ImportStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use uuid::Uuid;

// ==========================================
// ImportJob - 导入任务
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    // ===== 主键 =====
    pub id: String, // 任务 ID（UUID）

    // ===== 目标 =====
    pub schema_name: String,     // 目标 schema 名称
    pub adapter: Option<String>, // 显式指定的适配器标识（None 表示自动选择）
    pub locale: Option<String>,  // 结果文件消息语言

    // ===== 生命周期 =====
    pub status: ImportStatus,
    pub status_code: Option<String>, // 诊断码（成功时为 None）

    // ===== 计数器（单次运行内单调递增）=====
    pub total_count: i64,
    pub success_count: i64,
    pub error_count: i64,

    // ===== 运行时间 =====
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,

    // ===== 文件 =====
    pub file_path: String,                // 原始文件（不可变）
    pub result_file_path: Option<String>, // 结果文件（首次运行时生成，之后不再替换）

    // ===== 扩展 =====
    pub extra: Map<String, Value>,

    // ===== 审计字段 =====
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    /// 创建新的等待中任务
    pub fn new(schema_name: impl Into<String>, file_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            schema_name: schema_name.into(),
            adapter: None,
            locale: None,
            status: ImportStatus::Waiting,
            status_code: None,
            total_count: 0,
            success_count: 0,
            error_count: 0,
            started_at: None,
            ended_at: None,
            file_path: file_path.into(),
            result_file_path: None,
            extra: Map::new(),
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// 原始文件扩展名（不含点）
    pub fn file_extension(&self) -> Option<String> {
        extension_of(&self.file_path)
    }

    pub fn has_result_file(&self) -> bool {
        self.result_file_path.is_some()
    }

    /// 结果文件扩展名（不含点）
    pub fn result_file_extension(&self) -> Option<String> {
        self.result_file_path.as_deref().and_then(extension_of)
    }

    // ===== extra =====

    pub fn has_extra(&self, key: &str) -> bool {
        self.extra.contains_key(key)
    }

    pub fn extra_value(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// 合并 extra，空值（null / "" / [] / {}）视为删除
    pub fn set_extra(&mut self, extra: Map<String, Value>) {
        for (key, value) in extra {
            if is_empty_value(&value) {
                self.extra.remove(&key);
            } else {
                self.extra.insert(key, value);
            }
        }
    }

    pub fn clear_extra(&mut self) {
        self.extra.clear();
    }
}

fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_string())
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_job_is_waiting() {
        let job = ImportJob::new("product", "imports/products.xlsx");
        assert_eq!(job.status, ImportStatus::Waiting);
        assert_eq!(job.total_count, 0);
        assert!(job.started_at.is_none());
        assert!(!job.has_result_file());
        assert_eq!(job.file_extension().as_deref(), Some("xlsx"));
    }

    #[test]
    fn test_result_file_extension() {
        let mut job = ImportJob::new("product", "a/b.csv");
        assert_eq!(job.result_file_extension(), None);
        job.result_file_path = Some("a/b_result.csv".to_string());
        assert_eq!(job.result_file_extension().as_deref(), Some("csv"));
    }

    #[test]
    fn test_set_extra_removes_empty_values() {
        let mut job = ImportJob::new("product", "a.csv");
        let mut extra = Map::new();
        extra.insert("delimiter".to_string(), json!(";"));
        extra.insert("note".to_string(), json!("keep"));
        job.set_extra(extra);
        assert!(job.has_extra("delimiter"));

        let mut extra = Map::new();
        extra.insert("note".to_string(), json!(""));
        job.set_extra(extra);
        assert!(!job.has_extra("note"));
        assert_eq!(job.extra_value("delimiter"), Some(&json!(";")));
    }
}
