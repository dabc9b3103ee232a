// ==========================================
// 表格批量导入系统 - 目标记录 Domain 实现
// ==========================================
// 职责: 基于 SQLite 的通用记录存储（domain_record 表，JSON 存储）
// 校验规则:
// - 字段按 FieldKind 强制类型转换，失败为字段级违规
// - 必填字段为空为字段级违规
// - 关联值必须指向目标 schema 中已存在的记录
// - 载荷中包含未知列为记录级违规
// ==========================================

use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use crate::domain::{
    DomainRecord, FieldKind, RecordPayload, RowStatus, SchemaMetadata, UpsertOutcome, Violation,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_domain::{RecordDomain, UpsertOptions};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Number, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

// ==========================================
// SqliteRecordDomain
// ==========================================
pub struct SqliteRecordDomain {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordDomain {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
            init_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 直接写入一条记录（用于初始化关联数据）
    pub fn seed(
        &self,
        schema_name: &str,
        id: &str,
        values: Map<String, Value>,
    ) -> RepositoryResult<()> {
        let conn = self.lock()?;
        Self::save_with(&conn, schema_name, id, &values)
    }

    /// 统计某个 schema 下的记录数
    pub fn count(&self, schema_name: &str) -> RepositoryResult<i64> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM domain_record WHERE schema_name = ?1",
            params![schema_name],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn exists_with(conn: &Connection, schema_name: &str, id: &str) -> RepositoryResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM domain_record WHERE schema_name = ?1 AND record_id = ?2",
                params![schema_name, id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn save_with(
        conn: &Connection,
        schema_name: &str,
        id: &str,
        values: &Map<String, Value>,
    ) -> RepositoryResult<()> {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO domain_record (schema_name, record_id, data_json, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(schema_name, record_id) DO UPDATE SET
                data_json = excluded.data_json,
                updated_at = excluded.updated_at
            "#,
            params![schema_name, id, serde_json::to_string(values)?, now],
        )?;
        Ok(())
    }
}

#[async_trait]
impl RecordDomain for SqliteRecordDomain {
    async fn find(
        &self,
        schema: &SchemaMetadata,
        id: &str,
    ) -> RepositoryResult<Option<DomainRecord>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT data_json FROM domain_record WHERE schema_name = ?1 AND record_id = ?2",
                params![schema.name, id],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => {
                let values: Map<String, Value> = serde_json::from_str(&json)?;
                Ok(Some(DomainRecord::existing(id, values)))
            }
            None => Ok(None),
        }
    }

    fn new_instance(&self, _schema: &SchemaMetadata) -> DomainRecord {
        DomainRecord::new_instance()
    }

    async fn upsert(
        &self,
        schema: &SchemaMetadata,
        mut record: DomainRecord,
        payload: &RecordPayload,
        options: UpsertOptions,
    ) -> RepositoryResult<UpsertOutcome> {
        let mut field_errors = Vec::new();
        let mut record_errors = Vec::new();

        if options.csrf_protection {
            record_errors.push(Violation::record("The CSRF token is invalid."));
            return Ok(UpsertOutcome::failure(record, field_errors, record_errors));
        }

        if options.clear_missing {
            for field in schema.fields.iter().filter(|f| !f.read_only) {
                if !payload.contains_key(&field.name) {
                    record.values.remove(&field.name);
                }
            }
        }

        let conn = self.lock()?;

        // 逐列应用载荷
        let mut extra_fields = Vec::new();
        for (name, raw) in payload {
            if let Some(field) = schema.field_by_name(name) {
                if field.read_only {
                    extra_fields.push(name.clone());
                    continue;
                }
                match coerce(field.kind, raw) {
                    Ok(value) => {
                        record.values.insert(name.clone(), value);
                    }
                    Err(message) => field_errors.push(Violation::field(name.clone(), message)),
                }
            } else if let Some(association) = schema.association_by_name(name) {
                if association.read_only {
                    extra_fields.push(name.clone());
                    continue;
                }
                match reference_id(raw) {
                    None => {
                        record.values.insert(name.clone(), Value::Null);
                    }
                    Some(target_id) => {
                        if Self::exists_with(&conn, &association.target, &target_id)? {
                            record.values.insert(name.clone(), Value::String(target_id));
                        } else {
                            field_errors
                                .push(Violation::field(name.clone(), "This value is not valid."));
                        }
                    }
                }
            } else {
                extra_fields.push(name.clone());
            }
        }

        if !extra_fields.is_empty() {
            record_errors.push(Violation::record(format!(
                "This form should not contain extra fields: {}.",
                extra_fields.join(", ")
            )));
        }

        // 必填校验
        for field in schema.fields.iter().filter(|f| f.required) {
            if field.name == schema.identifier {
                continue;
            }
            let missing = record
                .values
                .get(&field.name)
                .map(|v| v.is_null())
                .unwrap_or(true);
            let already_reported = field_errors
                .iter()
                .any(|v| v.property_path.as_deref() == Some(field.name.as_str()));
            if missing && !already_reported {
                field_errors.push(Violation::field(
                    field.name.clone(),
                    "This value should not be blank.",
                ));
            }
        }

        if !field_errors.is_empty() || !record_errors.is_empty() {
            return Ok(UpsertOutcome::failure(record, field_errors, record_errors));
        }

        let status = if record.is_new {
            RowStatus::Created
        } else {
            RowStatus::Updated
        };
        let id = record
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        record
            .values
            .insert(schema.identifier.clone(), Value::String(id.clone()));

        Self::save_with(&conn, &schema.name, &id, &record.values)?;
        debug!(schema = %schema.name, record_id = %id, status = %status, "记录已写入");

        record.id = Some(id);
        record.is_new = false;
        Ok(UpsertOutcome::success(record, status))
    }
}

/// 关联值 → 目标主键
fn reference_id(raw: &Value) -> Option<String> {
    match raw {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(number_to_text(n)),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// 数字转文本（整数值的浮点数不带小数位）
fn number_to_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

/// 按字段类型转换原始单元格值
fn coerce(kind: FieldKind, raw: &Value) -> Result<Value, String> {
    if raw.is_null() {
        return Ok(Value::Null);
    }
    if let Value::String(s) = raw {
        if s.trim().is_empty() {
            return Ok(Value::Null);
        }
    }

    match kind {
        FieldKind::Text => Ok(match raw {
            Value::String(s) => Value::String(s.clone()),
            Value::Number(n) => Value::String(number_to_text(n)),
            other => Value::String(other.to_string()),
        }),
        FieldKind::Integer => {
            let parsed = match raw {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            parsed
                .map(|i| Value::Number(i.into()))
                .ok_or_else(|| "This value should be of type integer.".to_string())
        }
        FieldKind::Float => {
            let parsed = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            parsed
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| "This value should be of type float.".to_string())
        }
        FieldKind::Boolean => {
            let parsed = match raw {
                Value::Bool(b) => Some(*b),
                Value::Number(n) => n.as_f64().map(|f| f != 0.0),
                Value::String(s) => match s.trim().to_lowercase().as_str() {
                    "1" | "true" | "yes" | "y" | "on" => Some(true),
                    "0" | "false" | "no" | "n" | "off" => Some(false),
                    _ => None,
                },
                _ => None,
            };
            parsed
                .map(Value::Bool)
                .ok_or_else(|| "This value should be of type bool.".to_string())
        }
    }
}
