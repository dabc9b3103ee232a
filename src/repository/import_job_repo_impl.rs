// ==========================================
// 表格批量导入系统 - 导入任务 Repository 实现
// ==========================================
// 职责: 实现导入任务数据访问（使用 rusqlite）
// 写入钩子:
// - 插入/更新时 locale 为空则填充默认语言
// - 删除 in_progress 任务被拒绝
// ==========================================

use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use crate::domain::{ImportJob, ImportStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::import_job_repo::ImportJobRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

const SELECT_COLUMNS: &str = r#"
    id, schema_name, adapter, locale, status, status_code,
    total_count, success_count, error_count, started_at, ended_at,
    file_path, result_file_path, extra_json, created_by, created_at, updated_at
"#;

// 数据库行的中间结构（字符串列尚未解析）
struct ImportJobRow {
    id: String,
    schema_name: String,
    adapter: Option<String>,
    locale: Option<String>,
    status: String,
    status_code: Option<String>,
    total_count: i64,
    success_count: i64,
    error_count: i64,
    started_at: Option<String>,
    ended_at: Option<String>,
    file_path: String,
    result_file_path: Option<String>,
    extra_json: String,
    created_by: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ImportJobRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            schema_name: row.get(1)?,
            adapter: row.get(2)?,
            locale: row.get(3)?,
            status: row.get(4)?,
            status_code: row.get(5)?,
            total_count: row.get(6)?,
            success_count: row.get(7)?,
            error_count: row.get(8)?,
            started_at: row.get(9)?,
            ended_at: row.get(10)?,
            file_path: row.get(11)?,
            result_file_path: row.get(12)?,
            extra_json: row.get(13)?,
            created_by: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }

    fn into_job(self) -> RepositoryResult<ImportJob> {
        let status = ImportStatus::from_db_str(&self.status).ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "status".to_string(),
                message: format!("非法的导入状态: {}", self.status),
            }
        })?;

        Ok(ImportJob {
            id: self.id,
            schema_name: self.schema_name,
            adapter: self.adapter,
            locale: self.locale,
            status,
            status_code: self.status_code,
            total_count: self.total_count,
            success_count: self.success_count,
            error_count: self.error_count,
            started_at: parse_optional_datetime("started_at", self.started_at)?,
            ended_at: parse_optional_datetime("ended_at", self.ended_at)?,
            file_path: self.file_path,
            result_file_path: self.result_file_path,
            extra: serde_json::from_str(&self.extra_json)?,
            created_by: self.created_by,
            created_at: parse_datetime("created_at", &self.created_at)?,
            updated_at: parse_datetime("updated_at", &self.updated_at)?,
        })
    }
}

fn parse_datetime(field: &str, raw: &str) -> RepositoryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::FieldValueError {
            field: field.to_string(),
            message: format!("时间格式错误 {}: {}", raw, e),
        })
}

fn parse_optional_datetime(
    field: &str,
    raw: Option<String>,
) -> RepositoryResult<Option<DateTime<Utc>>> {
    raw.map(|value| parse_datetime(field, &value)).transpose()
}

// ==========================================
// ImportJobRepositoryImpl
// ==========================================
pub struct ImportJobRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
    default_locale: String,
}

impl ImportJobRepositoryImpl {
    /// 创建新的 Repository 实例（自动建表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - default_locale: 任务未指定语言时的默认值
    pub fn new(db_path: &str, default_locale: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            default_locale: default_locale.to_string(),
        })
    }

    /// 从已有连接创建（幂等地应用 PRAGMA 与建表）
    pub fn from_connection(
        conn: Arc<Mutex<Connection>>,
        default_locale: &str,
    ) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
            init_schema(&guard)?;
        }

        Ok(Self {
            conn,
            default_locale: default_locale.to_string(),
        })
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入前钩子
    fn before_write(&self, job: &mut ImportJob) {
        if job.locale.is_none() {
            job.locale = Some(self.default_locale.clone());
        }
        job.updated_at = Utc::now();
    }

    fn find_with(conn: &Connection, id: &str) -> RepositoryResult<Option<ImportJob>> {
        let sql = format!("SELECT {} FROM import_job WHERE id = ?1", SELECT_COLUMNS);
        let row = conn
            .query_row(&sql, params![id], ImportJobRow::from_row)
            .optional()?;

        row.map(ImportJobRow::into_job).transpose()
    }

    fn insert_with(conn: &Connection, job: &ImportJob) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO import_job (
                id, schema_name, adapter, locale, status, status_code,
                total_count, success_count, error_count, started_at, ended_at,
                file_path, result_file_path, extra_json, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                job.id,
                job.schema_name,
                job.adapter,
                job.locale,
                job.status.to_db_str(),
                job.status_code,
                job.total_count,
                job.success_count,
                job.error_count,
                job.started_at.map(|dt| dt.to_rfc3339()),
                job.ended_at.map(|dt| dt.to_rfc3339()),
                job.file_path,
                job.result_file_path,
                serde_json::to_string(&job.extra)?,
                job.created_by,
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn update_with(conn: &Connection, job: &ImportJob) -> RepositoryResult<usize> {
        let affected = conn.execute(
            r#"
            UPDATE import_job SET
                schema_name = ?2, adapter = ?3, locale = ?4, status = ?5, status_code = ?6,
                total_count = ?7, success_count = ?8, error_count = ?9,
                started_at = ?10, ended_at = ?11, file_path = ?12, result_file_path = ?13,
                extra_json = ?14, created_by = ?15, updated_at = ?16
            WHERE id = ?1
            "#,
            params![
                job.id,
                job.schema_name,
                job.adapter,
                job.locale,
                job.status.to_db_str(),
                job.status_code,
                job.total_count,
                job.success_count,
                job.error_count,
                job.started_at.map(|dt| dt.to_rfc3339()),
                job.ended_at.map(|dt| dt.to_rfc3339()),
                job.file_path,
                job.result_file_path,
                serde_json::to_string(&job.extra)?,
                job.created_by,
                job.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(affected)
    }
}

#[async_trait]
impl ImportJobRepository for ImportJobRepositoryImpl {
    async fn find(&self, id: &str) -> RepositoryResult<Option<ImportJob>> {
        let conn = self.lock()?;
        Self::find_with(&conn, id)
    }

    async fn insert(&self, job: &mut ImportJob) -> RepositoryResult<()> {
        self.before_write(job);
        let conn = self.lock()?;
        Self::insert_with(&conn, job)?;
        debug!(import_id = %job.id, schema = %job.schema_name, "导入任务已创建");
        Ok(())
    }

    async fn update(&self, job: &mut ImportJob) -> RepositoryResult<()> {
        self.before_write(job);
        let conn = self.lock()?;
        let affected = Self::update_with(&conn, job)?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportJob".to_string(),
                id: job.id.clone(),
            });
        }
        Ok(())
    }

    async fn upsert(&self, job: &mut ImportJob) -> RepositoryResult<()> {
        self.before_write(job);
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        if Self::update_with(&tx, job)? == 0 {
            Self::insert_with(&tx, job)?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> RepositoryResult<bool> {
        let conn = self.lock()?;
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM import_job WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        match status {
            None => Ok(false),
            Some(s) if ImportStatus::from_db_str(&s) == Some(ImportStatus::InProgress) => {
                warn!(import_id = %id, "拒绝删除执行中的导入任务");
                Err(RepositoryError::BusinessRuleViolation(format!(
                    "导入任务 {} 正在执行，不可删除",
                    id
                )))
            }
            Some(_) => {
                conn.execute("DELETE FROM import_job WHERE id = ?1", params![id])?;
                Ok(true)
            }
        }
    }

    async fn list_by_status(&self, status: ImportStatus) -> RepositoryResult<Vec<ImportJob>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM import_job WHERE status = ?1 ORDER BY created_at ASC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![status.to_db_str()], ImportJobRow::from_row)?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row?.into_job()?);
        }
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> ImportJobRepositoryImpl {
        let conn = Connection::open_in_memory().unwrap();
        ImportJobRepositoryImpl::from_connection(Arc::new(Mutex::new(conn)), "en").unwrap()
    }

    #[tokio::test]
    async fn test_insert_fills_default_locale() {
        let repo = repo();
        let mut job = ImportJob::new("product", "uploads/products.csv");
        repo.insert(&mut job).await.unwrap();
        assert_eq!(job.locale.as_deref(), Some("en"));

        let loaded = repo.find(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.locale.as_deref(), Some("en"));
        assert_eq!(loaded.status, ImportStatus::Waiting);
        assert_eq!(loaded.file_path, "uploads/products.csv");
    }

    #[tokio::test]
    async fn test_update_round_trip() {
        let repo = repo();
        let mut job = ImportJob::new("product", "uploads/products.csv").with_locale("fr");
        repo.insert(&mut job).await.unwrap();

        job.status = ImportStatus::InProgress;
        job.started_at = Some(Utc::now());
        job.total_count = 12;
        job.result_file_path = Some("uploads/products_result.csv".to_string());
        repo.update(&mut job).await.unwrap();

        let loaded = repo.find(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ImportStatus::InProgress);
        assert_eq!(loaded.total_count, 12);
        assert_eq!(loaded.locale.as_deref(), Some("fr"));
        assert!(loaded.started_at.is_some());
        assert_eq!(
            loaded.result_file_path.as_deref(),
            Some("uploads/products_result.csv")
        );
    }

    #[tokio::test]
    async fn test_update_missing_job_is_not_found() {
        let repo = repo();
        let mut job = ImportJob::new("product", "a.csv");
        let err = repo.update(&mut job).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));

        repo.upsert(&mut job).await.unwrap();
        assert!(repo.find(&job.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_rejects_in_progress() {
        let repo = repo();
        let mut job = ImportJob::new("product", "a.csv");
        job.status = ImportStatus::InProgress;
        repo.insert(&mut job).await.unwrap();

        let err = repo.delete(&job.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::BusinessRuleViolation(_)));

        job.status = ImportStatus::Error;
        repo.update(&mut job).await.unwrap();
        assert!(repo.delete(&job.id).await.unwrap());
        assert!(!repo.delete(&job.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let repo = repo();
        let mut waiting = ImportJob::new("product", "a.csv");
        let mut failed = ImportJob::new("product", "b.csv");
        failed.status = ImportStatus::Error;
        repo.insert(&mut waiting).await.unwrap();
        repo.insert(&mut failed).await.unwrap();

        let jobs = repo.list_by_status(ImportStatus::Waiting).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, waiting.id);
    }
}
