// ==========================================
// 表格批量导入系统 - 文件存储
// ==========================================
// 职责: 上传文件与结果文件的复制/删除/路径解析
// 说明: namespace 对应存储根目录下的子目录；任务中记录的是相对路径
// ==========================================

use crate::domain::ImportJob;
use crate::importer::error::{ImportError, ImportResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 导入文件默认命名空间
pub const IMPORT_NAMESPACE: &str = "import";

// ==========================================
// ContentStorage Trait
// ==========================================
// 实现者: LocalContentStorage
#[async_trait]
pub trait ContentStorage: Send + Sync {
    /// 在同一命名空间内复制文件
    async fn copy(&self, namespace: &str, src: &str, dst: &str) -> ImportResult<()>;

    /// 删除文件
    ///
    /// # 返回
    /// - Ok(true): 已删除
    /// - Ok(false): 文件不存在
    async fn remove(&self, namespace: &str, path: &str) -> ImportResult<bool>;

    /// 外部文件写入存储（用于登记新任务）
    async fn store(&self, namespace: &str, source: &Path, dst: &str) -> ImportResult<()>;

    /// 解析为绝对路径（已是绝对路径时原样返回）
    fn build_absolute_path(&self, namespace: &str, path: &str) -> PathBuf;

    /// 任务文件所在命名空间
    fn uploader_name(&self, _job: &ImportJob) -> String {
        IMPORT_NAMESPACE.to_string()
    }
}

// ==========================================
// LocalContentStorage - 本地文件系统实现
// ==========================================
pub struct LocalContentStorage {
    root: PathBuf,
}

impl LocalContentStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ContentStorage for LocalContentStorage {
    async fn copy(&self, namespace: &str, src: &str, dst: &str) -> ImportResult<()> {
        let src_path = self.build_absolute_path(namespace, src);
        let dst_path = self.build_absolute_path(namespace, dst);

        if !tokio::fs::try_exists(&src_path).await.unwrap_or(false) {
            return Err(ImportError::FileNotFound(src_path.display().to_string()));
        }
        if let Some(parent) = dst_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ImportError::StorageError(e.to_string()))?;
        }

        let bytes = tokio::fs::copy(&src_path, &dst_path)
            .await
            .map_err(|e| ImportError::StorageError(e.to_string()))?;
        debug!(src = %src_path.display(), dst = %dst_path.display(), bytes, "文件已复制");
        Ok(())
    }

    async fn remove(&self, namespace: &str, path: &str) -> ImportResult<bool> {
        let target = self.build_absolute_path(namespace, path);
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ImportError::StorageError(e.to_string())),
        }
    }

    async fn store(&self, namespace: &str, source: &Path, dst: &str) -> ImportResult<()> {
        let dst_path = self.build_absolute_path(namespace, dst);
        if let Some(parent) = dst_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ImportError::StorageError(e.to_string()))?;
        }
        tokio::fs::copy(source, &dst_path)
            .await
            .map_err(|e| ImportError::StorageError(e.to_string()))?;
        Ok(())
    }

    fn build_absolute_path(&self, namespace: &str, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(namespace).join(candidate)
        }
    }
}
