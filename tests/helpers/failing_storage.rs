// ==========================================
// 可注入复制失败的文件存储
// ==========================================

use async_trait::async_trait;
use sheet_import::domain::ImportJob;
use sheet_import::importer::{ContentStorage, ImportError, ImportResult, LocalContentStorage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 包装本地存储，记录 copy 调用次数；`fail_copy` 时 copy 直接失败
pub struct FailingStorage {
    inner: Arc<LocalContentStorage>,
    fail_copy: bool,
    copies: AtomicUsize,
}

impl FailingStorage {
    /// copy 总是失败
    pub fn failing(inner: Arc<LocalContentStorage>) -> Self {
        Self {
            inner,
            fail_copy: true,
            copies: AtomicUsize::new(0),
        }
    }

    /// 只计数，不注入失败
    pub fn counting(inner: Arc<LocalContentStorage>) -> Self {
        Self {
            inner,
            fail_copy: false,
            copies: AtomicUsize::new(0),
        }
    }

    pub fn copy_calls(&self) -> usize {
        self.copies.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentStorage for FailingStorage {
    async fn copy(&self, namespace: &str, src: &str, dst: &str) -> ImportResult<()> {
        self.copies.fetch_add(1, Ordering::SeqCst);
        if self.fail_copy {
            return Err(ImportError::StorageError("permission denied".to_string()));
        }
        self.inner.copy(namespace, src, dst).await
    }

    async fn remove(&self, namespace: &str, path: &str) -> ImportResult<bool> {
        self.inner.remove(namespace, path).await
    }

    async fn store(&self, namespace: &str, source: &Path, dst: &str) -> ImportResult<()> {
        self.inner.store(namespace, source, dst).await
    }

    fn build_absolute_path(&self, namespace: &str, path: &str) -> PathBuf {
        self.inner.build_absolute_path(namespace, path)
    }

    fn uploader_name(&self, job: &ImportJob) -> String {
        self.inner.uploader_name(job)
    }
}
