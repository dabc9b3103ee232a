// ==========================================
// 表格批量导入系统 - 导入事件发布
// ==========================================
// 职责: 定义导入生命周期事件与发布 trait
// 时机:
// - PreImport: 任务已加载、schema 已解析之后
// - PostImport: 任务终态已写入之后
// 约束: 发布失败只记录日志，不影响导入结果
// ==========================================

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, info};

// ==========================================
// 导入事件类型
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImportEventKind {
    /// 导入开始前
    PreImport,
    /// 导入结束后
    PostImport { has_errors: bool },
}

impl ImportEventKind {
    pub fn as_str(&self) -> &str {
        match self {
            ImportEventKind::PreImport => "pre_import",
            ImportEventKind::PostImport { .. } => "post_import",
        }
    }
}

/// 导入事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportEvent {
    pub import_id: String,
    pub schema_name: String,
    pub kind: ImportEventKind,
}

impl ImportEvent {
    pub fn pre_import(import_id: impl Into<String>, schema_name: impl Into<String>) -> Self {
        Self {
            import_id: import_id.into(),
            schema_name: schema_name.into(),
            kind: ImportEventKind::PreImport,
        }
    }

    pub fn post_import(
        import_id: impl Into<String>,
        schema_name: impl Into<String>,
        has_errors: bool,
    ) -> Self {
        Self {
            import_id: import_id.into(),
            schema_name: schema_name.into(),
            kind: ImportEventKind::PostImport { has_errors },
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 导入事件发布者
pub trait ImportEventPublisher: Send + Sync {
    /// 发布事件
    ///
    /// # 返回
    /// - `Err`: 发布失败（调用方只记录日志）
    fn publish(&self, event: &ImportEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
///
/// 用于不需要事件发布的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl ImportEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: &ImportEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        debug!(
            "NoOpEventPublisher: 跳过事件发布 - import_id={}, event={}",
            event.import_id,
            event.kind.as_str()
        );
        Ok(())
    }
}

/// 日志事件发布者
#[derive(Debug, Clone, Default)]
pub struct LoggingEventPublisher;

impl ImportEventPublisher for LoggingEventPublisher {
    fn publish(&self, event: &ImportEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        match &event.kind {
            ImportEventKind::PreImport => {
                info!(import_id = %event.import_id, schema = %event.schema_name, "导入开始");
            }
            ImportEventKind::PostImport { has_errors } => {
                info!(
                    import_id = %event.import_id,
                    schema = %event.schema_name,
                    has_errors,
                    "导入结束"
                );
            }
        }
        Ok(())
    }
}

/// 可选的事件发布者包装
///
/// 简化 Option<Arc<dyn ImportEventPublisher>> 的使用
#[derive(Clone, Default)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn ImportEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn ImportEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（失败只记录警告）
    pub fn publish(&self, event: ImportEvent) {
        match &self.inner {
            Some(publisher) => {
                if let Err(e) = publisher.publish(&event) {
                    tracing::warn!(
                        import_id = %event.import_id,
                        event = event.kind.as_str(),
                        error = %e,
                        "事件发布失败"
                    );
                }
            }
            None => {
                debug!(
                    "OptionalEventPublisher: 未配置发布者，跳过事件 - import_id={}, event={}",
                    event.import_id,
                    event.kind.as_str()
                );
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FailingPublisher {
        calls: Mutex<usize>,
    }

    impl ImportEventPublisher for FailingPublisher {
        fn publish(&self, _event: &ImportEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            *self.calls.lock().unwrap() += 1;
            Err("listener down".into())
        }
    }

    #[test]
    fn test_event_constructors() {
        let event = ImportEvent::post_import("job-1", "product", true);
        assert_eq!(event.kind, ImportEventKind::PostImport { has_errors: true });
        assert_eq!(event.kind.as_str(), "post_import");
        assert_eq!(ImportEvent::pre_import("job-1", "product").kind.as_str(), "pre_import");
    }

    #[test]
    fn test_publish_failure_is_swallowed() {
        let failing = Arc::new(FailingPublisher {
            calls: Mutex::new(0),
        });
        let publisher = OptionalEventPublisher::with_publisher(failing.clone());
        publisher.publish(ImportEvent::pre_import("job-1", "product"));
        assert_eq!(*failing.calls.lock().unwrap(), 1);

        assert!(!OptionalEventPublisher::none().is_configured());
        OptionalEventPublisher::none().publish(ImportEvent::pre_import("job-1", "product"));
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_value(ImportEvent::post_import("job-1", "product", false)).unwrap();
        assert_eq!(json["kind"]["type"], "post_import");
        assert_eq!(json["kind"]["has_errors"], false);
    }
}
