// ==========================================
// 表格批量导入系统 - 导入任务队列
// ==========================================
// 职责: 以消息形式异步触发导入运行
// 消息: ImportRunMessage { id }
// 约束:
// - 单个任务的处理严格串行（一个 worker 顺序消费）
// - 出队时任务已被删除（不存在）视为正常，吞掉错误
// ==========================================

use crate::engine::import_manager::ImportManager;
use crate::importer::error::{ImportError, ImportResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// 导入运行消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRunMessage {
    pub id: String,
}

impl ImportRunMessage {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

// ==========================================
// ImportQueue Trait
// ==========================================
#[async_trait]
pub trait ImportQueue: Send + Sync {
    /// 投递一条运行消息
    async fn dispatch(&self, message: ImportRunMessage) -> ImportResult<()>;
}

// ==========================================
// ChannelImportQueue - 基于 tokio mpsc 的进程内队列
// ==========================================
#[derive(Clone)]
pub struct ChannelImportQueue {
    sender: mpsc::UnboundedSender<ImportRunMessage>,
}

impl ChannelImportQueue {
    /// 创建队列，返回 (队列, 接收端)
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ImportRunMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ImportQueue for ChannelImportQueue {
    async fn dispatch(&self, message: ImportRunMessage) -> ImportResult<()> {
        debug!(import_id = %message.id, "投递导入消息");
        self.sender
            .send(message)
            .map_err(|e| ImportError::Queue(format!("队列已关闭: {}", e.0.id)))
    }
}

// ==========================================
// ImportRunHandler - 消息处理
// ==========================================
pub struct ImportRunHandler {
    manager: Arc<ImportManager>,
}

impl ImportRunHandler {
    pub fn new(manager: Arc<ImportManager>) -> Self {
        Self { manager }
    }

    /// 处理一条消息
    ///
    /// # 返回
    /// - Ok(()): 已运行，或任务已不存在
    /// - Err: 其他致命错误（如 schema 未知、仓储异常）
    pub async fn handle(&self, message: &ImportRunMessage) -> ImportResult<()> {
        match self.manager.run(&message.id).await {
            Ok(job) => {
                debug!(import_id = %job.id, status = %job.status, "导入消息处理完成");
                Ok(())
            }
            Err(ImportError::ImportNotFound { id }) => {
                info!(import_id = %id, "任务已删除，忽略消息");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

// ==========================================
// ImportWorker - 顺序消费
// ==========================================
pub struct ImportWorker {
    handler: ImportRunHandler,
    receiver: mpsc::UnboundedReceiver<ImportRunMessage>,
}

impl ImportWorker {
    pub fn new(handler: ImportRunHandler, receiver: mpsc::UnboundedReceiver<ImportRunMessage>) -> Self {
        Self { handler, receiver }
    }

    /// 处理当前已入队的全部消息后返回（不等待新消息）
    ///
    /// # 返回
    /// 已处理的消息数
    pub async fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.receiver.try_recv() {
            self.process(&message).await;
            handled += 1;
        }
        handled
    }

    /// 持续消费，直到所有发送端关闭
    pub async fn run(mut self) {
        while let Some(message) = self.receiver.recv().await {
            self.process(&message).await;
        }
        info!("导入队列已关闭，worker 退出");
    }

    async fn process(&self, message: &ImportRunMessage) {
        if let Err(e) = self.handler.handle(message).await {
            warn!(import_id = %message.id, error = %e, "导入消息处理失败");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_queue_delivers_in_order() {
        let (queue, mut receiver) = ChannelImportQueue::new();
        queue.dispatch(ImportRunMessage::new("a")).await.unwrap();
        queue.dispatch(ImportRunMessage::new("b")).await.unwrap();

        assert_eq!(receiver.recv().await.unwrap().id, "a");
        assert_eq!(receiver.recv().await.unwrap().id, "b");
    }

    #[tokio::test]
    async fn test_dispatch_after_receiver_dropped_fails() {
        let (queue, receiver) = ChannelImportQueue::new();
        drop(receiver);
        let err = queue.dispatch(ImportRunMessage::new("a")).await.unwrap_err();
        assert!(matches!(err, ImportError::Queue(_)));
    }
}
