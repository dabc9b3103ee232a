// ==========================================
// 表格批量导入系统 - 引擎层
// ==========================================
// 职责: 导入任务状态机编排、生命周期事件、异步运行队列
// 红线: 引擎不拼 SQL，不直接读写表格单元格
// ==========================================

pub mod events;
pub mod import_manager;
pub mod queue;

// 重导出核心引擎
pub use events::{
    ImportEvent, ImportEventKind, ImportEventPublisher, LoggingEventPublisher, NoOpEventPublisher,
    OptionalEventPublisher,
};
pub use import_manager::{build_result_path, ImportManager};
pub use queue::{ChannelImportQueue, ImportQueue, ImportRunHandler, ImportRunMessage, ImportWorker};
