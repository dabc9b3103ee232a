// ==========================================
// 集成测试替身
// ==========================================
#![allow(dead_code)]

pub mod failing_adapter;
pub mod failing_storage;
pub mod recording_publisher;

pub use failing_adapter::FailingAdapter;
pub use failing_storage::FailingStorage;
pub use recording_publisher::RecordingPublisher;
