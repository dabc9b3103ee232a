// ==========================================
// 记录事件的发布者
// ==========================================

use sheet_import::engine::{ImportEvent, ImportEventPublisher};
use std::error::Error;
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<ImportEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<ImportEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ImportEventPublisher for RecordingPublisher {
    fn publish(&self, event: &ImportEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
