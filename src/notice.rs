//! User-facing, non-blocking notifications. Failures of I/O-bound operations end up
//! here instead of propagating to the presentation layer as errors.
use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Logs notices; used by headless drivers.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!("{}", notice.message),
            NoticeLevel::Error => warn!("{}", notice.message),
        }
    }
}

/// Buffers notices until the presentation layer drains them.
#[derive(Debug, Default)]
pub struct NoticeQueue {
    pending: Mutex<VecDeque<Notice>>,
}

impl NoticeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notice> {
        let mut guard = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        guard.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for NoticeQueue {
    fn notify(&self, notice: Notice) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_drains_in_order() {
        let queue = NoticeQueue::new();
        queue.notify(Notice::error("first"));
        queue.notify(Notice::info("second"));
        assert_eq!(queue.len(), 2);
        let drained = queue.drain();
        assert_eq!(drained[0], Notice::error("first"));
        assert_eq!(drained[1].message, "second");
        assert!(queue.is_empty());
    }
}
