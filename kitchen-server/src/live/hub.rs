//! LiveHub - 厨房实时推送
//!
//! ```text
//! IngestionWorker / kitchen API
//!       │ LiveEvent
//!       ▼
//! LiveHub::notify_clients (序列化一次)
//!   └── viewers: viewer_id → ViewerConnection (仅 open 状态发送)
//!           │
//!           ▼
//!       /ws socket pump
//! ```
//!
//! Best-effort: no retry, no queueing for viewers that are not open.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A connected live viewer
pub trait ViewerConnection: Send + Sync {
    fn is_open(&self) -> bool;

    /// Hand a text frame to the connection; false if it was refused
    fn send_text(&self, text: Arc<str>) -> bool;
}

/// Viewer backed by the outbound queue of a socket pump
pub struct ChannelViewer {
    tx: mpsc::UnboundedSender<Arc<str>>,
}

impl ChannelViewer {
    pub fn new(tx: mpsc::UnboundedSender<Arc<str>>) -> Self {
        Self { tx }
    }
}

impl ViewerConnection for ChannelViewer {
    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send_text(&self, text: Arc<str>) -> bool {
        self.tx.send(text).is_ok()
    }
}

#[derive(Clone, Default)]
pub struct LiveHub {
    viewers: Arc<DashMap<String, Arc<dyn ViewerConnection>>>,
}

impl LiveHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a viewer, returning its id
    pub fn connect(&self, viewer: Arc<dyn ViewerConnection>) -> String {
        let id = Uuid::new_v4().to_string();
        self.viewers.insert(id.clone(), viewer);
        tracing::info!(viewer_id = %id, viewers = self.viewers.len(), "Live viewer connected");
        id
    }

    pub fn disconnect(&self, viewer_id: &str) {
        if self.viewers.remove(viewer_id).is_some() {
            tracing::info!(viewer_id = %viewer_id, viewers = self.viewers.len(), "Live viewer disconnected");
        }
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Serialize `payload` once and send it to every open viewer
    ///
    /// Returns how many viewers accepted the frame.
    pub fn notify_clients<T: Serialize>(&self, payload: &T) -> Result<usize, serde_json::Error> {
        let text: Arc<str> = Arc::from(serde_json::to_string(payload)?);

        let mut delivered = 0;
        for entry in self.viewers.iter() {
            let viewer = entry.value();
            if viewer.is_open() && viewer.send_text(text.clone()) {
                delivered += 1;
            }
        }
        tracing::debug!(delivered, viewers = self.viewers.len(), "Live event sent");
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::LiveEvent;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct RecordingViewer {
        open: AtomicBool,
        frames: Mutex<Vec<String>>,
    }

    impl RecordingViewer {
        fn new(open: bool) -> Arc<Self> {
            Arc::new(Self {
                open: AtomicBool::new(open),
                frames: Mutex::new(Vec::new()),
            })
        }

        fn frames(&self) -> Vec<String> {
            self.frames.lock().unwrap().clone()
        }
    }

    impl ViewerConnection for RecordingViewer {
        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn send_text(&self, text: Arc<str>) -> bool {
            self.frames.lock().unwrap().push(text.to_string());
            true
        }
    }

    fn idle() -> LiveEvent {
        LiveEvent::QueueEmpty {
            message: "idle".into(),
        }
    }

    #[test]
    fn test_only_open_viewers_receive() {
        let hub = LiveHub::new();
        let open = RecordingViewer::new(true);
        let closed = RecordingViewer::new(false);
        hub.connect(open.clone());
        hub.connect(closed.clone());

        let delivered = hub.notify_clients(&idle()).unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(open.frames(), vec![r#"{"type":"QUEUE_EMPTY","message":"idle"}"#]);
        assert!(closed.frames().is_empty());
    }

    #[test]
    fn test_disconnected_viewer_gets_nothing() {
        let hub = LiveHub::new();
        let viewer = RecordingViewer::new(true);
        let id = hub.connect(viewer.clone());
        assert_eq!(hub.viewer_count(), 1);

        hub.disconnect(&id);
        assert_eq!(hub.viewer_count(), 0);
        assert_eq!(hub.notify_clients(&idle()).unwrap(), 0);
        assert!(viewer.frames().is_empty());
    }

    #[test]
    fn test_no_viewers_is_fine() {
        assert_eq!(LiveHub::new().notify_clients(&idle()).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_channel_viewer_closes_with_receiver() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let viewer = ChannelViewer::new(tx);
        assert!(viewer.is_open());
        assert!(viewer.send_text(Arc::from("hello")));
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));

        drop(rx);
        assert!(!viewer.is_open());
        assert!(!viewer.send_text(Arc::from("late")));
    }
}
