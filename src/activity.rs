use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::config::ACTIVITY_BUFFER_SIZE;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: ActivityKind,
    pub level: ActivityLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Submitted,
    Rejected,
    Charged,
    Completed,
    Failed,
    Exported,
    Credits,
    Settings,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Info,
    Warn,
    Error,
}

/// Recent job lifecycle events: a bounded history plus a live broadcast
/// for SSE subscribers.
pub struct ActivityLog {
    buffer: Arc<RwLock<VecDeque<ActivityEntry>>>,
    sender: broadcast::Sender<ActivityEntry>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::with_capacity(ACTIVITY_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            buffer: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            sender,
            capacity: capacity.max(1),
        }
    }

    pub async fn push(&self, entry: ActivityEntry) {
        let mut buf = self.buffer.write().await;
        if buf.len() >= self.capacity {
            buf.pop_front();
        }
        buf.push_back(entry.clone());
        drop(buf);

        let _ = self.sender.send(entry);
    }

    pub async fn history(&self) -> Vec<ActivityEntry> {
        self.buffer.read().await.iter().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEntry> {
        self.sender.subscribe()
    }

    pub async fn record(
        &self,
        kind: ActivityKind,
        level: ActivityLevel,
        job_id: Option<&str>,
        message: impl Into<String>,
    ) {
        let entry = ActivityEntry {
            timestamp: Utc::now(),
            kind,
            level,
            job_id: job_id.map(str::to_string),
            message: message.into(),
        };
        self.push(entry).await;
    }
}
