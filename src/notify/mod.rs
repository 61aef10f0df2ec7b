//! In-process notification hub.
//!
//! Handlers and the overdue sweep publish a [`ChangeEvent`] after each
//! committed write. The hub maps it to at most one [`Notification`], drops
//! duplicates, then hands both to every sink. Sinks are independent: one
//! failing or panicking is logged and the rest still run.

mod dedup;
mod event;

pub use dedup::{dedup_key, DedupCache};
pub use event::{notification_for, ChangeEvent, ChangeTable, Notification, NotificationType};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;

/// Capacity of the live stream channel; slow subscribers skip what they missed.
const STREAM_CAPACITY: usize = 256;

/// Message delivered to live stream subscribers.
#[derive(Debug, Clone)]
pub enum HubMessage {
    Notification(Notification),
    Refresh(RefreshHint),
}

/// Tells clients which list to re-fetch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshHint {
    pub table: ChangeTable,
    pub record_id: String,
}

/// Error reported by a sink.
#[derive(Debug)]
pub struct SinkError(pub String);

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for SinkError {}

/// A side effect of a published change.
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// `notification` is `None` for changes that only warrant a refresh.
    fn deliver(
        &self,
        event: &ChangeEvent,
        notification: Option<&Notification>,
    ) -> Result<(), SinkError>;
}

/// Pushes notifications to live subscribers.
pub struct NotificationStreamSink {
    sender: broadcast::Sender<HubMessage>,
}

impl NotificationSink for NotificationStreamSink {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn deliver(
        &self,
        _event: &ChangeEvent,
        notification: Option<&Notification>,
    ) -> Result<(), SinkError> {
        // No active receivers is fine.
        if let Some(notification) = notification {
            let _ = self
                .sender
                .send(HubMessage::Notification(notification.clone()));
        }
        Ok(())
    }
}

/// Writes dispatched notifications to the log.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn deliver(
        &self,
        event: &ChangeEvent,
        notification: Option<&Notification>,
    ) -> Result<(), SinkError> {
        match notification {
            Some(n) => tracing::info!(
                kind = ?n.kind,
                record_id = %n.data.record_id,
                staff_id = ?n.data.staff_id,
                outlet_id = ?n.data.outlet_id,
                "Notification: {}",
                n.title
            ),
            None => tracing::debug!(
                table = event.table.as_str(),
                action = ?event.action,
                record_id = %event.record_id,
                "Change published"
            ),
        }
        Ok(())
    }
}

/// Tells live subscribers which table changed, notification or not.
pub struct RefreshSink {
    sender: broadcast::Sender<HubMessage>,
}

impl NotificationSink for RefreshSink {
    fn name(&self) -> &'static str {
        "refresh"
    }

    fn deliver(
        &self,
        event: &ChangeEvent,
        _notification: Option<&Notification>,
    ) -> Result<(), SinkError> {
        let _ = self.sender.send(HubMessage::Refresh(RefreshHint {
            table: event.table,
            record_id: event.record_id.clone(),
        }));
        Ok(())
    }
}

/// Single dispatch point for change events.
pub struct NotificationHub {
    dedup: Mutex<DedupCache>,
    sender: broadcast::Sender<HubMessage>,
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl NotificationHub {
    /// Create a hub with the stream, log and refresh sinks installed.
    pub fn new(dedup_capacity: usize) -> Self {
        Self::with_sinks(dedup_capacity, Vec::new())
    }

    /// Create a hub whose `extra` sinks run before the built-in ones.
    fn with_sinks(dedup_capacity: usize, extra: Vec<Arc<dyn NotificationSink>>) -> Self {
        let (sender, _) = broadcast::channel(STREAM_CAPACITY);

        let mut sinks = extra;
        sinks.push(Arc::new(NotificationStreamSink {
            sender: sender.clone(),
        }));
        sinks.push(Arc::new(LogSink));
        sinks.push(Arc::new(RefreshSink {
            sender: sender.clone(),
        }));

        Self {
            dedup: Mutex::new(DedupCache::new(dedup_capacity)),
            sender,
            sinks,
        }
    }

    /// Subscribe to the live stream.
    pub fn subscribe(&self) -> broadcast::Receiver<HubMessage> {
        self.sender.subscribe()
    }

    /// Publish a committed change.
    ///
    /// Returns the dispatched notification, or `None` when the event maps to
    /// none or is a duplicate. Duplicates are dropped entirely.
    pub fn publish(&self, event: ChangeEvent) -> Option<Notification> {
        let notification = notification_for(&event);

        if let Some(n) = &notification {
            let fresh = self
                .dedup
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(dedup_key(n));
            if !fresh {
                tracing::debug!(
                    kind = ?n.kind,
                    record_id = %n.data.record_id,
                    "Duplicate notification suppressed"
                );
                return None;
            }
        }

        for sink in &self.sinks {
            match catch_unwind(AssertUnwindSafe(|| sink.deliver(&event, notification.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Notification sink {} failed: {}", sink.name(), e),
                Err(_) => tracing::warn!("Notification sink {} panicked", sink.name()),
            }
        }

        notification
    }
}
