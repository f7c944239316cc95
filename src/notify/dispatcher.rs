//! Push notification dispatch and action routing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::NotificationConfig;
use crate::error::{Result, WorkerError};
use crate::notify::intent::PushMessage;
use crate::notify::{NotificationAction, NotificationData, NotificationIntent};

/// Displays notifications to the user.
pub trait NotificationSink: Send + Sync {
    fn show(&self, intent: &NotificationIntent) -> Result<()>;
}

// == Recording Sink ==
/// Keeps the most recent displayed notifications in memory.
#[derive(Debug)]
pub struct RecordingSink {
    shown: Mutex<VecDeque<NotificationIntent>>,
    capacity: usize,
}

impl RecordingSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            shown: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Displayed notifications, oldest first.
    pub fn shown(&self) -> Vec<NotificationIntent> {
        self.shown
            .lock()
            .map(|shown| shown.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl NotificationSink for RecordingSink {
    fn show(&self, intent: &NotificationIntent) -> Result<()> {
        let mut shown = self
            .shown
            .lock()
            .map_err(|_| WorkerError::Internal("notification log poisoned".to_string()))?;
        if self.capacity == 0 {
            return Ok(());
        }
        while shown.len() >= self.capacity {
            shown.pop_front();
        }
        shown.push_back(intent.clone());
        info!("Notification shown: {} - {}", intent.title, intent.body);
        Ok(())
    }
}

/// Application navigation requested by a notification action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub url: String,
}

// == Notification Dispatcher ==
pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
    config: NotificationConfig,
    sequence: AtomicU64,
}

impl NotificationDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>, config: NotificationConfig) -> Self {
        Self {
            sink,
            config,
            sequence: AtomicU64::new(1),
        }
    }

    // == On Push ==
    /// Builds an intent from `payload` and displays it. Never fails.
    ///
    /// A missing, empty or non-UTF-8 payload gets the default body. A JSON
    /// object may override title, body, tag, url and icon; any other text
    /// becomes the body verbatim.
    pub async fn on_push(&self, payload: Option<&[u8]>) -> NotificationIntent {
        let message = parse_payload(payload);
        let intent = self.build_intent(message);

        if let Err(e) = self.sink.show(&intent) {
            warn!("Failed to display notification #{}: {}", intent.data.primary_key, e);
        }
        intent
    }

    // == On Action ==
    /// Routes a click on `action_id`. Unknown actions dismiss.
    pub fn on_action(&self, action_id: &str, intent: &NotificationIntent) -> Option<Navigation> {
        match action_id {
            "explore" | "view" => {
                let url = intent
                    .data
                    .url
                    .clone()
                    .unwrap_or_else(|| self.config.default_url.clone());
                debug!("Notification #{} action '{}' -> {}", intent.data.primary_key, action_id, url);
                Some(Navigation { url })
            }
            _ => {
                debug!("Notification #{} dismissed ('{}')", intent.data.primary_key, action_id);
                None
            }
        }
    }

    fn build_intent(&self, message: PushMessage) -> NotificationIntent {
        let config = &self.config;
        NotificationIntent {
            title: message.title.unwrap_or_else(|| config.title.clone()),
            body: message.body.unwrap_or_else(|| config.default_body.clone()),
            icon: message.icon.unwrap_or_else(|| config.icon.clone()),
            badge: config.badge.clone(),
            vibrate: config.vibrate.clone(),
            tag: message.tag,
            data: NotificationData {
                date_of_arrival: Utc::now(),
                primary_key: self.sequence.fetch_add(1, Ordering::Relaxed),
                url: message.url,
            },
            actions: vec![
                NotificationAction::new("explore", "View Update", "/icons/checkmark.png"),
                NotificationAction::new("close", "Dismiss", "/icons/xmark.png"),
            ],
        }
    }
}

fn parse_payload(payload: Option<&[u8]>) -> PushMessage {
    let Some(text) = payload.and_then(|bytes| std::str::from_utf8(bytes).ok()) else {
        return PushMessage::default();
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return PushMessage::default();
    }

    if trimmed.starts_with('{') {
        if let Ok(message) = serde_json::from_str::<PushMessage>(trimmed) {
            return message;
        }
    }
    PushMessage {
        body: Some(text.to_string()),
        ..PushMessage::default()
    }
}
