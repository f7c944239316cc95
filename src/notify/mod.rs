//! Notification Module
//!
//! Turns push payloads into displayed notifications and routes their actions.

mod dispatcher;
mod intent;

pub use dispatcher::{Navigation, NotificationDispatcher, NotificationSink, RecordingSink};
pub use intent::{NotificationAction, NotificationData, NotificationIntent};
