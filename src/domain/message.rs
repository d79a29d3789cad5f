use crate::domain::notification::Notification;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default and maximum time a message is kept by the service while the device is offline: 4 weeks.
pub const MAX_TIME_TO_LIVE_SECS: u32 = 4 * 7 * 24 * 60 * 60;

/// Suffix of the address used for upstream messages, `<sender_id>@gcm.googleapis.com`.
pub const UPSTREAM_DOMAIN: &str = "gcm.googleapis.com";

/// Data key prefixes reserved for the service.
pub const RESERVED_DATA_PREFIXES: [&str; 3] = ["gcm", "google", "goog"];

/// Content type of a downstream message. Regular messages carry none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// The service dropped pending messages; the app should resync with its own server.
    DeletedMessages,
    /// An upstream message reached the service. Carries `message_id`.
    SendEvent,
    /// An upstream message expired or failed before reaching the service.
    /// Carries `message_id` and `error`.
    SendError,
}

impl MessageType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeletedMessages => "deleted_messages",
            Self::SendEvent => "send_event",
            Self::SendError => "send_error",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery priority. On iOS these map to APNs priority 5 and 10.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

/// A message sent to, or received from, the messaging service.
///
/// Inbound messages are handed to [`Listener::on_message`](crate::Listener::on_message) by
/// reference for the duration of the call. Clone the message to keep it; the clone owns an
/// independent copy of the notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    /// Authenticated sender, usually a project number. Downstream only.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub from: String,
    /// Recipient: a registration token, a topic path, or `<sender_id>@gcm.googleapis.com`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub to: String,
    /// Messages sharing a collapse key may be coalesced while the device is offline.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub collapse_key: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, String>,
    #[serde(skip_serializing_if = "Bytes::is_empty")]
    pub raw_data: Bytes,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<MessageType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Seconds the service keeps the message while the device is offline.
    pub time_to_live: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
    /// Set when the app was opened by tapping the notification in the system tray.
    pub notification_opened: bool,
    /// Deep link into the app.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub link: String,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            from: String::new(),
            to: String::new(),
            collapse_key: String::new(),
            data: HashMap::new(),
            raw_data: Bytes::new(),
            message_id: String::new(),
            message_type: None,
            priority: None,
            time_to_live: MAX_TIME_TO_LIVE_SECS,
            error: String::new(),
            error_description: String::new(),
            notification: None,
            notification_opened: false,
            link: String::new(),
        }
    }
}

impl Message {
    /// Creates an empty message addressed to `to`.
    #[must_use]
    pub fn addressed_to(to: impl Into<String>) -> Self {
        Self { to: to.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_notification(mut self, notification: Notification) -> Self {
        self.notification = Some(notification);
        self
    }

    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    /// Acknowledgement that the upstream message `message_id` reached the service.
    #[must_use]
    pub fn send_event(message_id: impl Into<String>) -> Self {
        Self { message_id: message_id.into(), message_type: Some(MessageType::SendEvent), ..Self::default() }
    }

    /// Report that the upstream message `message_id` was not delivered to the service.
    #[must_use]
    pub fn send_error(
        message_id: impl Into<String>,
        error: impl Into<String>,
        error_description: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            message_type: Some(MessageType::SendError),
            error: error.into(),
            error_description: error_description.into(),
            ..Self::default()
        }
    }

    /// Notice that `dropped` pending messages were discarded before delivery.
    #[must_use]
    pub fn deleted_messages(dropped: u64) -> Self {
        Self {
            message_type: Some(MessageType::DeletedMessages),
            error_description: format!("{dropped} pending messages were dropped"),
            ..Self::default()
        }
    }

    /// A regular message, as opposed to a service event.
    #[must_use]
    pub const fn is_regular(&self) -> bool {
        self.message_type.is_none()
    }

    /// Returns true if any data key uses a prefix reserved for the service.
    #[must_use]
    pub fn has_reserved_data(&self) -> bool {
        self.data.keys().any(|key| is_reserved_key(key))
    }

    /// Removes data entries with reserved key prefixes and returns the removed keys, sorted.
    pub fn strip_reserved_data(&mut self) -> Vec<String> {
        let mut removed: Vec<String> = self.data.keys().filter(|key| is_reserved_key(key)).cloned().collect();
        for key in &removed {
            self.data.remove(key);
        }
        removed.sort();
        removed
    }
}

fn is_reserved_key(key: &str) -> bool {
    RESERVED_DATA_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}
