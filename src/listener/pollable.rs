use crate::domain::message::Message;
use crate::listener::Listener;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Pending {
    messages: VecDeque<Message>,
    token: Option<String>,
}

/// A listener that queues events so a main loop can consume them by polling.
///
/// ```no_run
/// # use cloud_messaging::PollableListener;
/// let listener = PollableListener::new();
/// loop {
///     if let Some(token) = listener.poll_registration_token() {
///         tracing::info!(%token, "received a registration token");
///     }
///     while let Some(message) = listener.poll_message() {
///         tracing::info!(message_id = %message.message_id, "received a new message");
///     }
/// }
/// ```
#[derive(Debug, Default)]
pub struct PollableListener {
    pending: Mutex<Pending>,
}

impl PollableListener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pops the oldest queued message, if any.
    pub fn poll_message(&self) -> Option<Message> {
        self.lock().messages.pop_front()
    }

    /// Takes the registration token received since the last poll, if any.
    pub fn poll_registration_token(&self) -> Option<String> {
        self.lock().token.take()
    }

    /// Number of messages waiting to be polled.
    pub fn pending_messages(&self) -> usize {
        self.lock().messages.len()
    }

    // A panicking listener thread must not wedge the main loop; the queue is always consistent.
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Listener for PollableListener {
    fn on_message(&self, message: &Message) {
        self.lock().messages.push_back(message.clone());
    }

    fn on_token_received(&self, token: &str) {
        self.lock().token = Some(token.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_empty_listener() {
        let listener = PollableListener::new();
        assert!(listener.poll_message().is_none());
        assert!(listener.poll_registration_token().is_none());
        assert_eq!(listener.pending_messages(), 0);
    }

    #[test]
    fn test_messages_are_polled_in_arrival_order() {
        let listener = PollableListener::new();
        for id in ["a", "b", "c"] {
            listener.on_message(&Message::default().with_message_id(id));
        }

        assert_eq!(listener.pending_messages(), 3);
        let polled: Vec<String> = std::iter::from_fn(|| listener.poll_message()).map(|m| m.message_id).collect();
        assert_eq!(polled, vec!["a", "b", "c"]);
        assert!(listener.poll_message().is_none());
    }

    #[test]
    fn test_token_is_returned_once() {
        let listener = PollableListener::new();
        listener.on_token_received("token-1");

        assert_eq!(listener.poll_registration_token().as_deref(), Some("token-1"));
        assert!(listener.poll_registration_token().is_none());

        listener.on_token_received("token-2");
        assert_eq!(listener.poll_registration_token().as_deref(), Some("token-2"));
    }

    #[test]
    fn test_newer_token_overwrites_unpolled_one() {
        let listener = PollableListener::new();
        listener.on_token_received("old");
        listener.on_token_received("new");

        assert_eq!(listener.poll_registration_token().as_deref(), Some("new"));
        assert!(listener.poll_registration_token().is_none());
    }

    #[test]
    fn test_queued_message_is_independent_of_the_delivered_one() {
        let listener = PollableListener::new();
        let mut message = Message::default()
            .with_notification(crate::domain::notification::Notification::new("title", "body"));

        listener.on_message(&message);
        message.notification = None;

        let polled = listener.poll_message().unwrap();
        assert_eq!(polled.notification.map(|n| n.title), Some("title".to_owned()));
    }
}
