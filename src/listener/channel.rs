use crate::domain::message::Message;
use crate::listener::Listener;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    Message(Message),
    Token(String),
}

/// Forwards listener callbacks into a tokio channel for async consumers.
#[derive(Debug)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<ListenerEvent>,
}

impl ChannelListener {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ListenerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: ListenerEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Listener channel closed, dropping event");
        }
    }
}

impl Listener for ChannelListener {
    fn on_message(&self, message: &Message) {
        self.forward(ListenerEvent::Message(message.clone()));
    }

    fn on_token_received(&self, token: &str) {
        self.forward(ListenerEvent::Token(token.to_owned()));
    }
}
