use crate::domain::message::Message;

pub mod channel;
pub mod pollable;

pub use channel::{ChannelListener, ListenerEvent};
pub use pollable::PollableListener;

/// Receives events from the messaging service.
///
/// Methods are invoked asynchronously, possibly from threads other than the one that
/// installed the listener, and possibly concurrently.
pub trait Listener: Send + Sync + std::fmt::Debug {
    /// Called when a message arrives. The message is only borrowed for the duration of the
    /// call; clone it to keep it.
    fn on_message(&self, message: &Message);

    /// Called when a registration token becomes available, and again whenever it changes.
    fn on_token_received(&self, token: &str);
}
