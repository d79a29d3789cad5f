use crate::app::App;
use crate::domain::message::Message;
use crate::domain::topic::Topic;
use crate::services::event_sink::EventSink;
use async_trait::async_trait;

pub mod loopback;

pub use crate::error::PlatformError;
pub use loopback::LoopbackPlatform;

/// The external push-messaging service as seen from the device.
///
/// Implementations forward calls to the platform's delivery service and push everything that
/// comes back (tokens, downstream messages, send acknowledgements) into the [`EventSink`]
/// handed to [`Platform::register`]. Events may be delivered from any thread.
#[async_trait]
pub trait Platform: Send + Sync + std::fmt::Debug {
    /// Checks that the services this platform relies on are present.
    ///
    /// # Errors
    /// Returns `PlatformError::Unavailable` if a dependency is missing.
    fn check_dependencies(&self) -> Result<(), PlatformError>;

    /// Registers the app instance. A registration token is delivered to `sink` once issued.
    async fn register(&self, app: &App, sink: EventSink) -> Result<(), PlatformError>;

    /// Releases the registration. The service may keep delivering to the device afterwards.
    async fn unregister(&self) -> Result<(), PlatformError>;

    /// Sends an upstream message. Delivery is confirmed later through a `send_event` message.
    async fn send(&self, message: &Message) -> Result<(), PlatformError>;

    async fn subscribe(&self, topic: &Topic) -> Result<(), PlatformError>;

    async fn unsubscribe(&self, topic: &Topic) -> Result<(), PlatformError>;
}
