use crate::adapters::platform::{Platform, PlatformError};
use crate::app::App;
use crate::domain::message::Message;
use crate::domain::topic::Topic;
use crate::services::event_sink::EventSink;
use async_trait::async_trait;
use dashmap::DashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Registration {
    sink: Option<EventSink>,
    token: Option<String>,
    app_id: String,
    sender_id: String,
}

/// An in-process messaging service.
///
/// Issues registration tokens, acknowledges upstream messages with `send_event`, and loops
/// messages addressed to a subscribed topic or to the device's own token back as downstream
/// messages. Tests and the demo binary use it to drive a full round trip without a device.
#[derive(Debug)]
pub struct LoopbackPlatform {
    available: AtomicBool,
    registration: Mutex<Registration>,
    topics: DashSet<Topic>,
    upstream: Mutex<Vec<Message>>,
}

impl Default for LoopbackPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            registration: Mutex::new(Registration::default()),
            topics: DashSet::new(),
            upstream: Mutex::new(Vec::new()),
        }
    }

    /// Simulates the platform's push services being missing from the device.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_registered(&self) -> bool {
        self.registration().sink.is_some()
    }

    /// The registration token currently issued to the app instance.
    pub fn token(&self) -> Option<String> {
        self.registration().token.clone()
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        Topic::parse(topic).is_ok_and(|topic| self.topics.contains(&topic))
    }

    /// Current topic memberships, sorted by name.
    pub fn subscriptions(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.topics.iter().map(|topic| topic.key().clone()).collect();
        topics.sort();
        topics
    }

    /// Every upstream message accepted so far, oldest first.
    pub fn upstream_messages(&self) -> Vec<Message> {
        self.upstream.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Publishes `message` to `topic` from the server side. Returns false if the app instance
    /// is not registered or not subscribed to the topic.
    pub fn publish(&self, topic: &Topic, mut message: Message) -> bool {
        if !self.topics.contains(topic) {
            tracing::debug!(%topic, "Not subscribed, message not delivered");
            return false;
        }
        message.to = topic.path();
        self.deliver(message)
    }

    /// Delivers a downstream message to the device. Returns false if not registered.
    pub fn deliver(&self, mut message: Message) -> bool {
        let (sink, sender_id) = {
            let registration = self.registration();
            match &registration.sink {
                Some(sink) => (sink.clone(), registration.sender_id.clone()),
                None => return false,
            }
        };
        if message.from.is_empty() {
            message.from = sender_id;
        }
        if message.message_id.is_empty() {
            message.message_id = new_message_id();
        }
        sink.deliver_message(&message);
        true
    }

    /// Issues a fresh registration token, as the service does when the old one is invalidated.
    pub fn rotate_token(&self) -> Option<String> {
        let (sink, token) = {
            let mut registration = self.registration();
            let sink = registration.sink.clone()?;
            let token = new_token(&registration.app_id);
            registration.token = Some(token.clone());
            (sink, token)
        };
        tracing::debug!("Rotated registration token");
        sink.deliver_token(&token);
        Some(token)
    }

    fn registered(&self) -> Result<(EventSink, String, String), PlatformError> {
        let registration = self.registration();
        match (&registration.sink, &registration.token) {
            (Some(sink), Some(token)) => Ok((sink.clone(), token.clone(), registration.sender_id.clone())),
            _ => Err(PlatformError::NotRegistered),
        }
    }

    fn registration(&self) -> MutexGuard<'_, Registration> {
        self.registration.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn new_token(app_id: &str) -> String {
    format!("{app_id}:{}", Uuid::new_v4().simple())
}

fn new_message_id() -> String {
    format!("0:{}", Uuid::new_v4().simple())
}

#[async_trait]
impl Platform for LoopbackPlatform {
    fn check_dependencies(&self) -> Result<(), PlatformError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PlatformError::Unavailable("loopback push service is disabled".into()))
        }
    }

    async fn register(&self, app: &App, sink: EventSink) -> Result<(), PlatformError> {
        self.check_dependencies()?;
        let token = {
            let mut registration = self.registration();
            let token = new_token(&app.config().app_id);
            *registration = Registration {
                sink: Some(sink.clone()),
                token: Some(token.clone()),
                app_id: app.config().app_id.clone(),
                sender_id: app.config().sender_id.clone(),
            };
            token
        };
        tracing::debug!(app_id = %app.config().app_id, "Loopback registration issued");
        sink.deliver_token(&token);
        Ok(())
    }

    async fn unregister(&self) -> Result<(), PlatformError> {
        *self.registration() = Registration::default();
        self.topics.clear();
        Ok(())
    }

    async fn send(&self, message: &Message) -> Result<(), PlatformError> {
        let (sink, token, sender_id) = self.registered()?;
        self.upstream.lock().unwrap_or_else(PoisonError::into_inner).push(message.clone());
        sink.deliver_message(&Message::send_event(message.message_id.clone()));

        let loops_back = message.to == token || self.topics.iter().any(|topic| topic.matches_recipient(&message.to));
        if loops_back {
            let downstream = Message {
                from: sender_id,
                message_id: new_message_id(),
                message_type: None,
                error: String::new(),
                error_description: String::new(),
                ..message.clone()
            };
            sink.deliver_message(&downstream);
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &Topic) -> Result<(), PlatformError> {
        self.registered()?;
        self.topics.insert(topic.clone());
        Ok(())
    }

    async fn unsubscribe(&self, topic: &Topic) -> Result<(), PlatformError> {
        self.registered()?;
        self.topics.remove(topic);
        Ok(())
    }
}
