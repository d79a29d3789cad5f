//! Process-wide messaging, for apps that want free functions instead of carrying a
//! [`Messaging`] handle around.

use crate::app::{App, InitResult};
use crate::config::MessagingConfig;
use crate::domain::message::Message;
use crate::listener::Listener;
use crate::services::messaging_service::Messaging;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;

static INSTANCE: RwLock<Option<Arc<Messaging>>> = RwLock::new(None);
// Serializes initialize and terminate so two registrations never race for the platform.
static INIT_LOCK: Mutex<()> = Mutex::const_new(());

fn current() -> Option<Arc<Messaging>> {
    INSTANCE.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn current_or_warn(operation: &'static str) -> Option<Arc<Messaging>> {
    let messaging = current();
    if messaging.is_none() {
        tracing::warn!(operation, "Messaging is not initialized, ignoring");
    }
    messaging
}

/// Initializes messaging for `app`. The listener may be invoked at any time afterwards.
///
/// Initializing again while already initialized keeps the existing registration and installs
/// the new listener.
pub async fn initialize(app: &App, listener: Option<Arc<dyn Listener>>) -> InitResult {
    initialize_with_config(app, listener, &MessagingConfig::default()).await
}

pub async fn initialize_with_config(
    app: &App,
    listener: Option<Arc<dyn Listener>>,
    config: &MessagingConfig,
) -> InitResult {
    let _guard = INIT_LOCK.lock().await;
    if let Some(existing) = current() {
        tracing::warn!("Messaging already initialized, replacing the listener");
        existing.set_listener(listener);
        return InitResult::Success;
    }

    match Messaging::initialize_with(app, listener, config).await {
        Ok(messaging) => {
            *INSTANCE.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(messaging));
            InitResult::Success
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize messaging");
            InitResult::FailedMissingDependency
        }
    }
}

/// Releases messaging resources. The platform may keep delivering to the device, but nothing
/// reaches the listener anymore.
pub async fn terminate() {
    let _guard = INIT_LOCK.lock().await;
    let messaging = INSTANCE.write().unwrap_or_else(PoisonError::into_inner).take();
    match messaging {
        Some(messaging) => messaging.terminate().await,
        None => tracing::debug!("Messaging is not initialized, nothing to terminate"),
    }
}

#[must_use]
pub fn is_initialized() -> bool {
    current().is_some()
}

/// Installs `listener` and returns the previous one.
pub fn set_listener(listener: Option<Arc<dyn Listener>>) -> Option<Arc<dyn Listener>> {
    current_or_warn("set_listener").and_then(|messaging| messaging.set_listener(listener))
}

/// The most recent registration token, if one has been issued.
#[must_use]
pub fn registration_token() -> Option<String> {
    current().and_then(|messaging| messaging.registration_token())
}

/// Sends an upstream message. See [`Messaging::send`].
pub fn send(message: &Message) {
    if let Some(messaging) = current_or_warn("send") {
        messaging.send(message);
    }
}

/// Subscribes to `topic`. Call from the main thread.
pub fn subscribe(topic: &str) {
    if let Some(messaging) = current_or_warn("subscribe") {
        messaging.subscribe(topic);
    }
}

/// Unsubscribes from `topic`. Call from the main thread.
pub fn unsubscribe(topic: &str) {
    if let Some(messaging) = current_or_warn("unsubscribe") {
        messaging.unsubscribe(topic);
    }
}
