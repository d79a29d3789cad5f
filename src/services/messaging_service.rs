use crate::adapters::platform::{Platform, PlatformError};
use crate::app::App;
use crate::config::MessagingConfig;
use crate::domain::message::{MAX_TIME_TO_LIVE_SECS, Message};
use crate::domain::topic::Topic;
use crate::listener::Listener;
use crate::services::event_sink::EventSink;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tokio::runtime::Handle;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    sends_total: Counter<u64>,
    topic_changes_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("cloud-messaging");
        Self {
            sends_total: meter
                .u64_counter("messaging_upstream_sends_total")
                .with_description("Total upstream send attempts")
                .build(),
            topic_changes_total: meter
                .u64_counter("messaging_topic_changes_total")
                .with_description("Total subscribe and unsubscribe requests")
                .build(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    Subscribe,
    Unsubscribe,
}

impl Membership {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

/// A registered messaging client.
///
/// Outbound calls are fire-and-forget: they are handed to the platform on the tokio runtime
/// captured at initialization, and any failure comes back asynchronously through the listener.
#[derive(Debug)]
pub struct Messaging {
    app: App,
    sink: EventSink,
    runtime: Handle,
    main_thread: ThreadId,
    warn_off_main_thread: bool,
    metrics: Metrics,
}

impl Messaging {
    /// Registers `app` with its messaging platform using the default configuration.
    ///
    /// # Errors
    /// See [`Messaging::initialize_with`].
    pub async fn initialize(app: &App, listener: Option<Arc<dyn Listener>>) -> Result<Self, PlatformError> {
        Self::initialize_with(app, listener, &MessagingConfig::default()).await
    }

    /// Registers `app` with its messaging platform. The listener may be invoked as soon as this
    /// returns, from any thread. The calling thread is treated as the main thread for topic calls.
    ///
    /// # Errors
    /// Returns `PlatformError::Unavailable` if no tokio runtime is running or the platform
    /// reports a missing dependency, or the platform's registration error.
    #[tracing::instrument(skip_all, fields(project_id = %app.config().project_id, app_id = %app.config().app_id))]
    pub async fn initialize_with(
        app: &App,
        listener: Option<Arc<dyn Listener>>,
        config: &MessagingConfig,
    ) -> Result<Self, PlatformError> {
        // Captured before the first await: a multi-threaded runtime may resume on another worker.
        let main_thread = thread::current().id();
        let runtime = Handle::try_current().map_err(|e| PlatformError::Unavailable(format!("tokio runtime: {e}")))?;
        app.platform().check_dependencies()?;

        let sink = EventSink::new(config.pending_capacity);
        sink.set_listener(listener);

        if let Err(e) = app.platform().register(app, sink.clone()).await {
            sink.close();
            return Err(e);
        }

        tracing::info!("Messaging initialized");
        Ok(Self {
            app: app.clone(),
            sink,
            runtime,
            main_thread,
            warn_off_main_thread: config.warn_off_main_thread,
            metrics: Metrics::new(),
        })
    }

    #[must_use]
    pub const fn app(&self) -> &App {
        &self.app
    }

    /// Installs a new listener and returns the previous one.
    pub fn set_listener(&self, listener: Option<Arc<dyn Listener>>) -> Option<Arc<dyn Listener>> {
        self.sink.set_listener(listener)
    }

    /// The most recent registration token, if one has been issued.
    #[must_use]
    pub fn registration_token(&self) -> Option<String> {
        self.sink.registration_token()
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.sink.is_closed()
    }

    /// Sends an upstream message. Returns immediately; the outcome arrives later as a
    /// `send_event` or `send_error` message.
    #[tracing::instrument(skip_all, fields(message_id = tracing::field::Empty, to = tracing::field::Empty))]
    pub fn send(&self, message: &Message) {
        if self.is_terminated() {
            tracing::warn!("Send called after terminate, ignoring");
            return;
        }
        let outbound = prepare_upstream(message, &self.app);
        let span = tracing::Span::current();
        span.record("message_id", outbound.message_id.as_str());
        span.record("to", outbound.to.as_str());

        let platform = Arc::clone(self.app.platform());
        let sink = self.sink.clone();
        let metrics = self.metrics.clone();
        self.runtime.spawn(
            async move {
                match platform.send(&outbound).await {
                    Ok(()) => {
                        metrics.sends_total.add(1, &[KeyValue::new("status", "sent")]);
                        tracing::debug!("Upstream message handed to the messaging service");
                    }
                    Err(e) => {
                        metrics.sends_total.add(1, &[KeyValue::new("status", "error")]);
                        tracing::warn!(error = %e, "Upstream send failed");
                        sink.deliver_message(&Message::send_error(outbound.message_id, e.code(), e.description()));
                    }
                }
            }
            .instrument(tracing::debug_span!("upstream_send")),
        );
    }

    /// Subscribes to `topic` (`name` or `/topics/name`). Call from the main thread.
    #[tracing::instrument(skip(self))]
    pub fn subscribe(&self, topic: &str) {
        self.change_membership(topic, Membership::Subscribe);
    }

    /// Unsubscribes from `topic`. Call from the main thread.
    #[tracing::instrument(skip(self))]
    pub fn unsubscribe(&self, topic: &str) {
        self.change_membership(topic, Membership::Unsubscribe);
    }

    /// Detaches the listener and releases the registration. Events arriving afterwards are dropped.
    #[tracing::instrument(skip_all)]
    pub async fn terminate(&self) {
        if !self.sink.close() {
            tracing::debug!("Messaging already terminated");
            return;
        }
        if let Err(e) = self.app.platform().unregister().await {
            tracing::warn!(error = %e, "Failed to unregister from the messaging service");
        }
        tracing::info!("Messaging terminated");
    }

    fn change_membership(&self, raw_topic: &str, change: Membership) {
        self.check_main_thread(change.as_str());
        if self.is_terminated() {
            tracing::warn!(operation = change.as_str(), "Called after terminate, ignoring");
            return;
        }
        let topic = match Topic::parse(raw_topic) {
            Ok(topic) => topic,
            Err(e) => {
                tracing::error!(error = %e, "Rejected topic");
                return;
            }
        };

        let platform: Arc<dyn Platform> = Arc::clone(self.app.platform());
        let metrics = self.metrics.clone();
        self.runtime.spawn(
            async move {
                let result = match change {
                    Membership::Subscribe => platform.subscribe(&topic).await,
                    Membership::Unsubscribe => platform.unsubscribe(&topic).await,
                };
                let status = if result.is_ok() { "ok" } else { "error" };
                metrics
                    .topic_changes_total
                    .add(1, &[KeyValue::new("operation", change.as_str()), KeyValue::new("status", status)]);
                match result {
                    Ok(()) => tracing::debug!(%topic, "Topic membership updated"),
                    Err(e) => tracing::error!(error = %e, %topic, "Topic membership change failed"),
                }
            }
            .instrument(tracing::debug_span!("topic_membership", operation = change.as_str())),
        );
    }

    fn check_main_thread(&self, operation: &'static str) {
        if self.warn_off_main_thread && thread::current().id() != self.main_thread {
            tracing::warn!(operation, "Called off the thread that initialized messaging; the service is not thread safe");
        }
    }
}

/// Fills in what the service needs on an upstream message: an id, a recipient, a bounded
/// time to live, and no reserved data keys.
fn prepare_upstream(message: &Message, app: &App) -> Message {
    let mut outbound = message.clone();
    if outbound.message_id.is_empty() {
        outbound.message_id = Uuid::new_v4().to_string();
    }
    if outbound.to.is_empty() {
        outbound.to = app.upstream_address();
    }
    if outbound.time_to_live > MAX_TIME_TO_LIVE_SECS {
        tracing::warn!(
            requested = outbound.time_to_live,
            max = MAX_TIME_TO_LIVE_SECS,
            "Time to live above maximum, clamping"
        );
        outbound.time_to_live = MAX_TIME_TO_LIVE_SECS;
    }
    let removed = outbound.strip_reserved_data();
    if !removed.is_empty() {
        tracing::warn!(keys = ?removed, "Dropping data keys with reserved prefixes");
    }
    outbound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::platform::LoopbackPlatform;
    use crate::config::AppConfig;
    use async_trait::async_trait;
    use futures::FutureExt;
    use std::sync::Mutex;
    use std::task::Context;
    use tokio::sync::oneshot;

    /// Holds registration open until the test releases it.
    #[derive(Debug)]
    struct GatedPlatform {
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl Platform for GatedPlatform {
        fn check_dependencies(&self) -> Result<(), PlatformError> {
            Ok(())
        }

        async fn register(&self, _app: &App, _sink: EventSink) -> Result<(), PlatformError> {
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(())
        }

        async fn unregister(&self) -> Result<(), PlatformError> {
            Ok(())
        }

        async fn send(&self, _message: &Message) -> Result<(), PlatformError> {
            Ok(())
        }

        async fn subscribe(&self, _topic: &Topic) -> Result<(), PlatformError> {
            Ok(())
        }

        async fn unsubscribe(&self, _topic: &Topic) -> Result<(), PlatformError> {
            Ok(())
        }
    }

    fn app() -> App {
        App::new(AppConfig { sender_id: "99".into(), ..AppConfig::default() }, Arc::new(LoopbackPlatform::new()))
    }

    #[test]
    fn test_prepare_upstream_fills_defaults() {
        let outbound = prepare_upstream(&Message::default(), &app());
        assert_eq!(outbound.to, "99@gcm.googleapis.com");
        assert!(Uuid::parse_str(&outbound.message_id).is_ok());
    }

    #[test]
    fn test_prepare_upstream_keeps_caller_values() {
        let message = Message::addressed_to("/topics/x").with_message_id("mine");
        let outbound = prepare_upstream(&message, &app());
        assert_eq!(outbound.to, "/topics/x");
        assert_eq!(outbound.message_id, "mine");
    }

    #[test]
    fn test_prepare_upstream_clamps_ttl_and_strips_reserved_keys() {
        let mut message = Message::default().with_data("google.c.a.e", "1").with_data("score", "7");
        message.time_to_live = MAX_TIME_TO_LIVE_SECS + 1;

        let outbound = prepare_upstream(&message, &app());
        assert_eq!(outbound.time_to_live, MAX_TIME_TO_LIVE_SECS);
        assert_eq!(outbound.data.len(), 1);
        assert!(outbound.data.contains_key("score"));
        // The caller's message is untouched.
        assert_eq!(message.data.len(), 2);
    }

    #[test]
    fn test_initialize_without_runtime_is_missing_dependency() {
        let app = app();
        let result = futures::executor::block_on(Messaging::initialize(&app, None));
        assert!(matches!(result, Err(PlatformError::Unavailable(_))));
    }

    #[test]
    fn test_main_thread_is_the_calling_thread_when_resumed_elsewhere() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (open, gate) = oneshot::channel();
        let app = App::new(AppConfig::default(), Arc::new(GatedPlatform { gate: Mutex::new(Some(gate)) }));
        let config = MessagingConfig::default();
        let caller = thread::current().id();

        let mut initializing = Box::pin(Messaging::initialize_with(&app, None, &config));
        {
            let _entered = runtime.enter();
            let waker = futures::task::noop_waker();
            let mut cx = Context::from_waker(&waker);
            assert!(initializing.poll_unpin(&mut cx).is_pending());
        }
        open.send(()).unwrap();

        let (messaging, resumed_on) = thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _entered = runtime.enter();
                    (futures::executor::block_on(initializing), thread::current().id())
                })
                .join()
                .unwrap()
        });
        let messaging = messaging.unwrap();

        assert_ne!(resumed_on, caller);
        assert_eq!(messaging.main_thread, caller);
    }
}
