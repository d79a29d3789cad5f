use crate::domain::message::{Message, MessageType};
use crate::listener::Listener;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Clone, Debug)]
struct Metrics {
    messages_received: Counter<u64>,
    tokens_received: Counter<u64>,
    buffered: Counter<u64>,
    dropped: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("cloud-messaging");
        Self {
            messages_received: meter
                .u64_counter("messaging_messages_received_total")
                .with_description("Total messages delivered to a listener")
                .build(),
            tokens_received: meter
                .u64_counter("messaging_tokens_received_total")
                .with_description("Total registration tokens received from the messaging service")
                .build(),
            buffered: meter
                .u64_counter("messaging_events_buffered_total")
                .with_description("Messages held back because no listener was installed")
                .build(),
            dropped: meter
                .u64_counter("messaging_events_dropped_total")
                .with_description("Buffered messages discarded because the buffer was full")
                .build(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    listener: Option<Arc<dyn Listener>>,
    pending: VecDeque<Message>,
    dropped: u64,
    token: Option<String>,
    token_undelivered: bool,
    // Set while buffered events are being replayed; new events queue behind them.
    replaying: bool,
    closed: bool,
}

/// Events held back while no listener was installed.
#[derive(Debug, Default)]
struct Replay {
    token: Option<String>,
    dropped: u64,
    messages: Vec<Message>,
}

impl Replay {
    const fn is_empty(&self) -> bool {
        self.token.is_none() && self.dropped == 0 && self.messages.is_empty()
    }
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    capacity: usize,
    metrics: Metrics,
}

/// Entry point for events coming from the messaging service.
///
/// Routes each event to the installed listener. While none is installed, messages are buffered
/// up to `capacity` (oldest dropped first) and the latest token is held; installing a listener
/// replays them. Listener callbacks always run outside the internal lock.
#[derive(Debug, Clone)]
pub struct EventSink {
    inner: Arc<Inner>,
}

impl EventSink {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { inner: Arc::new(Inner { state: Mutex::new(State::default()), capacity, metrics: Metrics::new() }) }
    }

    /// Hands a downstream message or service event to the listener.
    pub fn deliver_message(&self, message: &Message) {
        let listener = {
            let mut state = self.lock();
            if state.closed {
                tracing::debug!(message_id = %message.message_id, "Messaging terminated, dropping message");
                return;
            }
            match &state.listener {
                Some(listener) if !state.replaying => Arc::clone(listener),
                _ => {
                    self.buffer(&mut state, message.clone());
                    return;
                }
            }
        };

        let kind = message.message_type.map_or("regular", MessageType::as_str);
        self.inner.metrics.messages_received.add(1, &[KeyValue::new("type", kind)]);
        listener.on_message(message);
    }

    /// Records a new registration token and hands it to the listener.
    pub fn deliver_token(&self, token: &str) {
        self.inner.metrics.tokens_received.add(1, &[]);
        let listener = {
            let mut state = self.lock();
            if state.closed {
                tracing::debug!("Messaging terminated, dropping registration token");
                return;
            }
            state.token = Some(token.to_owned());
            match &state.listener {
                Some(listener) if !state.replaying => Arc::clone(listener),
                _ => {
                    state.token_undelivered = true;
                    return;
                }
            }
        };
        listener.on_token_received(token);
    }

    /// The most recent registration token, if one has been issued.
    #[must_use]
    pub fn registration_token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    /// Number of messages waiting for a listener.
    #[must_use]
    pub fn pending_messages(&self) -> usize {
        self.lock().pending.len()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Installs `listener` and returns the previous one. Events buffered while no listener was
    /// installed are replayed to the new listener: the pending token first, then a
    /// `deleted_messages` notice if the buffer overflowed, then the messages in arrival order.
    /// Events arriving during the replay are queued behind the buffered ones.
    pub fn set_listener(&self, listener: Option<Arc<dyn Listener>>) -> Option<Arc<dyn Listener>> {
        let previous = {
            let mut state = self.lock();
            let previous = std::mem::replace(&mut state.listener, listener.clone());
            if listener.is_some() {
                state.replaying = true;
            }
            previous
        };
        if listener.is_some() {
            self.drain_replay();
        }
        previous
    }

    /// Replays buffered events until the buffer stays empty, re-reading the installed listener on
    /// each pass so a concurrent swap receives whatever is left.
    fn drain_replay(&self) {
        loop {
            let (listener, replay) = {
                let mut state = self.lock();
                let listener = match &state.listener {
                    Some(listener) if !state.closed => Arc::clone(listener),
                    _ => {
                        state.replaying = false;
                        return;
                    }
                };
                let replay = Self::take_replay(&mut state);
                if replay.is_empty() {
                    state.replaying = false;
                    return;
                }
                (listener, replay)
            };
            Self::replay(listener.as_ref(), replay);
        }
    }

    /// Detaches the listener and discards buffered events. Later deliveries are dropped.
    /// Returns true if this call closed the sink, false if it was already closed.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        let newly_closed = !state.closed;
        state.closed = true;
        state.replaying = false;
        state.pending.clear();
        state.token_undelivered = false;
        state.listener = None;
        newly_closed
    }

    fn buffer(&self, state: &mut State, message: Message) {
        if self.inner.capacity == 0 {
            state.dropped += 1;
            self.inner.metrics.dropped.add(1, &[]);
            return;
        }
        if state.pending.len() >= self.inner.capacity {
            state.pending.pop_front();
            state.dropped += 1;
            self.inner.metrics.dropped.add(1, &[]);
            tracing::warn!(capacity = self.inner.capacity, "No listener installed and buffer full, dropping oldest message");
        }
        state.pending.push_back(message);
        self.inner.metrics.buffered.add(1, &[]);
    }

    fn take_replay(state: &mut State) -> Replay {
        let token = if std::mem::take(&mut state.token_undelivered) { state.token.clone() } else { None };
        Replay { token, dropped: std::mem::take(&mut state.dropped), messages: state.pending.drain(..).collect() }
    }

    fn replay(listener: &dyn Listener, replay: Replay) {
        tracing::debug!(
            messages = replay.messages.len(),
            dropped = replay.dropped,
            token = replay.token.is_some(),
            "Replaying events buffered before a listener was installed"
        );
        if let Some(token) = replay.token {
            listener.on_token_received(&token);
        }
        if replay.dropped > 0 {
            listener.on_message(&Message::deleted_messages(replay.dropped));
        }
        for message in &replay.messages {
            listener.on_message(message);
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::PollableListener;

    fn ids(listener: &PollableListener) -> Vec<String> {
        std::iter::from_fn(|| listener.poll_message()).map(|m| m.message_id).collect()
    }

    #[test]
    fn test_delivers_directly_to_installed_listener() {
        let sink = EventSink::new(10);
        let listener = Arc::new(PollableListener::new());
        assert!(sink.set_listener(Some(listener.clone())).is_none());

        sink.deliver_token("tok");
        sink.deliver_message(&Message::default().with_message_id("1"));

        assert_eq!(listener.poll_registration_token().as_deref(), Some("tok"));
        assert_eq!(ids(&listener), vec!["1"]);
        assert_eq!(sink.registration_token().as_deref(), Some("tok"));
        assert_eq!(sink.pending_messages(), 0);
    }

    #[test]
    fn test_buffers_until_listener_installed() {
        let sink = EventSink::new(10);
        sink.deliver_token("early-token");
        sink.deliver_message(&Message::default().with_message_id("1"));
        sink.deliver_message(&Message::default().with_message_id("2"));
        assert_eq!(sink.pending_messages(), 2);

        let listener = Arc::new(PollableListener::new());
        sink.set_listener(Some(listener.clone()));

        assert_eq!(listener.poll_registration_token().as_deref(), Some("early-token"));
        assert_eq!(ids(&listener), vec!["1", "2"]);
        assert_eq!(sink.pending_messages(), 0);
    }

    #[test]
    fn test_overflow_drops_oldest_and_reports_deleted_messages() {
        let sink = EventSink::new(2);
        for id in ["1", "2", "3", "4"] {
            sink.deliver_message(&Message::default().with_message_id(id));
        }

        let listener = Arc::new(PollableListener::new());
        sink.set_listener(Some(listener.clone()));

        let notice = listener.poll_message().unwrap();
        assert_eq!(notice.message_type, Some(MessageType::DeletedMessages));
        assert_eq!(notice.error_description, "2 pending messages were dropped");
        assert_eq!(ids(&listener), vec!["3", "4"]);
    }

    #[test]
    fn test_swapping_listener_returns_previous() {
        let sink = EventSink::new(10);
        let first = Arc::new(PollableListener::new());
        let second = Arc::new(PollableListener::new());

        sink.set_listener(Some(first.clone()));
        let previous = sink.set_listener(Some(second.clone())).unwrap();
        assert!(Arc::ptr_eq(&previous, &(first.clone() as Arc<dyn Listener>)));

        sink.deliver_message(&Message::default().with_message_id("x"));
        assert_eq!(first.pending_messages(), 0);
        assert_eq!(second.pending_messages(), 1);
    }

    #[test]
    fn test_token_already_delivered_is_not_replayed() {
        let sink = EventSink::new(10);
        let first = Arc::new(PollableListener::new());
        sink.set_listener(Some(first.clone()));
        sink.deliver_token("tok");

        let second = Arc::new(PollableListener::new());
        sink.set_listener(Some(second.clone()));

        assert_eq!(first.poll_registration_token().as_deref(), Some("tok"));
        assert!(second.poll_registration_token().is_none());
    }

    #[test]
    fn test_closed_sink_drops_events() {
        let sink = EventSink::new(10);
        let listener = Arc::new(PollableListener::new());
        sink.set_listener(Some(listener.clone()));

        assert!(sink.close());
        assert!(sink.is_closed());
        assert!(!sink.close());
        sink.deliver_message(&Message::default());
        sink.deliver_token("late");

        assert_eq!(listener.pending_messages(), 0);
        assert!(listener.poll_registration_token().is_none());
        assert_eq!(sink.pending_messages(), 0);
    }

    #[test]
    fn test_zero_capacity_counts_drops() {
        let sink = EventSink::new(0);
        sink.deliver_message(&Message::default());

        let listener = Arc::new(PollableListener::new());
        sink.set_listener(Some(listener.clone()));
        let notice = listener.poll_message().unwrap();
        assert_eq!(notice.message_type, Some(MessageType::DeletedMessages));
        assert!(listener.poll_message().is_none());
    }

    /// Delivers a message from another thread as soon as the token is replayed.
    #[derive(Debug)]
    struct DeliversOnToken {
        sink: EventSink,
        received: Mutex<Vec<String>>,
    }

    impl Listener for DeliversOnToken {
        fn on_message(&self, message: &Message) {
            self.received.lock().unwrap().push(message.message_id.clone());
        }

        fn on_token_received(&self, _token: &str) {
            let sink = self.sink.clone();
            std::thread::spawn(move || sink.deliver_message(&Message::default().with_message_id("late")))
                .join()
                .unwrap();
        }
    }

    #[test]
    fn test_events_during_replay_queue_behind_buffered_ones() {
        let sink = EventSink::new(10);
        sink.deliver_token("tok");
        sink.deliver_message(&Message::default().with_message_id("early"));

        let listener = Arc::new(DeliversOnToken { sink: sink.clone(), received: Mutex::new(Vec::new()) });
        sink.set_listener(Some(listener.clone()));

        assert_eq!(*listener.received.lock().unwrap(), vec!["early", "late"]);
        assert_eq!(sink.pending_messages(), 0);

        sink.deliver_message(&Message::default().with_message_id("direct"));
        assert_eq!(*listener.received.lock().unwrap(), vec!["early", "late", "direct"]);
    }
}
