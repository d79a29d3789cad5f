#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

//! Client binding for a cloud push-messaging service.
//!
//! Register the app instance with [`initialize`] (or [`Messaging::initialize`]), receive
//! registration tokens and downstream messages through a [`Listener`], send upstream messages
//! and manage topic membership. Delivery itself is performed by a [`Platform`] implementation.

pub mod adapters;
pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod global;
pub mod listener;
pub mod services;
pub mod telemetry;

pub use adapters::platform::{LoopbackPlatform, Platform};
pub use app::{App, InitResult};
pub use domain::message::{Message, MessageType, Priority};
pub use domain::notification::Notification;
pub use domain::topic::Topic;
pub use error::{PlatformError, TopicError};
pub use global::{
    initialize, initialize_with_config, is_initialized, registration_token, send, set_listener, subscribe, terminate,
    unsubscribe,
};
pub use listener::{ChannelListener, Listener, ListenerEvent, PollableListener};
pub use services::event_sink::EventSink;
pub use services::messaging_service::Messaging;
