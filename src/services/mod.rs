pub mod event_sink;
pub mod messaging_service;
