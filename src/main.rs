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

use clap::Parser;
use cloud_messaging::config::Config;
use cloud_messaging::{App, LoopbackPlatform, Message, Notification, PollableListener, Topic, telemetry};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Runs a messaging client against the in-process loopback service: subscribes to topics,
/// sends a message to each and logs everything the listener receives.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    /// Topic to subscribe to and send a sample message to (repeatable)
    #[arg(long = "topic", default_values_t = [String::from("news")])]
    topics: Vec<String>,

    /// How long to keep polling for events
    #[arg(long, default_value_t = 2)]
    duration_secs: u64,

    /// Interval between listener polls
    #[arg(long, default_value_t = 50)]
    poll_interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let telemetry_guard = telemetry::init_telemetry(&cli.config.telemetry)?;

    let result = run(&cli).instrument(tracing::info_span!("demo")).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Demo failed");
    }

    telemetry_guard.shutdown();
    result
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let platform = Arc::new(LoopbackPlatform::new());
    let app = App::new(cli.config.app.clone(), platform.clone());
    let listener = Arc::new(PollableListener::new());

    let init = cloud_messaging::initialize_with_config(&app, Some(listener.clone()), &cli.config.messaging).await;
    if !init.is_success() {
        anyhow::bail!("messaging is unavailable: {init:?}");
    }

    let topics = cli.topics.iter().map(|raw| Topic::parse(raw)).collect::<Result<Vec<_>, _>>()?;
    for topic in &topics {
        cloud_messaging::subscribe(topic.name());
    }
    wait_for_subscriptions(&platform, &topics).await;

    for topic in &topics {
        let message = Message::addressed_to(topic.path())
            .with_data("topic", topic.name())
            .with_notification(Notification::new(format!("Hello {}", topic.name()), "Sent from the demo client"));
        cloud_messaging::send(&message);
    }

    let mut interval = tokio::time::interval(Duration::from_millis(cli.poll_interval_ms.max(1)));
    let deadline = tokio::time::Instant::now() + Duration::from_secs(cli.duration_secs);
    while tokio::time::Instant::now() < deadline {
        interval.tick().await;
        if let Some(token) = listener.poll_registration_token() {
            tracing::info!(%token, "Received a registration token");
        }
        while let Some(message) = listener.poll_message() {
            let payload = serde_json::to_string(&message)?;
            tracing::info!(
                message_id = %message.message_id,
                message_type = message.message_type.map_or("regular", |kind| kind.as_str()),
                %payload,
                "Received a message"
            );
        }
    }

    cloud_messaging::terminate().await;
    Ok(())
}

async fn wait_for_subscriptions(platform: &LoopbackPlatform, topics: &[Topic]) {
    let pending = || topics.iter().any(|topic| !platform.is_subscribed(topic.name()));
    let start = std::time::Instant::now();
    while pending() && start.elapsed() < Duration::from_secs(1) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    if pending() {
        tracing::warn!("Timed out waiting for topic subscriptions");
    }
}
