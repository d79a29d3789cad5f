use clap::{Args, Parser, ValueEnum};

pub const DEFAULT_PROJECT_ID: &str = "cloud-messaging-dev";
pub const DEFAULT_APP_ID: &str = "1:000000000000:rust:loopback";
pub const DEFAULT_SENDER_ID: &str = "000000000000";
/// Matches the number of pending messages the service itself stores per device.
pub const DEFAULT_PENDING_CAPACITY: usize = 100;

#[derive(Clone, Debug, Default, Parser)]
pub struct Config {
    #[command(flatten)]
    pub app: AppConfig,

    #[command(flatten)]
    pub messaging: MessagingConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct AppConfig {
    /// Project the app belongs to
    #[arg(long, env = "CLOUD_MESSAGING_PROJECT_ID", default_value = DEFAULT_PROJECT_ID)]
    pub project_id: String,

    /// Identifier of this app within the project
    #[arg(long, env = "CLOUD_MESSAGING_APP_ID", default_value = DEFAULT_APP_ID)]
    pub app_id: String,

    /// Sender ID (project number) used as the upstream address and the `from` of downstream messages
    #[arg(long, env = "CLOUD_MESSAGING_SENDER_ID", default_value = DEFAULT_SENDER_ID)]
    pub sender_id: String,

    /// API key for the messaging service
    #[arg(long, env = "CLOUD_MESSAGING_API_KEY")]
    pub api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project_id: DEFAULT_PROJECT_ID.to_owned(),
            app_id: DEFAULT_APP_ID.to_owned(),
            sender_id: DEFAULT_SENDER_ID.to_owned(),
            api_key: None,
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct MessagingConfig {
    /// Maximum number of messages held while no listener is installed
    #[arg(long, env = "CLOUD_MESSAGING_PENDING_CAPACITY", default_value_t = DEFAULT_PENDING_CAPACITY)]
    pub pending_capacity: usize,

    /// Log a warning when topic calls come from a thread other than the one that initialized messaging
    #[arg(
        long,
        env = "CLOUD_MESSAGING_WARN_OFF_MAIN_THREAD",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub warn_off_main_thread: bool,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self { pending_capacity: DEFAULT_PENDING_CAPACITY, warn_off_main_thread: true }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Default, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "CLOUD_MESSAGING_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint for traces and metrics (e.g. http://localhost:4318)
    #[arg(long, env = "CLOUD_MESSAGING_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}
