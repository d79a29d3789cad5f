use crate::adapters::platform::Platform;
use crate::config::AppConfig;
use crate::domain::message::UPSTREAM_DOMAIN;
use std::sync::Arc;

/// Outcome of initializing messaging.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitResult {
    Success,
    /// A platform dependency (e.g. the device's push services) is not available.
    FailedMissingDependency,
}

impl InitResult {
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// The application instance messaging is initialized for: its identifiers and the platform
/// service that actually performs delivery.
#[derive(Clone, Debug)]
pub struct App {
    config: AppConfig,
    platform: Arc<dyn Platform>,
}

impl App {
    #[must_use]
    pub fn new(config: AppConfig, platform: Arc<dyn Platform>) -> Self {
        Self { config, platform }
    }

    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub const fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    /// Recipient for upstream messages: `<sender_id>@gcm.googleapis.com`.
    #[must_use]
    pub fn upstream_address(&self) -> String {
        format!("{}@{UPSTREAM_DOMAIN}", self.config.sender_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::platform::LoopbackPlatform;

    #[test]
    fn test_upstream_address_uses_sender_id() {
        let config = AppConfig { sender_id: "123456".into(), ..AppConfig::default() };
        let app = App::new(config, Arc::new(LoopbackPlatform::new()));
        assert_eq!(app.upstream_address(), "123456@gcm.googleapis.com");
    }
}
