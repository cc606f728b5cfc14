//! Client configuration.
//!
//! `ClientConfig` holds everything a run needs. It is normally produced from
//! the command line by `cli::Args`; every field has a default that matches the
//! edge agent's stock installation.

use crate::backends::BackendConfig;
use crate::readiness::{NotReadyPolicy, PollPolicy};

/// Everything needed for one client run.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Image path, video path or camera index
    pub source: String,
    /// Model component to run
    pub model: String,
    /// How to reach the edge agent
    pub backend: BackendConfig,
    /// How to wait for the model to start
    pub poll: PollPolicy,
    /// What to do if the model never reports `RUNNING`
    pub not_ready: NotReadyPolicy,
}

impl ClientConfig {
    pub fn new(source: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            model: model.into(),
            backend: BackendConfig::default(),
            poll: PollPolicy::default(),
            not_ready: NotReadyPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::DEFAULT_SOCKET_PATH;
    use std::time::Duration;

    #[test]
    fn defaults_match_stock_agent() {
        let config = ClientConfig::new("photo.jpg", "m1");
        let BackendConfig::Grpc {
            socket_path,
            call_timeout,
            ..
        } = &config.backend;

        assert_eq!(socket_path.to_str(), Some(DEFAULT_SOCKET_PATH));
        assert_eq!(*call_timeout, Duration::from_secs(30));
        assert_eq!(config.poll.interval, Duration::from_secs(5));
        assert_eq!(config.poll.max_attempts, 10);
        assert_eq!(config.not_ready, NotReadyPolicy::Proceed);
    }
}
