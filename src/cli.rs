//! Command-line parsing.

use crate::backends::{BackendConfig, DEFAULT_SOCKET_PATH};
use crate::config::ClientConfig;
use crate::readiness::{NotReadyPolicy, PollPolicy};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Run anomaly detection on an image, a video file or a camera through the
/// local Lookout for Vision edge agent.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Image (jpg, jpeg, png), video (avi, mp4, flv) or camera index
    pub source: String,

    /// Name of the model component to run
    pub model: String,

    /// Path to the edge agent's Unix socket
    #[arg(long, env = "EDGE_AGENT_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    pub socket: PathBuf,

    /// Timeout for each call to the edge agent, in seconds
    #[arg(long, env = "EDGE_AGENT_CALL_TIMEOUT", default_value_t = 30)]
    pub call_timeout_secs: u64,

    /// How long to wait for the agent's socket to accept connections, in seconds
    #[arg(long, env = "EDGE_AGENT_CONNECT_TIMEOUT", default_value_t = 10)]
    pub connect_timeout_secs: u64,

    /// Delay between model status checks while it starts, in seconds
    #[arg(long, env = "EDGE_AGENT_POLL_INTERVAL", default_value_t = 5)]
    pub poll_interval_secs: u64,

    /// Maximum number of status checks while the model starts
    #[arg(long, env = "EDGE_AGENT_POLL_ATTEMPTS", default_value_t = 10)]
    pub poll_attempts: u32,

    /// What to do if the model is not running after polling
    #[arg(
        long,
        env = "EDGE_AGENT_NOT_READY",
        value_enum,
        default_value_t = NotReadyPolicy::Proceed
    )]
    pub not_ready: NotReadyPolicy,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        Self {
            source: args.source,
            model: args.model,
            backend: BackendConfig::Grpc {
                socket_path: args.socket,
                connect_timeout: Duration::from_secs(args.connect_timeout_secs),
                call_timeout: Duration::from_secs(args.call_timeout_secs),
            },
            poll: PollPolicy {
                interval: Duration::from_secs(args.poll_interval_secs),
                max_attempts: args.poll_attempts,
            },
            not_ready: args.not_ready,
        }
    }
}
