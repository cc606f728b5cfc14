//! Client for the Lookout for Vision edge agent.
//!
//! The crate resolves a media source (still image, video file or camera),
//! makes sure a model is running on the local edge agent, then streams frames
//! through `DetectAnomalies` and prints the results.
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use edge_agent_client::{client, ClientConfig};
//!
//! let config = ClientConfig::new("photo.jpg", "my-model");
//! let cancel = AtomicBool::new(false);
//! let summary = client::run(&config, &cancel, &mut std::io::stdout()).unwrap();
//! println!("{} frame(s)", summary.frames);
//! ```

pub mod backends;
pub mod cli;
pub mod client;
mod config;
mod error;
pub mod media;
pub mod messages;
pub mod readiness;
pub mod runner;
pub mod types;

pub use backends::{BackendConfig, EdgeAgentBackend};
pub use config::ClientConfig;
pub use error::{EdgeAgentError, ErrorClass};
pub use types::{DetectionResult, ModelStatus};

#[cfg(test)]
mod testing;
