//! End-to-end client session: resolve the source, connect, wait for the
//! model, run the loop.

use crate::backends::{create_backend, BackendConfig, EdgeAgentBackend};
use crate::config::ClientConfig;
use crate::error::EdgeAgentError;
use crate::media::{open_source, FrameSource};
use crate::readiness::{ensure_ready, NotReadyPolicy, PollPolicy, Readiness};
use crate::runner::{InferenceLoop, LoopSummary, Termination};
use std::io::Write;
use std::sync::atomic::AtomicBool;
use tracing::info;

/// Run the whole client against the gRPC backend.
pub fn run<W: Write>(
    config: &ClientConfig,
    cancel: &AtomicBool,
    out: &mut W,
) -> Result<LoopSummary, EdgeAgentError> {
    run_with(config, create_backend, cancel, out)
}

/// Run the whole client, creating the backend with `connect`.
///
/// The source is opened first; `connect` is only called once it resolved, so
/// an input error never reaches the agent.
pub fn run_with<B, F, W>(
    config: &ClientConfig,
    connect: F,
    cancel: &AtomicBool,
    out: &mut W,
) -> Result<LoopSummary, EdgeAgentError>
where
    B: EdgeAgentBackend,
    F: FnOnce(&BackendConfig) -> Result<B, EdgeAgentError>,
    W: Write,
{
    let mut source = open_source(&config.source)?;
    let mut backend = connect(&config.backend)?;
    run_session(
        &mut backend,
        &mut source,
        &config.model,
        config.poll,
        config.not_ready,
        cancel,
        out,
    )
}

/// Wait for the model, then run inference over `source`.
///
/// A cancellation observed while waiting ends the session without any
/// inference call.
pub fn run_session<B, S, W>(
    backend: &mut B,
    source: &mut S,
    model: &str,
    poll: PollPolicy,
    not_ready: NotReadyPolicy,
    cancel: &AtomicBool,
    out: &mut W,
) -> Result<LoopSummary, EdgeAgentError>
where
    B: EdgeAgentBackend + ?Sized,
    S: FrameSource + ?Sized,
    W: Write,
{
    let readiness = ensure_ready(backend, model, poll, cancel)?;
    let summary = if readiness == Readiness::Cancelled {
        LoopSummary {
            frames: 0,
            termination: Termination::Cancelled,
        }
    } else {
        readiness.enforce(model, not_ready)?;
        InferenceLoop::new(backend, source, model, cancel).run(out)?
    };
    info!(
        "End of program: {} frame(s) processed, {}",
        summary.frames, summary.termination
    );
    Ok(summary)
}
