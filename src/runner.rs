//! The per-frame inference loop.
//!
//! The loop is a two-state machine: it stays `Active` while frames keep
//! coming and inference calls succeed, and moves to `Terminated` when the
//! frame bound is reached, the source runs dry, or cancellation is requested.
//! A remote call that still fails after one retry aborts the loop with an
//! error.

use crate::backends::{retry_once, EdgeAgentBackend};
use crate::error::EdgeAgentError;
use crate::media::{FrameLimit, FrameSource};
use crate::types::DetectionRequest;
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, warn};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The source's frame bound was reached
    FrameLimit,
    /// A read returned no frame
    EndOfStream,
    /// Cancellation was requested
    Cancelled,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::FrameLimit => f.write_str("all frames processed"),
            Termination::EndOfStream => f.write_str("end of stream"),
            Termination::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Active,
    Terminated(Termination),
}

/// What a finished loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    /// Number of frames that went through inference
    pub frames: u64,
    /// Why the loop stopped
    pub termination: Termination,
}

/// Runs inference on every frame of a source and prints the results.
pub struct InferenceLoop<'a, B: ?Sized, S: ?Sized> {
    backend: &'a mut B,
    source: &'a mut S,
    model: &'a str,
    cancel: &'a AtomicBool,
}

impl<'a, B, S> InferenceLoop<'a, B, S>
where
    B: EdgeAgentBackend + ?Sized,
    S: FrameSource + ?Sized,
{
    pub fn new(
        backend: &'a mut B,
        source: &'a mut S,
        model: &'a str,
        cancel: &'a AtomicBool,
    ) -> Self {
        Self {
            backend,
            source,
            model,
            cancel,
        }
    }

    /// Run until the source is exhausted or cancelled, writing results to `out`.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<LoopSummary, EdgeAgentError> {
        let limit = self.source.frame_limit();
        let mut frames = 0u64;
        let termination = loop {
            match self.step(limit, &mut frames, out)? {
                LoopState::Active => {}
                LoopState::Terminated(reason) => break reason,
            }
        };

        Ok(LoopSummary {
            frames,
            termination,
        })
    }

    fn step<W: Write>(
        &mut self,
        limit: FrameLimit,
        frames: &mut u64,
        out: &mut W,
    ) -> Result<LoopState, EdgeAgentError> {
        if self.cancel.load(Ordering::SeqCst) {
            return Ok(LoopState::Terminated(Termination::Cancelled));
        }

        let Some(bitmap) = self.source.next_frame()? else {
            warn!("Blank frame grabbed, stopping");
            return Ok(LoopState::Terminated(Termination::EndOfStream));
        };

        let request = DetectionRequest {
            model_component: self.model.to_string(),
            bitmap,
        };
        debug!(frame = *frames + 1, "running inference");

        let result = retry_once("DetectAnomalies", || self.backend.detect_anomalies(&request))
            .inspect_err(|err| error!("Inference failed, stopping: {err}"))?;
        *frames += 1;

        writeln!(out, "Inference results (frame {frames}):")
            .and_then(|_| write!(out, "{result}"))
            .map_err(EdgeAgentError::Output)?;

        if let FrameLimit::Bounded(max) = limit {
            if *frames >= max {
                return Ok(LoopState::Terminated(Termination::FrameLimit));
            }
        }
        if self.cancel.load(Ordering::SeqCst) {
            return Ok(LoopState::Terminated(Termination::Cancelled));
        }
        Ok(LoopState::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockAgent, ScriptedSource};
    use crate::types::ModelStatus;

    fn run_loop(
        agent: &mut MockAgent,
        source: &mut ScriptedSource,
        cancel: &AtomicBool,
    ) -> (Result<LoopSummary, EdgeAgentError>, String) {
        let mut out = Vec::new();
        let result = InferenceLoop::new(agent, source, "m1", cancel).run(&mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn bounded_source_stops_at_limit() {
        let mut agent = MockAgent::with_statuses([ModelStatus::Running]);
        let mut source = ScriptedSource::new(100, FrameLimit::Bounded(5));
        let cancel = AtomicBool::new(false);

        let (result, _) = run_loop(&mut agent, &mut source, &cancel);
        let summary = result.unwrap();

        assert_eq!(summary.frames, 5);
        assert_eq!(summary.termination, Termination::FrameLimit);
        assert_eq!(agent.detect_calls, 5);
    }

    #[test]
    fn bounded_source_stops_early_on_empty_read() {
        let mut agent = MockAgent::with_statuses([ModelStatus::Running]);
        let mut source = ScriptedSource::new(3, FrameLimit::Bounded(5));
        let cancel = AtomicBool::new(false);

        let (result, _) = run_loop(&mut agent, &mut source, &cancel);
        let summary = result.unwrap();

        assert_eq!(summary.frames, 3);
        assert_eq!(summary.termination, Termination::EndOfStream);
        assert_eq!(agent.detect_calls, 3);
    }

    #[test]
    fn unbounded_source_runs_until_empty_read() {
        let mut agent = MockAgent::with_statuses([ModelStatus::Running]);
        let mut source = ScriptedSource::new(250, FrameLimit::Unbounded);
        let cancel = AtomicBool::new(false);

        let (result, _) = run_loop(&mut agent, &mut source, &cancel);
        let summary = result.unwrap();

        assert_eq!(summary.frames, 250);
        assert_eq!(summary.termination, Termination::EndOfStream);
        assert_eq!(source.reads, 251);
    }

    /// Sets the cancel flag while serving the given read.
    struct InterruptedSource<'a> {
        inner: ScriptedSource,
        cancel: &'a AtomicBool,
        cancel_on_read: u64,
    }

    impl FrameSource for InterruptedSource<'_> {
        fn dimensions(&self) -> (u32, u32) {
            self.inner.dimensions()
        }

        fn frame_limit(&self) -> FrameLimit {
            self.inner.frame_limit()
        }

        fn next_frame(&mut self) -> Result<Option<crate::types::Bitmap>, EdgeAgentError> {
            let frame = self.inner.next_frame();
            if self.inner.reads == self.cancel_on_read {
                self.cancel.store(true, Ordering::SeqCst);
            }
            frame
        }
    }

    #[test]
    fn cancellation_before_the_loop_skips_every_frame() {
        let mut agent = MockAgent::with_statuses([ModelStatus::Running]);
        let mut source = ScriptedSource::new(10, FrameLimit::Unbounded);
        let cancel = AtomicBool::new(true);

        let (result, out) = run_loop(&mut agent, &mut source, &cancel);
        let summary = result.unwrap();

        assert_eq!(summary.frames, 0);
        assert_eq!(summary.termination, Termination::Cancelled);
        assert_eq!(agent.detect_calls, 0);
        assert_eq!(source.reads, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn frame_in_flight_completes_after_cancellation() {
        let mut agent = MockAgent::with_statuses([ModelStatus::Running]);
        let cancel = AtomicBool::new(false);
        let mut source = InterruptedSource {
            inner: ScriptedSource::new(10, FrameLimit::Unbounded),
            cancel: &cancel,
            cancel_on_read: 2,
        };

        let mut out = Vec::new();
        let summary = InferenceLoop::new(&mut agent, &mut source, "m1", &cancel)
            .run(&mut out)
            .unwrap();

        assert_eq!(summary.frames, 2);
        assert_eq!(summary.termination, Termination::Cancelled);
        assert_eq!(agent.detect_calls, 2);
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("Inference results (frame 2):"));
    }

    #[test]
    fn single_failure_is_retried() {
        let mut agent = MockAgent::with_statuses([ModelStatus::Running]);
        agent.detect_failures = 1;
        let mut source = ScriptedSource::new(2, FrameLimit::Bounded(2));
        let cancel = AtomicBool::new(false);

        let (result, _) = run_loop(&mut agent, &mut source, &cancel);

        assert_eq!(result.unwrap().frames, 2);
        assert_eq!(agent.detect_calls, 3);
    }

    #[test]
    fn second_failure_aborts_the_loop() {
        let mut agent = MockAgent::with_statuses([ModelStatus::Running]);
        agent.detect_failures = 2;
        let mut source = ScriptedSource::new(5, FrameLimit::Bounded(5));
        let cancel = AtomicBool::new(false);

        let (result, out) = run_loop(&mut agent, &mut source, &cancel);

        assert!(matches!(
            result,
            Err(EdgeAgentError::RemoteCall {
                code: tonic::Code::Unavailable,
                ..
            })
        ));
        assert_eq!(agent.detect_calls, 2);
        assert!(out.is_empty());
    }

    #[test]
    fn results_are_printed_per_frame() {
        let mut agent = MockAgent::with_statuses([ModelStatus::Running]);
        let mut source = ScriptedSource::new(2, FrameLimit::Bounded(2));
        let cancel = AtomicBool::new(false);

        let (_, out) = run_loop(&mut agent, &mut source, &cancel);

        assert!(out.contains("Inference results (frame 1):"));
        assert!(out.contains("Inference results (frame 2):"));
        assert!(out.contains("Hex Color: #23A436"));
        assert!(out.contains("Anomaly Mask Size (HxW): (2,3)"));
        assert_eq!(agent.requests[0], ("m1".to_string(), 3, 2));
    }
}
