// shopflow/src/core/control.rs

//! Flow signals returned by handlers and the outcome of a whole run.

/// Signal from a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineControl {
  /// Keep going with the remaining handlers and steps.
  Continue,
  /// Halt the pipeline. Completed steps are NOT compensated: stopping is a
  /// deliberate, successful end of the run.
  Stop,
}

/// Outcome of a pipeline run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
  Completed,
  Stopped,
}
