// shopflow/src/pipeline/execution.rs

//! `Pipeline::run()`: step execution, optional-step tolerance and compensation.

use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::core::Handler;
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;
use tracing::{event, instrument, Instrument, Level};

#[derive(Debug, Clone, Copy)]
enum Phase {
  Before,
  On,
  After,
}

impl Phase {
  fn label(self) -> &'static str {
    match self {
      Phase::Before => "before",
      Phase::On => "on",
      Phase::After => "after",
    }
  }
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Executes the steps in order against `ctx_data`.
  ///
  /// - `Ok(Completed)`: every step ran or was skipped.
  /// - `Ok(Stopped)`: a handler returned `PipelineControl::Stop`.
  /// - `Err(e)`: a handler of a non-optional step failed, or such a step has no
  ///   handlers. Compensations of the steps completed so far have already run,
  ///   newest first, when this returns.
  #[instrument(
        name = "Pipeline::run",
        skip_all,
        fields(
            pipeline_context_data_type = %std::any::type_name::<TData>(),
            num_steps = self.steps.len(),
        ),
        err(Display)
    )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    event!(Level::DEBUG, "Pipeline execution starting.");
    let mut completed: Vec<&str> = Vec::new();

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();
      let step_span = tracing::info_span!(
        "pipeline_step",
        step_name = step_name,
        step_index = step_idx,
        optional = step_def.optional
      );

      if let Some(skip_cond_fn) = &step_def.skip_if {
        if skip_cond_fn(ctx_data.clone()) {
          event!(parent: &step_span, Level::INFO, "Step skipped due to 'skip_if' condition.");
          continue;
        }
      }

      let has_handlers = [&self.before, &self.on, &self.after]
        .iter()
        .any(|phase_map| phase_map.get(step_name).map_or(false, |v| !v.is_empty()));
      if !has_handlers {
        if step_def.optional {
          event!(parent: &step_span, Level::DEBUG, "Optional step has no handlers, skipping.");
          continue;
        }
        event!(parent: &step_span, Level::ERROR, "Non-optional step has no handlers.");
        let err = Err::from(FlowError::HandlerMissing {
          step_name: step_def.name.clone(),
        });
        self.run_compensations(&completed, &ctx_data).await;
        return Err(err);
      }

      let step_outcome = self.run_step(step_name, &ctx_data).instrument(step_span.clone()).await;
      match step_outcome {
        Ok(PipelineControl::Continue) => completed.push(step_name),
        Ok(PipelineControl::Stop) => {
          event!(parent: &step_span, Level::INFO, "Pipeline stopped by a handler.");
          return Ok(PipelineResult::Stopped);
        }
        Err(e) if step_def.optional => {
          event!(parent: &step_span, Level::WARN, error = %e, "Optional step failed, continuing.");
        }
        Err(e) => {
          event!(parent: &step_span, Level::ERROR, error = %e, "Step failed, compensating completed steps.");
          self.run_compensations(&completed, &ctx_data).await;
          return Err(e);
        }
      }
    }

    event!(Level::DEBUG, "Pipeline execution completed successfully.");
    Ok(PipelineResult::Completed)
  }

  async fn run_step(&self, step_name: &str, ctx_data: &ContextData<TData>) -> Result<PipelineControl, Err> {
    for (phase, handlers) in [
      (Phase::Before, &self.before),
      (Phase::On, &self.on),
      (Phase::After, &self.after),
    ] {
      if let Some(handlers) = handlers.get(step_name) {
        if let PipelineControl::Stop = Self::run_phase(phase, handlers, ctx_data).await? {
          return Ok(PipelineControl::Stop);
        }
      }
    }
    Ok(PipelineControl::Continue)
  }

  async fn run_phase(
    phase: Phase,
    handlers: &[Handler<TData, Err>],
    ctx_data: &ContextData<TData>,
  ) -> Result<PipelineControl, Err> {
    for (handler_idx, handler_fn) in handlers.iter().enumerate() {
      let handler_span = tracing::debug_span!("step_handler", phase = phase.label(), handler_index = handler_idx);
      match handler_fn(ctx_data.clone()).instrument(handler_span).await {
        Ok(PipelineControl::Continue) => {}
        Ok(PipelineControl::Stop) => return Ok(PipelineControl::Stop),
        Err(e) => {
          event!(Level::DEBUG, phase = phase.label(), error = %e, "Handler failed.");
          return Err(e);
        }
      }
    }
    Ok(PipelineControl::Continue)
  }

  async fn run_compensations(&self, completed: &[&str], ctx_data: &ContextData<TData>) {
    for step_name in completed.iter().rev() {
      let Some(undo) = self.compensations.get(*step_name) else {
        continue;
      };
      event!(Level::INFO, %step_name, "Running compensation.");
      if let Err(e) = undo(ctx_data.clone()).await {
        event!(Level::ERROR, %step_name, error = %e, "Compensation failed; state may need manual reconciliation.");
      }
    }
  }
}
