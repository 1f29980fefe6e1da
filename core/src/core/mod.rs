// shopflow/src/core/mod.rs

//! Building blocks shared by pipelines: the context wrapper, control signals,
//! step definitions and the boxed handler types.

pub mod context_data;
pub mod control;
pub mod step;

use context_data::ContextData;
use control::PipelineControl;
use std::future::Future;
use std::pin::Pin;

/// A step handler.
///
/// Receives a clone of the shared `ContextData<TData>` and resolves to the control
/// signal for the pipeline. Lock guards taken on the context MUST be dropped before
/// the handler awaits anything.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>
    + Send
    + Sync,
>;

/// Undo action for a completed step, run when a later step fails.
pub type Compensation<TData, Err> =
  Box<dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<(), Err>> + Send>> + Send + Sync>;
