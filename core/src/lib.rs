// shopflow/src/lib.rs

//! Shopflow: async step pipelines for multi-step business workflows.
//!
//! A `Pipeline<TData, Err>` is an ordered list of named steps. Each step can carry
//! `before`, `on` and `after` handlers operating on a shared `ContextData<TData>`,
//! and a `compensate` handler that undoes the step's effect when a later step fails.
//!
//!  - Handlers return `PipelineControl::Continue` or `PipelineControl::Stop`.
//!  - Steps can be optional (missing handlers or handler failures are tolerated)
//!    or skipped by a condition evaluated against the context.
//!  - On a handler error, compensations of the already completed steps run in
//!    reverse order before the error is returned.
//!  - `FlowRegistry` keys pipelines by their context type so callers can dispatch
//!    a context without holding the pipeline itself.

pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::step::{SkipCondition, StepDef};
pub use crate::core::{Compensation, Handler};

pub use crate::pipeline::definition::Pipeline;

pub use crate::error::{FlowError, FlowResult};

pub use crate::registry::FlowRegistry;
