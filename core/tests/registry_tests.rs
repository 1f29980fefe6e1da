// tests/registry_tests.rs
mod common;

use common::*;
use shopflow::{ContextData, FlowError, FlowRegistry, Pipeline, PipelineResult};
use serial_test::serial;

#[derive(Debug, thiserror::Error)]
enum AppError {
  #[error("flow: {0}")]
  Flow(#[from] FlowError),
  #[error("test: {0}")]
  Test(#[from] TestError),
}

#[derive(Default)]
struct OtherContext;

#[tokio::test]
#[serial]
async fn test_registry_dispatches_by_context_type() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("only", false, None)]);
  pipeline.on("only", create_simple_handler("only", "dispatched"));

  let registry = FlowRegistry::<AppError>::new();
  registry.register_pipeline(pipeline);
  assert!(registry.is_registered::<TestContext>());
  assert!(!registry.is_registered::<OtherContext>());

  let ctx = ContextData::new(TestContext::default());
  let result = registry.run(ctx.clone()).await.unwrap();
  assert_eq!(result, PipelineResult::Completed);
  assert_eq!(ctx.read().message, "dispatched");
}

#[tokio::test]
#[serial]
async fn test_registry_reports_unregistered_context() {
  setup_tracing();
  let registry = FlowRegistry::<AppError>::new();
  let result = registry.run(ContextData::new(OtherContext)).await;
  match result {
    Err(AppError::Flow(FlowError::NotRegistered { type_name })) => assert!(type_name.contains("OtherContext")),
    other => panic!("Expected NotRegistered, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_registry_converts_handler_error() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("bad", false, None)]);
  pipeline.on("bad", create_failing_handler("bad", "nope"));

  let registry = FlowRegistry::<AppError>::default();
  registry.register_pipeline(pipeline);

  match registry.run(ContextData::new(TestContext::default())).await {
    Err(AppError::Test(TestError::Handler(msg))) => assert_eq!(msg, "nope"),
    other => panic!("Expected converted handler error, got {:?}", other),
  }
}
