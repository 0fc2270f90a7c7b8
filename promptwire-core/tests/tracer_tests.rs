//! Span nesting and trace/span wrappers

use async_trait::async_trait;
use promptwire_core::providers::{ModelResponse, ProviderResult};
use promptwire_core::testing::FakeChatModel;
use promptwire_core::tracer::{Instrumentation, TraceKind, Tracer};
use promptwire_core::{
    ChatMessage, ChatModel, Llm, LlmError, LoggingTracer, Message, RecordingTracer, RetryPolicy,
    Tool,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("promptwire=debug")
        .with_test_writer()
        .try_init();
}

/// Replays open/close operations, ignoring closes with nothing open.
/// Returns the expected depth after each step.
fn replay(tracer: &dyn Tracer, ops: &[bool], level: impl Fn() -> usize) -> Vec<(usize, usize)> {
    let tool = Tool::new("noop", "", json!({}));
    let mut depth = 0usize;
    let mut observed = Vec::new();
    for (i, open) in ops.iter().enumerate() {
        if *open {
            match i % 2 {
                0 => tracer.start_span("step", &json!({"i": i})).unwrap(),
                _ => tracer.start_tool_trace(&tool, &json!({"i": i})).unwrap(),
            }
            depth += 1;
        } else if depth > 0 {
            tracer.end_span(&Value::Null, None).unwrap();
            depth -= 1;
        }
        observed.push((depth, level()));
    }
    while depth > 0 {
        tracer.end_tool_trace(Some(&Value::Null), None).unwrap();
        depth -= 1;
        observed.push((depth, level()));
    }
    observed
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_logging_tracer_level_follows_nesting(ops in prop::collection::vec(any::<bool>(), 0..40)) {
        let tracer = LoggingTracer::new();
        for (expected, actual) in replay(&tracer, &ops, || tracer.level()) {
            prop_assert_eq!(expected, actual);
        }
        prop_assert_eq!(tracer.level(), 0);
    }

    #[test]
    fn prop_recording_tracer_level_follows_nesting(ops in prop::collection::vec(any::<bool>(), 0..40)) {
        let tracer = RecordingTracer::new();
        for (expected, actual) in replay(&tracer, &ops, || tracer.level()) {
            prop_assert_eq!(expected, actual);
        }
        prop_assert_eq!(tracer.level(), 0);

        // Every open record has a matching close
        let records = tracer.records();
        let opens = records
            .iter()
            .filter(|r| matches!(r.kind, TraceKind::SpanStart | TraceKind::ToolStart))
            .count();
        let closes = records
            .iter()
            .filter(|r| matches!(r.kind, TraceKind::SpanEnd | TraceKind::ToolEnd))
            .count();
        prop_assert_eq!(opens, closes);
    }
}

#[test]
fn test_logging_tracer_ignores_unbalanced_close() {
    let tracer = LoggingTracer::new();
    tracer.end_span(&Value::Null, Some("nothing open")).unwrap();
    tracer.end_llm_trace(None, None).unwrap();
    assert_eq!(tracer.level(), 0);
}

#[tokio::test]
async fn test_trace_wraps_spans_and_records_tags() {
    let recorder = Arc::new(RecordingTracer::new());
    let instrumentation = Instrumentation::new(recorder.clone());

    let result: Result<Value, String> = instrumentation
        .trace(
            "pipeline",
            json!({"doc": 3}),
            &["batch".to_string()],
            async {
                let parsed = instrumentation
                    .span("parse", json!({"doc": 3}), async {
                        Ok::<_, String>(json!({"words": 120}))
                    })
                    .await?;
                instrumentation.event("checkpoint", &json!({}), &parsed, None);
                Ok::<_, String>(json!({"summary": "ok", "words": parsed["words"]}))
            },
        )
        .await;

    assert_eq!(result.unwrap()["words"], 120);

    let kinds: Vec<TraceKind> = recorder.records().iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TraceKind::TraceStart,
            TraceKind::SpanStart,
            TraceKind::SpanEnd,
            TraceKind::Event,
            TraceKind::TraceEnd,
        ]
    );

    let start = &recorder.records_of(TraceKind::TraceStart)[0];
    assert_eq!(start.name, "pipeline");
    assert_eq!(start.inputs["tags"], json!(["batch"]));
    let end = &recorder.records_of(TraceKind::TraceEnd)[0];
    assert_eq!(end.outputs["summary"], "ok");
    assert_eq!(end.error, None);
}

#[tokio::test]
async fn test_trace_records_failure_with_name_prefix() {
    let recorder = Arc::new(RecordingTracer::new());
    let instrumentation = Instrumentation::new(recorder.clone());

    let result: Result<(), String> = instrumentation
        .trace("import", json!({}), &[], async { Err("disk full".to_string()) })
        .await;

    assert_eq!(result, Err("disk full".to_string()));
    let end = &recorder.records_of(TraceKind::TraceEnd)[0];
    assert_eq!(end.error.as_deref(), Some("import: disk full"));
    assert_eq!(end.outputs, Value::Null);
}

#[tokio::test]
async fn test_llm_calls_nest_inside_spans() {
    let recorder = Arc::new(RecordingTracer::new());
    let model = FakeChatModel::with_responses([
        ModelResponse::text("first"),
        ModelResponse::text("second"),
    ]);
    let llm = Llm::new(model).with_tracer(recorder.clone());
    let instrumentation = llm.instrumentation().clone();

    let result: Result<String, LlmError> = instrumentation
        .span("dialogue", json!({}), async {
            let a = llm.predict(&[ChatMessage::user("one").into()], None, &[]).await?;
            let b = llm.predict(&[ChatMessage::user("two").into()], None, &[]).await?;
            Ok::<_, LlmError>(format!(
                "{}/{}",
                a.text().unwrap_or_default(),
                b.text().unwrap_or_default()
            ))
        })
        .await;

    assert_eq!(result.unwrap(), "first/second");
    let llm_starts = recorder.records_of(TraceKind::LlmStart);
    assert_eq!(llm_starts.len(), 2);
    assert!(llm_starts.iter().all(|r| r.level == 1));
    assert_eq!(llm_starts[0].name, "test-model");
    assert_eq!(llm_starts[0].inputs["provider"], "test-llm");
    assert_eq!(recorder.level(), 0);
}

#[tokio::test]
async fn test_logging_tracer_through_predict() {
    init_logging();
    let tracer = Arc::new(LoggingTracer::new());
    let model = FakeChatModel::new();
    model.push_tool_call("lookup", json!({"q": "rust"}));
    let llm = Llm::new(model).with_tracer(tracer.clone());

    let tool = Tool::from_callable("lookup", "Search", json!({"q": {"type": "string"}}), |args| {
        Ok(json!({"hits": [args["q"]]}))
    });
    let prediction = llm
        .predict(&[ChatMessage::user("find rust").into()], None, &[tool])
        .await
        .unwrap();
    let output = prediction
        .tool_calls()
        .unwrap()
        .first()
        .unwrap()
        .invoke_traced(llm.instrumentation())
        .unwrap();

    assert_eq!(output, json!({"hits": ["rust"]}));
    assert_eq!(tracer.level(), 0);
}

/// Model whose completion never arrives in test time
struct StalledModel;

#[async_trait]
impl ChatModel for StalledModel {
    fn name(&self) -> &str {
        "stalled"
    }

    fn model(&self) -> &str {
        "stalled-model"
    }

    fn supports_images(&self) -> bool {
        false
    }

    fn supports_audio(&self) -> bool {
        false
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(0)
    }

    async fn complete(&self, _: &[Message], _: &[Tool]) -> ProviderResult<ModelResponse> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(ModelResponse::text("too late"))
    }
}

#[tokio::test]
async fn test_abandoned_predict_closes_llm_span() {
    let recorder = Arc::new(RecordingTracer::new());
    let llm = Llm::new(StalledModel).with_tracer(recorder.clone());

    let outcome = tokio::time::timeout(
        Duration::from_millis(20),
        llm.predict(&[ChatMessage::user("hello").into()], None, &[]),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(recorder.level(), 0);
    let ends = recorder.records_of(TraceKind::LlmEnd);
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0].error.as_deref(), Some("cancelled"));
}

#[tokio::test]
async fn test_abandoned_trace_closes_every_open_span() {
    let recorder = Arc::new(RecordingTracer::new());
    let instrumentation = Instrumentation::new(recorder.clone());

    let outcome = tokio::time::timeout(
        Duration::from_millis(20),
        instrumentation.trace("batch", json!({}), &[], async {
            instrumentation
                .span("fetch", json!({}), std::future::pending::<Result<Value, String>>())
                .await
        }),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(recorder.level(), 0);
    let span_end = &recorder.records_of(TraceKind::SpanEnd)[0];
    assert_eq!(span_end.error.as_deref(), Some("fetch: cancelled"));
    let trace_end = &recorder.records_of(TraceKind::TraceEnd)[0];
    assert_eq!(trace_end.error.as_deref(), Some("batch: cancelled"));
}

#[tokio::test]
async fn test_logging_tracer_level_recovers_after_abandoned_predict() {
    init_logging();
    let tracer = Arc::new(LoggingTracer::new());
    let llm = Llm::new(StalledModel).with_tracer(tracer.clone());

    let outcome = tokio::time::timeout(
        Duration::from_millis(20),
        llm.predict(&[ChatMessage::user("hello").into()], None, &[]),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(tracer.level(), 0);
}
