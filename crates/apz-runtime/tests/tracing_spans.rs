#![forbid(unsafe_code)]

//! Tracing output of the three engine roles.
//!
//! Verify that a rebuild, an input event and a sampled frame each open their
//! span with the documented fields, that events nest under them, and that a
//! stale scene is reported at WARN.
//!
//! Run:
//!   cargo test -p apz-runtime --test tracing_spans

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use apz_core::event::{MultiTouchInput, TouchKind};
use apz_core::guid::{LayersId, ScrollableLayerGuid};
use apz_runtime::{
    ApzConfig, ApzTreeManager, FrameMetrics, NoopController, SceneNode, SceneSnapshot,
    ScrollFrameDescriptor,
};
use euclid::{point2, rect};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use web_time::Instant;

// ============================================================================
// Test Infrastructure
// ============================================================================

#[derive(Debug, Clone)]
#[allow(dead_code)]
struct CapturedSpan {
    name: String,
    target: String,
    level: tracing::Level,
    fields: HashMap<String, String>,
}

#[derive(Debug, Clone)]
#[allow(dead_code)]
struct CapturedEvent {
    level: tracing::Level,
    target: String,
    message: String,
    fields: HashMap<String, String>,
    parent_span_name: Option<String>,
}

struct SpanCapture {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

struct CaptureHandle {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CaptureHandle {
    fn spans(&self) -> Vec<CapturedSpan> {
        self.spans.lock().unwrap().clone()
    }

    fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    fn span(&self, name: &str) -> CapturedSpan {
        self.spans()
            .into_iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("no span named {name}"))
    }

    fn event(&self, message: &str) -> CapturedEvent {
        self.events()
            .into_iter()
            .find(|e| e.message == message)
            .unwrap_or_else(|| panic!("no event {message:?}"))
    }
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S> tracing_subscriber::Layer<S> for SpanCapture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        attrs.record(&mut visitor);
        self.spans.lock().unwrap().push(CapturedSpan {
            name: attrs.metadata().name().to_string(),
            target: attrs.metadata().target().to_string(),
            level: *attrs.metadata().level(),
            fields: visitor.0.into_iter().collect(),
        });
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let message = visitor
            .0
            .iter()
            .find(|(k, _)| k == "message")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        let parent_span_name = ctx
            .current_span()
            .id()
            .and_then(|id| ctx.span(id))
            .map(|span| span.name().to_string());
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message,
            fields: visitor.0.into_iter().collect(),
            parent_span_name,
        });
    }
}

fn with_captured_tracing<F>(f: F) -> CaptureHandle
where
    F: FnOnce(),
{
    let spans = Arc::new(Mutex::new(Vec::new()));
    let events = Arc::new(Mutex::new(Vec::new()));
    let layer = SpanCapture {
        spans: spans.clone(),
        events: events.clone(),
    };
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::TRACE)
        .with(layer);
    tracing::subscriber::with_default(subscriber, f);
    CaptureHandle { spans, events }
}

// ============================================================================
// Fixtures
// ============================================================================

const L1: LayersId = LayersId(1);

fn scene(seq: u64) -> SceneSnapshot {
    SceneSnapshot::new(L1, seq).with_node(SceneNode::scroll_frame(
        0,
        ScrollFrameDescriptor::new(
            ScrollableLayerGuid::new(L1, 0, 1),
            FrameMetrics::new(rect(0.0, 0.0, 500.0, 2000.0), rect(0.0, 0.0, 500.0, 500.0)),
        ),
    ))
}

fn engine() -> Arc<ApzTreeManager> {
    Arc::new(ApzTreeManager::new(L1, Arc::new(NoopController), ApzConfig::default()))
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn rebuild_span_carries_paint_sequence() {
    let tm = engine();
    let handle = with_captured_tracing(|| {
        tm.update_hit_testing_tree(&scene(7));
    });
    let span = handle.span("rebuild");
    assert_eq!(span.target, "apz.tree");
    assert_eq!(span.fields.get("paint").map(String::as_str), Some("7"));
    let done = handle.event("rebuild complete");
    assert_eq!(done.parent_span_name.as_deref(), Some("rebuild"));
    assert_eq!(done.fields.get("created").map(String::as_str), Some("1"));
}

#[test]
fn stale_scene_warns() {
    let tm = engine();
    tm.update_hit_testing_tree(&scene(5));
    let handle = with_captured_tracing(|| {
        tm.update_hit_testing_tree(&scene(3));
    });
    let warning = handle.event("stale scene snapshot ignored");
    assert_eq!(warning.level, tracing::Level::WARN);
    assert_eq!(warning.target, "apz.tree");
    assert_eq!(warning.fields.get("last").map(String::as_str), Some("5"));
}

#[test]
fn input_span_names_event_kind_and_wraps_block_events() {
    let tm = engine();
    tm.update_hit_testing_tree(&scene(1));
    let now = Instant::now();
    let handle = with_captured_tracing(|| {
        tm.receive_input(
            MultiTouchInput::new(TouchKind::Start, now)
                .with_touch(1, point2(100.0, 100.0))
                .into(),
            now,
        );
    });
    let span = handle.span("receive_input");
    assert_eq!(span.target, "apz.input");
    assert_eq!(span.fields.get("kind").map(String::as_str), Some("touch"));
    let opened = handle.event("block opened");
    assert_eq!(opened.parent_span_name.as_deref(), Some("receive_input"));
    assert_eq!(opened.level, tracing::Level::DEBUG);
}

#[test]
fn sample_span_counts_controllers() {
    let tm = engine();
    tm.update_hit_testing_tree(&scene(1));
    let sampler = tm.sampler();
    let handle = with_captured_tracing(|| {
        sampler.sample(Instant::now());
    });
    let span = handle.span("sample");
    assert_eq!(span.target, "apz.sampler");
    assert_eq!(span.fields.get("apzcs").map(String::as_str), Some("1"));
}

#[test]
fn no_warnings_on_a_clean_cycle() {
    let tm = engine();
    let handle = with_captured_tracing(|| {
        tm.update_hit_testing_tree(&scene(1));
        tm.update_hit_testing_tree(&scene(2));
        tm.sampler().sample(Instant::now());
    });
    let warnings: Vec<_> = handle
        .events()
        .into_iter()
        .filter(|e| e.level <= tracing::Level::WARN)
        .collect();
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
}
