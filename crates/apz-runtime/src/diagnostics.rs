#![forbid(unsafe_code)]

//! Test data recorded by a tree manager.
//!
//! [`ApzTestData`] sits behind the test-data lock, the last rank in the lock
//! order, so any role may record into it while holding its other locks.
//! Recording is off unless [`DiagnosticsConfig::test_logging`] is set.
//!
//! Three logs are kept:
//!
//! - per paint sequence number, a bucket of `guid → key → value` entries
//!   written by the rebuild
//! - the hit-test log, one record per routed hit test
//! - the sample log, one record per APZC per composited frame
//!
//! Each log is capped at [`DiagnosticsConfig::max_log_entries`]: the oldest
//! records go first, and for buckets the lowest paint sequence goes first.

use std::collections::{BTreeMap, VecDeque};

use apz_core::geometry::ScreenPoint;
use apz_core::guid::ScrollableLayerGuid;
use serde::Serialize;
use tracing::warn;

use crate::config::DiagnosticsConfig;
use crate::diagnostics_sink::DiagnosticsSink;
use crate::frame_metrics::AsyncTransform;
use crate::hit_testing_tree::HitTestFlags;

/// One diagnostics line, as mirrored to the sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticsEntry {
    Bucket {
        paint_sequence: u64,
        guid: String,
        key: String,
        value: String,
    },
    HitTest {
        x: f32,
        y: f32,
        guid: Option<String>,
        flags: u16,
    },
    Sample {
        guid: String,
        translation_x: f32,
        translation_y: f32,
        scale: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitTestRecord {
    pub point: ScreenPoint,
    pub guid: Option<ScrollableLayerGuid>,
    pub flags: HitTestFlags,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRecord {
    pub guid: ScrollableLayerGuid,
    pub transform: AsyncTransform,
}

type Bucket = BTreeMap<ScrollableLayerGuid, BTreeMap<String, String>>;

#[derive(Debug, Default)]
pub struct ApzTestData {
    enabled: bool,
    max_entries: usize,
    buckets: BTreeMap<u64, Bucket>,
    hit_tests: VecDeque<HitTestRecord>,
    samples: VecDeque<SampleRecord>,
    sink: Option<DiagnosticsSink>,
}

impl ApzTestData {
    /// Test data for `config`. A sink that cannot be opened is logged and
    /// skipped.
    #[must_use]
    pub fn new(config: &DiagnosticsConfig) -> Self {
        let sink = match DiagnosticsSink::from_config(config) {
            Ok(sink) => sink,
            Err(error) => {
                warn!(target: "apz.diagnostics", %error, "diagnostics sink unavailable");
                None
            }
        };
        Self {
            enabled: config.test_logging,
            max_entries: config.max_log_entries,
            buckets: BTreeMap::new(),
            hit_tests: VecDeque::new(),
            samples: VecDeque::new(),
            sink,
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: DiagnosticsSink) -> Self {
        self.sink = Some(sink);
        self
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn mirror(&self, entry: DiagnosticsEntry) {
        if let Some(sink) = &self.sink
            && let Err(error) = sink.write_entry(&entry)
        {
            warn!(target: "apz.diagnostics", %error, "diagnostics sink write failed");
        }
    }

    /// Open the bucket for a paint. Reopening keeps existing entries.
    pub fn start_bucket(&mut self, paint_sequence: u64) {
        if self.enabled {
            self.bucket_mut(paint_sequence);
        }
    }

    fn bucket_mut(&mut self, paint_sequence: u64) -> Option<&mut Bucket> {
        if self.max_entries == 0 {
            return None;
        }
        if !self.buckets.contains_key(&paint_sequence) {
            while self.buckets.len() >= self.max_entries {
                self.buckets.pop_first();
            }
            self.buckets.insert(paint_sequence, Bucket::new());
        }
        self.buckets.get_mut(&paint_sequence)
    }

    pub fn log(
        &mut self,
        paint_sequence: u64,
        guid: ScrollableLayerGuid,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        if !self.enabled {
            return;
        }
        let (key, value) = (key.into(), value.into());
        if let Some(bucket) = self.bucket_mut(paint_sequence) {
            bucket.entry(guid).or_default().insert(key.clone(), value.clone());
        }
        self.mirror(DiagnosticsEntry::Bucket {
            paint_sequence,
            guid: guid.to_string(),
            key,
            value,
        });
    }

    pub fn record_hit_test(&mut self, record: HitTestRecord) {
        if !self.enabled {
            return;
        }
        push_capped(&mut self.hit_tests, record, self.max_entries);
        self.mirror(DiagnosticsEntry::HitTest {
            x: record.point.x,
            y: record.point.y,
            guid: record.guid.map(|g| g.to_string()),
            flags: record.flags.bits(),
        });
    }

    pub fn record_sample(&mut self, guid: ScrollableLayerGuid, transform: AsyncTransform) {
        if !self.enabled {
            return;
        }
        push_capped(&mut self.samples, SampleRecord { guid, transform }, self.max_entries);
        self.mirror(DiagnosticsEntry::Sample {
            guid: guid.to_string(),
            translation_x: transform.translation.x,
            translation_y: transform.translation.y,
            scale: transform.scale,
        });
    }

    #[must_use]
    pub fn bucket(&self, paint_sequence: u64) -> Option<&Bucket> {
        self.buckets.get(&paint_sequence)
    }

    /// Paint sequence numbers with a bucket, oldest first.
    pub fn bucket_sequences(&self) -> impl Iterator<Item = u64> + '_ {
        self.buckets.keys().copied()
    }

    #[must_use]
    pub fn hit_tests(&self) -> Vec<HitTestRecord> {
        self.hit_tests.iter().copied().collect()
    }

    /// Sampled transforms of `guid`, oldest first.
    #[must_use]
    pub fn samples_for(&self, guid: &ScrollableLayerGuid) -> Vec<AsyncTransform> {
        self.samples
            .iter()
            .filter(|s| s.guid == *guid)
            .map(|s| s.transform)
            .collect()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.hit_tests.clear();
        self.samples.clear();
    }
}

fn push_capped<T>(log: &mut VecDeque<T>, value: T, cap: usize) {
    if cap == 0 {
        return;
    }
    while log.len() >= cap {
        log.pop_front();
    }
    log.push_back(value);
}
