//! Benchmarks for the retrieval pipeline.
//!
//! Benchmark targets:
//! - 100 candidates: <1ms
//! - 1,000 candidates: <10ms
//!
//! Covers scoring, diversity ranking, budget packing, and the full engine
//! path through the in-memory store.

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{Duration, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

use mnemo::models::{CodeSmellPayload, DecisionPayload, TribalPayload};
use mnemo::services::retrieval::{apply_intent, pack, rank, retrieve_from, score};
use mnemo::storage::{InMemoryCausalStorage, InMemoryMemoryStore};
use mnemo::{Intent, Memory, MemoryContent, MemoryEngine, MnemoConfig, RetrievalContext};

// ============================================================================
// Helper Functions
// ============================================================================

/// Sample summaries for generated records.
const SAMPLE_SUMMARIES: &[&str] = &[
    "Connection pool exhausts under burst load",
    "Token refresh races with logout",
    "Retry with exponential backoff on 503",
    "Avoid god objects in the request handler",
    "Cache invalidation after schema migration",
    "Validate JWT audience before granting scopes",
    "Batch writes to reduce lock contention",
    "Feature flags gate the new billing path",
];

/// Generates `count` records of mixed types and ages.
fn generate(count: usize) -> Vec<Memory> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            let summary = format!("{} #{i}", SAMPLE_SUMMARIES[i % SAMPLE_SUMMARIES.len()]);
            let content = match i % 3 {
                0 => MemoryContent::Tribal(TribalPayload {
                    topic: "operations".to_string(),
                    knowledge: summary.repeat(3),
                    ..TribalPayload::default()
                }),
                1 => MemoryContent::CodeSmell(CodeSmellPayload {
                    name: "smell".to_string(),
                    reason: summary.clone(),
                    ..CodeSmellPayload::default()
                }),
                _ => MemoryContent::Decision(DecisionPayload {
                    title: summary.clone(),
                    rationale: summary.repeat(2),
                    ..DecisionPayload::default()
                }),
            };
            #[allow(clippy::cast_precision_loss)]
            let confidence = 0.4 + (i % 6) as f64 * 0.1;
            Memory::new(format!("mem-{i:05}"), summary, content)
                .with_confidence(confidence)
                .with_access_count((i % 17) as u64)
                .with_created_at(now - Duration::days((i % 120) as i64))
        })
        .collect()
}

// ============================================================================
// Pipeline Benchmarks
// ============================================================================

fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("retrieval_stages");
    let now = Utc::now();

    for count in [100usize, 1000] {
        let memories = generate(count);

        group.bench_with_input(BenchmarkId::new("score", count), &memories, |b, ms| {
            b.iter(|| {
                ms.iter()
                    .map(|m| score(m.clone(), black_box("token refresh"), now))
                    .count()
            });
        });

        let mut scored: Vec<_> = memories
            .iter()
            .map(|m| score(m.clone(), "token refresh", now))
            .collect();
        apply_intent(&mut scored, Intent::FixBug);

        group.bench_with_input(BenchmarkId::new("rank", count), &scored, |b, s| {
            b.iter(|| rank(black_box(s.clone())));
        });

        let ranked = rank(scored);
        group.bench_with_input(BenchmarkId::new("pack", count), &ranked, |b, r| {
            b.iter(|| pack(black_box(r.clone()), 2000));
        });

        let context = RetrievalContext::new(Intent::FixBug, "token refresh", 2000);
        group.bench_with_input(BenchmarkId::new("retrieve_from", count), &memories, |b, ms| {
            b.iter(|| retrieve_from(black_box(ms.clone()), &context, now));
        });
    }

    group.finish();
}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("retrieval_engine");

    for count in [100usize, 1000] {
        let engine = MemoryEngine::new(
            Arc::new(InMemoryMemoryStore::with_memories(generate(count))),
            Arc::new(InMemoryCausalStorage::new()),
            MnemoConfig::default(),
        )
        .expect("engine should build");
        let context = engine.context(Intent::SecurityAudit, "jwt scopes");

        group.bench_function(BenchmarkId::new("retrieve", count), |b| {
            b.iter(|| engine.retrieve(black_box(&context)).expect("retrieve should succeed"));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_stages, bench_engine);
criterion_main!(benches);
