use std::collections::HashMap;
use std::time::Duration;

use super::*;
use crate::constants::{MISSING_FIELD, NO_RECORDS_SENTINEL, RECORD_SEPARATOR};
use crate::embedding::{EmbeddingError, EmbeddingProvider, MockEmbedFailure, MockEmbedder};
use crate::vectordb::{CveRecord, MockSimilarityStore, PairwiseMode};

const DIM: usize = 8;

fn record(name: &str) -> VulnerabilityRecord {
    VulnerabilityRecord {
        name: Some(name.to_string()),
        ..Default::default()
    }
}

/// Builds a lookup-backed batch from `(id, similarity)` pairs and symmetric distances.
fn lookup_batch(items: &[(&str, f32)], distances: &[(&str, &str, f32)]) -> Vec<CandidateEntry> {
    items
        .iter()
        .map(|(id, similarity)| {
            let mut lookup = HashMap::new();
            for (a, b, d) in distances {
                if a == id {
                    lookup.insert(b.to_string(), *d);
                } else if b == id {
                    lookup.insert(a.to_string(), *d);
                }
            }
            CandidateEntry::new(*id, record(id), *similarity, DistanceSource::Lookup(lookup))
        })
        .collect()
}

/// The four-record scenario: C is a near-duplicate of A, D is far from everything.
fn scenario_batch() -> Vec<CandidateEntry> {
    lookup_batch(
        &[("A", 0.9), ("B", 0.85), ("C", 0.5), ("D", 0.4)],
        &[
            ("A", "B", 0.3),
            ("A", "C", 0.05),
            ("B", "C", 0.3),
            ("A", "D", 0.9),
            ("B", "D", 0.9),
            ("C", "D", 0.9),
        ],
    )
}

fn unit(v: &[f32]) -> Vec<f32> {
    let mut v = v.to_vec();
    entry::normalize(&mut v);
    v
}

fn min_pairwise_distance(selection: &Selection) -> f32 {
    let entries = selection.entries();
    let mut min = f32::INFINITY;
    for (i, a) in entries.iter().enumerate() {
        for b in &entries[i + 1..] {
            if let Some(d) = a.pairwise_distance(b) {
                min = min.min(d);
            }
        }
    }
    min
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

#[test]
fn test_scenario_prefers_distant_record_over_near_duplicate() {
    let params = SelectionParams::balanced(3).unwrap();
    let selection = select(scenario_batch(), &params);
    assert_eq!(selection.ids(), vec!["A", "D", "B"]);
    assert!(!selection.is_exhausted());
}

#[test]
fn test_scenario_scores_are_pinned() {
    let batch = scenario_batch();
    let a = &batch[0];
    let b = &batch[1];
    let c = &batch[2];
    let d = &batch[3];
    let selected = vec![a.clone()];

    let score_b = mmr_score(b, &selected, 0.5).unwrap();
    let score_c = mmr_score(c, &selected, 0.5).unwrap();
    let score_d = mmr_score(d, &selected, 0.5).unwrap();

    assert!((score_b - 0.575).abs() < 1e-6);
    assert!((score_c - 0.275).abs() < 1e-6);
    assert!((score_d - 0.65).abs() < 1e-6);
}

#[test]
fn test_seed_is_most_similar_for_any_lambda_and_k() {
    for lambda in [0.0, 0.3, 0.5, 0.7, 1.0] {
        for k in 1..=4 {
            let mut batch = scenario_batch();
            // Move the best candidate away from the front.
            batch.rotate_left(2);
            let selection = select_with(batch, k, lambda).unwrap();
            assert_eq!(selection.entries()[0].id, "A", "lambda={lambda} k={k}");
        }
    }
}

#[test]
fn test_seed_tie_goes_to_first_in_input() {
    let batch = lookup_batch(
        &[("first", 0.8), ("second", 0.8)],
        &[("first", "second", 0.5)],
    );
    let selection = select_with(batch, 1, 0.5).unwrap();
    assert_eq!(selection.ids(), vec!["first"]);
}

#[test]
fn test_output_is_bounded_by_k_and_pool() {
    for k in 1..=6 {
        let selection = select_with(scenario_batch(), k, 0.5).unwrap();
        assert_eq!(selection.len(), k.min(4));
        assert_eq!(selection.is_exhausted(), k > 4);
    }
}

#[test]
fn test_output_has_no_duplicates_and_only_input_ids() {
    let selection = select_with(scenario_batch(), 10, 0.3).unwrap();
    let mut ids = selection.ids();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), selection.len());
    for id in ids {
        assert!(["A", "B", "C", "D"].contains(&id));
    }
}

#[test]
fn test_lower_lambda_never_reduces_diversity() {
    let high = select_with(scenario_batch(), 2, 0.9).unwrap();
    let low = select_with(scenario_batch(), 2, 0.1).unwrap();

    assert_eq!(high.ids(), vec!["A", "B"]);
    assert_eq!(low.ids(), vec!["A", "D"]);
    assert!(min_pairwise_distance(&low) >= min_pairwise_distance(&high));
}

#[test]
fn test_lambda_one_is_pure_relevance_order() {
    let selection = select_with(scenario_batch(), 4, 1.0).unwrap();
    assert_eq!(selection.ids(), vec!["A", "B", "C", "D"]);
}

#[test]
fn test_empty_input_yields_empty_selection() {
    let selection = select_with(Vec::new(), 5, 0.5).unwrap();
    assert!(selection.is_empty());
    assert!(selection.is_exhausted());
}

#[test]
fn test_invalid_parameters_are_rejected() {
    assert!(matches!(
        SelectionParams::new(0, 0.5),
        Err(SelectionError::InvalidParameter { name: "k", .. })
    ));
    for lambda in [-0.1, 1.01, f32::NAN, f32::INFINITY] {
        assert!(matches!(
            SelectionParams::new(3, lambda),
            Err(SelectionError::InvalidParameter { name: "lambda", .. })
        ));
    }
    assert!(select_with(scenario_batch(), 3, 2.0).is_err());
}

#[test]
fn test_presets() {
    assert_eq!(SelectionParams::balanced(20).unwrap().lambda(), 0.5);
    assert_eq!(SelectionParams::diverse(20).unwrap().lambda(), 0.3);
    assert_eq!(SelectionParams::diverse(20).unwrap().k(), 20);
}

#[test]
fn test_unscorable_candidates_are_skipped_then_selection_stops() {
    // "lonely" has no distance to anything, so it can never be scored.
    let batch = lookup_batch(
        &[("A", 0.9), ("lonely", 0.8), ("B", 0.7)],
        &[("A", "B", 0.4)],
    );
    let selection = select_with(batch, 3, 0.5).unwrap();
    assert_eq!(selection.ids(), vec!["A", "B"]);
    assert!(selection.is_exhausted());
}

#[test]
fn test_vector_distances_match_lookup_semantics() {
    let a = CandidateEntry::new(
        "A",
        record("A"),
        0.9,
        DistanceSource::Vector(unit(&[1.0, 0.0])),
    );
    let b = CandidateEntry::new(
        "B",
        record("B"),
        0.8,
        DistanceSource::Vector(unit(&[1.0, 0.05])),
    );
    let c = CandidateEntry::new(
        "C",
        record("C"),
        0.6,
        DistanceSource::Vector(unit(&[0.0, 1.0])),
    );

    assert!((a.pairwise_distance(&c).unwrap() - 1.0).abs() < 1e-6);
    assert_eq!(a.pairwise_distance(&a), Some(0.0));

    let selection = select_with(vec![a, b, c], 2, 0.5).unwrap();
    assert_eq!(selection.ids(), vec!["A", "C"]);
}

#[test]
fn test_lookup_on_either_side_is_used() {
    let mut lookup = HashMap::new();
    lookup.insert("B".to_string(), 0.7);
    let a = CandidateEntry::new("A", record("A"), 0.9, DistanceSource::Lookup(lookup));
    let b = CandidateEntry::new("B", record("B"), 0.5, DistanceSource::Vector(vec![1.0]));

    assert_eq!(a.pairwise_distance(&b), Some(0.7));
    assert_eq!(b.pairwise_distance(&a), Some(0.7));
}

// ---------------------------------------------------------------------------
// Accessor
// ---------------------------------------------------------------------------

#[test]
fn test_accessor_converts_distance_to_similarity() {
    let rows = vec![RawCandidate::new("CVE-1", record("x"))
        .with_distance(0.25)
        .with_embedding(vec![1.0, 0.0])];
    let entries = normalize_candidates(rows).unwrap();
    assert!((entries[0].similarity - 0.75).abs() < 1e-6);
    assert!(matches!(entries[0].distances, DistanceSource::Vector(_)));
}

#[test]
fn test_accessor_prefers_lookup_over_vector() {
    let rows = vec![RawCandidate::new("CVE-1", record("x"))
        .with_similarity(0.9)
        .with_embedding(vec![1.0])
        .with_pairwise(HashMap::new())];
    let entries = normalize_candidates(rows).unwrap();
    assert!(matches!(entries[0].distances, DistanceSource::Lookup(_)));
}

#[test]
fn test_accessor_accepts_agreeing_encodings() {
    let rows = vec![RawCandidate::new("CVE-1", record("x"))
        .with_distance(0.2)
        .with_similarity(0.8)
        .with_embedding(vec![1.0])];
    assert!(normalize_candidates(rows).is_ok());
}

#[test]
fn test_accessor_rejections() {
    let base = || RawCandidate::new("CVE-1", record("x")).with_embedding(vec![1.0, 0.0]);

    let missing_id = RawCandidate {
        id: Some("   ".to_string()),
        ..base().with_similarity(0.5)
    };
    assert_eq!(
        normalize_candidates(vec![missing_id]),
        Err(AccessorError::MissingIdentifier { index: 0 })
    );

    assert!(matches!(
        normalize_candidates(vec![base()]),
        Err(AccessorError::MissingRelevance { .. })
    ));

    assert!(matches!(
        normalize_candidates(vec![base().with_similarity(f32::NAN)]),
        Err(AccessorError::NonFiniteRelevance { .. })
    ));

    assert!(matches!(
        normalize_candidates(vec![base().with_distance(0.1).with_similarity(0.1)]),
        Err(AccessorError::ConflictingRelevance { .. })
    ));

    let no_source = RawCandidate::new("CVE-1", record("x")).with_similarity(0.5);
    assert!(matches!(
        normalize_candidates(vec![no_source]),
        Err(AccessorError::MissingDistanceSource { .. })
    ));

    let empty_vector = RawCandidate::new("CVE-1", record("x"))
        .with_similarity(0.5)
        .with_embedding(Vec::new());
    assert!(matches!(
        normalize_candidates(vec![empty_vector]),
        Err(AccessorError::MissingDistanceSource { .. })
    ));

    let dup = vec![base().with_similarity(0.5), base().with_similarity(0.4)];
    assert!(matches!(
        normalize_candidates(dup),
        Err(AccessorError::DuplicateIdentifier { .. })
    ));

    let mixed_dims = vec![
        base().with_similarity(0.5),
        RawCandidate::new("CVE-2", record("y"))
            .with_similarity(0.4)
            .with_embedding(vec![1.0, 0.0, 0.0]),
    ];
    assert!(matches!(
        normalize_candidates(mixed_dims),
        Err(AccessorError::InconsistentDimension {
            expected: 2,
            actual: 3,
            ..
        })
    ));
}

#[test]
fn test_accessor_preserves_order_and_trims_ids() {
    let rows = vec![
        RawCandidate::new(" CVE-2 ", record("b"))
            .with_similarity(0.4)
            .with_embedding(vec![0.0, 1.0]),
        RawCandidate::new("CVE-1", record("a"))
            .with_similarity(0.9)
            .with_embedding(vec![1.0, 0.0]),
    ];
    let entries = normalize_candidates(rows).unwrap();
    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["CVE-2", "CVE-1"]);
}

// ---------------------------------------------------------------------------
// Renderer and prompt
// ---------------------------------------------------------------------------

#[test]
fn test_render_empty_is_sentinel() {
    assert_eq!(render(&[]), NO_RECORDS_SENTINEL);
}

#[test]
fn test_render_emits_every_label_with_placeholders() {
    let entry = CandidateEntry::new(
        "CVE-2024-0001",
        VulnerabilityRecord::default().with_severity("HIGH", 8.1),
        0.9,
        DistanceSource::Vector(vec![1.0]),
    );
    let text = ContextRenderer::new().render_entry(&entry);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(
        lines,
        vec![
            "CVE: CVE-2024-0001",
            "Name: N/A",
            "Description: N/A",
            "Severity: HIGH",
            "CVSS: 8.1",
            "Threat: N/A",
            "Mitigation: N/A",
            "Product: N/A",
            "Version: N/A",
            "CWE: N/A",
        ]
    );
    assert_eq!(text.matches(MISSING_FIELD).count(), 7);
}

#[test]
fn test_render_joins_records_with_separator() {
    let a = CandidateEntry::new(
        "CVE-A",
        VulnerabilityRecord {
            cwe: vec!["CWE-79".into(), "CWE-89".into()],
            ..record("first")
        }
        .with_product("openssl", "3.0.1"),
        0.9,
        DistanceSource::Vector(vec![1.0]),
    );
    let b = CandidateEntry::new(
        "CVE-B",
        record("  ").with_description("overflow"),
        0.8,
        DistanceSource::Vector(vec![1.0]),
    );

    let text = render(&[a, b]);
    let blocks: Vec<&str> = text.split(RECORD_SEPARATOR).collect();
    assert_eq!(blocks.len(), 2);
    assert!(blocks[0].contains("CWE: CWE-79, CWE-89"));
    assert!(blocks[0].contains("Product: openssl"));
    assert!(blocks[0].contains("Version: 3.0.1"));
    assert!(blocks[1].contains("Name: N/A"));
    assert!(blocks[1].contains("Description: overflow"));
}

#[test]
fn test_prompt_shape() {
    let prompt = PromptTemplate::default().compose("  Is log4j exploitable? ", "ctx");
    assert_eq!(
        prompt,
        "You are a cybersecurity expert. Answer: Is log4j exploitable?\nCVE data:\nctx"
    );

    let custom = PromptTemplate::new("You are terse.", "Records").compose("q", "c");
    assert_eq!(custom, "You are terse. Answer: q\nRecords:\nc");
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

fn seeded_store(mode: PairwiseMode) -> MockSimilarityStore {
    let mut base = vec![0.0; DIM];
    base[0] = 1.0;
    let mut near = base.clone();
    near[1] = 0.05;
    let mut other = vec![0.0; DIM];
    other[2] = 1.0;

    MockSimilarityStore::with_mode(mode).with_records(vec![
        CveRecord::new("CVE-2024-0001", record("primary"), unit(&base)),
        CveRecord::new("CVE-2024-0002", record("near duplicate"), unit(&near)),
        CveRecord::new("CVE-2024-0003", record("unrelated"), unit(&other)),
    ])
}

fn query_vector() -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[0] = 1.0;
    v[2] = 0.3;
    unit(&v)
}

fn pipeline(
    store: MockSimilarityStore,
    k: usize,
) -> RetrievalPipeline<MockEmbedder, MockSimilarityStore> {
    let embedder = MockEmbedder::new(DIM).with_vector("log4j", query_vector());
    RetrievalPipeline::new(embedder, store, SelectionParams::balanced(k).unwrap())
}

#[tokio::test]
async fn test_build_context_renders_selected_records() {
    for mode in [
        PairwiseMode::Vectors,
        PairwiseMode::Precomputed,
        PairwiseMode::RawDistance,
    ] {
        let p = pipeline(seeded_store(mode), 2);
        let selection = p.build_selection("log4j").await.unwrap();
        assert_eq!(
            selection.ids(),
            vec!["CVE-2024-0001", "CVE-2024-0003"],
            "mode {mode:?}"
        );

        let context = p.build_context("log4j").await.unwrap();
        assert!(context.starts_with("CVE: CVE-2024-0001"));
        assert!(context.contains("CVE: CVE-2024-0003"));
        assert!(!context.contains("CVE-2024-0002"));
    }
}

#[tokio::test]
async fn test_build_context_empty_store_renders_sentinel() {
    let p = pipeline(MockSimilarityStore::new(), 5);
    assert_eq!(p.build_context("log4j").await.unwrap(), NO_RECORDS_SENTINEL);

    let prompt = p.build_prompt("log4j").await.unwrap();
    assert!(prompt.ends_with(NO_RECORDS_SENTINEL));
    assert!(prompt.starts_with("You are a cybersecurity expert. Answer: log4j\n"));
}

#[tokio::test]
async fn test_blank_query_rejected_before_any_call() {
    let p = pipeline(seeded_store(PairwiseMode::Vectors), 2);
    let err = p.build_context("   ").await.unwrap_err();
    assert!(matches!(err, RetrievalError::InvalidInput { .. }));
    assert_eq!(err.code(), "invalid_input");
    assert_eq!(p.embedder().calls(), 0);
    assert_eq!(p.store().searches(), 0);
}

#[tokio::test]
async fn test_malformed_embedding_fails_without_store_call() {
    for failure in [MockEmbedFailure::NonArray, MockEmbedFailure::WrongDimension] {
        let p = pipeline(seeded_store(PairwiseMode::Vectors), 2);
        p.embedder().fail_with(failure);
        let err = p.build_context("log4j").await.unwrap_err();
        assert!(
            matches!(
                err,
                RetrievalError::MalformedUpstreamData {
                    stage: Stage::Embedding,
                    ..
                }
            ),
            "{failure:?}: {err}"
        );
        assert_eq!(p.store().searches(), 0);
    }
}

#[tokio::test]
async fn test_unreachable_providers_are_distinct_errors() {
    let p = pipeline(seeded_store(PairwiseMode::Vectors), 2);
    p.embedder().fail_with(MockEmbedFailure::Unavailable);
    assert!(matches!(
        p.build_context("log4j").await,
        Err(RetrievalError::ProviderUnavailable {
            stage: Stage::Embedding,
            ..
        })
    ));

    p.embedder().clear_failure();
    p.store().set_failing(true);
    let err = p.build_context("log4j").await.unwrap_err();
    assert!(matches!(
        err,
        RetrievalError::ProviderUnavailable {
            stage: Stage::SimilarityStore,
            ..
        }
    ));
    assert_eq!(err.code(), "provider_unavailable");
}

#[tokio::test]
async fn test_malformed_store_rows_fail_fast() {
    struct DuplicatingStore;

    impl crate::vectordb::SimilarityStore for DuplicatingStore {
        async fn fetch_candidates(
            &self,
            _query: Vec<f32>,
            _limit: u64,
        ) -> Result<Vec<RawCandidate>, crate::vectordb::VectorDbError> {
            let row = RawCandidate::new("CVE-1", VulnerabilityRecord::default())
                .with_similarity(0.9)
                .with_embedding(vec![1.0]);
            Ok(vec![row.clone(), row])
        }

        async fn health_check(&self) -> Result<(), crate::vectordb::VectorDbError> {
            Ok(())
        }
    }

    let p = RetrievalPipeline::new(
        MockEmbedder::new(DIM),
        DuplicatingStore,
        SelectionParams::balanced(3).unwrap(),
    );
    let err = p.build_context("anything").await.unwrap_err();
    assert!(matches!(
        err,
        RetrievalError::MalformedUpstreamData {
            stage: Stage::SimilarityStore,
            ..
        }
    ));
}

struct SlowEmbedder {
    delay: Duration,
}

impl EmbeddingProvider for SlowEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        tokio::time::sleep(self.delay).await;
        Ok(inputs.iter().map(|_| vec![1.0; DIM]).collect())
    }

    fn embedding_dim(&self) -> usize {
        DIM
    }
}

#[tokio::test]
async fn test_embedding_timeout_is_provider_unavailable() {
    let p = RetrievalPipeline::new(
        SlowEmbedder {
            delay: Duration::from_secs(5),
        },
        seeded_store(PairwiseMode::Vectors),
        SelectionParams::balanced(2).unwrap(),
    )
    .with_stage_timeout(Duration::from_millis(20));

    let err = p.build_context("log4j").await.unwrap_err();
    assert!(matches!(
        err,
        RetrievalError::ProviderUnavailable {
            stage: Stage::Embedding,
            ..
        }
    ));
    assert_eq!(p.store().searches(), 0);
}

#[tokio::test]
async fn test_zero_candidate_limit_is_invalid() {
    let result = pipeline(MockSimilarityStore::new(), 2).with_candidate_limit(0);
    assert!(matches!(result, Err(RetrievalError::InvalidInput { .. })));
}

#[tokio::test]
async fn test_candidate_limit_bounds_the_pool() {
    let p = pipeline(seeded_store(PairwiseMode::Vectors), 5)
        .with_candidate_limit(1)
        .unwrap();
    let selection = p.build_selection("log4j").await.unwrap();
    assert_eq!(selection.ids(), vec!["CVE-2024-0001"]);
    assert!(selection.is_exhausted());
}
