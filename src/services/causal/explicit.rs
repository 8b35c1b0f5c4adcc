//! Explicit-reference inference.
//!
//! Proposes edges from what a record says outright:
//!
//! | Signal | Relation | Confidence |
//! |--------|----------|------------|
//! | `supersedes` / `superseded_by` field | `supersedes` | 0.95 |
//! | Record id mentioned in text | `derived_from` | 0.85 |
//! | Candidate topic or tag mentioned in text | `supports` | ≤ 0.6 |
//!
//! At most one textual edge is emitted per candidate, and a candidate that is
//! referenced by id never also gets a term edge.

use super::InferenceStrategy;
use crate::models::{CausalEdge, CausalRelation, Evidence, EvidenceKind, Memory, MemoryId};
use crate::services::text::excerpt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Confidence of a declared supersession.
pub const SUPERSEDES_CONFIDENCE: f64 = 0.95;
/// Confidence of an id mention.
pub const ID_REFERENCE_CONFIDENCE: f64 = 0.85;
/// Cap on term-mention confidence.
pub const TERM_REFERENCE_CAP: f64 = 0.6;
/// Characters of context kept either side of an id mention.
const EXCERPT_RADIUS: usize = 30;

const LENGTH_WEIGHT: f64 = 0.3;
const LENGTH_SATURATION: f64 = 20.0;
const OCCURRENCE_WEIGHT: f64 = 0.3;
const OCCURRENCE_SATURATION: f64 = 3.0;
const SPECIFICITY_WEIGHT: f64 = 0.4;
const COMMON_TERM_PENALTY: f64 = 0.3;

/// Words too generic to count as a specific reference.
const COMMON_TERMS: &[&str] = &[
    "error", "function", "method", "class", "value", "data", "type", "config", "service",
    "handler", "test", "update", "should", "always", "never", "code", "file", "user",
];

static ID_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"\bmem-[A-Za-z0-9_-]+|\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\b",
    )
    .map_err(|e| tracing::error!(error = %e, "invalid memory id pattern"))
    .ok()
});

/// Infers edges from supersession fields, id mentions and term mentions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplicitStrategy;

impl ExplicitStrategy {
    /// Creates the strategy.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn supersession_edges(memory: &Memory, candidates: &HashMap<&MemoryId, &Memory>) -> Vec<CausalEdge> {
        let mut edges = Vec::new();
        if let Some(old) = memory.supersedes.as_ref().filter(|id| candidates.contains_key(id)) {
            edges.push(
                CausalEdge::new(old.clone(), memory.id.clone(), CausalRelation::Supersedes, SUPERSEDES_CONFIDENCE)
                    .with_evidence(
                        Evidence::new(
                            EvidenceKind::Explicit,
                            format!("{} declares it supersedes {old}", memory.id),
                            SUPERSEDES_CONFIDENCE,
                        )
                        .with_reference("supersedes"),
                    ),
            );
        }
        if let Some(new) = memory.superseded_by.as_ref().filter(|id| candidates.contains_key(id)) {
            edges.push(
                CausalEdge::new(memory.id.clone(), new.clone(), CausalRelation::Supersedes, SUPERSEDES_CONFIDENCE)
                    .with_evidence(
                        Evidence::new(
                            EvidenceKind::Explicit,
                            format!("{} declares it is superseded by {new}", memory.id),
                            SUPERSEDES_CONFIDENCE,
                        )
                        .with_reference("superseded_by"),
                    ),
            );
        }
        edges
    }

    fn id_reference_edges(
        memory: &Memory,
        candidates: &HashMap<&MemoryId, &Memory>,
        referenced: &mut HashSet<MemoryId>,
    ) -> Vec<CausalEdge> {
        let Some(pattern) = ID_PATTERN.as_ref() else {
            return Vec::new();
        };

        let mut edges = Vec::new();
        for field in memory.text_fields() {
            for m in pattern.find_iter(field) {
                let id = MemoryId::new(m.as_str());
                if id == memory.id || referenced.contains(&id) || !candidates.contains_key(&id) {
                    continue;
                }
                let context = excerpt(field, m.start(), m.end(), EXCERPT_RADIUS);
                edges.push(
                    CausalEdge::new(id.clone(), memory.id.clone(), CausalRelation::DerivedFrom, ID_REFERENCE_CONFIDENCE)
                        .with_evidence(
                            Evidence::new(
                                EvidenceKind::Explicit,
                                format!("{} references {id} by id", memory.id),
                                ID_REFERENCE_CONFIDENCE,
                            )
                            .with_reference(context),
                        ),
                );
                referenced.insert(id);
            }
        }
        edges
    }

    fn term_reference_edges(
        memory: &Memory,
        candidates: &HashMap<&MemoryId, &Memory>,
        referenced: &HashSet<MemoryId>,
    ) -> Vec<CausalEdge> {
        let text = memory.full_text().to_lowercase();
        let mut edges = Vec::new();

        let mut ordered: Vec<&&Memory> = candidates.values().collect();
        ordered.sort_by(|a, b| a.id.cmp(&b.id));

        for candidate in ordered {
            if candidate.id == memory.id || referenced.contains(&candidate.id) {
                continue;
            }
            let best = candidate
                .terms()
                .into_iter()
                .filter_map(|term| {
                    let occurrences = text.matches(term.as_str()).count();
                    (occurrences > 0).then(|| (term_confidence(&term, occurrences), term, occurrences))
                })
                .max_by(|a, b| a.0.total_cmp(&b.0).then_with(|| b.1.cmp(&a.1)));

            if let Some((confidence, term, occurrences)) = best {
                edges.push(
                    CausalEdge::new(candidate.id.clone(), memory.id.clone(), CausalRelation::Supports, confidence)
                        .with_evidence(
                            Evidence::new(
                                EvidenceKind::Explicit,
                                format!("{} mentions \"{term}\" {occurrences}x", memory.id),
                                confidence,
                            )
                            .with_reference(term),
                        ),
                );
            }
        }
        edges
    }
}

/// Confidence of a term mention: length, occurrence count and specificity,
/// capped at [`TERM_REFERENCE_CAP`].
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn term_confidence(term: &str, occurrences: usize) -> f64 {
    let length = (term.chars().count() as f64 / LENGTH_SATURATION).min(1.0);
    let frequency = (occurrences as f64 / OCCURRENCE_SATURATION).min(1.0);
    let specificity = if COMMON_TERMS.contains(&term) {
        COMMON_TERM_PENALTY
    } else {
        1.0
    };
    (LENGTH_WEIGHT * length + OCCURRENCE_WEIGHT * frequency + SPECIFICITY_WEIGHT * specificity)
        .min(TERM_REFERENCE_CAP)
}

impl InferenceStrategy for ExplicitStrategy {
    fn name(&self) -> &'static str {
        "explicit"
    }

    fn infer(&self, memory: &Memory, candidates: &[Memory]) -> Vec<CausalEdge> {
        let by_id: HashMap<&MemoryId, &Memory> = candidates
            .iter()
            .filter(|c| c.id != memory.id)
            .map(|c| (&c.id, c))
            .collect();

        let mut referenced = HashSet::new();
        let mut edges = Self::supersession_edges(memory, &by_id);
        edges.extend(Self::id_reference_edges(memory, &by_id, &mut referenced));
        edges.extend(Self::term_reference_edges(memory, &by_id, &referenced));
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemoryContent, TribalPayload};
    use test_case::test_case;

    fn tribal(id: &str, topic: &str, knowledge: &str) -> Memory {
        Memory::new(
            id,
            format!("note {id}"),
            MemoryContent::Tribal(TribalPayload {
                topic: topic.to_string(),
                knowledge: knowledge.to_string(),
                ..TribalPayload::default()
            }),
        )
    }

    #[test]
    fn test_supersedes_edge_points_at_record() {
        let old = tribal("A", "", "");
        let record = tribal("mem-new", "", "").with_supersedes("A");
        let edges = ExplicitStrategy::new().infer(&record, &[old]);

        assert_eq!(edges.len(), 1);
        let edge = &edges[0];
        assert_eq!(edge.source_id.as_str(), "A");
        assert_eq!(edge.target_id.as_str(), "mem-new");
        assert_eq!(edge.relation, CausalRelation::Supersedes);
        assert!((edge.strength - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn test_absent_supersedes_reference_emits_nothing() {
        let record = tribal("mem-new", "", "").with_supersedes("A");
        let edges = ExplicitStrategy::new().infer(&record, &[tribal("B", "", "")]);
        assert!(edges.is_empty());
    }

    #[test]
    fn test_id_reference_beats_term_reference() {
        let candidate = tribal("mem-auth-1", "token rotation", "");
        let record = tribal(
            "mem-2",
            "",
            "Per mem-auth-1 the token rotation runs hourly, token rotation matters",
        );
        let edges = ExplicitStrategy::new().infer(&record, &[candidate]);

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].relation, CausalRelation::DerivedFrom);
        assert!((edges[0].strength - 0.85).abs() < f64::EPSILON);
        let reference = edges[0].evidence[0].reference.as_deref().unwrap();
        assert!(reference.contains("mem-auth-1"));
    }

    #[test]
    fn test_term_reference_one_edge_per_candidate() {
        let candidate = tribal("mem-c", "connection pooling", "").with_tags(["postgres"]);
        let record = tribal("mem-r", "", "postgres connection pooling needs tuning in postgres");
        let edges = ExplicitStrategy::new().infer(&record, &[candidate]);

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].relation, CausalRelation::Supports);
        assert!(edges[0].strength <= TERM_REFERENCE_CAP);
    }

    #[test_case("config", 1, 0.3 * 0.3 + 0.3 / 3.0 + 0.4 * 0.3; "common word penalised")]
    #[test_case("tokenrotation", 1, 0.6; "specific term capped")]
    #[test_case("abcd", 3, 0.6; "frequent short term capped")]
    fn test_term_confidence(term: &str, occurrences: usize, expected: f64) {
        assert!((term_confidence(term, occurrences) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_ids_ignored() {
        let record = tribal("mem-r", "", "see mem-missing for details");
        assert!(ExplicitStrategy::new().infer(&record, &[]).is_empty());
    }
}
