//! Similarity-based inference.
//!
//! `similarity = 0.4 * topic + 0.3 * tag_jaccard + 0.3 * linked_entity_jaccard`.
//! No embeddings are involved; every component is token or set overlap.

use super::InferenceStrategy;
use crate::models::{CausalEdge, CausalRelation, Evidence, EvidenceKind, Memory, MemoryType};
use crate::services::text::{jaccard, word_set};
use std::collections::HashSet;

const TOPIC_WEIGHT: f64 = 0.4;
const TAG_WEIGHT: f64 = 0.3;
const ENTITY_WEIGHT: f64 = 0.3;
const CONTAINMENT_SCORE: f64 = 0.7;
/// Similarity above which a candidate is treated as the record's source.
const DERIVED_THRESHOLD: f64 = 0.8;

/// Default similarity floor.
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.3;

/// Similarity components between two records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    /// Topic similarity.
    pub topic: f64,
    /// Tag Jaccard index.
    pub tags: f64,
    /// Linked-entity Jaccard index.
    pub entities: f64,
}

impl Similarity {
    /// Computes the components for `a` against `b`.
    #[must_use]
    pub fn between(a: &Memory, b: &Memory) -> Self {
        let tags_a: HashSet<&String> = a.tags.iter().collect();
        let tags_b: HashSet<&String> = b.tags.iter().collect();
        let entities_a: HashSet<String> = a.linked_entities().into_iter().collect();
        let entities_b: HashSet<String> = b.linked_entities().into_iter().collect();
        Self {
            topic: topic_similarity(a.topic(), b.topic()),
            tags: jaccard(&tags_a, &tags_b),
            entities: jaccard(&entities_a, &entities_b),
        }
    }

    /// Weighted total in `[0, 1]`.
    #[must_use]
    pub fn total(&self) -> f64 {
        TOPIC_WEIGHT * self.topic + TAG_WEIGHT * self.tags + ENTITY_WEIGHT * self.entities
    }
}

/// Topic similarity: exact 1.0, containment 0.7, otherwise word-overlap ratio.
///
/// The overlap ratio is shared words over the larger word set. A missing or
/// empty topic on either side scores 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn topic_similarity(a: Option<&str>, b: Option<&str>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };
    let (a, b) = (a.trim().to_lowercase(), b.trim().to_lowercase());
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return CONTAINMENT_SCORE;
    }
    let (wa, wb) = (word_set(&a), word_set(&b));
    let larger = wa.len().max(wb.len());
    if larger == 0 {
        return 0.0;
    }
    wa.intersection(&wb).count() as f64 / larger as f64
}

/// Infers edges between records that look alike.
#[derive(Debug, Clone, Copy)]
pub struct SemanticStrategy {
    min_similarity: f64,
}

impl Default for SemanticStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SIMILARITY)
    }
}

impl SemanticStrategy {
    /// Creates the strategy with a similarity floor.
    #[must_use]
    pub fn new(min_similarity: f64) -> Self {
        Self {
            min_similarity: crate::models::clamp_unit(min_similarity),
        }
    }

    /// Returns the similarity floor.
    #[must_use]
    pub const fn min_similarity(&self) -> f64 {
        self.min_similarity
    }

    /// Picks the relation implied by a similarity and the two types.
    #[must_use]
    pub fn relation_for(similarity: f64, record: MemoryType, candidate: MemoryType) -> CausalRelation {
        if similarity > DERIVED_THRESHOLD {
            CausalRelation::DerivedFrom
        } else if record == candidate {
            CausalRelation::Supports
        } else if matches!(candidate, MemoryType::Tribal | MemoryType::Semantic) {
            CausalRelation::Enabled
        } else {
            CausalRelation::Supports
        }
    }
}

impl InferenceStrategy for SemanticStrategy {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn infer(&self, memory: &Memory, candidates: &[Memory]) -> Vec<CausalEdge> {
        candidates
            .iter()
            .filter(|c| c.id != memory.id)
            .filter_map(|candidate| {
                let parts = Similarity::between(memory, candidate);
                let similarity = parts.total();
                if similarity < self.min_similarity {
                    return None;
                }
                let relation =
                    Self::relation_for(similarity, memory.memory_type(), candidate.memory_type());
                Some(
                    CausalEdge::new(candidate.id.clone(), memory.id.clone(), relation, similarity)
                        .with_evidence(Evidence::new(
                            EvidenceKind::Semantic,
                            format!(
                                "similarity {similarity:.2} (topic {:.2}, tags {:.2}, links {:.2})",
                                parts.topic, parts.tags, parts.entities
                            ),
                            similarity,
                        )),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DecisionPayload, MemoryContent, TribalPayload};
    use test_case::test_case;

    fn tribal(id: &str, topic: &str) -> Memory {
        Memory::new(
            id,
            "note",
            MemoryContent::Tribal(TribalPayload {
                topic: topic.to_string(),
                ..TribalPayload::default()
            }),
        )
    }

    fn decision(id: &str, title: &str) -> Memory {
        Memory::new(
            id,
            "note",
            MemoryContent::Decision(DecisionPayload {
                title: title.to_string(),
                ..DecisionPayload::default()
            }),
        )
    }

    #[test_case(Some("Auth"), Some("auth"), 1.0; "exact ignoring case")]
    #[test_case(Some("auth"), Some("auth tokens"), 0.7; "containment")]
    #[test_case(Some("token refresh flow"), Some("token expiry flow"), 2.0 / 3.0; "word overlap")]
    #[test_case(None, Some("auth"), 0.0; "missing topic")]
    fn test_topic_similarity(a: Option<&str>, b: Option<&str>, expected: f64) {
        assert!((topic_similarity(a, b) - expected).abs() < 1e-9);
    }

    #[test_case(0.9, MemoryType::Tribal, MemoryType::Decision, CausalRelation::DerivedFrom)]
    #[test_case(0.5, MemoryType::Decision, MemoryType::Decision, CausalRelation::Supports)]
    #[test_case(0.5, MemoryType::Decision, MemoryType::Tribal, CausalRelation::Enabled)]
    #[test_case(0.5, MemoryType::Tribal, MemoryType::Decision, CausalRelation::Supports)]
    fn test_relation_choice(sim: f64, record: MemoryType, candidate: MemoryType, expected: CausalRelation) {
        assert_eq!(SemanticStrategy::relation_for(sim, record, candidate), expected);
    }

    #[test]
    fn test_below_floor_dropped() {
        let record = decision("mem-r", "database choice");
        let unrelated = tribal("mem-u", "css layout");
        assert!(SemanticStrategy::default().infer(&record, &[unrelated]).is_empty());
    }

    #[test]
    fn test_similar_candidate_enables_record() {
        let record = decision("mem-r", "auth").with_tags(["security"]).with_file("src/auth.rs");
        let candidate = tribal("mem-c", "auth").with_tags(["security"]).with_file("src/auth.rs");
        let edges = SemanticStrategy::default().infer(&record, &[candidate]);

        assert_eq!(edges.len(), 1);
        let edge = &edges[0];
        assert!((edge.strength - 1.0).abs() < 1e-9);
        assert_eq!(edge.relation, CausalRelation::DerivedFrom);
        assert_eq!(edge.source_id.as_str(), "mem-c");
        assert_eq!(edge.evidence[0].kind, EvidenceKind::Semantic);
    }

    #[test]
    fn test_moderate_similarity_uses_type_rule() {
        let record = decision("mem-r", "auth");
        let candidate = tribal("mem-c", "auth");
        let edges = SemanticStrategy::default().infer(&record, &[candidate]);
        assert_eq!(edges.len(), 1);
        assert!((edges[0].strength - 0.4).abs() < 1e-9);
        assert_eq!(edges[0].relation, CausalRelation::Enabled);
    }
}
