//! Diversity-corrected ranking.

use crate::models::{MemoryType, ScoredMemory};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Per-type decay: the k-th record of a type already ranked is scaled by `0.9^k`.
pub const DIVERSITY_DECAY: f64 = 0.9;

/// Sorts by score, applies the diversity correction, then re-sorts.
///
/// Ties are broken by memory id so the output is deterministic.
#[must_use]
pub fn rank(mut scored: Vec<ScoredMemory>) -> Vec<ScoredMemory> {
    scored.sort_by(by_score_then_id);

    let mut seen: HashMap<MemoryType, i32> = HashMap::new();
    for item in &mut scored {
        let k = seen.entry(item.memory.memory_type()).or_insert(0);
        item.score *= DIVERSITY_DECAY.powi(*k);
        *k += 1;
    }

    scored.sort_by(by_score_then_id);
    scored
}

fn by_score_then_id(a: &ScoredMemory, b: &ScoredMemory) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.memory.id.cmp(&b.memory.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DecisionPayload, Memory, MemoryContent, TribalPayload};

    fn scored(id: &str, content: MemoryContent, score: f64) -> ScoredMemory {
        ScoredMemory {
            memory: Memory::new(id, "s", content),
            score,
            reason: String::new(),
        }
    }

    fn tribal(id: &str, score: f64) -> ScoredMemory {
        scored(id, MemoryContent::Tribal(TribalPayload::default()), score)
    }

    fn decision(id: &str, score: f64) -> ScoredMemory {
        scored(id, MemoryContent::Decision(DecisionPayload::default()), score)
    }

    #[test]
    fn test_same_type_decays() {
        let ranked = rank(vec![tribal("a", 0.8), tribal("b", 0.8), tribal("c", 0.8)]);
        let ids: Vec<&str> = ranked.iter().map(|s| s.memory.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert!((ranked[0].score - 0.8).abs() < 1e-9);
        assert!((ranked[1].score - 0.72).abs() < 1e-9);
        assert!((ranked[2].score - 0.648).abs() < 1e-9);
    }

    #[test]
    fn test_other_type_overtakes_decayed() {
        let ranked = rank(vec![tribal("a", 0.8), tribal("b", 0.79), decision("c", 0.75)]);
        let ids: Vec<&str> = ranked.iter().map(|s| s.memory.id.as_str()).collect();
        assert_eq!(ids, ["a", "c", "b"]);
    }

    #[test]
    fn test_empty() {
        assert!(rank(Vec::new()).is_empty());
    }
}
