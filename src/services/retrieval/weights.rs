//! Intent × memory-type weight table.
//!
//! A weight of 1.0 is neutral; above promotes, below demotes. Every entry
//! lies in `[MIN_WEIGHT, MAX_WEIGHT]`.

use crate::models::{Intent, MemoryType, ScoredMemory};

/// Smallest weight in the table.
pub const MIN_WEIGHT: f64 = 0.3;
/// Largest weight in the table.
pub const MAX_WEIGHT: f64 = 2.0;

/// Returns the multiplier applied to `memory_type` under `intent`.
#[must_use]
pub const fn intent_weight(intent: Intent, memory_type: MemoryType) -> f64 {
    use Intent as I;
    use MemoryType as T;
    match (intent, memory_type) {
        // Bugs: what the team already tripped over.
        (I::FixBug, T::Tribal) => 2.0,
        (I::FixBug, T::CodeSmell) => 1.5,
        (I::FixBug, T::PatternRationale) => 1.3,
        (I::FixBug, T::DecisionContext | T::Episodic) => 1.2,

        // Features: patterns, decisions and the constraints around them.
        (I::AddFeature, T::PatternRationale) => 2.0,
        (I::AddFeature, T::ConstraintOverride | T::DecisionContext) => 1.5,
        (I::AddFeature, T::Core | T::Decision) => 1.3,
        (I::AddFeature, T::CodeSmell) => 0.8,

        // Refactors: smells first, then why things are shaped the way they are.
        (I::Refactor, T::CodeSmell) => 2.0,
        (I::Refactor, T::PatternRationale) => 1.8,
        (I::Refactor, T::DecisionContext) => 1.5,
        (I::Refactor, T::ConstraintOverride) => 1.3,
        (I::Refactor, T::Episodic) => 0.5,

        // Security audits: tribal warnings and constraint exceptions.
        (I::SecurityAudit, T::Tribal | T::ConstraintOverride) => 2.0,
        (I::SecurityAudit, T::CodeSmell) => 1.5,
        (I::SecurityAudit, T::PatternRationale) => 1.3,
        (I::SecurityAudit, T::Procedural) => 0.5,
        (I::SecurityAudit, T::Episodic) => 0.3,

        // Understanding: decisions and their context.
        (I::UnderstandCode, T::DecisionContext) => 1.8,
        (I::UnderstandCode, T::Decision | T::PatternRationale | T::Tribal) => 1.5,
        (I::UnderstandCode, T::Core | T::Semantic) => 1.3,

        // Tests: patterns and known smells.
        (I::AddTest, T::PatternRationale) => 1.8,
        (I::AddTest, T::CodeSmell) => 1.5,
        (I::AddTest, T::ConstraintOverride | T::Procedural) => 1.3,

        _ => 1.0,
    }
}

/// Multiplies each score by its intent weight and notes non-neutral boosts
/// in the reason.
pub fn apply_intent(scored: &mut [ScoredMemory], intent: Intent) {
    for item in scored {
        let weight = intent_weight(intent, item.memory.memory_type());
        if (weight - 1.0).abs() > f64::EPSILON {
            item.score *= weight;
            item.reason = format!("{}; {intent} x{weight:.1}", item.reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Memory, MemoryContent, TribalPayload};
    use test_case::test_case;

    #[test]
    fn test_table_bounds() {
        for &intent in Intent::all() {
            for &memory_type in MemoryType::all() {
                let w = intent_weight(intent, memory_type);
                assert!((MIN_WEIGHT..=MAX_WEIGHT).contains(&w), "{intent} {memory_type:?} = {w}");
            }
        }
    }

    #[test_case(Intent::SecurityAudit, MemoryType::Tribal, 2.0)]
    #[test_case(Intent::Refactor, MemoryType::CodeSmell, 2.0)]
    #[test_case(Intent::UnderstandCode, MemoryType::Episodic, 1.0)]
    #[test_case(Intent::SecurityAudit, MemoryType::Episodic, 0.3)]
    fn test_known_weights(intent: Intent, memory_type: MemoryType, expected: f64) {
        assert!((intent_weight(intent, memory_type) - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn test_apply_intent_doubles_tribal_for_audit() {
        let memory = Memory::new("mem-1", "s", MemoryContent::Tribal(TribalPayload::default()));
        let mut scored = vec![ScoredMemory {
            memory,
            score: 0.4,
            reason: "focus match".to_string(),
        }];
        apply_intent(&mut scored, Intent::SecurityAudit);
        assert!((scored[0].score - 0.8).abs() < 1e-9);
        assert_eq!(scored[0].reason, "focus match; security_audit x2.0");
    }
}
