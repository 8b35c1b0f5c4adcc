//! Relevance scoring.
//!
//! ```text
//! score = 0.30 * confidence
//!       + 0.20 * importance_weight
//!       + 0.15 * exp(-age_days / 30)
//!       + 0.10 * min(1, log10(access_count + 1) / 2)
//!       + 0.25 * max(topic_match, summary_match, knowledge_match)
//! ```
//!
//! Each match term is the Jaccard index of lower-cased word sets against the
//! focus. An empty focus contributes 0. The sum is clamped to `[0, 1]`.

use crate::models::{Memory, ScoredMemory, clamp_unit};
use crate::services::text::{jaccard, word_set};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Weight of record confidence.
pub const CONFIDENCE_WEIGHT: f64 = 0.3;
/// Weight of importance.
pub const IMPORTANCE_WEIGHT: f64 = 0.2;
/// Weight of recency.
pub const RECENCY_WEIGHT: f64 = 0.15;
/// Weight of access frequency.
pub const ACCESS_WEIGHT: f64 = 0.1;
/// Weight of the focus match.
pub const FOCUS_WEIGHT: f64 = 0.25;
/// Recency decay constant, in days.
pub const RECENCY_DECAY_DAYS: f64 = 30.0;

/// Weighted contributions of each scoring factor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreBreakdown {
    /// Confidence contribution.
    pub confidence: f64,
    /// Importance contribution.
    pub importance: f64,
    /// Recency contribution.
    pub recency: f64,
    /// Access-frequency contribution.
    pub access: f64,
    /// Focus-match contribution.
    pub focus: f64,
}

impl ScoreBreakdown {
    /// Computes the breakdown for `memory` against `focus` at time `now`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(memory: &Memory, focus: &str, now: DateTime<Utc>) -> Self {
        let recency = (-memory.age_days(now) / RECENCY_DECAY_DAYS).exp();
        let access = ((memory.access_count as f64 + 1.0).log10() / 2.0).min(1.0);
        Self {
            confidence: CONFIDENCE_WEIGHT * memory.confidence.value(),
            importance: IMPORTANCE_WEIGHT * memory.importance.weight(),
            recency: RECENCY_WEIGHT * recency,
            access: ACCESS_WEIGHT * access,
            focus: FOCUS_WEIGHT * focus_match(memory, focus),
        }
    }

    /// Returns the clamped sum.
    #[must_use]
    pub fn total(&self) -> f64 {
        clamp_unit(self.confidence + self.importance + self.recency + self.access + self.focus)
    }

    /// Names the factor that contributed most.
    #[must_use]
    pub fn dominant(&self) -> &'static str {
        [
            (self.focus, "focus match"),
            (self.confidence, "high confidence"),
            (self.importance, "importance"),
            (self.recency, "recently created"),
            (self.access, "frequently accessed"),
        ]
        .into_iter()
        .fold((f64::MIN, "high confidence"), |best, (value, name)| {
            if value > best.0 { (value, name) } else { best }
        })
        .1
    }
}

/// Best Jaccard match of `focus` against the record's topic, summary and knowledge.
///
/// Returns 0 for an empty focus.
#[must_use]
pub fn focus_match(memory: &Memory, focus: &str) -> f64 {
    let focus_words = word_set(focus);
    if focus_words.is_empty() {
        return 0.0;
    }
    let against = |text: Option<&str>| -> f64 {
        text.map_or(0.0, |t| {
            let words: HashSet<String> = word_set(t);
            jaccard(&focus_words, &words)
        })
    };
    against(memory.topic())
        .max(against(Some(memory.summary.as_str())))
        .max(against(memory.knowledge()))
}

/// Scores one candidate.
#[must_use]
pub fn score(memory: Memory, focus: &str, now: DateTime<Utc>) -> ScoredMemory {
    let breakdown = ScoreBreakdown::compute(&memory, focus, now);
    ScoredMemory {
        score: breakdown.total(),
        reason: breakdown.dominant().to_string(),
        memory,
    }
}
