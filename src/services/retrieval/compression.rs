//! Hierarchical compression.
//!
//! | Level | Content |
//! |-------|---------|
//! | summary | the record's summary, or a type-specific default |
//! | expanded | summary plus 2–4 type-specific detail lines, each ≤ 100 chars |
//! | full | the complete record as pretty JSON |

use crate::models::{CompressedMemory, CompressionLevel, Memory, MemoryContent};
use crate::services::text::{estimate_tokens, truncate};

/// Maximum characters per expanded detail line.
pub const DETAIL_LINE_MAX_CHARS: usize = 100;
const MAX_DETAIL_LINES: usize = 4;
const MIN_DETAIL_LINES: usize = 2;

/// Renders `memory` at `level`.
#[must_use]
pub fn compress(memory: &Memory, level: CompressionLevel) -> CompressedMemory {
    let content = match level {
        CompressionLevel::Summary => summary_text(memory),
        CompressionLevel::Expanded => expanded_text(memory),
        CompressionLevel::Full => serde_json::to_string_pretty(memory).unwrap_or_else(|e| {
            tracing::warn!(memory_id = %memory.id, error = %e, "full serialization failed, using expanded");
            expanded_text(memory)
        }),
    };
    CompressedMemory {
        memory_id: memory.id.clone(),
        memory_type: memory.memory_type(),
        level,
        tokens: estimate_tokens(&content),
        content,
    }
}

/// Estimated tokens of `memory` at `level`.
#[must_use]
pub fn tokens_at(memory: &Memory, level: CompressionLevel) -> usize {
    compress(memory, level).tokens
}

fn summary_text(memory: &Memory) -> String {
    let summary = memory.summary.trim();
    if !summary.is_empty() {
        return summary.to_string();
    }
    let kind = memory.memory_type();
    memory
        .topic()
        .map_or_else(|| format!("{kind} memory {}", memory.id), |topic| format!("{kind}: {topic}"))
}

fn expanded_text(memory: &Memory) -> String {
    let mut lines = detail_lines(memory);
    lines.retain(|(_, value)| !value.trim().is_empty());
    lines.truncate(MAX_DETAIL_LINES - 1);
    lines.push((
        "Confidence",
        format!("{:.2} ({})", memory.confidence.value(), memory.importance.as_str()),
    ));
    if lines.len() < MIN_DETAIL_LINES {
        lines.push(("Type", memory.memory_type().to_string()));
    }

    let mut out = summary_text(memory);
    for (label, value) in lines {
        out.push_str("\n- ");
        out.push_str(&truncate(&format!("{label}: {value}"), DETAIL_LINE_MAX_CHARS));
    }
    out
}

fn detail_lines(memory: &Memory) -> Vec<(&'static str, String)> {
    match &memory.content {
        MemoryContent::Core(p) => vec![
            ("Project", p.project_name.clone()),
            ("Description", p.description.clone()),
        ],
        MemoryContent::Tribal(p) => vec![
            ("Knowledge", p.knowledge.clone()),
            ("Severity", p.severity.as_str().to_string()),
            ("Warning", p.warnings.first().cloned().unwrap_or_default()),
        ],
        MemoryContent::Procedural(p) => vec![
            ("Procedure", p.name.clone()),
            ("Steps", p.steps.join(" -> ")),
            ("Check", p.checklist.join(", ")),
        ],
        MemoryContent::Semantic(p) => vec![
            ("Topic", p.topic.clone()),
            ("Knowledge", p.knowledge.clone()),
            ("Sources", p.source_episodes.len().to_string()),
        ],
        MemoryContent::Episodic(p) => vec![
            ("Query", p.interaction.user_query.clone()),
            ("Outcome", p.interaction.outcome.clone().unwrap_or_default()),
            ("Status", p.consolidation_status.as_str().to_string()),
        ],
        MemoryContent::Decision(p) => vec![
            ("Decision", p.decision.clone()),
            ("Rationale", p.rationale.clone()),
            ("Rejected", p.alternatives.join(", ")),
        ],
        MemoryContent::PatternRationale(p) => vec![
            ("Pattern", p.pattern_name.clone()),
            ("Rationale", p.rationale.clone()),
            ("Business", p.business_context.clone().unwrap_or_default()),
        ],
        MemoryContent::ConstraintOverride(p) => vec![
            ("Constraint", p.constraint_name.clone()),
            ("Reason", p.reason.clone()),
            ("Scope", p.scope.clone().unwrap_or_default()),
        ],
        MemoryContent::CodeSmell(p) => vec![
            ("Severity", p.severity.as_str().to_string()),
            ("Reason", p.reason.clone()),
            ("Instead", p.suggestion.clone()),
        ],
        MemoryContent::DecisionContext(p) => vec![
            ("Decision", p.decision_summary.clone()),
            ("Context", p.context.clone()),
            ("Still valid", p.still_valid.to_string()),
        ],
    }
}
