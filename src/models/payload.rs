//! Variant-specific memory payloads.

use super::MemoryId;
use super::retrieval::Intent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Core project memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorePayload {
    /// Project name.
    pub project_name: String,
    /// Project description.
    pub description: String,
}

/// Severity of tribal knowledge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TribalSeverity {
    /// Ignoring this breaks things.
    Critical,
    /// Ignoring this causes trouble.
    Warning,
    /// Useful to know.
    #[default]
    Info,
}

impl TribalSeverity {
    /// Returns the severity as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// Team knowledge that is not written down anywhere else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TribalPayload {
    /// Subject of the knowledge.
    pub topic: String,
    /// The knowledge itself.
    pub knowledge: String,
    /// How much it matters.
    pub severity: TribalSeverity,
    /// Concrete warnings.
    pub warnings: Vec<String>,
}

/// A how-to procedure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProceduralPayload {
    /// Procedure name.
    pub name: String,
    /// Ordered steps.
    pub steps: Vec<String>,
    /// Verification checklist.
    pub checklist: Vec<String>,
}

/// An abstraction consolidated from episodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticPayload {
    /// Subject of the abstraction.
    pub topic: String,
    /// Distilled knowledge.
    pub knowledge: String,
    /// Episodes this abstraction was built from.
    pub source_episodes: Vec<MemoryId>,
}

/// Lifecycle of an episodic record.
///
/// Transitions only `Pending -> Consolidated | Pruned`; both targets are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsolidationStatus {
    /// Awaiting consolidation.
    #[default]
    Pending,
    /// Folded into an abstraction.
    Consolidated,
    /// Absorbed and dropped from retrieval.
    Pruned,
}

impl ConsolidationStatus {
    /// Returns the status as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Consolidated => "consolidated",
            Self::Pruned => "pruned",
        }
    }

    /// Returns true if no further transition is allowed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns the new status if `self -> to` is a legal transition.
    ///
    /// Re-asserting the current status is accepted as a no-op.
    #[must_use]
    pub const fn transition(self, to: Self) -> Option<Self> {
        match (self, to) {
            (Self::Pending, _) => Some(to),
            (Self::Consolidated, Self::Consolidated) | (Self::Pruned, Self::Pruned) => Some(to),
            _ => None,
        }
    }
}

impl fmt::Display for ConsolidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the user was doing during an episode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeContext {
    /// Task intent, if known.
    pub intent: Option<Intent>,
    /// Focus area (file, module or topic).
    pub focus: Option<String>,
}

/// A single question/answer exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Interaction {
    /// What the user asked.
    pub user_query: String,
    /// What the agent answered.
    pub agent_response: String,
    /// How it turned out.
    pub outcome: Option<String>,
}

/// A raw interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodicPayload {
    /// Session the interaction belongs to.
    pub session_id: String,
    /// What the user was doing.
    pub context: EpisodeContext,
    /// The exchange itself.
    pub interaction: Interaction,
    /// Consolidation lifecycle state.
    pub consolidation_status: ConsolidationStatus,
}

/// A recorded decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionPayload {
    /// Short title.
    pub title: String,
    /// What was decided.
    pub decision: String,
    /// Why.
    pub rationale: String,
    /// Options that were rejected.
    pub alternatives: Vec<String>,
}

/// Why a code pattern exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternRationalePayload {
    /// Pattern name.
    pub pattern_name: String,
    /// The reason.
    pub rationale: String,
    /// Business context, if any.
    pub business_context: Option<String>,
}

/// An approved exception to a constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintOverridePayload {
    /// Constraint being overridden.
    pub constraint_name: String,
    /// Why the override is allowed.
    pub reason: String,
    /// Where the override applies.
    pub scope: Option<String>,
    /// Who approved it.
    pub approved_by: Option<String>,
}

/// Severity of a code smell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeSmellSeverity {
    /// Must fix.
    Error,
    /// Should fix.
    #[default]
    Warning,
    /// Worth knowing.
    Info,
}

impl CodeSmellSeverity {
    /// Returns the severity as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// An anti-pattern to avoid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeSmellPayload {
    /// Smell name.
    pub name: String,
    /// How bad it is.
    pub severity: CodeSmellSeverity,
    /// Why it is a smell.
    pub reason: String,
    /// What to do instead.
    pub suggestion: String,
    /// Pattern the smell violates.
    pub pattern: Option<String>,
    /// What happens if ignored.
    pub consequences: Vec<String>,
    /// Offending example.
    pub example_bad: Option<String>,
    /// Corrected example.
    pub example_good: Option<String>,
    /// Rule used to detect the smell.
    pub detection_rule: Option<String>,
}

/// Context surrounding an earlier decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionContextPayload {
    /// Summary of the decision this context belongs to.
    pub decision_summary: String,
    /// The context.
    pub context: String,
    /// Whether the context still holds.
    pub still_valid: bool,
}

impl Default for DecisionContextPayload {
    fn default() -> Self {
        Self {
            decision_summary: String::new(),
            context: String::new(),
            still_valid: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ConsolidationStatus::Pending, ConsolidationStatus::Consolidated, true)]
    #[test_case(ConsolidationStatus::Pending, ConsolidationStatus::Pruned, true)]
    #[test_case(ConsolidationStatus::Consolidated, ConsolidationStatus::Pending, false)]
    #[test_case(ConsolidationStatus::Pruned, ConsolidationStatus::Consolidated, false)]
    #[test_case(ConsolidationStatus::Pruned, ConsolidationStatus::Pruned, true)]
    fn test_status_transition(from: ConsolidationStatus, to: ConsolidationStatus, legal: bool) {
        assert_eq!(from.transition(to).is_some(), legal);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ConsolidationStatus::Pending.is_terminal());
        assert!(ConsolidationStatus::Consolidated.is_terminal());
        assert!(ConsolidationStatus::Pruned.is_terminal());
    }
}
