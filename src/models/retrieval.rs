//! Retrieval request and response types.

use super::{MemoryId, MemoryType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The caller's task category, used to re-weight retrieval scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Adding new functionality.
    AddFeature,
    /// Fixing a defect.
    FixBug,
    /// Restructuring without behavior change.
    Refactor,
    /// Reviewing for security issues.
    SecurityAudit,
    /// Reading to understand.
    #[default]
    UnderstandCode,
    /// Writing tests.
    AddTest,
}

impl Intent {
    /// Returns all intent variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::AddFeature,
            Self::FixBug,
            Self::Refactor,
            Self::SecurityAudit,
            Self::UnderstandCode,
            Self::AddTest,
        ]
    }

    /// Returns the intent as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AddFeature => "add_feature",
            Self::FixBug => "fix_bug",
            Self::Refactor => "refactor",
            Self::SecurityAudit => "security_audit",
            Self::UnderstandCode => "understand_code",
            Self::AddTest => "add_test",
        }
    }

    /// Parses an intent from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "add_feature" | "feature" => Some(Self::AddFeature),
            "fix_bug" | "bug" | "bugfix" => Some(Self::FixBug),
            "refactor" => Some(Self::Refactor),
            "security_audit" | "security" => Some(Self::SecurityAudit),
            "understand_code" | "understand" | "explore" => Some(Self::UnderstandCode),
            "add_test" | "test" => Some(Self::AddTest),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the caller is doing and how much room it has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalContext {
    /// Task category.
    pub intent: Intent,
    /// Free-text focus (file, module or topic). May be empty.
    pub focus: String,
    /// Token budget for the packed response.
    pub max_tokens: usize,
}

impl RetrievalContext {
    /// Creates a retrieval context.
    #[must_use]
    pub fn new(intent: Intent, focus: impl Into<String>, max_tokens: usize) -> Self {
        Self {
            intent,
            focus: focus.into(),
            max_tokens,
        }
    }
}

/// Compression level of a packed memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Summary line only.
    Summary,
    /// Summary plus a few type-specific details.
    Expanded,
    /// The complete serialized record.
    Full,
}

impl CompressionLevel {
    /// Returns the level as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Expanded => "expanded",
            Self::Full => "full",
        }
    }
}

/// A memory rendered at a compression level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedMemory {
    /// Source memory.
    pub memory_id: MemoryId,
    /// Memory type.
    pub memory_type: MemoryType,
    /// Compression level.
    pub level: CompressionLevel,
    /// Rendered text.
    pub content: String,
    /// Estimated tokens (`ceil(chars / 4)`).
    pub tokens: usize,
}

/// A candidate with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMemory {
    /// The memory.
    pub memory: super::Memory,
    /// Relevance in `[0, 1]` before intent weighting; adjusted in later stages.
    pub score: f64,
    /// Dominant scoring factor.
    pub reason: String,
}

/// One item of a retrieval response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedMemory {
    /// Memory id.
    pub memory_id: MemoryId,
    /// Memory type.
    pub memory_type: MemoryType,
    /// Final relevance after weighting and diversity correction.
    ///
    /// The base score in `[0, 1]` is multiplied by an intent weight in
    /// `[0.3, 2.0]` and a diversity factor in `(0, 1]`, so the value lies in
    /// `[0, 2.0]`. Compare relevances within one response, not against a
    /// fixed threshold.
    pub relevance: f64,
    /// Why this memory was selected.
    pub reason: String,
    /// The rendered memory.
    pub compressed: CompressedMemory,
}

/// Ranked, budget-packed retrieval response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Packed memories in rank order.
    pub memories: Vec<RetrievedMemory>,
    /// Tokens consumed by the packed memories.
    pub tokens_used: usize,
    /// Budget the caller supplied.
    pub token_budget: usize,
    /// Number of candidates scored.
    pub candidates_considered: usize,
    /// True if ranked candidates were left out because the budget ran out.
    pub truncated: bool,
}

impl RetrievalResult {
    /// Returns an empty result for the given budget.
    #[must_use]
    pub const fn empty(token_budget: usize) -> Self {
        Self {
            memories: Vec::new(),
            tokens_used: 0,
            token_budget,
            candidates_considered: 0,
            truncated: false,
        }
    }

    /// Returns true if nothing was packed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }
}
