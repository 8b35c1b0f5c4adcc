//! Memory records: identifiers, the shared envelope and the typed payload.
//!
//! A [`Memory`] is a closed sum type. Every record carries the same envelope
//! fields (confidence, importance, tags, bitemporal bookkeeping, links) and
//! exactly one [`MemoryContent`] payload whose variant is the record's
//! [`MemoryType`] discriminant.

use super::payload::{
    CodeSmellPayload, ConsolidationStatus, ConstraintOverridePayload, CorePayload,
    DecisionContextPayload, DecisionPayload, EpisodicPayload, PatternRationalePayload,
    ProceduralPayload, SemanticPayload, TribalPayload,
};
use super::temporal::{TransactionTime, ValidTime};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Seconds per day for age calculation.
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Shortest topic or tag considered a referenceable term.
const MIN_TERM_LEN: usize = 4;

/// Unique identifier for a memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(String);

impl MemoryId {
    /// Creates a new memory ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh `mem-<uuid>` identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("mem-{}", uuid::Uuid::now_v7()))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MemoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MemoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for MemoryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Discriminant of the memory sum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Project identity and top-level facts.
    Core,
    /// Team knowledge, gotchas and warnings.
    Tribal,
    /// How-to procedures.
    Procedural,
    /// Consolidated abstractions distilled from episodes.
    Semantic,
    /// Raw interactions awaiting consolidation.
    Episodic,
    /// Recorded decisions.
    Decision,
    /// Why a code pattern exists.
    PatternRationale,
    /// Approved exceptions to a constraint.
    ConstraintOverride,
    /// Anti-patterns to avoid.
    CodeSmell,
    /// Context surrounding an earlier decision.
    DecisionContext,
}

impl MemoryType {
    /// Returns all memory type variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Core,
            Self::Tribal,
            Self::Procedural,
            Self::Semantic,
            Self::Episodic,
            Self::Decision,
            Self::PatternRationale,
            Self::ConstraintOverride,
            Self::CodeSmell,
            Self::DecisionContext,
        ]
    }

    /// Returns the memory type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Tribal => "tribal",
            Self::Procedural => "procedural",
            Self::Semantic => "semantic",
            Self::Episodic => "episodic",
            Self::Decision => "decision",
            Self::PatternRationale => "pattern_rationale",
            Self::ConstraintOverride => "constraint_override",
            Self::CodeSmell => "code_smell",
            Self::DecisionContext => "decision_context",
        }
    }

    /// Parses a memory type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "core" => Some(Self::Core),
            "tribal" => Some(Self::Tribal),
            "procedural" => Some(Self::Procedural),
            "semantic" => Some(Self::Semantic),
            "episodic" => Some(Self::Episodic),
            "decision" => Some(Self::Decision),
            "pattern_rationale" => Some(Self::PatternRationale),
            "constraint_override" => Some(Self::ConstraintOverride),
            "code_smell" => Some(Self::CodeSmell),
            "decision_context" => Some(Self::DecisionContext),
            _ => None,
        }
    }

    /// Days for an idle record of this type to lose half its confidence.
    ///
    /// `None` means the type never decays.
    #[must_use]
    pub const fn half_life_days(&self) -> Option<f64> {
        match self {
            Self::Core => None,
            Self::Tribal => Some(365.0),
            Self::Procedural | Self::Decision | Self::PatternRationale | Self::DecisionContext => {
                Some(180.0)
            },
            Self::Semantic | Self::ConstraintOverride | Self::CodeSmell => Some(90.0),
            Self::Episodic => Some(7.0),
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown memory type: {s}"))
    }
}

/// Importance of a memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    /// Rarely relevant.
    Low,
    /// Default importance.
    #[default]
    Normal,
    /// Frequently relevant.
    High,
    /// Must not be missed.
    Critical,
}

impl Importance {
    /// Returns the scoring weight for this importance level.
    #[must_use]
    pub const fn weight(&self) -> f64 {
        match self {
            Self::Critical => 1.0,
            Self::High => 0.8,
            Self::Normal => 0.5,
            Self::Low => 0.2,
        }
    }

    /// Returns the importance as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Confidence in `[0, 1]`.
///
/// Out-of-range and non-finite inputs are clamped on construction, so the
/// invariant holds for every value that exists.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    /// Creates a clamped confidence value.
    #[must_use]
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Returns this confidence raised by `boost`, capped at `max`.
    #[must_use]
    pub fn boosted(self, boost: f64, max: f64) -> Self {
        Self::new((self.0 + boost).min(max))
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self(1.0)
    }
}

impl From<f64> for Confidence {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(c: Confidence) -> Self {
        c.0
    }
}

/// Cross-references from a memory into the codebase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryLinks {
    /// Linked pattern ids.
    pub patterns: BTreeSet<String>,
    /// Linked constraint ids.
    pub constraints: BTreeSet<String>,
    /// Linked file paths.
    pub files: BTreeSet<String>,
    /// Linked function names.
    pub functions: BTreeSet<String>,
}

impl MemoryLinks {
    /// Returns true if nothing is linked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
            && self.constraints.is_empty()
            && self.files.is_empty()
            && self.functions.is_empty()
    }

    /// Returns every link namespaced by kind (`pattern:`, `constraint:`, `file:`, `function:`).
    #[must_use]
    pub fn namespaced(&self) -> BTreeSet<String> {
        let kinds = [
            ("pattern", &self.patterns),
            ("constraint", &self.constraints),
            ("file", &self.files),
            ("function", &self.functions),
        ];
        kinds
            .into_iter()
            .flat_map(|(kind, set)| set.iter().map(move |v| format!("{kind}:{v}")))
            .collect()
    }
}

/// Variant-specific payload of a memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryContent {
    /// Core project memory.
    Core(CorePayload),
    /// Tribal knowledge.
    Tribal(TribalPayload),
    /// Procedure.
    Procedural(ProceduralPayload),
    /// Consolidated abstraction.
    Semantic(SemanticPayload),
    /// Raw interaction.
    Episodic(EpisodicPayload),
    /// Decision.
    Decision(DecisionPayload),
    /// Pattern rationale.
    PatternRationale(PatternRationalePayload),
    /// Constraint override.
    ConstraintOverride(ConstraintOverridePayload),
    /// Code smell.
    CodeSmell(CodeSmellPayload),
    /// Decision context.
    DecisionContext(DecisionContextPayload),
}

impl MemoryContent {
    /// Returns the discriminant of this payload.
    #[must_use]
    pub const fn memory_type(&self) -> MemoryType {
        match self {
            Self::Core(_) => MemoryType::Core,
            Self::Tribal(_) => MemoryType::Tribal,
            Self::Procedural(_) => MemoryType::Procedural,
            Self::Semantic(_) => MemoryType::Semantic,
            Self::Episodic(_) => MemoryType::Episodic,
            Self::Decision(_) => MemoryType::Decision,
            Self::PatternRationale(_) => MemoryType::PatternRationale,
            Self::ConstraintOverride(_) => MemoryType::ConstraintOverride,
            Self::CodeSmell(_) => MemoryType::CodeSmell,
            Self::DecisionContext(_) => MemoryType::DecisionContext,
        }
    }
}

/// A stored memory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Stable unique identifier.
    pub id: MemoryId,
    /// Short human-readable summary.
    pub summary: String,
    /// Confidence in `[0, 1]`.
    pub confidence: Confidence,
    /// Importance level.
    #[serde(default)]
    pub importance: Importance,
    /// Number of reads. Never decreases.
    #[serde(default)]
    pub access_count: u64,
    /// Time of the last read, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
    /// Unordered tag set.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// When the system learned about this record.
    pub transaction_time: TransactionTime,
    /// When the record became true in the world.
    pub valid_time: ValidTime,
    /// Record this one replaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<MemoryId>,
    /// Record that replaced this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<MemoryId>,
    /// Links into the codebase.
    #[serde(default)]
    pub links: MemoryLinks,
    /// Variant payload, tagged by `type`.
    #[serde(flatten)]
    pub content: MemoryContent,
}

impl Memory {
    /// Creates a memory with default envelope values, timestamped now.
    #[must_use]
    pub fn new(id: impl Into<MemoryId>, summary: impl Into<String>, content: MemoryContent) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            summary: summary.into(),
            confidence: Confidence::default(),
            importance: Importance::Normal,
            access_count: 0,
            last_accessed: None,
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            transaction_time: TransactionTime::at(now),
            valid_time: ValidTime::from(now),
            supersedes: None,
            superseded_by: None,
            links: MemoryLinks::default(),
            content,
        }
    }

    /// Sets the confidence (clamped).
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Confidence::new(confidence);
        self
    }

    /// Sets the importance.
    #[must_use]
    pub const fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    /// Sets the access count.
    #[must_use]
    pub const fn with_access_count(mut self, count: u64) -> Self {
        self.access_count = count;
        self
    }

    /// Adds tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Backdates creation, modification and bitemporal timestamps.
    #[must_use]
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.updated_at = at;
        self.transaction_time = TransactionTime::at(at);
        self.valid_time = ValidTime::from(at);
        self
    }

    /// Sets the record this one supersedes.
    #[must_use]
    pub fn with_supersedes(mut self, id: impl Into<MemoryId>) -> Self {
        self.supersedes = Some(id.into());
        self
    }

    /// Sets the record superseding this one.
    #[must_use]
    pub fn with_superseded_by(mut self, id: impl Into<MemoryId>) -> Self {
        self.superseded_by = Some(id.into());
        self
    }

    /// Sets the codebase links.
    #[must_use]
    pub fn with_links(mut self, links: MemoryLinks) -> Self {
        self.links = links;
        self
    }

    /// Links a file path.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.links.files.insert(path.into());
        self
    }

    /// Links a pattern id.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.links.patterns.insert(pattern.into());
        self
    }

    /// Returns the type discriminant.
    #[must_use]
    pub const fn memory_type(&self) -> MemoryType {
        self.content.memory_type()
    }

    /// Returns the record's subject: topic, name or title depending on variant.
    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        let topic = match &self.content {
            MemoryContent::Core(p) => &p.project_name,
            MemoryContent::Tribal(p) => &p.topic,
            MemoryContent::Procedural(p) => &p.name,
            MemoryContent::Semantic(p) => &p.topic,
            MemoryContent::Episodic(p) => return p.context.focus.as_deref(),
            MemoryContent::Decision(p) => &p.title,
            MemoryContent::PatternRationale(p) => &p.pattern_name,
            MemoryContent::ConstraintOverride(p) => &p.constraint_name,
            MemoryContent::CodeSmell(p) => &p.name,
            MemoryContent::DecisionContext(p) => &p.decision_summary,
        };
        (!topic.is_empty()).then_some(topic.as_str())
    }

    /// Returns the record's main body of knowledge, if the variant has one.
    #[must_use]
    pub fn knowledge(&self) -> Option<&str> {
        let body = match &self.content {
            MemoryContent::Core(p) => &p.description,
            MemoryContent::Tribal(p) => &p.knowledge,
            MemoryContent::Semantic(p) => &p.knowledge,
            MemoryContent::Decision(p) => &p.decision,
            MemoryContent::PatternRationale(p) => &p.rationale,
            MemoryContent::ConstraintOverride(p) => &p.reason,
            MemoryContent::CodeSmell(p) => &p.reason,
            MemoryContent::DecisionContext(p) => &p.context,
            MemoryContent::Episodic(p) => &p.interaction.user_query,
            MemoryContent::Procedural(_) => return None,
        };
        (!body.is_empty()).then_some(body.as_str())
    }

    /// Returns every free-text field of the record, summary first.
    #[must_use]
    pub fn text_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.summary.as_str()];
        match &self.content {
            MemoryContent::Core(p) => fields.extend([p.project_name.as_str(), p.description.as_str()]),
            MemoryContent::Tribal(p) => {
                fields.extend([p.topic.as_str(), p.knowledge.as_str()]);
                fields.extend(p.warnings.iter().map(String::as_str));
            },
            MemoryContent::Procedural(p) => {
                fields.push(&p.name);
                fields.extend(p.steps.iter().map(String::as_str));
                fields.extend(p.checklist.iter().map(String::as_str));
            },
            MemoryContent::Semantic(p) => fields.extend([p.topic.as_str(), p.knowledge.as_str()]),
            MemoryContent::Episodic(p) => {
                fields.extend([p.interaction.user_query.as_str(), p.interaction.agent_response.as_str()]);
                fields.extend(p.interaction.outcome.as_deref());
                fields.extend(p.context.focus.as_deref());
            },
            MemoryContent::Decision(p) => {
                fields.extend([p.title.as_str(), p.decision.as_str(), p.rationale.as_str()]);
                fields.extend(p.alternatives.iter().map(String::as_str));
            },
            MemoryContent::PatternRationale(p) => {
                fields.extend([p.pattern_name.as_str(), p.rationale.as_str()]);
                fields.extend(p.business_context.as_deref());
            },
            MemoryContent::ConstraintOverride(p) => {
                fields.extend([p.constraint_name.as_str(), p.reason.as_str()]);
                fields.extend(p.scope.as_deref());
            },
            MemoryContent::CodeSmell(p) => {
                fields.extend([p.name.as_str(), p.reason.as_str(), p.suggestion.as_str()]);
                fields.extend(p.pattern.as_deref());
                fields.extend(p.consequences.iter().map(String::as_str));
                fields.extend(p.example_bad.as_deref());
                fields.extend(p.example_good.as_deref());
            },
            MemoryContent::DecisionContext(p) => {
                fields.extend([p.decision_summary.as_str(), p.context.as_str()]);
            },
        }
        fields.retain(|f| !f.is_empty());
        fields
    }

    /// Returns all text fields joined by newlines.
    #[must_use]
    pub fn full_text(&self) -> String {
        self.text_fields().join("\n")
    }

    /// Returns the namespaced union of linked patterns, constraints, files and functions.
    #[must_use]
    pub fn linked_entities(&self) -> BTreeSet<String> {
        self.links.namespaced()
    }

    /// Returns the lower-cased terms other records may mention this one by:
    /// its topic and tags, at least four characters long.
    #[must_use]
    pub fn terms(&self) -> BTreeSet<String> {
        self.topic()
            .into_iter()
            .chain(self.tags.iter().map(String::as_str))
            .map(|t| t.trim().to_lowercase())
            .filter(|t| t.chars().count() >= MIN_TERM_LEN)
            .collect()
    }

    /// Returns the consolidation status for episodic records.
    #[must_use]
    pub const fn consolidation_status(&self) -> Option<ConsolidationStatus> {
        match &self.content {
            MemoryContent::Episodic(p) => Some(p.consolidation_status),
            _ => None,
        }
    }

    /// Returns the age in fractional days relative to `now`, never negative.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        let secs = (now - self.created_at).num_seconds().max(0);
        secs as f64 / SECONDS_PER_DAY
    }

    /// Returns days since the last update, never negative.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn days_since_update(&self, now: DateTime<Utc>) -> f64 {
        let secs = (now - self.updated_at).num_seconds().max(0);
        secs as f64 / SECONDS_PER_DAY
    }

    /// Returns days since the record was last read or written, never negative.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn days_since_last_use(&self, now: DateTime<Utc>) -> f64 {
        let last = self
            .last_accessed
            .map_or(self.updated_at, |at| at.max(self.updated_at));
        let secs = (now - last).num_seconds().max(0);
        secs as f64 / SECONDS_PER_DAY
    }

    /// Records a read: bumps the access count and stamps `last_accessed`.
    pub fn touch(&mut self) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed = Some(Utc::now());
    }

    /// Returns true if another record has replaced this one.
    #[must_use]
    pub const fn is_superseded(&self) -> bool {
        self.superseded_by.is_some()
    }

    /// Returns true unless the record is superseded or a pruned episode.
    ///
    /// Only live records are retrieved, predicted or decayed.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.is_superseded() && self.consolidation_status() != Some(ConsolidationStatus::Pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payload::{CodeSmellSeverity, TribalSeverity};
    use test_case::test_case;

    fn tribal(id: &str) -> Memory {
        Memory::new(
            id,
            "Never cache auth tokens",
            MemoryContent::Tribal(TribalPayload {
                topic: "authentication".to_string(),
                knowledge: "Tokens rotate hourly".to_string(),
                severity: TribalSeverity::Critical,
                warnings: vec!["stale tokens cause 401s".to_string()],
            }),
        )
    }

    #[test_case(1.7, 1.0; "above range")]
    #[test_case(-0.2, 0.0; "below range")]
    #[test_case(0.42, 0.42; "in range")]
    #[test_case(f64::NAN, 0.0; "nan")]
    fn test_confidence_clamped(input: f64, expected: f64) {
        let m = tribal("mem-1").with_confidence(input);
        assert!((m.confidence.value() - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn test_boost_caps_at_max() {
        let c = Confidence::new(0.98).boosted(0.5, 1.0);
        assert!((c.value() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_memory_type_roundtrip() {
        for t in MemoryType::all() {
            assert_eq!(MemoryType::parse(t.as_str()), Some(*t));
        }
        assert_eq!(MemoryType::parse("code-smell"), Some(MemoryType::CodeSmell));
        assert_eq!(MemoryType::parse("nope"), None);
    }

    #[test]
    fn test_text_fields_include_payload() {
        let m = tribal("mem-1");
        let fields = m.text_fields();
        assert_eq!(fields[0], "Never cache auth tokens");
        assert!(fields.contains(&"Tokens rotate hourly"));
        assert!(fields.contains(&"stale tokens cause 401s"));
        assert_eq!(m.topic(), Some("authentication"));
    }

    #[test]
    fn test_linked_entities_are_namespaced() {
        let m = tribal("mem-1")
            .with_file("src/auth.rs")
            .with_pattern("retry");
        let linked = m.linked_entities();
        assert!(linked.contains("file:src/auth.rs"));
        assert!(linked.contains("pattern:retry"));
        assert_eq!(linked.len(), 2);
    }

    #[test]
    fn test_json_roundtrip_preserves_fields() {
        let m = Memory::new(
            "mem-smell",
            "Avoid unwrap in handlers",
            MemoryContent::CodeSmell(CodeSmellPayload {
                name: "unwrap in handler".to_string(),
                severity: CodeSmellSeverity::Error,
                reason: "panics take down the worker".to_string(),
                suggestion: "propagate with ?".to_string(),
                pattern: None,
                consequences: vec!["crash".to_string()],
                example_bad: Some("x.unwrap()".to_string()),
                example_good: None,
                detection_rule: None,
            }),
        )
        .with_tags(["rust", "errors"])
        .with_supersedes("mem-old");

        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"type\":\"code_smell\""));
        let back: Memory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_terms_skip_short_tags() {
        let m = tribal("mem-1").with_tags(["JWT", "Session"]);
        let terms = m.terms();
        assert!(terms.contains("authentication"));
        assert!(terms.contains("session"));
        assert!(!terms.contains("jwt"));
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut m = tribal("mem-1").with_access_count(u64::MAX);
        m.touch();
        assert_eq!(m.access_count, u64::MAX);
        assert!(m.last_accessed.is_some());
    }

    #[test]
    fn test_last_use_prefers_latest_read() {
        let now = Utc::now();
        let mut m = tribal("mem-1").with_created_at(now - chrono::Duration::days(30));
        assert!((m.days_since_last_use(now) - 30.0).abs() < 0.01);
        m.last_accessed = Some(now - chrono::Duration::days(2));
        assert!((m.days_since_last_use(now) - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_pruned_and_superseded_are_not_live() {
        let episode = |status| {
            Memory::new(
                "mem-ep",
                "asked about retries",
                MemoryContent::Episodic(EpisodicPayload {
                    consolidation_status: status,
                    ..EpisodicPayload::default()
                }),
            )
        };
        assert!(tribal("mem-1").is_live());
        assert!(!tribal("mem-1").with_superseded_by("mem-2").is_live());
        assert!(episode(ConsolidationStatus::Consolidated).is_live());
        assert!(!episode(ConsolidationStatus::Pruned).is_live());
        assert_eq!(MemoryType::Core.half_life_days(), None);
        assert_eq!(MemoryType::Episodic.half_life_days(), Some(7.0));
    }
}
