//! Configuration management.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `MNEMO_*` environment variables. Every file field is optional; a
//! missing field keeps the layer below it.

use crate::observability::{LogFormat, LoggingConfig};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Directory name under the platform config dir.
const CONFIG_DIR_NAME: &str = "mnemo";
/// Config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Main configuration for mnemo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MnemoConfig {
    /// L1 cache settings.
    pub cache: CacheConfig,
    /// Retrieval pipeline settings.
    pub retrieval: RetrievalConfig,
    /// Causal traversal bounds.
    pub traversal: TraversalConfig,
    /// Causal inference settings.
    pub inference: InferenceConfig,
    /// Consolidation settings.
    pub consolidation: ConsolidationConfig,
    /// Prediction settings.
    pub prediction: PredictionConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// L1 cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of cached records. Must be positive.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

/// Retrieval pipeline settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalConfig {
    /// Default token budget for callers that do not pick one.
    pub max_tokens: usize,
    /// Candidates loaded per store page; retrieval pages through every live record.
    pub candidate_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            candidate_limit: 500,
        }
    }
}

/// Causal traversal bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraversalConfig {
    /// Maximum hops from the root for origin/effect traces.
    pub max_depth: usize,
    /// Maximum nodes in any returned chain.
    pub max_nodes: usize,
    /// Edges weaker than this are not followed.
    pub min_strength: f64,
    /// Maximum completed paths returned by all-paths search.
    pub max_paths: usize,
    /// Maximum edges in a path.
    pub max_path_length: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_nodes: 50,
            min_strength: 0.0,
            max_paths: 5,
            max_path_length: 10,
        }
    }
}

/// Causal inference settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceConfig {
    /// Similarity floor for the semantic strategy.
    pub min_similarity: f64,
    /// Run the explicit-reference strategy.
    pub explicit: bool,
    /// Run the similarity strategy.
    pub semantic: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.3,
            explicit: true,
            semantic: true,
        }
    }
}

/// Consolidation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsolidationConfig {
    /// Episodes younger than this are not replayed.
    pub min_age_days: f64,
    /// Maximum episodes replayed per run.
    pub replay_limit: usize,
    /// Records read more often than this are strengthened.
    pub access_threshold: u64,
    /// Confidence added to each strengthened record.
    pub boost: f64,
    /// Smallest confidence drop the decay phase writes back.
    pub decay_min_delta: f64,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            min_age_days: 7.0,
            replay_limit: 100,
            access_threshold: 5,
            boost: 0.05,
            decay_min_delta: 0.01,
        }
    }
}

/// Prediction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionConfig {
    /// Maximum predictions returned.
    pub max_predictions: usize,
    /// Records loaded per store page when scanning for pattern, directory
    /// and behavioral matches.
    pub candidate_limit: usize,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            max_predictions: 10,
            candidate_limit: 500,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ConfigFile {
    /// Cache section.
    pub cache: Option<ConfigFileCache>,
    /// Retrieval section.
    pub retrieval: Option<ConfigFileRetrieval>,
    /// Traversal section.
    pub traversal: Option<ConfigFileTraversal>,
    /// Inference section.
    pub inference: Option<ConfigFileInference>,
    /// Consolidation section.
    pub consolidation: Option<ConfigFileConsolidation>,
    /// Prediction section.
    pub prediction: Option<ConfigFilePrediction>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Cache section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileCache {
    /// Capacity.
    pub capacity: Option<usize>,
}

/// Retrieval section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRetrieval {
    /// Default token budget.
    pub max_tokens: Option<usize>,
    /// Candidate limit.
    pub candidate_limit: Option<usize>,
}

/// Traversal section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileTraversal {
    /// Maximum depth.
    pub max_depth: Option<usize>,
    /// Maximum nodes.
    pub max_nodes: Option<usize>,
    /// Minimum edge strength.
    pub min_strength: Option<f64>,
    /// Maximum paths.
    pub max_paths: Option<usize>,
    /// Maximum path length.
    pub max_path_length: Option<usize>,
}

/// Inference section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileInference {
    /// Similarity floor.
    pub min_similarity: Option<f64>,
    /// Explicit strategy toggle.
    pub explicit: Option<bool>,
    /// Semantic strategy toggle.
    pub semantic: Option<bool>,
}

/// Consolidation section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileConsolidation {
    /// Minimum episode age.
    pub min_age_days: Option<f64>,
    /// Replay limit.
    pub replay_limit: Option<usize>,
    /// Access threshold.
    pub access_threshold: Option<u64>,
    /// Confidence boost.
    pub boost: Option<f64>,
    /// Minimum decay drop written back.
    pub decay_min_delta: Option<f64>,
}

/// Prediction section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFilePrediction {
    /// Maximum predictions.
    pub max_predictions: Option<usize>,
    /// Candidate limit.
    pub candidate_limit: Option<usize>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Fallback filter directive.
    pub level: Option<String>,
    /// ANSI colors.
    pub ansi: Option<bool>,
}

impl MnemoConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the default file, overlays the process environment and validates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the merged configuration is invalid.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_default();
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: e.to_string(),
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from `<config_dir>/mnemo/config.toml`.
    ///
    /// Returns defaults if there is no such file or it cannot be parsed.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let path = base_dirs
            .config_dir()
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
                Self::default()
            },
        }
    }

    /// Overlays `MNEMO_*` variables read through `lookup`.
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| lookup(key).map(|v| v.trim().to_string());

        if let Some(v) = parsed("MNEMO_CACHE_CAPACITY")
            && let Ok(n) = v.parse()
        {
            self.cache.capacity = n;
        }
        if let Some(v) = parsed("MNEMO_RETRIEVAL_MAX_TOKENS")
            && let Ok(n) = v.parse()
        {
            self.retrieval.max_tokens = n;
        }
        if let Some(v) = parsed("MNEMO_TRAVERSAL_MAX_DEPTH")
            && let Ok(n) = v.parse()
        {
            self.traversal.max_depth = n;
        }
        if let Some(v) = parsed("MNEMO_TRAVERSAL_MAX_NODES")
            && let Ok(n) = v.parse()
        {
            self.traversal.max_nodes = n;
        }
        if let Some(v) = parsed("MNEMO_INFERENCE_MIN_SIMILARITY")
            && let Ok(n) = v.parse()
        {
            self.inference.min_similarity = n;
        }
        if let Some(v) = parsed("MNEMO_CONSOLIDATION_MIN_AGE_DAYS")
            && let Ok(n) = v.parse()
        {
            self.consolidation.min_age_days = n;
        }
        if let Some(v) = parsed("MNEMO_CONSOLIDATION_ACCESS_THRESHOLD")
            && let Ok(n) = v.parse()
        {
            self.consolidation.access_threshold = n;
        }
        if let Some(v) = parsed("MNEMO_CONSOLIDATION_BOOST")
            && let Ok(n) = v.parse()
        {
            self.consolidation.boost = n;
        }
        if let Some(v) = parsed("MNEMO_CONSOLIDATION_DECAY_MIN_DELTA")
            && let Ok(n) = v.parse()
        {
            self.consolidation.decay_min_delta = n;
        }
        if let Some(v) = parsed("MNEMO_PREDICTION_MAX_PREDICTIONS")
            && let Ok(n) = v.parse()
        {
            self.prediction.max_predictions = n;
        }
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a zero cache capacity or candidate
    /// page size, a similarity floor, minimum strength or decay delta outside
    /// `[0, 1]`, a negative or non-finite boost or minimum age, or zero
    /// traversal node/path limits.
    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(Error::InvalidInput("cache capacity must be > 0".to_string()));
        }
        if self.retrieval.candidate_limit == 0 || self.prediction.candidate_limit == 0 {
            return Err(Error::InvalidInput("candidate_limit must be > 0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.inference.min_similarity) {
            return Err(Error::InvalidInput(format!(
                "inference min_similarity must be within [0, 1], got {}",
                self.inference.min_similarity
            )));
        }
        if !(0.0..=1.0).contains(&self.traversal.min_strength) {
            return Err(Error::InvalidInput(format!(
                "traversal min_strength must be within [0, 1], got {}",
                self.traversal.min_strength
            )));
        }
        if self.traversal.max_nodes == 0 || self.traversal.max_paths == 0 {
            return Err(Error::InvalidInput(
                "traversal max_nodes and max_paths must be > 0".to_string(),
            ));
        }
        if !self.consolidation.boost.is_finite() || self.consolidation.boost < 0.0 {
            return Err(Error::InvalidInput(format!(
                "consolidation boost must be >= 0, got {}",
                self.consolidation.boost
            )));
        }
        if !(0.0..=1.0).contains(&self.consolidation.decay_min_delta) {
            return Err(Error::InvalidInput(format!(
                "consolidation decay_min_delta must be within [0, 1], got {}",
                self.consolidation.decay_min_delta
            )));
        }
        if !self.consolidation.min_age_days.is_finite() || self.consolidation.min_age_days < 0.0 {
            return Err(Error::InvalidInput(format!(
                "consolidation min_age_days must be >= 0, got {}",
                self.consolidation.min_age_days
            )));
        }
        Ok(())
    }

    /// Sets the cache capacity.
    #[must_use]
    pub const fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache.capacity = capacity;
        self
    }

    /// Sets the default retrieval token budget.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.retrieval.max_tokens = max_tokens;
        self
    }

    /// Converts a `ConfigFile` to `MnemoConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(cache) = file.cache
            && let Some(v) = cache.capacity
        {
            config.cache.capacity = v;
        }
        if let Some(retrieval) = file.retrieval {
            if let Some(v) = retrieval.max_tokens {
                config.retrieval.max_tokens = v;
            }
            if let Some(v) = retrieval.candidate_limit {
                config.retrieval.candidate_limit = v;
            }
        }
        if let Some(traversal) = file.traversal {
            let t = &mut config.traversal;
            t.max_depth = traversal.max_depth.unwrap_or(t.max_depth);
            t.max_nodes = traversal.max_nodes.unwrap_or(t.max_nodes);
            t.min_strength = traversal.min_strength.unwrap_or(t.min_strength);
            t.max_paths = traversal.max_paths.unwrap_or(t.max_paths);
            t.max_path_length = traversal.max_path_length.unwrap_or(t.max_path_length);
        }
        if let Some(inference) = file.inference {
            let i = &mut config.inference;
            i.min_similarity = inference.min_similarity.unwrap_or(i.min_similarity);
            i.explicit = inference.explicit.unwrap_or(i.explicit);
            i.semantic = inference.semantic.unwrap_or(i.semantic);
        }
        if let Some(consolidation) = file.consolidation {
            let c = &mut config.consolidation;
            c.min_age_days = consolidation.min_age_days.unwrap_or(c.min_age_days);
            c.replay_limit = consolidation.replay_limit.unwrap_or(c.replay_limit);
            c.access_threshold = consolidation.access_threshold.unwrap_or(c.access_threshold);
            c.boost = consolidation.boost.unwrap_or(c.boost);
            c.decay_min_delta = consolidation.decay_min_delta.unwrap_or(c.decay_min_delta);
        }
        if let Some(prediction) = file.prediction {
            let p = &mut config.prediction;
            p.max_predictions = prediction.max_predictions.unwrap_or(p.max_predictions);
            p.candidate_limit = prediction.candidate_limit.unwrap_or(p.candidate_limit);
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format.as_deref().and_then(LogFormat::parse) {
                config.logging.format = format;
            }
            if let Some(level) = logging.level {
                config.logging.level = level;
            }
            if let Some(ansi) = logging.ansi {
                config.logging.ansi = ansi;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let config = MnemoConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.capacity, 1000);
        assert_eq!(config.retrieval.max_tokens, 2000);
        assert_eq!(config.traversal.max_paths, 5);
        assert_eq!(config.traversal.max_path_length, 10);
        assert!((config.inference.min_similarity - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.consolidation.access_threshold, 5);
        assert_eq!(config.prediction.max_predictions, 10);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = MnemoConfig::default().with_cache_capacity(0);
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_bad_page_size_and_decay_delta_rejected() {
        let mut config = MnemoConfig::default();
        config.retrieval.candidate_limit = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));

        let mut config = MnemoConfig::default();
        config.consolidation.decay_min_delta = 1.5;
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_load_from_file_overlays_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[cache]
capacity = 64

[traversal]
max_depth = 3

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = MnemoConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.cache.capacity, 64);
        assert_eq!(config.traversal.max_depth, 3);
        assert_eq!(config.traversal.max_nodes, 50);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.retrieval.max_tokens, 2000);
    }

    #[test]
    fn test_unparseable_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cache = [[[").unwrap();
        let err = MnemoConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::OperationFailed { ref operation, .. } if operation == "parse_config_file"));
    }

    #[test]
    fn test_env_overlay_ignores_garbage() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("MNEMO_CACHE_CAPACITY", "42"),
            ("MNEMO_CONSOLIDATION_BOOST", "0.1"),
            ("MNEMO_TRAVERSAL_MAX_DEPTH", "deep"),
        ]);
        let mut config = MnemoConfig::default();
        config.apply_env(|key| env.get(key).map(ToString::to_string));

        assert_eq!(config.cache.capacity, 42);
        assert!((config.consolidation.boost - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.traversal.max_depth, 5);
    }
}
