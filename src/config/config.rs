use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};
use crate::reinforcement::reward::ScoringWeights;

/// Top-level configuration of the search engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rescan_policy: RescanPolicy,
    pub learning: LearningConfig,
    pub walk: WalkConfig,
    pub mcts: MctsConfig,
    pub scoring: ScoringWeights,
    pub storage: StorageConfig,
}

/// TD(λ) hyper-parameters; hot-reloadable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Trace decay λ
    pub lambda: f64,
    /// Step size α
    pub learning_rate: f64,
    /// Discount γ
    pub discount_factor: f64,
    /// Traces below this magnitude are dropped
    pub trace_threshold: f64,
    /// Upper bound on live traces per episode
    pub max_traces: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            lambda: 0.9,
            learning_rate: 0.1,
            discount_factor: 0.9,
            trace_threshold: 0.01,
            max_traces: 1000,
        }
    }
}

impl LearningConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if !(0.0..=1.0).contains(&self.lambda) {
            return Err(EngineError::invalid_argument(format!(
                "lambda must be within [0, 1], got {}",
                self.lambda
            )));
        }
        if !(0.0..=1.0).contains(&self.discount_factor) {
            return Err(EngineError::invalid_argument(format!(
                "discount_factor must be within [0, 1], got {}",
                self.discount_factor
            )));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(EngineError::invalid_argument(format!(
                "learning_rate must be within (0, 1], got {}",
                self.learning_rate
            )));
        }
        if !(self.trace_threshold >= 0.0) {
            return Err(EngineError::invalid_argument(format!(
                "trace_threshold must be non-negative, got {}",
                self.trace_threshold
            )));
        }
        if self.max_traces == 0 {
            return Err(EngineError::invalid_argument(
                "max_traces must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Limits of the TD(λ) walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    pub max_steps: usize,
    /// A step reward above this ends the walk early
    pub high_confidence: f64,
    /// The walk stops once the current node was entered more than this many times
    pub max_revisits: usize,
    /// Paths longer than this are penalised in the confidence
    pub long_path: usize,
    pub trend_bonus: f64,
    pub length_penalty: f64,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            high_confidence: 0.8,
            max_revisits: 2,
            long_path: 7,
            trend_bonus: 0.1,
            length_penalty: 0.1,
        }
    }
}

/// Budget and scoring of the tree search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MctsConfig {
    pub max_iterations: usize,
    pub time_budget_ms: u64,
    /// UCB1 exploration constant C
    pub exploration: f64,
    /// Nodes at this depth are terminal
    pub max_depth: usize,
    /// Share of the learned value in a leaf evaluation (rest is relevance)
    pub learned_value_weight: f64,
    /// Evaluation is multiplied by `depth_decay^depth`
    pub depth_decay: f64,
    /// Added per distinct node kind on the path from the root
    pub diversity_bonus: f64,
    pub max_result_hops: usize,
    /// Fixed seed for reproducible expansion order
    pub seed: Option<u64>,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            time_budget_ms: 5000,
            exploration: std::f64::consts::SQRT_2,
            max_depth: 10,
            learned_value_weight: 0.3,
            depth_decay: 0.95,
            diversity_bonus: 0.05,
            max_result_hops: 10,
            seed: None,
        }
    }
}

/// Which value store backs the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Values live only as long as the process
    Memory,
    /// Values persist in a SQLite file
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database file; defaults to `default_database_path()`
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(Self::default_database_path)
    }

    pub fn default_database_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("graph-rl-search")
            .join("q_values.db")
    }
}

/// What happens to learned values when the graph is rebuilt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RescanPolicy {
    /// Keep every value; keys of vanished nodes become unreachable
    #[default]
    Retain,
    /// Treat the rebuilt graph as a new world and forget all values
    Reset,
}

impl EngineConfig {
    pub fn load(path: &Path) -> EngineResult<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::io_error(e, Some(path)))?;

        let config: Self = match ext {
            "json" => serde_json::from_str(&content)?,
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "toml" => toml::from_str(&content)?,
            _ => {
                return Err(EngineError::invalid_argument(format!(
                    "Unsupported config format: {}",
                    ext
                )))
            }
        };
        config.learning.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let content = match ext {
            "json" => serde_json::to_string_pretty(self)?,
            "yaml" | "yml" => serde_yaml::to_string(self)?,
            "toml" => toml::to_string(self)?,
            _ => {
                return Err(EngineError::invalid_argument(format!(
                    "Unsupported config format: {}",
                    ext
                )))
            }
        };

        std::fs::write(path, content).map_err(|e| EngineError::io_error(e, Some(path)))?;
        Ok(())
    }

    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("graph-rl-search")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.learning.validate().unwrap();
        assert_eq!(config.walk.max_steps, 10);
        assert_eq!(config.mcts.max_iterations, 1000);
        assert_eq!(config.rescan_policy, RescanPolicy::Retain);
    }

    #[test]
    fn test_learning_config_validation() {
        let bad = [
            LearningConfig { lambda: 1.5, ..Default::default() },
            LearningConfig { discount_factor: -0.1, ..Default::default() },
            LearningConfig { learning_rate: 0.0, ..Default::default() },
            LearningConfig { trace_threshold: f64::NAN, ..Default::default() },
            LearningConfig { max_traces: 0, ..Default::default() },
        ];
        for config in bad {
            let err = config.validate().unwrap_err();
            assert_eq!(err.kind(), "invalid_argument");
        }
    }

    #[test]
    fn test_save_and_load_every_format() {
        let dir = tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.learning.lambda = 0.5;
        config.mcts.seed = Some(7);
        config.storage.backend = StorageBackend::Memory;
        config.rescan_policy = RescanPolicy::Reset;

        for name in ["config.json", "config.yaml", "config.toml"] {
            let path = dir.path().join(name);
            config.save(&path).unwrap();
            assert_eq!(EngineConfig::load(&path).unwrap(), config);
        }
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[learning]\nlambda = 0.3\n\n[storage]\nbackend = \"memory\"\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.learning.lambda, 0.3);
        assert_eq!(config.learning.learning_rate, 0.1);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.walk, WalkConfig::default());
    }

    #[test]
    fn test_invalid_values_and_formats_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"learning": {"lambda": 2.0}}"#).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap_err().kind(), "invalid_argument");

        let path = dir.path().join("config.ini");
        std::fs::write(&path, "").unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap_err().kind(), "invalid_argument");
    }
}
