//! Forge Memory configuration management
//!
//! Configuration is plain TOML:
//!
//! ```toml
//! root = "/home/dev/.forge/memory"
//! lock_timeout_ms = 5000
//! default_max_documents = 20
//!
//! [skills.hermes]
//! canonical_categories = ["api_designs", "deployments", "incidents"]
//!
//! [quality.line_limits]
//! project_overview = 200
//! review_history = 300
//! ```

use crate::error::{Error, Result};
use crate::memory::document::validate_name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main Forge Memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Memory root; every skill gets a subdirectory below it
    pub root: PathBuf,

    /// Default per-document lock timeout in milliseconds (None = wait forever)
    pub lock_timeout_ms: Option<u64>,

    /// Document cap used when the caller does not pass one
    pub default_max_documents: usize,

    /// Canonical category sets by skill id
    pub skills: BTreeMap<String, SkillConfig>,

    /// Advisory quality checks applied on write
    pub quality: QualityConfig,

    /// Freshness classification thresholds
    pub freshness: FreshnessConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            lock_timeout_ms: Some(5000),
            default_max_documents: 20,
            skills: BTreeMap::new(),
            quality: QualityConfig::default(),
            freshness: FreshnessConfig::default(),
        }
    }
}

impl MemoryConfig {
    /// Default configuration rooted at `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Add (or replace) a skill and its canonical categories
    pub fn with_skill<I, S>(mut self, skill_id: impl Into<String>, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skills.insert(
            skill_id.into(),
            SkillConfig {
                canonical_categories: categories.into_iter().map(Into::into).collect(),
            },
        );
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Check skill ids and category names are usable as path components
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::Config("root must not be empty".to_string()));
        }
        for (skill_id, skill) in &self.skills {
            validate_name("skill", skill_id)
                .map_err(|e| Error::Config(format!("skill '{}': {}", skill_id, e)))?;
            for category in &skill.canonical_categories {
                validate_name("category", category).map_err(|e| {
                    Error::Config(format!("skill '{}' category '{}': {}", skill_id, category, e))
                })?;
            }
        }
        if self.freshness.fresh_days >= self.freshness.stale_days {
            return Err(Error::Config(format!(
                "freshness.fresh_days ({}) must be below freshness.stale_days ({})",
                self.freshness.fresh_days, self.freshness.stale_days
            )));
        }
        Ok(())
    }

    /// Default lock timeout as a `Duration`
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    /// Canonical categories for a skill (empty for unknown skills)
    pub fn canonical_categories(&self, skill_id: &str) -> Vec<String> {
        self.skills
            .get(skill_id)
            .map(|s| s.canonical_categories.clone())
            .unwrap_or_default()
    }
}

/// Per-skill definition supplied by the skill runtime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillConfig {
    /// Categories that must exist in every namespace of this skill
    #[serde(default)]
    pub canonical_categories: Vec<String>,
}

/// Quality gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Enable advisory checks on write
    pub enabled: bool,

    /// Line limit for documents without a specific limit
    pub default_line_limit: usize,

    /// Number of vague lines that triggers a warning
    pub vague_line_threshold: usize,

    /// Document names exempt from checks
    pub operational_documents: Vec<String>,

    /// Line limits keyed by document name
    pub line_limits: BTreeMap<String, usize>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        let mut line_limits = BTreeMap::new();
        line_limits.insert("project_overview".to_string(), 200);
        line_limits.insert("review_history".to_string(), 300);

        Self {
            enabled: true,
            default_line_limit: 500,
            vague_line_threshold: 3,
            operational_documents: vec![
                "index".to_string(),
                "lifecycle".to_string(),
                "quality_guidance".to_string(),
                "README".to_string(),
            ],
            line_limits,
        }
    }
}

impl QualityConfig {
    /// Line limit for a document name
    pub fn line_limit(&self, document: &str) -> usize {
        self.line_limits
            .get(document)
            .copied()
            .unwrap_or(self.default_line_limit)
    }
}

/// Freshness thresholds, in whole days since last update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessConfig {
    /// Documents at most this old are fresh
    pub fresh_days: i64,

    /// Documents at least this old are stale
    pub stale_days: i64,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            fresh_days: 30,
            stale_days: 90,
        }
    }
}

/// Default memory root (~/.forge/memory)
pub fn default_root() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".forge")
        .join("memory")
}
