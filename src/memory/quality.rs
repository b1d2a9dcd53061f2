//! Quality gate — advisory checks on stored documents
//!
//! The gate never blocks a write and never rewrites content. It reports
//! problems that make memory less useful to later sessions: oversized
//! documents, missing `Last Updated` markers, machine-specific absolute
//! paths and vague wording.

use crate::config::QualityConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::document::Document;

const ABSOLUTE_PATH_PATTERN: &str = r#"(/home/[^\s`'")]+|/Users/[^\s`'")]+|[A-Za-z]:\\[^\s`'")]+)"#;
const VAGUE_PATTERN: &str = r"(?i)\b(some|various|custom|things|stuff|etc)\b";

/// A single advisory finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum QualityWarning {
    /// Document is longer than its line limit
    LineLimitExceeded {
        /// Actual line count
        lines: usize,
        /// Limit for this document
        limit: usize,
    },
    /// Markdown document has no `Last Updated` marker in its first lines
    MissingTimestamp,
    /// Content references a machine-specific absolute path
    AbsolutePath {
        /// First offending path
        path: String,
    },
    /// Too many lines use non-specific wording
    VagueContent {
        /// Number of vague lines
        lines: usize,
    },
}

impl fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityWarning::LineLimitExceeded { lines, limit } => {
                write!(f, "{} lines exceeds limit of {}", lines, limit)
            }
            QualityWarning::MissingTimestamp => write!(f, "missing Last Updated marker"),
            QualityWarning::AbsolutePath { path } => {
                write!(f, "absolute path '{}' is not portable", path)
            }
            QualityWarning::VagueContent { lines } => {
                write!(f, "{} lines use vague wording; be specific", lines)
            }
        }
    }
}

/// Result of inspecting one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Findings, in check order
    pub warnings: Vec<QualityWarning>,
}

impl QualityReport {
    /// No findings
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Runs advisory checks configured by `QualityConfig`
pub struct QualityGate {
    config: QualityConfig,
    absolute_path: Option<Regex>,
    vague: Option<Regex>,
}

impl QualityGate {
    /// Create a gate from configuration
    pub fn new(config: QualityConfig) -> Self {
        Self {
            config,
            absolute_path: Regex::new(ABSOLUTE_PATH_PATTERN).ok(),
            vague: Regex::new(VAGUE_PATTERN).ok(),
        }
    }

    /// Whether a document is exempt from checks
    pub fn is_operational(&self, name: &str) -> bool {
        self.config.operational_documents.iter().any(|n| n == name)
    }

    /// Inspect a document
    pub fn inspect(&self, document: &Document) -> QualityReport {
        let mut report = QualityReport::default();
        if !self.config.enabled || self.is_operational(&document.name) {
            return report;
        }

        let lines = document.line_count();
        let limit = self.config.line_limit(&document.name);
        if lines > limit {
            report
                .warnings
                .push(QualityWarning::LineLimitExceeded { lines, limit });
        }

        if document.format == super::DocumentFormat::Markdown && document.marker_date().is_none()
        {
            report.warnings.push(QualityWarning::MissingTimestamp);
        }

        if let Some(m) = self
            .absolute_path
            .as_ref()
            .and_then(|re| re.find(&document.content))
        {
            report.warnings.push(QualityWarning::AbsolutePath {
                path: m.as_str().to_string(),
            });
        }

        if let Some(re) = &self.vague {
            let vague_lines = document.content.lines().filter(|l| re.is_match(l)).count();
            if vague_lines >= self.config.vague_line_threshold {
                report
                    .warnings
                    .push(QualityWarning::VagueContent { lines: vague_lines });
            }
        }

        report
    }
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(QualityConfig::default())
    }
}
