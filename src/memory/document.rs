//! Document data types
//!
//! A document is one file of project knowledge inside a category. Its
//! format is a declared tag; the file extension is derived from it on
//! write and parsed back into it on read.

use crate::config::FreshnessConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

/// How many leading lines are searched for a `Last Updated` marker
const MARKER_SCAN_LINES: usize = 10;

/// Content format of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    /// Markdown prose, stored as `<name>.md`
    Markdown,
    /// Structured JSON, stored as `<name>.json`
    Structured,
}

impl DocumentFormat {
    /// All formats, in lookup order
    pub const ALL: [DocumentFormat; 2] = [DocumentFormat::Markdown, DocumentFormat::Structured];

    /// File extension for this format
    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Markdown => "md",
            DocumentFormat::Structured => "json",
        }
    }

    /// Parse a file extension back into a format
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "md" => Some(DocumentFormat::Markdown),
            "json" => Some(DocumentFormat::Structured),
            _ => None,
        }
    }

    /// Split an on-disk file name into `(name, format)`.
    ///
    /// Returns `None` for temp files and files of unknown formats.
    pub fn parse_file_name(file_name: &str) -> Option<(String, Self)> {
        if file_name.starts_with('.') {
            return None;
        }
        let path = Path::new(file_name);
        let format = Self::from_extension(path.extension()?.to_str()?)?;
        let stem = path.file_stem()?.to_str()?;
        if stem.is_empty() {
            return None;
        }
        Some((stem.to_string(), format))
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Markdown => write!(f, "markdown"),
            DocumentFormat::Structured => write!(f, "structured"),
        }
    }
}

/// A document loaded from a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Category the document belongs to
    pub category: String,
    /// Document name without extension
    pub name: String,
    /// Declared content format
    pub format: DocumentFormat,
    /// Full content
    pub content: String,
    /// Last-modified time of the stored file
    pub modified_at: DateTime<Utc>,
}

impl Document {
    /// On-disk file name (`<name>.<ext>`)
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.format.extension())
    }

    /// Hex SHA-256 of the content
    pub fn digest(&self) -> String {
        format!("{:x}", Sha256::digest(self.content.as_bytes()))
    }

    /// Number of content lines
    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }

    /// Date from a `Last Updated` marker near the top of the content
    pub fn marker_date(&self) -> Option<NaiveDate> {
        parse_last_updated(&self.content)
    }

    /// Marker date if present, otherwise the file's modification date
    pub fn last_updated(&self) -> NaiveDate {
        self.marker_date()
            .unwrap_or_else(|| self.modified_at.date_naive())
    }

    /// Classify the document's age relative to `now`
    pub fn freshness(&self, config: &FreshnessConfig, now: DateTime<Utc>) -> Freshness {
        let age_days = (now.date_naive() - self.last_updated()).num_days();
        Freshness::classify(age_days, config)
    }
}

/// Age class of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Recently updated; safe to rely on
    Fresh,
    /// Getting old; should be reviewed
    Aging,
    /// Too old to trust without review
    Stale,
}

impl Freshness {
    /// Classify an age in whole days
    pub fn classify(age_days: i64, config: &FreshnessConfig) -> Self {
        if age_days <= config.fresh_days {
            Freshness::Fresh
        } else if age_days >= config.stale_days {
            Freshness::Stale
        } else {
            Freshness::Aging
        }
    }
}

const MARKER_PATTERNS: [&str; 2] = [
    r"<!--\s*Last Updated:\s*(\d{4}-\d{2}-\d{2})\s*-->",
    r"\*\*Last Updated\*\*:\s*(\d{4}-\d{2}-\d{2})",
];

fn marker_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        MARKER_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

/// Find a `Last Updated` date in the first lines of `content`
pub fn parse_last_updated(content: &str) -> Option<NaiveDate> {
    content.lines().take(MARKER_SCAN_LINES).find_map(|line| {
        marker_patterns().iter().find_map(|re| {
            re.captures(line)
                .and_then(|caps| NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok())
        })
    })
}

/// Check that `name` is usable as a single path component.
///
/// `kind` names what is being validated ("skill", "category", ...) for the
/// error message.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name == "." || name == ".." {
        Some("must not be a relative path component")
    } else if name.starts_with('.') {
        Some("must not start with '.'")
    } else if name.contains(['/', '\\', '\0']) {
        Some("must not contain path separators")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidName(format!(
            "{} name '{}' {}",
            kind, name, reason
        ))),
        None => Ok(()),
    }
}

/// Normalize a caller-supplied document name for `format`.
///
/// `"v1.md"` and `"v1"` both denote the Markdown document `v1`. A name
/// still ending in a document extension once the declared one is
/// stripped (`"v1.md"` as Structured) is rejected, since `get` would
/// read that extension as the format.
pub fn normalize_document_name(name: &str, format: DocumentFormat) -> Result<String> {
    let suffix = format!(".{}", format.extension());
    let stem = name.strip_suffix(suffix.as_str()).unwrap_or(name);
    validate_name("document", stem)?;
    if let Some((_, other)) = DocumentFormat::parse_file_name(stem) {
        return Err(Error::InvalidName(format!(
            "document name '{}' ends in a {} extension but is declared {}",
            name, other, format
        )));
    }
    Ok(stem.to_string())
}

/// Split a lookup name into its stem and, if given, its format.
pub(crate) fn split_lookup_name(name: &str) -> Result<(String, Option<DocumentFormat>)> {
    if let Some((stem, format)) = DocumentFormat::parse_file_name(name) {
        validate_name("document", &stem)?;
        return Ok((stem, Some(format)));
    }
    validate_name("document", name)?;
    Ok((name.to_string(), None))
}
