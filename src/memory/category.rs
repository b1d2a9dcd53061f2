//! Category — a named directory of documents inside a project namespace

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;

use super::document::{normalize_document_name, split_lookup_name, Document, DocumentFormat};
use super::quality::QualityReport;
use super::StoreShared;

/// Handle to one category directory.
///
/// Handles are cheap to clone; the documents themselves live on disk.
#[derive(Clone)]
pub struct Category {
    project: String,
    name: String,
    dir: PathBuf,
    shared: Arc<StoreShared>,
}

impl std::fmt::Debug for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Category")
            .field("project", &self.project)
            .field("name", &self.name)
            .field("dir", &self.dir)
            .finish()
    }
}

impl Category {
    pub(crate) fn new(
        project: impl Into<String>,
        name: impl Into<String>,
        dir: PathBuf,
        shared: Arc<StoreShared>,
    ) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            dir,
            shared,
        }
    }

    /// Category name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Category directory
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Store a document, replacing any prior content under the same name.
    ///
    /// Uses the store's default lock timeout.
    pub async fn put(&self, name: &str, content: &str, format: DocumentFormat) -> Result<()> {
        self.put_with_timeout(name, content, format, self.shared.lock_timeout)
            .await
    }

    /// Store a document, waiting at most `timeout` for the document lock
    /// (forever when `None`).
    pub async fn put_with_timeout(
        &self,
        name: &str,
        content: &str,
        format: DocumentFormat,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let stem = normalize_document_name(name, format)?;
        if format == DocumentFormat::Structured {
            serde_json::from_str::<serde_json::Value>(content)?;
        }

        let path = self.file_path(&stem, format);
        let superseded: Vec<PathBuf> = DocumentFormat::ALL
            .iter()
            .filter(|f| **f != format)
            .map(|f| self.file_path(&stem, *f))
            .collect();

        self.shared
            .coordinator
            .write(
                &self.dir.join(&stem),
                &path,
                content.as_bytes(),
                &superseded,
                timeout,
            )
            .await?;

        let report = self.shared.quality.inspect(&Document {
            category: self.name.clone(),
            name: stem.clone(),
            format,
            content: content.to_string(),
            modified_at: Utc::now(),
        });
        for warning in &report.warnings {
            tracing::warn!(
                project = %self.project,
                category = %self.name,
                document = %stem,
                "Memory quality: {}",
                warning
            );
        }

        Ok(())
    }

    /// Load a document. `name` may carry its extension (`"v1.md"`) or not.
    pub async fn get(&self, name: &str) -> Result<Document> {
        let (stem, format) = split_lookup_name(name)?;
        let candidates: Vec<DocumentFormat> = match format {
            Some(f) => vec![f],
            None => DocumentFormat::ALL.to_vec(),
        };

        // Briefly both formats can exist while a format change is committed;
        // the newer file wins.
        let mut found: Option<(DocumentFormat, DateTime<Utc>)> = None;
        for candidate in candidates {
            match tokio::fs::metadata(self.file_path(&stem, candidate)).await {
                Ok(meta) if meta.is_file() => {
                    let modified = file_modified_at(&meta);
                    if found.map(|(_, t)| modified > t).unwrap_or(true) {
                        found = Some((candidate, modified));
                    }
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }

        let (format, _) = found.ok_or_else(|| self.not_found(name))?;
        self.load(&stem, format)
            .await?
            .ok_or_else(|| self.not_found(name))
    }

    /// Document file names (`<name>.<ext>`), sorted by name
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .entries()
            .await?
            .into_iter()
            .map(|(stem, format)| format!("{}.{}", stem, format.extension()))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Load every document in the category, most recently modified first
    pub async fn documents(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for (stem, format) in self.entries().await? {
            // A document replaced or removed since listing is skipped
            if let Some(doc) = self.load(&stem, format).await? {
                documents.push(doc);
            }
        }
        documents.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(documents)
    }

    /// Run the quality gate on a stored document
    pub async fn inspect(&self, name: &str) -> Result<QualityReport> {
        let document = self.get(name).await?;
        Ok(self.shared.quality.inspect(&document))
    }

    fn file_path(&self, stem: &str, format: DocumentFormat) -> PathBuf {
        self.dir.join(format!("{}.{}", stem, format.extension()))
    }

    fn not_found(&self, document: &str) -> Error {
        Error::DocumentNotFound {
            category: self.name.clone(),
            document: document.to_string(),
        }
    }

    async fn entries(&self) -> Result<Vec<(String, DocumentFormat)>> {
        let mut reader = match tokio::fs::read_dir(&self.dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            if !entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let file_name = entry.file_name();
            if let Some(parsed) = file_name.to_str().and_then(DocumentFormat::parse_file_name) {
                entries.push(parsed);
            }
        }
        Ok(entries)
    }

    async fn load(&self, stem: &str, format: DocumentFormat) -> Result<Option<Document>> {
        let path = self.file_path(stem, format);
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        // Same handle for both: a concurrent rename cannot split them
        let modified_at = file_modified_at(&file.metadata().await?);
        let mut content = String::new();
        file.read_to_string(&mut content).await?;

        Ok(Some(Document {
            category: self.name.clone(),
            name: stem.to_string(),
            format,
            content,
            modified_at,
        }))
    }
}

fn file_modified_at(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}
