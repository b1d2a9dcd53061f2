//! Retrieval engine — selects the documents a session should load
//!
//! Selection policy:
//! 1. If the task names categories, only those are searched.
//! 2. Otherwise every canonical category of the namespace is searched.
//! 3. Documents are ordered by last-modified time, newest first.
//! 4. The result is truncated to `max_documents`, dropping the oldest.
//!
//! Retrieval is read-only and stateless: the same namespace contents and
//! inputs always give the same result.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::{validate_name, Document, Freshness};
use super::namespace::ProjectNamespace;
use super::store::MemoryStore;

/// What the session is about to do
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskContext {
    /// Free-form description of the task
    pub description: String,
    /// Categories to restrict retrieval to (empty = all canonical)
    #[serde(default)]
    pub categories: Vec<String>,
    /// Leave out documents classified as stale
    #[serde(default)]
    pub exclude_stale: bool,
}

impl TaskContext {
    /// Context with a description and no category hints
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    /// Context restricted to the given categories
    pub fn for_categories<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().with_categories(categories)
    }

    /// Restrict retrieval to the given categories
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Skip stale documents
    pub fn exclude_stale(mut self) -> Self {
        self.exclude_stale = true;
        self
    }
}

/// Stateless document selector
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrievalEngine;

impl RetrievalEngine {
    /// Create an engine
    pub fn new() -> Self {
        Self
    }

    /// Select up to `max_documents` documents relevant to `task`, newest
    /// first. An empty namespace yields an empty result.
    pub async fn retrieve(
        &self,
        namespace: &ProjectNamespace,
        task: &TaskContext,
        max_documents: usize,
    ) -> Result<Vec<Document>> {
        self.retrieve_at(namespace, task, max_documents, Utc::now())
            .await
    }

    /// `retrieve` with the store's default document cap
    pub async fn retrieve_default(
        &self,
        store: &MemoryStore,
        namespace: &ProjectNamespace,
        task: &TaskContext,
    ) -> Result<Vec<Document>> {
        self.retrieve(namespace, task, store.default_max_documents())
            .await
    }

    /// `retrieve` with an explicit clock for freshness filtering
    pub async fn retrieve_at(
        &self,
        namespace: &ProjectNamespace,
        task: &TaskContext,
        max_documents: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Document>> {
        if max_documents == 0 {
            return Ok(Vec::new());
        }

        let mut categories: Vec<String> = if task.categories.is_empty() {
            namespace.canonical_categories()
        } else {
            // Hints become directory names; keep them inside the namespace
            for hint in &task.categories {
                validate_name("category", hint)?;
            }
            task.categories.clone()
        };
        categories.sort();
        categories.dedup();

        let mut documents = Vec::new();
        for name in &categories {
            // Missing categories contribute nothing; retrieval never creates
            let category = namespace.category_unchecked(name);
            documents.extend(category.documents().await?);
        }

        if task.exclude_stale {
            let freshness = namespace.freshness_config();
            documents.retain(|d| d.freshness(freshness, now) != Freshness::Stale);
        }

        documents.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| a.category.cmp(&b.category))
                .then_with(|| a.name.cmp(&b.name))
        });
        documents.truncate(max_documents);

        tracing::debug!(
            skill = namespace.skill_id(),
            project = namespace.project_id(),
            task = %task.description,
            categories = categories.len(),
            documents = documents.len(),
            "Retrieved memory"
        );

        Ok(documents)
    }
}
