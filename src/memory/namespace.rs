//! Project namespace — one project's memory under one skill

use crate::config::FreshnessConfig;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::category::Category;
use super::document::validate_name;
use super::StoreShared;

/// Root of one project's memory for one skill.
///
/// The canonical category set is captured when the namespace is created
/// and does not change afterwards.
pub struct ProjectNamespace {
    skill_id: String,
    project_id: String,
    dir: PathBuf,
    canonical: BTreeSet<String>,
    shared: Arc<StoreShared>,
}

impl std::fmt::Debug for ProjectNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectNamespace")
            .field("skill_id", &self.skill_id)
            .field("project_id", &self.project_id)
            .field("dir", &self.dir)
            .field("canonical", &self.canonical)
            .finish()
    }
}

impl ProjectNamespace {
    /// Create the namespace directory and its canonical categories.
    /// Idempotent: existing directories are left as they are.
    pub(crate) async fn create(
        skill_id: &str,
        project_id: &str,
        dir: PathBuf,
        canonical: BTreeSet<String>,
        shared: Arc<StoreShared>,
    ) -> Result<Self> {
        create_dir(&dir).await?;
        for category in &canonical {
            create_dir(&dir.join(category)).await?;
        }

        tracing::debug!(
            skill = skill_id,
            project = project_id,
            categories = canonical.len(),
            "Namespace ready"
        );

        Ok(Self::open(skill_id, project_id, dir, canonical, shared))
    }

    /// Handle to a namespace as it is on disk; creates nothing.
    pub(crate) fn open(
        skill_id: &str,
        project_id: &str,
        dir: PathBuf,
        canonical: BTreeSet<String>,
        shared: Arc<StoreShared>,
    ) -> Self {
        Self {
            skill_id: skill_id.to_string(),
            project_id: project_id.to_string(),
            dir,
            canonical,
            shared,
        }
    }

    /// Skill this namespace belongs to
    pub fn skill_id(&self) -> &str {
        &self.skill_id
    }

    /// Project identifier
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Namespace directory
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Canonical categories captured at creation, sorted by name
    pub fn canonical_categories(&self) -> Vec<String> {
        self.canonical.iter().cloned().collect()
    }

    /// Whether `name` is one of this namespace's canonical categories
    pub fn is_canonical(&self, name: &str) -> bool {
        self.canonical.contains(name)
    }

    pub(crate) fn freshness_config(&self) -> &FreshnessConfig {
        &self.shared.freshness
    }

    /// Get a category. Canonical categories are created on first access;
    /// any other category must already exist.
    pub async fn get_category(&self, name: &str) -> Result<Category> {
        validate_name("category", name)?;
        let dir = self.dir.join(name);

        if self.is_canonical(name) {
            create_dir(&dir).await?;
        } else if !is_dir(&dir).await {
            return Err(Error::CategoryNotFound {
                project: self.project_id.clone(),
                category: name.to_string(),
            });
        }

        Ok(self.category_handle(name, dir))
    }

    /// Get a category, creating it if missing (ad-hoc categories)
    pub async fn get_or_create_category(&self, name: &str) -> Result<Category> {
        validate_name("category", name)?;
        let dir = self.dir.join(name);
        if !is_dir(&dir).await {
            create_dir(&dir).await?;
            tracing::info!(
                skill = %self.skill_id,
                project = %self.project_id,
                category = name,
                "Created category"
            );
        }
        Ok(self.category_handle(name, dir))
    }

    /// Category names, sorted. Canonical categories are always included,
    /// even when empty.
    pub async fn list_categories(&self) -> Result<Vec<String>> {
        let mut names = self.canonical.clone();

        let mut reader = match tokio::fs::read_dir(&self.dir).await {
            Ok(reader) => Some(reader),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(Error::Io(e)),
        };
        if let Some(reader) = reader.as_mut() {
            while let Some(entry) = reader.next_entry().await? {
                if !entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    if validate_name("category", name).is_ok() {
                        names.insert(name.to_string());
                    }
                }
            }
        }

        Ok(names.into_iter().collect())
    }

    /// Handle to a category that may not exist on disk, for read-only use.
    /// `name` must already have passed `validate_name`.
    pub(crate) fn category_unchecked(&self, name: &str) -> Category {
        self.category_handle(name, self.dir.join(name))
    }

    fn category_handle(&self, name: &str, dir: PathBuf) -> Category {
        Category::new(self.project_id.clone(), name, dir, self.shared.clone())
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

async fn create_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| Error::StorageUnavailable {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::memory::DocumentFormat;
    use tempfile::TempDir;

    async fn namespace(dir: &TempDir, canonical: &[&str]) -> ProjectNamespace {
        let config = MemoryConfig::with_root(dir.path());
        let shared = Arc::new(StoreShared::from_config(&config));
        ProjectNamespace::create(
            "hermes",
            "checkout-api",
            dir.path().join("hermes").join("checkout-api"),
            canonical.iter().map(|c| c.to_string()).collect(),
            shared,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_canonical_categories_created_empty() {
        let dir = TempDir::new().unwrap();
        let ns = namespace(&dir, &["runbooks", "incidents"]).await;

        assert!(dir.path().join("hermes/checkout-api/incidents").is_dir());
        assert!(dir.path().join("hermes/checkout-api/runbooks").is_dir());
        assert_eq!(
            ns.list_categories().await.unwrap(),
            vec!["incidents".to_string(), "runbooks".to_string()]
        );
        assert_eq!(ns.canonical_categories(), ns.list_categories().await.unwrap());
    }

    #[tokio::test]
    async fn test_canonical_category_recreated_on_access() {
        let dir = TempDir::new().unwrap();
        let ns = namespace(&dir, &["incidents"]).await;
        std::fs::remove_dir(ns.path().join("incidents")).unwrap();

        let cat = ns.get_category("incidents").await.unwrap();
        assert!(cat.path().is_dir());
    }

    #[tokio::test]
    async fn test_unknown_category_not_found() {
        let dir = TempDir::new().unwrap();
        let ns = namespace(&dir, &["incidents"]).await;

        let err = ns.get_category("scratch").await.unwrap_err();
        assert!(matches!(err, Error::CategoryNotFound { .. }));
        assert!(!ns.path().join("scratch").exists());
    }

    #[tokio::test]
    async fn test_ad_hoc_category() {
        let dir = TempDir::new().unwrap();
        let ns = namespace(&dir, &["incidents"]).await;

        let cat = ns.get_or_create_category("scratch").await.unwrap();
        cat.put("idea", "# Idea", DocumentFormat::Markdown)
            .await
            .unwrap();

        // Once created it is reachable without the create flag
        let again = ns.get_category("scratch").await.unwrap();
        assert_eq!(again.list().await.unwrap(), vec!["idea.md".to_string()]);
        assert_eq!(
            ns.list_categories().await.unwrap(),
            vec!["incidents".to_string(), "scratch".to_string()]
        );
        assert!(!ns.is_canonical("scratch"));
    }

    #[tokio::test]
    async fn test_invalid_category_name() {
        let dir = TempDir::new().unwrap();
        let ns = namespace(&dir, &[]).await;

        assert!(matches!(
            ns.get_or_create_category("../other-project").await,
            Err(Error::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let first = namespace(&dir, &["incidents"]).await;
        first
            .get_category("incidents")
            .await
            .unwrap()
            .put("outage", "# Outage", DocumentFormat::Markdown)
            .await
            .unwrap();

        let second = namespace(&dir, &["incidents"]).await;
        let cat = second.get_category("incidents").await.unwrap();
        assert_eq!(cat.get("outage").await.unwrap().content, "# Outage");
    }
}
