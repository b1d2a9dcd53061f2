//! Memory store — registry of project namespaces
//!
//! The store is an explicit object handed to each session; there is no
//! process-wide instance. Namespaces are created lazily on first use and
//! cached for the lifetime of the store.

use crate::config::MemoryConfig;
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

use super::document::validate_name;
use super::namespace::ProjectNamespace;
use super::StoreShared;

type NamespaceKey = (String, String);
type NamespaceSlot = Arc<OnceCell<Arc<ProjectNamespace>>>;

/// Root registry mapping (skill, project) to its namespace
pub struct MemoryStore {
    root: PathBuf,
    skills: std::sync::RwLock<BTreeMap<String, BTreeSet<String>>>,
    namespaces: RwLock<BTreeMap<NamespaceKey, NamespaceSlot>>,
    shared: Arc<StoreShared>,
    default_max_documents: usize,
}

impl MemoryStore {
    /// Create a store from validated configuration. Nothing is written to
    /// disk until a namespace is first used.
    pub fn new(config: MemoryConfig) -> Result<Self> {
        config.validate()?;

        let skills: BTreeMap<String, BTreeSet<String>> = config
            .skills
            .iter()
            .map(|(id, skill)| {
                (
                    id.clone(),
                    skill.canonical_categories.iter().cloned().collect(),
                )
            })
            .collect();

        tracing::info!(
            root = %config.root.display(),
            skills = config.skills.len(),
            "Memory store opened"
        );

        Ok(Self {
            shared: Arc::new(StoreShared::from_config(&config)),
            root: config.root,
            skills: std::sync::RwLock::new(skills),
            namespaces: RwLock::new(BTreeMap::new()),
            default_max_documents: config.default_max_documents,
        })
    }

    /// Memory root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Document cap used by `RetrievalEngine::retrieve_default`
    pub fn default_max_documents(&self) -> usize {
        self.default_max_documents
    }

    /// Add or replace a skill's canonical categories.
    ///
    /// Namespaces already opened by this store keep the set they were
    /// created with; the new set applies to namespaces opened afterwards.
    pub fn register_skill<I, S>(&self, skill_id: &str, categories: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        validate_name("skill", skill_id)?;
        let categories: BTreeSet<String> = categories.into_iter().map(Into::into).collect();
        for category in &categories {
            validate_name("category", category)?;
        }

        let mut skills = self
            .skills
            .write()
            .map_err(|_| Error::Config("skill registry poisoned".to_string()))?;
        skills.insert(skill_id.to_string(), categories);
        Ok(())
    }

    /// Canonical categories currently registered for a skill
    pub fn canonical_categories(&self, skill_id: &str) -> Vec<String> {
        self.skills
            .read()
            .ok()
            .and_then(|s| s.get(skill_id).map(|c| c.iter().cloned().collect()))
            .unwrap_or_default()
    }

    /// Return the namespace for (skill, project), creating it with its
    /// canonical categories on first use. Concurrent first use creates
    /// exactly one namespace; first use of other keys is not held up.
    pub async fn get_or_create_namespace(
        &self,
        skill_id: &str,
        project_id: &str,
    ) -> Result<Arc<ProjectNamespace>> {
        validate_name("skill", skill_id)?;
        validate_name("project", project_id)?;
        self.namespace(skill_id, project_id, true).await
    }

    /// Namespaces known for a skill, sorted by project id.
    ///
    /// Includes projects present on disk from earlier processes. Those are
    /// opened without touching the filesystem; their canonical categories
    /// are created on first `get_category`.
    pub async fn list_namespaces(&self, skill_id: &str) -> Result<Vec<Arc<ProjectNamespace>>> {
        validate_name("skill", skill_id)?;

        let mut projects: BTreeSet<String> = self
            .namespaces
            .read()
            .await
            .iter()
            .filter(|((skill, _), slot)| skill == skill_id && slot.initialized())
            .map(|((_, project), _)| project.clone())
            .collect();

        let skill_dir = self.root.join(skill_id);
        match tokio::fs::read_dir(&skill_dir).await {
            Ok(mut reader) => {
                while let Some(entry) = reader.next_entry().await? {
                    if !entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                        continue;
                    }
                    if let Some(name) = entry.file_name().to_str() {
                        if validate_name("project", name).is_ok() {
                            projects.insert(name.to_string());
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Io(e)),
        }

        let mut namespaces = Vec::with_capacity(projects.len());
        for project in projects {
            namespaces.push(self.namespace(skill_id, &project, false).await?);
        }
        Ok(namespaces)
    }

    /// Cached namespace for the key, initialised at most once. With
    /// `create` the directories are made; otherwise the namespace is
    /// opened as it is on disk.
    async fn namespace(
        &self,
        skill_id: &str,
        project_id: &str,
        create: bool,
    ) -> Result<Arc<ProjectNamespace>> {
        let slot = self.slot((skill_id.to_string(), project_id.to_string())).await;
        let ns = slot
            .get_or_try_init(move || async move {
                let canonical: BTreeSet<String> =
                    self.canonical_categories(skill_id).into_iter().collect();
                let dir = self.root.join(skill_id).join(project_id);
                let shared = self.shared.clone();
                let ns = if create {
                    let ns =
                        ProjectNamespace::create(skill_id, project_id, dir, canonical, shared)
                            .await?;
                    tracing::info!(skill = skill_id, project = project_id, "Created namespace");
                    ns
                } else {
                    ProjectNamespace::open(skill_id, project_id, dir, canonical, shared)
                };
                Ok::<_, Error>(Arc::new(ns))
            })
            .await?;
        Ok(ns.clone())
    }

    /// The map lock is only held to find or insert the slot, never while
    /// a namespace is being created.
    async fn slot(&self, key: NamespaceKey) -> NamespaceSlot {
        if let Some(slot) = self.namespaces.read().await.get(&key) {
            return slot.clone();
        }
        self.namespaces.write().await.entry(key).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::DocumentFormat;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> MemoryStore {
        let config = MemoryConfig::with_root(dir.path())
            .with_skill("hermes", ["api_designs", "incidents"]);
        MemoryStore::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_get_or_create_namespace() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let ns = store
            .get_or_create_namespace("hermes", "checkout-api")
            .await
            .unwrap();
        assert_eq!(ns.skill_id(), "hermes");
        assert_eq!(ns.project_id(), "checkout-api");
        assert_eq!(ns.path(), dir.path().join("hermes").join("checkout-api"));
        assert!(ns.path().join("api_designs").is_dir());
        assert!(ns.path().join("incidents").is_dir());
    }

    #[tokio::test]
    async fn test_namespace_creation_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let first = store
            .get_or_create_namespace("hermes", "checkout-api")
            .await
            .unwrap();
        let second = store
            .get_or_create_namespace("hermes", "checkout-api")
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.canonical_categories(), second.canonical_categories());
    }

    #[tokio::test]
    async fn test_lazy_creation() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("memory");
        let _store = MemoryStore::new(MemoryConfig::with_root(&root)).unwrap();
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_unwritable_root_is_storage_unavailable() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("not-a-dir");
        std::fs::write(&root, "occupied").unwrap();
        let store = MemoryStore::new(MemoryConfig::with_root(&root)).unwrap();

        let err = store
            .get_or_create_namespace("hermes", "checkout-api")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_register_skill_does_not_touch_open_namespaces() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let open = store
            .get_or_create_namespace("hermes", "checkout-api")
            .await
            .unwrap();

        store
            .register_skill("hermes", ["api_designs", "incidents", "runbooks"])
            .unwrap();

        assert_eq!(open.canonical_categories().len(), 2);
        assert!(!open.path().join("runbooks").exists());

        let fresh = store
            .get_or_create_namespace("hermes", "billing")
            .await
            .unwrap();
        assert_eq!(fresh.canonical_categories().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_skill_has_only_ad_hoc_categories() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let ns = store
            .get_or_create_namespace("athena", "checkout-api")
            .await
            .unwrap();
        assert!(ns.list_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_namespaces_sorted_and_scoped() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.get_or_create_namespace("hermes", "zeta").await.unwrap();
        store.get_or_create_namespace("hermes", "alpha").await.unwrap();
        store.get_or_create_namespace("athena", "other").await.unwrap();

        let projects: Vec<String> = store
            .list_namespaces("hermes")
            .await
            .unwrap()
            .iter()
            .map(|ns| ns.project_id().to_string())
            .collect();
        assert_eq!(projects, vec!["alpha".to_string(), "zeta".to_string()]);
        assert!(store.list_namespaces("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_namespaces_includes_existing_on_disk() {
        let dir = TempDir::new().unwrap();
        {
            let earlier = store(&dir);
            let ns = earlier
                .get_or_create_namespace("hermes", "checkout-api")
                .await
                .unwrap();
            ns.get_category("incidents")
                .await
                .unwrap()
                .put("outage", "# Outage", DocumentFormat::Markdown)
                .await
                .unwrap();
        }

        let later = store(&dir);
        let namespaces = later.list_namespaces("hermes").await.unwrap();
        assert_eq!(namespaces.len(), 1);
        let doc = namespaces[0]
            .get_category("incidents")
            .await
            .unwrap()
            .get("outage")
            .await
            .unwrap();
        assert_eq!(doc.content, "# Outage");
    }

    #[tokio::test]
    async fn test_listing_does_not_create_directories() {
        let dir = TempDir::new().unwrap();
        let legacy = dir.path().join("hermes").join("legacy");
        std::fs::create_dir_all(&legacy).unwrap();
        let store = store(&dir);

        let namespaces = store.list_namespaces("hermes").await.unwrap();
        assert_eq!(namespaces.len(), 1);
        assert_eq!(namespaces[0].project_id(), "legacy");
        assert_eq!(std::fs::read_dir(&legacy).unwrap().count(), 0);
        assert_eq!(
            namespaces[0].list_categories().await.unwrap(),
            vec!["api_designs".to_string(), "incidents".to_string()]
        );

        // Canonical categories still materialise on access
        let cat = namespaces[0].get_category("incidents").await.unwrap();
        assert!(cat.path().is_dir());
        let again = store
            .get_or_create_namespace("hermes", "legacy")
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&namespaces[0], &again));
    }

    #[tokio::test]
    async fn test_pending_creation_does_not_block_other_namespaces() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store(&dir));
        let slot = store
            .slot(("hermes".to_string(), "stuck".to_string()))
            .await;

        let (release, wait) = tokio::sync::oneshot::channel::<()>();
        let pending = tokio::spawn(async move {
            slot.get_or_try_init(|| async move {
                let _ = wait.await;
                Err::<Arc<ProjectNamespace>, Error>(Error::Config("abandoned".to_string()))
            })
            .await
            .is_err()
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let ns = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            store.get_or_create_namespace("hermes", "checkout-api"),
        )
        .await
        .expect("creation of another key was blocked")
        .unwrap();
        assert_eq!(ns.project_id(), "checkout-api");
        let listed = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            store.list_namespaces("hermes"),
        )
        .await
        .expect("listing was blocked")
        .unwrap();
        assert_eq!(listed.len(), 1);

        release.send(()).unwrap();
        assert!(pending.await.unwrap());

        // A failed creation leaves the key usable
        let stuck = store.get_or_create_namespace("hermes", "stuck").await.unwrap();
        assert!(stuck.path().join("incidents").is_dir());
    }

    #[tokio::test]
    async fn test_invalid_ids_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert!(matches!(
            store.get_or_create_namespace("hermes", "../escape").await,
            Err(Error::InvalidName(_))
        ));
        assert!(store.register_skill("hermes", ["a/b"]).is_err());
    }
}
