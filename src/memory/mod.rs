//! Memory system — project-scoped hierarchical document store
//!
//! ```text
//! <root>/<skill-id>/<project-id>/<category>/<document>.<md|json>
//! ```
//!
//! `MemoryStore` owns namespaces, a `ProjectNamespace` owns categories,
//! a `Category` owns documents. All writes go through the shared
//! `WriteCoordinator`; `RetrievalEngine` is a read-only view over a
//! namespace.

pub mod category;
pub mod coordinator;
pub mod document;
pub mod namespace;
pub mod quality;
pub mod retrieval;
pub mod store;

pub use category::Category;
pub use coordinator::{DocumentLock, WriteCoordinator};
pub use document::{Document, DocumentFormat, Freshness};
pub use namespace::ProjectNamespace;
pub use quality::{QualityGate, QualityReport, QualityWarning};
pub use retrieval::{RetrievalEngine, TaskContext};
pub use store::MemoryStore;

use crate::config::{FreshnessConfig, MemoryConfig};
use std::time::Duration;

/// State shared by every namespace and category handle of one store
pub(crate) struct StoreShared {
    pub(crate) coordinator: WriteCoordinator,
    pub(crate) quality: QualityGate,
    pub(crate) lock_timeout: Option<Duration>,
    pub(crate) freshness: FreshnessConfig,
}

impl StoreShared {
    pub(crate) fn from_config(config: &MemoryConfig) -> Self {
        Self {
            coordinator: WriteCoordinator::new(),
            quality: QualityGate::new(config.quality.clone()),
            lock_timeout: config.lock_timeout(),
            freshness: config.freshness,
        }
    }
}
