//! Forge Memory - Project-scoped hierarchical memory for agent skills
//!
//! Skills and agents accumulate project knowledge (architecture decisions,
//! incident reports, API designs) across sessions. This crate stores that
//! knowledge as plain files with defined lifecycle, retrieval and
//! write-coordination semantics.
//!
//! ## Layout
//!
//! ```text
//! <memory-root>/
//! └── <skill-id>/
//!     └── <project-id>/
//!         ├── incidents/
//!         │   ├── 2025-06-checkout-outage.md
//!         │   └── ...
//!         └── api_designs/
//!             ├── v1.md
//!             └── schema.json
//! ```
//!
//! ## Flow
//!
//! 1. A session opens its namespace via [`MemoryStore::get_or_create_namespace`].
//! 2. [`RetrievalEngine::retrieve`] loads the relevant documents.
//! 3. The session works, then persists results with [`Category::put`],
//!    which goes through the per-document [`WriteCoordinator`].
//!
//! ## Modules
//!
//! - [`memory`]: store, namespaces, categories, documents, retrieval
//! - [`config`]: configuration management
//! - [`error`]: error taxonomy
//! - [`logging`]: tracing subscriber setup for host processes

pub mod config;
pub mod error;
pub mod logging;
pub mod memory;

pub use config::MemoryConfig;
pub use error::{Error, Result};
pub use memory::{
    Category, Document, DocumentFormat, MemoryStore, ProjectNamespace, RetrievalEngine,
    TaskContext, WriteCoordinator,
};
