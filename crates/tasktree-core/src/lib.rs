//! tasktree-core: a locally cached snapshot of a remote task service and
//! the engine that rebuilds an ordered display tree from it.
//!
//! This crate provides:
//! - The entity store: a persisted flat snapshot of projects, sections and
//!   tasks, replaced collection-wise by sync cycles
//! - The sync coordinator pulling entity classes through the `TaskApi`
//!   boundary into the store
//! - The tree builder computing ordered child lists for a display host,
//!   with an eventual-consistency first-fetch contract
//! - The change bus, sort policy and per-task detail projection

pub mod api;
pub mod details;
pub mod entities;
pub mod events;
pub mod sort;
pub mod store;
pub mod sync;
pub mod tree;

pub use api::{ApiError, NewTask, SecretStore, TaskApi};
pub use details::{DetailProjector, Fact, FactAction};
pub use entities::{DueDate, Project, Section, Task};
pub use events::{ChangeBus, Subscription};
pub use sort::{SortBy, SortSetting};
pub use store::{EntityStore, KeyValueStore, Snapshot, SnapshotUpdate};
pub use sync::{SyncCoordinator, SyncError};
pub use tree::{Disposition, Node, NodeSource, TreeBuilder};
