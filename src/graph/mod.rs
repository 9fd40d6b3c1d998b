//! Knowledge graph domain: data model, repositories, and the manager that
//! implements the nine public operations on top of a storage adapter.

pub mod batch;
pub mod entity_repo;
pub mod manager;
pub mod relation_repo;
pub mod store;
pub mod types;

pub use batch::{BatchItem, BatchReport, Outcome};
pub use entity_repo::EntityRepo;
pub use manager::KnowledgeGraphManager;
pub use relation_repo::RelationRepo;
pub use store::StorageAdapter;
pub use types::{
    Entity, KnowledgeGraph, ObservationAddition, ObservationDeletion, ObservationsAdded,
    ObservationsDeleted, Relation,
};
