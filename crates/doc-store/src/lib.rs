//! Document storage with declarative aggregation pipelines.
//!
//! Provides the [`DocumentStore`] trait, the pipeline vocabulary evaluated by
//! [`execute`], and in-memory and PostgreSQL backends.

pub mod document;
pub mod error;
pub mod eval;
pub mod filter;
pub mod memory;
pub mod pipeline;
pub mod postgres;
pub mod store;

pub use common::{DocumentId, InvalidDocumentId};
pub use document::{CREATED_AT, Document, ID_FIELD, UPDATED_AT, compare_values, id_value};
pub use error::{DocStoreError, Result};
pub use eval::{Source, execute};
pub use filter::{Condition, Filter};
pub use memory::InMemoryDocumentStore;
pub use pipeline::{Derivation, Lookup, Pipeline, Projection, SortOrder, SortSpec, Stage};
pub use postgres::PostgresDocumentStore;
pub use store::{
    Cascade, Changes, DocumentStore, DocumentStoreExt, Toggled, UpdateOp, WriteOptions,
    timestamp_value,
};
