//! Transactional local persistence for price lists, catalogs, partnerships
//! and fulfillment services.
//!
//! Two backends implement [`RecordStore`]:
//! - [`PostgresRecordStore`] for production use
//! - [`InMemoryRecordStore`] for tests, with per-operation fault injection

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{RecordStoreError, Result};
pub use memory::{InMemoryRecordStore, InMemoryTransaction};
pub use postgres::{PostgresRecordStore, PostgresTransaction};
pub use query::RequestQuery;
pub use store::{RecordStore, RecordTransaction, with_transaction};
