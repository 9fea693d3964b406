//! Dual-write coordination and reconciliation engine.
//!
//! This crate keeps a remote commerce platform and the local record store
//! consistent without a shared transaction:
//! - [`coordinator`]: remote-then-local writes with a single compensating call
//! - [`diff`]: add/update/remove sets over natural keys
//! - [`price_list`]: the phased price-list reconciliation pipeline
//! - [`partnership`]: request submission and mirror-aware bulk approval
//! - [`fulfillment`]: fulfillment services paired with a remote object
//!
//! [`SyncEngine`] exposes the caller-facing operations.

pub mod config;
pub mod coordinator;
pub mod diff;
pub mod engine;
pub mod error;
pub mod fulfillment;
pub mod gateway;
mod local;
pub mod partnership;
pub mod price_list;
pub mod telemetry;

pub use config::{Config, LogFormat};
pub use coordinator::{
    CleanupFailure, DualWriteCoordinator, RecreateFailure, create_with_compensation,
    delete_with_compensation,
};
pub use diff::{Diff, diff};
pub use engine::SyncEngine;
pub use error::{Result, SyncError};
pub use fulfillment::FulfillmentManager;
pub use gateway::{
    InMemoryRemoteGateway, RemoteError, RemoteFilter, RemoteGateway, RemoteRecord, RemoteResource,
    RemoteStatus, ResourceKind,
};
pub use partnership::{AccessOutcome, PartnershipEngine, SubmitRequest};
pub use price_list::{
    DesiredPriceList, DesiredProduct, DesiredVariant, Phase, PriceListService, ReconcileCounts,
    ReconcileOutcome, ReconcileReport,
};
