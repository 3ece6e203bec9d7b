//! Collaborator traits for tailflare
//!
//! This module defines the abstract interfaces the core consumes.
//!
//! - [`AddressDirectory`]: Snapshot of mesh devices and their addresses
//! - [`RecordStore`]: Zone lookup, record listing and batch apply at the DNS provider

pub mod address_directory;
pub mod record_store;

pub use address_directory::{AddressDirectory, AddressDirectoryFactory, Device};
pub use record_store::{
    BatchOutcome, DeleteSpec, NewRecordSpec, PatchSpec, RecordBatch, RecordPolicy, RecordStore,
    RecordStoreFactory, RecordStream, Ttl, collect_records,
};
