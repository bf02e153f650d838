//! Metadata API library
//!
//! Read-only assembly of track, album and artist graphs out of a Spotify-style
//! SQLite catalog, with optional per-track annotations from a sibling store.

pub mod config;
pub mod error;
pub mod metadata_store;
pub mod metrics;
pub mod service;
pub mod sqlite_persistence;

pub use error::{MetadataError, Result};
pub use metadata_store::{MetadataStore, QueryScope, StoreConfig};
pub use service::{BatchCategory, BatchLookupRequest, BatchLookupResponse, MetadataService};
