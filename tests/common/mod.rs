//! Common test infrastructure
//!
//! Fixture catalogs are built with direct SQL inserts into freshly created
//! stores, then opened read-only through [`metadata_api::MetadataStore`].
//! Tests should only import from this module, not from internal submodules.

mod constants;
mod fixtures;

pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{
    create_crowded_catalog, create_scenario_a_catalog, create_test_catalog, create_test_catalog_without_annotations,
    TestCatalog,
};
