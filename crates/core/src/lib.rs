pub mod catalogue;
pub mod config;
pub mod domain;
pub mod errors;

pub use catalogue::{
    CatalogueCache, CatalogueRefresher, CatalogueService, CatalogueSource, RefreshHandle,
    SnapshotStore,
};
pub use domain::country::Country;
pub use domain::package::{Package, PackageId};
pub use errors::{CatalogueError, InterfaceError};
