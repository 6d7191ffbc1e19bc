//! Package intake, lifecycle, counter search, carrier pickups and monthly
//! reporting over an external document store.

pub mod domain;
pub mod intake;
pub mod legacy;
pub mod lifecycle;
pub mod listing;
pub mod memory;
pub mod report;
pub mod router;
pub mod search;
pub mod service;
pub mod session;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{Barcode, Empresa, Estado, Package, RecipientName, StampField, Tipo};
pub use intake::{BarcodeSource, IntakeRequest, RandomBarcodes, BARCODE_LENGTH};
pub use legacy::{LegacyImportError, LegacyImporter};
pub use lifecycle::{InvalidTransition, Transition, Trigger};
pub use listing::{ListingFeed, ListingFilter};
pub use memory::MemoryPackageStore;
pub use report::{MonthlyReport, Period, PeriodError};
pub use router::package_router;
pub use search::{SearchQuery, SearchResults};
pub use service::{DetailsCorrection, ImportSummary, PackageService, ParcelError, PickupReceipt};
pub use session::{CounterSession, SessionMessage};
pub use store::{
    Direction, Filter, PackagePatch, PackageQuery, PackageStore, PackageWrite, Stamp, StoreError,
    Subscription, TimeField,
};
