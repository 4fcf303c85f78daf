pub mod google;
pub mod memory;
pub mod range;
pub mod repository;
pub mod store;

pub use google::GoogleSheetsRowStore;
pub use memory::InMemoryRowStore;
pub use range::{Column, SheetLayout};
pub use repository::{LeadRepository, RepositoryError, SheetLeadRepository};
pub use store::{RangeUpdate, Row, RowStore, RowStoreError};
