//! Local equipment catalog: a versioned record store with schema
//! migration, bulk CSV import, JSON backup/restore and AI-assisted
//! enrichment.
//!
//! Everything persists through [`store::RecordStore`], which reads and
//! writes the whole record list as one JSON document in a
//! [`storage::SlotStorage`] slot.

pub mod backup;
pub mod config;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod factory;
pub mod ids;
pub mod import;
pub mod migrate;
pub mod storage;
pub mod store;
pub mod types;

pub use error::VaultError;
pub use store::RecordStore;
pub use types::Category;
pub use types::EquipmentRecord;
