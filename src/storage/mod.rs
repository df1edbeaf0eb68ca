//! Storage media for the durable tier.
//!
//! - [`MemoryMedium`]: in-process, for tests and ephemeral caches
//! - [`FileMedium`]: one JSON file per record in a directory
//! - [`SqlMedium`]: one row per record via sqlx (feature `sql`)

pub mod traits;
pub mod memory;
pub mod file;
#[cfg(feature = "sql")]
pub mod sql;

pub use traits::{record_id, StorageError, StorageMedium};
pub use memory::MemoryMedium;
pub use file::FileMedium;
#[cfg(feature = "sql")]
pub use sql::SqlMedium;
