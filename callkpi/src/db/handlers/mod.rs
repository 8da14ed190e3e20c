//! Record store implementations.
//!
//! - [`RecordStore`]: the read-only query interface the aggregator consumes
//! - [`SqliteRecordStore`]: queries against the voicemail assistant's SQLite database
//! - [`InMemoryRecordStore`]: fixtures for tests and dry runs
//!
//! # Common Pattern
//!
//! ```ignore
//! use callkpi::db::handlers::{RecordStore, SqliteRecordStore};
//!
//! async fn example(pool: sqlx::SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteRecordStore::new(pool);
//!     for tenant in store.list_tenants().await? {
//!         println!("{tenant}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod in_memory;
pub mod records;
pub mod repository;

pub use in_memory::InMemoryRecordStore;
pub use records::SqliteRecordStore;
pub use repository::RecordStore;
