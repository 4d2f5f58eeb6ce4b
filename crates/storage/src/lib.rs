pub mod db;
pub mod store;

pub use db::{create_db, DbPool};
pub use store::SqliteStore;
