pub mod repository;
pub mod schema;
pub mod store;

pub use repository::Repository;
pub use schema::run_migrations;
pub use store::SqliteStore;
