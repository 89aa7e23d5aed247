pub mod config;
pub mod db;
pub mod display;
pub mod error;
pub mod export;
pub mod merge;
pub mod record;
pub mod schema;
pub mod store;
pub mod value;

#[cfg(test)]
mod fixtures;

pub use config::{Settings, StoreConfig};
pub use db::SqliteStore;
pub use error::{AdminError, Result};
pub use export::{ExportOptions, ExportOutput, ExportRequest, Header, OutputFormat, export};
pub use merge::{MergeRequest, Selection, merge, merge_by_pk};
pub use record::Record;
pub use schema::{FieldDef, FieldType, Registry, Schema, SchemaDescriptor};
pub use store::Store;
pub use value::Value;
