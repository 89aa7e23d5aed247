pub mod engine;
pub mod request;

pub use engine::{merge, merge_by_pk};
pub use request::{MergeRequest, Selection};
