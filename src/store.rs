use crate::error::{AdminError, Result};
use crate::record::Record;
use crate::schema::{RelationDef, SchemaDescriptor};
use crate::value::Value;

/// The persistence collaborator the merge engine and exporter work against.
pub trait Store {
    fn schemas(&self) -> &dyn SchemaDescriptor;

    fn fetch(&self, schema: &str, pk: i64) -> Result<Option<Record>>;

    fn get(&self, schema: &str, pk: i64) -> Result<Record> {
        self.fetch(schema, pk)?
            .ok_or_else(|| AdminError::RecordNotFound {
                schema: schema.to_string(),
                pk,
            })
    }

    fn all(&self, schema: &str) -> Result<Vec<Record>>;

    fn count(&self, schema: &str) -> Result<usize>;

    /// Insert a new record and return it with its assigned key.
    fn create(&self, schema: &str, values: &[(&str, Value)]) -> Result<Record>;

    /// Upsert `record` under its primary key.
    fn save(&self, record: &Record) -> Result<()>;

    /// Delete `record`. Its own many-to-many memberships go with it;
    /// dependents follow their field's `OnDelete` rule.
    fn delete(&self, record: &Record) -> Result<()>;

    /// Members of a many-to-many relation of `record`.
    fn related(&self, record: &Record, relation: &RelationDef) -> Result<Vec<Record>>;

    /// Add `member` to a many-to-many relation of `record`. Adding an
    /// existing member is a no-op.
    fn add_related(&self, record: &Record, relation: &RelationDef, member: &Record) -> Result<()>;

    /// Records whose reverse-relation field points at `record`.
    fn dependents(&self, record: &Record, relation: &RelationDef) -> Result<Vec<Record>>;

    /// Run `f` so that either all of its writes apply or none do.
    fn atomic<T, F>(&self, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&Self) -> Result<T>;
}
