use rusqlite::Connection;
use std::cell::Cell;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::db::{Repository, run_migrations};
use crate::error::{AdminError, Result};
use crate::record::Record;
use crate::schema::{RelationDef, Registry, SchemaDescriptor};
use crate::store::Store;
use crate::value::Value;

/// A savepoint that rolls back unless released, including when the
/// enclosing scope unwinds.
struct Savepoint<'a> {
    conn: &'a Connection,
    depth: &'a Cell<usize>,
    name: String,
    released: bool,
}

impl<'a> Savepoint<'a> {
    fn begin(conn: &'a Connection, depth: &'a Cell<usize>) -> Result<Self> {
        let level = depth.get() + 1;
        let name = format!("adminops_sp_{}", level);
        conn.execute_batch(&format!("SAVEPOINT {}", name))?;
        depth.set(level);
        debug!(savepoint = %name, "savepoint opened");
        Ok(Savepoint {
            conn,
            depth,
            name,
            released: false,
        })
    }

    fn release(mut self) -> Result<()> {
        self.conn
            .execute_batch(&format!("RELEASE {}", self.name))?;
        self.released = true;
        Ok(())
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
        if self.released {
            return;
        }
        let rollback = format!("ROLLBACK TO {0}; RELEASE {0}", self.name);
        match self.conn.execute_batch(&rollback) {
            Ok(()) => debug!(savepoint = %self.name, "savepoint rolled back"),
            Err(e) => warn!(savepoint = %self.name, error = %e, "failed to roll back savepoint"),
        }
    }
}

/// SQLite-backed store over the tables described by a `Registry`.
pub struct SqliteStore {
    conn: Connection,
    registry: Registry,
    depth: Cell<usize>,
}

impl SqliteStore {
    pub fn open(config: &StoreConfig, registry: Registry) -> Result<Self> {
        config.ensure_dirs_exist()?;
        let conn = Connection::open(&config.db_path)?;
        Self::from_connection(conn, registry)
    }

    pub fn open_in_memory(registry: Registry) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, registry)
    }

    fn from_connection(mut conn: Connection, registry: Registry) -> Result<Self> {
        registry.validate()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        run_migrations(&mut conn, &registry)?;

        Ok(SqliteStore {
            conn,
            registry,
            depth: Cell::new(0),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn repo(&self) -> Repository<'_> {
        Repository::new(&self.conn, &self.registry)
    }

    fn check_relation(&self, record: &Record, relation: &RelationDef) -> Result<()> {
        let known = self.registry.relation(&record.schema, &relation.name)?;
        if known.as_ref() != Some(relation) {
            return Err(AdminError::FieldNotFound {
                schema: record.schema.clone(),
                path: relation.name.clone(),
            });
        }
        Ok(())
    }
}

impl Store for SqliteStore {
    fn schemas(&self) -> &dyn SchemaDescriptor {
        &self.registry
    }

    fn fetch(&self, schema: &str, pk: i64) -> Result<Option<Record>> {
        self.repo().get_by_id(schema, pk)
    }

    fn all(&self, schema: &str) -> Result<Vec<Record>> {
        self.repo().load_all(schema)
    }

    fn count(&self, schema: &str) -> Result<usize> {
        self.repo().count(schema)
    }

    fn create(&self, schema: &str, values: &[(&str, Value)]) -> Result<Record> {
        let pk = self.repo().insert(schema, values)?;
        self.get(schema, pk)
    }

    fn save(&self, record: &Record) -> Result<()> {
        self.repo().upsert(record)
    }

    fn delete(&self, record: &Record) -> Result<()> {
        self.repo().delete(&record.schema, record.pk)
    }

    fn related(&self, record: &Record, relation: &RelationDef) -> Result<Vec<Record>> {
        self.check_relation(record, relation)?;
        self.repo().load_members(relation, record.pk)
    }

    fn add_related(&self, record: &Record, relation: &RelationDef, member: &Record) -> Result<()> {
        self.check_relation(record, relation)?;
        self.repo().add_member(relation, record.pk, member.pk)
    }

    fn dependents(&self, record: &Record, relation: &RelationDef) -> Result<Vec<Record>> {
        self.check_relation(record, relation)?;
        self.repo().load_dependents(relation, record.pk)
    }

    fn atomic<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let savepoint = Savepoint::begin(&self.conn, &self.depth)?;
        let value = f(self)?;
        savepoint.release()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::contacts_registry;
    use crate::schema::{FieldDef, FieldType, Schema};

    fn setup_store() -> SqliteStore {
        SqliteStore::open_in_memory(contacts_registry()).unwrap()
    }

    #[test]
    fn test_create_and_get() {
        let store = setup_store();
        let tag = store.create("tag", &[("label", Value::from("vip"))]).unwrap();
        let fetched = store.get("tag", tag.pk).unwrap();
        assert_eq!(fetched, tag);
    }

    #[test]
    fn test_get_missing_record() {
        let store = setup_store();
        match store.get("tag", 99) {
            Err(AdminError::RecordNotFound { schema, pk }) => {
                assert_eq!(schema, "tag");
                assert_eq!(pk, 99);
            }
            other => panic!("Expected RecordNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_atomic_commits() {
        let store = setup_store();
        store
            .atomic(|s| {
                s.create("tag", &[("label", Value::from("a"))])?;
                s.create("tag", &[("label", Value::from("b"))])?;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.count("tag").unwrap(), 2);
    }

    #[test]
    fn test_atomic_rolls_back_on_error() {
        let store = setup_store();
        let result: Result<()> = store.atomic(|s| {
            s.create("tag", &[("label", Value::from("a"))])?;
            Err(AdminError::Configuration("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(store.count("tag").unwrap(), 0);
    }

    #[test]
    fn test_nested_atomic_rolls_back_inner_only() {
        let store = setup_store();
        store
            .atomic(|s| {
                s.create("tag", &[("label", Value::from("outer"))])?;
                let inner: Result<()> = s.atomic(|s| {
                    s.create("tag", &[("label", Value::from("inner"))])?;
                    Err(AdminError::Configuration("inner failure".to_string()))
                });
                assert!(inner.is_err());
                Ok(())
            })
            .unwrap();

        let tags = store.all("tag").unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].get("label"), &Value::from("outer"));
    }

    #[test]
    fn test_related_rejects_foreign_relation() {
        let store = setup_store();
        let tag = store.create("tag", &[("label", Value::from("a"))]).unwrap();
        let relation = store.registry().relation("person", "tags").unwrap().unwrap();
        assert!(matches!(
            store.related(&tag, &relation),
            Err(AdminError::FieldNotFound { .. })
        ));
    }

    #[test]
    fn test_open_on_disk() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(temp_dir.path().join("data").join("admin.db"));

        {
            let store = SqliteStore::open(&config, contacts_registry()).unwrap();
            store.create("tag", &[("label", Value::from("kept"))]).unwrap();
        }

        let store = SqliteStore::open(&config, contacts_registry()).unwrap();
        assert_eq!(store.count("tag").unwrap(), 1);
    }

    #[test]
    fn test_reopen_with_added_schema() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(temp_dir.path().join("admin.db"));

        {
            let store = SqliteStore::open(&config, contacts_registry()).unwrap();
            store.create("tag", &[("label", Value::from("kept"))]).unwrap();
        }

        let registry = contacts_registry().register(
            Schema::new("project").with_field(FieldDef::new("title", FieldType::Char)),
        );
        let store = SqliteStore::open(&config, registry).unwrap();
        let project = store
            .create("project", &[("title", Value::from("Launch"))])
            .unwrap();
        assert_eq!(store.get("project", project.pk).unwrap(), project);
        assert_eq!(store.count("tag").unwrap(), 1);
    }
}
