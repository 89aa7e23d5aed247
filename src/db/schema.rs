use rusqlite::{Connection, params};
use rusqlite_migration::{M, Migrations};
use tracing::info;

use crate::error::Result;
use crate::schema::{FieldDef, FieldType, RelationDef, Registry, Schema};

pub const JOIN_SOURCE: &str = "source_id";
pub const JOIN_TARGET: &str = "target_id";

fn column_ddl(field: &FieldDef) -> String {
    if field.primary_key {
        return format!("\"{}\" INTEGER PRIMARY KEY AUTOINCREMENT", field.name);
    }

    let mut ddl = format!("\"{}\" {}", field.name, field.field_type.sql_type());
    if !field.null {
        ddl.push_str(" NOT NULL");
    }
    if matches!(field.field_type, FieldType::OneToOne { .. }) {
        ddl.push_str(" UNIQUE");
    }
    if let (Some(target), Some(on_delete)) =
        (field.field_type.target(), field.field_type.on_delete())
    {
        ddl.push_str(&format!(
            " REFERENCES \"{}\"(\"id\") ON DELETE {}",
            target,
            on_delete.as_sql()
        ));
    }
    ddl
}

pub fn create_table_sql(schema: &Schema) -> String {
    let columns: Vec<String> = schema.fields.iter().map(column_ddl).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (\n    {}\n);",
        schema.name,
        columns.join(",\n    ")
    )
}

/// Association table of a many-to-many relation. Rows go away with either
/// side.
pub fn create_join_table_sql(owner: &Schema, relation: &RelationDef) -> String {
    let table = relation
        .join_table
        .clone()
        .unwrap_or_else(|| format!("{}_{}", owner.name, relation.name));
    format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (
    \"{JOIN_SOURCE}\" INTEGER NOT NULL REFERENCES \"{}\"(\"id\") ON DELETE CASCADE,
    \"{JOIN_TARGET}\" INTEGER NOT NULL REFERENCES \"{}\"(\"id\") ON DELETE CASCADE,
    PRIMARY KEY (\"{JOIN_SOURCE}\", \"{JOIN_TARGET}\")
);",
        owner.name, relation.target
    )
}

/// Migrations of the store's own bookkeeping. Only ever appended to.
fn store_migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "CREATE TABLE adminops_tables (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);",
    )])
}

/// `(table, DDL)` for every registered table, association tables after.
pub fn table_statements(registry: &Registry) -> Vec<(String, String)> {
    let mut statements: Vec<(String, String)> = registry
        .iter()
        .map(|schema| (schema.name.clone(), create_table_sql(schema)))
        .collect();
    for schema in registry.iter() {
        for relation in &schema.many_to_many {
            let table = relation
                .join_table
                .clone()
                .unwrap_or_else(|| format!("{}_{}", schema.name, relation.name));
            statements.push((table, create_join_table_sql(schema, relation)));
        }
    }
    statements
}

/// Bring the bookkeeping schema up to date, then create any registered
/// table the database does not have yet. Tables are matched by name, so a
/// registry may grow between opens in any order.
pub fn run_migrations(conn: &mut Connection, registry: &Registry) -> Result<()> {
    store_migrations().to_latest(conn)?;

    let tx = conn.transaction()?;
    for (table, sql) in table_statements(registry) {
        tx.execute_batch(&sql)?;
        let added = tx.execute(
            "INSERT OR IGNORE INTO adminops_tables (name) VALUES (?1)",
            params![table],
        )?;
        if added > 0 {
            info!(table = %table, "table created");
        }
    }
    tx.commit()?;
    Ok(())
}
