use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::{Type, Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::str::FromStr;

use crate::db::schema::{JOIN_SOURCE, JOIN_TARGET};
use crate::error::{AdminError, Result};
use crate::record::Record;
use crate::schema::{FieldType, PK_FIELD, RelationDef, Registry, Schema, SchemaDescriptor};
use crate::value::Value;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const NAIVE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

fn conversion_error(idx: usize, ty: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, message.into())
}

fn text_at(idx: usize, value: ValueRef) -> rusqlite::Result<String> {
    match value {
        ValueRef::Text(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        other => Err(conversion_error(
            idx,
            other.data_type(),
            "expected TEXT".to_string(),
        )),
    }
}

/// Decode a stored column according to the field's declared type.
fn from_sql_value(field_type: &FieldType, idx: usize, value: ValueRef) -> rusqlite::Result<Value> {
    if let ValueRef::Null = value {
        return Ok(Value::Null);
    }

    let decoded = match field_type {
        FieldType::Boolean | FieldType::NullBoolean => match value {
            ValueRef::Integer(i) => Value::Bool(i != 0),
            other => Value::Bool(text_at(idx, other)? == "1"),
        },
        FieldType::Decimal | FieldType::Currency => {
            let text = match value {
                ValueRef::Integer(i) => i.to_string(),
                ValueRef::Real(f) => f.to_string(),
                other => text_at(idx, other)?,
            };
            let decimal = BigDecimal::from_str(&text)
                .map_err(|e| conversion_error(idx, Type::Text, e.to_string()))?;
            Value::Decimal(decimal)
        }
        FieldType::Date => {
            let text = text_at(idx, value)?;
            let date = NaiveDate::parse_from_str(&text, DATE_FORMAT)
                .map_err(|e| conversion_error(idx, Type::Text, e.to_string()))?;
            Value::Date(date)
        }
        FieldType::Time => {
            let text = text_at(idx, value)?;
            let time = NaiveTime::parse_from_str(&text, TIME_FORMAT)
                .map_err(|e| conversion_error(idx, Type::Text, e.to_string()))?;
            Value::Time(time)
        }
        FieldType::DateTime => {
            let text = text_at(idx, value)?;
            // Zone aware values are stored as RFC 3339, naive ones without offset
            if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
                Value::DateTime(dt)
            } else {
                let naive = NaiveDateTime::parse_from_str(&text, NAIVE_DATETIME_FORMAT)
                    .map_err(|e| conversion_error(idx, Type::Text, e.to_string()))?;
                Value::NaiveDateTime(naive)
            }
        }
        _ => match value {
            ValueRef::Integer(i) => Value::Int(i),
            ValueRef::Real(f) => Value::Text(f.to_string()),
            ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
            ValueRef::Null => Value::Null,
        },
    };
    Ok(decoded)
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Decimal(d) => SqlValue::Text(d.to_string()),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Date(d) => SqlValue::Text(d.format(DATE_FORMAT).to_string()),
        Value::Time(t) => SqlValue::Text(t.format(TIME_FORMAT).to_string()),
        Value::NaiveDateTime(dt) => SqlValue::Text(dt.format(NAIVE_DATETIME_FORMAT).to_string()),
        Value::DateTime(dt) => SqlValue::Text(dt.to_rfc3339()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
        Value::List(items) => {
            let items: Vec<String> = items.iter().map(|v| v.to_string()).collect();
            SqlValue::Text(serde_json::to_string(&items).unwrap_or_default())
        }
    }
}

/// Map a database row to a Record. Expects the schema's columns in
/// declaration order, primary key first.
fn map_row_to_record(schema: &Schema, row: &Row) -> rusqlite::Result<Record> {
    let pk: i64 = row.get(0)?;
    let mut record = Record::new(&schema.name, pk);
    for (idx, field) in schema.fields.iter().enumerate().skip(1) {
        let value = from_sql_value(&field.field_type, idx, row.get_ref(idx)?)?;
        record.set(&field.name, value);
    }
    Ok(record)
}

fn column_list(schema: &Schema, alias: &str) -> String {
    schema
        .fields
        .iter()
        .map(|f| format!("{}.\"{}\"", alias, f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_table(relation: &RelationDef) -> Result<&str> {
    relation.join_table.as_deref().ok_or_else(|| AdminError::TypeNotSupported {
        name: relation.name.clone(),
        expected: "many-to-many".to_string(),
    })
}

pub struct Repository<'a> {
    conn: &'a Connection,
    registry: &'a Registry,
}

impl<'a> Repository<'a> {
    pub fn new(conn: &'a Connection, registry: &'a Registry) -> Self {
        Repository { conn, registry }
    }

    fn collect(&self, schema: &Schema, sql: &str, args: &[SqlValue]) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            map_row_to_record(schema, row)
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Values for every non-key column of `schema`, taken from `lookup`.
    fn column_values<'v>(
        schema: &Schema,
        lookup: impl Fn(&str) -> Option<&'v Value>,
    ) -> (Vec<String>, Vec<SqlValue>) {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for field in schema.fields.iter().filter(|f| !f.primary_key) {
            columns.push(format!("\"{}\"", field.name));
            values.push(lookup(&field.name).map(to_sql_value).unwrap_or(SqlValue::Null));
        }
        (columns, values)
    }

    pub fn insert(&self, schema: &str, values: &[(&str, Value)]) -> Result<i64> {
        let schema = self.registry.schema(schema)?;
        for (name, _) in values {
            if schema.get_field(name).is_none() || *name == PK_FIELD {
                return Err(AdminError::FieldNotFound {
                    schema: schema.name.clone(),
                    path: name.to_string(),
                });
            }
        }

        let (columns, args) = Self::column_values(schema, |name| {
            values.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
        });
        let placeholders: Vec<String> = (1..=args.len()).map(|i| format!("?{}", i)).collect();

        let sql = if columns.is_empty() {
            format!("INSERT INTO \"{}\" DEFAULT VALUES", schema.name)
        } else {
            format!(
                "INSERT INTO \"{}\" ({}) VALUES ({})",
                schema.name,
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        self.conn.execute(&sql, params_from_iter(args.iter()))?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Insert or overwrite the row keyed by `record.pk`.
    pub fn upsert(&self, record: &Record) -> Result<()> {
        let schema = self.registry.schema(&record.schema)?;
        let (columns, mut args) = Self::column_values(schema, |name| Some(record.get(name)));

        let placeholders: Vec<String> = (2..=args.len() + 1).map(|i| format!("?{}", i)).collect();
        let updates: Vec<String> = columns
            .iter()
            .map(|c| format!("{} = excluded.{}", c, c))
            .collect();
        args.insert(0, SqlValue::Integer(record.pk));

        let sql = if updates.is_empty() {
            format!(
                "INSERT INTO \"{}\" (\"{PK_FIELD}\") VALUES (?1) ON CONFLICT(\"{PK_FIELD}\") DO NOTHING",
                schema.name
            )
        } else {
            format!(
                "INSERT INTO \"{}\" (\"{PK_FIELD}\", {}) VALUES (?1, {})
                 ON CONFLICT(\"{PK_FIELD}\") DO UPDATE SET {}",
                schema.name,
                columns.join(", "),
                placeholders.join(", "),
                updates.join(", ")
            )
        };
        self.conn.execute(&sql, params_from_iter(args.iter()))?;
        Ok(())
    }

    pub fn get_by_id(&self, schema: &str, pk: i64) -> Result<Option<Record>> {
        let schema = self.registry.schema(schema)?;
        let result = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM \"{}\" t WHERE t.\"{PK_FIELD}\" = ?1",
                    column_list(schema, "t"),
                    schema.name
                ),
                params![pk],
                |row| map_row_to_record(schema, row),
            )
            .optional()?;

        Ok(result)
    }

    pub fn load_all(&self, schema: &str) -> Result<Vec<Record>> {
        let schema = self.registry.schema(schema)?;
        let sql = format!(
            "SELECT {} FROM \"{}\" t ORDER BY t.\"{PK_FIELD}\"",
            column_list(schema, "t"),
            schema.name
        );
        self.collect(schema, &sql, &[])
    }

    pub fn count(&self, schema: &str) -> Result<usize> {
        let schema = self.registry.schema(schema)?;
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{}\"", schema.name),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Delete association rows on both sides, then the row itself.
    /// Reverse dependents are left to the foreign-key actions.
    pub fn delete(&self, schema: &str, pk: i64) -> Result<()> {
        let owner = self.registry.schema(schema)?;

        for relation in &owner.many_to_many {
            self.conn.execute(
                &format!(
                    "DELETE FROM \"{}\" WHERE \"{JOIN_SOURCE}\" = ?1",
                    join_table(relation)?
                ),
                params![pk],
            )?;
        }
        for other in self.registry.iter() {
            for relation in other.many_to_many.iter().filter(|r| r.target == owner.name) {
                self.conn.execute(
                    &format!(
                        "DELETE FROM \"{}\" WHERE \"{JOIN_TARGET}\" = ?1",
                        join_table(relation)?
                    ),
                    params![pk],
                )?;
            }
        }

        self.conn.execute(
            &format!("DELETE FROM \"{}\" WHERE \"{PK_FIELD}\" = ?1", owner.name),
            params![pk],
        )?;

        Ok(())
    }

    pub fn load_members(&self, relation: &RelationDef, pk: i64) -> Result<Vec<Record>> {
        let target = self.registry.schema(&relation.target)?;
        let sql = format!(
            "SELECT {} FROM \"{}\" t
             JOIN \"{}\" j ON j.\"{JOIN_TARGET}\" = t.\"{PK_FIELD}\"
             WHERE j.\"{JOIN_SOURCE}\" = ?1
             ORDER BY t.\"{PK_FIELD}\"",
            column_list(target, "t"),
            target.name,
            join_table(relation)?
        );
        self.collect(target, &sql, &[SqlValue::Integer(pk)])
    }

    pub fn add_member(&self, relation: &RelationDef, pk: i64, member_pk: i64) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO \"{}\" (\"{JOIN_SOURCE}\", \"{JOIN_TARGET}\") VALUES (?1, ?2)",
                join_table(relation)?
            ),
            params![pk, member_pk],
        )?;
        Ok(())
    }

    pub fn load_dependents(&self, relation: &RelationDef, pk: i64) -> Result<Vec<Record>> {
        let remote_field = relation
            .remote_field
            .as_deref()
            .ok_or_else(|| AdminError::TypeNotSupported {
                name: relation.name.clone(),
                expected: "reverse relation".to_string(),
            })?;
        let dependent = self.registry.schema(&relation.target)?;
        let sql = format!(
            "SELECT {} FROM \"{}\" t WHERE t.\"{}\" = ?1 ORDER BY t.\"{PK_FIELD}\"",
            column_list(dependent, "t"),
            dependent.name,
            remote_field
        );
        self.collect(dependent, &sql, &[SqlValue::Integer(pk)])
    }
}
