use crate::error::{AdminError, Result};
use crate::record::Record;
use crate::schema::{FieldDef, ResolvedField};
use crate::store::Store;
use crate::value::Value;

/// Human string of a record: its display field, or `"<verbose name> object (<pk>)"`.
pub fn display_string<S: Store + ?Sized>(store: &S, record: &Record) -> Result<String> {
    let schema = store.schemas().schema(&record.schema)?;
    match &schema.display_field {
        Some(field) if !record.get(field).is_null() => Ok(record.get(field).to_string()),
        _ => Ok(format!("{} object ({})", schema.verbose_name, record.pk)),
    }
}

/// Follow the link fields in `hops` starting at `record`.
///
/// Returns `Ok(None)` when a link along the way is unset and
/// `ObjectNotFound` when a link points at a record that does not exist.
pub fn follow<S: Store + ?Sized>(
    store: &S,
    record: &Record,
    hops: &[FieldDef],
) -> Result<Option<Record>> {
    let mut current = record.clone();
    for hop in hops {
        let Some(pk) = current.link(&hop.name) else {
            return Ok(None);
        };
        let target = hop
            .field_type
            .target()
            .ok_or_else(|| AdminError::TypeNotSupported {
                name: hop.name.clone(),
                expected: "foreign key".to_string(),
            })?;
        current = store
            .fetch(target, pk)?
            .ok_or_else(|| AdminError::ObjectNotFound {
                schema: current.schema.clone(),
                accessor: hop.name.clone(),
            })?;
    }
    Ok(Some(current))
}

/// Value addressed by `path` on `record`.
///
/// With `use_display`, fields with choices yield their label and link
/// fields yield the related record's display string.
pub fn field_value<S: Store + ?Sized>(
    store: &S,
    record: &Record,
    path: &str,
    use_display: bool,
) -> Result<Value> {
    let resolved = store.schemas().resolve_field(&record.schema, path)?;
    resolved_value(store, record, &resolved, use_display)
}

pub fn resolved_value<S: Store + ?Sized>(
    store: &S,
    record: &Record,
    resolved: &ResolvedField,
    use_display: bool,
) -> Result<Value> {
    let Some(owner) = follow(store, record, &resolved.hops)? else {
        return Ok(Value::Null);
    };
    let raw = owner.get(&resolved.field.name).clone();
    if !use_display || raw.is_null() {
        return Ok(raw);
    }

    let field = &resolved.field;
    if !field.choices.is_empty() {
        let stored = raw.to_string();
        return Ok(field
            .choice_label(&stored)
            .map(Value::from)
            .unwrap_or(raw));
    }
    if let (Some(target), Some(pk)) = (field.field_type.target(), raw.as_i64()) {
        let related = store
            .fetch(target, pk)?
            .ok_or_else(|| AdminError::ObjectNotFound {
                schema: owner.schema.clone(),
                accessor: field.name.clone(),
            })?;
        return Ok(Value::Text(display_string(store, &related)?));
    }
    Ok(raw)
}
