use tracing::{debug, info, warn};

use crate::display;
use crate::error::{AdminError, Result};
use crate::merge::{MergeRequest, Selection};
use crate::record::Record;
use crate::schema::{RelationDef, RelationKind, Schema, SchemaDescriptor};
use crate::store::Store;

/// Many-to-many members of `other` to add on the surviving record.
struct Transfer {
    relation: RelationDef,
    members: Vec<Record>,
}

/// Dependents of `other` whose `remote_field` gets pointed at master.
struct Repoint {
    remote_field: String,
    dependents: Vec<Record>,
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(names.len());
    for name in names {
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

fn selected_names(
    descriptor: &dyn SchemaDescriptor,
    schema: &Schema,
    selection: &Selection,
    all_kinds: &[RelationKind],
) -> Result<Vec<String>> {
    let names = match selection {
        Selection::None => Vec::new(),
        Selection::Only(names) => names.clone(),
        Selection::All => {
            let mut names = Vec::new();
            for kind in all_kinds {
                for relation in descriptor.list_relations(&schema.name, *kind)? {
                    names.push(relation.name);
                }
            }
            names
        }
    };
    Ok(dedup(names))
}

/// Look up relation `name` and check it is one of `kinds`.
fn relation_of_kind(
    descriptor: &dyn SchemaDescriptor,
    schema: &Schema,
    name: &str,
    kinds: &[RelationKind],
    expected: &str,
) -> Result<RelationDef> {
    let not_supported = || AdminError::TypeNotSupported {
        name: name.to_string(),
        expected: expected.to_string(),
    };
    match descriptor.relation(&schema.name, name)? {
        Some(relation) if kinds.contains(&relation.kind) => Ok(relation),
        Some(_) => Err(not_supported()),
        None if schema.get_field(name).is_some() => Err(not_supported()),
        None => Err(AdminError::FieldNotFound {
            schema: schema.name.clone(),
            path: name.to_string(),
        }),
    }
}

fn one_to_one_dependent<S: Store>(store: &S, record: &Record, relation: &RelationDef) -> Result<Record> {
    store
        .dependents(record, relation)?
        .into_iter()
        .next()
        .ok_or_else(|| AdminError::ObjectNotFound {
            schema: record.schema.clone(),
            accessor: relation.name.clone(),
        })
}

/// Copy the selected scalar fields of `other` onto `result`. Values reached
/// through dotted selectors land on the related records of `result`, which
/// are returned for saving.
fn copy_fields<S: Store>(
    store: &S,
    schema: &Schema,
    result: &mut Record,
    other: &Record,
    names: &[String],
) -> Result<Vec<Record>> {
    let descriptor = store.schemas();
    let mut nested: Vec<Record> = Vec::new();

    for name in names {
        let resolved = descriptor.resolve_field(&schema.name, name)?;
        if resolved.field.primary_key {
            continue;
        }
        if !resolved.is_nested() {
            result.set(name, other.get(name).clone());
            continue;
        }

        let Some(source) = display::follow(store, other, &resolved.hops)? else {
            debug!(field = %name, "other has no related record, nothing to copy");
            continue;
        };
        let Some(target) = display::follow(store, result, &resolved.hops)? else {
            warn!(field = %name, pk = result.pk, "master has no related record, skipping field");
            continue;
        };

        let value = source.get(&resolved.field.name).clone();
        match nested
            .iter_mut()
            .find(|r| r.schema == target.schema && r.pk == target.pk)
        {
            Some(existing) => existing.set(&resolved.field.name, value),
            None => {
                let mut target = target;
                target.set(&resolved.field.name, value);
                nested.push(target);
            }
        }
    }

    Ok(nested)
}

/// Merge `other` into `master`.
///
/// Returns the surviving record: a copy of `master` carrying the selected
/// field values of `other`. With `commit`, dependents of the selected reverse
/// relations are pointed at `master`, `other` is deleted, the result is saved
/// over `master` and the selected many-to-many members of `other` are added to
/// it, all in one atomic scope. Without `commit` nothing is written.
///
/// Relations that are not selected stay with `other` and follow the store's
/// delete rules.
pub fn merge<S: Store>(
    store: &S,
    master: &Record,
    other: &Record,
    request: &MergeRequest,
) -> Result<Record> {
    if master.schema != other.schema {
        return Err(AdminError::Configuration(format!(
            "Cannot merge {} into {}",
            other.schema, master.schema
        )));
    }
    if !request.many_to_many.is_empty() && !request.commit {
        return Err(AdminError::Configuration(
            "Cannot save many-to-many relations without commit".to_string(),
        ));
    }
    if request.commit && master.pk == other.pk {
        return Err(AdminError::Configuration(format!(
            "Cannot merge {} {} into itself",
            master.schema, master.pk
        )));
    }

    let descriptor = store.schemas();
    let schema = descriptor.schema(&master.schema)?;

    let field_names = match &request.fields {
        Selection::None => Vec::new(),
        Selection::Only(names) => dedup(names.clone()),
        Selection::All => schema.mergeable_field_names(),
    };
    let many_to_many_names = selected_names(
        descriptor,
        schema,
        &request.many_to_many,
        &[RelationKind::ManyToMany],
    )?;
    let reverse_names = selected_names(
        descriptor,
        schema,
        &request.reverse_relations,
        &[RelationKind::OneToOne, RelationKind::OneToMany],
    )?;

    debug!(
        schema = %schema.name,
        master = master.pk,
        other = other.pk,
        fields = field_names.len(),
        many_to_many = many_to_many_names.len(),
        reverse = reverse_names.len(),
        "merging records"
    );

    let mut result = master.clone();
    let nested = copy_fields(store, schema, &mut result, other, &field_names)?;

    let mut transfers = Vec::with_capacity(many_to_many_names.len());
    for name in &many_to_many_names {
        let relation = relation_of_kind(
            descriptor,
            schema,
            name,
            &[RelationKind::ManyToMany],
            "many-to-many",
        )?;
        let members = store.related(other, &relation)?;
        transfers.push(Transfer { relation, members });
    }

    let mut repoints = Vec::with_capacity(reverse_names.len());
    for name in &reverse_names {
        let relation = relation_of_kind(
            descriptor,
            schema,
            name,
            &[RelationKind::OneToOne, RelationKind::OneToMany],
            "reverse relation",
        )?;
        let remote_field = relation
            .remote_field
            .clone()
            .ok_or_else(|| AdminError::TypeNotSupported {
                name: name.clone(),
                expected: "reverse relation".to_string(),
            })?;

        let dependents = if relation.kind == RelationKind::OneToOne {
            match one_to_one_dependent(store, other, &relation) {
                Ok(dependent) => vec![dependent],
                Err(AdminError::ObjectNotFound { .. }) => {
                    warn!(relation = %name, other = other.pk, "no one-to-one dependent to transfer");
                    Vec::new()
                }
                Err(e) => return Err(e),
            }
        } else {
            store.dependents(other, &relation)?
        };
        repoints.push(Repoint {
            remote_field,
            dependents,
        });
    }

    if !request.commit {
        return Ok(result);
    }

    store.atomic(|store| {
        for repoint in &repoints {
            for dependent in &repoint.dependents {
                let mut dependent = dependent.clone();
                dependent.set(&repoint.remote_field, master.pk);
                store.save(&dependent)?;
            }
        }

        store.delete(other)?;
        store.save(&result)?;
        for record in &nested {
            store.save(record)?;
        }

        for transfer in &transfers {
            for member in &transfer.members {
                store.add_related(&result, &transfer.relation, member)?;
            }
        }
        Ok(())
    })?;

    info!(
        schema = %schema.name,
        master = master.pk,
        other = other.pk,
        repointed = repoints.iter().map(|r| r.dependents.len()).sum::<usize>(),
        transferred = transfers.iter().map(|t| t.members.len()).sum::<usize>(),
        "merge committed"
    );

    Ok(result)
}

/// Load both records by key and merge them.
pub fn merge_by_pk<S: Store>(
    store: &S,
    schema: &str,
    master_pk: i64,
    other_pk: i64,
    request: &MergeRequest,
) -> Result<Record> {
    let master = store.get(schema, master_pk)?;
    let other = store.get(schema, other_pk)?;
    merge(store, &master, &other, request)
}
