use std::collections::BTreeMap;

use crate::error::{AdminError, Result};
use crate::schema::{FieldType, RelationDef, RelationKind, ResolvedField, Schema, SchemaDescriptor};

/// The set of schemas known to a store.
///
/// Reverse relations are derived from the foreign-key and one-to-one fields
/// of every registered schema: a `ForeignKey` from `address.owner` to
/// `person` shows up on `person` as the one-to-many relation `address_set`
/// (or the field's `related_name`), a `OneToOne` as the one-to-one relation
/// `address`.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    schemas: BTreeMap<String, Schema>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            schemas: BTreeMap::new(),
        }
    }

    pub fn register(mut self, schema: Schema) -> Self {
        self.schemas.insert(schema.name.clone(), schema);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }

    /// Check identifiers and that every link points at a registered schema.
    pub fn validate(&self) -> Result<()> {
        for schema in self.schemas.values() {
            check_identifier(&schema.name)?;
            for field in &schema.fields {
                check_identifier(&field.name)?;
                if let Some(target) = field.field_type.target()
                    && !self.schemas.contains_key(target)
                {
                    return Err(AdminError::UnknownSchema(target.to_string()));
                }
            }
            for relation in &schema.many_to_many {
                check_identifier(&relation.name)?;
                if schema.get_field(&relation.name).is_some() {
                    return Err(AdminError::Configuration(format!(
                        "{}.{} is declared both as a field and a relation",
                        schema.name, relation.name
                    )));
                }
                if !self.schemas.contains_key(&relation.target) {
                    return Err(AdminError::UnknownSchema(relation.target.clone()));
                }
            }
        }
        for schema in self.schemas.values() {
            self.check_accessors(schema)?;
        }
        Ok(())
    }

    /// Every field, many-to-many relation and reverse accessor of `schema`
    /// must have its own name. Two links from one schema to the same target
    /// need distinct `related_name`s.
    fn check_accessors(&self, schema: &Schema) -> Result<()> {
        let mut owners: BTreeMap<String, String> = BTreeMap::new();
        let mut claim = |name: &str, owner: String| match owners.get(name) {
            Some(previous) => Err(AdminError::Configuration(format!(
                "{}.{} is claimed by both {} and {}",
                schema.name, name, previous, owner
            ))),
            None => {
                owners.insert(name.to_string(), owner);
                Ok(())
            }
        };

        for field in &schema.fields {
            claim(&field.name, format!("field {}.{}", schema.name, field.name))?;
        }
        for relation in &schema.many_to_many {
            claim(&relation.name, format!("relation {}.{}", schema.name, relation.name))?;
        }
        let reverse = self.reverse_relations(&schema.name);
        for relation in &reverse {
            let remote = relation.remote_field.as_deref().unwrap_or_default();
            claim(
                &relation.name,
                format!("reverse accessor of {}.{}", relation.target, remote),
            )?;
        }
        Ok(())
    }

    fn reverse_relations(&self, target: &str) -> Vec<RelationDef> {
        let mut relations = Vec::new();
        for schema in self.schemas.values() {
            for field in &schema.fields {
                let kind = match &field.field_type {
                    FieldType::ForeignKey { to, .. } if to == target => {
                        RelationKind::OneToMany
                    }
                    FieldType::OneToOne { to, .. } if to == target => {
                        RelationKind::OneToOne
                    }
                    _ => continue,
                };
                let accessor = match (&field.related_name, kind) {
                    (Some(name), _) => name.clone(),
                    (None, RelationKind::OneToOne) => schema.name.clone(),
                    (None, _) => format!("{}_set", schema.name),
                };
                relations.push(RelationDef::reverse(&accessor, kind, &schema.name, &field.name));
            }
        }
        relations
    }
}

fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AdminError::Configuration(format!(
            "Invalid identifier: {:?}",
            name
        )))
    }
}

impl SchemaDescriptor for Registry {
    fn schema(&self, name: &str) -> Result<&Schema> {
        self.schemas
            .get(name)
            .ok_or_else(|| AdminError::UnknownSchema(name.to_string()))
    }

    fn resolve_field(&self, schema: &str, path: &str) -> Result<ResolvedField> {
        let not_found = || AdminError::FieldNotFound {
            schema: schema.to_string(),
            path: path.to_string(),
        };

        let segments: Vec<&str> = path.split('.').collect();
        let (last, leading) = segments.split_last().ok_or_else(not_found)?;

        let mut current = self.schema(schema)?;
        let mut hops = Vec::with_capacity(leading.len());
        for segment in leading {
            let hop = current.get_field(segment).ok_or_else(not_found)?;
            let target = hop
                .field_type
                .target()
                .ok_or_else(|| AdminError::TypeNotSupported {
                    name: format!("{}.{}", current.name, segment),
                    expected: "foreign key".to_string(),
                })?;
            hops.push(hop.clone());
            current = self.schema(target)?;
        }

        let field = current.get_field(last).ok_or_else(not_found)?;
        Ok(ResolvedField {
            hops,
            field: field.clone(),
            owner: current.name.clone(),
        })
    }

    fn list_relations(&self, schema: &str, kind: RelationKind) -> Result<Vec<RelationDef>> {
        let owner = self.schema(schema)?;
        let relations = match kind {
            RelationKind::ManyToMany => owner.many_to_many.clone(),
            _ => self
                .reverse_relations(schema)
                .into_iter()
                .filter(|r| r.kind == kind)
                .collect(),
        };
        Ok(relations)
    }
}
