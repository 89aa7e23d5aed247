pub mod field;
pub mod registry;
pub mod relation;

use heck::ToTitleCase;

pub use field::{FieldDef, FieldType, OnDelete};
pub use registry::Registry;
pub use relation::{RelationDef, RelationKind};

use crate::error::Result;

pub const PK_FIELD: &str = "id";

/// Descriptor of a user-defined record type.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub name: String,
    pub verbose_name: String,
    pub verbose_name_plural: String,
    pub fields: Vec<FieldDef>,
    pub many_to_many: Vec<RelationDef>,
    /// Field whose value is used as the human string of a record.
    pub display_field: Option<String>,
}

impl Schema {
    /// A schema with an auto-incrementing `id` primary key.
    pub fn new(name: &str) -> Schema {
        let verbose_name = name.to_title_case().to_lowercase();
        let verbose_name_plural = pluralizer::pluralize(&verbose_name, 2, false);
        Schema {
            name: name.to_string(),
            verbose_name,
            verbose_name_plural,
            fields: vec![
                FieldDef::new(PK_FIELD, FieldType::AutoId)
                    .verbose_name("ID")
                    .primary_key(),
            ],
            many_to_many: Vec::new(),
            display_field: None,
        }
    }

    pub fn with_field(mut self, field: FieldDef) -> Schema {
        self.fields.push(field);
        self
    }

    pub fn with_many_to_many(mut self, name: &str, target: &str) -> Schema {
        let relation = RelationDef::many_to_many(&self.name, name, target);
        self.many_to_many.push(relation);
        self
    }

    pub fn with_verbose_name(mut self, singular: &str, plural: &str) -> Schema {
        self.verbose_name = singular.to_string();
        self.verbose_name_plural = plural.to_string();
        self
    }

    pub fn with_display_field(mut self, name: &str) -> Schema {
        self.display_field = Some(name.to_string());
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn pk_field(&self) -> &FieldDef {
        // Schema::new always installs the key as the first field.
        &self.fields[0]
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Scalar fields a merge copies when no explicit selection is given.
    pub fn mergeable_field_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| !f.primary_key)
            .map(|f| f.name.clone())
            .collect()
    }
}

/// A dotted selector resolved against the schemas it traverses.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    /// Link fields followed before reaching `field`, in order.
    pub hops: Vec<FieldDef>,
    pub field: FieldDef,
    /// Schema declaring `field`.
    pub owner: String,
}

impl ResolvedField {
    pub fn is_nested(&self) -> bool {
        !self.hops.is_empty()
    }
}

/// Schema introspection required from a storage collaborator.
pub trait SchemaDescriptor {
    fn schema(&self, name: &str) -> Result<&Schema>;

    /// Resolve a plain or dotted field selector starting at `schema`.
    fn resolve_field(&self, schema: &str, path: &str) -> Result<ResolvedField>;

    /// Every relation of `kind` reachable from `schema`.
    fn list_relations(&self, schema: &str, kind: RelationKind) -> Result<Vec<RelationDef>>;

    /// Look up a relation by accessor name, whatever its kind.
    fn relation(&self, schema: &str, name: &str) -> Result<Option<RelationDef>> {
        for kind in [
            RelationKind::ManyToMany,
            RelationKind::OneToOne,
            RelationKind::OneToMany,
        ] {
            if let Some(found) = self
                .list_relations(schema, kind)?
                .into_iter()
                .find(|r| r.name == name)
            {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}
