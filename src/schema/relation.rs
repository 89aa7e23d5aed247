use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    ManyToMany,
    /// Reverse side of a one-to-one field declared on another schema.
    OneToOne,
    /// Reverse side of a foreign key declared on another schema.
    OneToMany,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::ManyToMany => write!(f, "many-to-many"),
            RelationKind::OneToOne => write!(f, "one-to-one"),
            RelationKind::OneToMany => write!(f, "one-to-many"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    /// Accessor name on the owning schema.
    pub name: String,
    pub kind: RelationKind,
    /// Schema of the records on the other side.
    pub target: String,
    /// For reverse relations, the field on `target` that points back.
    pub remote_field: Option<String>,
    /// For many-to-many relations, the association table.
    pub join_table: Option<String>,
}

impl RelationDef {
    pub fn many_to_many(owner: &str, name: &str, target: &str) -> RelationDef {
        RelationDef {
            name: name.to_string(),
            kind: RelationKind::ManyToMany,
            target: target.to_string(),
            remote_field: None,
            join_table: Some(format!("{}_{}", owner, name)),
        }
    }

    pub fn reverse(name: &str, kind: RelationKind, target: &str, remote_field: &str) -> RelationDef {
        RelationDef {
            name: name.to_string(),
            kind,
            target: target.to_string(),
            remote_field: Some(remote_field.to_string()),
            join_table: None,
        }
    }

    pub fn is_reverse(&self) -> bool {
        matches!(self.kind, RelationKind::OneToOne | RelationKind::OneToMany)
    }
}
