use heck::ToTitleCase;
use std::fmt;

/// What happens to a dependent row when the record it points at is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    SetNull,
}

impl OnDelete {
    pub fn as_sql(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::SetNull => "SET NULL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    AutoId,
    Char,
    Text,
    Integer,
    PositiveInteger,
    SmallInteger,
    BigInteger,
    Decimal,
    Currency,
    Boolean,
    NullBoolean,
    Date,
    DateTime,
    Time,
    Email,
    Url,
    Binary,
    ForeignKey { to: String, on_delete: OnDelete },
    OneToOne { to: String, on_delete: OnDelete },
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl FieldType {
    pub fn foreign_key(to: &str) -> FieldType {
        FieldType::ForeignKey {
            to: to.to_string(),
            on_delete: OnDelete::Cascade,
        }
    }

    pub fn one_to_one(to: &str) -> FieldType {
        FieldType::OneToOne {
            to: to.to_string(),
            on_delete: OnDelete::Cascade,
        }
    }

    /// Stable name used as a format-options key.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::AutoId => "auto",
            FieldType::Char => "char",
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::PositiveInteger => "positive_integer",
            FieldType::SmallInteger => "small_integer",
            FieldType::BigInteger => "big_integer",
            FieldType::Decimal => "decimal",
            FieldType::Currency => "currency",
            FieldType::Boolean => "boolean",
            FieldType::NullBoolean => "null_boolean",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Time => "time",
            FieldType::Email => "email",
            FieldType::Url => "url",
            FieldType::Binary => "binary",
            FieldType::ForeignKey { .. } => "foreign_key",
            FieldType::OneToOne { .. } => "one_to_one",
        }
    }

    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldType::AutoId
            | FieldType::Integer
            | FieldType::PositiveInteger
            | FieldType::SmallInteger
            | FieldType::BigInteger
            | FieldType::Boolean
            | FieldType::NullBoolean
            | FieldType::ForeignKey { .. }
            | FieldType::OneToOne { .. } => "INTEGER",
            FieldType::Binary => "BLOB",
            _ => "TEXT",
        }
    }

    /// Target schema of a foreign-key or one-to-one field.
    pub fn target(&self) -> Option<&str> {
        match self {
            FieldType::ForeignKey { to, .. } | FieldType::OneToOne { to, .. } => Some(to),
            _ => None,
        }
    }

    pub fn on_delete(&self) -> Option<OnDelete> {
        match self {
            FieldType::ForeignKey { on_delete, .. } | FieldType::OneToOne { on_delete, .. } => {
                Some(*on_delete)
            }
            _ => None,
        }
    }

    pub fn is_link(&self) -> bool {
        self.target().is_some()
    }
}

/// A scalar column of a schema. Foreign keys are scalar too: the stored
/// value is the primary key of the referenced record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub verbose_name: String,
    pub field_type: FieldType,
    pub primary_key: bool,
    pub null: bool,
    /// Accessor name of the reverse relation created on the target schema.
    pub related_name: Option<String>,
    /// `(stored value, display label)` pairs.
    pub choices: Vec<(String, String)>,
}

impl FieldDef {
    pub fn new(name: &str, field_type: FieldType) -> FieldDef {
        FieldDef {
            name: name.to_string(),
            verbose_name: name.to_title_case(),
            field_type,
            primary_key: false,
            null: true,
            related_name: None,
            choices: Vec::new(),
        }
    }

    pub fn verbose_name(mut self, verbose_name: &str) -> FieldDef {
        self.verbose_name = verbose_name.to_string();
        self
    }

    pub fn primary_key(mut self) -> FieldDef {
        self.primary_key = true;
        self.null = false;
        self
    }

    pub fn required(mut self) -> FieldDef {
        self.null = false;
        self
    }

    pub fn related_name(mut self, related_name: &str) -> FieldDef {
        self.related_name = Some(related_name.to_string());
        self
    }

    pub fn choices(mut self, choices: &[(&str, &str)]) -> FieldDef {
        self.choices = choices
            .iter()
            .map(|(value, label)| (value.to_string(), label.to_string()))
            .collect();
        self
    }

    pub fn choice_label(&self, stored: &str) -> Option<&str> {
        self.choices
            .iter()
            .find(|(value, _)| value == stored)
            .map(|(_, label)| label.as_str())
    }
}
