use std::collections::BTreeMap;

use crate::value::Value;

/// An in-memory instance of a schema. Cloning produces a detached copy
/// with the same primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub schema: String,
    pub pk: i64,
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(schema: &str, pk: i64) -> Self {
        Record {
            schema: schema.to_string(),
            pk,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Value of a scalar field; unset fields read as `Value::Null`.
    pub fn get(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(field).unwrap_or(&NULL)
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.values.insert(field.to_string(), value.into());
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Primary key stored in a link field, if set.
    pub fn link(&self, field: &str) -> Option<i64> {
        self.get(field).as_i64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_field_is_null() {
        let record = Record::new("person", 1);
        assert!(record.get("name").is_null());
    }

    #[test]
    fn test_clone_is_detached() {
        let master = Record::new("person", 1).with("name", "Old");
        let mut result = master.clone();
        result.set("name", "New");
        assert_eq!(master.get("name"), &Value::from("Old"));
        assert_eq!(result.get("name"), &Value::from("New"));
        assert_eq!(result.pk, master.pk);
    }

    #[test]
    fn test_link() {
        let record = Record::new("person", 1).with("country", 7i64);
        assert_eq!(record.link("country"), Some(7));
        assert_eq!(record.link("name"), None);
    }
}
