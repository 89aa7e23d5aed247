//! Shared schemas and seed data for unit tests.

use std::io::{Cursor, Read};

use crate::db::SqliteStore;
use crate::record::Record;
use crate::schema::{FieldDef, FieldType, OnDelete, Registry, Schema};
use crate::store::Store;
use crate::value::Value;

/// country <- person -> tags, person <- address (many), person <- profile (one)
pub fn contacts_registry() -> Registry {
    Registry::new()
        .register(
            Schema::new("country")
                .with_verbose_name("country", "countries")
                .with_field(FieldDef::new("name", FieldType::Char))
                .with_display_field("name"),
        )
        .register(
            Schema::new("tag")
                .with_field(FieldDef::new("label", FieldType::Char))
                .with_display_field("label"),
        )
        .register(
            Schema::new("person")
                .with_field(FieldDef::new("name", FieldType::Char).required())
                .with_field(FieldDef::new("email", FieldType::Email))
                .with_field(FieldDef::new("website", FieldType::Url))
                .with_field(FieldDef::new("birth_date", FieldType::Date))
                .with_field(FieldDef::new("created", FieldType::DateTime))
                .with_field(FieldDef::new("wake_up", FieldType::Time))
                .with_field(FieldDef::new("active", FieldType::Boolean))
                .with_field(FieldDef::new("score", FieldType::Integer))
                .with_field(FieldDef::new("balance", FieldType::Currency))
                .with_field(
                    FieldDef::new("status", FieldType::Char)
                        .choices(&[("a", "Active"), ("i", "Inactive")]),
                )
                .with_field(FieldDef::new(
                    "country",
                    FieldType::ForeignKey {
                        to: "country".to_string(),
                        on_delete: OnDelete::SetNull,
                    },
                ))
                .with_many_to_many("tags", "tag")
                .with_display_field("name"),
        )
        .register(
            Schema::new("address")
                .with_verbose_name("address", "addresses")
                .with_field(
                    FieldDef::new("owner", FieldType::foreign_key("person"))
                        .related_name("addresses"),
                )
                .with_field(FieldDef::new("street", FieldType::Char))
                .with_field(FieldDef::new("city", FieldType::Char)),
        )
        .register(
            Schema::new("profile")
                .with_field(FieldDef::new("person", FieldType::one_to_one("person")))
                .with_field(FieldDef::new("bio", FieldType::Text)),
        )
}

pub fn contacts_store() -> SqliteStore {
    SqliteStore::open_in_memory(contacts_registry()).unwrap()
}

pub fn person(store: &SqliteStore, name: &str) -> Record {
    store.create("person", &[("name", Value::from(name))]).unwrap()
}

/// Text of one part of an Open XML package, e.g. `xl/worksheets/sheet1.xml`.
pub fn xlsx_part(bytes: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut part = archive.by_name(name).unwrap();
    let mut text = String::new();
    part.read_to_string(&mut text).unwrap();
    text
}
