//! Entity types and their field transforms
//!
//! Each entity type declares which source columns are numeric, which hold
//! ids of another service, which carry comma-separated natural keys of
//! another entity, and which column (if any) is its own natural key.
//! [`EntitySchema::transform`] turns a raw source row into the JSON payload a
//! service expects.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use seed_common::{RawRecord, SeedError};

use crate::resolver::ReferenceResolver;

/// Category of record pushed to one remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Students,
    Instructors,
    Courses,
    Enrollments,
}

impl EntityKind {
    /// Ingestion order for tabular sources. An entity referenced by natural
    /// key must appear before every entity that references it.
    pub const SOURCE_ORDER: [EntityKind; 4] = [
        EntityKind::Students,
        EntityKind::Instructors,
        EntityKind::Courses,
        EntityKind::Enrollments,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Students => "students",
            EntityKind::Instructors => "instructors",
            EntityKind::Courses => "courses",
            EntityKind::Enrollments => "enrollments",
        }
    }

    /// Object key of the tabular source in the blob store
    pub fn source_file(self) -> &'static str {
        match self {
            EntityKind::Students => "students.csv",
            EntityKind::Instructors => "instructores.csv",
            EntityKind::Courses => "cursos.csv",
            EntityKind::Enrollments => "inscripciones.csv",
        }
    }

    /// Path segment of the service collection, relative to the base URL
    pub fn collection_path(self) -> &'static str {
        match self {
            EntityKind::Students => "estudiantes",
            EntityKind::Instructors => "instructores",
            EntityKind::Courses => "cursos",
            EntityKind::Enrollments => "inscripciones",
        }
    }

    pub fn schema(self) -> &'static EntitySchema {
        match self {
            EntityKind::Students => &STUDENTS,
            EntityKind::Instructors => &INSTRUCTORS,
            EntityKind::Courses => &COURSES,
            EntityKind::Enrollments => &ENROLLMENTS,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = SeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "students" | "estudiantes" => Ok(EntityKind::Students),
            "instructors" | "instructores" => Ok(EntityKind::Instructors),
            "courses" | "cursos" => Ok(EntityKind::Courses),
            "enrollments" | "inscripciones" => Ok(EntityKind::Enrollments),
            other => Err(SeedError::config(format!("Unknown entity type: {}", other))),
        }
    }
}

/// A column holding comma-separated natural keys of another entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceField {
    pub field: &'static str,
    pub target: EntityKind,
}

/// Field-level shape of one entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySchema {
    /// Columns coerced to integers; malformed values become 0
    pub numeric_fields: &'static [&'static str],
    /// Columns holding remote ids, kept as integers or as strings
    pub id_fields: &'static [&'static str],
    /// Columns rewritten from natural keys to remote ids
    pub reference_fields: &'static [ReferenceField],
    /// Column whose value other entities use to refer to this one
    pub natural_key: Option<&'static str>,
}

static STUDENTS: EntitySchema = EntitySchema {
    numeric_fields: &["edad"],
    id_fields: &[],
    reference_fields: &[],
    natural_key: None,
};

static INSTRUCTORS: EntitySchema = EntitySchema {
    numeric_fields: &["aniosExperiencia"],
    id_fields: &[],
    reference_fields: &[],
    natural_key: Some("nombre"),
};

static COURSES: EntitySchema = EntitySchema {
    numeric_fields: &["duration", "precio"],
    id_fields: &[],
    reference_fields: &[ReferenceField {
        field: "instructores",
        target: EntityKind::Instructors,
    }],
    natural_key: None,
};

static ENROLLMENTS: EntitySchema = EntitySchema {
    numeric_fields: &[],
    id_fields: &["estudianteId", "cursoId"],
    reference_fields: &[],
    natural_key: None,
};

/// Parse an integer column, falling back to 0 for anything malformed.
pub fn coerce_integer(raw: &str) -> i64 {
    raw.trim().parse().unwrap_or(0)
}

/// Parse an id column: integers stay integers, other non-blank values are
/// kept as strings, blank values become 0.
pub fn coerce_identifier(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed.parse::<i64>() {
        Ok(id) => Value::from(id),
        Err(_) if trimmed.is_empty() => Value::from(0),
        Err(_) => Value::String(trimmed.to_string()),
    }
}

impl EntitySchema {
    /// Natural key of a row, if this entity type has one and the row carries it
    pub fn natural_key_of<'a>(&self, record: &'a RawRecord) -> Option<&'a str> {
        self.natural_key
            .and_then(|field| record.get(field))
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Build the service payload for a raw row.
    ///
    /// Reference columns are resolved against `resolver` at call time; keys
    /// it does not know yet are dropped from the resulting id list.
    pub async fn transform(
        &self,
        record: RawRecord,
        resolver: &ReferenceResolver,
    ) -> Map<String, Value> {
        let mut payload = Map::with_capacity(record.len());

        for (field, raw) in record {
            let value = if self.numeric_fields.contains(&field.as_str()) {
                Value::from(coerce_integer(&raw))
            } else if self.id_fields.contains(&field.as_str()) {
                coerce_identifier(&raw)
            } else if self.reference_fields.iter().any(|r| r.field == field) {
                let ids = resolver.resolve_many(&raw).await;
                Value::Array(ids.iter().map(|id| id.to_json()).collect())
            } else {
                Value::String(raw)
            };
            payload.insert(field, value);
        }

        payload
    }
}
