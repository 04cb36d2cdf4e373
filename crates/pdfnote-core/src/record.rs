//! Annotation records and their identifiers.

use crate::shapes::Shape;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Identifier of an annotation record.
///
/// Records created locally carry a `Temporary` id until the backend confirms
/// them. On the wire a temporary id is sent as `null`; persisted ids are
/// strings (numeric server ids are accepted and stringified).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnnotationId {
    Temporary(u64),
    Persisted(String),
}

impl AnnotationId {
    pub fn persisted(id: impl Into<String>) -> Self {
        Self::Persisted(id.into())
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    /// The backend id, if this record has one.
    pub fn as_persisted(&self) -> Option<&str> {
        match self {
            Self::Persisted(id) => Some(id),
            Self::Temporary(_) => None,
        }
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temporary(n) => write!(f, "temp-{n}"),
            Self::Persisted(id) => f.write_str(id),
        }
    }
}

impl Serialize for AnnotationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Persisted(id) => serializer.serialize_str(id),
            Self::Temporary(_) => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for AnnotationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Text(String),
            Number(serde_json::Number),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Text(s) if s.is_empty() => Err(serde::de::Error::custom("empty annotation id")),
            Wire::Text(s) => Ok(Self::Persisted(s)),
            Wire::Number(n) => Ok(Self::Persisted(n.to_string())),
        }
    }
}

/// Opaque serialized shape description.
///
/// Only the shape layer and the export path look inside, via [`Geometry::decode`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Geometry(pub serde_json::Value);

impl Geometry {
    pub fn decode(&self) -> Result<Shape, serde_json::Error> {
        Shape::deserialize(&self.0)
    }
}

impl From<&Shape> for Geometry {
    fn from(shape: &Shape) -> Self {
        match serde_json::to_value(shape) {
            Ok(value) => Self(value),
            Err(e) => {
                log::warn!("Failed to encode shape geometry: {}", e);
                Self::default()
            }
        }
    }
}

/// A persisted or pending annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    pub id: AnnotationId,
    /// 1-based page number, fixed at creation.
    pub page: u32,
    pub user: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub geometry: Geometry,
    #[serde(default)]
    pub comment: String,
}

impl AnnotationRecord {
    /// Build a new local record for `shape` on `page`. The id is a placeholder
    /// until the store assigns a temporary one.
    pub fn new(page: u32, user: impl Into<String>, shape: &Shape) -> Self {
        Self {
            id: AnnotationId::Temporary(0),
            page,
            user: user.into(),
            created_at: Utc::now(),
            geometry: Geometry::from(shape),
            comment: String::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Whitespace-only comments count as no comment.
    pub fn has_comment(&self) -> bool {
        !self.comment.trim().is_empty()
    }

    pub fn shape(&self) -> Result<Shape, serde_json::Error> {
        self.geometry.decode()
    }
}

/// Decode a list of wire records, skipping entries that do not parse.
pub fn decode_records(values: Vec<serde_json::Value>) -> Vec<AnnotationRecord> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<AnnotationRecord>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Skipping malformed annotation: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Rectangle;
    use kurbo::Point;
    use serde_json::json;

    fn rect_shape() -> Shape {
        Shape::Rectangle(Rectangle::new(Point::new(10.0, 20.0), 30.0, 40.0))
    }

    #[test]
    fn test_temporary_id_serializes_as_null() {
        let record = AnnotationRecord::new(2, "alice", &rect_shape());
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["id"].is_null());
        assert_eq!(json["page"], 2);
        assert_eq!(json["user"], "alice");
        assert!(json["createdAt"].is_string());
    }

    #[test]
    fn test_numeric_id_is_accepted() {
        let value = json!({
            "id": 42,
            "page": 1,
            "user": "bob",
            "createdAt": "2024-01-01T00:00:00Z",
            "geometry": {},
            "comment": "hi"
        });
        let record: AnnotationRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.id, AnnotationId::persisted("42"));
    }

    #[test]
    fn test_null_id_is_rejected() {
        let value = json!({ "id": null, "page": 1, "user": "bob", "geometry": {} });
        assert!(serde_json::from_value::<AnnotationRecord>(value).is_err());
    }

    #[test]
    fn test_geometry_roundtrip_through_shape() {
        let shape = rect_shape();
        let geometry = Geometry::from(&shape);
        assert_eq!(geometry.decode().unwrap(), shape);
    }

    #[test]
    fn test_decode_records_skips_malformed() {
        let records = decode_records(vec![
            json!({ "id": "a", "page": 1, "user": "u", "geometry": {} }),
            json!({ "id": "b" }),
            json!("garbage"),
        ]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, AnnotationId::persisted("a"));
        assert!(records[0].comment.is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(AnnotationId::Temporary(7).to_string(), "temp-7");
        assert_eq!(AnnotationId::persisted("abc").to_string(), "abc");
    }

    #[test]
    fn test_blank_comment_is_no_comment() {
        let record = AnnotationRecord::new(1, "alice", &rect_shape());
        assert!(!record.clone().with_comment(" \n\t").has_comment());
        assert!(record.with_comment(" ok ").has_comment());
    }
}
