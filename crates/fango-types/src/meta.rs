//! Audit metadata carried by every mapped object.
//!
//! Metadata is persisted next to the declared fields under underscore
//! prefixed keys so it never collides with a field name.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::document::{Document, DocumentId, ID_KEY};
use crate::error::{TypeError, TypeResult};

pub const CREATED_BY_KEY: &str = "_created_by";
pub const CREATED_AT_KEY: &str = "_created_at";
pub const UPDATED_BY_KEY: &str = "_updated_by";
pub const UPDATED_AT_KEY: &str = "_updated_at";

/// Audit fields plus the optional storage identifier.
///
/// The identifier is absent until the first persisted insert and can be
/// assigned at most once; it is never cleared.
#[derive(Clone, Debug, PartialEq)]
pub struct MetaData {
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
    id: Option<DocumentId>,
}

impl MetaData {
    /// Fresh metadata: created and updated by `actor` at `now`.
    pub fn new(actor: &str, now: DateTime<Utc>) -> Self {
        Self {
            created_by: actor.to_string(),
            created_at: now,
            updated_by: actor.to_string(),
            updated_at: now,
            id: None,
        }
    }

    /// Read metadata keys from `document`, falling back to `actor` and `now`
    /// for every key that is missing or `null`.
    pub fn from_document(document: &Document, actor: &str, now: DateTime<Utc>) -> TypeResult<Self> {
        let id = match document.get(ID_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(DocumentId::new(id.clone())),
            Some(other) => {
                return Err(TypeError::InvalidMetadata {
                    key: ID_KEY.to_string(),
                    reason: format!("expected a string, got {other}"),
                })
            }
        };
        Ok(Self {
            created_by: read_actor(document, CREATED_BY_KEY)?.unwrap_or_else(|| actor.to_string()),
            created_at: read_timestamp(document, CREATED_AT_KEY)?.unwrap_or(now),
            updated_by: read_actor(document, UPDATED_BY_KEY)?.unwrap_or_else(|| actor.to_string()),
            updated_at: read_timestamp(document, UPDATED_AT_KEY)?.unwrap_or(now),
            id,
        })
    }

    /// The storage identifier, if the object has been persisted.
    pub fn id(&self) -> Option<&DocumentId> {
        self.id.as_ref()
    }

    /// Record the storage identifier.
    ///
    /// Re-assigning the same identifier is a no-op; assigning a different
    /// one fails.
    pub fn assign_id(&mut self, id: DocumentId) -> TypeResult<()> {
        match &self.id {
            Some(existing) if *existing != id => Err(TypeError::IdentifierAlreadyAssigned {
                existing: existing.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                self.id = Some(id);
                Ok(())
            }
        }
    }

    /// Mark the object as updated by `actor` at `now`.
    pub fn touch(&mut self, actor: &str, now: DateTime<Utc>) {
        self.updated_by = actor.to_string();
        self.updated_at = now;
    }

    /// Overlay the metadata keys onto `document`. The identifier is written
    /// only when `include_id` is set and one is assigned.
    pub fn write_into(&self, document: &mut Document, include_id: bool) {
        document.insert(CREATED_BY_KEY.into(), Value::String(self.created_by.clone()));
        document.insert(CREATED_AT_KEY.into(), Value::String(format_timestamp(&self.created_at)));
        document.insert(UPDATED_BY_KEY.into(), Value::String(self.updated_by.clone()));
        document.insert(UPDATED_AT_KEY.into(), Value::String(format_timestamp(&self.updated_at)));
        match (&self.id, include_id) {
            (Some(id), true) => {
                document.insert(ID_KEY.into(), id.clone().into());
            }
            _ => {
                document.remove(ID_KEY);
            }
        }
    }

    /// Returns `true` for keys owned by the metadata rather than by fields.
    pub fn is_meta_key(key: &str) -> bool {
        matches!(
            key,
            ID_KEY | CREATED_BY_KEY | CREATED_AT_KEY | UPDATED_BY_KEY | UPDATED_AT_KEY
        )
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn read_actor(document: &Document, key: &str) -> TypeResult<Option<String>> {
    match document.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(actor)) => Ok(Some(actor.clone())),
        Some(other) => Err(TypeError::InvalidMetadata {
            key: key.to_string(),
            reason: format!("expected a string, got {other}"),
        }),
    }
}

fn read_timestamp(document: &Document, key: &str) -> TypeResult<Option<DateTime<Utc>>> {
    match document.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(raw)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|e| TypeError::InvalidMetadata {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        Some(other) => Err(TypeError::InvalidMetadata {
            key: key.to_string(),
            reason: format!("expected an RFC 3339 timestamp, got {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn defaults_when_document_is_empty() {
        let meta = MetaData::from_document(&Document::new(), "alice", t0()).unwrap();
        assert_eq!(meta, MetaData::new("alice", t0()));
        assert!(meta.id().is_none());
    }

    #[test]
    fn roundtrips_through_document() {
        let mut meta = MetaData::new("alice", t0());
        meta.assign_id(DocumentId::new("id-1")).unwrap();

        let mut doc = Document::new();
        meta.write_into(&mut doc, true);
        let read = MetaData::from_document(&doc, "bob", Utc::now()).unwrap();
        assert_eq!(read, meta);
    }

    #[test]
    fn write_without_id_removes_key() {
        let mut meta = MetaData::new("alice", t0());
        meta.assign_id(DocumentId::new("id-1")).unwrap();

        let mut doc = Document::new();
        doc.insert(ID_KEY.into(), Value::String("stale".into()));
        meta.write_into(&mut doc, false);
        assert!(!doc.contains_key(ID_KEY));
        assert_eq!(doc.len(), 4);
    }

    #[test]
    fn id_assigned_at_most_once() {
        let mut meta = MetaData::new("alice", t0());
        meta.assign_id(DocumentId::new("a")).unwrap();
        meta.assign_id(DocumentId::new("a")).unwrap();

        let err = meta.assign_id(DocumentId::new("b")).unwrap_err();
        assert_eq!(
            err,
            TypeError::IdentifierAlreadyAssigned {
                existing: DocumentId::new("a")
            }
        );
        assert_eq!(meta.id(), Some(&DocumentId::new("a")));
    }

    #[test]
    fn touch_updates_only_updated_fields() {
        let mut meta = MetaData::new("alice", t0());
        let later = t0() + chrono::Duration::seconds(30);
        meta.touch("bob", later);
        assert_eq!(meta.created_by, "alice");
        assert_eq!(meta.created_at, t0());
        assert_eq!(meta.updated_by, "bob");
        assert_eq!(meta.updated_at, later);
    }

    #[test]
    fn rejects_malformed_values() {
        let mut doc = Document::new();
        doc.insert(CREATED_AT_KEY.into(), Value::String("yesterday".into()));
        assert!(matches!(
            MetaData::from_document(&doc, "alice", t0()),
            Err(TypeError::InvalidMetadata { .. })
        ));

        let mut doc = Document::new();
        doc.insert(ID_KEY.into(), Value::from(12));
        assert!(MetaData::from_document(&doc, "alice", t0()).is_err());
    }

    #[test]
    fn meta_keys_are_recognized() {
        assert!(MetaData::is_meta_key("_id"));
        assert!(MetaData::is_meta_key("_updated_at"));
        assert!(!MetaData::is_meta_key("Name"));
    }
}
