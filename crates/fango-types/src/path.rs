//! Document path normalization.
//!
//! A path addresses one document as `collection/name`:
//! - Separators are `/`; leading and trailing separators are dropped
//! - Runs of separators collapse into one
//! - The last segment is the document name
//! - Everything before it is the collection, or `/` when there is nothing

use std::fmt;

use serde::{Deserialize, Serialize};

/// Segment separator.
pub const SEPARATOR: char = '/';

/// Collection used for single-segment paths.
pub const ROOT_COLLECTION: &str = "/";

/// Prefix of the collection that holds unaddressed (fresh) objects.
pub const SCRATCH_PREFIX: &str = "tmp";

/// Normalize a path: strip leading/trailing separators and collapse interior
/// runs of separators.
///
/// # Examples
///
/// ```
/// use fango_types::normalize;
///
/// assert_eq!(normalize("/a//b/"), "a/b");
/// assert_eq!(normalize("///"), "");
/// ```
pub fn normalize(path: &str) -> String {
    path.split(SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Split a path into `(collection, name)`.
///
/// The path is normalized first. A single-segment path lives in the
/// [`ROOT_COLLECTION`].
///
/// # Examples
///
/// ```
/// use fango_types::split;
///
/// assert_eq!(split("a/b/c"), ("a/b".to_string(), "c".to_string()));
/// assert_eq!(split("c"), ("/".to_string(), "c".to_string()));
/// ```
pub fn split(path: &str) -> (String, String) {
    let normalized = normalize(path);
    match normalized.rsplit_once(SEPARATOR) {
        Some((collection, name)) => (collection.to_string(), name.to_string()),
        None => (ROOT_COLLECTION.to_string(), normalized),
    }
}

/// A resolved document address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocPath {
    /// Collection the document lives in.
    pub collection: String,
    /// Document name, unique within its collection.
    pub name: String,
}

impl DocPath {
    /// Parse a raw path. Returns `None` when the path normalizes to nothing.
    pub fn parse(path: &str) -> Option<Self> {
        if normalize(path).is_empty() {
            return None;
        }
        let (collection, name) = split(path);
        Some(Self { collection, name })
    }

    /// Scratch collection for objects of `type_name` that were created
    /// without a path.
    pub fn scratch_collection(type_name: &str) -> String {
        normalize(&format!("{SCRATCH_PREFIX}/{type_name}"))
    }

    /// Join a collection and a name back into a normalized path.
    pub fn join(collection: &str, name: &str) -> String {
        if collection == ROOT_COLLECTION {
            normalize(name)
        } else {
            normalize(&format!("{collection}/{name}"))
        }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Self::join(&self.collection, &self.name))
    }
}
