//! Model types and the base fields every model inherits.

use serde_json::Value;

use crate::error::OdmResult;
use crate::field::{FieldArgs, FieldSet};
use crate::object::Object;

/// A mapped document type.
///
/// A model is a marker type naming its field set. The set is built once and
/// kept in a static:
///
/// ```
/// use std::sync::OnceLock;
///
/// use fango::{FieldArgs, FieldSet, Model, Object, OdmResult};
/// use serde_json::{json, Value};
///
/// struct Note;
///
/// fn body(_: &Object<Note>, _: &FieldArgs) -> OdmResult<Value> {
///     Ok(json!(""))
/// }
///
/// impl Model for Note {
///     const TYPE_NAME: &'static str = "Note";
///
///     fn fields() -> &'static FieldSet<Self> {
///         static FIELDS: OnceLock<FieldSet<Note>> = OnceLock::new();
///         FIELDS.get_or_init(|| FieldSet::builder().field("Body", body).build())
///     }
/// }
///
/// let names: Vec<_> = Note::fields().names().collect();
/// assert_eq!(names, ["Name", "Id", "Body"]);
/// ```
pub trait Model: Sized + 'static {
    /// Type name, used for the scratch collection of unaddressed objects.
    const TYPE_NAME: &'static str;

    /// Every field of the type, base fields included.
    fn fields() -> &'static FieldSet<Self>;
}

/// Base `Name` field: a fresh unique name.
pub(crate) fn generated_name<M: Model>(_object: &Object<M>, _args: &FieldArgs) -> OdmResult<Value> {
    Ok(Value::String(uuid::Uuid::now_v7().simple().to_string()))
}

/// Base `Id` field: the storage identifier, `null` until persisted.
pub(crate) fn storage_id<M: Model>(object: &Object<M>, _args: &FieldArgs) -> OdmResult<Value> {
    Ok(object.id().cloned().map(Value::from).unwrap_or(Value::Null))
}
