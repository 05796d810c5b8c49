//! Stage: one immutable snapshot of data in a transformation chain
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Public fields of a stage, as observed by the next stage
pub type Fields = Map<String, Value>;

/// Contract every stage value satisfies
///
/// Implemented for any serializable record; the serialized object is the
/// stage's snapshot, and its keys are the only fields the next stage can
/// carry forward.
pub trait Stage: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;

    /// Serialize the public fields
    fn snapshot(&self) -> Result<Value, serde_json::Error>;

    fn stage_type(&self) -> StageType;
}

impl<T> Stage for T
where
    T: Serialize + Any + Send + Sync + fmt::Debug,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }

    fn snapshot(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn stage_type(&self) -> StageType {
        StageType::of::<T>()
    }
}

/// Type identity of a stage
#[derive(Clone, Copy)]
pub struct StageType {
    id: TypeId,
    full_name: &'static str,
}

impl StageType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            full_name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Type name without module paths
    pub fn name(&self) -> String {
        short_type_name(self.full_name)
    }

    pub fn full_name(&self) -> &'static str {
        self.full_name
    }
}

impl PartialEq for StageType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StageType {}

impl Hash for StageType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for StageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "StageType({})", self.name())
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Drop module paths from a `std::any::type_name` string, keeping generics
/// and `dyn` markers: `a::b::Foo<c::Bar>` becomes `Foo<Bar>`.
pub fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    let mut chars = full.chars().peekable();

    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            segment.clear();
        } else if c.is_alphanumeric() || c == '_' {
            segment.push(c);
        } else {
            out.push_str(&segment);
            segment.clear();
            out.push(c);
        }
    }
    out.push_str(&segment);
    out
}

/// Declared data type of a carried-forward parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Integer,
    /// Any JSON number, integers included
    Number,
    Boolean,
    Array,
    Object,
    /// Anything, `null` included
    Any,
}

impl FieldKind {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Array => value.is_array(),
            FieldKind::Object => value.is_object(),
            FieldKind::Any => true,
        }
    }

    /// Describe the shape of a JSON value for mismatch reports
    pub fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
            FieldKind::Any => "any",
        };
        f.write_str(name)
    }
}
