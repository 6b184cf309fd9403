//! Host values.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Number};

use super::{ObjectRef, Prototype, PropertyKey};
use crate::proxy::Proxy;

/// A host value.
///
/// Absence ("no such property") is not a value; operations that can miss
/// return `Option<Value>`.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    /// A raw host object.
    Object(ObjectRef),
    /// A reactive wrapper around a host object.
    Proxy(Proxy),
}

impl Value {
    /// Check if this is an object or a proxy.
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Proxy(_))
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Self::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret this value as an array length.
    ///
    /// Only whole, non-negative numbers that fit in `u32` qualify.
    pub fn as_array_length(&self) -> Option<u32> {
        let n = self.as_number()?;
        if n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX) {
            Some(n as u32)
        } else {
            None
        }
    }

    /// Render this value as JSON.
    ///
    /// Proxies are read through their handlers, so this registers
    /// dependencies when called inside a computation. Cycles render as
    /// `null`, and NaN and infinities as `null`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut path = Vec::new();
        self.to_json_inner(&mut path)
    }

    fn to_json_inner(&self, path: &mut Vec<usize>) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => serde_json::Value::String(s.to_string()),
            Self::Object(object) => {
                let id = object.addr();
                if path.contains(&id) {
                    return serde_json::Value::Null;
                }
                path.push(id);
                let json = if object.prototype() == Prototype::Array {
                    let len = object
                        .get(&PropertyKey::length())
                        .and_then(|v| v.as_array_length())
                        .unwrap_or(0);
                    (0..len)
                        .map(|i| child_json(object.get(&PropertyKey::from(i)), path))
                        .collect()
                } else {
                    let mut map = Map::new();
                    for key in object.own_keys() {
                        let enumerable = object
                            .get_own_property(&key)
                            .is_some_and(|d| d.enumerable != Some(false));
                        if enumerable {
                            map.insert(key.to_string(), child_json(object.get(&key), path));
                        }
                    }
                    serde_json::Value::Object(map)
                };
                path.pop();
                json
            }
            Self::Proxy(proxy) => {
                let id = proxy.target().addr();
                if path.contains(&id) {
                    return serde_json::Value::Null;
                }
                path.push(id);
                let json = if proxy.is_array() {
                    (0..proxy.len())
                        .map(|i| child_json(proxy.get(i), path))
                        .collect()
                } else {
                    let mut map = Map::new();
                    for key in proxy.keys() {
                        map.insert(key.to_string(), child_json(proxy.get(&key), path));
                    }
                    serde_json::Value::Object(map)
                };
                path.pop();
                json
            }
        }
    }
}

fn child_json(value: Option<Value>, path: &mut Vec<usize>) -> serde_json::Value {
    value.map_or(serde_json::Value::Null, |v| v.to_json_inner(path))
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return serde_json::Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// Host identity: objects and proxies by reference, numbers by IEEE
/// equality (so `NaN != NaN`), everything else by value. A proxy never
/// equals its raw target here; see [`crate::is_same`] for that.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Proxy(a), Self::Proxy(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Object(object) => write!(f, "Object({:#x})", object.addr()),
            Self::Proxy(proxy) => write!(f, "Proxy({:#x})", proxy.target().addr()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Self::Object(object)
    }
}

impl From<Proxy> for Value {
    fn from(proxy: Proxy) -> Self {
        Self::Proxy(proxy)
    }
}

/// Objects and arrays become fresh plain host objects and arrays.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::from(s),
            serde_json::Value::Array(items) => {
                Self::Object(ObjectRef::array(items.into_iter().map(Value::from)))
            }
            serde_json::Value::Object(map) => {
                let object = ObjectRef::plain();
                for (key, value) in map {
                    object.set(&PropertyKey::from(key), Value::from(value));
                }
                Self::Object(object)
            }
        }
    }
}
