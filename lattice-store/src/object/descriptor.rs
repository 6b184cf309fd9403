//! Property descriptors.

use std::fmt;
use std::sync::Arc;

use super::Value;

/// Accessor getter.
pub type Getter = Arc<dyn Fn() -> Option<Value> + Send + Sync>;

/// Accessor setter.
pub type Setter = Arc<dyn Fn(Value) + Send + Sync>;

/// A (possibly partial) property descriptor.
///
/// Fields left as `None` are unspecified. A descriptor returned by
/// introspection is always complete for its kind: data descriptors carry
/// `value` and `writable`, accessor descriptors `get`/`set`.
#[derive(Clone, Default)]
pub struct PropertyDescriptor {
    pub value: Option<Value>,
    pub writable: Option<bool>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
    pub get: Option<Getter>,
    pub set: Option<Setter>,
}

impl PropertyDescriptor {
    /// A writable, enumerable, configurable data descriptor.
    pub fn data(value: Value) -> Self {
        Self {
            value: Some(value),
            writable: Some(true),
            enumerable: Some(true),
            configurable: Some(true),
            ..Self::default()
        }
    }

    /// A data descriptor with only the value specified.
    pub fn value(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// An enumerable, configurable accessor descriptor.
    pub fn accessor(get: Option<Getter>, set: Option<Setter>) -> Self {
        Self {
            enumerable: Some(true),
            configurable: Some(true),
            get,
            set,
            ..Self::default()
        }
    }

    pub fn with_writable(mut self, writable: bool) -> Self {
        self.writable = Some(writable);
        self
    }

    pub fn with_enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = Some(enumerable);
        self
    }

    pub fn with_configurable(mut self, configurable: bool) -> Self {
        self.configurable = Some(configurable);
        self
    }

    /// Check if this describes an accessor property.
    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    /// Check if this describes a data property.
    pub fn is_data(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    /// A descriptor a single reactive cell can represent: it carries a value
    /// and none of its flags is explicitly `false`.
    pub fn is_plain_value(&self) -> bool {
        self.value.is_some()
            && !self.is_accessor()
            && self.writable != Some(false)
            && self.enumerable != Some(false)
            && self.configurable != Some(false)
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("value", &self.value)
            .field("writable", &self.writable)
            .field("enumerable", &self.enumerable)
            .field("configurable", &self.configurable)
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_value_descriptors() {
        assert!(PropertyDescriptor::data(Value::from(1)).is_plain_value());
        assert!(PropertyDescriptor::value(Value::from(1)).is_plain_value());

        assert!(!PropertyDescriptor::default().is_plain_value());
        assert!(!PropertyDescriptor::data(Value::Null)
            .with_enumerable(false)
            .is_plain_value());
        assert!(!PropertyDescriptor::value(Value::Null)
            .with_writable(false)
            .is_plain_value());

        let getter: Getter = Arc::new(|| Some(Value::from(1)));
        assert!(!PropertyDescriptor::accessor(Some(getter), None).is_plain_value());
    }
}
