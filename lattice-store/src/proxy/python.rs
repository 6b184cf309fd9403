//! Python bindings for proxied state.

use pyo3::exceptions::{PyKeyError, PyTypeError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyFloat, PyInt, PyList, PyString};

use super::{wrap, Proxy};
use crate::object::{ObjectRef, PropertyKey, Value};
use crate::reactive::ReactiveContext;

/// Python-exposed deep-reactive state.
///
/// Built from a `dict` or `list`; nested containers come back as `State`
/// objects of their own.
#[pyclass(name = "State")]
pub struct PyState {
    proxy: Proxy,
}

#[pymethods]
impl PyState {
    #[new]
    fn new(value: &Bound<'_, PyAny>) -> PyResult<Self> {
        match wrap(py_to_value(value)?, None) {
            Value::Proxy(proxy) => Ok(Self { proxy }),
            _ => Err(PyTypeError::new_err("State needs a dict or a list")),
        }
    }

    fn __getitem__(&self, py: Python<'_>, key: &Bound<'_, PyAny>) -> PyResult<PyObject> {
        let key = py_to_key(key)?;
        match self.proxy.get(key.clone()) {
            Some(value) => value_to_py(py, &value),
            None => Err(PyKeyError::new_err(key.to_string())),
        }
    }

    fn __setitem__(&self, key: &Bound<'_, PyAny>, value: &Bound<'_, PyAny>) -> PyResult<()> {
        self.proxy.set(py_to_key(key)?, py_to_value(value)?);
        Ok(())
    }

    fn __delitem__(&self, key: &Bound<'_, PyAny>) -> PyResult<()> {
        let key = py_to_key(key)?;
        if self.proxy.delete(key.clone()) {
            Ok(())
        } else {
            Err(PyKeyError::new_err(key.to_string()))
        }
    }

    fn __contains__(&self, key: &Bound<'_, PyAny>) -> PyResult<bool> {
        Ok(self.proxy.has(py_to_key(key)?))
    }

    fn __len__(&self) -> usize {
        self.proxy.len()
    }

    /// Enumerable keys: ints for indices, strings otherwise.
    fn keys(&self, py: Python<'_>) -> Vec<PyObject> {
        self.proxy.keys().iter().map(|key| key_to_py(py, key)).collect()
    }

    /// Structural version: changes when a key is added or removed.
    #[getter]
    fn version(&self) -> u64 {
        self.proxy.structural_version()
    }

    fn __repr__(&self) -> String {
        let json = ReactiveContext::untracked(|| Value::Proxy(self.proxy.clone()).to_json());
        format!("State({json})")
    }
}

fn py_to_key(key: &Bound<'_, PyAny>) -> PyResult<PropertyKey> {
    if key.is_instance_of::<PyInt>() {
        let index: u32 = key.extract()?;
        return Ok(PropertyKey::from(index));
    }
    if let Ok(name) = key.downcast::<PyString>() {
        return Ok(PropertyKey::string(name.to_str()?));
    }
    Err(PyTypeError::new_err("State keys must be str or non-negative int"))
}

fn key_to_py(py: Python<'_>, key: &PropertyKey) -> PyObject {
    match key {
        PropertyKey::Index(index) => (*index).into_py(py),
        PropertyKey::String(name) => name.as_ref().into_py(py),
    }
}

fn py_to_value(value: &Bound<'_, PyAny>) -> PyResult<Value> {
    if value.is_none() {
        return Ok(Value::Null);
    }
    if value.is_instance_of::<PyBool>() {
        return Ok(Value::Bool(value.extract()?));
    }
    if value.is_instance_of::<PyInt>() || value.is_instance_of::<PyFloat>() {
        return Ok(Value::Number(value.extract()?));
    }
    if let Ok(text) = value.downcast::<PyString>() {
        return Ok(Value::from(text.to_str()?));
    }
    if let Ok(state) = value.downcast::<PyState>() {
        return Ok(Value::Proxy(state.borrow().proxy.clone()));
    }
    if let Ok(dict) = value.downcast::<PyDict>() {
        let object = ObjectRef::plain();
        for (key, item) in dict.iter() {
            object.set(&py_to_key(&key)?, py_to_value(&item)?);
        }
        return Ok(Value::Object(object));
    }
    if let Ok(list) = value.downcast::<PyList>() {
        let items = list
            .iter()
            .map(|item| py_to_value(&item))
            .collect::<PyResult<Vec<_>>>()?;
        return Ok(Value::Object(ObjectRef::array(items)));
    }
    Err(PyTypeError::new_err(format!(
        "cannot store {} in State",
        value.get_type().name()?
    )))
}

fn value_to_py(py: Python<'_>, value: &Value) -> PyResult<PyObject> {
    Ok(match value {
        Value::Null => py.None(),
        Value::Bool(b) => (*b).into_py(py),
        Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => (*n as i64).into_py(py),
        Value::Number(n) => (*n).into_py(py),
        Value::String(s) => s.as_ref().into_py(py),
        Value::Proxy(proxy) => Py::new(py, PyState { proxy: proxy.clone() })?.into_py(py),
        Value::Object(_) => json_to_py(py, &value.to_json())?,
    })
}

fn json_to_py(py: Python<'_>, json: &serde_json::Value) -> PyResult<PyObject> {
    use serde_json::Value as Json;

    Ok(match json {
        Json::Null => py.None(),
        Json::Bool(b) => (*b).into_py(py),
        Json::Number(n) => match n.as_i64() {
            Some(i) => i.into_py(py),
            None => n.as_f64().unwrap_or(f64::NAN).into_py(py),
        },
        Json::String(s) => s.as_str().into_py(py),
        Json::Array(items) => {
            let list = PyList::empty_bound(py);
            for item in items {
                list.append(json_to_py(py, item)?)?;
            }
            list.into_py(py)
        }
        Json::Object(map) => {
            let dict = PyDict::new_bound(py);
            for (key, item) in map {
                dict.set_item(key, json_to_py(py, item)?)?;
            }
            dict.into_py(py)
        }
    })
}
