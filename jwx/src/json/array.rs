//! JSON arrays

use super::{Error, Value};

/// A JSON array: an ordered sequence of values
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Array {
    elems: Vec<Value>,
}

impl Array {
    /// Constructs a new, empty array
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// Whether the array has no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// The element at `idx`, if within bounds
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.elems.get(idx)
    }

    /// Iterates over the elements in order
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.elems.iter()
    }

    /// Appends a value to the end of the array
    pub fn push(&mut self, value: Value) {
        self.elems.push(value);
    }

    /// Stores `value` at index `idx`, padding any gap with nulls
    pub fn set(&mut self, idx: usize, value: Value) {
        if idx >= self.elems.len() {
            self.elems.resize(idx + 1, Value::Null);
        }
        self.elems[idx] = value;
    }

    /// Removes the element at `idx`
    ///
    /// An interior element is replaced with null to preserve the
    /// positions of its successors; removing the trailing element also
    /// trims any trailing run of nulls.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotFound`] when `idx` is out of bounds.
    pub fn remove(&mut self, idx: usize) -> Result<(), Error> {
        if idx >= self.elems.len() {
            return Err(Error::NotFound {
                name: format!("[{idx}]"),
            });
        }

        if idx + 1 == self.elems.len() {
            drop(self.elems.pop());
            while matches!(self.elems.last(), Some(Value::Null)) {
                drop(self.elems.pop());
            }
        } else {
            self.elems[idx] = Value::Null;
        }

        Ok(())
    }

    /// Scrubs every contained string and numeral, then releases all
    /// elements
    pub fn invalidate(&mut self) {
        for elem in &mut self.elems {
            elem.invalidate();
        }
        self.elems.clear();
    }

    /// Renders this array as compact JSON text
    #[must_use]
    pub fn to_json(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out);
        out
    }

    pub(crate) fn write_json(&self, out: &mut String) {
        out.push('[');
        for (i, elem) in self.elems.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            elem.write_json(out);
        }
        out.push(']');
    }
}

impl From<Vec<Value>> for Array {
    fn from(elems: Vec<Value>) -> Self {
        Self { elems }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_pads_with_nulls() {
        let mut a = Array::new();
        a.set(2, Value::Integer(7));
        assert_eq!(a.len(), 3);
        assert_eq!(a.get(0), Some(&Value::Null));
        assert_eq!(a.get(1), Some(&Value::Null));
        assert_eq!(a.get(2), Some(&Value::Integer(7)));
    }

    #[test]
    fn interior_removal_leaves_null() {
        let mut a = Array::from(vec![
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(3),
        ]);
        a.remove(1).unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(a.get(1), Some(&Value::Null));
    }

    #[test]
    fn trailing_removal_trims_nulls() {
        let mut a = Array::from(vec![
            Value::Integer(1),
            Value::Null,
            Value::Null,
            Value::Integer(4),
        ]);
        a.remove(3).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a.get(0), Some(&Value::Integer(1)));
    }

    #[test]
    fn out_of_bounds_removal_fails() {
        let mut a = Array::new();
        assert!(matches!(a.remove(0), Err(Error::NotFound { .. })));
    }

    #[test]
    fn serializes_in_order() {
        let a = Array::from(vec![Value::Null, Value::Bool(true), Value::from("x")]);
        assert_eq!(a.to_json(), r#"[null,true,"x"]"#);
    }
}
