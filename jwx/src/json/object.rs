//! JSON objects with final members and a terminal lock

use zeroize::Zeroize;

use super::{write_escaped, Error, Value};

/// A JSON object: an insertion-ordered collection of named members
///
/// A member may be installed as *final*, after which no `set` variant
/// can replace it. An object may also be [`lock`][Object::lock]ed, which
/// forbids all further mutation. Both mechanisms exist to protect
/// registered claims once a token has been validated.
#[derive(Clone, Debug, Default)]
pub struct Object {
    members: Vec<Member>,
    locked: bool,
}

#[derive(Clone, Debug)]
struct Member {
    name: String,
    fin: bool,
    value: Value,
}

impl Object {
    /// Constructs a new, empty object
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of members
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the object has no members
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether a member with the given name exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Whether the named member exists and is final
    #[must_use]
    pub fn is_final(&self, name: &str) -> bool {
        self.find(name).map_or(false, |i| self.members[i].fin)
    }

    /// Whether the object has been locked against mutation
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// The value of the named member, if present
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.find(name).map(|i| &self.members[i].value)
    }

    /// Iterates over `(name, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.members.iter().map(|m| (m.name.as_str(), &m.value))
    }

    /// Iterates over member names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.name.as_str())
    }

    /// Installs or replaces the named member
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Locked`] on a locked object and with
    /// [`Error::FinalConflict`] when the existing member is final.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), Error> {
        self.set_impl(name, value, false)
    }

    /// Installs the named member and marks it final
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Locked`] on a locked object and with
    /// [`Error::FinalConflict`] when the existing member is already
    /// final.
    pub fn set_final(&mut self, name: &str, value: Value) -> Result<(), Error> {
        self.set_impl(name, value, true)
    }

    fn set_impl(&mut self, name: &str, value: Value, fin: bool) -> Result<(), Error> {
        if self.locked {
            return Err(Error::Locked);
        }

        match self.find(name) {
            Some(i) if self.members[i].fin => Err(Error::FinalConflict {
                name: name.to_owned(),
            }),
            Some(i) => {
                let member = &mut self.members[i];
                member.value = value;
                member.fin = fin;
                Ok(())
            }
            None => {
                self.members.push(Member {
                    name: name.to_owned(),
                    fin,
                    value,
                });
                Ok(())
            }
        }
    }

    /// Marks an existing member final without replacing its value
    ///
    /// Idempotent on members that are already final.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Locked`] on a locked object and with
    /// [`Error::NotFound`] when the member does not exist.
    pub fn make_final(&mut self, name: &str) -> Result<(), Error> {
        if self.locked {
            return Err(Error::Locked);
        }

        match self.find(name) {
            Some(i) => {
                self.members[i].fin = true;
                Ok(())
            }
            None => Err(Error::NotFound {
                name: name.to_owned(),
            }),
        }
    }

    /// Deletes the named member and releases its value
    ///
    /// Removing an absent member is a no-op.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Locked`] on a locked object and with
    /// [`Error::FinalConflict`] when the member is final.
    pub fn remove(&mut self, name: &str) -> Result<(), Error> {
        if self.locked {
            return Err(Error::Locked);
        }

        if let Some(i) = self.find(name) {
            if self.members[i].fin {
                return Err(Error::FinalConflict {
                    name: name.to_owned(),
                });
            }
            drop(self.members.remove(i));
        }

        Ok(())
    }

    /// Forbids all subsequent mutation
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Scrubs every contained string and numeral, member names
    /// included, then releases all members
    ///
    /// This is a tear-down operation and is permitted on a locked
    /// object; the lock does not survive it.
    pub fn invalidate(&mut self) {
        for member in &mut self.members {
            member.name.zeroize();
            member.value.invalidate();
        }
        self.members.clear();
        self.locked = false;
    }

    /// Renders this object as compact JSON text, members in insertion
    /// order
    #[must_use]
    pub fn to_json(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out);
        out
    }

    pub(crate) fn write_json(&self, out: &mut String) {
        out.push('{');
        for (i, member) in self.members.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_escaped(&member.name, out);
            out.push(':');
            member.value.write_json(out);
        }
        out.push('}');
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }
}

impl PartialEq for Object {
    /// Objects compare as mappings: member order, finality, and lock
    /// state are not part of the value
    fn eq(&self, other: &Self) -> bool {
        self.members.len() == other.members.len()
            && self
                .members
                .iter()
                .all(|m| other.get(&m.name) == Some(&m.value))
    }
}

#[cfg(test)]
mod tests {
    use super::super::{parse_object, Value};
    use super::*;

    #[test]
    fn final_members_cannot_be_overwritten() {
        let mut obj = Object::new();
        obj.set_final("iss", Value::from("a")).unwrap();

        let err = obj.set("iss", Value::from("b")).unwrap_err();
        assert!(matches!(err, Error::FinalConflict { .. }));

        let err = obj.set_final("iss", Value::from("c")).unwrap_err();
        assert!(matches!(err, Error::FinalConflict { .. }));

        assert_eq!(obj.get("iss").and_then(Value::as_str), Some("a"));
    }

    #[test]
    fn final_members_cannot_be_removed() {
        let mut obj = Object::new();
        obj.set_final("iss", Value::from("a")).unwrap();
        assert!(matches!(
            obj.remove("iss"),
            Err(Error::FinalConflict { .. })
        ));
    }

    #[test]
    fn locked_objects_reject_all_mutation() {
        let mut obj = Object::new();
        obj.set("a", Value::Integer(1)).unwrap();
        obj.lock();

        assert!(matches!(obj.set("b", Value::Null), Err(Error::Locked)));
        assert!(matches!(
            obj.set_final("c", Value::Null),
            Err(Error::Locked)
        ));
        assert!(matches!(obj.remove("a"), Err(Error::Locked)));
        assert_eq!(obj.get("a"), Some(&Value::Integer(1)));
    }

    #[test]
    fn invalidate_is_permitted_when_locked() {
        let mut obj = Object::new();
        obj.set("k", Value::from("secret")).unwrap();
        obj.lock();

        obj.invalidate();
        assert!(obj.is_empty());
        assert!(!obj.is_locked());
    }

    #[test]
    fn replacement_releases_the_old_value() {
        let mut obj = Object::new();
        obj.set("a", Value::from("one")).unwrap();
        obj.set("a", Value::from("two")).unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj.get("a").and_then(Value::as_str), Some("two"));
    }

    #[test]
    fn removing_an_absent_member_is_a_noop() {
        let mut obj = Object::new();
        obj.remove("ghost").unwrap();
    }

    #[test]
    fn serializes_in_insertion_order() {
        let mut obj = Object::new();
        obj.set("z", Value::Integer(1)).unwrap();
        obj.set("a", Value::Integer(2)).unwrap();
        assert_eq!(obj.to_json(), r#"{"z":1,"a":2}"#);
    }

    #[test]
    fn equality_ignores_order_and_finality() {
        let left = parse_object(r#"{"a":1,"b":2}"#).unwrap();
        let right = parse_object(r#"{"b":2,"a":1}"#).unwrap();
        assert_eq!(left, right);

        let mut sealed = parse_object(r#"{"a":1,"b":2}"#).unwrap();
        let one = sealed.get("a").cloned().unwrap();
        sealed.remove("a").unwrap();
        sealed.set_final("a", one).unwrap();
        assert_eq!(left, sealed);
    }
}
