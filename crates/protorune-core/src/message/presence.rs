//! Oneof and explicit-presence tracking.
//!
//! Each oneof group, including the synthetic one-member group behind an
//! `optional` field, has one entry naming its active member. Every mutator
//! goes through this table, and both codecs read it to decide whether a
//! member at its default value is written.

use super::DynamicMessage;
use crate::error::{Error, Result};
use crate::value::Value;
use std::borrow::Cow;

/// Active member per oneof group, by field index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Presence {
    active: Vec<Option<usize>>,
}

impl Presence {
    pub(crate) fn new(groups: usize) -> Self {
        Self {
            active: vec![None; groups],
        }
    }

    pub(crate) fn active(&self, group: usize) -> Option<usize> {
        self.active.get(group).copied().flatten()
    }

    /// Marks `field` active, returning the sibling it displaced
    pub(crate) fn mark(&mut self, group: usize, field: usize) -> Option<usize> {
        let previous = self.active[group].replace(field);
        previous.filter(|&p| p != field)
    }

    pub(crate) fn unmark(&mut self, group: usize, field: usize) {
        if self.active[group] == Some(field) {
            self.active[group] = None;
        }
    }
}

impl DynamicMessage {
    /// Assigns a field
    ///
    /// The value must match the field's declared type. For oneof members the
    /// field becomes the active member and its siblings read as default.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let index = self.field_index(name)?;
        let value = self.check_value(index, value.into())?;
        self.store(index, value);
        Ok(())
    }

    /// Returns the active member of a oneof group and its value
    pub fn which_set(&self, group: &str) -> Result<Option<(&str, Cow<'_, Value>)>> {
        let oneof = self
            .ty
            .get_oneof(group)
            .ok_or_else(|| Error::no_such_field(self.ty.full_name(), group))?;
        Ok(self
            .presence
            .active(oneof.index())
            .map(|index| (self.ty.field(index).name(), self.get_by_index(index))))
    }

    /// Unsets a field; a oneof member loses its active state
    pub fn clear(&mut self, name: &str) -> Result<()> {
        let index = self.field_index(name)?;
        if let Some(group) = self.ty.field(index).oneof_index() {
            self.presence.unmark(group, index);
        }
        self.fields[index] = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::{FieldDef, MessageDef, ScalarKind, SchemaPool};
    use crate::value::Value;
    use crate::DynamicMessage;

    fn message() -> DynamicMessage {
        SchemaPool::builder()
            .message(
                MessageDef::new("test.Choice")
                    .field(FieldDef::scalar("x", 1, ScalarKind::Int32).oneof("pick"))
                    .field(FieldDef::scalar("y", 2, ScalarKind::String).oneof("pick"))
                    .field(FieldDef::scalar("flag", 3, ScalarKind::Bool).optional())
                    .field(FieldDef::scalar("plain", 4, ScalarKind::Int32)),
            )
            .build()
            .unwrap()
            .get_message("test.Choice")
            .unwrap()
            .new_message()
    }

    #[test]
    fn test_oneof_exclusivity() {
        let mut msg = message();
        assert!(msg.which_set("pick").unwrap().is_none());

        msg.set("y", "hello").unwrap();
        msg.set("x", 5).unwrap();

        let (name, value) = msg.which_set("pick").unwrap().unwrap();
        assert_eq!(name, "x");
        assert_eq!(*value, Value::I32(5));
        assert_eq!(*msg.get("y").unwrap(), Value::String(String::new()));
        assert!(!msg.is_set("y").unwrap());
    }

    #[test]
    fn test_oneof_member_at_default_is_set() {
        let mut msg = message();
        msg.set("x", 0).unwrap();
        assert!(msg.is_set("x").unwrap());
        assert_eq!(msg.which_set("pick").unwrap().unwrap().0, "x");
    }

    #[test]
    fn test_clear() {
        let mut msg = message();
        msg.set("x", 3).unwrap();
        msg.clear("x").unwrap();
        assert!(msg.which_set("pick").unwrap().is_none());
        assert_eq!(*msg.get("x").unwrap(), Value::I32(0));

        msg.set("plain", 9).unwrap();
        msg.clear("plain").unwrap();
        assert!(!msg.is_set("plain").unwrap());
    }

    #[test]
    fn test_optional_presence() {
        let mut msg = message();
        assert!(!msg.is_set("flag").unwrap());
        msg.set("flag", false).unwrap();
        assert!(msg.is_set("flag").unwrap());
        assert_eq!(msg.which_set("_flag").unwrap().unwrap().0, "flag");
    }

    #[test]
    fn test_unknown_group() {
        assert!(message().which_set("nope").is_err());
    }
}
