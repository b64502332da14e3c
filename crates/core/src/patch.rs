//! Tri-state partial-update field.
//!
//! A plain `Option<T>` cannot tell "leave this field alone" from "remove
//! this field". `Patch` keeps the two apart:
//!
//! | JSON input          | `Patch`      |
//! |---------------------|--------------|
//! | field missing       | `Unset`      |
//! | `"field": null`     | `Clear`      |
//! | `"field": value`    | `Set(value)` |
//!
//! Fields must be annotated `#[serde(default)]` so a missing key maps to
//! `Unset`, and `#[serde(skip_serializing_if = "Patch::is_unset")]` to keep
//! the distinction on the way out.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Patch<T> {
    /// Do not touch the target field.
    #[default]
    Unset,
    /// Remove the target field's value.
    Clear,
    /// Replace the target field's value.
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Patch::Unset)
    }

    /// Value to install if this patch sets one.
    pub fn value(&self) -> Option<&T> {
        match self {
            Patch::Set(v) => Some(v),
            _ => None,
        }
    }

    /// Apply the patch to an optional field in place.
    pub fn apply_to(self, target: &mut Option<T>) {
        match self {
            Patch::Unset => {}
            Patch::Clear => *target = None,
            Patch::Set(v) => *target = Some(v),
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    /// `Some` sets, `None` clears (an explicit `Option` is never "unset").
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Patch::Set(v),
            None => Patch::Clear,
        }
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Patch::Set(v) => serializer.serialize_some(v),
            Patch::Unset | Patch::Clear => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Patch::from)
    }
}
