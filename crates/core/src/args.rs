// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Call argument values as seen by the key builder
//!
//! Structured arguments expose their key-relevant fields through
//! [`KeyFields`], a statically typed lookup implemented per type (by hand or
//! with [`key_fields!`](crate::key_fields)), so no runtime reflection is
//! involved in reading them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Field lookup for structured arguments that contribute to a lock key
pub trait KeyFields {
    /// Natural string form of the named field, or `None` if there is no such field
    fn field(&self, name: &str) -> Option<String>;

    /// Read `fields` in order. Fails with the first missing field name.
    fn segments(&self, fields: &[String]) -> Result<Vec<String>, String> {
        fields
            .iter()
            .map(|name| self.field(name).ok_or_else(|| name.clone()))
            .collect()
    }
}

impl KeyFields for BTreeMap<String, String> {
    fn field(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl<S: std::hash::BuildHasher> KeyFields for HashMap<String, String, S> {
    fn field(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// One actual argument of a guarded call
#[derive(Clone, Copy)]
pub enum Arg<'a> {
    /// Absent value
    Null,
    /// Scalar with a natural string form
    Value(&'a (dyn fmt::Display + Sync)),
    /// Structured value whose fields can be read by name
    Record(&'a (dyn KeyFields + Sync)),
}

impl<'a> Arg<'a> {
    pub fn value<T: fmt::Display + Sync>(value: &'a T) -> Self {
        Arg::Value(value)
    }

    pub fn record<T: KeyFields + Sync>(record: &'a T) -> Self {
        Arg::Record(record)
    }

    /// `None` maps to [`Arg::Null`]
    pub fn optional<T: fmt::Display + Sync>(value: Option<&'a T>) -> Self {
        match value {
            Some(v) => Arg::Value(v),
            None => Arg::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Arg::Null)
    }
}

impl fmt::Debug for Arg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Null => f.write_str("Null"),
            Arg::Value(v) => f.debug_tuple("Value").field(&v.to_string()).finish(),
            Arg::Record(_) => f.write_str("Record(..)"),
        }
    }
}

/// Implement [`KeyFields`] for a struct by mapping key field names to struct fields
///
/// ```
/// struct User {
///     id: String,
///     user_name: String,
/// }
///
/// lockguard_core::key_fields!(User {
///     "id" => id,
///     "userName" => user_name,
/// });
///
/// use lockguard_core::KeyFields;
/// let user = User { id: "u1".into(), user_name: "alice".into() };
/// assert_eq!(user.field("userName").as_deref(), Some("alice"));
/// assert_eq!(user.field("email"), None);
/// ```
#[macro_export]
macro_rules! key_fields {
    ($ty:ty { $($name:literal => $field:ident),* $(,)? }) => {
        impl $crate::KeyFields for $ty {
            fn field(&self, name: &str) -> ::std::option::Option<::std::string::String> {
                match name {
                    $($name => ::std::option::Option::Some(::std::string::ToString::to_string(&self.$field)),)*
                    _ => ::std::option::Option::None,
                }
            }
        }
    };
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
