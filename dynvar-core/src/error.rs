use core::fmt;

use crate::MetaTypeId;

/// Errors reported when registering types or converters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The id lies outside the range reserved for builtin types.
    IdOutOfRange(MetaTypeId),
    /// Another Rust type already holds the id.
    IdTaken(MetaTypeId),
    /// A converter names a Rust type that was never registered.
    UnregisteredType(&'static str),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::IdOutOfRange(id) => write!(f, "type id {id} is not a builtin id"),
            RegistryError::IdTaken(id) => write!(f, "type id {id} is already registered"),
            RegistryError::UnregisteredType(name) => write!(f, "type {name} is not registered"),
        }
    }
}

impl core::error::Error for RegistryError {}
