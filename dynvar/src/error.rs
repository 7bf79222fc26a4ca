use core::fmt;

use dynvar_core::MetaTypeId;

/// Why a [`Variant`](crate::Variant) could not be converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertError {
    /// No conversion exists between the two types.
    Unsupported {
        /// Source type.
        from: MetaTypeId,
        /// Requested type.
        to: MetaTypeId,
    },
    /// The source was never initialized, or a previous conversion failed.
    NullSource {
        /// Source type.
        from: MetaTypeId,
        /// Requested type.
        to: MetaTypeId,
    },
    /// The types convert in principle but this value does not, such as
    /// text that is not a number.
    InvalidData {
        /// Source type.
        from: MetaTypeId,
        /// Requested type.
        to: MetaTypeId,
    },
}

impl ConvertError {
    /// The source type.
    pub fn source_type(&self) -> MetaTypeId {
        match *self {
            ConvertError::Unsupported { from, .. }
            | ConvertError::NullSource { from, .. }
            | ConvertError::InvalidData { from, .. } => from,
        }
    }

    /// The requested type.
    pub fn target_type(&self) -> MetaTypeId {
        match *self {
            ConvertError::Unsupported { to, .. }
            | ConvertError::NullSource { to, .. }
            | ConvertError::InvalidData { to, .. } => to,
        }
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::Unsupported { from, to } => {
                write!(f, "no conversion from type {from:?} to type {to:?}")
            }
            ConvertError::NullSource { from, to } => {
                write!(f, "cannot convert a null {from:?} to {to:?}")
            }
            ConvertError::InvalidData { from, to } => {
                write!(f, "value of type {from:?} does not convert to {to:?}")
            }
        }
    }
}

impl core::error::Error for ConvertError {}
