//! Comparing variants.

use core::num::FpCategory;

use dynvar_core::MetaTypeId;

use crate::Variant;
use crate::numeric::{
    StringToBool, fuzzy_compare, is_numeric_type, numeric_type_promotion, to_number, to_real,
    to_unsigned_number,
};

fn is_finite_nonzero(d: f64) -> bool {
    matches!(d.classify(), FpCategory::Normal | FpCategory::Subnormal)
}

/// Compares two values of numeric-like types in their promoted type.
fn numeric_equals(a: &Variant, b: &Variant) -> bool {
    let promoted = numeric_type_promotion(a.type_id(), b.type_id());

    if promoted == MetaTypeId::DOUBLE {
        let (Some(x), Some(y)) = (to_real(a), to_real(b)) else {
            return false;
        };
        if x == y {
            return true;
        }
        return is_finite_nonzero(x) && is_finite_nonzero(y) && fuzzy_compare(x, y);
    }

    let mode = if promoted == MetaTypeId::BOOL {
        StringToBool::Allow
    } else {
        StringToBool::Strict
    };
    match promoted {
        MetaTypeId::ULONG_LONG => {
            // negative text keeps its two's complement bits
            let unsigned = |v: &Variant| {
                to_unsigned_number(v).or_else(|| to_number(v, mode).map(|n| n as u64))
            };
            match (unsigned(a), unsigned(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        _ => {
            let (Some(x), Some(y)) = (to_number(a, mode), to_number(b, mode)) else {
                return false;
            };
            match promoted {
                MetaTypeId::BOOL => (x != 0) == (y != 0),
                MetaTypeId::INT => x as i32 == y as i32,
                MetaTypeId::UINT => x as u32 == y as u32,
                _ => x == y,
            }
        }
    }
}

impl PartialEq for Variant {
    /// Values of different types are equal only when both are numeric-like
    /// (text counts) and they compare equal in their promoted type. Values
    /// of the same type use the type's own equality, or storage identity
    /// when it has none.
    ///
    /// The null flag plays no part.
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.type_id(), other.type_id());
        if a != b {
            return is_numeric_type(a) && is_numeric_type(b) && numeric_equals(self, other);
        }
        let (Some(info), Some(x), Some(y)) = (self.info, self.payload(), other.payload()) else {
            return !self.is_valid() && !other.is_valid();
        };
        info.equals(x, y)
            .unwrap_or_else(|| self.shares_storage_with(other))
    }
}
