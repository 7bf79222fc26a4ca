//! Registration of the variant's own container types.

use std::collections::{BTreeMap, HashMap};
use std::sync::Once;

use dynvar_core::{MetaTypeId, TypeBuilder, TypeRegistry};

use crate::Variant;

/// A list of variants.
pub type VariantList = Vec<Variant>;

/// Variants keyed by text, in key order.
pub type VariantMap = BTreeMap<String, Variant>;

/// Variants keyed by text, unordered.
pub type VariantHash = HashMap<String, Variant>;

static REGISTER: Once = Once::new();

/// The global [`TypeRegistry`], with the variant types registered.
///
/// Every entry point of this crate goes through here, so the variant, list,
/// map and hash ids are usable before any value of those types exists.
pub fn registry() -> &'static TypeRegistry {
    let registry = TypeRegistry::global();
    REGISTER.call_once(|| register_variant_types(registry));
    registry
}

fn register_variant_types(registry: &TypeRegistry) {
    let results = [
        registry.register_with_id(
            MetaTypeId::VARIANT,
            TypeBuilder::<Variant>::new("Variant").eq().debug().streamable(),
        ),
        registry.register_with_id(
            MetaTypeId::VARIANT_LIST,
            TypeBuilder::<VariantList>::new("VariantList")
                .eq()
                .debug()
                .streamable()
                .sequential(),
        ),
        registry.register_with_id(
            MetaTypeId::VARIANT_MAP,
            TypeBuilder::<VariantMap>::new("VariantMap")
                .eq()
                .debug()
                .streamable()
                .associative(),
        ),
        registry.register_with_id(
            MetaTypeId::VARIANT_HASH,
            TypeBuilder::<VariantHash>::new("VariantHash")
                .eq()
                .debug()
                .streamable()
                .associative(),
        ),
    ];
    for result in results {
        if let Err(err) = result {
            tracing::error!("cannot register variant type: {err}");
        }
    }
}
