use core::fmt;

use crate::Variant;

/// Renders the held value through the type's debug operation, falling back
/// to its text form.
struct Value<'a>(&'a Variant);

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variant = self.0;
        if let (Some(info), Some(payload)) = (variant.info, variant.payload())
            && let Some(debug) = info.vtable.debug
        {
            return debug(payload, f);
        }
        match variant.try_value::<String>() {
            Some(text) => f.write_str(&text),
            None => f.write_str("<no debug>"),
        }
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.type_name() {
            Some(name) => f
                .debug_tuple("Variant")
                .field(&format_args!("{name}"))
                .field(&Value(self))
                .finish(),
            None => f.write_str("Variant(Invalid)"),
        }
    }
}

impl fmt::Display for Variant {
    /// The value converted to a string; nothing when it has no text form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_value::<String>() {
            Some(text) => f.write_str(&text),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VariantList;
    use dynvar_core::{MetaTypeId, Point};

    #[test]
    fn debug_names_the_type() {
        dynvar_testhelpers::setup();
        insta::assert_snapshot!(format!("{:?}", Variant::from(42)), @"Variant(i32, 42)");
        insta::assert_snapshot!(format!("{:?}", Variant::from("hi")), @r#"Variant(String, "hi")"#);
        insta::assert_snapshot!(format!("{:?}", Variant::new()), @"Variant(Invalid)");
        insta::assert_snapshot!(
            format!("{:?}", Variant::from(Point { x: 1, y: 2 })),
            @"Variant(Point, Point { x: 1, y: 2 })"
        );
    }

    #[test]
    fn nested_variants_render_recursively() {
        dynvar_testhelpers::setup();
        let list: VariantList = vec![Variant::from(true), Variant::from(1.5)];
        insta::assert_snapshot!(
            format!("{:?}", Variant::from(list)),
            @"Variant(VariantList, [Variant(bool, true), Variant(f64, 1.5)])"
        );
    }

    #[test]
    fn display_is_the_string_conversion() {
        dynvar_testhelpers::setup();
        assert_eq!(Variant::from(3.14).to_string(), "3.14");
        assert_eq!(Variant::from(true).to_string(), "true");
        assert_eq!(Variant::with_type(MetaTypeId::RECT).to_string(), "");
        assert_eq!(Variant::new().to_string(), "");
    }
}
