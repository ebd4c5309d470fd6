//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_gid!` macro to create type-safe wrappers around Shopify
//! global IDs (`gid://shopify/Product/123`) that prevent accidentally
//! mixing IDs from different entity types.

/// Macro to define a type-safe global-ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`
/// - `From<String>` and `From<&str>` implementations
///
/// # Example
///
/// ```rust
/// # use marginalia_core::define_gid;
/// define_gid!(WidgetId);
/// define_gid!(GadgetId);
///
/// let widget = WidgetId::new("gid://shopify/Widget/1");
///
/// // These are different types, so this won't compile:
/// // let _: GadgetId = widget;
/// ```
#[macro_export]
macro_rules! define_gid {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from a global-ID string.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying ID string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Define standard entity IDs
define_gid!(ProductId);
define_gid!(VariantId);
define_gid!(OrderId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_roundtrip() {
        let id = ProductId::new("gid://shopify/Product/42");
        assert_eq!(id.as_str(), "gid://shopify/Product/42");
        assert_eq!(id.to_string(), "gid://shopify/Product/42");
    }

    #[test]
    fn test_ids_are_ordered() {
        let a = ProductId::new("gid://shopify/Product/1");
        let b = ProductId::new("gid://shopify/Product/2");
        assert!(a < b);
    }

    #[test]
    fn test_serde_transparent() {
        let id = OrderId::new("gid://shopify/Order/7");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"gid://shopify/Order/7\"");
    }
}
