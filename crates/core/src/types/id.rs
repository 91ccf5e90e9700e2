//! Newtype IDs for type-safe entity references.
//!
//! The API uses integer primary keys for users and products. Wrapping them
//! keeps a product id from being passed where a user id is expected.

/// Define one or more `i32` ID wrappers.
///
/// Each wrapper is serde-transparent (a bare number on the wire), `Copy`,
/// hashable and ordered, displays and parses as the bare number, and converts
/// to and from `i32`.
///
/// # Example
///
/// ```rust
/// # use stockwatch_core::define_id;
/// define_id!(AisleId, ShelfId);
///
/// let aisle: AisleId = "2".parse().unwrap();
/// assert_eq!(aisle, AisleId::new(2));
/// assert_eq!(ShelfId::from(4).to_string(), "4");
/// ```
#[macro_export]
macro_rules! define_id {
    ($($name:ident),+ $(,)?) => {
        $(
            #[derive(
                Debug,
                Clone,
                Copy,
                PartialEq,
                Eq,
                PartialOrd,
                Ord,
                Hash,
                ::serde::Serialize,
                ::serde::Deserialize
            )]
            #[serde(transparent)]
            pub struct $name(i32);

            impl $name {
                #[must_use]
                pub const fn new(id: i32) -> Self {
                    Self(id)
                }

                /// The raw key.
                #[must_use]
                pub const fn get(self) -> i32 {
                    self.0
                }
            }

            impl ::core::fmt::Display for $name {
                fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                    ::core::fmt::Display::fmt(&self.0, f)
                }
            }

            impl ::core::str::FromStr for $name {
                type Err = ::core::num::ParseIntError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    s.trim().parse().map(Self)
                }
            }

            impl From<i32> for $name {
                fn from(id: i32) -> Self {
                    Self(id)
                }
            }

            impl From<$name> for i32 {
                fn from(id: $name) -> Self {
                    id.0
                }
            }
        )+
    };
}

define_id!(UserId, ProductId);
