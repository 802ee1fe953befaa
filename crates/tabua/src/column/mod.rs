//! Column helpers: the null stand-in column, JSON-backed nullable wrappers,
//! and scalar values for catalog types the driver has no Rust type for.
//!
//! The wrappers store a collection as JSON in `json`, `jsonb`, text-like, or
//! `bytea` columns. A SQL `NULL` reads back as an invalid, empty wrapper; an
//! invalid wrapper is written as an empty collection (`{}` or `[]`), never as
//! `NULL`.

/// Implements the shared nullable-JSON contract for a `{ valid, <field> }`
/// wrapper whose field type is a `Default` serde collection.
macro_rules! null_json_wrapper {
    ($name:ident, $field:ident: $ty:ty, $empty:literal) => {
        impl $name {
            /// Create a wrapper with an explicit validity flag.
            pub fn new($field: $ty, valid: bool) -> Self {
                Self { valid, $field }
            }

            /// Create a valid wrapper.
            pub fn from_value($field: $ty) -> Self {
                Self::new($field, true)
            }

            /// Replace the value and mark the wrapper valid.
            pub fn set_valid(&mut self, $field: $ty) {
                self.$field = $field;
                self.valid = true;
            }

            /// `true` for a null wrapper.
            pub fn is_zero(&self) -> bool {
                !self.valid
            }

            /// Load from a raw column value.
            ///
            /// `None` resets to an invalid, empty wrapper. Malformed JSON leaves
            /// the wrapper untouched and returns a decode error.
            pub fn scan(&mut self, src: Option<&[u8]>) -> $crate::error::TabuaResult<()> {
                match src {
                    None => {
                        self.$field = <$ty>::default();
                        self.valid = false;
                    }
                    Some(raw) => {
                        self.$field = serde_json::from_slice(raw)?;
                        self.valid = true;
                    }
                }
                Ok(())
            }

            /// JSON encoding; an invalid wrapper encodes as an empty collection.
            pub fn to_json(&self) -> $crate::error::TabuaResult<Vec<u8>> {
                if !self.valid {
                    return Ok($empty.as_bytes().to_vec());
                }
                Ok(serde_json::to_vec(&self.$field)?)
            }
        }

        impl From<$ty> for $name {
            fn from($field: $ty) -> Self {
                Self::from_value($field)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if self.valid {
                    serde::Serialize::serialize(&self.$field, serializer)
                } else {
                    serde::Serialize::serialize(&<$ty>::default(), serializer)
                }
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                Ok(match <Option<$ty> as serde::Deserialize>::deserialize(deserializer)? {
                    Some($field) => Self::from_value($field),
                    None => Self::default(),
                })
            }
        }

        impl tokio_postgres::types::ToSql for $name {
            fn to_sql(
                &self,
                ty: &tokio_postgres::types::Type,
                out: &mut bytes::BytesMut,
            ) -> Result<tokio_postgres::types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
                if *ty == tokio_postgres::types::Type::JSONB {
                    out.extend_from_slice(&[$crate::column::JSONB_VERSION]);
                }
                out.extend_from_slice(&self.to_json()?);
                Ok(tokio_postgres::types::IsNull::No)
            }

            fn accepts(ty: &tokio_postgres::types::Type) -> bool {
                $crate::column::accepts_json_storage(ty)
            }

            tokio_postgres::types::to_sql_checked!();
        }

        impl<'a> tokio_postgres::types::FromSql<'a> for $name {
            fn from_sql(
                ty: &tokio_postgres::types::Type,
                raw: &'a [u8],
            ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
                let mut value = Self::default();
                value.scan(Some($crate::column::strip_jsonb_version(ty, raw)?))?;
                Ok(value)
            }

            fn from_sql_null(
                _ty: &tokio_postgres::types::Type,
            ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
                Ok(Self::default())
            }

            fn accepts(ty: &tokio_postgres::types::Type) -> bool {
                $crate::column::accepts_json_storage(ty)
            }
        }
    };
}

mod null_col;
mod null_map;
mod null_map_list;
mod null_string_list;
mod scalar;

pub use null_col::{Discard, NullCol};
pub use null_map::NullStringMap;
pub use null_map_list::NullMapList;
pub use null_string_list::NullStringList;
pub use scalar::{Bits, Numeric, ParseValueError, TimeTz, Uuid};

use tokio_postgres::types::Type;

/// Leading version byte of the binary `jsonb` format.
pub(crate) const JSONB_VERSION: u8 = 1;

/// Column types a JSON wrapper can be stored in.
pub(crate) fn accepts_json_storage(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::JSON | Type::JSONB | Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::BYTEA
    )
}

pub(crate) fn strip_jsonb_version<'a>(
    ty: &Type,
    raw: &'a [u8],
) -> Result<&'a [u8], Box<dyn std::error::Error + Sync + Send>> {
    if *ty != Type::JSONB {
        return Ok(raw);
    }
    match raw.split_first() {
        Some((&JSONB_VERSION, rest)) => Ok(rest),
        Some((version, _)) => Err(format!("unsupported jsonb version number {version}").into()),
        None => Err("empty jsonb value".into()),
    }
}
