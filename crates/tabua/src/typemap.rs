//! Catalog type → target representation.
//!
//! The decision is a static table keyed by a normalized catalog type name.
//! Array shape is applied afterwards as an explicit wrapping step.

use std::fmt;

/// The representation chosen for a catalog type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetType {
    I32,
    I64,
    F32,
    F64,
    String,
    /// Raw byte sequence. Used for binary types and as the unrecognized fallback.
    Bytes,
    Bool,
    Timestamp,
    /// Structured JSON text.
    Json,
    NullInt,
    NullFloat,
    NullString,
    NullBool,
    NullTimestamp,
    NullJson,
    /// A sequence of the inner type (one array dimension).
    Seq(Box<TargetType>),
}

impl TargetType {
    /// Wrap `self` in `dimension` sequence levels.
    pub fn wrap(self, dimension: usize) -> Self {
        (0..dimension).fold(self, |inner, _| TargetType::Seq(Box::new(inner)))
    }

    /// Number of sequence levels around the scalar type.
    pub fn depth(&self) -> usize {
        match self {
            TargetType::Seq(inner) => 1 + inner.depth(),
            _ => 0,
        }
    }

    /// The scalar type under all sequence levels.
    pub fn scalar(&self) -> &TargetType {
        match self {
            TargetType::Seq(inner) => inner.scalar(),
            other => other,
        }
    }

    /// Whether the scalar is one of the nullable wrappers.
    pub fn is_nullable(&self) -> bool {
        matches!(
            self.scalar(),
            TargetType::NullInt
                | TargetType::NullFloat
                | TargetType::NullString
                | TargetType::NullBool
                | TargetType::NullTimestamp
                | TargetType::NullJson
        )
    }

    /// Rust rendering of the representation. Generated code binds through
    /// [`bind_type`], which narrows it to the exact catalog type.
    pub fn rust_type(&self) -> String {
        match self {
            TargetType::I32 => "i32".to_string(),
            TargetType::I64 => "i64".to_string(),
            TargetType::F32 => "f32".to_string(),
            TargetType::F64 => "f64".to_string(),
            TargetType::String => "String".to_string(),
            TargetType::Bytes => "Vec<u8>".to_string(),
            TargetType::Bool => "bool".to_string(),
            TargetType::Timestamp => "chrono::DateTime<chrono::Utc>".to_string(),
            TargetType::Json => "serde_json::Value".to_string(),
            TargetType::NullInt => "Option<i64>".to_string(),
            TargetType::NullFloat => "Option<f64>".to_string(),
            TargetType::NullString => "Option<String>".to_string(),
            TargetType::NullBool => "Option<bool>".to_string(),
            TargetType::NullTimestamp => "Option<chrono::DateTime<chrono::Utc>>".to_string(),
            TargetType::NullJson => "Option<serde_json::Value>".to_string(),
            TargetType::Seq(inner) => format!("Vec<{}>", inner.rust_type()),
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rust_type())
    }
}

/// Type family of a normalized catalog name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Int,
    BigInt,
    Float,
    Double,
    Text,
    Binary,
    Bool,
    Time,
    Decimal,
    Json,
}

impl Family {
    fn target(self, non_null: bool) -> TargetType {
        match (self, non_null) {
            (Family::Int, true) => TargetType::I32,
            (Family::BigInt, true) => TargetType::I64,
            (Family::Int | Family::BigInt, false) => TargetType::NullInt,
            (Family::Float, true) => TargetType::F32,
            (Family::Double, true) => TargetType::F64,
            (Family::Float | Family::Double, false) => TargetType::NullFloat,
            // Exact numerics stay textual so no precision is lost.
            (Family::Text | Family::Decimal, true) => TargetType::String,
            (Family::Text | Family::Decimal, false) => TargetType::NullString,
            (Family::Binary, _) => TargetType::Bytes,
            (Family::Bool, true) => TargetType::Bool,
            (Family::Bool, false) => TargetType::NullBool,
            (Family::Time, true) => TargetType::Timestamp,
            (Family::Time, false) => TargetType::NullTimestamp,
            (Family::Json, true) => TargetType::Json,
            (Family::Json, false) => TargetType::NullJson,
        }
    }
}

fn family(normalized: &str) -> Option<Family> {
    let family = match normalized {
        "bit" | "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "int2" | "int4"
        | "serial" | "smallserial" | "serial2" | "serial4" => Family::Int,
        "bigint" | "int8" | "bigserial" | "serial8" => Family::BigInt,
        "float" | "real" | "float4" => Family::Float,
        "double" | "double precision" | "float8" => Family::Double,
        "char" | "character" | "varchar" | "nvarchar" | "bpchar" | "tinytext" | "text"
        | "mediumtext" | "longtext" | "name" | "enum" | "set" | "uuid" | "clob" => Family::Text,
        "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" | "bytea" => {
            Family::Binary
        }
        "bool" | "boolean" => Family::Bool,
        "date" | "datetime" | "time" | "timetz" | "timestamp" | "timestamptz" | "timestampz" => {
            Family::Time
        }
        "decimal" | "numeric" => Family::Decimal,
        "json" | "jsonb" => Family::Json,
        _ => return None,
    };
    Some(family)
}

/// Normalize a catalog type name: lowercase, strip `(…)` typmods, collapse
/// whitespace, fold common synonyms.
pub fn normalize_type_name(name: &str) -> String {
    let mut s = name.trim().to_lowercase();

    // `varchar(255)`, `timestamp(3) with time zone`, `numeric(10,2)`, ...
    while let Some(start) = s.find('(') {
        let Some(end) = s[start..].find(')') else {
            break;
        };
        s.replace_range(start..start + end + 1, "");
    }

    let s = s.split_whitespace().collect::<Vec<_>>().join(" ");

    match s.as_str() {
        "character varying" => "varchar".to_string(),
        "timestamp with time zone" => "timestamptz".to_string(),
        "timestamp without time zone" => "timestamp".to_string(),
        "time with time zone" => "timetz".to_string(),
        "time without time zone" => "time".to_string(),
        _ => s,
    }
}

/// Map a catalog type to its target representation.
///
/// Returns the resolved type and whether the name was recognized. An
/// unrecognized name resolves to [`TargetType::Bytes`] with `false`; callers
/// holding a generic data type name should retry with it first (see
/// [`resolve_column_type`]).
///
/// A leading `_` marks an array type; it implies at least one sequence level
/// even when `dimension` is 0.
pub fn map_type(name: &str, dimension: usize, non_null: bool) -> (TargetType, bool) {
    let normalized = normalize_type_name(name);
    let (base, array_prefix) = match normalized.strip_prefix('_') {
        Some(base) => (base, true),
        None => (normalized.as_str(), false),
    };

    let (scalar, ok) = match family(base) {
        Some(f) => (f.target(non_null), true),
        None => (TargetType::Bytes, false),
    };

    let depth = if array_prefix { dimension.max(1) } else { dimension };
    (scalar.wrap(depth), ok)
}

/// Resolve a reversed column's type: try the catalog-specific `udt_name`,
/// then the generic `data_type`, then fall back to bytes.
///
/// The array shape derived from `udt_name` is kept when falling back.
pub fn resolve_column_type(
    udt_name: &str,
    data_type: &str,
    dimension: usize,
    non_null: bool,
) -> (TargetType, bool) {
    let (udt, ok) = map_type(udt_name, dimension, non_null);
    if ok {
        return (udt, true);
    }

    let depth = udt.depth();
    let (generic, ok) = map_type(data_type, 0, non_null);
    if ok {
        return (generic.scalar().clone().wrap(depth), true);
    }
    (udt, false)
}

/// Rust type a generated column binds through.
///
/// [`TargetType`] names the representation family; this picks the concrete
/// type the driver accepts for the exact catalog type: `int2` binds as `i16`,
/// `timestamp` as `chrono::NaiveDateTime`, `numeric` as the crate's
/// [`Numeric`](crate::column::Numeric), and so on. `tabua_path` prefixes the
/// crate's own column types. Lookup order and array shape follow
/// [`resolve_column_type`]; an unrecognized type binds as bytes with `false`.
pub fn bind_type(
    udt_name: &str,
    data_type: &str,
    dimension: usize,
    non_null: bool,
    tabua_path: &str,
) -> (String, bool) {
    let udt = normalize_type_name(udt_name);
    let (udt_base, array_prefix) = match udt.strip_prefix('_') {
        Some(base) => (base.to_string(), true),
        None => (udt.clone(), false),
    };
    let depth = if array_prefix { dimension.max(1) } else { dimension };

    let generic = normalize_type_name(data_type);
    let resolved = family(&udt_base)
        .map(|f| (udt_base.as_str(), f))
        .or_else(|| family(&generic).map(|f| (generic.as_str(), f)));

    let (scalar, ok) = match resolved {
        Some((name, f)) => {
            let scalar = bind_scalar(name, f, tabua_path);
            if non_null || f == Family::Binary {
                (scalar, true)
            } else {
                (format!("Option<{scalar}>"), true)
            }
        }
        None => ("Vec<u8>".to_string(), false),
    };

    let wrapped = (0..depth).fold(scalar, |inner, _| format!("Vec<{inner}>"));
    (wrapped, ok)
}

fn bind_scalar(name: &str, family: Family, tabua_path: &str) -> String {
    let ty = match (family, name) {
        (Family::Int, "bit") => return format!("{tabua_path}::Bits"),
        (Family::Int, "tinyint" | "smallint" | "int2" | "smallserial" | "serial2") => "i16",
        (Family::Int, _) => "i32",
        (Family::BigInt, _) => "i64",
        (Family::Float, _) => "f32",
        (Family::Double, _) => "f64",
        (Family::Text, "uuid") => return format!("{tabua_path}::Uuid"),
        // PostgreSQL's single-byte `"char"`; fixed-width text reports `bpchar`.
        (Family::Text, "char") => "i8",
        (Family::Text, _) => "String",
        (Family::Binary, _) => "Vec<u8>",
        (Family::Bool, _) => "bool",
        (Family::Time, "date") => "chrono::NaiveDate",
        (Family::Time, "time") => "chrono::NaiveTime",
        (Family::Time, "timetz") => return format!("{tabua_path}::TimeTz"),
        (Family::Time, "timestamptz" | "timestampz") => "chrono::DateTime<chrono::Utc>",
        (Family::Time, _) => "chrono::NaiveDateTime",
        (Family::Decimal, _) => return format!("{tabua_path}::Numeric"),
        (Family::Json, _) => "serde_json::Value",
    };
    ty.to_string()
}
