//! Column-set algebra and identifier quoting.
//!
//! All set operations match names exactly (case-sensitive) and keep the order
//! they document.

use crate::column::NullCol;
use crate::table::{Column, Namer};

/// Default identifier quote character.
pub const DEFAULT_QUOTE: char = '"';

/// Quote an identifier, doubling any embedded quote character.
pub fn quote(name: &str, q: char) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push(q);
    for ch in name.chars() {
        if ch == q {
            out.push(q);
        }
        out.push(ch);
    }
    out.push(q);
    out
}

/// `"table"."column"`
pub fn qualified(col: &dyn Column, q: char) -> String {
    format!("{}.{}", quote(col.table().name(), q), quote(col.name(), q))
}

/// Comma-joined qualified names.
pub fn column_list(cols: &[&dyn Column], q: char) -> String {
    cols.iter()
        .map(|c| qualified(*c, q))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether a column with this exact name is in the set.
pub fn has_column(set: &[&dyn Column], name: &str) -> bool {
    set.iter().any(|c| c.name() == name)
}

/// Members of `set` whose name is not in `to_exclude`, in `set` order.
pub fn exclude<'a>(set: &[&'a dyn Column], to_exclude: &[&dyn Column]) -> Vec<&'a dyn Column> {
    set.iter()
        .copied()
        .filter(|c| !has_column(to_exclude, c.name()))
        .collect()
}

/// Members of `set` whose name appears in `order`, arranged in `order`.
///
/// Names in `order` with no match in `set` are skipped.
pub fn reorder_to<'a>(set: &[&'a dyn Column], order: &[&dyn Column]) -> Vec<&'a dyn Column> {
    order
        .iter()
        .filter_map(|o| set.iter().copied().find(|c| c.name() == o.name()))
        .collect()
}

/// Align `subset` to `full`: position `i` holds the subset column named like
/// `full[i]`, or a [`NullCol`] over `full[i]` when the subset has none.
pub fn null_fill<'a>(full: &[&'a dyn Column], subset: &[&'a dyn Column]) -> Vec<Box<dyn Column + 'a>> {
    full.iter()
        .map(|f| match subset.iter().copied().find(|s| s.name() == f.name()) {
            Some(s) => Box::new(s) as Box<dyn Column + 'a>,
            None => Box::new(NullCol::new(*f)),
        })
        .collect()
}

/// Borrow a boxed column list as the slice form the builder takes.
pub fn refs<'a>(cols: &'a [Box<dyn Column + 'a>]) -> Vec<&'a dyn Column> {
    cols.iter().map(|c| c.as_ref() as &dyn Column).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Table;
    use crate::table::Table as _;

    fn people() -> Table {
        serde_json::from_str(
            r#"{"name": "people", "columns": [
                {"name": "id", "udt_name": "int4", "non_null": true, "data_type": "integer", "dimension": 0},
                {"name": "name", "udt_name": "text", "non_null": true, "data_type": "text", "dimension": 0},
                {"name": "email", "udt_name": "varchar", "non_null": false, "data_type": "character varying", "dimension": 0},
                {"name": "Age", "udt_name": "int2", "non_null": false, "data_type": "smallint", "dimension": 0}
            ]}"#,
        )
        .unwrap()
    }

    fn names(cols: &[&dyn Column]) -> Vec<String> {
        cols.iter().map(|c| c.name().to_string()).collect()
    }

    #[test]
    fn quote_doubles_embedded_quotes() {
        assert_eq!(quote("users", '"'), r#""users""#);
        assert_eq!(quote(r#"we"ird"#, '"'), r#""we""ird""#);
        assert_eq!(quote("a`b", '`'), "`a``b`");
    }

    #[test]
    fn qualified_and_column_list() {
        let t = people();
        let boxed = t.columns();
        let cols = refs(&boxed);
        assert_eq!(qualified(cols[0], '"'), r#""people"."id""#);
        assert_eq!(
            column_list(&cols[..2], '"'),
            r#""people"."id", "people"."name""#
        );
    }

    #[test]
    fn exclude_keeps_order_and_counts() {
        let t = people();
        let boxed = t.columns();
        let cols = refs(&boxed);

        let out = exclude(&cols, &[cols[1], cols[3]]);
        assert_eq!(names(&out), ["id", "email"]);
        assert_eq!(out.len(), cols.len() - 2);

        assert_eq!(exclude(&cols, &[]).len(), cols.len());
        assert!(exclude(&cols, &cols).is_empty());
    }

    #[test]
    fn exclude_is_case_sensitive() {
        let t = people();
        let other: Table = serde_json::from_str(
            r#"{"name": "x", "columns": [{"name": "age", "udt_name": "int2", "non_null": false, "data_type": "smallint", "dimension": 0}]}"#,
        )
        .unwrap();
        let boxed = t.columns();
        let cols = refs(&boxed);
        let other_boxed = other.columns();
        let lower = refs(&other_boxed);
        assert_eq!(exclude(&cols, &lower).len(), 4);
        assert!(has_column(&cols, "Age"));
        assert!(!has_column(&cols, "age"));
    }

    #[test]
    fn reorder_filters_and_reorders() {
        let t = people();
        let boxed = t.columns();
        let cols = refs(&boxed);
        let out = reorder_to(&cols[..3], &[cols[3], cols[2], cols[0]]);
        assert_eq!(names(&out), ["email", "id"]);
    }

    #[test]
    fn null_fill_aligns_to_full_set() {
        let t = people();
        let boxed = t.columns();
        let cols = refs(&boxed);
        let filled = null_fill(&cols, &[cols[2], cols[0]]);
        assert_eq!(filled.len(), cols.len());
        let filled_refs = refs(&filled);
        assert_eq!(names(&filled_refs), names(&cols));
        assert_eq!(filled[1].table().name(), "people");
        assert_eq!(filled[3].sql_type(), "int2,smallint");
        assert_eq!(format!("{:?}", filled[1].value()), "Param(SqlNull)");
    }
}
