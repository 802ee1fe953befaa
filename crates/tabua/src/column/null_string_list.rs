/// A nullable list of strings stored as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NullStringList {
    pub valid: bool,
    pub list: Vec<String>,
}

null_json_wrapper!(NullStringList, list: Vec<String>, "[]");

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use tokio_postgres::types::{FromSql, ToSql, Type};

    #[test]
    fn null_and_empty_differ_in_validity() {
        let mut l = NullStringList::default();
        l.scan(None).unwrap();
        assert!(l.is_zero());

        l.scan(Some(b"[]")).unwrap();
        assert!(!l.is_zero());
        assert!(l.list.is_empty());
    }

    #[test]
    fn invalid_encodes_as_empty_array() {
        let l = NullStringList::new(vec!["a".into()], false);
        assert_eq!(l.to_json().unwrap(), b"[]");
        assert_eq!(serde_json::to_string(&l).unwrap(), "[]");
    }

    #[test]
    fn reads_text_and_bytea_columns() {
        let l = NullStringList::from_sql(&Type::TEXT, br#"["x","y"]"#).unwrap();
        assert_eq!(l.list, ["x", "y"]);
        assert!(l.valid);

        let l = NullStringList::from_sql(&Type::BYTEA, b"[]").unwrap();
        assert!(l.valid);

        assert!(NullStringList::from_sql(&Type::TEXT, b"[1,").is_err());
    }

    #[test]
    fn writes_plain_json_for_text_columns() {
        let l = NullStringList::from_value(vec!["x".into()]);
        let mut buf = BytesMut::new();
        l.to_sql(&Type::VARCHAR, &mut buf).unwrap();
        assert_eq!(&buf[..], br#"["x"]"#);
    }
}
