use std::collections::HashMap;

/// A nullable `text -> text` map stored as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NullStringMap {
    pub valid: bool,
    pub map: HashMap<String, String>,
}

null_json_wrapper!(NullStringMap, map: HashMap<String, String>, "{}");

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use tokio_postgres::types::{FromSql, ToSql, Type};

    fn sample() -> HashMap<String, String> {
        HashMap::from([("lang".to_string(), "pt".to_string())])
    }

    #[test]
    fn scan_null_resets_to_invalid_empty() {
        let mut m = NullStringMap::from_value(sample());
        m.scan(None).unwrap();
        assert!(!m.valid);
        assert!(m.is_zero());
        assert!(m.map.is_empty());
    }

    #[test]
    fn scan_bytes_marks_valid() {
        let mut m = NullStringMap::default();
        m.scan(Some(br#"{"lang":"pt"}"#)).unwrap();
        assert!(m.valid);
        assert_eq!(m.map, sample());
    }

    #[test]
    fn scan_malformed_is_decode_error() {
        let mut m = NullStringMap::default();
        assert!(m.scan(Some(b"{not json")).is_err());
        assert!(!m.valid);
    }

    #[test]
    fn invalid_encodes_as_empty_object() {
        let m = NullStringMap::new(sample(), false);
        assert_eq!(m.to_json().unwrap(), b"{}");
        assert_eq!(serde_json::to_string(&m).unwrap(), "{}");

        let mut buf = BytesMut::new();
        m.to_sql(&Type::JSON, &mut buf).unwrap();
        assert_eq!(&buf[..], b"{}");
    }

    #[test]
    fn set_valid_replaces_value() {
        let mut m = NullStringMap::default();
        m.set_valid(sample());
        assert!(m.valid);
        assert_eq!(serde_json::to_string(&m).unwrap(), r#"{"lang":"pt"}"#);
    }

    #[test]
    fn jsonb_round_trip_through_driver_format() {
        let m = NullStringMap::from(sample());
        let mut buf = BytesMut::new();
        m.to_sql(&Type::JSONB, &mut buf).unwrap();
        assert_eq!(buf[0], 1);

        let back = NullStringMap::from_sql(&Type::JSONB, &buf).unwrap();
        assert_eq!(back, m);

        let null = NullStringMap::from_sql_nullable(&Type::JSONB, None).unwrap();
        assert!(null.is_zero());
        assert!(!<NullStringMap as ToSql>::accepts(&Type::INT8));
    }

    #[test]
    fn deserialize_null_is_invalid() {
        let m: NullStringMap = serde_json::from_str("null").unwrap();
        assert!(!m.valid);
        let m: NullStringMap = serde_json::from_str("{}").unwrap();
        assert!(m.valid);
        assert!(m.map.is_empty());
    }
}
