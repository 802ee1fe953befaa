//! Scalar column values the driver has no built-in Rust type for.
//!
//! Each type keeps a text form (`Display`/`FromStr`, serde as a string) and
//! speaks the binary wire format of its catalog type.

use bytes::{BufMut, BytesMut};
use chrono::{FixedOffset, NaiveTime, Offset, Timelike, Utc};
use std::error::Error;
use std::fmt;
use std::str::FromStr;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};

type BoxError = Box<dyn Error + Sync + Send>;

/// A text form that does not parse as the named catalog type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} value: {input:?}")]
pub struct ParseValueError {
    kind: &'static str,
    input: String,
}

impl ParseValueError {
    fn new(kind: &'static str, input: &str) -> Self {
        Self {
            kind,
            input: input.to_string(),
        }
    }
}

macro_rules! text_serde {
    ($name:ident) => {
        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fn take<'a>(raw: &mut &'a [u8], n: usize, kind: &str) -> Result<&'a [u8], BoxError> {
    if raw.len() < n {
        return Err(format!("truncated {kind} value").into());
    }
    let (head, rest) = raw.split_at(n);
    *raw = rest;
    Ok(head)
}

fn take_i16(raw: &mut &[u8], kind: &str) -> Result<i16, BoxError> {
    let b = take(raw, 2, kind)?;
    Ok(i16::from_be_bytes([b[0], b[1]]))
}

fn take_u16(raw: &mut &[u8], kind: &str) -> Result<u16, BoxError> {
    let b = take(raw, 2, kind)?;
    Ok(u16::from_be_bytes([b[0], b[1]]))
}

fn take_i32(raw: &mut &[u8], kind: &str) -> Result<i32, BoxError> {
    let b = take(raw, 4, kind)?;
    Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn take_i64(raw: &mut &[u8], kind: &str) -> Result<i64, BoxError> {
    let b = take(raw, 8, kind)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(b);
    Ok(i64::from_be_bytes(buf))
}

/// A `uuid` value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uuid([u8; 16]);

impl Uuid {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl FromStr for Uuid {
    type Err = ParseValueError;

    /// Accepts the hyphenated and the plain 32-digit hex forms, with or
    /// without braces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseValueError::new("uuid", s);
        let trimmed = s
            .trim()
            .strip_prefix('{')
            .and_then(|t| t.strip_suffix('}'))
            .unwrap_or(s.trim());
        let hex: Vec<u8> = trimmed.bytes().filter(|b| *b != b'-').collect();
        if hex.len() != 32
            || trimmed.len() - hex.len() > 4
            || !hex.iter().all(u8::is_ascii_hexdigit)
        {
            return Err(err());
        }

        let mut bytes = [0u8; 16];
        for (i, pair) in hex.chunks(2).enumerate() {
            let pair = std::str::from_utf8(pair).map_err(|_| err())?;
            bytes[i] = u8::from_str_radix(pair, 16).map_err(|_| err())?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

text_serde!(Uuid);

impl ToSql for Uuid {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        out.extend_from_slice(&self.0);
        Ok(IsNull::No)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::UUID
    }

    to_sql_checked!();
}

impl<'a> FromSql<'a> for Uuid {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let bytes: [u8; 16] = raw
            .try_into()
            .map_err(|_| format!("invalid uuid length {}", raw.len()))?;
        Ok(Self(bytes))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::UUID
    }
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// An exact `numeric` value kept as its decimal text, so no precision is lost.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Numeric(String);

impl Numeric {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Numeric {
    fn default() -> Self {
        Self("0".to_string())
    }
}

impl FromStr for Numeric {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if matches!(t, "NaN" | "Infinity" | "-Infinity") {
            return Ok(Self(t.to_string()));
        }
        let unsigned = t.strip_prefix(['-', '+']).unwrap_or(t);
        let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let digits_only = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if (int.is_empty() && frac.is_empty()) || !digits_only(int) || !digits_only(frac) {
            return Err(ParseValueError::new("numeric", s));
        }
        Ok(Self(t.to_string()))
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

text_serde!(Numeric);

impl ToSql for Numeric {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        let special = match self.0.as_str() {
            "NaN" => Some(NUMERIC_NAN),
            "Infinity" => Some(NUMERIC_PINF),
            "-Infinity" => Some(NUMERIC_NINF),
            _ => None,
        };
        if let Some(sign) = special {
            out.put_i16(0);
            out.put_i16(0);
            out.put_u16(sign);
            out.put_u16(0);
            return Ok(IsNull::No);
        }

        let (sign, unsigned) = match self.0.strip_prefix('-') {
            Some(rest) => (NUMERIC_NEG, rest),
            None => (NUMERIC_POS, self.0.strip_prefix('+').unwrap_or(&self.0)),
        };
        let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let dscale = u16::try_from(frac.len()).map_err(|_| "numeric scale out of range")?;

        // Base-10000 groups aligned on the decimal point.
        let int_pad = (4 - int.len() % 4) % 4;
        let frac_pad = (4 - frac.len() % 4) % 4;
        let int_digits = "0".repeat(int_pad) + int;
        let frac_digits = frac.to_string() + &"0".repeat(frac_pad);
        let mut groups = Vec::new();
        for chunk in int_digits.as_bytes().chunks(4).chain(frac_digits.as_bytes().chunks(4)) {
            groups.push(std::str::from_utf8(chunk)?.parse::<i16>()?);
        }

        let mut weight = i16::try_from(int_digits.len() / 4).map_err(|_| "numeric too large")? - 1;
        let leading = groups.iter().take_while(|g| **g == 0).count();
        groups.drain(..leading);
        weight -= i16::try_from(leading).map_err(|_| "numeric too large")?;
        while groups.last() == Some(&0) {
            groups.pop();
        }
        if groups.is_empty() {
            weight = 0;
        }
        let sign = if groups.is_empty() { NUMERIC_POS } else { sign };

        out.put_i16(i16::try_from(groups.len()).map_err(|_| "numeric too large")?);
        out.put_i16(weight);
        out.put_u16(sign);
        out.put_u16(dscale);
        for g in groups {
            out.put_i16(g);
        }
        Ok(IsNull::No)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }

    to_sql_checked!();
}

impl<'a> FromSql<'a> for Numeric {
    fn from_sql(_ty: &Type, mut raw: &'a [u8]) -> Result<Self, BoxError> {
        let ndigits = take_i16(&mut raw, "numeric")?;
        let weight = i32::from(take_i16(&mut raw, "numeric")?);
        let sign = take_u16(&mut raw, "numeric")?;
        let dscale = usize::from(take_u16(&mut raw, "numeric")?);
        let mut groups = Vec::with_capacity(ndigits.max(0) as usize);
        for _ in 0..ndigits {
            groups.push(take_i16(&mut raw, "numeric")?);
        }

        match sign {
            NUMERIC_NAN => return Ok(Self("NaN".to_string())),
            NUMERIC_PINF => return Ok(Self("Infinity".to_string())),
            NUMERIC_NINF => return Ok(Self("-Infinity".to_string())),
            NUMERIC_POS | NUMERIC_NEG => {}
            other => return Err(format!("invalid numeric sign {other:#x}").into()),
        }

        let group = |k: i32| -> i16 {
            usize::try_from(k)
                .ok()
                .and_then(|k| groups.get(k).copied())
                .unwrap_or(0)
        };

        let mut out = String::new();
        if sign == NUMERIC_NEG {
            out.push('-');
        }
        if weight < 0 {
            out.push('0');
        } else {
            for k in 0..=weight {
                if k == 0 {
                    out.push_str(&group(k).to_string());
                } else {
                    out.push_str(&format!("{:04}", group(k)));
                }
            }
        }
        if dscale > 0 {
            let mut frac = String::new();
            let mut k = weight + 1;
            while frac.len() < dscale {
                frac.push_str(&format!("{:04}", group(k)));
                k += 1;
            }
            frac.truncate(dscale);
            out.push('.');
            out.push_str(&frac);
        }
        Ok(Self(out))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// A `bit`/`varbit` string, kept as its `0`/`1` text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bits(String);

impl Bits {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for Bits {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.bytes().all(|b| b == b'0' || b == b'1') {
            return Err(ParseValueError::new("bit", s));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

text_serde!(Bits);

impl ToSql for Bits {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        out.put_i32(i32::try_from(self.0.len()).map_err(|_| "bit string too long")?);
        for chunk in self.0.as_bytes().chunks(8) {
            let byte = chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, b)| acc | (u8::from(*b == b'1') << (7 - i)));
            out.put_u8(byte);
        }
        Ok(IsNull::No)
    }

    fn accepts(ty: &Type) -> bool {
        matches!(*ty, Type::BIT | Type::VARBIT)
    }

    to_sql_checked!();
}

impl<'a> FromSql<'a> for Bits {
    fn from_sql(_ty: &Type, mut raw: &'a [u8]) -> Result<Self, BoxError> {
        let len = usize::try_from(take_i32(&mut raw, "bit")?)?;
        if raw.len() != len.div_ceil(8) {
            return Err(format!("invalid bit string length {len}").into());
        }
        let text = (0..len)
            .map(|i| if raw[i / 8] & (0x80 >> (i % 8)) != 0 { '1' } else { '0' })
            .collect();
        Ok(Self(text))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(*ty, Type::BIT | Type::VARBIT)
    }
}

/// A `timetz` value: time of day plus a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeTz {
    pub time: NaiveTime,
    pub offset: FixedOffset,
}

impl TimeTz {
    pub fn new(time: NaiveTime, offset: FixedOffset) -> Self {
        Self { time, offset }
    }
}

impl Default for TimeTz {
    fn default() -> Self {
        Self::new(NaiveTime::default(), Utc.fix())
    }
}

impl FromStr for TimeTz {
    type Err = ParseValueError;

    /// `HH:MM:SS[.ffffff]` followed by `Z` or `±HH[:MM]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseValueError::new("timetz", s);
        let t = s.trim();
        if let Some(time) = t.strip_suffix('Z') {
            let time = NaiveTime::from_str(time).map_err(|_| err())?;
            return Ok(Self::new(time, Utc.fix()));
        }

        let split = t.rfind(['+', '-']).ok_or_else(err)?;
        let (time, zone) = t.split_at(split);
        let time = NaiveTime::from_str(time).map_err(|_| err())?;
        let east = if zone.starts_with('-') { -1 } else { 1 };
        let (hh, mm) = zone[1..].split_once(':').unwrap_or((&zone[1..], "0"));
        let hh: i32 = hh.parse().map_err(|_| err())?;
        let mm: i32 = mm.parse().map_err(|_| err())?;
        let offset = FixedOffset::east_opt(east * (hh * 3600 + mm * 60)).ok_or_else(err)?;
        Ok(Self::new(time, offset))
    }
}

impl fmt::Display for TimeTz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.time, self.offset)
    }
}

text_serde!(TimeTz);

impl ToSql for TimeTz {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        let micros = i64::from(self.time.num_seconds_from_midnight()) * 1_000_000
            + i64::from(self.time.nanosecond().min(999_999_999) / 1_000);
        out.put_i64(micros);
        // The wire offset counts seconds west of UTC.
        out.put_i32(-self.offset.local_minus_utc());
        Ok(IsNull::No)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::TIMETZ
    }

    to_sql_checked!();
}

impl<'a> FromSql<'a> for TimeTz {
    fn from_sql(_ty: &Type, mut raw: &'a [u8]) -> Result<Self, BoxError> {
        let micros = take_i64(&mut raw, "timetz")?;
        let west = take_i32(&mut raw, "timetz")?;
        let secs = u32::try_from(micros / 1_000_000)?;
        let nanos = u32::try_from(micros % 1_000_000)? * 1_000;
        let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
            .ok_or("timetz out of range")?;
        let offset = FixedOffset::west_opt(west).ok_or("timetz offset out of range")?;
        Ok(Self::new(time, offset))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::TIMETZ
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<T: ToSql>(v: &T, ty: &Type) -> Vec<u8> {
        let mut out = BytesMut::new();
        v.to_sql(ty, &mut out).unwrap();
        out.to_vec()
    }

    fn numeric_wire(text: &str) -> (i16, i16, u16, u16, Vec<i16>) {
        let bytes = encode(&text.parse::<Numeric>().unwrap(), &Type::NUMERIC);
        let mut raw = bytes.as_slice();
        let ndigits = take_i16(&mut raw, "numeric").unwrap();
        let weight = take_i16(&mut raw, "numeric").unwrap();
        let sign = take_u16(&mut raw, "numeric").unwrap();
        let dscale = take_u16(&mut raw, "numeric").unwrap();
        let groups = (0..ndigits)
            .map(|_| take_i16(&mut raw, "numeric").unwrap())
            .collect();
        (ndigits, weight, sign, dscale, groups)
    }

    #[test]
    fn uuid_text_and_wire_forms() {
        let u: Uuid = "A0EEBC99-9C0B-4EF8-BB6D-6BB9BD380A11".parse().unwrap();
        assert_eq!(u.to_string(), "a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11");
        assert_eq!("{a0eebc999c0b4ef8bb6d6bb9bd380a11}".parse::<Uuid>().unwrap(), u);
        assert_eq!(encode(&u, &Type::UUID), u.as_bytes().to_vec());
        assert_eq!(Uuid::from_sql(&Type::UUID, u.as_bytes()).unwrap(), u);

        assert!("a0eebc99".parse::<Uuid>().is_err());
        assert!("g0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11".parse::<Uuid>().is_err());
        assert!(Uuid::from_sql(&Type::UUID, &[0; 15]).is_err());
        assert_eq!(
            serde_json::to_string(&u).unwrap(),
            r#""a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11""#
        );
    }

    #[test]
    fn numeric_groups_align_on_the_decimal_point() {
        assert_eq!(numeric_wire("12345.678"), (3, 1, NUMERIC_POS, 3, vec![1, 2345, 6780]));
        assert_eq!(numeric_wire("-0.0012"), (1, -1, NUMERIC_NEG, 4, vec![12]));
        assert_eq!(numeric_wire("10000"), (1, 1, NUMERIC_POS, 0, vec![1]));
        assert_eq!(numeric_wire("0.00"), (0, 0, NUMERIC_POS, 2, vec![]));
        assert_eq!(numeric_wire("NaN"), (0, 0, NUMERIC_NAN, 0, vec![]));
    }

    #[test]
    fn numeric_decodes_back_to_text() {
        for text in ["12345.678", "-0.0012", "10000", "0.00", "7", "0.00000001", "NaN"] {
            let n: Numeric = text.parse().unwrap();
            let bytes = encode(&n, &Type::NUMERIC);
            assert_eq!(Numeric::from_sql(&Type::NUMERIC, &bytes).unwrap().as_str(), text);
        }
        assert!("1e5".parse::<Numeric>().is_err());
        assert!(".".parse::<Numeric>().is_err());
        assert_eq!(Numeric::default().as_str(), "0");
    }

    #[test]
    fn bits_pack_most_significant_first() {
        let b: Bits = "101000001".parse().unwrap();
        assert_eq!(encode(&b, &Type::VARBIT), vec![0, 0, 0, 9, 0b1010_0000, 0b1000_0000]);
        assert_eq!(
            Bits::from_sql(&Type::BIT, &[0, 0, 0, 9, 0b1010_0000, 0b1000_0000]).unwrap(),
            b
        );
        assert!("102".parse::<Bits>().is_err());
        assert!(Bits::from_sql(&Type::BIT, &[0, 0, 0, 9, 0]).is_err());
    }

    #[test]
    fn timetz_offset_is_sent_west_of_utc() {
        let t: TimeTz = "10:30:00.5+02:00".parse().unwrap();
        assert_eq!(t.to_string(), "10:30:00.500+02:00");
        let bytes = encode(&t, &Type::TIMETZ);
        assert_eq!(&bytes[..8], &37_800_500_000i64.to_be_bytes());
        assert_eq!(&bytes[8..], &(-7200i32).to_be_bytes());
        assert_eq!(TimeTz::from_sql(&Type::TIMETZ, &bytes).unwrap(), t);

        let utc: TimeTz = "23:59:59Z".parse().unwrap();
        assert_eq!(utc.offset.local_minus_utc(), 0);
        assert_eq!("08:00:00-05".parse::<TimeTz>().unwrap().offset.local_minus_utc(), -18_000);
        assert!("08:00:00".parse::<TimeTz>().is_err());
    }
}
