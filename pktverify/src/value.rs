// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Typed values of decoded packet fields.
//!
//! A field that is absent from a packet decodes to [`FieldValue::Null`].
//! `Null` absorbs every operation: it is never equal to anything (not even
//! itself), never ordered, contains nothing and is falsy. This lets filters
//! written against one protocol run over a capture full of others.

use crate::addrs::{EthAddr, ExtAddr, Ipv6Addr};
use crate::bytes::Bytes;
use ordermap::OrderMap;
use std::cmp::Ordering;
use std::fmt::Display;

/// Named values available to filter expressions.
pub type Vars = OrderMap<String, FieldValue>;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    Bytes(Bytes),
    ExtAddr(ExtAddr),
    EthAddr(EthAddr),
    Ipv6(Ipv6Addr),
    List(Vec<FieldValue>),
    /// Unordered collection without duplicates.
    Set(Vec<FieldValue>),
    /// A present layer or field container, identified by its path.
    Container(String),
}

impl FieldValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            FieldValue::Null => false,
            FieldValue::Bool(b) => *b,
            FieldValue::Int(i) => *i != 0,
            FieldValue::Float(f) => *f != 0.0,
            FieldValue::Str(s) => !s.is_empty(),
            FieldValue::Bytes(b) => !b.is_empty(),
            FieldValue::List(l) | FieldValue::Set(l) => !l.is_empty(),
            FieldValue::ExtAddr(_)
            | FieldValue::EthAddr(_)
            | FieldValue::Ipv6(_)
            | FieldValue::Container(_) => true,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i128> {
        match self {
            FieldValue::Int(i) => Some(*i),
            FieldValue::Bool(b) => Some(i128::from(*b)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_ext_addr(&self) -> Option<ExtAddr> {
        match self {
            FieldValue::ExtAddr(a) => Some(*a),
            FieldValue::Str(s) => ExtAddr::try_from(s.as_str()).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_eth_addr(&self) -> Option<EthAddr> {
        match self {
            FieldValue::EthAddr(a) => Some(*a),
            FieldValue::Str(s) => EthAddr::try_from(s.as_str()).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_ipv6(&self) -> Option<Ipv6Addr> {
        match self {
            FieldValue::Ipv6(a) => Some(*a),
            FieldValue::Str(s) => Ipv6Addr::try_from(s.as_str()).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Elements of a list or set. Scalars are not collections.
    #[must_use]
    pub fn items(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(l) | FieldValue::Set(l) => Some(l),
            _ => None,
        }
    }

    /// Build a set, dropping duplicates.
    #[must_use]
    pub fn set_of(items: impl IntoIterator<Item = FieldValue>) -> FieldValue {
        let mut set: Vec<FieldValue> = Vec::new();
        for item in items {
            if !set.iter().any(|s| s.loose_eq(&item)) {
                set.push(item);
            }
        }
        FieldValue::Set(set)
    }

    /// Convert to a set: lists and sets lose duplicates, scalars become a
    /// singleton, null stays null.
    #[must_use]
    pub fn to_set(&self) -> FieldValue {
        match self {
            FieldValue::Null => FieldValue::Null,
            FieldValue::List(l) | FieldValue::Set(l) => FieldValue::set_of(l.iter().cloned()),
            other => FieldValue::Set(vec![other.clone()]),
        }
    }

    /// Number of elements (collections), characters (strings) or octets (bytes).
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            FieldValue::List(l) | FieldValue::Set(l) => Some(l.len()),
            FieldValue::Str(s) => Some(s.chars().count()),
            FieldValue::Bytes(b) => Some(b.len()),
            _ => None,
        }
    }

    /// Equality across compatible representations: integers compare with
    /// floats, addresses compare with their textual form and bytes compare
    /// with hex strings. `Null` equals nothing.
    #[must_use]
    pub fn loose_eq(&self, other: &FieldValue) -> bool {
        use FieldValue as V;
        match (self, other) {
            (V::Null, _) | (_, V::Null) => false,
            (V::Bool(a), V::Bool(b)) => a == b,
            (V::Int(_) | V::Bool(_), V::Int(_) | V::Bool(_)) => self.as_int() == other.as_int(),
            #[allow(clippy::cast_precision_loss)]
            (V::Int(i), V::Float(f)) | (V::Float(f), V::Int(i)) => (*i as f64) == *f,
            (V::Float(a), V::Float(b)) => a == b,
            (V::Str(a), V::Str(b)) => a == b,
            (V::Bytes(a), V::Bytes(b)) => a == b,
            (V::Bytes(b), V::Str(s)) | (V::Str(s), V::Bytes(b)) => {
                Bytes::from_hex(s).is_ok_and(|s| s == *b)
            }
            (V::ExtAddr(a), V::ExtAddr(b)) => a == b,
            (V::EthAddr(a), V::EthAddr(b)) => a == b,
            (V::Ipv6(a), V::Ipv6(b)) => a == b,
            (V::ExtAddr(a), V::Str(s)) | (V::Str(s), V::ExtAddr(a)) => {
                ExtAddr::try_from(s.as_str()).is_ok_and(|x| x == *a)
            }
            (V::EthAddr(a), V::Str(s)) | (V::Str(s), V::EthAddr(a)) => {
                EthAddr::try_from(s.as_str()).is_ok_and(|x| x == *a)
            }
            (V::Ipv6(a), V::Str(s)) | (V::Str(s), V::Ipv6(a)) => {
                Ipv6Addr::try_from(s.as_str()).is_ok_and(|x| x == *a)
            }
            (V::List(a), V::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (V::Set(_), V::Set(_) | V::List(_)) | (V::List(_), V::Set(_)) => {
                self.is_subset(other) && other.is_subset(self)
            }
            (V::Container(a), V::Container(b)) => a == b,
            _ => false,
        }
    }

    /// Ordering for numbers, strings, byte strings and addresses of the same
    /// kind. Anything else (including `Null`) is unordered.
    #[must_use]
    pub fn loose_cmp(&self, other: &FieldValue) -> Option<Ordering> {
        use FieldValue as V;
        match (self, other) {
            (V::Int(_) | V::Bool(_), V::Int(_) | V::Bool(_)) => {
                Some(self.as_int()?.cmp(&other.as_int()?))
            }
            #[allow(clippy::cast_precision_loss)]
            (V::Int(i), V::Float(f)) => (*i as f64).partial_cmp(f),
            #[allow(clippy::cast_precision_loss)]
            (V::Float(f), V::Int(i)) => f.partial_cmp(&(*i as f64)),
            (V::Float(a), V::Float(b)) => a.partial_cmp(b),
            (V::Str(a), V::Str(b)) => Some(a.cmp(b)),
            (V::Bytes(a), V::Bytes(b)) => Some(a.cmp(b)),
            (V::ExtAddr(a), V::ExtAddr(b)) => Some(a.cmp(b)),
            (V::EthAddr(a), V::EthAddr(b)) => Some(a.cmp(b)),
            (V::Ipv6(a), V::Ipv6(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Every element of `self` is in `other`. Only defined for collections.
    #[must_use]
    pub fn is_subset(&self, other: &FieldValue) -> bool {
        match (self.items(), other.items()) {
            (Some(a), Some(_)) => a.iter().all(|x| other.contains(x)),
            _ => false,
        }
    }

    /// Membership: element of a collection, substring of a string or
    /// sub-sequence of a byte string.
    #[must_use]
    pub fn contains(&self, item: &FieldValue) -> bool {
        match (self, item) {
            (FieldValue::List(l) | FieldValue::Set(l), _) => l.iter().any(|x| x.loose_eq(item)),
            (FieldValue::Str(s), FieldValue::Str(sub)) => s.contains(sub.as_str()),
            (FieldValue::Bytes(b), FieldValue::Bytes(sub)) => {
                sub.is_empty() || b.windows(sub.len()).any(|w| w == sub.as_slice())
            }
            _ => false,
        }
    }
}

macro_rules! from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FieldValue {
                fn from(value: $t) -> Self {
                    FieldValue::Int(i128::from(value))
                }
            }
        )*
    };
}

from_int!(u8, u16, u32, u64, i8, i16, i32, i64, i128);

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        FieldValue::Int(value as i128)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<Bytes> for FieldValue {
    fn from(value: Bytes) -> Self {
        FieldValue::Bytes(value)
    }
}

impl From<ExtAddr> for FieldValue {
    fn from(value: ExtAddr) -> Self {
        FieldValue::ExtAddr(value)
    }
}

impl From<EthAddr> for FieldValue {
    fn from(value: EthAddr) -> Self {
        FieldValue::EthAddr(value)
    }
}

impl From<Ipv6Addr> for FieldValue {
    fn from(value: Ipv6Addr) -> Self {
        FieldValue::Ipv6(value)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(value: Vec<T>) -> Self {
        FieldValue::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

fn write_items(f: &mut std::fmt::Formatter<'_>, items: &[FieldValue]) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Str(s) => write!(f, "'{s}'"),
            FieldValue::Bytes(b) => write!(f, "{b}"),
            FieldValue::ExtAddr(a) => write!(f, "{a}"),
            FieldValue::EthAddr(a) => write!(f, "{a}"),
            FieldValue::Ipv6(a) => write!(f, "{a}"),
            FieldValue::List(l) => {
                write!(f, "[")?;
                write_items(f, l)?;
                write!(f, "]")
            }
            FieldValue::Set(s) => {
                write!(f, "{{")?;
                write_items(f, s)?;
                write!(f, "}}")
            }
            FieldValue::Container(path) => write!(f, "<{path}>"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn null_equals_nothing() {
        let null = FieldValue::Null;
        assert!(!null.loose_eq(&FieldValue::Null));
        assert!(!null.loose_eq(&FieldValue::Int(0)));
        assert!(!null.truthy());
        assert_eq!(null.loose_cmp(&FieldValue::Int(1)), None);
        assert!(!null.contains(&FieldValue::Int(1)));
    }

    #[test]
    fn addresses_compare_with_text() {
        let ext = FieldValue::from(ExtAddr::from(0x166e_0a00_0000_0001_u64));
        assert!(ext.loose_eq(&FieldValue::from("16:6e:0a:00:00:00:00:01")));
        assert!(FieldValue::from("166e0a0000000001").loose_eq(&ext));

        let ip = FieldValue::from(Ipv6Addr::try_from("ff02::1").unwrap());
        assert!(ip.loose_eq(&FieldValue::from("ff02:0::1")));
        assert!(!ip.loose_eq(&FieldValue::from("ff02::2")));
    }

    #[test]
    fn numbers() {
        assert!(FieldValue::Int(3).loose_eq(&FieldValue::Float(3.0)));
        assert!(FieldValue::Bool(true).loose_eq(&FieldValue::Int(1)));
        assert_eq!(
            FieldValue::Int(2).loose_cmp(&FieldValue::Int(3)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn sets_ignore_order_and_duplicates() {
        let a = FieldValue::set_of([1.into(), 2.into(), 2.into()]);
        let b = FieldValue::from(vec![2, 1]).to_set();
        assert_eq!(a.len(), Some(2));
        assert!(a.loose_eq(&b));
        assert!(FieldValue::Set(vec![1.into()]).is_subset(&a));
        assert!(!a.is_subset(&FieldValue::Set(vec![1.into()])));
    }

    #[test]
    fn membership() {
        let list = FieldValue::from(vec![0u8, 11, 9]);
        assert!(list.contains(&FieldValue::Int(9)));
        assert!(!list.contains(&FieldValue::Int(12)));
        assert!(FieldValue::from("/a/as").contains(&FieldValue::from("/a")));
        let bytes = FieldValue::Bytes(Bytes::from_hex("00112233").unwrap());
        assert!(bytes.contains(&FieldValue::Bytes(Bytes::from_hex("1122").unwrap())));
        assert!(bytes.loose_eq(&FieldValue::from("00:11:22:33")));
    }
}
