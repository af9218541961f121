// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use super::parser::{ArithOp, CmpOp, Func, Node};
use crate::layer_fields;
use crate::packet::Packet;
use crate::value::FieldValue;
use std::cmp::Ordering;
use tracing::warn;

pub(super) fn eval(node: &Node, packet: &Packet) -> FieldValue {
    match node {
        Node::Lit(value) => value.clone(),
        Node::Field(uri) => packet.field(uri),
        Node::Has(uri, sub) => match layer_fields::check_layer_field_has(packet, uri, sub) {
            Ok(found) => FieldValue::Bool(found),
            Err(e) => {
                warn!("packet #{}: {e}", packet.number());
                FieldValue::Null
            }
        },
        Node::List(items) => FieldValue::List(items.iter().map(|n| eval(n, packet)).collect()),
        Node::Call(Func::Set, arg) => eval(arg, packet).to_set(),
        Node::Call(Func::Len, arg) => eval(arg, packet)
            .len()
            .map_or(FieldValue::Null, FieldValue::from),
        Node::Neg(operand) => match eval(operand, packet) {
            FieldValue::Int(i) => i.checked_neg().map_or(FieldValue::Null, FieldValue::Int),
            FieldValue::Float(f) => FieldValue::Float(-f),
            _ => FieldValue::Null,
        },
        Node::Not(operand) => FieldValue::Bool(!eval(operand, packet).truthy()),
        Node::And(lhs, rhs) => {
            FieldValue::Bool(eval(lhs, packet).truthy() && eval(rhs, packet).truthy())
        }
        Node::Or(lhs, rhs) => {
            FieldValue::Bool(eval(lhs, packet).truthy() || eval(rhs, packet).truthy())
        }
        Node::Arith(op, lhs, rhs) => arith(*op, &eval(lhs, packet), &eval(rhs, packet)),
        Node::Cmp(op, lhs, rhs) => {
            FieldValue::Bool(compare(*op, &eval(lhs, packet), &eval(rhs, packet)))
        }
        Node::IsNull { operand, negated } => {
            FieldValue::Bool(eval(operand, packet).is_null() != *negated)
        }
    }
}

fn arith(op: ArithOp, lhs: &FieldValue, rhs: &FieldValue) -> FieldValue {
    use FieldValue as V;
    match (lhs, rhs) {
        (V::Int(_) | V::Bool(_), V::Int(_) | V::Bool(_)) => {
            let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) else {
                return V::Null;
            };
            let result = match op {
                ArithOp::Add => a.checked_add(b),
                ArithOp::Sub => a.checked_sub(b),
                ArithOp::Mul => a.checked_mul(b),
                // the result takes the sign of the divisor
                ArithOp::Rem => a
                    .checked_rem(b)
                    .map(|r| if r != 0 && (r < 0) != (b < 0) { r + b } else { r }),
                ArithOp::BitAnd => Some(a & b),
                ArithOp::BitOr => Some(a | b),
            };
            result.map_or(V::Null, V::Int)
        }
        (V::Int(_) | V::Float(_), V::Int(_) | V::Float(_)) => {
            let (Some(a), Some(b)) = (as_float(lhs), as_float(rhs)) else {
                return V::Null;
            };
            match op {
                ArithOp::Add => V::Float(a + b),
                ArithOp::Sub => V::Float(a - b),
                ArithOp::Mul => V::Float(a * b),
                _ => V::Null,
            }
        }
        (V::Str(a), V::Str(b)) if op == ArithOp::Add => V::Str(format!("{a}{b}")),
        _ => V::Null,
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_float(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Int(i) => Some(*i as f64),
        FieldValue::Float(f) => Some(*f),
        _ => None,
    }
}

fn compare(op: CmpOp, lhs: &FieldValue, rhs: &FieldValue) -> bool {
    match op {
        CmpOp::Eq => lhs.loose_eq(rhs),
        CmpOp::Ne => !lhs.loose_eq(rhs),
        CmpOp::In => rhs.contains(lhs),
        CmpOp::NotIn => !rhs.contains(lhs),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge if is_set(lhs) && is_set(rhs) => {
            // set operands compare by inclusion
            let (small, large) = match op {
                CmpOp::Lt | CmpOp::Le => (lhs, rhs),
                _ => (rhs, lhs),
            };
            let strict = matches!(op, CmpOp::Lt | CmpOp::Gt);
            small.is_subset(large) && !(strict && large.is_subset(small))
        }
        CmpOp::Lt => lhs.loose_cmp(rhs) == Some(Ordering::Less),
        CmpOp::Le => matches!(lhs.loose_cmp(rhs), Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Gt => lhs.loose_cmp(rhs) == Some(Ordering::Greater),
        CmpOp::Ge => matches!(lhs.loose_cmp(rhs), Some(Ordering::Greater | Ordering::Equal)),
    }
}

fn is_set(value: &FieldValue) -> bool {
    matches!(value, FieldValue::Set(_))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integer_arithmetic() {
        let v = FieldValue::Int;
        assert_eq!(arith(ArithOp::Rem, &v(-7), &v(3)), v(2));
        assert_eq!(arith(ArithOp::Rem, &v(7), &v(-3)), v(-2));
        assert_eq!(arith(ArithOp::Rem, &v(7), &v(0)), FieldValue::Null);
        assert_eq!(arith(ArithOp::BitOr, &v(0x10), &v(0x01)), v(0x11));
        assert_eq!(arith(ArithOp::Add, &v(i128::MAX), &v(1)), FieldValue::Null);
        assert_eq!(arith(ArithOp::Mul, &v(2), &FieldValue::Float(1.5)), FieldValue::Float(3.0));
        assert_eq!(arith(ArithOp::Add, &v(1), &FieldValue::Null), FieldValue::Null);
    }

    #[test]
    fn set_inclusion() {
        let a = FieldValue::set_of([1.into(), 2.into()]);
        let b = FieldValue::set_of([1.into(), 2.into(), 3.into()]);
        assert!(compare(CmpOp::Lt, &a, &b));
        assert!(compare(CmpOp::Le, &a, &a));
        assert!(!compare(CmpOp::Lt, &a, &a));
        assert!(compare(CmpOp::Gt, &b, &a));
        assert!(compare(CmpOp::Ge, &b, &b));
        assert!(!compare(CmpOp::Ge, &a, &b));
    }

    #[test]
    fn null_is_unordered() {
        let n = FieldValue::Null;
        let one = FieldValue::Int(1);
        for op in [CmpOp::Lt, CmpOp::Le, CmpOp::Gt, CmpOp::Ge, CmpOp::Eq, CmpOp::In] {
            assert!(!compare(op, &n, &one));
            assert!(!compare(op, &one, &n));
        }
        assert!(compare(CmpOp::Ne, &n, &n));
    }
}
