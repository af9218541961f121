// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Filter expressions.
//!
//! A small boolean expression language over packet fields, used by scenario
//! files and by [`crate::PacketFilter::filter_expr`]:
//!
//! ```text
//! wpan.src64 == {ROUTER} and mle.cmd == MLE_ADVERTISEMENT
//!     and set(mle.tlv.type) == set([LEADER_DATA_TLV, SOURCE_ADDRESS_TLV])
//! ```
//!
//! Expressions are compiled once: `{VAR}` references are bound, bare names
//! resolve to variables or protocol constants, and every field path is
//! checked against the field registry. Evaluation never fails; missing
//! fields read as null.

mod eval;
mod lexer;
mod parser;

use crate::packet::Packet;
use crate::value::{FieldValue, Vars};
use lexer::tokenize;
use parser::{Node, Parser};
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("syntax error in '{expr}' at offset {pos}: {message}")]
    Syntax {
        expr: String,
        pos: usize,
        message: String,
    },
    #[error("unknown variable '{{{0}}}'")]
    UnknownVariable(String),
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("unknown name '{0}'")]
    UnknownName(String),
    #[error("{name}() takes {expected} argument(s), {got} given")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },
}

/// A compiled filter expression.
#[derive(Debug, Clone)]
pub struct Expr {
    source: String,
    root: Node,
}

impl Expr {
    /// Compile an expression, binding `vars`.
    ///
    /// # Errors
    ///
    /// Fails on syntax errors, unbound variables, unknown names or fields
    /// and wrong function arity.
    pub fn compile(source: &str, vars: &Vars) -> Result<Self, ExprError> {
        let tokens = tokenize(source)?;
        let root = Parser::new(source, tokens, vars).parse()?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a packet.
    #[must_use]
    pub fn eval(&self, packet: &Packet) -> FieldValue {
        eval::eval(&self.root, packet)
    }

    /// Returns true if the expression evaluates to a truthy value.
    #[must_use]
    pub fn matches(&self, packet: &Packet) -> bool {
        self.eval(packet).truthy()
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}
