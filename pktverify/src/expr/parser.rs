// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Recursive descent parser producing a bound, validated syntax tree.

use super::ExprError;
use super::lexer::{Spanned, Token};
use crate::consts;
use crate::layer_fields;
use crate::value::{FieldValue, Vars};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArithOp {
    Add,
    Sub,
    Mul,
    Rem,
    BitAnd,
    BitOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Func {
    Set,
    Len,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Lit(FieldValue),
    Field(String),
    Has(String, String),
    List(Vec<Node>),
    Call(Func, Box<Node>),
    Neg(Box<Node>),
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Arith(ArithOp, Box<Node>, Box<Node>),
    Cmp(CmpOp, Box<Node>, Box<Node>),
    IsNull { operand: Box<Node>, negated: bool },
}

pub(crate) struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    vars: &'a Vars,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a str, tokens: Vec<Spanned>, vars: &'a Vars) -> Self {
        Self {
            src,
            tokens,
            pos: 0,
            vars,
        }
    }

    /// Parse a complete expression.
    pub(crate) fn parse(mut self) -> Result<Node, ExprError> {
        let node = self.or()?;
        match self.tokens.get(self.pos) {
            None => Ok(node),
            Some(_) => Err(self.error("unexpected trailing input")),
        }
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.src.len(), |t| t.pos)
    }

    fn error(&self, message: &str) -> ExprError {
        ExprError::Syntax {
            expr: self.src.to_string(),
            pos: self.offset(),
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|t| &t.token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), ExprError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, ExprError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(&format!("expected {what}"))),
        }
    }

    fn or(&mut self) -> Result<Node, ExprError> {
        let mut node = self.and()?;
        while self.eat(&Token::Or) {
            let rhs = self.and()?;
            node = Node::Or(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn and(&mut self) -> Result<Node, ExprError> {
        let mut node = self.not()?;
        while self.eat(&Token::And) {
            let rhs = self.not()?;
            node = Node::And(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn not(&mut self) -> Result<Node, ExprError> {
        if self.eat(&Token::Not) {
            let operand = self.not()?;
            return Ok(Node::Not(Box::new(operand)));
        }
        self.cmp()
    }

    fn cmp(&mut self) -> Result<Node, ExprError> {
        let lhs = self.sum()?;

        if self.eat(&Token::Is) {
            let negated = self.eat(&Token::Not);
            self.expect(&Token::Null, "'null' after 'is'")?;
            return Ok(Node::IsNull {
                operand: Box::new(lhs),
                negated,
            });
        }

        let op = match self.peek() {
            Some(Token::Eq) => CmpOp::Eq,
            Some(Token::Ne) => CmpOp::Ne,
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::Le) => CmpOp::Le,
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::Ge) => CmpOp::Ge,
            Some(Token::In) => CmpOp::In,
            Some(Token::Not) if self.peek_at(1) == Some(&Token::In) => {
                self.pos += 1;
                CmpOp::NotIn
            }
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.sum()?;
        Ok(Node::Cmp(op, Box::new(lhs), Box::new(rhs)))
    }

    fn sum(&mut self) -> Result<Node, ExprError> {
        let mut node = self.product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => return Ok(node),
            };
            self.pos += 1;
            let rhs = self.product()?;
            node = Node::Arith(op, Box::new(node), Box::new(rhs));
        }
    }

    fn product(&mut self) -> Result<Node, ExprError> {
        let mut node = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => ArithOp::Mul,
                Some(Token::Percent) => ArithOp::Rem,
                Some(Token::Amp) => ArithOp::BitAnd,
                Some(Token::Pipe) => ArithOp::BitOr,
                _ => return Ok(node),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            node = Node::Arith(op, Box::new(node), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Node, ExprError> {
        if self.eat(&Token::Minus) {
            let operand = self.unary()?;
            return Ok(Node::Neg(Box::new(operand)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Node, ExprError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error("unexpected end of expression"));
        };
        match token {
            Token::Int(i) => {
                self.pos += 1;
                Ok(Node::Lit(FieldValue::Int(i)))
            }
            Token::Float(f) => {
                self.pos += 1;
                Ok(Node::Lit(FieldValue::Float(f)))
            }
            Token::Str(s) => {
                self.pos += 1;
                Ok(Node::Lit(FieldValue::Str(s)))
            }
            Token::Null => {
                self.pos += 1;
                Ok(Node::Lit(FieldValue::Null))
            }
            Token::True => {
                self.pos += 1;
                Ok(Node::Lit(FieldValue::Bool(true)))
            }
            Token::False => {
                self.pos += 1;
                Ok(Node::Lit(FieldValue::Bool(false)))
            }
            Token::LParen => {
                self.pos += 1;
                let node = self.or()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(node)
            }
            Token::LBracket => {
                self.pos += 1;
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.or()?);
                        if self.eat(&Token::RBracket) {
                            break;
                        }
                        self.expect(&Token::Comma, "',' or ']'")?;
                    }
                }
                Ok(Node::List(items))
            }
            Token::LBrace => {
                self.pos += 1;
                let name = self.ident("variable name")?;
                self.expect(&Token::RBrace, "'}'")?;
                self.variable(&name)
            }
            Token::Ident(_) => self.path_or_call(),
            _ => Err(self.error("unexpected token")),
        }
    }

    fn variable(&self, name: &str) -> Result<Node, ExprError> {
        self.vars
            .get(name)
            .map(|v| Node::Lit(v.clone()))
            .ok_or_else(|| ExprError::UnknownVariable(name.to_string()))
    }

    fn path_or_call(&mut self) -> Result<Node, ExprError> {
        let head = self.ident("identifier")?;

        if self.peek() == Some(&Token::LParen) {
            return self.call(&head);
        }

        let mut path = head;
        while self.peek() == Some(&Token::Dot) {
            self.pos += 1;
            let segment = self.ident("field name after '.'")?;
            if segment == "has" && self.peek() == Some(&Token::LParen) {
                return self.has(path);
            }
            path.push('.');
            path.push_str(&segment);
        }

        if !path.contains('.') && !layer_fields::is_known_path(&path) {
            // a bare name is a variable or a constant unless it names a layer
            if let Some(value) = self.vars.get(&path) {
                return Ok(Node::Lit(value.clone()));
            }
            return match consts::lookup(&path) {
                Some(named) => Ok(Node::Lit(named.into())),
                None => Err(ExprError::UnknownName(path)),
            };
        }

        if !layer_fields::is_known_path(&path) {
            return Err(ExprError::UnknownField(path));
        }
        Ok(Node::Field(path))
    }

    fn has(&mut self, path: String) -> Result<Node, ExprError> {
        self.expect(&Token::LParen, "'('")?;
        let sub = match self.peek().cloned() {
            Some(Token::Str(s)) => s,
            Some(Token::Int(i)) => i.to_string(),
            _ => return Err(self.error("expected a string argument to has()")),
        };
        self.pos += 1;
        self.expect(&Token::RParen, "')'")?;
        if !layer_fields::is_field_prefix(&path) {
            return Err(ExprError::UnknownField(path));
        }
        Ok(Node::Has(path, sub))
    }

    fn call(&mut self, name: &str) -> Result<Node, ExprError> {
        let func = match name {
            "set" => Func::Set,
            "len" => Func::Len,
            _ => return Err(ExprError::UnknownName(name.to_string())),
        };
        self.expect(&Token::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.or()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(&Token::Comma, "',' or ')'")?;
            }
        }
        if args.len() != 1 {
            return Err(ExprError::Arity {
                name: name.to_string(),
                expected: 1,
                got: args.len(),
            });
        }
        let arg = args.remove(0);
        Ok(Node::Call(func, Box::new(arg)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::expr::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn parse(src: &str, vars: &Vars) -> Result<Node, ExprError> {
        Parser::new(src, tokenize(src)?, vars).parse()
    }

    fn field(uri: &str) -> Box<Node> {
        Box::new(Node::Field(uri.to_string()))
    }

    fn int(i: i128) -> Box<Node> {
        Box::new(Node::Lit(FieldValue::Int(i)))
    }

    #[test]
    fn precedence() {
        let vars = Vars::new();
        assert_eq!(
            parse("not mle.cmd == 1 + 2 * 3", &vars).unwrap(),
            Node::Not(Box::new(Node::Cmp(
                CmpOp::Eq,
                field("mle.cmd"),
                Box::new(Node::Arith(
                    ArithOp::Add,
                    int(1),
                    Box::new(Node::Arith(ArithOp::Mul, int(2), int(3)))
                ))
            )))
        );
        assert_eq!(
            parse("a_or or mle and coap", &Vars::from_iter([("a_or".to_string(), 1.into())]))
                .unwrap(),
            Node::Or(
                int(1),
                Box::new(Node::And(field("mle"), field("coap")))
            )
        );
    }

    #[test]
    fn variables_and_constants() {
        let mut vars = Vars::new();
        vars.insert("LEADER".into(), FieldValue::from("16:6e:0a:00:00:00:00:01"));
        assert_eq!(
            parse("wpan.src64 == {LEADER}", &vars).unwrap(),
            Node::Cmp(
                CmpOp::Eq,
                field("wpan.src64"),
                Box::new(Node::Lit(FieldValue::from("16:6e:0a:00:00:00:00:01")))
            )
        );
        assert_eq!(
            parse("mle.cmd == MLE_ADVERTISEMENT", &vars).unwrap(),
            Node::Cmp(CmpOp::Eq, field("mle.cmd"), int(4))
        );
        assert_eq!(
            parse("{ROUTER}", &vars).unwrap_err(),
            ExprError::UnknownVariable("ROUTER".into())
        );
        assert_eq!(
            parse("NOT_A_THING", &vars).unwrap_err(),
            ExprError::UnknownName("NOT_A_THING".into())
        );
    }

    #[test]
    fn fields_are_validated() {
        let vars = Vars::new();
        assert_eq!(
            parse("mle.tlv.nope == 1", &vars).unwrap_err(),
            ExprError::UnknownField("mle.tlv.nope".into())
        );
        assert_eq!(
            parse("thread_nwd.tlv.server.has('16')", &vars).unwrap(),
            Node::Has("thread_nwd.tlv.server".into(), "16".into())
        );
        assert!(parse("len(mle.tlv.type, 1)", &vars).is_err());
        assert!(parse("frobnicate(1)", &vars).is_err());
    }

    #[test]
    fn special_operators() {
        let vars = Vars::new();
        assert_eq!(
            parse("9 not in mle.tlv.type", &vars).unwrap(),
            Node::Cmp(CmpOp::NotIn, int(9), field("mle.tlv.type"))
        );
        assert_eq!(
            parse("coap.payload is not null", &vars).unwrap(),
            Node::IsNull {
                operand: field("coap.payload"),
                negated: true
            }
        );
        assert!(parse("mle.cmd ==", &vars).is_err());
        assert!(parse("(mle.cmd", &vars).is_err());
        assert!(parse("mle.cmd 1", &vars).is_err());
    }
}
