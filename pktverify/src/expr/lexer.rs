// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tokenizer for filter expressions.

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Int(i128),
    Float(f64),
    Str(String),
    Ident(String),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Percent,
    Amp,
    Pipe,
    And,
    Or,
    Not,
    In,
    Is,
    Null,
    True,
    False,
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub(crate) token: Token,
    pub(crate) pos: usize,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, ExprError> {
    let syntax = |pos: usize, message: &str| ExprError::Syntax {
        expr: src.to_string(),
        pos,
        message: message.to_string(),
    };

    let mut tokens: Vec<Spanned> = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if is_word_char(c) {
            let after_dot = matches!(tokens.last(), Some(Spanned { token: Token::Dot, .. }));
            let mut end = pos;
            while let Some(&(i, c)) = chars.peek() {
                if !is_word_char(c) {
                    break;
                }
                end = i + c.len_utf8();
                chars.next();
            }
            let mut word = &src[pos..end];

            if after_dot {
                // path segments may be numeric, e.g. `thread_nwd.tlv.server.16`
                tokens.push(Spanned {
                    token: Token::Ident(word.to_string()),
                    pos,
                });
                continue;
            }

            if word.chars().all(|c| c.is_ascii_digit()) {
                let bytes = src.as_bytes();
                let fraction = bytes.get(end) == Some(&b'.')
                    && bytes.get(end + 1).is_some_and(u8::is_ascii_digit);
                if fraction {
                    chars.next();
                    let mut frac_end = end + 1;
                    while let Some(&(i, c)) = chars.peek() {
                        if !c.is_ascii_digit() {
                            break;
                        }
                        frac_end = i + 1;
                        chars.next();
                    }
                    word = &src[pos..frac_end];
                    let value = word
                        .parse::<f64>()
                        .map_err(|_| syntax(pos, "invalid float literal"))?;
                    tokens.push(Spanned {
                        token: Token::Float(value),
                        pos,
                    });
                } else {
                    let value = word
                        .parse::<i128>()
                        .map_err(|_| syntax(pos, "integer literal out of range"))?;
                    tokens.push(Spanned {
                        token: Token::Int(value),
                        pos,
                    });
                }
                continue;
            }

            if let Some(hex) = word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
                let value = i128::from_str_radix(hex, 16)
                    .map_err(|_| syntax(pos, "invalid hex literal"))?;
                tokens.push(Spanned {
                    token: Token::Int(value),
                    pos,
                });
                continue;
            }

            let token = match word {
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                "in" => Token::In,
                "is" => Token::Is,
                "null" | "None" => Token::Null,
                "true" | "True" => Token::True,
                "false" | "False" => Token::False,
                _ => Token::Ident(word.to_string()),
            };
            tokens.push(Spanned { token, pos });
            continue;
        }

        if c == '\'' || c == '"' {
            let quote = c;
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some((_, c)) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some((_, 'n')) => value.push('\n'),
                        Some((_, 't')) => value.push('\t'),
                        Some((_, escaped)) => value.push(escaped),
                        None => break,
                    },
                    c if c == quote => {
                        closed = true;
                        break;
                    }
                    c => value.push(c),
                }
            }
            if !closed {
                return Err(syntax(pos, "unterminated string"));
            }
            tokens.push(Spanned {
                token: Token::Str(value),
                pos,
            });
            continue;
        }

        chars.next();
        let next = chars.peek().map(|&(_, c)| c);
        let token = match (c, next) {
            ('=', Some('=')) => {
                chars.next();
                Token::Eq
            }
            ('!', Some('=')) => {
                chars.next();
                Token::Ne
            }
            ('<', Some('=')) => {
                chars.next();
                Token::Le
            }
            ('>', Some('=')) => {
                chars.next();
                Token::Ge
            }
            ('<', _) => Token::Lt,
            ('>', _) => Token::Gt,
            ('+', _) => Token::Plus,
            ('-', _) => Token::Minus,
            ('*', _) => Token::Star,
            ('%', _) => Token::Percent,
            ('&', _) => Token::Amp,
            ('|', _) => Token::Pipe,
            ('(', _) => Token::LParen,
            (')', _) => Token::RParen,
            ('[', _) => Token::LBracket,
            (']', _) => Token::RBracket,
            ('{', _) => Token::LBrace,
            ('}', _) => Token::RBrace,
            (',', _) => Token::Comma,
            ('.', _) => Token::Dot,
            _ => return Err(syntax(pos, &format!("unexpected character '{c}'"))),
        };
        tokens.push(Spanned { token, pos });
    }

    Ok(tokens)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn paths_and_numbers() {
        assert_eq!(
            tokens("6lowpan.src == 0x10"),
            vec![
                Token::Ident("6lowpan".into()),
                Token::Dot,
                Token::Ident("src".into()),
                Token::Eq,
                Token::Int(16),
            ]
        );
        assert_eq!(
            tokens("a.16 >= 1.5"),
            vec![
                Token::Ident("a".into()),
                Token::Dot,
                Token::Ident("16".into()),
                Token::Ge,
                Token::Float(1.5),
            ]
        );
    }

    #[test]
    fn strings_and_keywords() {
        assert_eq!(
            tokens(r#"x is not null and 'a\'b' in ["c"]"#),
            vec![
                Token::Ident("x".into()),
                Token::Is,
                Token::Not,
                Token::Null,
                Token::And,
                Token::Str("a'b".into()),
                Token::In,
                Token::LBracket,
                Token::Str("c".into()),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn errors() {
        assert!(matches!(
            tokenize("a == 'oops"),
            Err(ExprError::Syntax { pos: 5, .. })
        ));
        assert!(matches!(tokenize("a $ b"), Err(ExprError::Syntax { pos: 2, .. })));
        assert!(tokenize("0xzz").is_err());
    }
}
