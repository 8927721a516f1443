//! Parser for the system-field filter grammar.
//!
//! ```text
//! filter     := conjunct ( "AND" conjunct )*
//! conjunct   := factor ( "OR" factor )*
//! factor     := "(" filter ")" | comparison
//! comparison := FIELD OP ( STRING | WORD )
//! OP         := "=" | "!=" | "<" | "<=" | ">" | ">=" | "=~" | ":"
//! ```
//!
//! `OR` binds tighter than `AND`.

use super::system::{CompareOp, Field, SystemFilter, is_word_char};
use crate::error::FilterError;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Str(String),
    Op(CompareOp),
    LParen,
    RParen,
    And,
    Or,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(word) => word.clone(),
            Token::Str(text) => format!("\"{text}\""),
            Token::Op(op) => op.symbol().to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::And => "AND".to_string(),
            Token::Or => "OR".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, FilterError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some((offset, ch)) = chars.next() {
        let token = match ch {
            c if c.is_whitespace() => continue,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ':' => Token::Op(CompareOp::Has),
            '=' => {
                if chars.next_if(|(_, next)| *next == '~').is_some() {
                    Token::Op(CompareOp::Regex)
                } else {
                    Token::Op(CompareOp::Eq)
                }
            }
            '!' => {
                if chars.next_if(|(_, next)| *next == '=').is_some() {
                    Token::Op(CompareOp::Ne)
                } else {
                    return Err(FilterError::UnexpectedToken {
                        offset,
                        found: "!".to_string(),
                    });
                }
            }
            '<' => {
                if chars.next_if(|(_, next)| *next == '=').is_some() {
                    Token::Op(CompareOp::Le)
                } else {
                    Token::Op(CompareOp::Lt)
                }
            }
            '>' => {
                if chars.next_if(|(_, next)| *next == '=').is_some() {
                    Token::Op(CompareOp::Ge)
                } else {
                    Token::Op(CompareOp::Gt)
                }
            }
            '"' => {
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, next)) = chars.next() {
                    match next {
                        '\\' => match chars.next() {
                            Some((_, escaped)) => text.push(escaped),
                            None => break,
                        },
                        '"' => {
                            closed = true;
                            break;
                        }
                        other => text.push(other),
                    }
                }
                if !closed {
                    return Err(FilterError::UnterminatedString(offset));
                }
                Token::Str(text)
            }
            c if is_word_char(c) => {
                let mut word = String::from(c);
                while let Some((_, next)) = chars.next_if(|(_, next)| is_word_char(*next)) {
                    word.push(next);
                }
                match word.as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    _ => Token::Word(word),
                }
            }
            other => {
                return Err(FilterError::UnexpectedToken {
                    offset,
                    found: other.to_string(),
                });
            }
        };
        tokens.push((offset, token));
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn next(&mut self) -> Result<(usize, Token), FilterError> {
        let item = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(FilterError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(item)
    }

    fn parse_filter(&mut self) -> Result<SystemFilter, FilterError> {
        let mut terms = vec![self.parse_conjunct()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.parse_conjunct()?);
        }
        Ok(collapse(terms, SystemFilter::And))
    }

    fn parse_conjunct(&mut self) -> Result<SystemFilter, FilterError> {
        let mut terms = vec![self.parse_factor()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.parse_factor()?);
        }
        Ok(collapse(terms, SystemFilter::Or))
    }

    fn parse_factor(&mut self) -> Result<SystemFilter, FilterError> {
        let (offset, token) = self.next()?;
        match token {
            Token::LParen => {
                let inner = self.parse_filter()?;
                match self.next()? {
                    (_, Token::RParen) => Ok(inner),
                    (offset, other) => Err(unexpected(offset, &other)),
                }
            }
            Token::Word(path) => {
                let field = Field::from_path(&path)?;
                let op = match self.next()? {
                    (_, Token::Op(op)) => op,
                    (offset, other) => return Err(unexpected(offset, &other)),
                };
                let value = match self.next()? {
                    (_, Token::Str(text)) | (_, Token::Word(text)) => text,
                    (offset, other) => return Err(unexpected(offset, &other)),
                };
                SystemFilter::compare(field, op, &value)
            }
            other => Err(unexpected(offset, &other)),
        }
    }
}

fn unexpected(offset: usize, token: &Token) -> FilterError {
    FilterError::UnexpectedToken {
        offset,
        found: token.describe(),
    }
}

fn collapse(
    mut terms: Vec<SystemFilter>,
    combine: fn(Vec<SystemFilter>) -> SystemFilter,
) -> SystemFilter {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        combine(terms)
    }
}

impl SystemFilter {
    /// Parse a filter string, validating fields, operators, and values.
    pub fn parse(input: &str) -> Result<Self, FilterError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let filter = parser.parse_filter()?;
        if let Some((offset, token)) = parser.tokens.get(parser.pos) {
            return Err(unexpected(*offset, token));
        }
        Ok(filter)
    }
}
