//! Recursive-descent parser over the SlashstepQL token stream.
//!
//! Grammar:
//!
//! ```text
//! query      := modifier* expression? modifier*
//! modifier   := "limit" NUMBER | "offset" NUMBER
//! expression := term (("and" | "or") term)*
//! term       := "not"* ( "(" expression ")" | assignment )
//! assignment := KEY OPERATOR (STRING | NUMBER | BOOLEAN)
//! ```
//!
//! Connectives are emitted in the order written. No precedence is imposed
//! beyond what the caller's parentheses and the database already apply.

use std::collections::HashSet;

use super::lexer::{Lexeme, Token};
use super::{FilterParameter, FilterValue, SlashstepQLError};

/// Deepest parenthesis nesting a query may use.
pub const MAXIMUM_NESTING_DEPTH: usize = 64;

/// Output of a successful parse, before compile options are applied.
#[derive(Debug, Default)]
pub struct ParsedFilter {
    pub clause: String,
    pub parameters: Vec<FilterParameter>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub struct Parser<'a> {
    lexemes: &'a [Lexeme],
    allowed_keys: &'a HashSet<String>,
    position: usize,
    depth: usize,
    output: ParsedFilter,
}

impl<'a> Parser<'a> {
    pub const fn new(lexemes: &'a [Lexeme], allowed_keys: &'a HashSet<String>) -> Self {
        Self {
            lexemes,
            allowed_keys,
            position: 0,
            depth: 0,
            output: ParsedFilter {
                clause: String::new(),
                parameters: Vec::new(),
                limit: None,
                offset: None,
            },
        }
    }

    pub fn parse(mut self) -> Result<ParsedFilter, SlashstepQLError> {
        self.parse_modifiers()?;

        if self.peek().is_some() {
            self.parse_expression()?;
        }

        self.parse_modifiers()?;

        if let Some(lexeme) = self.lexemes.get(self.position) {
            return Err(match lexeme.token {
                Token::RightParenthesis => SlashstepQLError::InvalidQuery(format!(
                    "unmatched \")\" at position {}",
                    lexeme.offset
                )),
                _ => unexpected(lexeme, "\"and\", \"or\", \"limit\", or \"offset\""),
            });
        }

        Ok(self.output)
    }

    fn peek(&self) -> Option<&'a Token> {
        self.lexemes.get(self.position).map(|lexeme| &lexeme.token)
    }

    fn advance(&mut self) -> Option<&'a Lexeme> {
        let lexeme = self.lexemes.get(self.position);
        if lexeme.is_some() {
            self.position += 1;
        }
        lexeme
    }

    fn parse_modifiers(&mut self) -> Result<(), SlashstepQLError> {
        loop {
            match self.peek() {
                Some(Token::Limit) => {
                    self.advance();
                    let value = self.read_unsigned("limit")?;
                    self.output.limit = Some(value);
                }
                Some(Token::Offset) => {
                    self.advance();
                    let value = self.read_unsigned("offset")?;
                    self.output.offset = Some(value);
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_unsigned(&mut self, keyword: &str) -> Result<i64, SlashstepQLError> {
        let invalid = |raw: String| match keyword {
            "limit" => SlashstepQLError::InvalidLimit(raw),
            _ => SlashstepQLError::InvalidOffset(raw),
        };

        let Some(lexeme) = self.advance() else {
            return Err(SlashstepQLError::InvalidQuery(format!(
                "expected a number after \"{keyword}\""
            )));
        };

        match &lexeme.token {
            Token::Number(raw) if raw.bytes().all(|b| b.is_ascii_digit()) => {
                raw.parse::<i64>().map_err(|_| invalid(raw.clone()))
            }
            Token::Number(raw) => Err(invalid(raw.clone())),
            other => Err(invalid(other.describe())),
        }
    }

    fn parse_expression(&mut self) -> Result<(), SlashstepQLError> {
        self.parse_term()?;

        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.advance();
                    self.output.clause.push_str(" and ");
                }
                Some(Token::Or) => {
                    self.advance();
                    self.output.clause.push_str(" or ");
                }
                _ => return Ok(()),
            }

            self.parse_term()?;
        }
    }

    fn parse_term(&mut self) -> Result<(), SlashstepQLError> {
        while let Some(Token::Not) = self.peek() {
            self.advance();
            self.output.clause.push_str("not ");
        }

        let Some(lexeme) = self.advance() else {
            return Err(SlashstepQLError::InvalidQuery(
                "unexpected end of query".to_string(),
            ));
        };

        match &lexeme.token {
            Token::LeftParenthesis => {
                if self.depth >= MAXIMUM_NESTING_DEPTH {
                    return Err(SlashstepQLError::InvalidQuery(format!(
                        "parentheses nested deeper than {MAXIMUM_NESTING_DEPTH} at position {}",
                        lexeme.offset
                    )));
                }

                self.depth += 1;
                self.output.clause.push('(');
                self.parse_expression()?;
                self.depth -= 1;

                match self.advance() {
                    Some(Lexeme {
                        token: Token::RightParenthesis,
                        ..
                    }) => {
                        self.output.clause.push(')');
                        Ok(())
                    }
                    Some(other) => Err(unexpected(other, "\")\"")),
                    None => Err(SlashstepQLError::InvalidQuery(format!(
                        "unclosed \"(\" at position {}",
                        lexeme.offset
                    ))),
                }
            }
            Token::Identifier(key) => self.parse_assignment(key),
            _ => Err(unexpected(lexeme, "a key or \"(\"")),
        }
    }

    fn parse_assignment(&mut self, key: &str) -> Result<(), SlashstepQLError> {
        if !self.allowed_keys.contains(key) {
            return Err(SlashstepQLError::InvalidKey(key.to_string()));
        }

        let operator = match self.advance() {
            Some(Lexeme {
                token: Token::Operator(operator),
                ..
            }) => *operator,
            Some(other) => return Err(unexpected(other, "a comparison operator")),
            None => {
                return Err(SlashstepQLError::InvalidQuery(format!(
                    "expected a comparison operator after \"{key}\""
                )))
            }
        };

        let value = match self.advance() {
            Some(Lexeme {
                token: Token::String(value),
                ..
            }) => FilterValue::String(value.clone()),
            Some(Lexeme {
                token: Token::Number(raw),
                offset,
            }) => FilterValue::Number(raw.parse::<f64>().map_err(|_| {
                SlashstepQLError::InvalidQuery(format!("invalid number at position {offset}"))
            })?),
            Some(Lexeme {
                token: Token::Boolean(value),
                ..
            }) => FilterValue::Boolean(*value),
            Some(other) => return Err(unexpected(other, "a value")),
            None => {
                return Err(SlashstepQLError::InvalidQuery(format!(
                    "expected a value after \"{key} {}\"",
                    operator.as_sql()
                )))
            }
        };

        self.output.parameters.push(FilterParameter {
            key: key.to_string(),
            value,
        });

        let placeholder = self.output.parameters.len();
        self.output
            .clause
            .push_str(&format!("{key} {} ${placeholder}", operator.as_sql()));

        Ok(())
    }
}

fn unexpected(lexeme: &Lexeme, expected: &str) -> SlashstepQLError {
    SlashstepQLError::InvalidQuery(format!(
        "expected {expected} at position {}, found {}",
        lexeme.offset,
        lexeme.token.describe()
    ))
}
