//! SlashstepQL lexer.
//!
//! Turns a filter query into a flat token stream. Scanning is left to right,
//! taking the longest token that matches at the current position. Keywords are
//! case-insensitive.

use super::SlashstepQLError;

/// Comparison operators accepted between a key and a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Matches,
    MatchesInsensitive,
    NotMatches,
    NotMatchesInsensitive,
}

impl ComparisonOperator {
    /// The operator as written in SQL.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThanOrEqual => "<=",
            Self::Matches => "~",
            Self::MatchesInsensitive => "~*",
            Self::NotMatches => "!~",
            Self::NotMatchesInsensitive => "!~*",
        }
    }
}

// Longest operators first so `>=` is never read as `>` followed by `=`.
const OPERATORS: &[(&str, ComparisonOperator)] = &[
    ("!~*", ComparisonOperator::NotMatchesInsensitive),
    ("!~", ComparisonOperator::NotMatches),
    ("~*", ComparisonOperator::MatchesInsensitive),
    (">=", ComparisonOperator::GreaterThanOrEqual),
    ("<=", ComparisonOperator::LessThanOrEqual),
    ("~", ComparisonOperator::Matches),
    ("=", ComparisonOperator::Equal),
    (">", ComparisonOperator::GreaterThan),
    ("<", ComparisonOperator::LessThan),
];

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LeftParenthesis,
    RightParenthesis,
    And,
    Or,
    Not,
    Limit,
    Offset,
    Identifier(String),
    Operator(ComparisonOperator),
    String(String),
    /// Raw numeric text; callers decide whether they need an integer or a float.
    Number(String),
    Boolean(bool),
}

impl Token {
    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::LeftParenthesis => "\"(\"".to_string(),
            Self::RightParenthesis => "\")\"".to_string(),
            Self::And => "\"and\"".to_string(),
            Self::Or => "\"or\"".to_string(),
            Self::Not => "\"not\"".to_string(),
            Self::Limit => "\"limit\"".to_string(),
            Self::Offset => "\"offset\"".to_string(),
            Self::Identifier(name) => format!("key \"{name}\""),
            Self::Operator(operator) => format!("operator \"{}\"", operator.as_sql()),
            Self::String(_) => "string literal".to_string(),
            Self::Number(raw) => format!("number {raw}"),
            Self::Boolean(value) => format!("boolean {value}"),
        }
    }
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub offset: usize,
}

/// Tokenize a filter query.
pub fn tokenize(input: &str) -> Result<Vec<Lexeme>, SlashstepQLError> {
    let mut lexer = Lexer { input, position: 0 };
    let mut lexemes = Vec::new();

    while let Some(lexeme) = lexer.next_lexeme()? {
        lexemes.push(lexeme);
    }

    Ok(lexemes)
}

struct Lexer<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Lexer<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn next_lexeme(&mut self) -> Result<Option<Lexeme>, SlashstepQLError> {
        let trimmed = self.rest().trim_start();
        self.position = self.input.len() - trimmed.len();

        let offset = self.position;
        let Some(first) = trimmed.chars().next() else {
            return Ok(None);
        };

        let token = match first {
            '(' => {
                self.position += 1;
                Token::LeftParenthesis
            }
            ')' => {
                self.position += 1;
                Token::RightParenthesis
            }
            '"' | '\'' => self.read_string(first)?,
            c if c.is_ascii_digit() || c == '-' => self.read_number()?,
            c if c.is_ascii_alphabetic() || c == '_' => self.read_word(),
            _ => self.read_operator()?,
        };

        Ok(Some(Lexeme { token, offset }))
    }

    fn read_string(&mut self, quote: char) -> Result<Token, SlashstepQLError> {
        let start = self.position;
        let mut value = String::new();
        let mut chars = self.rest().char_indices().skip(1);

        while let Some((index, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => break,
                },
                c if c == quote => {
                    self.position += index + c.len_utf8();
                    return Ok(Token::String(value));
                }
                c => value.push(c),
            }
        }

        Err(SlashstepQLError::InvalidQuery(format!(
            "unterminated string starting at position {start}"
        )))
    }

    fn read_number(&mut self) -> Result<Token, SlashstepQLError> {
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let mut end = usize::from(bytes[0] == b'-');

        let integer_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end == integer_start {
            return Err(self.unexpected());
        }

        if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
            end += 1;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
        }

        let raw = rest[..end].to_string();
        self.position += end;
        Ok(Token::Number(raw))
    }

    fn read_word(&mut self) -> Token {
        let rest = self.rest();
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let word = &rest[..end];
        self.position += end;

        match word.to_ascii_lowercase().as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "limit" => Token::Limit,
            "offset" => Token::Offset,
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            _ => Token::Identifier(word.to_string()),
        }
    }

    fn read_operator(&mut self) -> Result<Token, SlashstepQLError> {
        let rest = self.rest();
        for (text, operator) in OPERATORS {
            if rest.starts_with(text) {
                self.position += text.len();
                return Ok(Token::Operator(*operator));
            }
        }

        Err(self.unexpected())
    }

    fn unexpected(&self) -> SlashstepQLError {
        SlashstepQLError::InvalidQuery(format!(
            "unexpected input at position {}: {}",
            self.position,
            self.rest()
        ))
    }
}
