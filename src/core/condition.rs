//! # Conditional Gates / 条件门控
//!
//! A small predicate language over matrix bindings, used by the `if` field of
//! steps and jobs and by `allow_failure`:
//!
//! ```text
//! expr    := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | primary
//! primary := "(" expr ")" | "contains" "(" field "," string ")"
//! field   := "matrix." key | key
//! ```
//!
//! Parsing and evaluation are pure. Errors are configuration errors.
//!
//! 一种针对矩阵绑定的小型谓词语言，用于步骤和作业的 `if` 字段以及 `allow_failure`。
//! 解析和求值都是纯函数。错误属于配置错误。

use std::collections::BTreeSet;
use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

use crate::core::error::{ConfigError, ConfigResult};
use crate::core::matrix::Bindings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `contains(matrix.<field>, '<substring>')`
    Contains { field: String, substring: String },
    Not(Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    And(Box<Condition>, Box<Condition>),
}

impl Condition {
    pub fn contains(field: impl Into<String>, substring: impl Into<String>) -> Self {
        Condition::Contains {
            field: field.into(),
            substring: substring.into(),
        }
    }

    pub fn negate(self) -> Self {
        Condition::Not(Box::new(self))
    }

    pub fn or(self, other: Condition) -> Self {
        Condition::Or(Box::new(self), Box::new(other))
    }

    pub fn and(self, other: Condition) -> Self {
        Condition::And(Box::new(self), Box::new(other))
    }

    /// Evaluates the predicate against an entry's bindings.
    ///
    /// Every referenced key must be bound, even on the side of `||`/`&&`
    /// that short-circuiting would not visit.
    ///
    /// 针对条目的绑定对谓词求值。每个引用的键都必须已绑定。
    pub fn evaluate(&self, bindings: &Bindings) -> ConfigResult<bool> {
        self.check_bindings(bindings)?;
        Ok(self.eval_bound(bindings))
    }

    /// Fails with [`ConfigError::UnboundKey`] for the first field missing from `bindings`.
    pub fn check_bindings(&self, bindings: &Bindings) -> ConfigResult<()> {
        match self.fields().into_iter().find(|f| !bindings.contains_key(*f)) {
            Some(key) => Err(ConfigError::UnboundKey {
                key: key.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// All keys the predicate reads.
    pub fn fields(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Condition::Contains { field, .. } => {
                out.insert(field.as_str());
            }
            Condition::Not(inner) => inner.collect_fields(out),
            Condition::Or(a, b) | Condition::And(a, b) => {
                a.collect_fields(out);
                b.collect_fields(out);
            }
        }
    }

    fn eval_bound(&self, bindings: &Bindings) -> bool {
        match self {
            Condition::Contains { field, substring } => bindings
                .get(field)
                .is_some_and(|value| value.contains(substring.as_str())),
            Condition::Not(inner) => !inner.eval_bound(bindings),
            Condition::Or(a, b) => a.eval_bound(bindings) || b.eval_bound(bindings),
            Condition::And(a, b) => a.eval_bound(bindings) && b.eval_bound(bindings),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Contains { field, substring } => {
                write!(f, "contains(matrix.{field}, '{substring}')")
            }
            Condition::Not(inner) => write!(f, "!{inner}"),
            Condition::Or(a, b) => write!(f, "({a} || {b})"),
            Condition::And(a, b) => write!(f, "({a} && {b})"),
        }
    }
}

impl FromStr for Condition {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Parses the textual form of a condition.
/// 解析条件的文本形式。
pub fn parse(input: &str) -> ConfigResult<Condition> {
    let tokens = tokenize(input).map_err(|message| invalid(input, message))?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        input,
    };
    let condition = parser.parse_or()?;
    match parser.peek() {
        None => Ok(condition),
        Some(token) => Err(invalid(input, format!("unexpected {token}"))),
    }
}

fn invalid(expr: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidCondition {
        expr: expr.to_string(),
        message: message.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Not,
    Or,
    And,
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "identifier '{name}'"),
            Token::Str(s) => write!(f, "string '{s}'"),
            Token::Not => f.write_str("'!'"),
            Token::Or => f.write_str("'||'"),
            Token::And => f.write_str("'&&'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '|' | '&' => {
                chars.next();
                if chars.next() != Some(c) {
                    return Err(format!("expected '{c}{c}'"));
                }
                tokens.push(if c == '|' { Token::Or } else { Token::And });
            }
            '\'' | '"' => tokens.push(Token::Str(read_string(&mut chars)?)),
            c if is_ident_char(c) => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_ident_char(c) {
                        break;
                    }
                    ident.push(c);
                    chars.next();
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn read_string(chars: &mut Peekable<Chars<'_>>) -> Result<String, String> {
    let Some(quote) = chars.next() else {
        return Err("expected string".to_string());
    };
    let mut value = String::new();
    loop {
        match chars.next() {
            Some('\\') => match chars.next() {
                Some(escaped) => value.push(escaped),
                None => return Err("unterminated string".to_string()),
            },
            Some(c) if c == quote => return Ok(value),
            Some(c) => value.push(c),
            None => return Err("unterminated string".to_string()),
        }
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    input: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> ConfigResult<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(invalid(
                self.input,
                format!("expected {expected}, found {token}"),
            )),
            None => Err(invalid(
                self.input,
                format!("expected {expected}, found end of input"),
            )),
        }
    }

    fn parse_or(&mut self) -> ConfigResult<Condition> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let right = self.parse_and()?;
            left = left.or(right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ConfigResult<Condition> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let right = self.parse_unary()?;
            left = left.and(right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ConfigResult<Condition> {
        if self.peek() == Some(&Token::Not) {
            self.next();
            return Ok(self.parse_unary()?.negate());
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ConfigResult<Condition> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) if name == "contains" => {
                self.expect(Token::LParen)?;
                let field = match self.next() {
                    Some(Token::Ident(path)) => field_name(&path)
                        .ok_or_else(|| invalid(self.input, format!("invalid field '{path}'")))?,
                    other => {
                        return Err(invalid(
                            self.input,
                            format!("expected field, found {}", describe(other.as_ref())),
                        ));
                    }
                };
                self.expect(Token::Comma)?;
                let substring = match self.next() {
                    Some(Token::Str(s)) => s,
                    other => {
                        return Err(invalid(
                            self.input,
                            format!("expected string, found {}", describe(other.as_ref())),
                        ));
                    }
                };
                self.expect(Token::RParen)?;
                Ok(Condition::contains(field, substring))
            }
            other => Err(invalid(
                self.input,
                format!("expected condition, found {}", describe(other.as_ref())),
            )),
        }
    }
}

fn describe(token: Option<&Token>) -> String {
    token.map_or_else(|| "end of input".to_string(), Token::to_string)
}

/// Strips the `matrix.` prefix; nested paths are not supported.
fn field_name(path: &str) -> Option<String> {
    let key = path.strip_prefix("matrix.").unwrap_or(path);
    if key.is_empty() || key.contains('.') {
        None
    } else {
        Some(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> Bindings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_contains() {
        assert_eq!(
            parse("contains(matrix.imgtag, '2.7')").unwrap(),
            Condition::contains("imgtag", "2.7")
        );
        assert_eq!(
            parse("contains(imgtag, \"pypy\")").unwrap(),
            Condition::contains("imgtag", "pypy")
        );
    }

    #[test]
    fn precedence_not_and_or() {
        let parsed = parse("!contains(matrix.a, 'x') || contains(matrix.b, 'y') && contains(matrix.c, 'z')")
            .unwrap();
        let expected = Condition::contains("a", "x").negate().or(
            Condition::contains("b", "y").and(Condition::contains("c", "z")),
        );
        assert_eq!(parsed, expected);

        let grouped = parse("!(contains(matrix.a, 'x') || contains(matrix.b, 'y'))").unwrap();
        assert_eq!(
            grouped,
            Condition::contains("a", "x")
                .or(Condition::contains("b", "y"))
                .negate()
        );
    }

    #[test]
    fn evaluates_against_bindings() {
        let skip_b = parse("!contains(matrix.img, 'B')").unwrap();
        assert!(skip_b.evaluate(&bindings(&[("img", "A")])).unwrap());
        assert!(!skip_b.evaluate(&bindings(&[("img", "B")])).unwrap());

        let either = parse("contains(matrix.img, '2.7') || contains(matrix.img, 'pypy')").unwrap();
        assert!(either.evaluate(&bindings(&[("img", "pypy3")])).unwrap());
        assert!(either.evaluate(&bindings(&[("img", "2.7-slim")])).unwrap());
        assert!(!either.evaluate(&bindings(&[("img", "3.9")])).unwrap());
    }

    #[test]
    fn unbound_key_is_an_error_even_when_short_circuited() {
        let cond = parse("contains(matrix.img, 'A') || contains(matrix.missing, 'x')").unwrap();
        let err = cond.evaluate(&bindings(&[("img", "A")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnboundKey { ref key } if key == "missing"));
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in [
            "",
            "contains(matrix.img)",
            "contains(matrix.img, 'x'",
            "contains(matrix.img, x)",
            "contains(matrix.a.b, 'x')",
            "contains(matrix.img, 'x') |",
            "contains(matrix.img, 'x') contains(matrix.img, 'y')",
            "equals(matrix.img, 'x')",
            "contains(matrix.img, 'unterminated)",
            "contains(matrix.img, 'x') # comment",
        ] {
            assert!(
                matches!(parse(bad), Err(ConfigError::InvalidCondition { .. })),
                "expected parse failure for {bad:?}"
            );
        }
    }

    #[test]
    fn display_round_trips_through_parse() {
        let cond = parse("!contains(matrix.img, 'B') && (contains(matrix.v, '1') || contains(matrix.v, '2'))")
            .unwrap();
        assert_eq!(parse(&cond.to_string()).unwrap(), cond);
    }
}
