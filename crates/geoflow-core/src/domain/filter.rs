//! ChainFilter - feature predicate used when a workflow chains.
//!
//! A small embedded expression language over a feature's JSON fields:
//!
//! ```text
//! expr       := or
//! or         := and (("|" | "||" | "or") and)*
//! and        := term (("&" | "&&" | "and") term)*
//! term       := "(" expr ")" | comparison
//! comparison := path (op literal)?
//! path       := "@" ("." (name | string) | "[" (string | integer) "]")*
//! op         := "==" | "=" | "!=" | "<" | "<=" | ">" | ">=" | "=~"
//! literal    := string | number | true | false | null
//! ```
//!
//! A bare path tests for presence. Comparisons against a missing field, or
//! ordering across mismatched types, are false rather than errors.

use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;

use super::errors::ValidationError;
use super::feature::Feature;

#[derive(Debug, Clone)]
pub struct ChainFilter {
    expression: String,
    expr: Expr,
}

impl ChainFilter {
    pub fn parse(expression: &str) -> Result<Self, ValidationError> {
        let invalid = |message: String| ValidationError::InvalidFilter {
            expression: expression.to_string(),
            message,
        };
        let tokens = tokenize(expression).map_err(invalid)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or().map_err(invalid)?;
        if let Some(tok) = parser.peek() {
            return Err(invalid(format!("unexpected trailing token {tok:?}")));
        }
        Ok(Self {
            expression: expression.to_string(),
            expr,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn matches(&self, feature: &Value) -> bool {
        self.expr.eval(feature)
    }

    /// Matching subset of `features`, order preserved.
    pub fn apply(&self, features: &[Feature]) -> Vec<Feature> {
        features
            .iter()
            .filter(|f| self.matches(&f.to_value()))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Exists(Vec<Segment>),
    Compare(Vec<Segment>, CmpOp, Value),
    Matches(Vec<Segment>, Regex),
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Expr {
    fn eval(&self, root: &Value) -> bool {
        match self {
            Expr::Or(a, b) => a.eval(root) || b.eval(root),
            Expr::And(a, b) => a.eval(root) && b.eval(root),
            Expr::Exists(path) => resolve(root, path).is_some(),
            Expr::Compare(path, op, rhs) => match resolve(root, path) {
                Some(lhs) => compare(lhs, *op, rhs),
                None => false,
            },
            Expr::Matches(path, re) => match resolve(root, path) {
                Some(Value::String(s)) => re.is_match(s),
                _ => false,
            },
        }
    }
}

fn resolve<'a>(root: &'a Value, path: &[Segment]) -> Option<&'a Value> {
    let mut cur = root;
    for seg in path {
        cur = match seg {
            Segment::Key(k) => cur.get(k.as_str())?,
            Segment::Index(i) => cur.get(*i)?,
        };
    }
    Some(cur)
}

fn compare(lhs: &Value, op: CmpOp, rhs: &Value) -> bool {
    let ordering = match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    };
    match (op, ordering) {
        (CmpOp::Eq, Some(o)) => o == Ordering::Equal,
        (CmpOp::Eq, None) => lhs == rhs,
        (CmpOp::Ne, Some(o)) => o != Ordering::Equal,
        (CmpOp::Ne, None) => lhs != rhs,
        (CmpOp::Lt, Some(o)) => o == Ordering::Less,
        (CmpOp::Le, Some(o)) => o != Ordering::Greater,
        (CmpOp::Gt, Some(o)) => o == Ordering::Greater,
        (CmpOp::Ge, Some(o)) => o != Ordering::Less,
        (_, None) => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    At,
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    And,
    Or,
    Op(&'static str),
    Name(String),
    Str(String),
    Num(serde_json::Number),
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '@' => {
                tokens.push(Token::At);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' => {
                tokens.push(Token::And);
                i += if next == Some('&') { 2 } else { 1 };
            }
            '|' => {
                tokens.push(Token::Or);
                i += if next == Some('|') { 2 } else { 1 };
            }
            '=' => {
                let (op, len) = match next {
                    Some('=') => ("==", 2),
                    Some('~') => ("=~", 2),
                    _ => ("==", 1),
                };
                tokens.push(Token::Op(op));
                i += len;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Op("!="));
                i += 2;
            }
            '<' | '>' => {
                let op = match (c, next) {
                    ('<', Some('=')) => "<=",
                    ('>', Some('=')) => ">=",
                    ('<', _) => "<",
                    _ => ">",
                };
                tokens.push(Token::Op(op));
                i += op.len();
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".into()),
                        Some('\\') => {
                            if let Some(&escaped) = chars.get(i + 1) {
                                s.push(escaped);
                            }
                            i += 2;
                        }
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_ascii_digit() || matches!(chars[i], '.' | 'e' | 'E' | '+' | '-'))
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let num = serde_json::from_str::<serde_json::Number>(&text)
                    .map_err(|_| format!("invalid number `{text}`"))?;
                tokens.push(Token::Num(num));
            }
            c if is_name_char(c) => {
                let start = i;
                while i < chars.len() && is_name_char(chars[i]) {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                tokens.push(match name.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    _ => Token::Name(name),
                });
            }
            other => return Err(format!("unexpected character `{other}`")),
        }
    }
    Ok(tokens)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | ':')
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expect(&mut self, want: Token) -> Result<(), String> {
        match self.next() {
            Some(tok) if tok == want => Ok(()),
            Some(tok) => Err(format!("expected {want:?}, found {tok:?}")),
            None => Err(format!("expected {want:?}, found end of input")),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_term()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.parse_term()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.parse_or()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        let path = self.parse_path()?;
        let op = match self.peek() {
            Some(Token::Op(op)) => *op,
            _ => return Ok(Expr::Exists(path)),
        };
        self.pos += 1;
        let literal = self.parse_literal()?;
        if op == "=~" {
            let Value::String(pattern) = literal else {
                return Err("`=~` requires a string pattern".into());
            };
            let re = Regex::new(&pattern).map_err(|e| e.to_string())?;
            return Ok(Expr::Matches(path, re));
        }
        let op = match op {
            "==" => CmpOp::Eq,
            "!=" => CmpOp::Ne,
            "<" => CmpOp::Lt,
            "<=" => CmpOp::Le,
            ">" => CmpOp::Gt,
            _ => CmpOp::Ge,
        };
        Ok(Expr::Compare(path, op, literal))
    }

    fn parse_path(&mut self) -> Result<Vec<Segment>, String> {
        self.expect(Token::At)?;
        let mut path = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.next() {
                        Some(Token::Name(name) | Token::Str(name)) => path.push(Segment::Key(name)),
                        other => return Err(format!("expected field name after `.`, found {other:?}")),
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    match self.next() {
                        Some(Token::Str(key)) => path.push(Segment::Key(key)),
                        Some(Token::Num(n)) => {
                            let idx = n
                                .as_u64()
                                .ok_or_else(|| format!("invalid index {n}"))?;
                            path.push(Segment::Index(idx as usize));
                        }
                        other => return Err(format!("invalid subscript {other:?}")),
                    }
                    self.expect(Token::RBracket)?;
                }
                _ => break,
            }
        }
        if path.is_empty() {
            return Err("path must select a field".into());
        }
        Ok(path)
    }

    fn parse_literal(&mut self) -> Result<Value, String> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Value::String(s)),
            Some(Token::Num(n)) => Ok(Value::Number(n)),
            Some(Token::Name(name)) => match name.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "null" => Ok(Value::Null),
                _ => Err(format!("unexpected name `{name}` in literal position")),
            },
            Some(tok) => Err(format!("expected literal, found {tok:?}")),
            None => Err("expected literal, found end of input".into()),
        }
    }
}
