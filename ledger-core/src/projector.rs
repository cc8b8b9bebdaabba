//! Column path expressions.
//!
//! A column is either a dotted path into a contract (`payload.bidData.price`)
//! or a small arithmetic expression over such paths
//! (`payload.cashAmountToPay / payload.issuerBondAssetDeposit.asset.quantity`).
//! Expressions are parsed once into an [`Expr`] and evaluated per contract.
//! Evaluation never fails: anything unresolvable renders as [`Cell::Missing`].

use contract_registry::Contract;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected '{found}' at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("empty segment in path '{0}'")]
    EmptySegment(String),
    #[error("expected an operand at offset {0}")]
    ExpectedOperand(usize),
    #[error("unclosed parenthesis at offset {0}")]
    UnclosedParen(usize),
    #[error("unexpected input at offset {0}")]
    Trailing(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn apply(self, lhs: f64, rhs: f64) -> Option<f64> {
        match self {
            BinaryOp::Add => Some(lhs + rhs),
            BinaryOp::Sub => Some(lhs - rhs),
            BinaryOp::Mul => Some(lhs * rhs),
            BinaryOp::Div if rhs == 0.0 => None,
            BinaryOp::Div => Some(lhs / rhs),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Path(Vec<String>),
    Number(f64),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// A rendered table cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Text(String),
    Missing,
}

impl Cell {
    pub const PLACEHOLDER: &'static str = "";

    pub fn as_str(&self) -> &str {
        match self {
            Cell::Text(s) => s,
            Cell::Missing => Self::PLACEHOLDER,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses and evaluates in one go. Tables should hold a parsed [`Expr`].
pub fn project(contract: &Contract, expression: &str) -> Cell {
    match Expr::parse(expression) {
        Ok(expr) => expr.eval(contract),
        Err(_) => Cell::Missing,
    }
}

impl Expr {
    pub fn parse(input: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            end: input.len(),
        };
        let expr = parser.sum()?;
        match parser.tokens.get(parser.pos) {
            Some((offset, _)) => Err(ExprError::Trailing(*offset)),
            None => Ok(expr),
        }
    }

    pub fn eval(&self, contract: &Contract) -> Cell {
        match self {
            Expr::Path(segments) => resolve(contract, segments)
                .map(|v| display(&v))
                .unwrap_or(Cell::Missing),
            _ => match self.numeric(contract) {
                Some(v) if v.is_finite() => Cell::Text(format_number(v)),
                _ => Cell::Missing,
            },
        }
    }

    fn numeric(&self, contract: &Contract) -> Option<f64> {
        match self {
            Expr::Path(segments) => resolve(contract, segments).and_then(|v| as_number(&v)),
            Expr::Number(n) => Some(*n),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = lhs.numeric(contract)?;
                let rhs = rhs.numeric(contract)?;
                op.apply(lhs, rhs)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Path(String),
    Number(f64),
    Op(BinaryOp),
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '+' => Token::Op(BinaryOp::Add),
            '-' => Token::Op(BinaryOp::Sub),
            '*' => Token::Op(BinaryOp::Mul),
            '/' => Token::Op(BinaryOp::Div),
            '(' => Token::Open,
            ')' => Token::Close,
            c if c.is_ascii_digit() => {
                let text = take_while(input, &mut chars, |c| c.is_ascii_digit() || c == '.');
                let value = text
                    .parse::<f64>()
                    .map_err(|_| ExprError::InvalidNumber(text.to_string()))?;
                tokens.push((offset, Token::Number(value)));
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let text = take_while(input, &mut chars, |c| {
                    c.is_alphanumeric() || c == '_' || c == '.'
                });
                if text.split('.').any(str::is_empty) {
                    return Err(ExprError::EmptySegment(text.to_string()));
                }
                tokens.push((offset, Token::Path(text.to_string())));
                continue;
            }
            found => return Err(ExprError::UnexpectedChar { found, offset }),
        };
        chars.next();
        tokens.push((offset, token));
    }

    Ok(tokens)
}

fn take_while<'a>(
    input: &'a str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'a>>,
    keep: impl Fn(char) -> bool,
) -> &'a str {
    let start = chars.peek().map(|(i, _)| *i).unwrap_or(input.len());
    let mut end = start;
    while let Some(&(i, c)) = chars.peek() {
        if !keep(c) {
            break;
        }
        end = i + c.len_utf8();
        chars.next();
    }
    &input[start..end]
}

struct Parser<'t> {
    tokens: &'t [(usize, Token)],
    pos: usize,
    end: usize,
}

impl Parser<'_> {
    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(offset, _)| *offset)
            .unwrap_or(self.end)
    }

    fn next_op(&mut self, accept: &[BinaryOp]) -> Option<BinaryOp> {
        match self.tokens.get(self.pos) {
            Some((_, Token::Op(op))) if accept.contains(op) => {
                self.pos += 1;
                Some(*op)
            }
            _ => None,
        }
    }

    fn sum(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.product()?;
        while let Some(op) = self.next_op(&[BinaryOp::Add, BinaryOp::Sub]) {
            let rhs = self.product()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn product(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.operand()?;
        while let Some(op) = self.next_op(&[BinaryOp::Mul, BinaryOp::Div]) {
            let rhs = self.operand()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn operand(&mut self) -> Result<Expr, ExprError> {
        let offset = self.offset();
        let Some((_, token)) = self.tokens.get(self.pos) else {
            return Err(ExprError::ExpectedOperand(offset));
        };
        self.pos += 1;
        match token {
            Token::Path(path) => Ok(Expr::Path(path.split('.').map(str::to_string).collect())),
            Token::Number(n) => Ok(Expr::Number(*n)),
            Token::Open => {
                let inner = self.sum()?;
                match self.tokens.get(self.pos) {
                    Some((_, Token::Close)) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(ExprError::UnclosedParen(offset)),
                }
            }
            Token::Op(_) | Token::Close => Err(ExprError::ExpectedOperand(offset)),
        }
    }
}

fn resolve(contract: &Contract, segments: &[String]) -> Option<Value> {
    let (root, rest) = segments.split_first()?;
    let mut current = match root.as_str() {
        "contractId" if rest.is_empty() => {
            return Some(Value::String(contract.contract_id.to_string()))
        }
        "templateId" if rest.is_empty() => {
            return Some(Value::String(contract.template_id.qualified_name()))
        }
        "payload" => &contract.payload,
        _ => return None,
    };

    for segment in rest {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

fn display(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Missing,
        Value::String(s) => Cell::Text(s.clone()),
        Value::Bool(b) => Cell::Text(b.to_string()),
        Value::Number(n) => Cell::Text(n.to_string()),
        Value::Array(items) => Cell::Text(
            items
                .iter()
                .map(|item| display(item).to_string())
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Object(_) => Cell::Text(value.to_string()),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
