//! Arithmetic formulas over named variables.
//!
//! Operators, loosest binding first:
//!
//! | Operators                          | Notes                      |
//! | ---------------------------------- | -------------------------- |
//! | `cond ? a : b`                     | right associative          |
//! | `\|\|`, `&&`                       | short circuit, 1 or 0      |
//! | `==`, `!=`, `<`, `<=`, `>`, `>=`   | 1 or 0                     |
//! | `+`, `-`                           |                            |
//! | `*`, `/`, `%`                      |                            |
//! | unary `-`, `!`                     |                            |
//! | `^`, `**`                          | right associative          |
//!
//! Operands are numbers (`0.5`, `1e-3`), text in single or double quotes,
//! variables, parenthesized expressions and function calls. Functions are
//! `exp`, `ln` (or `log`), `log10`, `sqrt`, `abs`, `round`, `floor`, `ceil`,
//! `pow`, `min`, `max` and `contains(list, text)`. A `Math.` prefix on a
//! function name is ignored.
//!
//! ## Examples
//!
//! ```rust
//! use ncscore::formula::{Formula, Term};
//! use std::collections::BTreeMap;
//!
//! let formula: Formula = "1 / (1 + Math.exp(-(cadd - 20) / 5))".parse()?;
//! let variables = BTreeMap::from([("cadd".to_string(), Term::Number(20.0))]);
//! assert_eq!(formula.evaluate(&variables)?, 0.5);
//!
//! let formula: Formula = "contains(impacts, 'HIGH') ? 1 : 0.25".parse()?;
//! let variables = BTreeMap::from([("impacts".to_string(), Term::List(vec!["HIGH".to_string()]))]);
//! assert_eq!(formula.evaluate(&variables)?, 1.0);
//! # Ok::<(), color_eyre::eyre::Report>(())
//! ```


use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Operators, longest first so that `**` wins over `*`.
const OPERATORS: &[&str] = &[
    "**", "==", "!=", "<=", ">=", "&&", "||", "+", "-", "*", "/", "%", "^", "<", ">", "!", "?", ":", "(", ")", ",",
];

/// Binary operators by precedence level, loosest first.
const LEVELS: &[&[&str]] = &[&["||"], &["&&"], &["==", "!=", "<", "<=", ">", ">="], &["+", "-"], &["*", "/", "%"]];

// ----------------------------------------------------------------------------
// Term
// ----------------------------------------------------------------------------

/// Value of a variable or sub-expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl Term {
    pub fn as_number(&self) -> Result<f64, Report> {
        match self {
            Term::Number(n) => Ok(*n),
            other => Err(eyre!("Expected a number, found: {other}")),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Term::Number(n) => *n != 0.0 && !n.is_nan(),
            Term::Text(text) => !text.is_empty(),
            Term::List(items) => !items.is_empty(),
        }
    }

    /// A list equals a text it contains.
    fn equals(&self, other: &Term) -> bool {
        match (self, other) {
            (Term::Number(a), Term::Number(b)) => a == b,
            (Term::Text(a), Term::Text(b)) => a == b,
            (Term::List(items), Term::Text(text)) | (Term::Text(text), Term::List(items)) => items.contains(text),
            (Term::List(a), Term::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Number(n) => write!(f, "{n}"),
            Term::Text(text) => write!(f, "'{text}'"),
            Term::List(items) => write!(f, "[{}]", items.iter().join(", ")),
        }
    }
}

fn flag(value: bool) -> f64 {
    match value {
        true => 1.0,
        false => 0.0,
    }
}

// ----------------------------------------------------------------------------
// Tokens
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Text(String),
    Ident(String),
    Op(&'static str),
}

fn tokenize(source: &str) -> Result<Vec<Token>, Report> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next_is_digit = chars.get(i + 1).is_some_and(|d| d.is_ascii_digit());

        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || (c == '.' && next_is_digit) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                let mut j = i + 1;
                if j < chars.len() && matches!(chars[j], '+' | '-') {
                    j += 1;
                }
                if chars.get(j).is_some_and(|d| d.is_ascii_digit()) {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().collect();
            let number = text.parse::<f64>().map_err(|_| eyre!("Invalid number {text:?} in formula: {source}"))?;
            tokens.push(Token::Number(number));
        } else if c == '\'' || c == '"' {
            let length = chars[i + 1..]
                .iter()
                .position(|&quote| quote == c)
                .ok_or_else(|| eyre!("Unterminated text in formula: {source}"))?;
            tokens.push(Token::Text(chars[i + 1..i + 1 + length].iter().collect()));
            i += length + 2;
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else {
            let rest: String = chars[i..].iter().take(2).collect();
            let op = *OPERATORS
                .iter()
                .find(|op| rest.starts_with(**op))
                .ok_or_else(|| eyre!("Unexpected character {c:?} in formula: {source}"))?;
            tokens.push(Token::Op(op));
            i += op.len();
        }
    }

    Ok(tokens)
}

// ----------------------------------------------------------------------------
// Parser
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum Expr {
    Number(f64),
    Text(String),
    Variable(String),
    Unary(&'static str, Box<Expr>),
    Binary(&'static str, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

fn known_function(name: &str, arity: usize) -> bool {
    match name {
        "exp" | "ln" | "log" | "log10" | "sqrt" | "abs" | "round" | "floor" | "ceil" => arity == 1,
        "pow" | "contains" => arity == 2,
        "min" | "max" => arity >= 1,
        _ => false,
    }
}

struct Parser<'s> {
    tokens: Vec<Token>,
    position: usize,
    source: &'s str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    /// Consume the next token if it is one of `ops`.
    fn eat(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.position += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn expect(&mut self, op: &'static str) -> Result<(), Report> {
        match self.eat(&[op]) {
            Some(_) => Ok(()),
            None => Err(eyre!("Expected {op:?} in formula: {}", self.source)),
        }
    }

    fn conditional(&mut self) -> Result<Expr, Report> {
        let condition = self.binary(0)?;
        if self.eat(&["?"]).is_none() {
            return Ok(condition);
        }
        let then = self.conditional()?;
        self.expect(":")?;
        let otherwise = self.conditional()?;
        Ok(Expr::Conditional(Box::new(condition), Box::new(then), Box::new(otherwise)))
    }

    fn binary(&mut self, level: usize) -> Result<Expr, Report> {
        let Some(ops) = LEVELS.get(level) else { return self.unary() };
        let mut left = self.binary(level + 1)?;
        while let Some(op) = self.eat(ops) {
            let right = self.binary(level + 1)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, Report> {
        match self.eat(&["-", "!", "+"]) {
            Some("+") => self.unary(),
            Some(op) => Ok(Expr::Unary(op, Box::new(self.unary()?))),
            None => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, Report> {
        let base = self.primary()?;
        match self.eat(&["^", "**"]) {
            Some(_) => Ok(Expr::Binary("^", Box::new(base), Box::new(self.unary()?))),
            None => Ok(base),
        }
    }

    fn primary(&mut self) -> Result<Expr, Report> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Text(text)) => Ok(Expr::Text(text)),
            Some(Token::Op("(")) => {
                let expr = self.conditional()?;
                self.expect(")")?;
                Ok(expr)
            }
            Some(Token::Ident(name)) => {
                if self.eat(&["("]).is_none() {
                    return Ok(Expr::Variable(name));
                }
                let name = name.strip_prefix("Math.").unwrap_or(&name).to_lowercase();
                let mut args = Vec::new();
                if self.eat(&[")"]).is_none() {
                    loop {
                        args.push(self.conditional()?);
                        if self.eat(&[")"]).is_some() {
                            break;
                        }
                        self.expect(",")?;
                    }
                }
                if !known_function(&name, args.len()) {
                    return Err(eyre!("Unknown function {name} with {} argument(s) in formula: {}", args.len(), self.source));
                }
                Ok(Expr::Call(name, args))
            }
            Some(token) => Err(eyre!("Unexpected {token:?} in formula: {}", self.source)),
            None => Err(eyre!("Unexpected end of formula: {}", self.source)),
        }
    }
}

// ----------------------------------------------------------------------------
// Evaluation
// ----------------------------------------------------------------------------

fn evaluate(expr: &Expr, variables: &BTreeMap<String, Term>) -> Result<Term, Report> {
    match expr {
        Expr::Number(n) => Ok(Term::Number(*n)),
        Expr::Text(text) => Ok(Term::Text(text.clone())),
        Expr::Variable(name) => variables.get(name).cloned().ok_or_else(|| eyre!("Unknown variable: {name}")),
        Expr::Unary(op, operand) => {
            let value = evaluate(operand, variables)?;
            match *op {
                "!" => Ok(Term::Number(flag(!value.truthy()))),
                _ => Ok(Term::Number(-value.as_number()?)),
            }
        }
        Expr::Conditional(condition, then, otherwise) => match evaluate(condition, variables)?.truthy() {
            true => evaluate(then, variables),
            false => evaluate(otherwise, variables),
        },
        Expr::Binary("&&", left, right) => {
            let value = evaluate(left, variables)?.truthy() && evaluate(right, variables)?.truthy();
            Ok(Term::Number(flag(value)))
        }
        Expr::Binary("||", left, right) => {
            let value = evaluate(left, variables)?.truthy() || evaluate(right, variables)?.truthy();
            Ok(Term::Number(flag(value)))
        }
        Expr::Binary(op, left, right) => {
            let (left, right) = (evaluate(left, variables)?, evaluate(right, variables)?);
            match *op {
                "==" => return Ok(Term::Number(flag(left.equals(&right)))),
                "!=" => return Ok(Term::Number(flag(!left.equals(&right)))),
                _ => {}
            }
            let (a, b) = (left.as_number()?, right.as_number()?);
            let value = match *op {
                "<" => flag(a < b),
                "<=" => flag(a <= b),
                ">" => flag(a > b),
                ">=" => flag(a >= b),
                "+" => a + b,
                "-" => a - b,
                "*" => a * b,
                "/" => a / b,
                "%" => a % b,
                "^" => a.powf(b),
                other => return Err(eyre!("Unknown operator: {other}")),
            };
            Ok(Term::Number(value))
        }
        Expr::Call(name, args) => {
            let args = args.iter().map(|arg| evaluate(arg, variables)).collect::<Result<Vec<_>, Report>>()?;
            call(name, &args)
        }
    }
}

fn call(name: &str, args: &[Term]) -> Result<Term, Report> {
    if let ("contains", [haystack, needle]) = (name, args) {
        let needle = match needle {
            Term::Text(text) => text.clone(),
            other => other.to_string(),
        };
        let found = match haystack {
            Term::List(items) => items.contains(&needle),
            Term::Text(text) => text.contains(needle.as_str()),
            Term::Number(_) => false,
        };
        return Ok(Term::Number(flag(found)));
    }

    let numbers = args.iter().map(Term::as_number).collect::<Result<Vec<f64>, Report>>()?;
    let value = match (name, numbers.as_slice()) {
        ("exp", [x]) => x.exp(),
        ("ln" | "log", [x]) => x.ln(),
        ("log10", [x]) => x.log10(),
        ("sqrt", [x]) => x.sqrt(),
        ("abs", [x]) => x.abs(),
        ("round", [x]) => x.round(),
        ("floor", [x]) => x.floor(),
        ("ceil", [x]) => x.ceil(),
        ("pow", [x, y]) => x.powf(*y),
        ("min", [first, rest @ ..]) => rest.iter().fold(*first, |a, b| a.min(*b)),
        ("max", [first, rest @ ..]) => rest.iter().fold(*first, |a, b| a.max(*b)),
        _ => return Err(eyre!("Unknown function {name} with {} argument(s)", args.len())),
    };
    Ok(Term::Number(value))
}

// ----------------------------------------------------------------------------
// Formula
// ----------------------------------------------------------------------------

/// A parsed formula.
#[derive(Clone, Debug, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    /// Evaluate the formula, which must produce a finite number.
    pub fn evaluate(&self, variables: &BTreeMap<String, Term>) -> Result<f64, Report> {
        let value = evaluate(&self.expr, variables)
            .and_then(|term| term.as_number())
            .wrap_err_with(|| format!("Failed to evaluate formula: {}", self.source))?;
        if !value.is_finite() {
            return Err(eyre!("Formula did not produce a finite number: {}", self.source));
        }
        Ok(value)
    }
}

impl FromStr for Formula {
    type Err = Report;

    fn from_str(source: &str) -> Result<Self, Report> {
        let mut parser = Parser { tokens: tokenize(source)?, position: 0, source };
        let expr = parser.conditional()?;
        if let Some(token) = parser.peek() {
            return Err(eyre!("Unexpected {token:?} in formula: {source}"));
        }
        Ok(Formula { source: source.to_string(), expr })
    }
}

impl Display for Formula {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}
