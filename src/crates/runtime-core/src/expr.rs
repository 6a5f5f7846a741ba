//! The CONDITIONAL edge expression language: a small, audited AST
//! evaluator over `SharedMemory`. No function calls, no side effects, no
//! code execution from config — this is a recursive-descent parser over a
//! deliberately tiny grammar, not an embedded scripting language.
//!
//! ```text
//! expr    := or
//! or      := and ("OR" and)*
//! and     := unary ("AND" unary)*
//! unary   := "NOT" unary | atom
//! atom    := "(" expr ")" | comparison | literal
//! comparison := operand ("==" | "!=" | ">" | ">=" | "<" | "<=") operand
//! operand := key | literal
//! literal := STRING | NUMBER | "true" | "false" | "null" | "None"
//! ```
//!
//! Parse errors are fatal at graph load time. Evaluation-time errors (a
//! comparison against a memory key that is absent) are not propagated —
//! they make that comparison evaluate to `false`, per the external
//! interface contract.

use serde_json::Value;

use crate::model::SharedMemory;

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionExpr {
    And(Box<ConditionExpr>, Box<ConditionExpr>),
    Or(Box<ConditionExpr>, Box<ConditionExpr>),
    Not(Box<ConditionExpr>),
    Compare(Operand, CompareOp, Operand),
    Literal(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Key(String),
    Literal(Value),
}

impl ConditionExpr {
    pub fn parse(input: &str) -> Result<Self, String> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(format!("unexpected trailing tokens near '{}'", input));
        }
        Ok(expr)
    }

    /// Evaluates this expression against `memory`. Never errors: a missing
    /// key makes the containing comparison `false`.
    pub fn eval(&self, memory: &SharedMemory) -> bool {
        match self {
            ConditionExpr::And(a, b) => a.eval(memory) && b.eval(memory),
            ConditionExpr::Or(a, b) => a.eval(memory) || b.eval(memory),
            ConditionExpr::Not(a) => !a.eval(memory),
            ConditionExpr::Literal(b) => *b,
            ConditionExpr::Compare(lhs, op, rhs) => {
                let (Some(l), Some(r)) = (resolve(lhs, memory), resolve(rhs, memory)) else {
                    return false;
                };
                compare(&l, *op, &r)
            }
        }
    }
}

fn resolve(operand: &Operand, memory: &SharedMemory) -> Option<Value> {
    match operand {
        Operand::Key(k) => memory.get(k).cloned(),
        Operand::Literal(v) => Some(v.clone()),
    }
}

fn compare(l: &Value, op: CompareOp, r: &Value) -> bool {
    match op {
        CompareOp::Eq => l == r,
        CompareOp::Ne => l != r,
        CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le => {
            let (Some(lf), Some(rf)) = (l.as_f64(), r.as_f64()) else {
                return false;
            };
            match op {
                CompareOp::Gt => lf > rf,
                CompareOp::Ge => lf >= rf,
                CompareOp::Lt => lf < rf,
                CompareOp::Le => lf <= rf,
                _ => unreachable!(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    String(String),
    Number(f64),
    Op(&'static str),
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                let mut closed = false;
                while i < chars.len() {
                    if chars[i] == quote {
                        closed = true;
                        i += 1;
                        break;
                    }
                    s.push(chars[i]);
                    i += 1;
                }
                if !closed {
                    return Err("unterminated string literal".to_string());
                }
                tokens.push(Token::String(s));
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op("=="));
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op("!="));
                i += 2;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(">="));
                i += 2;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op("<="));
                i += 2;
            }
            '>' => {
                tokens.push(Token::Op(">"));
                i += 1;
            }
            '<' => {
                tokens.push(Token::Op("<"));
                i += 1;
            }
            _ if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let s: String = chars[start..i].iter().collect();
                let n = s.parse::<f64>().map_err(|_| format!("invalid number '{}'", s))?;
                tokens.push(Token::Number(n));
            }
            _ if c.is_alphabetic() || c == '_' || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn parse_or(&mut self) -> Result<ConditionExpr, String> {
        let mut lhs = self.parse_and()?;
        while let Some(Token::Ident(kw)) = self.peek() {
            if kw.eq_ignore_ascii_case("or") {
                self.advance();
                let rhs = self.parse_and()?;
                lhs = ConditionExpr::Or(Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<ConditionExpr, String> {
        let mut lhs = self.parse_unary()?;
        while let Some(Token::Ident(kw)) = self.peek() {
            if kw.eq_ignore_ascii_case("and") {
                self.advance();
                let rhs = self.parse_unary()?;
                lhs = ConditionExpr::And(Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<ConditionExpr, String> {
        if let Some(Token::Ident(kw)) = self.peek() {
            if kw.eq_ignore_ascii_case("not") {
                self.advance();
                let inner = self.parse_unary()?;
                return Ok(ConditionExpr::Not(Box::new(inner)));
            }
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<ConditionExpr, String> {
        if let Some(Token::LParen) = self.peek() {
            self.advance();
            let inner = self.parse_or()?;
            match self.advance() {
                Some(Token::RParen) => Ok(inner),
                _ => Err("expected closing ')'".to_string()),
            }
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> Result<ConditionExpr, String> {
        let lhs = self.parse_operand()?;
        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.advance();
            let rhs = self.parse_operand()?;
            let op = match op {
                "==" => CompareOp::Eq,
                "!=" => CompareOp::Ne,
                ">" => CompareOp::Gt,
                ">=" => CompareOp::Ge,
                "<" => CompareOp::Lt,
                "<=" => CompareOp::Le,
                _ => unreachable!(),
            };
            return Ok(ConditionExpr::Compare(lhs, op, rhs));
        }
        // A bare operand with no comparison operator is only valid as a
        // boolean literal; bare keys (truthy-key shorthand) are not part
        // of this grammar.
        match lhs {
            Operand::Literal(Value::Bool(b)) => Ok(ConditionExpr::Literal(b)),
            _ => Err("expected comparison operator".to_string()),
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, String> {
        match self.advance() {
            Some(Token::String(s)) => Ok(Operand::Literal(Value::String(s))),
            Some(Token::Number(n)) => Ok(Operand::Literal(
                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            )),
            Some(Token::Ident(ident)) => match ident.to_ascii_lowercase().as_str() {
                "true" => Ok(Operand::Literal(Value::Bool(true))),
                "false" => Ok(Operand::Literal(Value::Bool(false))),
                "null" | "none" => Ok(Operand::Literal(Value::Null)),
                _ => Ok(Operand::Key(ident)),
            },
            other => Err(format!("expected operand, found {:?}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem(pairs: &[(&str, Value)]) -> SharedMemory {
        let mut m = SharedMemory::default();
        for (k, v) in pairs {
            m.insert(*k, v.clone());
        }
        m
    }

    #[test]
    fn equality_against_string_literal() {
        let expr = ConditionExpr::parse("status == \"ready\"").unwrap();
        assert!(expr.eval(&mem(&[("status", Value::from("ready"))])));
        assert!(!expr.eval(&mem(&[("status", Value::from("pending"))])));
    }

    #[test]
    fn missing_key_evaluates_to_false_not_error() {
        let expr = ConditionExpr::parse("missing == \"x\"").unwrap();
        assert!(!expr.eval(&mem(&[])));
    }

    #[test]
    fn boolean_combination_with_not_and_parens() {
        let expr = ConditionExpr::parse("NOT (a == 1) AND b == true").unwrap();
        assert!(expr.eval(&mem(&[("a", Value::from(2)), ("b", Value::from(true))])));
        assert!(!expr.eval(&mem(&[("a", Value::from(1)), ("b", Value::from(true))])));
    }

    #[test]
    fn numeric_ordering() {
        let expr = ConditionExpr::parse("score >= 0.8").unwrap();
        assert!(expr.eval(&mem(&[("score", Value::from(0.9))])));
        assert!(!expr.eval(&mem(&[("score", Value::from(0.1))])));
    }

    #[test]
    fn null_literal_comparison() {
        let expr = ConditionExpr::parse("result == null").unwrap();
        assert!(expr.eval(&mem(&[("result", Value::Null)])));
    }

    #[test]
    fn parse_error_on_malformed_expression() {
        assert!(ConditionExpr::parse("a ==").is_err());
        assert!(ConditionExpr::parse("(a == 1").is_err());
    }
}
