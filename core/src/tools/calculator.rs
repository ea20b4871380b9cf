use crate::tools::extract_string_arg;
use crate::traits::Tool;
use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("Unknown variable: {0}")]
    UnknownName(String),
    #[error("{0}() takes {1}")]
    Arity(&'static str, &'static str),
    #[error("division by zero")]
    DivisionByZero,
    #[error("math domain error")]
    Domain,
    #[error("result is not a finite number")]
    NotFinite,
    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),
}

const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pow,
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Num(n) => n.to_string(),
            Token::Ident(name) => name.clone(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Star => "*".into(),
            Token::Slash => "/".into(),
            Token::Percent => "%".into(),
            Token::Pow => "**".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::Comma => ",".into(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // `e` starts an exponent only when digits follow; otherwise it is the next token.
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| CalcError::InvalidNumber(literal.clone()))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Pow);
                i += 2;
            }
            '+' | '-' | '*' | '/' | '%' | '(' | ')' | ',' => {
                tokens.push(match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    _ => Token::Comma,
                });
                i += 1;
            }
            other => return Err(CalcError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), CalcError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(CalcError::UnexpectedToken(token.describe())),
            None => Err(CalcError::UnexpectedEnd),
        }
    }

    fn expression(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    value /= rhs;
                }
                Some(Token::Percent) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    // Floored modulo: the result takes the sign of the divisor.
                    value -= rhs * (value / rhs).floor();
                }
                _ => return Ok(value),
            }
        }
    }

    // Every recursive path (unary minus, exponents, parentheses, call arguments) passes through
    // here, so this is the only place the nesting depth needs counting.
    fn unary(&mut self) -> Result<f64, CalcError> {
        if self.depth >= MAX_DEPTH {
            return Err(CalcError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    // `**` binds tighter than unary minus on its left and is right-associative.
    fn power(&mut self) -> Result<f64, CalcError> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::Pow) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, CalcError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.arguments()?;
                    call_function(&name, &args)
                } else {
                    constant(&name)
                }
            }
            Some(token) => Err(CalcError::UnexpectedToken(token.describe())),
            None => Err(CalcError::UnexpectedEnd),
        }
    }

    fn arguments(&mut self) -> Result<Vec<f64>, CalcError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                Some(token) => return Err(CalcError::UnexpectedToken(token.describe())),
                None => return Err(CalcError::UnexpectedEnd),
            }
        }
    }
}

fn constant(name: &str) -> Result<f64, CalcError> {
    match name {
        "pi" => Ok(std::f64::consts::PI),
        "e" => Ok(std::f64::consts::E),
        _ => Err(CalcError::UnknownName(name.to_string())),
    }
}

fn one(name: &'static str, args: &[f64]) -> Result<f64, CalcError> {
    match args {
        [x] => Ok(*x),
        _ => Err(CalcError::Arity(name, "exactly one argument")),
    }
}

fn call_function(name: &str, args: &[f64]) -> Result<f64, CalcError> {
    match name {
        "abs" => Ok(one("abs", args)?.abs()),
        "sqrt" => {
            let x = one("sqrt", args)?;
            if x < 0.0 {
                return Err(CalcError::Domain);
            }
            Ok(x.sqrt())
        }
        "sin" => Ok(one("sin", args)?.sin()),
        "cos" => Ok(one("cos", args)?.cos()),
        "tan" => Ok(one("tan", args)?.tan()),
        "exp" => Ok(one("exp", args)?.exp()),
        "log10" => {
            let x = one("log10", args)?;
            if x <= 0.0 {
                return Err(CalcError::Domain);
            }
            Ok(x.log10())
        }
        "log" => match args {
            [x] if *x > 0.0 => Ok(x.ln()),
            [x, base] if *x > 0.0 && *base > 0.0 && *base != 1.0 => Ok(x.ln() / base.ln()),
            [_] | [_, _] => Err(CalcError::Domain),
            _ => Err(CalcError::Arity("log", "one or two arguments")),
        },
        "round" => match args {
            [x] => Ok(round_half_even(*x)),
            [x, digits] => {
                let factor = 10f64.powi(*digits as i32);
                Ok(round_half_even(x * factor) / factor)
            }
            _ => Err(CalcError::Arity("round", "one or two arguments")),
        },
        "max" if !args.is_empty() => Ok(args.iter().copied().fold(f64::MIN, f64::max)),
        "min" if !args.is_empty() => Ok(args.iter().copied().fold(f64::MAX, f64::min)),
        "max" | "min" => Err(CalcError::Arity(
            if name == "max" { "max" } else { "min" },
            "at least one argument",
        )),
        "sum" => Ok(args.iter().sum()),
        _ => Err(CalcError::UnknownName(name.to_string())),
    }
}

fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 && rounded % 2.0 != 0.0 {
        rounded - x.signum()
    } else {
        rounded
    }
}

pub fn evaluate(expression: &str) -> Result<f64, CalcError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(CalcError::UnexpectedEnd);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expression()?;
    if let Some(token) = parser.peek() {
        return Err(CalcError::UnexpectedToken(token.describe()));
    }
    if !value.is_finite() {
        return Err(CalcError::NotFinite);
    }
    Ok(value)
}

fn number_to_json(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

#[derive(Debug, Default)]
pub struct CalculatorTool;

impl CalculatorTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Perform mathematical calculations and evaluations"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "Mathematical expression to evaluate (e.g., '2 + 3 * 4', 'sqrt(16)', 'sin(pi/2)')"
                }
            },
            "required": ["expression"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let expression = extract_string_arg(&args, "expression")?;

        Ok(match evaluate(&expression) {
            Ok(result) => json!({
                "expression": expression,
                "result": number_to_json(result),
                "success": true
            }),
            Err(e) => json!({
                "expression": expression,
                "error": e.to_string(),
                "success": false
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(expression: &str, expected: f64) {
        let value = evaluate(expression).unwrap();
        assert!(
            (value - expected).abs() < 1e-9,
            "{expression} = {value}, expected {expected}"
        );
    }

    #[test]
    fn precedence_and_associativity() {
        approx("2 + 3 * 4", 14.0);
        approx("(2 + 3) * 4", 20.0);
        approx("2 ** 3 ** 2", 512.0);
        approx("-2 ** 2", -4.0);
        approx("2 ** -1", 0.5);
        approx("10 - 4 - 3", 3.0);
        approx("-7 % 3", 2.0);
        approx("1.5e2 + .5", 150.5);
    }

    #[test]
    fn functions_and_constants() {
        approx("sqrt(16)", 4.0);
        approx("sin(pi / 2)", 1.0);
        approx("log(e)", 1.0);
        approx("log(8, 2)", 3.0);
        approx("log10(1000)", 3.0);
        approx("max(1, 7, 3) + min(4, 2)", 9.0);
        approx("sum(1, 2, 3)", 6.0);
        approx("round(2.5) + round(3.14159, 2)", 5.14);
        approx("abs(-3)", 3.0);
    }

    #[test]
    fn reports_errors() {
        assert_eq!(evaluate("1 / 0"), Err(CalcError::DivisionByZero));
        assert_eq!(evaluate("sqrt(-1)"), Err(CalcError::Domain));
        assert_eq!(evaluate("foo + 1"), Err(CalcError::UnknownName("foo".into())));
        assert_eq!(evaluate("2 +"), Err(CalcError::UnexpectedEnd));
        assert_eq!(evaluate("(1 + 2"), Err(CalcError::UnexpectedEnd));
        assert_eq!(evaluate("1 2"), Err(CalcError::UnexpectedToken("2".into())));
        assert_eq!(evaluate("import os"), Err(CalcError::UnknownName("import".into())));
        assert_eq!(evaluate("2 ^ 3"), Err(CalcError::UnexpectedChar('^')));
        assert_eq!(evaluate("10 ** 400"), Err(CalcError::NotFinite));
    }

    #[test]
    fn moderate_nesting_is_fine() {
        approx(&format!("{}1{}", "(".repeat(100), ")".repeat(100)), 1.0);
        approx(&format!("{}5", "-".repeat(100)), 5.0);
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let minus_chain = format!("{}1", "-".repeat(200_000));
        assert_eq!(evaluate(&minus_chain), Err(CalcError::TooDeep(MAX_DEPTH)));

        let parens = format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000));
        assert_eq!(evaluate(&parens), Err(CalcError::TooDeep(MAX_DEPTH)));

        let calls = format!("{}1{}", "abs(".repeat(50_000), ")".repeat(50_000));
        assert_eq!(evaluate(&calls), Err(CalcError::TooDeep(MAX_DEPTH)));
    }

    #[tokio::test]
    async fn tool_reports_result_and_failure() {
        let tool = CalculatorTool::new();

        let ok = tool.execute(json!({"expression": "6 * 7"})).await.unwrap();
        assert_eq!(ok, json!({"expression": "6 * 7", "result": 42, "success": true}));

        let fractional = tool.execute(json!({"expression": "1 / 4"})).await.unwrap();
        assert_eq!(fractional["result"], json!(0.25));

        let failed = tool.execute(json!({"expression": "1 / 0"})).await.unwrap();
        assert_eq!(failed["success"], false);
        assert_eq!(failed["error"], "division by zero");

        let nested = format!("{}1", "-".repeat(200_000));
        let too_deep = tool.execute(json!({ "expression": nested })).await.unwrap();
        assert_eq!(too_deep["success"], false);
        assert_eq!(too_deep["error"], "expression nests deeper than 256 levels");
    }
}
