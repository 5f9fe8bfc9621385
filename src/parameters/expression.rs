//! Expression parsing and evaluation for formula-backed parameters
//!
//! This module provides the arithmetic expression language used by formulas:
//! numbers, identifiers resolved through an [`EvaluationContext`], the binary
//! operators `+ - * / ^`, unary minus, parentheses, and a small set of
//! mathematical functions. `+ - * /` associate to the left, `^` to the right.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::recognize,
    multi::many0,
    number::complete::double,
    sequence::pair,
    IResult, Parser,
};
use thiserror::Error;

/// Error that can occur during expression parsing or evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Failed to parse expression: {message}")]
    ParseError { message: String },

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("{name}() expects {expected} argument(s), got {got}")]
    WrongArgumentCount {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Undefined function: {name}")]
    UndefinedFunction { name: String },
}

/// Result type for expression evaluation
pub type ExprResult<T> = Result<T, ExpressionError>;

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant number
    Number(f64),

    /// Variable reference
    Variable(String),

    /// Unary operation
    Unary(UnaryOp, Box<Expression>),

    /// Binary operation
    Binary(BinaryOp, Box<Expression>, Box<Expression>),

    /// Function call
    Function(String, Vec<Expression>),
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
}

/// Binary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Context for expression evaluation, providing variable values
pub trait EvaluationContext {
    /// Get the value of a variable
    fn get_variable(&self, name: &str) -> ExprResult<f64>;

    /// Check if a variable exists
    fn has_variable(&self, name: &str) -> bool;

    /// Get the names of all variables
    fn variable_names(&self) -> Vec<String>;
}

impl Expression {
    /// Parse an expression from a string.
    ///
    /// The whole input must be consumed; trailing characters are an error.
    pub fn parse(input: &str) -> ExprResult<Self> {
        match expr(input.trim()) {
            Ok((remainder, parsed)) => {
                if remainder.trim().is_empty() {
                    Ok(parsed)
                } else {
                    Err(ExpressionError::ParseError {
                        message: format!("unexpected trailing characters: '{}'", remainder),
                    })
                }
            }
            Err(e) => Err(ExpressionError::ParseError {
                message: format!("{:?}", e),
            }),
        }
    }

    /// Evaluate the expression with the given context
    pub fn evaluate<C: EvaluationContext>(&self, context: &C) -> ExprResult<f64> {
        match self {
            Self::Number(n) => Ok(*n),

            Self::Variable(name) => context.get_variable(name),

            Self::Unary(UnaryOp::Neg, inner) => Ok(-inner.evaluate(context)?),

            Self::Binary(op, left, right) => {
                let lhs = left.evaluate(context)?;
                let rhs = right.evaluate(context)?;

                match op {
                    BinaryOp::Add => Ok(lhs + rhs),
                    BinaryOp::Sub => Ok(lhs - rhs),
                    BinaryOp::Mul => Ok(lhs * rhs),
                    BinaryOp::Div => {
                        if rhs == 0.0 {
                            Err(ExpressionError::DivisionByZero)
                        } else {
                            Ok(lhs / rhs)
                        }
                    }
                    BinaryOp::Pow => Ok(lhs.powf(rhs)),
                }
            }

            Self::Function(name, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.evaluate(context)?);
                }
                apply_function(name, &values)
            }
        }
    }

    /// Find all variable names used in the expression, sorted and deduplicated
    pub fn variables(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars.sort();
        vars.dedup();
        vars
    }

    fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            Self::Number(_) => {}
            Self::Variable(name) => vars.push(name.clone()),
            Self::Unary(_, inner) => inner.collect_variables(vars),
            Self::Binary(_, left, right) => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }
            Self::Function(_, args) => {
                for arg in args {
                    arg.collect_variables(vars);
                }
            }
        }
    }
}

fn apply_function(name: &str, args: &[f64]) -> ExprResult<f64> {
    let unary = |f: fn(f64) -> f64| {
        if args.len() == 1 {
            Ok(f(args[0]))
        } else {
            Err(ExpressionError::WrongArgumentCount {
                name: name.to_string(),
                expected: 1,
                got: args.len(),
            })
        }
    };

    match name {
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "asin" => unary(f64::asin),
        "acos" => unary(f64::acos),
        "atan" => unary(f64::atan),
        "exp" => unary(f64::exp),
        "ln" => unary(f64::ln),
        "log10" => unary(f64::log10),
        "sqrt" => unary(f64::sqrt),
        "abs" => unary(f64::abs),
        "min" | "max" => {
            if args.len() < 2 {
                return Err(ExpressionError::WrongArgumentCount {
                    name: name.to_string(),
                    expected: 2,
                    got: args.len(),
                });
            }
            let folded = if name == "min" {
                args.iter().fold(f64::INFINITY, |a, &b| a.min(b))
            } else {
                args.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b))
            };
            Ok(folded)
        }
        _ => Err(ExpressionError::UndefinedFunction {
            name: name.to_string(),
        }),
    }
}

// Parser functions using nom

/// Parse an identifier (variable or function name)
fn identifier(input: &str) -> IResult<&str, String> {
    let mut parser = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));

    let (input, matched) = parser.parse(input)?;
    Ok((input, matched.to_string()))
}

/// Parse a comma-separated list of expressions (for function arguments)
fn args_list(input: &str) -> IResult<&str, Vec<Expression>> {
    let (mut input, first) = expr(input)?;
    let mut args = vec![first];

    loop {
        let (after_ws, _) = multispace0.parse(input)?;
        let mut comma = char::<&str, nom::error::Error<&str>>(',');
        match comma.parse(after_ws) {
            Ok((after_comma, _)) => {
                let (after_arg, arg) = expr(after_comma)?;
                args.push(arg);
                input = after_arg;
            }
            Err(_) => break,
        }
    }

    Ok((input, args))
}

/// Parse a function call
fn function_call(input: &str) -> IResult<&str, Expression> {
    let (input, name) = identifier(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = char::<&str, nom::error::Error<&str>>('(').parse(input)?;
    let (input, _) = multispace0.parse(input)?;

    // Empty argument list
    let mut close = char::<&str, nom::error::Error<&str>>(')');
    if let Ok((input, _)) = close.parse(input) {
        return Ok((input, Expression::Function(name, vec![])));
    }

    let (input, args) = args_list(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = char::<&str, nom::error::Error<&str>>(')').parse(input)?;

    Ok((input, Expression::Function(name, args)))
}

/// Parse a number
fn number(input: &str) -> IResult<&str, Expression> {
    let (input, num) = double(input)?;
    Ok((input, Expression::Number(num)))
}

/// Parse a variable reference
fn variable(input: &str) -> IResult<&str, Expression> {
    let (input, name) = identifier(input)?;
    Ok((input, Expression::Variable(name)))
}

/// Parse a parenthesized expression
fn parens(input: &str) -> IResult<&str, Expression> {
    let (input, _) = char::<&str, nom::error::Error<&str>>('(').parse(input)?;
    let (input, inner) = expr(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = char::<&str, nom::error::Error<&str>>(')').parse(input)?;
    Ok((input, inner))
}

/// Parse a primary expression: number, function call, variable, or parens.
///
/// Function calls are tried before bare variables so that `sin(x)` does not
/// stop at the identifier.
fn primary(input: &str) -> IResult<&str, Expression> {
    if let Ok(result) = number(input) {
        return Ok(result);
    }
    if let Ok(result) = function_call(input) {
        return Ok(result);
    }
    if let Ok(result) = variable(input) {
        return Ok(result);
    }
    parens(input)
}

/// Parse a unary expression (-expr)
fn unary(input: &str) -> IResult<&str, Expression> {
    let (input, _) = multispace0.parse(input)?;

    let mut neg = char::<&str, nom::error::Error<&str>>('-');
    match neg.parse(input) {
        Ok((after_neg, _)) => {
            let (after_neg, _) = multispace0.parse(after_neg)?;
            let (remaining, inner) = unary(after_neg)?;
            Ok((remaining, Expression::Unary(UnaryOp::Neg, Box::new(inner))))
        }
        Err(_) => primary(input),
    }
}

/// Parse a power expression. `^` is right-associative: `2^3^2` is `2^(3^2)`.
fn power(input: &str) -> IResult<&str, Expression> {
    let (input, base) = unary(input)?;
    let (after_ws, _) = multispace0.parse(input)?;

    let mut caret = char::<&str, nom::error::Error<&str>>('^');
    match caret.parse(after_ws) {
        Ok((after_op, _)) => {
            let (remaining, exponent) = power(after_op)?;
            Ok((
                remaining,
                Expression::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
            ))
        }
        Err(_) => Ok((input, base)),
    }
}

/// Parse a multiplicative chain. Left-associative: `a/b/c` is `(a/b)/c`.
fn term(input: &str) -> IResult<&str, Expression> {
    let (mut input, mut acc) = power(input)?;

    loop {
        let (after_ws, _) = multispace0.parse(input)?;

        let op = if char::<&str, nom::error::Error<&str>>('*')
            .parse(after_ws)
            .is_ok()
        {
            Some(BinaryOp::Mul)
        } else if char::<&str, nom::error::Error<&str>>('/')
            .parse(after_ws)
            .is_ok()
        {
            Some(BinaryOp::Div)
        } else {
            None
        };

        match op {
            Some(op) => {
                let (after_op, _) = char::<&str, nom::error::Error<&str>>(match op {
                    BinaryOp::Mul => '*',
                    _ => '/',
                })
                .parse(after_ws)?;
                let (remaining, rhs) = power(after_op)?;
                acc = Expression::Binary(op, Box::new(acc), Box::new(rhs));
                input = remaining;
            }
            None => return Ok((input, acc)),
        }
    }
}

/// Parse an additive chain. Left-associative: `a-b-c` is `(a-b)-c`.
fn expr(input: &str) -> IResult<&str, Expression> {
    let (input, _) = multispace0.parse(input)?;
    let (mut input, mut acc) = term(input)?;

    loop {
        let (after_ws, _) = multispace0.parse(input)?;

        let op = if char::<&str, nom::error::Error<&str>>('+')
            .parse(after_ws)
            .is_ok()
        {
            Some(BinaryOp::Add)
        } else if char::<&str, nom::error::Error<&str>>('-')
            .parse(after_ws)
            .is_ok()
        {
            Some(BinaryOp::Sub)
        } else {
            None
        };

        match op {
            Some(op) => {
                let (after_op, _) = char::<&str, nom::error::Error<&str>>(match op {
                    BinaryOp::Add => '+',
                    _ => '-',
                })
                .parse(after_ws)?;
                let (remaining, rhs) = term(after_op)?;
                acc = Expression::Binary(op, Box::new(acc), Box::new(rhs));
                input = remaining;
            }
            None => return Ok((input, acc)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Vars(HashMap<String, f64>);

    impl Vars {
        fn new(pairs: &[(&str, f64)]) -> Self {
            Self(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect(),
            )
        }
    }

    impl EvaluationContext for Vars {
        fn get_variable(&self, name: &str) -> ExprResult<f64> {
            self.0
                .get(name)
                .copied()
                .ok_or_else(|| ExpressionError::UndefinedVariable {
                    name: name.to_string(),
                })
        }

        fn has_variable(&self, name: &str) -> bool {
            self.0.contains_key(name)
        }

        fn variable_names(&self) -> Vec<String> {
            self.0.keys().cloned().collect()
        }
    }

    fn eval(code: &str, vars: &[(&str, f64)]) -> ExprResult<f64> {
        Expression::parse(code)?.evaluate(&Vars::new(vars))
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(Expression::parse("42").unwrap(), Expression::Number(42.0));
        assert_eq!(Expression::parse("3.14").unwrap(), Expression::Number(3.14));
        assert_eq!(eval("-2.5", &[]).unwrap(), -2.5);
        assert_eq!(eval("1.5e3", &[]).unwrap(), 1500.0);
    }

    #[test]
    fn test_parse_variable() {
        assert_eq!(
            Expression::parse("var_1").unwrap(),
            Expression::Variable("var_1".to_string())
        );
        assert_eq!(eval("x", &[("x", 2.0)]).unwrap(), 2.0);
    }

    #[test]
    fn test_binary_ops() {
        assert_eq!(eval("1 + 2", &[]).unwrap(), 3.0);
        assert_eq!(eval("3 - 4", &[]).unwrap(), -1.0);
        assert_eq!(eval("5 * 6", &[]).unwrap(), 30.0);
        assert_eq!(eval("7 / 8", &[]).unwrap(), 0.875);
        assert_eq!(eval("2 ^ 3", &[]).unwrap(), 8.0);
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(eval("10 - 3 - 2", &[]).unwrap(), 5.0);
        assert_eq!(eval("16 / 4 / 2", &[]).unwrap(), 2.0);
        assert_eq!(eval("1 - 2 + 3", &[]).unwrap(), 2.0);
    }

    #[test]
    fn test_power_right_associativity() {
        assert_eq!(eval("2 ^ 3 ^ 2", &[]).unwrap(), 512.0);
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("2 + 3 * 4", &[]).unwrap(), 14.0);
        assert_eq!(eval("2 * 3 ^ 2", &[]).unwrap(), 18.0);
        assert_eq!(eval("(2 + 3) * 4", &[]).unwrap(), 20.0);
    }

    #[test]
    fn test_complex_expression() {
        assert_eq!(
            eval("2 * (x + 1) / (4 - y)", &[("x", 2.0), ("y", 3.0)]).unwrap(),
            6.0
        );
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval("sin(0)", &[]).unwrap(), 0.0);
        assert_eq!(eval("sqrt(16)", &[]).unwrap(), 4.0);
        assert_eq!(eval("abs(-3)", &[]).unwrap(), 3.0);
        assert_eq!(eval("max(x, y, 5)", &[("x", 2.0), ("y", 3.0)]).unwrap(), 5.0);
        assert_eq!(eval("min(2, 7)", &[]).unwrap(), 2.0);
        assert!((eval("ln(exp(1))", &[]).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_evaluation_errors() {
        match eval("x", &[]) {
            Err(ExpressionError::UndefinedVariable { name }) => assert_eq!(name, "x"),
            other => panic!("expected UndefinedVariable, got {:?}", other),
        }

        match eval("1 / 0", &[]) {
            Err(ExpressionError::DivisionByZero) => {}
            other => panic!("expected DivisionByZero, got {:?}", other),
        }

        match eval("foo(1)", &[]) {
            Err(ExpressionError::UndefinedFunction { name }) => assert_eq!(name, "foo"),
            other => panic!("expected UndefinedFunction, got {:?}", other),
        }

        match eval("sin(1, 2)", &[]) {
            Err(ExpressionError::WrongArgumentCount { .. }) => {}
            other => panic!("expected WrongArgumentCount, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(Expression::parse("2 +").is_err());
        assert!(Expression::parse("2 + 3 )").is_err());
        assert!(Expression::parse("(2 + 3").is_err());
    }

    #[test]
    fn test_variables_collection() {
        assert_eq!(
            Expression::parse("x + y * z").unwrap().variables(),
            vec!["x".to_string(), "y".to_string(), "z".to_string()]
        );
        assert_eq!(
            Expression::parse("sin(x) + x").unwrap().variables(),
            vec!["x".to_string()]
        );
        assert!(Expression::parse("2 + 3").unwrap().variables().is_empty());
    }
}
