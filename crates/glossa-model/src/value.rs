use std::fmt;

use serde::{Deserialize, Serialize};

use crate::conversion::ConversionError;

/// Evaluation-time error.
///
/// Unlike parse errors (which are surfaced synchronously and never enter a
/// cell), these are ordinary values: they flow through operators, get cached,
/// and are delivered to completion callbacks like any other result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A structurally valid call to a function name absent from the registry.
    UnknownFunction(String),
    /// An operand could not be coerced to the type an operator requires.
    Type,
    /// Division by zero.
    Div0,
    /// A function was called with the wrong number of arguments.
    Arity { name: String, got: usize },
    /// The external conversion service reported a failure for this input.
    ///
    /// The structured payload is preserved; it must never be flattened into a
    /// successful text value.
    Conversion(ConversionError),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UnknownFunction(name) => write!(f, "ERROR: unknown function \"{name}\""),
            ErrorKind::Type => f.write_str("ERROR: type mismatch"),
            ErrorKind::Div0 => f.write_str("ERROR: division by zero"),
            ErrorKind::Arity { name, got } => {
                write!(f, "ERROR: wrong number of arguments to \"{name}\" (got {got})")
            }
            ErrorKind::Conversion(err) => write!(f, "ERROR: conversion failed: {err}"),
        }
    }
}

/// The result of evaluating a formula expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    Error(ErrorKind),
}

impl Value {
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Numeric coercion used by arithmetic operators.
    ///
    /// Booleans coerce to 0/1 and numeric text parses; anything else is a
    /// type error.
    pub fn coerce_to_number(&self) -> Result<f64, ErrorKind> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse::<f64>().map_err(|_| ErrorKind::Type),
            Value::Error(e) => Err(e.clone()),
        }
    }

    /// Text coercion used by function arguments that expect words or program
    /// names.
    pub fn coerce_to_text(&self) -> Result<String, ErrorKind> {
        match self {
            Value::Text(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Error(e) => Err(e.clone()),
        }
    }

    /// Boolean coercion used by comparisons and `if`.
    pub fn coerce_to_bool(&self) -> Result<bool, ErrorKind> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Text(_) => Err(ErrorKind::Type),
            Value::Error(e) => Err(e.clone()),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Error(e) => write!(f, "{e}"),
        }
    }
}
