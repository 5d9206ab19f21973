use serde::{Deserialize, Serialize};

use glossa_model::{ErrorKind, Value};

use crate::functions::{lookup_function, FunctionContext, Immediacy};

/// Byte range into the formula body a parse diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn add_offset(self, delta: usize) -> Self {
        Self {
            start: self.start.saturating_add(delta),
            end: self.end.saturating_add(delta),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (at {}..{})",
            self.message, self.span.start, self.span.end
        )
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    #[must_use]
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// Shift the span right, e.g. to account for a stripped `=` sigil.
    #[must_use]
    pub fn add_offset(self, delta: usize) -> Self {
        Self {
            message: self.message,
            span: self.span.add_offset(delta),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// One parsed formula expression.
///
/// A strict ownership tree: every composite node exclusively owns its operand
/// subtrees. The readiness protocol below is a pure function of the subtree
/// plus the conversion cache reachable through the [`FunctionContext`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Number(f64),
    Text(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Whether this subtree can always be evaluated locally, independent of
    /// any cached conversion state. Constant for a given tree.
    ///
    /// Calls to names absent from the registry count as immediate: they fail
    /// at evaluation time with an unknown-function error rather than blocking
    /// forever on a resolution that can never happen.
    pub fn immediate_available(&self) -> bool {
        match self {
            Expr::Number(_) | Expr::Text(_) => true,
            Expr::Unary { operand, .. } => operand.immediate_available(),
            Expr::Binary { left, right, .. } | Expr::Compare { left, right, .. } => {
                left.immediate_available() && right.immediate_available()
            }
            Expr::Call { name, args } => {
                args.iter().all(Expr::immediate_available)
                    && match lookup_function(name) {
                        Some(spec) => spec.immediacy == Immediacy::Immediate,
                        None => true,
                    }
            }
        }
    }

    /// Whether this subtree can be evaluated right now.
    ///
    /// For calls this requires every argument to be available first; only
    /// then is the registry's own predicate consulted, keyed by the evaluated
    /// argument values (e.g. a conversion-cache lookup).
    pub fn available(&self, ctx: &dyn FunctionContext) -> bool {
        match self {
            Expr::Number(_) | Expr::Text(_) => true,
            Expr::Unary { operand, .. } => operand.available(ctx),
            Expr::Binary { left, right, .. } | Expr::Compare { left, right, .. } => {
                left.available(ctx) && right.available(ctx)
            }
            Expr::Call { name, args } => {
                if !args.iter().all(|arg| arg.available(ctx)) {
                    return false;
                }
                match lookup_function(name) {
                    Some(spec) => {
                        let values: Vec<Value> =
                            args.iter().map(|arg| arg.evaluate(ctx)).collect();
                        (spec.available)(ctx, &values)
                    }
                    None => true,
                }
            }
        }
    }

    /// Best-effort push toward availability.
    ///
    /// Recurses into operands first; a call only invokes its registry
    /// resolver once all of its arguments are already available (a function
    /// cannot resolve itself while its inputs are still pending). Idempotent:
    /// repeated calls while a request is outstanding issue nothing new.
    pub fn make_available(&self, ctx: &mut dyn FunctionContext) {
        match self {
            Expr::Number(_) | Expr::Text(_) => {}
            Expr::Unary { operand, .. } => operand.make_available(ctx),
            Expr::Binary { left, right, .. } | Expr::Compare { left, right, .. } => {
                left.make_available(ctx);
                right.make_available(ctx);
            }
            Expr::Call { name, args } => {
                for arg in args {
                    arg.make_available(ctx);
                }
                if !args.iter().all(|arg| arg.available(&*ctx)) {
                    return;
                }
                if let Some(spec) = lookup_function(name) {
                    let values: Vec<Value> =
                        args.iter().map(|arg| arg.evaluate(&*ctx)).collect();
                    (spec.make_available)(ctx, &values);
                }
            }
        }
    }

    /// Compute the value. Only meaningful when [`Expr::available`] holds.
    pub fn evaluate(&self, ctx: &dyn FunctionContext) -> Value {
        match self {
            Expr::Number(n) => Value::Number(*n),
            Expr::Text(s) => Value::Text(s.clone()),
            Expr::Unary { op, operand } => eval_unary(*op, operand.evaluate(ctx)),
            Expr::Binary { op, left, right } => {
                eval_binary(*op, left.evaluate(ctx), right.evaluate(ctx))
            }
            Expr::Compare { op, left, right } => {
                eval_compare(*op, left.evaluate(ctx), right.evaluate(ctx))
            }
            Expr::Call { name, args } => {
                let Some(spec) = lookup_function(name) else {
                    return Value::Error(ErrorKind::UnknownFunction(name.clone()));
                };
                if args.len() < spec.min_args || args.len() > spec.max_args {
                    return Value::Error(ErrorKind::Arity {
                        name: name.clone(),
                        got: args.len(),
                    });
                }
                let values: Vec<Value> = args.iter().map(|arg| arg.evaluate(ctx)).collect();
                (spec.evaluate)(ctx, &values)
            }
        }
    }
}

fn eval_unary(op: UnaryOp, operand: Value) -> Value {
    match op {
        UnaryOp::Negate => match operand.coerce_to_number() {
            Ok(n) => Value::Number(-n),
            Err(e) => Value::Error(e),
        },
        UnaryOp::Not => match operand.coerce_to_bool() {
            Ok(b) => Value::Bool(!b),
            Err(e) => Value::Error(e),
        },
    }
}

fn eval_binary(op: BinaryOp, left: Value, right: Value) -> Value {
    let ln = match left.coerce_to_number() {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let rn = match right.coerce_to_number() {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    match op {
        BinaryOp::Add => Value::Number(ln + rn),
        BinaryOp::Sub => Value::Number(ln - rn),
        BinaryOp::Mul => Value::Number(ln * rn),
        BinaryOp::Div => {
            if rn == 0.0 {
                Value::Error(ErrorKind::Div0)
            } else {
                Value::Number(ln / rn)
            }
        }
    }
}

fn eval_compare(op: CompareOp, left: Value, right: Value) -> Value {
    use std::cmp::Ordering;

    if let Value::Error(e) = &left {
        return Value::Error(e.clone());
    }
    if let Value::Error(e) = &right {
        return Value::Error(e.clone());
    }

    let ord = match (&left, &right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        // Word comparisons are case- and diacritic-sensitive: two phonemic
        // transcriptions are equal only byte-for-byte.
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        // Mixed types order by type precedence: numbers < text < booleans.
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        (Value::Text(_), _) => Ordering::Less,
        (_, Value::Text(_)) => Ordering::Greater,
        // Errors are handled above.
        (Value::Error(_), _) | (_, Value::Error(_)) => Ordering::Equal,
    };

    let result = match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Ge => ord != Ordering::Less,
    };
    Value::Bool(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::testing::NullContext;

    #[test]
    fn literals_are_immediately_available() {
        let ctx = NullContext::default();
        let expr = Expr::Number(4.0);
        assert!(expr.immediate_available());
        assert!(expr.available(&ctx));
        assert_eq!(expr.evaluate(&ctx), Value::Number(4.0));
    }

    #[test]
    fn division_by_zero_is_an_error_value() {
        let ctx = NullContext::default();
        let expr = Expr::Binary {
            op: BinaryOp::Div,
            left: Box::new(Expr::Number(1.0)),
            right: Box::new(Expr::Number(0.0)),
        };
        assert_eq!(expr.evaluate(&ctx), Value::Error(ErrorKind::Div0));
    }

    #[test]
    fn unknown_function_calls_evaluate_to_a_lazy_error() {
        let ctx = NullContext::default();
        let expr = Expr::Call {
            name: "frobnicate".into(),
            args: vec![Expr::Number(1.0)],
        };
        // Structurally valid but unregistered: available so evaluation can
        // surface the error instead of queueing forever.
        assert!(expr.immediate_available());
        assert!(expr.available(&ctx));
        assert_eq!(
            expr.evaluate(&ctx),
            Value::Error(ErrorKind::UnknownFunction("frobnicate".into()))
        );
    }

    #[test]
    fn parse_errors_serialize_for_editor_diagnostics() {
        let err = ParseError::new("hanging binary operator", Span::new(3, 4));
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(
            json,
            r#"{"message":"hanging binary operator","span":{"start":3,"end":4}}"#
        );
    }

    #[test]
    fn mixed_type_comparison_uses_type_precedence() {
        let ctx = NullContext::default();
        let expr = Expr::Compare {
            op: CompareOp::Lt,
            left: Box::new(Expr::Number(99.0)),
            right: Box::new(Expr::Text("a".into())),
        };
        assert_eq!(expr.evaluate(&ctx), Value::Bool(true));
    }
}
