//! Ahead-of-submission constant folding.

use glossa_model::Value;

use crate::ast::Expr;
use crate::functions::FunctionContext;

/// Fold every subtree that can be evaluated without external dependencies
/// into a literal, leaving blocked subtrees intact.
///
/// Applied to an AST just before it is queued, so that each sweep of the job
/// queue re-examines as small a tree as possible.
pub fn precompute(expr: Expr, ctx: &dyn FunctionContext) -> Expr {
    match &expr {
        // Literals cannot be simplified further.
        Expr::Number(_) | Expr::Text(_) => return expr,
        _ => {}
    }

    if expr.immediate_available() {
        return match expr.evaluate(ctx) {
            Value::Number(n) => Expr::Number(n),
            Value::Text(s) => Expr::Text(s),
            // Booleans and error values have no literal node form; the
            // subtree is already evaluable locally, so keep it as is.
            _ => expr,
        };
    }

    match expr {
        Expr::Number(_) | Expr::Text(_) => expr,
        Expr::Unary { op, operand } => Expr::Unary {
            op,
            operand: Box::new(precompute(*operand, ctx)),
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op,
            left: Box::new(precompute(*left, ctx)),
            right: Box::new(precompute(*right, ctx)),
        },
        Expr::Compare { op, left, right } => Expr::Compare {
            op,
            left: Box::new(precompute(*left, ctx)),
            right: Box::new(precompute(*right, ctx)),
        },
        Expr::Call { name, args } => Expr::Call {
            name,
            args: args.into_iter().map(|arg| precompute(arg, ctx)).collect(),
        },
    }
}
