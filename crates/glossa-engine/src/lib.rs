#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! Formula evaluation engine for the Glossa workbench.
//!
//! Cell text beginning with `=` is parsed into an [`Expr`] tree whose nodes
//! carry a three-state readiness protocol: *immediately available* (always
//! computable locally), *available* (computable right now, given the
//! conversion cache), and *make available* (a best-effort, idempotent push
//! toward availability that may issue external requests).
//!
//! Formulas that depend on the external sound-change service suspend rather
//! than block: [`Engine::submit_formula`] queues a job and returns a pending
//! indicator, request batches coalesce per program name until the periodic
//! [`Engine::flush`], and [`Engine::on_response_batch`] correlates results by
//! id, in whatever order they arrive, then sweeps the queue to complete
//! whichever jobs have become evaluable.

pub mod ast;
pub mod engine;
pub mod functions;
pub mod parser;
pub mod precompute;

pub use ast::{BinaryOp, CompareOp, Expr, ParseError, Span, UnaryOp};
pub use engine::{Engine, EngineError, RequestTransport, Submission, AWAITING_RESULT};
pub use functions::{lookup_function, FunctionContext, FunctionSpec, Immediacy};
pub use glossa_model::{ConversionError, ConversionOutcome, ErrorKind, Value};

/// Parse a formula into an [`Expr`]. The input may optionally start with `=`.
pub fn parse_formula(formula: &str) -> Result<Expr, ParseError> {
    match formula.strip_prefix('=') {
        Some(body) => parser::parse_formula_body(body).map_err(|e| e.add_offset(1)),
        None => parser::parse_formula_body(formula),
    }
}
