//! The `run` builtin: apply a named sound-change program to a word via the
//! external conversion service.

use glossa_model::{ConversionError, ErrorKind, Value};

use super::{FunctionContext, FunctionSpec, Immediacy};

/// Extract `(program, word)` from the evaluated arguments.
fn run_args(args: &[Value]) -> Result<(String, String), ErrorKind> {
    match args {
        [program, word] => Ok((program.coerce_to_text()?, word.coerce_to_text()?)),
        _ => Err(ErrorKind::Arity {
            name: "run".into(),
            got: args.len(),
        }),
    }
}

/// Available once the cache holds an entry for the pair. Argument problems
/// (wrong arity, error values) count as available so evaluation surfaces the
/// error instead of blocking.
fn run_available(ctx: &dyn FunctionContext, args: &[Value]) -> bool {
    match run_args(args) {
        Ok((program, word)) => ctx.cached_conversion(&program, &word).is_some(),
        Err(_) => true,
    }
}

fn run_make_available(ctx: &mut dyn FunctionContext, args: &[Value]) {
    if let Ok((program, word)) = run_args(args) {
        if ctx.cached_conversion(&program, &word).is_none() {
            ctx.request_conversion(&program, &word);
        }
    }
}

fn run_evaluate(ctx: &dyn FunctionContext, args: &[Value]) -> Value {
    let (program, word) = match run_args(args) {
        Ok(pair) => pair,
        Err(e) => return Value::Error(e),
    };
    match ctx.cached_conversion(&program, &word) {
        Some(Ok(converted)) => Value::Text(converted.clone()),
        Some(Err(e)) => Value::Error(ErrorKind::Conversion(e.clone())),
        // Evaluation is only valid once available; report rather than panic.
        None => Value::Error(ErrorKind::Conversion(ConversionError::Internal(
            format!("no conversion result for \"{word}\" under \"{program}\""),
        ))),
    }
}

inventory::submit! {
    FunctionSpec {
        name: "run",
        min_args: 2,
        max_args: 2,
        immediacy: Immediacy::Deferred,
        available: run_available,
        make_available: run_make_available,
        evaluate: run_evaluate,
    }
}
