//! Immediate built-ins with no external dependency.

use glossa_model::{ErrorKind, Value};

use super::{always_available, no_resolution_needed, FunctionContext, FunctionSpec, Immediacy};

/// `if(cond, then, else)`.
///
/// All three arguments pass through the availability protocol before the
/// call becomes available, so there is no short-circuiting of the unselected
/// branch.
fn if_evaluate(_ctx: &dyn FunctionContext, args: &[Value]) -> Value {
    let [cond, then, otherwise] = args else {
        return Value::Error(ErrorKind::Arity {
            name: "if".into(),
            got: args.len(),
        });
    };
    match cond.coerce_to_bool() {
        Ok(true) => then.clone(),
        Ok(false) => otherwise.clone(),
        Err(e) => Value::Error(e),
    }
}

inventory::submit! {
    FunctionSpec {
        name: "if",
        min_args: 3,
        max_args: 3,
        immediacy: Immediacy::Immediate,
        available: always_available,
        make_available: no_resolution_needed,
        evaluate: if_evaluate,
    }
}

/// `concat(args...)`: text concatenation of every argument.
fn concat_evaluate(_ctx: &dyn FunctionContext, args: &[Value]) -> Value {
    let mut out = String::new();
    for arg in args {
        match arg.coerce_to_text() {
            Ok(s) => out.push_str(&s),
            Err(e) => return Value::Error(e),
        }
    }
    Value::Text(out)
}

inventory::submit! {
    FunctionSpec {
        name: "concat",
        min_args: 1,
        max_args: usize::MAX,
        immediacy: Immediacy::Immediate,
        available: always_available,
        make_available: no_resolution_needed,
        evaluate: concat_evaluate,
    }
}
