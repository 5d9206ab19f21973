use std::collections::HashMap;
use std::sync::OnceLock;

use glossa_model::{ConversionOutcome, Value};

mod builtins_convert;
mod builtins_core;

/// The state a function behavior bundle may consult or push on.
///
/// This is the seam between the expression layer and the engine's shared
/// conversion state: the append-only result cache on the read side, and the
/// batching/correlation machinery on the write side.
pub trait FunctionContext {
    /// Cached conversion result for `(program, word)`, if one has landed.
    fn cached_conversion(&self, program: &str, word: &str) -> Option<&ConversionOutcome>;

    /// Queue a conversion request for `(program, word)`.
    ///
    /// Must be idempotent while a request for the same pair is outstanding:
    /// calling this twice before the response arrives issues exactly one
    /// request.
    fn request_conversion(&mut self, program: &str, word: &str);
}

/// Whether a function's value is always computable locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Immediacy {
    /// Pure over its arguments; never consults external state.
    Immediate,
    /// May require an external round-trip before it can evaluate.
    Deferred,
}

pub type AvailableFn = fn(&dyn FunctionContext, &[Value]) -> bool;
pub type MakeAvailableFn = fn(&mut dyn FunctionContext, &[Value]);
pub type EvaluateFn = fn(&dyn FunctionContext, &[Value]) -> Value;

/// One registered function: a fixed-shape record of predicates plus the
/// side-effecting resolver. Built-ins are registered at startup via
/// [`inventory::submit!`]; the registry is never mutated at runtime.
pub struct FunctionSpec {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub immediacy: Immediacy,
    /// True iff the call can evaluate right now, given already-evaluated
    /// argument values. Only meaningful once every argument is available.
    pub available: AvailableFn,
    /// Attempt to move the call toward availability (e.g. issue a conversion
    /// request). Invoked only when every argument is already available.
    pub make_available: MakeAvailableFn,
    pub evaluate: EvaluateFn,
}

inventory::collect!(FunctionSpec);

/// Iterate all registered [`FunctionSpec`]s, mainly for coverage tests.
pub fn iter_function_specs() -> impl Iterator<Item = &'static FunctionSpec> {
    inventory::iter::<FunctionSpec>.into_iter()
}

fn registry() -> &'static HashMap<&'static str, &'static FunctionSpec> {
    static REGISTRY: OnceLock<HashMap<&'static str, &'static FunctionSpec>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        for spec in inventory::iter::<FunctionSpec> {
            map.insert(spec.name, spec);
        }
        map
    })
}

/// Function names match exactly; there is no case folding.
pub fn lookup_function(name: &str) -> Option<&'static FunctionSpec> {
    registry().get(name).copied()
}

/// `available` for functions that always are.
pub(crate) fn always_available(_ctx: &dyn FunctionContext, _args: &[Value]) -> bool {
    true
}

/// `make_available` for functions with nothing to resolve.
pub(crate) fn no_resolution_needed(_ctx: &mut dyn FunctionContext, _args: &[Value]) {}

/// Test support: a [`FunctionContext`] with an empty cache that records
/// requested pairs.
pub mod testing {
    use super::FunctionContext;
    use glossa_model::ConversionOutcome;

    #[derive(Debug, Default)]
    pub struct NullContext {
        pub requested: Vec<(String, String)>,
    }

    impl FunctionContext for NullContext {
        fn cached_conversion(&self, _program: &str, _word: &str) -> Option<&ConversionOutcome> {
            None
        }

        fn request_conversion(&mut self, program: &str, word: &str) {
            self.requested.push((program.to_string(), word.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_the_builtins() {
        for name in ["run", "if", "concat"] {
            assert!(lookup_function(name).is_some(), "missing builtin {name}");
        }
        assert!(lookup_function("RUN").is_none(), "names are case-sensitive");
    }

    #[test]
    fn every_spec_has_a_coherent_arity_range() {
        for spec in iter_function_specs() {
            assert!(spec.min_args <= spec.max_args, "bad arity for {}", spec.name);
        }
    }

    #[test]
    fn only_run_defers() {
        for spec in iter_function_specs() {
            let expected = if spec.name == "run" {
                Immediacy::Deferred
            } else {
                Immediacy::Immediate
            };
            assert_eq!(spec.immediacy, expected, "immediacy of {}", spec.name);
        }
    }
}
