//! The [Callable] trait is the invocation contract every function value -- whether a builtin from
//! [crate::environment::StandardFunctionRegistry], a host-registered function, or a user-defined
//! [crate::AExpression::Callback] -- is evaluated through.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::environment::{IEvaluationEnvironment, InterpretationEnvironment};
use crate::value::{Value, ValueInterpreter};
use crate::AExpression;

/// The sentinel a [Callable] returns on failure. The interpreter converts this into a
/// [crate::Error::InvalidFunctionInvocation], resolving `argument` back to a positional index by
/// matching it against the callee's declared [Callable::arg_names] where possible.
#[derive(Debug, Clone)]
pub struct FunctionInvocationError {
    pub message: String,
    pub argument: Option<String>,
}

pub fn missing_argument(function: &str, argument: &str) -> FunctionInvocationError {
    FunctionInvocationError {
        message: format!(
            "missing required argument '{}' for function '{}'",
            argument, function
        ),
        argument: Some(argument.to_string()),
    }
}

pub fn wrong_type(function: &str, argument: &str, value: &Value) -> FunctionInvocationError {
    FunctionInvocationError {
        message: format!(
            "invalid type for argument '{}' of function '{}': {:?}",
            argument, function, value
        ),
        argument: Some(argument.to_string()),
    }
}

/// Everything a [Callable] needs besides its bound arguments: the caller's evaluation environment
/// and the single [InterpretationEnvironment] shared by the whole `evaluate_expression` call
/// (callbacks thread assignments through nested invocations rather than getting a fresh one).
pub struct CallContext<'a> {
    pub env: &'a dyn IEvaluationEnvironment,
    pub interpretation: &'a mut InterpretationEnvironment,
}

/// A value that can be invoked by a [crate::AExpression::Invocation] or [crate::AExpression::Call].
///
/// `arg_names() == None` marks a variadic/unchecked callee: it accepts any number of positional
/// arguments and rejects named ones outright (spec.md's
/// `UndefinedFunctionArgumentNameError` case).
pub trait Callable: Debug + Send + Sync {
    fn name(&self) -> &str;
    fn arg_names(&self) -> Option<&[String]>;
    fn apply(
        &self,
        ctx: &mut CallContext,
        args: &[Value],
    ) -> std::result::Result<Value, FunctionInvocationError>;
}

type NativeFn = dyn Fn(&[Value]) -> std::result::Result<Value, FunctionInvocationError> + Send + Sync;

/// A builtin or host-registered function backed by a plain Rust closure. Does not touch the
/// [InterpretationEnvironment] -- natives are pure functions of their bound arguments.
pub struct NativeFunction {
    name: String,
    arg_names: Option<Vec<String>>,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        arg_names: Option<Vec<&str>>,
        func: impl Fn(&[Value]) -> std::result::Result<Value, FunctionInvocationError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arg_names: arg_names.map(|names| names.into_iter().map(String::from).collect()),
            func: Box::new(func),
        }
    }
}

impl Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction").field("name", &self.name).finish()
    }
}

impl Callable for NativeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn arg_names(&self) -> Option<&[String]> {
        self.arg_names.as_deref()
    }

    fn apply(
        &self,
        _ctx: &mut CallContext,
        args: &[Value],
    ) -> std::result::Result<Value, FunctionInvocationError> {
        (self.func)(args)
    }
}

/// The callable value produced by evaluating a [crate::AExpression::Callback].
///
/// `captured_statics` is a snapshot taken at the moment the callback expression was evaluated
/// (not at call time), so the closure owns its capture rather than holding a back-reference to
/// the defining environment -- per SPEC_FULL.md's design notes.
#[derive(Debug)]
pub struct CallbackFunction {
    pub signature: Vec<String>,
    pub body: Arc<AExpression>,
    pub captured_statics: HashMap<String, Value>,
}

/// An [IEvaluationEnvironment] that overlays a callback's captured statics and bound parameters
/// on top of the caller's environment for everything else (live variables, functions, the
/// standard registry, the value interpreter).
struct CallbackEnv<'a> {
    base: &'a dyn IEvaluationEnvironment,
    overlay: HashMap<String, Value>,
}

impl<'a> IEvaluationEnvironment for CallbackEnv<'a> {
    fn value_interpreter(&self) -> &Arc<dyn ValueInterpreter> {
        self.base.value_interpreter()
    }

    fn standard_registry(&self) -> &Arc<dyn crate::environment::IStandardFunctionRegistry> {
        self.base.standard_registry()
    }

    fn lookup_static_variable(&self, symbol: &str) -> Option<Value> {
        self.overlay
            .get(symbol)
            .cloned()
            .or_else(|| self.base.lookup_static_variable(symbol))
    }

    fn lookup_live_variable(&self, symbol: &str) -> Option<Value> {
        self.base.lookup_live_variable(symbol)
    }

    fn lookup_function(&self, symbol: &str) -> Option<Arc<dyn Callable>> {
        self.base.lookup_function(symbol)
    }

    fn snapshot_static_variables(&self) -> HashMap<String, Value> {
        let mut snapshot = self.base.snapshot_static_variables();
        snapshot.extend(self.overlay.clone());
        snapshot
    }
}

impl Callable for CallbackFunction {
    fn name(&self) -> &str {
        "<callback>"
    }

    fn arg_names(&self) -> Option<&[String]> {
        Some(&self.signature)
    }

    fn apply(
        &self,
        ctx: &mut CallContext,
        args: &[Value],
    ) -> std::result::Result<Value, FunctionInvocationError> {
        let mut overlay = self.captured_statics.clone();
        for (index, param) in self.signature.iter().enumerate() {
            let value = args.get(index).cloned().unwrap_or(Value::Null);
            overlay.insert(param.to_lowercase(), value);
        }
        let callback_env = CallbackEnv {
            base: ctx.env,
            overlay,
        };
        crate::interpreter::evaluate_internal(&self.body, &callback_env, ctx.interpretation)
            .map_err(|err| FunctionInvocationError {
                message: err.to_string(),
                argument: None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DefaultValueInterpreter;
    use crate::environment::{EvaluationEnvironment, StandardFunctionRegistry};

    #[test]
    fn native_function_reports_missing_argument() {
        let f = NativeFunction::new("id", Some(vec!["value"]), |args| {
            args.first().cloned().ok_or_else(|| missing_argument("id", "value"))
        });
        let env = EvaluationEnvironment::new(
            Arc::new(DefaultValueInterpreter::new()),
            Arc::new(StandardFunctionRegistry::new()),
        );
        let mut interp = InterpretationEnvironment::new();
        let mut ctx = CallContext {
            env: &env,
            interpretation: &mut interp,
        };
        let err = f.apply(&mut ctx, &[]).unwrap_err();
        assert_eq!(err.argument.as_deref(), Some("value"));
    }
}
