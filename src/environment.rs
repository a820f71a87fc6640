use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::callable::{missing_argument, wrong_type, Callable, NativeFunction};
use crate::value::{DefaultValueInterpreter, Value, ValueInterpreter};

/// The caller-supplied environment an expression is evaluated against: the value interpreter,
/// the function registry, and two tiers of variables.
///
/// Variable lookup checked in order: static variables, then live variables, then whatever the
/// current [InterpretationEnvironment] has accumulated via assignment. A miss at all three tiers
/// is a [crate::Error::UndefinedVariable].
pub trait IEvaluationEnvironment: Send + Sync {
    fn value_interpreter(&self) -> &Arc<dyn ValueInterpreter>;
    fn standard_registry(&self) -> &Arc<dyn IStandardFunctionRegistry>;
    fn lookup_static_variable(&self, symbol: &str) -> Option<Value>;
    fn lookup_live_variable(&self, symbol: &str) -> Option<Value>;
    fn lookup_function(&self, symbol: &str) -> Option<Arc<dyn Callable>>;
    /// A point-in-time copy of every static variable, used to seed a callback's capture.
    fn snapshot_static_variables(&self) -> HashMap<String, Value>;
}

/// Builtin function lookup, consulted before a caller's own [IEvaluationEnvironment::lookup_function].
pub trait IStandardFunctionRegistry: Send + Sync {
    fn lookup(&self, symbol: &str) -> Option<Arc<dyn Callable>>;
}

/// The concrete [IEvaluationEnvironment] this crate ships. Built once per host call site and
/// shared (read-only) across however many [crate::evaluate_expression] calls the host makes.
#[derive(Clone)]
pub struct EvaluationEnvironment {
    value_interpreter: Arc<dyn ValueInterpreter>,
    standard_registry: Arc<dyn IStandardFunctionRegistry>,
    static_variables: HashMap<String, Value>,
    live_variables: HashMap<String, Value>,
    functions: HashMap<String, Arc<dyn Callable>>,
}

impl Debug for EvaluationEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationEnvironment")
            .field("static_variables", &self.static_variables.keys().collect::<Vec<_>>())
            .field("live_variables", &self.live_variables.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EvaluationEnvironment {
    pub fn new(
        value_interpreter: Arc<dyn ValueInterpreter>,
        standard_registry: Arc<dyn IStandardFunctionRegistry>,
    ) -> Self {
        Self {
            value_interpreter,
            standard_registry,
            static_variables: HashMap::new(),
            live_variables: HashMap::new(),
            functions: HashMap::new(),
        }
    }

    /// Bind a static variable, fixed for the lifetime of this environment. Symbols are
    /// case-insensitive, so the key is normalized to lowercase before storage.
    pub fn with_static(mut self, symbol: impl Into<String>, value: Value) -> Self {
        self.static_variables.insert(symbol.into().to_lowercase(), value);
        self
    }

    /// Bind a live variable -- conceptually re-read on every lookup by a real embedding, modeled
    /// here as a plain value the host refreshes between calls to [crate::evaluate_expression].
    pub fn with_live(mut self, symbol: impl Into<String>, value: Value) -> Self {
        self.live_variables.insert(symbol.into().to_lowercase(), value);
        self
    }

    pub fn with_function(mut self, symbol: impl Into<String>, function: Arc<dyn Callable>) -> Self {
        self.functions.insert(symbol.into().to_lowercase(), function);
        self
    }
}

impl IEvaluationEnvironment for EvaluationEnvironment {
    fn value_interpreter(&self) -> &Arc<dyn ValueInterpreter> {
        &self.value_interpreter
    }

    fn standard_registry(&self) -> &Arc<dyn IStandardFunctionRegistry> {
        &self.standard_registry
    }

    fn lookup_static_variable(&self, symbol: &str) -> Option<Value> {
        self.static_variables.get(symbol).cloned()
    }

    fn lookup_live_variable(&self, symbol: &str) -> Option<Value> {
        self.live_variables.get(symbol).cloned()
    }

    fn lookup_function(&self, symbol: &str) -> Option<Arc<dyn Callable>> {
        self.functions.get(symbol).cloned()
    }

    fn snapshot_static_variables(&self) -> HashMap<String, Value> {
        self.static_variables.clone()
    }
}

/// The mutable scratch space for a single [crate::evaluate_expression] call: every variable or
/// function created by an `=` assignment lands here. Created fresh at the start of the call,
/// dropped at the end -- nothing here outlives one evaluation, and callback invocations nested
/// inside that evaluation share the same instance (spec.md §4.4).
#[derive(Debug, Default)]
pub struct InterpretationEnvironment {
    variables: HashMap<String, Value>,
    functions: HashMap<String, Arc<dyn Callable>>,
}

impl InterpretationEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<Value> {
        self.variables.get(symbol).cloned()
    }

    pub fn contains_variable(&self, symbol: &str) -> bool {
        self.variables.contains_key(symbol)
    }

    pub fn set(&mut self, symbol: String, value: Value) {
        self.variables.insert(symbol, value);
    }

    pub fn get_function(&self, symbol: &str) -> Option<Arc<dyn Callable>> {
        self.functions.get(symbol).cloned()
    }

    pub fn contains_function(&self, symbol: &str) -> bool {
        self.functions.contains_key(symbol)
    }

    pub fn set_function(&mut self, symbol: String, function: Arc<dyn Callable>) {
        self.functions.insert(symbol, function);
    }

    /// Temporarily rebind `symbol`, returning whatever was bound before so a caller can restore
    /// it once done -- used by callback invocation to shadow its own parameters without leaking
    /// them into the surrounding scope.
    pub fn shadow(&mut self, symbol: String, value: Value) -> Option<Value> {
        self.variables.insert(symbol, value)
    }

    /// Restore a binding captured by [InterpretationEnvironment::shadow].
    pub fn unshadow(&mut self, symbol: &str, previous: Option<Value>) {
        match previous {
            Some(value) => {
                self.variables.insert(symbol.to_string(), value);
            }
            None => {
                self.variables.remove(symbol);
            }
        }
    }
}

/// The default [IStandardFunctionRegistry]: a small library of pure functions (`len`, `str`,
/// `abs`, `contains`, `range`) every embedding gets for free.
pub struct StandardFunctionRegistry {
    functions: HashMap<String, Arc<dyn Callable>>,
}

impl Debug for StandardFunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardFunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for StandardFunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardFunctionRegistry {
    pub fn new() -> Self {
        let mut functions: HashMap<String, Arc<dyn Callable>> = HashMap::new();

        functions.insert(
            "len".to_string(),
            Arc::new(NativeFunction::new("len", Some(vec!["value"]), |args| {
                let value = args.first().ok_or_else(|| missing_argument("len", "value"))?;
                match value {
                    Value::Str(s) => Ok(Value::Long(s.chars().count() as i64)),
                    Value::List(items) => Ok(Value::Long(items.len() as i64)),
                    Value::Map(map) => Ok(Value::Long(map.len() as i64)),
                    Value::Null => Ok(Value::Long(0)),
                    other => Err(wrong_type("len", "value", other)),
                }
            })),
        );

        functions.insert(
            "str".to_string(),
            Arc::new(NativeFunction::new("str", Some(vec!["value"]), |args| {
                let value = args.first().cloned().unwrap_or(Value::Null);
                Ok(Value::Str(DefaultValueInterpreter::new().as_string(&value)))
            })),
        );

        functions.insert(
            "abs".to_string(),
            Arc::new(NativeFunction::new("abs", Some(vec!["value"]), |args| {
                match args.first() {
                    Some(Value::Long(l)) => Ok(Value::Long(l.abs())),
                    Some(Value::Double(d)) => Ok(Value::Double(d.abs())),
                    Some(other) => Err(wrong_type("abs", "value", other)),
                    None => Err(missing_argument("abs", "value")),
                }
            })),
        );

        functions.insert(
            "contains".to_string(),
            Arc::new(NativeFunction::new(
                "contains",
                Some(vec!["haystack", "needle"]),
                |args| {
                    let haystack = args.first().ok_or_else(|| missing_argument("contains", "haystack"))?;
                    let needle = args.get(1).ok_or_else(|| missing_argument("contains", "needle"))?;
                    match haystack {
                        Value::Str(s) => {
                            let needle_str = DefaultValueInterpreter::new().as_string(needle);
                            Ok(Value::Bool(s.contains(&needle_str)))
                        }
                        Value::List(items) => Ok(Value::Bool(items.iter().any(|v| v == needle))),
                        other => Err(wrong_type("contains", "haystack", other)),
                    }
                },
            )),
        );

        functions.insert(
            "range".to_string(),
            Arc::new(NativeFunction::new(
                "range",
                Some(vec!["start", "end"]),
                |args| {
                    let start = match args.first() {
                        Some(Value::Long(l)) => *l,
                        Some(other) => return Err(wrong_type("range", "start", other)),
                        None => return Err(missing_argument("range", "start")),
                    };
                    let end = match args.get(1) {
                        Some(Value::Long(l)) => *l,
                        Some(other) => return Err(wrong_type("range", "end", other)),
                        None => return Err(missing_argument("range", "end")),
                    };
                    let values: Vec<Value> = (start..end).map(Value::Long).collect();
                    Ok(Value::List(Arc::new(values)))
                },
            )),
        );

        Self { functions }
    }
}

impl IStandardFunctionRegistry for StandardFunctionRegistry {
    fn lookup(&self, symbol: &str) -> Option<Arc<dyn Callable>> {
        self.functions.get(symbol).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_beats_nothing_and_live_is_checked_too() {
        let env = EvaluationEnvironment::new(
            Arc::new(DefaultValueInterpreter::new()),
            Arc::new(StandardFunctionRegistry::new()),
        )
        .with_static("x", Value::Long(1))
        .with_live("y", Value::Long(2));

        assert_eq!(env.lookup_static_variable("x"), Some(Value::Long(1)));
        assert_eq!(env.lookup_live_variable("y"), Some(Value::Long(2)));
        assert_eq!(env.lookup_static_variable("y"), None);
    }

    #[test]
    fn interpretation_environment_shadow_restores_previous_value() {
        let mut interp = InterpretationEnvironment::new();
        interp.set("x".to_string(), Value::Long(1));
        let previous = interp.shadow("x".to_string(), Value::Long(99));
        assert_eq!(interp.get("x"), Some(Value::Long(99)));
        interp.unshadow("x", previous);
        assert_eq!(interp.get("x"), Some(Value::Long(1)));
    }

    #[test]
    fn standard_registry_has_len() {
        let registry = StandardFunctionRegistry::new();
        assert!(registry.lookup("len").is_some());
        assert!(registry.lookup("nonexistent").is_none());
    }
}
