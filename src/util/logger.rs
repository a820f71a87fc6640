use std::fmt::{Debug, Display, Formatter};

/// Debug verbosity for the tokenizer and parser's optional trace output, gated behind
/// `#[cfg(debug_assertions)]` the same way the teacher's own `util::logger` gates lexeme trace
/// output -- no `log`/`tracing` dependency, since nothing downstream of this crate is expected to
/// subscribe to it as a real logging sink.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Log<T> {
    None,
    Default(T),
    Success(T),
    Trace(T),
}

impl<T> Log<T> {
    /// Relative verbosity, used to decide whether a given trace call should print.
    pub fn order(&self) -> u8 {
        match self {
            Log::None => 0,
            Log::Default(_) => 1,
            Log::Success(_) => 2,
            Log::Trace(_) => 3,
        }
    }
}

impl<T: Display> Display for Log<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Log::None => Ok(()),
            Log::Default(s) | Log::Success(s) | Log::Trace(s) => write!(f, "{}", s),
        }
    }
}

/// Print `message` if `level` is at least as verbose as `threshold`. Compiled out entirely in
/// release builds.
pub fn trace<T>(level: Log<T>, threshold: Log<T>, message: impl FnOnce() -> String) {
    #[cfg(debug_assertions)]
    if level.order() >= threshold.order() {
        println!("{}", message());
    }
    #[cfg(not(debug_assertions))]
    {
        let _ = (level, threshold, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_monotonic() {
        assert!(Log::Trace(()).order() > Log::Success(()).order());
        assert!(Log::Success(()).order() > Log::Default(()).order());
        assert!(Log::Default(()).order() > Log::None::<()>.order());
    }
}
