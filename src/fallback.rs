//! Ordered strategies with aggregated failure reporting.

use std::borrow::Cow;

use tracing::debug;

use crate::error::{CaSignerError, Result, StrategyFailure};

type Strategy<'a, T> = Box<dyn FnOnce() -> Result<T> + 'a>;

/// Runs named strategies in order until one succeeds.
///
/// Strategies run lazily: a later strategy is never invoked once an earlier one has
/// succeeded. When every strategy fails, the error lists each attempt in order; a chain
/// with a single attempt returns that attempt's error unchanged.
pub struct FallbackChain<'a, T> {
    strategies: Vec<(Cow<'static, str>, Strategy<'a, T>)>,
}

impl<T> Default for FallbackChain<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> FallbackChain<'a, T> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Appends a strategy.
    pub fn attempt(
        mut self,
        name: impl Into<Cow<'static, str>>,
        strategy: impl FnOnce() -> Result<T> + 'a,
    ) -> Self {
        self.strategies.push((name.into(), Box::new(strategy)));
        self
    }

    pub fn run(self) -> Result<T> {
        let mut attempts = Vec::with_capacity(self.strategies.len());
        for (name, strategy) in self.strategies {
            match strategy() {
                Ok(value) => return Ok(value),
                Err(error) => {
                    debug!(strategy = %name, %error, "strategy failed, trying next");
                    attempts.push(StrategyFailure {
                        strategy: name.into_owned(),
                        error,
                    });
                }
            }
        }

        if attempts.len() == 1 {
            return Err(attempts.remove(0).error);
        }
        Err(CaSignerError::AllStrategiesFailed { attempts })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn test_first_success_short_circuits() {
        let second_ran = Cell::new(false);
        let value = FallbackChain::new()
            .attempt("first", || Ok(1))
            .attempt("second", || {
                second_ran.set(true);
                Ok(2)
            })
            .run()
            .unwrap();

        assert_eq!(value, 1);
        assert!(!second_ran.get());
    }

    #[test]
    fn test_falls_through_to_later_strategy() {
        let value = FallbackChain::new()
            .attempt("keystore", || Err(CaSignerError::ProviderNotInitialized))
            .attempt("key file", || Ok("imported"))
            .run()
            .unwrap();

        assert_eq!(value, "imported");
    }

    #[test]
    fn test_all_failures_are_reported_in_order() {
        let err = FallbackChain::<()>::new()
            .attempt("keystore", || Err(CaSignerError::ProviderNotInitialized))
            .attempt(format!("key file '{}'", "/tmp/key.pem"), || {
                Err(CaSignerError::SignerInit("boom".to_string()))
            })
            .run()
            .unwrap_err();

        let attempts = err.attempts().expect("composite error");
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].strategy, "keystore");
        assert_eq!(attempts[1].strategy, "key file '/tmp/key.pem'");

        let message = err.to_string();
        assert!(message.contains("Crypto provider was not initialized"));
        assert!(message.contains("/tmp/key.pem"));
        assert!(message.contains("boom"));
    }

    #[test]
    fn test_single_attempt_error_is_not_wrapped() {
        let err = FallbackChain::<()>::new()
            .attempt("keystore", || Err(CaSignerError::ProviderNotInitialized))
            .run()
            .unwrap_err();

        assert!(matches!(err, CaSignerError::ProviderNotInitialized));
    }
}
