//! Ordered strategy chains for reads that have more than one way to be served.
//!
//! Each strategy is a lazily-started future. The chain runs them in order and
//! returns the first success; when every strategy fails the last error is
//! returned unchanged.

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::ApiError;

/// A named way of producing a value.
pub struct Strategy<'a, T> {
    name: &'static str,
    run: BoxFuture<'a, Result<T, ApiError>>,
}

impl<'a, T> Strategy<'a, T> {
    pub fn new(name: &'static str, run: BoxFuture<'a, Result<T, ApiError>>) -> Self {
        Self { name, run }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Strategies tried in sequence until one succeeds.
pub struct FallbackChain<'a, T> {
    operation: &'static str,
    strategies: Vec<Strategy<'a, T>>,
}

impl<'a, T> FallbackChain<'a, T> {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            strategies: Vec::new(),
        }
    }

    /// Append a strategy to the end of the chain.
    pub fn then(mut self, name: &'static str, run: BoxFuture<'a, Result<T, ApiError>>) -> Self {
        self.strategies.push(Strategy::new(name, run));
        self
    }

    /// Append a strategy only when `enabled`.
    pub fn then_if(
        self,
        enabled: bool,
        name: &'static str,
        run: impl FnOnce() -> BoxFuture<'a, Result<T, ApiError>>,
    ) -> Self {
        if enabled {
            self.then(name, run())
        } else {
            self
        }
    }

    /// Names of the strategies in the order they will be tried.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(Strategy::name).collect()
    }

    /// Run the strategies in order and return the first success.
    pub async fn run(self) -> Result<T, ApiError> {
        let operation = self.operation;
        let mut last_error = None;
        let mut remaining = self.strategies.len();

        for strategy in self.strategies {
            remaining -= 1;
            match strategy.run.await {
                Ok(value) => {
                    debug!(operation, strategy = strategy.name, "Strategy succeeded");
                    return Ok(value);
                }
                Err(e) if remaining > 0 => {
                    warn!(
                        operation,
                        strategy = strategy.name,
                        error = %e,
                        "Strategy failed, falling back"
                    );
                    last_error = Some(e);
                }
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ApiError::Configuration {
            message: format!("No strategies configured for {}", operation),
        }))
    }
}

#[cfg(test)]
#[path = "fallback_tests.rs"]
mod tests;
