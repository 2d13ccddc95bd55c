//! Circuit breaker adapters.

mod registry;
mod state_breaker;

pub use registry::CircuitBreakerRegistry;
pub use state_breaker::StateCircuitBreaker;
