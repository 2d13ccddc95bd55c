//! Agent Guard - resilience and admission control for unreliable backends
//!
//! This crate decides whether, when and how a request-handling service
//! may call a flaky downstream dependency such as a model-inference backend.
//! It provides a circuit breaker registry, a retry executor with pluggable
//! backoff, a multi-algorithm rate limiter and a health aggregator.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
