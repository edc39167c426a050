//! Generic building blocks shared by the contracts API client crates.
//!
//! The only tier currently provided is `resilience`: retry with exponential
//! backoff, a consecutive-failure circuit breaker, and a keyed policy
//! registry. Nothing in this crate knows about the Contracts Data domain.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;
