//! Typed client for the Contracts Data API.
//!
//! Wraps the remote contracts service in a strongly typed async interface:
//! every operation goes through a resilient transport (retry with exponential
//! backoff around a shared circuit breaker) and failed responses are
//! translated into the domain error taxonomy in [`error`], with the mapping
//! depending on which operation produced the status code.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod transport;

pub use auth::{StaticTokenProvider, TokenProvider};
pub use client::{ContractsDataClient, Operation};
pub use config::{ClientConfig, ContractsDataApiConfiguration, HttpPolicyOptions};
pub use error::{ClientError, TransportError};
pub use transport::ResilientTransport;
