//! Error taxonomy for the Contracts Data API client.
//!
//! Two layers: [`TransportError`] is what the resilient transport produces
//! (status + body, network failures, broken circuit), and [`ClientError`] is
//! what callers see after the per-operation translation in
//! [`crate::client`]. Translated variants keep the transport failure as their
//! source for diagnostic chaining.

use reqwest::StatusCode;
use thiserror::Error;

use crate::client::Operation;

/// Failure of a single logical call through the resilient transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The API answered with a non-success status.
    #[error("contracts data api returned {status}: {body}")]
    Http {
        /// The response status code.
        status: StatusCode,
        /// The response body, best effort.
        body: String,
    },
    /// The request never produced a response.
    #[error("network error calling contracts data api")]
    Network(#[from] reqwest::Error),
    /// The circuit breaker rejected the call without attempting it.
    #[error("contracts data api circuit is open, calls are failing fast")]
    BrokenCircuit,
    /// The request could not be constructed.
    #[error("failed to build request: {0}")]
    Request(String),
}

impl TransportError {
    /// HTTP status of the failure, when the API responded at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Network(error) => error.status(),
            Self::BrokenCircuit | Self::Request(_) => None,
        }
    }

    /// Whether the failure is likely to succeed on retry: network-level
    /// errors, 5xx responses, and request timeouts (408).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => {
                status.is_server_error() || *status == StatusCode::REQUEST_TIMEOUT
            }
            Self::Network(_) => true,
            Self::BrokenCircuit | Self::Request(_) => false,
        }
    }
}

/// Error returned by [`crate::ContractsDataClient`] operations.
///
/// Status codes are translated per operation; anything without a specific
/// meaning for the operation that produced it stays a [`Self::Transport`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// A transport failure with no operation-specific meaning.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A contract cannot be found with the given details.
    #[error("A contract cannot be found with the given details.")]
    NotFound {
        #[source]
        source: TransportError,
    },

    /// The API rejected the request payload.
    #[error("Input validation failed, check log for details.")]
    BadRequest {
        #[source]
        source: TransportError,
    },

    /// The contract is not in a status that allows the attempted operation.
    #[error("Contract not in correct status for {operation}.")]
    InvalidStatus {
        /// The operation the contract's status does not allow.
        operation: Operation,
        #[source]
        source: TransportError,
    },

    /// The contract changed underneath the update.
    #[error("Contract may have been modified or deleted since it was loaded - ContractNumber: {contract_number}, ContractVersion: {contract_version}.")]
    UpdateConcurrency {
        contract_number: String,
        contract_version: i32,
        #[source]
        source: TransportError,
    },

    /// A contract with this number and version already exists.
    #[error("A contract with ContractNumber [{contract_number}] and ContractVersion [{contract_version}] already exists.")]
    DuplicateContract {
        contract_number: String,
        contract_version: i32,
        #[source]
        source: TransportError,
    },

    /// A higher version of this contract already exists; lower versions are
    /// not accepted.
    #[error("A contract with ContractNumber [{contract_number}] and a higher ContractVersion than [{contract_version}] already exists.")]
    HigherVersionExists {
        contract_number: String,
        contract_version: i32,
        #[source]
        source: TransportError,
    },

    /// The resilience layer is shedding load from the API.
    #[error("Contracts Data API circuit is open, calls are failing fast.")]
    CircuitOpen {
        #[source]
        source: TransportError,
    },

    /// The resilience policies for the service were never registered, or
    /// their options were rejected.
    #[error("resilience policy unavailable")]
    Policy(#[from] contracts_common::resilience::RegistryError),

    /// The client itself is misconfigured.
    #[error("client configuration error: {0}")]
    Configuration(String),
}
