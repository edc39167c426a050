//! The Contracts Data API client and its failure translation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use contracts_common::resilience::PolicyRegistry;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, info};
use url::Url;

use crate::auth::TokenProvider;
use crate::config::ContractsDataApiConfiguration;
use crate::error::{ClientError, TransportError};
use crate::models::{
    ApprovalRequest, Contract, ContractIdentifier, ContractReminderItem, ContractReminders,
    CreateRequest, ReminderQuery, WithdrawalRequest,
};
use crate::transport::ResilientTransport;

/// Registry key under which this client's policies live.
pub const SERVICE_NAME: &str = "ContractsData";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// The client operations, used to pick the right status-code translation.
///
/// The same status code means different things per operation (409 is a
/// duplicate on create but a concurrency conflict on withdraw), so the
/// translation is keyed by operation and status together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetContractById,
    GetContract,
    GetContractReminders,
    UpdateContractReminder,
    CreateContract,
    ManualApprove,
    ConfirmApproval,
    Withdraw,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetContractById => write!(f, "contract retrieval by id"),
            Self::GetContract => write!(f, "contract retrieval"),
            Self::GetContractReminders => write!(f, "contract reminder retrieval"),
            Self::UpdateContractReminder => write!(f, "contract reminder update"),
            Self::CreateContract => write!(f, "contract creation"),
            Self::ManualApprove => write!(f, "manual approval"),
            Self::ConfirmApproval => write!(f, "approval confirmation"),
            Self::Withdraw => write!(f, "withdrawal"),
        }
    }
}

/// Typed client for the Contracts Data API.
///
/// All calls go through the resilient transport registered for
/// [`SERVICE_NAME`]; a bearer token is obtained from the [`TokenProvider`]
/// before every call.
pub struct ContractsDataClient {
    transport: ResilientTransport,
    base_url: Url,
    token_provider: Arc<dyn TokenProvider>,
}

impl ContractsDataClient {
    /// Create a client from configuration and the shared policy registry.
    ///
    /// Fails if the policies for [`SERVICE_NAME`] were never registered.
    pub fn new(
        config: &ContractsDataApiConfiguration,
        registry: &PolicyRegistry<TransportError>,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(TransportError::Network)?;
        let transport = ResilientTransport::from_registry(http, registry, SERVICE_NAME)?;
        Ok(Self { transport, base_url: config.api_base_address.clone(), token_provider })
    }

    /// Fetch a contract by its internal id.
    pub async fn get_contract_by_id(&self, id: i32) -> Result<Contract, ClientError> {
        info!(id, "retrieving contract by id");
        let url = self.endpoint(&format!("api/contract/{id}"))?;
        let request = self.authorized(Method::GET, url).await?;
        let response = self.execute(Operation::GetContractById, None, request).await?;
        Self::deserialize(response).await
    }

    /// Fetch a contract by number and version.
    pub async fn get_contract(
        &self,
        contract_number: &str,
        version: i32,
    ) -> Result<Contract, ClientError> {
        info!(contract_number, version, "retrieving contract by number and version");
        let mut url = self.endpoint("api/contract")?;
        url.query_pairs_mut()
            .append_pair("contractNumber", contract_number)
            .append_pair("versionNumber", &version.to_string());
        let request = self.authorized(Method::GET, url).await?;
        let response = self.execute(Operation::GetContract, None, request).await?;
        Self::deserialize(response).await
    }

    /// Like [`Self::get_contract`], but a missing contract is an expected
    /// outcome and comes back as `Ok(None)`.
    pub async fn try_get_contract(
        &self,
        contract_number: &str,
        version: i32,
    ) -> Result<Option<Contract>, ClientError> {
        match self.get_contract(contract_number, version).await {
            Ok(contract) => Ok(Some(contract)),
            Err(ClientError::NotFound { .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// List contracts due a reminder email.
    pub async fn get_contract_reminders(
        &self,
        query: &ReminderQuery,
    ) -> Result<ContractReminders, ClientError> {
        info!(
            reminder_interval = query.reminder_interval,
            page = query.page,
            count = query.count,
            sort = %query.sort,
            order = %query.order,
            "retrieving contract reminders"
        );
        let mut url = self.endpoint("api/contractReminders")?;
        url.query_pairs_mut()
            .append_pair("reminderInterval", &query.reminder_interval.to_string())
            .append_pair("page", &query.page.to_string())
            .append_pair("count", &query.count.to_string())
            .append_pair("sort", &query.sort.to_string())
            .append_pair("order", &query.order.to_string());
        let request = self.authorized(Method::GET, url).await?;
        let response = self.execute(Operation::GetContractReminders, None, request).await?;
        Self::deserialize(response).await
    }

    /// Record that a reminder email went out for `reminder`.
    pub async fn update_contract_reminder(
        &self,
        reminder: &ContractReminderItem,
    ) -> Result<(), ClientError> {
        info!(
            contract_number = reminder.contract_number,
            contract_version = reminder.contract_version,
            "updating last email reminder sent"
        );
        let url = self.endpoint("api/contractReminder")?;
        let body = ContractIdentifier::from(reminder);
        let request = self.authorized(Method::PATCH, url).await?.json(&body);
        self.execute(Operation::UpdateContractReminder, None, request).await?;
        Ok(())
    }

    /// Create a new contract version.
    pub async fn create_contract(&self, contract: &CreateRequest) -> Result<(), ClientError> {
        info!(
            contract_number = contract.contract_number,
            contract_version = contract.contract_version,
            "creating contract"
        );
        let url = self.endpoint("api/contract")?;
        let request = self.authorized(Method::POST, url).await?.json(contract);
        let identity = Some((contract.contract_number.as_str(), contract.contract_version));
        self.execute(Operation::CreateContract, identity, request).await?;
        Ok(())
    }

    /// Approve a contract on the provider's behalf.
    pub async fn manual_approve(&self, approval: &ApprovalRequest) -> Result<(), ClientError> {
        info!(
            contract_number = approval.contract_number,
            contract_version = approval.contract_version,
            "manual approval requested"
        );
        self.patch_contract(Operation::ManualApprove, "api/contract/manualApprove", approval)
            .await
    }

    /// Confirm a provider's approval of a contract.
    pub async fn confirm_approval(&self, approval: &ApprovalRequest) -> Result<(), ClientError> {
        info!(
            contract_number = approval.contract_number,
            contract_version = approval.contract_version,
            "approval confirmation requested"
        );
        self.patch_contract(Operation::ConfirmApproval, "api/contract/confirmApproval", approval)
            .await
    }

    /// Withdraw a contract on behalf of the agency or the provider.
    pub async fn withdraw(&self, withdrawal: &WithdrawalRequest) -> Result<(), ClientError> {
        info!(
            contract_number = withdrawal.contract_number,
            contract_version = withdrawal.contract_version,
            withdrawal_type = ?withdrawal.withdrawal_type,
            "withdrawal requested"
        );
        let url = self.endpoint("api/contract/withdraw")?;
        let request = self.authorized(Method::PATCH, url).await?.json(withdrawal);
        let identity = Some((withdrawal.contract_number.as_str(), withdrawal.contract_version));
        self.execute(Operation::Withdraw, identity, request).await?;
        Ok(())
    }

    async fn patch_contract<B: Serialize>(
        &self,
        operation: Operation,
        path: &str,
        body: &B,
    ) -> Result<(), ClientError>
    where
        B: HasContractIdentity,
    {
        let url = self.endpoint(path)?;
        let request = self.authorized(Method::PATCH, url).await?.json(body);
        let identity = Some(body.identity());
        self.execute(operation, identity, request).await?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|error| ClientError::Configuration(format!("invalid endpoint '{path}': {error}")))
    }

    async fn authorized(&self, method: Method, url: Url) -> Result<RequestBuilder, ClientError> {
        let token = self.token_provider.access_token().await?;
        Ok(self.transport.request(method, url).bearer_auth(token))
    }

    async fn execute(
        &self,
        operation: Operation,
        identity: Option<(&str, i32)>,
        request: RequestBuilder,
    ) -> Result<Response, ClientError> {
        match self.transport.send(request).await {
            Ok(response) => Ok(response),
            Err(failure) => {
                error!(%operation, error = %failure, "contracts data api call failed");
                Err(translate_failure(operation, identity, failure))
            }
        }
    }

    async fn deserialize<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        Ok(response.json::<T>().await.map_err(TransportError::Network)?)
    }
}

trait HasContractIdentity {
    fn identity(&self) -> (&str, i32);
}

impl HasContractIdentity for ApprovalRequest {
    fn identity(&self) -> (&str, i32) {
        (&self.contract_number, self.contract_version)
    }
}

/// Map a transport failure to the error the operation's caller should see.
///
/// Runs exactly once per failed logical call, after retries are done.
/// Statuses without a row for the operation, and failures that carry no
/// status at all, pass through as generic transport errors. The reminder
/// update deliberately has no translations; its callers treat any failure
/// alike.
fn translate_failure(
    operation: Operation,
    identity: Option<(&str, i32)>,
    failure: TransportError,
) -> ClientError {
    if matches!(failure, TransportError::BrokenCircuit) {
        return ClientError::CircuitOpen { source: failure };
    }
    let Some(status) = failure.status() else {
        return ClientError::Transport(failure);
    };

    match (operation, status, identity) {
        (Operation::GetContractById | Operation::GetContract, StatusCode::NOT_FOUND, _) => {
            ClientError::NotFound { source: failure }
        }

        (Operation::CreateContract, StatusCode::BAD_REQUEST, _) => {
            ClientError::BadRequest { source: failure }
        }
        (Operation::CreateContract, StatusCode::CONFLICT, Some((number, version))) => {
            ClientError::DuplicateContract {
                contract_number: number.to_string(),
                contract_version: version,
                source: failure,
            }
        }
        (Operation::CreateContract, StatusCode::PRECONDITION_FAILED, Some((number, version))) => {
            ClientError::HigherVersionExists {
                contract_number: number.to_string(),
                contract_version: version,
                source: failure,
            }
        }

        (
            Operation::ManualApprove | Operation::ConfirmApproval | Operation::Withdraw,
            StatusCode::BAD_REQUEST,
            _,
        ) => ClientError::BadRequest { source: failure },
        (
            Operation::ManualApprove | Operation::ConfirmApproval | Operation::Withdraw,
            StatusCode::NOT_FOUND,
            _,
        ) => ClientError::NotFound { source: failure },
        (
            Operation::ManualApprove | Operation::ConfirmApproval | Operation::Withdraw,
            StatusCode::CONFLICT,
            Some((number, version)),
        ) => ClientError::UpdateConcurrency {
            contract_number: number.to_string(),
            contract_version: version,
            source: failure,
        },
        (
            Operation::ManualApprove | Operation::ConfirmApproval | Operation::Withdraw,
            StatusCode::PRECONDITION_FAILED,
            _,
        ) => ClientError::InvalidStatus { operation, source: failure },

        _ => ClientError::Transport(failure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: StatusCode) -> TransportError {
        TransportError::Http { status, body: String::new() }
    }

    #[test]
    fn get_translates_404_to_not_found() {
        let error = translate_failure(Operation::GetContract, None, http(StatusCode::NOT_FOUND));
        assert!(matches!(error, ClientError::NotFound { .. }));

        let error =
            translate_failure(Operation::GetContractById, None, http(StatusCode::NOT_FOUND));
        assert!(matches!(error, ClientError::NotFound { .. }));
    }

    #[test]
    fn get_leaves_other_statuses_untranslated() {
        let error = translate_failure(Operation::GetContract, None, http(StatusCode::BAD_REQUEST));
        assert!(matches!(error, ClientError::Transport(_)));
    }

    #[test]
    fn create_conflict_is_a_duplicate_contract() {
        let error = translate_failure(
            Operation::CreateContract,
            Some(("Test", 1)),
            http(StatusCode::CONFLICT),
        );

        match error {
            ClientError::DuplicateContract { contract_number, contract_version, .. } => {
                assert_eq!(contract_number, "Test");
                assert_eq!(contract_version, 1);
            }
            other => panic!("expected duplicate contract, got {other}"),
        }
    }

    #[test]
    fn create_precondition_failed_is_a_higher_version_conflict() {
        let error = translate_failure(
            Operation::CreateContract,
            Some(("Test", 1)),
            http(StatusCode::PRECONDITION_FAILED),
        );

        assert!(matches!(error, ClientError::HigherVersionExists { .. }));
    }

    #[test]
    fn create_404_stays_a_transport_error() {
        let error = translate_failure(
            Operation::CreateContract,
            Some(("Test", 1)),
            http(StatusCode::NOT_FOUND),
        );

        assert!(matches!(error, ClientError::Transport(_)));
    }

    #[test]
    fn approval_conflict_is_an_update_concurrency_conflict() {
        for operation in
            [Operation::ManualApprove, Operation::ConfirmApproval, Operation::Withdraw]
        {
            let error = translate_failure(operation, Some(("Test", 2)), http(StatusCode::CONFLICT));

            match error {
                ClientError::UpdateConcurrency { contract_number, contract_version, .. } => {
                    assert_eq!(contract_number, "Test");
                    assert_eq!(contract_version, 2);
                }
                other => panic!("expected update concurrency for {operation}, got {other}"),
            }
        }
    }

    #[test]
    fn approval_precondition_failed_names_the_operation() {
        let error = translate_failure(
            Operation::Withdraw,
            Some(("Test", 2)),
            http(StatusCode::PRECONDITION_FAILED),
        );

        match error {
            ClientError::InvalidStatus { operation, .. } => {
                assert_eq!(operation, Operation::Withdraw);
                assert_eq!(
                    error_message(&ClientError::InvalidStatus {
                        operation,
                        source: http(StatusCode::PRECONDITION_FAILED)
                    }),
                    "Contract not in correct status for withdrawal."
                );
            }
            other => panic!("expected invalid status, got {other}"),
        }
    }

    #[test]
    fn reminder_update_is_never_translated() {
        for status in
            [StatusCode::BAD_REQUEST, StatusCode::NOT_FOUND, StatusCode::PRECONDITION_FAILED]
        {
            let error = translate_failure(Operation::UpdateContractReminder, None, http(status));
            assert!(matches!(error, ClientError::Transport(_)), "status {status} was translated");
        }
    }

    #[test]
    fn broken_circuit_maps_to_circuit_open_for_every_operation() {
        let error =
            translate_failure(Operation::GetContract, None, TransportError::BrokenCircuit);
        assert!(matches!(error, ClientError::CircuitOpen { .. }));
    }

    fn error_message(error: &ClientError) -> String {
        error.to_string()
    }
}
