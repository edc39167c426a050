//! Request and response shapes exchanged with the Contracts Data API.
//!
//! All shapes serialize as camelCase JSON. They carry no behavior beyond the
//! conversions needed to build requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A contract as returned by the get endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: i32,
    pub contract_number: String,
    pub contract_version: i32,
}

/// One entry from the contract reminders listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractReminderItem {
    pub id: i32,
    pub contract_number: String,
    pub contract_version: i32,
    /// When the last reminder email went out, if one has been sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_email_reminder_sent: Option<DateTime<Utc>>,
}

/// Response envelope of the reminders endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractReminders {
    pub contracts: Vec<ContractReminderItem>,
    pub paging: Paging,
}

/// Paging metadata returned alongside listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    pub current_page: u32,
    pub page_size: u32,
    pub total_count: u32,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub next_page_url: String,
    pub previous_page_url: String,
}

/// Identifies one contract version; PATCH body of the reminder update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractIdentifier {
    pub id: i32,
    pub contract_number: String,
    pub contract_version: i32,
}

impl From<&ContractReminderItem> for ContractIdentifier {
    fn from(item: &ContractReminderItem) -> Self {
        Self {
            id: item.id,
            contract_number: item.contract_number.clone(),
            contract_version: item.contract_version,
        }
    }
}

/// POST body for creating a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub contract_number: String,
    pub contract_version: i32,
}

/// PATCH body for the approval endpoints; `file_name` names the contract
/// document blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: i32,
    pub contract_number: String,
    pub contract_version: i32,
    pub file_name: String,
}

/// PATCH body for the withdraw endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: i32,
    pub contract_number: String,
    pub contract_version: i32,
    pub file_name: String,
    pub withdrawal_type: WithdrawalType,
}

/// Who is withdrawing the contract. Sent over the wire as the numeric codes
/// the API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum WithdrawalType {
    WithdrawnByAgency = 1,
    WithdrawnByProvider = 2,
}

impl From<WithdrawalType> for u8 {
    fn from(value: WithdrawalType) -> Self {
        value as Self
    }
}

impl TryFrom<u8> for WithdrawalType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::WithdrawnByAgency),
            2 => Ok(Self::WithdrawnByProvider),
            other => Err(format!(
                "invalid withdrawal type {other}, expected WithdrawnByAgency [1] or WithdrawnByProvider [2]"
            )),
        }
    }
}

/// Fields the reminders listing can be sorted by. The `Display` form is what
/// goes into the `sort` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContractSortOptions {
    ContractNumber,
    ContractVersion,
    CreatedAt,
    #[default]
    LastUpdatedAt,
}

impl fmt::Display for ContractSortOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContractNumber => write!(f, "ContractNumber"),
            Self::ContractVersion => write!(f, "ContractVersion"),
            Self::CreatedAt => write!(f, "CreatedAt"),
            Self::LastUpdatedAt => write!(f, "LastUpdatedAt"),
        }
    }
}

/// Sort order for the reminders listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "Asc"),
            Self::Desc => write!(f, "Desc"),
        }
    }
}

/// Query parameters of the reminders listing, with the API's documented
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderQuery {
    /// Days since the last reminder email before a contract is due another.
    pub reminder_interval: u32,
    pub page: u32,
    pub count: u32,
    pub sort: ContractSortOptions,
    pub order: SortDirection,
}

impl Default for ReminderQuery {
    fn default() -> Self {
        Self {
            reminder_interval: 14,
            page: 1,
            count: 10,
            sort: ContractSortOptions::LastUpdatedAt,
            order: SortDirection::Asc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn contract_deserializes_from_camel_case() {
        let contract: Contract = serde_json::from_value(json!({
            "id": 1,
            "contractNumber": "Test1",
            "contractVersion": 1
        }))
        .unwrap();

        assert_eq!(contract.contract_number, "Test1");
        assert_eq!(contract.contract_version, 1);
    }

    #[test]
    fn withdrawal_type_serializes_as_numeric_code() {
        let request = WithdrawalRequest {
            id: 1,
            contract_number: "Test".to_string(),
            contract_version: 1,
            file_name: "sample-blob-file.xml".to_string(),
            withdrawal_type: WithdrawalType::WithdrawnByProvider,
        };

        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["withdrawalType"], json!(2));
        assert_eq!(value["fileName"], json!("sample-blob-file.xml"));
    }

    #[test]
    fn withdrawal_type_rejects_out_of_range_codes() {
        let result: Result<WithdrawalType, _> = serde_json::from_value(json!(3));
        assert!(result.is_err());

        let agency: WithdrawalType = serde_json::from_value(json!(1)).unwrap();
        assert_eq!(agency, WithdrawalType::WithdrawnByAgency);
    }

    #[test]
    fn identifier_derived_from_reminder_item() {
        let item = ContractReminderItem {
            id: 7,
            contract_number: "Test7".to_string(),
            contract_version: 2,
            last_email_reminder_sent: None,
        };

        let identifier = ContractIdentifier::from(&item);

        assert_eq!(identifier.id, 7);
        assert_eq!(identifier.contract_number, "Test7");
        assert_eq!(identifier.contract_version, 2);
    }

    #[test]
    fn reminder_query_defaults_match_the_api() {
        let query = ReminderQuery::default();

        assert_eq!(query.reminder_interval, 14);
        assert_eq!(query.page, 1);
        assert_eq!(query.count, 10);
        assert_eq!(query.sort.to_string(), "LastUpdatedAt");
        assert_eq!(query.order.to_string(), "Asc");
    }

    #[test]
    fn reminders_envelope_round_trips_paging() {
        let reminders: ContractReminders = serde_json::from_value(json!({
            "contracts": [
                { "id": 1, "contractNumber": "Test1", "contractVersion": 1 }
            ],
            "paging": {
                "currentPage": 1,
                "pageSize": 10,
                "totalCount": 2,
                "totalPages": 1,
                "hasNextPage": false,
                "hasPreviousPage": false,
                "nextPageUrl": "",
                "previousPageUrl": ""
            }
        }))
        .unwrap();

        assert_eq!(reminders.contracts.len(), 1);
        assert_eq!(reminders.paging.total_count, 2);
        assert!(!reminders.paging.has_next_page);
    }
}
