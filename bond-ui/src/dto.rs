use contract_registry::{Contract, TemplateId};
use serde::{Deserialize, Serialize};

/// Tauri wraps every emitted payload in an event object.
#[derive(Clone, Debug, Deserialize)]
pub struct EventEnvelope<T> {
    pub payload: T,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractsUpdatedDto {
    pub subscription_id: String,
    pub template_id: TemplateId,
    pub contracts: Vec<Contract>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionFailedDto {
    pub subscription_id: String,
    pub template_id: TemplateId,
    pub error: String,
}

pub const CONTRACTS_UPDATED: &str = "contracts-updated";
pub const SUBSCRIPTION_FAILED: &str = "subscription-failed";
