mod payloads;
mod templates;

pub use payloads::{
    Asset, AssetDeposit, AssetId, Auction, AuctionAgentRole, AuctionBid,
    AuctionParticipantSettleRequest, AuctionSettleRequest, BankRole, BidData, BidderParticipation,
    BondBundleData, BondContract, CentralBankRoleInvitation, CsdRoleInvitation, Decimal,
    IssuerRoleInvitation,
};
pub use templates::{Choice, ExerciseCommand, TemplateId};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
    #[error("payload does not match {template}: {reason}")]
    Payload { template: TemplateId, reason: String },
    #[error("invalid decimal '{0}'")]
    Decimal(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(String);

impl ContractId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContractId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ContractId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One active contract as delivered by the ledger.
///
/// The payload stays untyped so a single table can render any template;
/// [`Contract::typed`] recovers the template-specific record when needed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub contract_id: ContractId,
    pub template_id: TemplateId,
    pub payload: serde_json::Value,
}

impl Contract {
    pub fn new(
        contract_id: impl Into<ContractId>,
        template_id: TemplateId,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            contract_id: contract_id.into(),
            template_id,
            payload,
        }
    }

    pub fn typed(&self) -> Result<BondContract, RegistryError> {
        BondContract::decode(self.template_id, &self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_reads_json_api_shape() {
        let raw = serde_json::json!({
            "contractId": "#12:0",
            "templateId": "d2b8f1:DA.RefApps.Bond.Roles.BankRole:BankRole",
            "payload": {"bank": "Bank1", "regulators": ["Regulator"]},
            "signatories": ["Bank1"],
            "observers": []
        });
        let contract: Contract = serde_json::from_value(raw).expect("contract");
        assert_eq!(contract.contract_id.as_str(), "#12:0");
        assert_eq!(contract.template_id, TemplateId::BankRole);

        let BondContract::BankRole(role) = contract.typed().expect("typed") else {
            panic!("expected bank role");
        };
        assert_eq!(role.bank, "Bank1");
        assert_eq!(role.regulators, vec!["Regulator"]);
    }

    #[test]
    fn typed_reports_schema_mismatch() {
        let contract = Contract::new(
            "#1:0",
            TemplateId::AuctionBid,
            serde_json::json!({"auctionName": "A"}),
        );
        let err = contract.typed().expect_err("mismatch");
        assert!(matches!(
            err,
            RegistryError::Payload {
                template: TemplateId::AuctionBid,
                ..
            }
        ));
    }
}
