use crate::{ContractId, RegistryError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Contract templates of the bond issuance model, keyed by qualified name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TemplateId {
    IssuerRoleInvitation,
    CentralBankRoleInvitation,
    CsdRoleInvitation,
    BankRole,
    AuctionAgentRole,
    Auction,
    BidderParticipation,
    AuctionBid,
    AuctionParticipantSettleRequest,
    AuctionSettleRequest,
}

impl TemplateId {
    pub const ALL: [TemplateId; 10] = [
        TemplateId::IssuerRoleInvitation,
        TemplateId::CentralBankRoleInvitation,
        TemplateId::CsdRoleInvitation,
        TemplateId::BankRole,
        TemplateId::AuctionAgentRole,
        TemplateId::Auction,
        TemplateId::BidderParticipation,
        TemplateId::AuctionBid,
        TemplateId::AuctionParticipantSettleRequest,
        TemplateId::AuctionSettleRequest,
    ];

    pub fn module(self) -> &'static str {
        match self {
            TemplateId::IssuerRoleInvitation => "DA.RefApps.Bond.Roles.IssuerRole",
            TemplateId::CentralBankRoleInvitation => "DA.RefApps.Bond.Roles.CentralBankRole",
            TemplateId::CsdRoleInvitation => "DA.RefApps.Bond.Roles.CsdRole",
            TemplateId::BankRole => "DA.RefApps.Bond.Roles.BankRole",
            TemplateId::AuctionAgentRole => "DA.RefApps.Bond.Roles.AuctionAgentRole",
            TemplateId::Auction
            | TemplateId::BidderParticipation
            | TemplateId::AuctionBid
            | TemplateId::AuctionParticipantSettleRequest => "DA.RefApps.Bond.Auction",
            TemplateId::AuctionSettleRequest => "DA.RefApps.Bond.Settlement",
        }
    }

    pub fn entity(self) -> &'static str {
        match self {
            TemplateId::IssuerRoleInvitation => "IssuerRoleInvitation",
            TemplateId::CentralBankRoleInvitation => "CentralBankRoleInvitation",
            TemplateId::CsdRoleInvitation => "CsdRoleInvitation",
            TemplateId::BankRole => "BankRole",
            TemplateId::AuctionAgentRole => "AuctionAgentRole",
            TemplateId::Auction => "Auction",
            TemplateId::BidderParticipation => "BidderParticipation",
            TemplateId::AuctionBid => "AuctionBid",
            TemplateId::AuctionParticipantSettleRequest => "AuctionParticipantSettleRequest",
            TemplateId::AuctionSettleRequest => "AuctionSettleRequest",
        }
    }

    pub fn qualified_name(self) -> String {
        format!("{}:{}", self.module(), self.entity())
    }

    /// Accepts `Module:Entity` and the ledger's `packageId:Module:Entity` form.
    pub fn parse(value: &str) -> Result<Self, RegistryError> {
        let mut parts = value.rsplitn(3, ':');
        let entity = parts.next().unwrap_or_default();
        let module = parts.next().unwrap_or_default();

        Self::ALL
            .into_iter()
            .find(|t| t.entity() == entity && t.module() == module)
            .ok_or_else(|| RegistryError::UnknownTemplate(value.to_string()))
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module(), self.entity())
    }
}

impl TryFrom<String> for TemplateId {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TemplateId> for String {
    fn from(value: TemplateId) -> Self {
        value.qualified_name()
    }
}

/// Choices the console exercises.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    AuctionFinalize,
    AuctionInviteBidders,
    AuctionParticipantSettleRequestSettle,
}

impl Choice {
    pub const ALL: [Choice; 3] = [
        Choice::AuctionFinalize,
        Choice::AuctionInviteBidders,
        Choice::AuctionParticipantSettleRequestSettle,
    ];

    pub fn template(self) -> TemplateId {
        match self {
            Choice::AuctionFinalize | Choice::AuctionInviteBidders => TemplateId::Auction,
            Choice::AuctionParticipantSettleRequestSettle => {
                TemplateId::AuctionParticipantSettleRequest
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Choice::AuctionFinalize => "Auction_Finalize",
            Choice::AuctionInviteBidders => "Auction_InviteBidders",
            Choice::AuctionParticipantSettleRequestSettle => {
                "AuctionParticipantSettleRequest_Settle"
            }
        }
    }

    pub fn lookup(template: TemplateId, name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.template() == template && c.name() == name)
    }
}

/// A single exercise request. Serializes to the ledger JSON API body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseCommand {
    pub template_id: TemplateId,
    pub contract_id: ContractId,
    pub choice: String,
    pub argument: serde_json::Value,
}

impl ExerciseCommand {
    pub fn new(choice: Choice, contract_id: ContractId, argument: serde_json::Value) -> Self {
        Self {
            template_id: choice.template(),
            contract_id,
            choice: choice.name().to_string(),
            argument,
        }
    }
}
