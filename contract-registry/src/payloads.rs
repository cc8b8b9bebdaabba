use crate::{RegistryError, TemplateId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger decimal. The JSON API sends numerics as strings; fixtures often
/// use plain numbers, so both are accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "String")]
pub struct Decimal(String);

impl Decimal {
    pub fn as_f64(&self) -> f64 {
        // Validated on construction.
        self.0.parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<serde_json::Value> for Decimal {
    type Error = RegistryError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Number(n) => Ok(Self(n.to_string())),
            serde_json::Value::String(s) if s.trim().parse::<f64>().is_ok() => {
                Ok(Self(s.trim().to_string()))
            }
            other => Err(RegistryError::Decimal(other.to_string())),
        }
    }
}

impl From<Decimal> for String {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerRoleInvitation {
    pub issuer: String,
    pub regulators: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CentralBankRoleInvitation {
    pub central_bank: String,
    pub regulators: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsdRoleInvitation {
    pub csd: String,
    pub regulators: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankRole {
    pub bank: String,
    pub regulators: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionAgentRole {
    pub auction_agent: String,
    pub regulators: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BondBundleData {
    pub asset_label: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub auction_agent: String,
    pub auction_name: String,
    pub issuer: String,
    pub bond_bundle_data: BondBundleData,
    pub size: Decimal,
    pub start_date: String,
    pub end_date: String,
    pub min_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidderParticipation {
    pub auction_agent: String,
    pub auction_name: String,
    pub bidder: String,
    pub issuer: String,
    pub size: Decimal,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidData {
    pub price: Decimal,
    pub quantity: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionBid {
    pub auction_agent: String,
    pub auction_name: String,
    pub bidder: String,
    pub bid_data: BidData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionParticipantSettleRequest {
    pub issuer: String,
    pub auction_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetId {
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: AssetId,
    pub quantity: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDeposit {
    pub asset: Asset,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionSettleRequest {
    pub investor: String,
    pub issuer_bond_asset_deposit: AssetDeposit,
    pub cash_amount_to_pay: Decimal,
    pub cash_asset_id: AssetId,
}

/// Typed view of a contract, one variant per template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "template", content = "payload")]
pub enum BondContract {
    IssuerRoleInvitation(IssuerRoleInvitation),
    CentralBankRoleInvitation(CentralBankRoleInvitation),
    CsdRoleInvitation(CsdRoleInvitation),
    BankRole(BankRole),
    AuctionAgentRole(AuctionAgentRole),
    Auction(Auction),
    BidderParticipation(BidderParticipation),
    AuctionBid(AuctionBid),
    AuctionParticipantSettleRequest(AuctionParticipantSettleRequest),
    AuctionSettleRequest(AuctionSettleRequest),
}

impl BondContract {
    pub fn template_id(&self) -> TemplateId {
        match self {
            BondContract::IssuerRoleInvitation(_) => TemplateId::IssuerRoleInvitation,
            BondContract::CentralBankRoleInvitation(_) => TemplateId::CentralBankRoleInvitation,
            BondContract::CsdRoleInvitation(_) => TemplateId::CsdRoleInvitation,
            BondContract::BankRole(_) => TemplateId::BankRole,
            BondContract::AuctionAgentRole(_) => TemplateId::AuctionAgentRole,
            BondContract::Auction(_) => TemplateId::Auction,
            BondContract::BidderParticipation(_) => TemplateId::BidderParticipation,
            BondContract::AuctionBid(_) => TemplateId::AuctionBid,
            BondContract::AuctionParticipantSettleRequest(_) => {
                TemplateId::AuctionParticipantSettleRequest
            }
            BondContract::AuctionSettleRequest(_) => TemplateId::AuctionSettleRequest,
        }
    }

    pub fn decode(template: TemplateId, payload: &serde_json::Value) -> Result<Self, RegistryError> {
        fn parse<T: serde::de::DeserializeOwned>(
            template: TemplateId,
            payload: &serde_json::Value,
        ) -> Result<T, RegistryError> {
            T::deserialize(payload).map_err(|e| RegistryError::Payload {
                template,
                reason: e.to_string(),
            })
        }

        Ok(match template {
            TemplateId::IssuerRoleInvitation => {
                BondContract::IssuerRoleInvitation(parse(template, payload)?)
            }
            TemplateId::CentralBankRoleInvitation => {
                BondContract::CentralBankRoleInvitation(parse(template, payload)?)
            }
            TemplateId::CsdRoleInvitation => BondContract::CsdRoleInvitation(parse(template, payload)?),
            TemplateId::BankRole => BondContract::BankRole(parse(template, payload)?),
            TemplateId::AuctionAgentRole => BondContract::AuctionAgentRole(parse(template, payload)?),
            TemplateId::Auction => BondContract::Auction(parse(template, payload)?),
            TemplateId::BidderParticipation => {
                BondContract::BidderParticipation(parse(template, payload)?)
            }
            TemplateId::AuctionBid => BondContract::AuctionBid(parse(template, payload)?),
            TemplateId::AuctionParticipantSettleRequest => {
                BondContract::AuctionParticipantSettleRequest(parse(template, payload)?)
            }
            TemplateId::AuctionSettleRequest => {
                BondContract::AuctionSettleRequest(parse(template, payload)?)
            }
        })
    }

    pub fn to_payload(&self) -> serde_json::Value {
        let value = match self {
            BondContract::IssuerRoleInvitation(p) => serde_json::to_value(p),
            BondContract::CentralBankRoleInvitation(p) => serde_json::to_value(p),
            BondContract::CsdRoleInvitation(p) => serde_json::to_value(p),
            BondContract::BankRole(p) => serde_json::to_value(p),
            BondContract::AuctionAgentRole(p) => serde_json::to_value(p),
            BondContract::Auction(p) => serde_json::to_value(p),
            BondContract::BidderParticipation(p) => serde_json::to_value(p),
            BondContract::AuctionBid(p) => serde_json::to_value(p),
            BondContract::AuctionParticipantSettleRequest(p) => serde_json::to_value(p),
            BondContract::AuctionSettleRequest(p) => serde_json::to_value(p),
        };
        // Plain structs of strings never fail to serialize.
        value.unwrap_or(serde_json::Value::Null)
    }
}
