use serde::Serialize;

pub const TRIGGER_MODULE_PREFIX: &str = "DA.RefApps.Bond.Triggers.";

/// One automation to run on behalf of one party.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerSpec {
    pub party: &'static str,
    /// `Module:value`, relative to [`TRIGGER_MODULE_PREFIX`].
    pub trigger: &'static str,
}

const fn spec(party: &'static str, trigger: &'static str) -> TriggerSpec {
    TriggerSpec { party, trigger }
}

pub const TRIGGERS: [TriggerSpec; 10] = [
    spec("Bank1", "InvestorSettlementTrigger:investorSettlementTrigger"),
    spec("Bank1", "PlaceBidTrigger:placeBidTrigger"),
    spec("Bank2", "InvestorSettlementTrigger:investorSettlementTrigger"),
    spec("Bank2", "PlaceBidTrigger:placeBidTrigger"),
    spec("Bank3", "InvestorSettlementTrigger:investorSettlementTrigger"),
    spec("Bank3", "PlaceBidTrigger:placeBidTrigger"),
    spec("Issuer", "CommissionTrigger:commissionTrigger"),
    spec("Issuer", "RedemptionFinalizeTrigger:redemptionFinalizeTrigger"),
    spec("AuctionAgent", "AuctionFinalizeTrigger:auctionFinalizeTrigger"),
    spec("Csd", "RedemptionCalculationTrigger:redemptionCalculationTrigger"),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub trigger_name: String,
    pub party: String,
}

impl TriggerSpec {
    pub fn registration(&self, package_id: &str) -> Registration {
        Registration {
            trigger_name: format!("{package_id}:{TRIGGER_MODULE_PREFIX}{}", self.trigger),
            party: self.party.to_string(),
        }
    }
}
