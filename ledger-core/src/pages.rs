//! The console's pages: each one is a template plus table configuration.

use crate::dialog::{field, DialogSpec, InputKind};
use crate::dispatcher::ActionSpec;
use crate::table::{columns, ColumnSpec, ContractsTable};
use contract_registry::{Choice, ExerciseCommand, TemplateId};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const BIDDERS_FIELD: &str = "Bidders (separated by commas)";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageId {
    IssuerInvitation,
    CentralBankInvitation,
    CsdInvitation,
    BankRole,
    AuctionAgentRole,
    BidderParticipation,
    Bids,
    PendingSettlementsForBanks,
    PendingSettlementsForIssuer,
    OngoingAuctions,
}

impl PageId {
    pub const ALL: [PageId; 10] = [
        PageId::IssuerInvitation,
        PageId::CentralBankInvitation,
        PageId::CsdInvitation,
        PageId::BankRole,
        PageId::AuctionAgentRole,
        PageId::BidderParticipation,
        PageId::Bids,
        PageId::PendingSettlementsForBanks,
        PageId::PendingSettlementsForIssuer,
        PageId::OngoingAuctions,
    ];

    pub fn title(self) -> &'static str {
        match self {
            PageId::IssuerInvitation => "Issuer invitation",
            PageId::CentralBankInvitation => "Central bank invitation",
            PageId::CsdInvitation => "CSD invitation",
            PageId::BankRole => "Bank role",
            PageId::AuctionAgentRole => "Auction agent role",
            PageId::BidderParticipation => "Bidder participation",
            PageId::Bids => "Bids",
            PageId::PendingSettlementsForBanks => "Pending settlements (banks)",
            PageId::PendingSettlementsForIssuer => "Pending settlements (issuer)",
            PageId::OngoingAuctions => "Ongoing auctions",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            PageId::IssuerInvitation => "issuer-invitation",
            PageId::CentralBankInvitation => "central-bank-invitation",
            PageId::CsdInvitation => "csd-invitation",
            PageId::BankRole => "bank-role",
            PageId::AuctionAgentRole => "auction-agent-role",
            PageId::BidderParticipation => "bidder-participation",
            PageId::Bids => "bids",
            PageId::PendingSettlementsForBanks => "pending-settlements-for-banks",
            PageId::PendingSettlementsForIssuer => "pending-settlements-for-issuer",
            PageId::OngoingAuctions => "ongoing-auctions",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.slug() == slug)
    }

    pub fn template(self) -> TemplateId {
        match self {
            PageId::IssuerInvitation => TemplateId::IssuerRoleInvitation,
            PageId::CentralBankInvitation => TemplateId::CentralBankRoleInvitation,
            PageId::CsdInvitation => TemplateId::CsdRoleInvitation,
            PageId::BankRole => TemplateId::BankRole,
            PageId::AuctionAgentRole => TemplateId::AuctionAgentRole,
            PageId::BidderParticipation => TemplateId::BidderParticipation,
            PageId::Bids => TemplateId::AuctionBid,
            PageId::PendingSettlementsForBanks => TemplateId::AuctionParticipantSettleRequest,
            PageId::PendingSettlementsForIssuer => TemplateId::AuctionSettleRequest,
            PageId::OngoingAuctions => TemplateId::Auction,
        }
    }

    pub fn spec(self) -> PageSpec {
        let (cols, actions, dialogs): (Vec<(&str, &str)>, _, _) = match self {
            PageId::IssuerInvitation => (
                vec![
                    ("Contract Id", "contractId"),
                    ("Issuer", "payload.issuer"),
                    ("Regulators", "payload.regulators"),
                ],
                vec![],
                vec![],
            ),
            PageId::CentralBankInvitation => (
                vec![
                    ("Contract Id", "contractId"),
                    ("Central Bank", "payload.centralBank"),
                    ("Regulators", "payload.regulators"),
                ],
                vec![],
                vec![],
            ),
            PageId::CsdInvitation => (
                vec![
                    ("Contract Id", "contractId"),
                    ("Csd", "payload.csd"),
                    ("Regulators", "payload.regulators"),
                ],
                vec![],
                vec![],
            ),
            PageId::BankRole => (
                vec![
                    ("Contract Id", "contractId"),
                    ("Bank", "payload.bank"),
                    ("Regulators", "payload.regulators"),
                ],
                vec![],
                vec![],
            ),
            PageId::AuctionAgentRole => (
                vec![
                    ("Contract Id", "contractId"),
                    ("Auction Agent", "payload.auctionAgent"),
                    ("Regulators", "payload.regulators"),
                ],
                vec![],
                vec![],
            ),
            PageId::BidderParticipation => (
                vec![
                    ("Contract Id", "contractId"),
                    ("Auction Agent", "payload.auctionAgent"),
                    ("Auction Name", "payload.auctionName"),
                    ("Bidder", "payload.bidder"),
                    ("Issuer", "payload.issuer"),
                    ("Size", "payload.size"),
                    ("Start Date", "payload.startDate"),
                    ("End Date", "payload.endDate"),
                ],
                vec![],
                vec![],
            ),
            PageId::Bids => (
                vec![
                    ("Contract Id", "contractId"),
                    ("Auction Agent", "payload.auctionAgent"),
                    ("Auction Name", "payload.auctionName"),
                    ("Bidder", "payload.bidder"),
                    ("Price", "payload.bidData.price"),
                    ("Quantity", "payload.bidData.quantity"),
                ],
                vec![],
                vec![],
            ),
            PageId::PendingSettlementsForBanks => (
                vec![
                    ("Contract Id", "contractId"),
                    ("Seller", "payload.issuer"),
                    ("Auction Name", "payload.auctionName"),
                ],
                vec![ActionSpec::exercise(
                    "Settle",
                    Choice::AuctionParticipantSettleRequestSettle,
                )],
                vec![],
            ),
            PageId::PendingSettlementsForIssuer => (
                vec![
                    ("Contract Id", "contractId"),
                    ("Buyer", "payload.investor"),
                    ("Bond", "payload.issuerBondAssetDeposit.asset.id.label"),
                    ("Quantity", "payload.issuerBondAssetDeposit.asset.quantity"),
                    (
                        "Price",
                        "payload.cashAmountToPay / payload.issuerBondAssetDeposit.asset.quantity",
                    ),
                    ("Consideration", "payload.cashAmountToPay"),
                    ("Currency", "payload.cashAssetId.label"),
                ],
                vec![],
                vec![],
            ),
            PageId::OngoingAuctions => (
                vec![
                    ("Contract Id", "contractId"),
                    ("Auction Name", "payload.auctionName"),
                    ("Issuer", "payload.issuer"),
                    ("Asset", "payload.bondBundleData.assetLabel"),
                    ("Size", "payload.size"),
                    ("From", "payload.startDate"),
                    ("To", "payload.endDate"),
                    ("Min Price", "payload.minPrice"),
                    ("Auction Agent", "payload.auctionAgent"),
                ],
                vec![ActionSpec::exercise("Finalize", Choice::AuctionFinalize)],
                vec![invite_bidders()],
            ),
        };
        PageSpec {
            id: self,
            template: self.template(),
            columns: columns(&cols),
            actions,
            dialogs,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

fn invite_bidders() -> DialogSpec {
    DialogSpec::new(
        "Invite bidders",
        vec![field(BIDDERS_FIELD, InputKind::List)],
        |contract, params| {
            Ok(ExerciseCommand::new(
                Choice::AuctionInviteBidders,
                contract.contract_id.clone(),
                serde_json::json!({ "bidders": params.list(BIDDERS_FIELD)? }),
            ))
        },
    )
}

#[derive(Clone, Debug)]
pub struct PageSpec {
    pub id: PageId,
    pub template: TemplateId,
    pub columns: Vec<ColumnSpec>,
    pub actions: Vec<ActionSpec>,
    pub dialogs: Vec<DialogSpec>,
}

impl PageSpec {
    pub fn table(&self) -> ContractsTable {
        ContractsTable::new(self.columns.clone())
            .with_actions(self.actions.clone())
            .with_dialogs(self.dialogs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::Cell;
    use contract_registry::{Contract, ContractId};
    use serde_json::json;

    #[test]
    fn every_page_binds_its_own_template() {
        let mut seen: Vec<_> = PageId::ALL.iter().map(|p| p.template()).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), PageId::ALL.len());
        for page in PageId::ALL {
            assert_eq!(PageId::from_slug(page.slug()), Some(page));
            assert_eq!(page.spec().template, page.template());
        }
        assert_eq!(PageId::from_slug("nope"), None);
    }

    #[test]
    fn issuer_settlement_price_is_computed() {
        let mut table = PageId::PendingSettlementsForIssuer.spec().table();
        table.replace_rows(vec![Contract::new(
            "#5:0",
            TemplateId::AuctionSettleRequest,
            json!({
                "investor": "Bank1",
                "issuerBondAssetDeposit": {"asset": {"id": {"label": "BOND-007"}, "quantity": "40"}},
                "cashAmountToPay": "4000.0",
                "cashAssetId": {"label": "EUR"}
            }),
        )]);
        let view = table.view();
        let cells: Vec<_> = view.rows()[0].cells.iter().map(Cell::to_string).collect();
        assert_eq!(
            cells,
            vec!["#5:0", "Bank1", "BOND-007", "40", "100", "4000.0", "EUR"]
        );
    }

    #[test]
    fn ongoing_auctions_offer_finalize_and_invite() {
        let spec = PageId::OngoingAuctions.spec();
        assert_eq!(spec.actions.len(), 1);
        assert_eq!(spec.dialogs[0].fields[0].label, BIDDERS_FIELD);

        let mut table = spec.table();
        table.replace_rows(vec![Contract::new("#1:0", TemplateId::Auction, json!({}))]);
        table
            .open_dialog(0, &ContractId::new("#1:0"))
            .expect("open dialog");
        table.set_field(BIDDERS_FIELD, "Bank1, Bank2").expect("set");
    }

    #[test]
    fn role_pages_have_no_controls() {
        for page in [PageId::BankRole, PageId::Bids, PageId::IssuerInvitation] {
            let spec = page.spec();
            assert!(spec.actions.is_empty());
            assert!(spec.dialogs.is_empty());
        }
    }
}
