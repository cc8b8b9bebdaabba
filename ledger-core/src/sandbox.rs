//! An in-memory ledger for tests and the desktop demo.

use crate::ledger::{CommandFuture, ContractStream, LedgerCommand, LedgerError, LedgerQuery};
use contract_registry::{
    BidderParticipation, BondContract, Choice, Contract, ContractId, ExerciseCommand, TemplateId,
};
use futures::channel::mpsc;
use futures::{FutureExt, StreamExt};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

type Update = Result<Vec<Contract>, LedgerError>;

#[derive(Default)]
struct Sandbox {
    next_id: u64,
    active: Vec<Contract>,
    subscribers: Vec<(TemplateId, mpsc::UnboundedSender<Update>)>,
    exercised: Vec<ExerciseCommand>,
    reject_next: Option<LedgerError>,
}

impl Sandbox {
    fn snapshot(&self, template: TemplateId) -> Vec<Contract> {
        self.active
            .iter()
            .filter(|c| c.template_id == template)
            .cloned()
            .collect()
    }

    fn broadcast(&mut self, template: TemplateId) {
        let snapshot = self.snapshot(template);
        self.subscribers.retain(|(t, tx)| {
            if *t != template {
                return !tx.is_closed();
            }
            tx.unbounded_send(Ok(snapshot.clone())).is_ok()
        });
    }

    fn create(&mut self, template: TemplateId, payload: Value) -> ContractId {
        self.next_id += 1;
        let id = ContractId::new(format!("#{}:0", self.next_id));
        self.active.push(Contract::new(id.clone(), template, payload));
        self.broadcast(template);
        id
    }

    fn archive(&mut self, id: &ContractId) -> Result<Contract, LedgerError> {
        let index = self
            .active
            .iter()
            .position(|c| &c.contract_id == id)
            .ok_or_else(|| LedgerError::UnknownContract(id.clone()))?;
        let archived = self.active.remove(index);
        self.broadcast(archived.template_id);
        Ok(archived)
    }

    fn exercise(&mut self, command: ExerciseCommand) -> Result<Value, LedgerError> {
        if let Some(err) = self.reject_next.take() {
            return Err(err);
        }
        let contract = self
            .active
            .iter()
            .find(|c| c.contract_id == command.contract_id)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownContract(command.contract_id.clone()))?;
        if contract.template_id != command.template_id {
            return Err(LedgerError::Rejected(format!(
                "{} is a {}, not a {}",
                contract.contract_id, contract.template_id, command.template_id
            )));
        }
        let choice = Choice::lookup(command.template_id, &command.choice).ok_or_else(|| {
            LedgerError::Rejected(format!(
                "unknown choice {} on {}",
                command.choice, command.template_id
            ))
        })?;

        let result = match choice {
            Choice::AuctionFinalize | Choice::AuctionParticipantSettleRequestSettle => {
                self.archive(&contract.contract_id)?;
                json!({})
            }
            Choice::AuctionInviteBidders => {
                let created = self.invite_bidders(&contract, &command.argument)?;
                json!(created)
            }
        };
        self.exercised.push(command);
        Ok(result)
    }

    fn invite_bidders(
        &mut self,
        auction: &Contract,
        argument: &Value,
    ) -> Result<Vec<ContractId>, LedgerError> {
        let Ok(BondContract::Auction(auction)) = auction.typed() else {
            return Err(LedgerError::Rejected(format!(
                "{} does not hold a valid auction",
                auction.contract_id
            )));
        };
        let bidders: Vec<String> = argument
            .get("bidders")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| LedgerError::Rejected(format!("bad bidders argument: {e}")))?
            .ok_or_else(|| LedgerError::Rejected("missing bidders argument".into()))?;

        let mut created = Vec::with_capacity(bidders.len());
        for bidder in bidders {
            let participation = BidderParticipation {
                auction_agent: auction.auction_agent.clone(),
                auction_name: auction.auction_name.clone(),
                bidder,
                issuer: auction.issuer.clone(),
                size: auction.size.clone(),
                start_date: auction.start_date.clone(),
                end_date: auction.end_date.clone(),
            };
            let payload = serde_json::to_value(&participation)
                .map_err(|e| LedgerError::Protocol(e.to_string()))?;
            created.push(self.create(TemplateId::BidderParticipation, payload));
        }
        Ok(created)
    }
}

/// Single-threaded ledger that keeps the active contract set in memory and
/// pushes the full set of a template to its live queries on every change.
#[derive(Clone, Default)]
pub struct SandboxLedger {
    inner: Rc<RefCell<Sandbox>>,
}

impl SandboxLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, template: TemplateId, payload: Value) -> ContractId {
        self.inner.borrow_mut().create(template, payload)
    }

    pub fn archive(&self, id: &ContractId) -> Result<Contract, LedgerError> {
        self.inner.borrow_mut().archive(id)
    }

    pub fn active(&self, template: TemplateId) -> Vec<Contract> {
        self.inner.borrow().snapshot(template)
    }

    /// Live queries that still have a reader.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.borrow_mut();
        inner.subscribers.retain(|(_, tx)| !tx.is_closed());
        inner.subscribers.len()
    }

    pub fn exercised(&self) -> Vec<ExerciseCommand> {
        self.inner.borrow().exercised.clone()
    }

    /// The next exercise fails with `err` without touching any contract.
    pub fn reject_next(&self, err: LedgerError) {
        self.inner.borrow_mut().reject_next = Some(err);
    }

    /// Delivers `err` to every live query on `template`.
    pub fn fail_subscriptions(&self, template: TemplateId, err: LedgerError) {
        let mut inner = self.inner.borrow_mut();
        inner.subscribers.retain(|(t, tx)| {
            if *t != template {
                return !tx.is_closed();
            }
            tx.unbounded_send(Err(err.clone())).is_ok()
        });
    }

    pub fn with_demo_data() -> Self {
        let ledger = Self::new();
        for (template, payload) in demo_contracts() {
            ledger.create(template, payload);
        }
        ledger
    }
}

impl LedgerQuery for SandboxLedger {
    fn stream_query(&self, template: TemplateId) -> ContractStream {
        let (tx, rx) = mpsc::unbounded();
        let mut inner = self.inner.borrow_mut();
        if tx.unbounded_send(Ok(inner.snapshot(template))).is_ok() {
            inner.subscribers.push((template, tx));
        }
        rx.boxed_local()
    }
}

impl LedgerCommand for SandboxLedger {
    fn exercise(&self, command: ExerciseCommand) -> CommandFuture {
        tracing::debug!(contract_id = %command.contract_id, choice = %command.choice, "sandbox exercise");
        let outcome = self.inner.borrow_mut().exercise(command);
        futures::future::ready(outcome).boxed_local()
    }
}

fn demo_contracts() -> Vec<(TemplateId, Value)> {
    vec![
        (
            TemplateId::IssuerRoleInvitation,
            json!({"issuer": "Issuer", "regulators": ["Regulator"]}),
        ),
        (
            TemplateId::CentralBankRoleInvitation,
            json!({"centralBank": "CentralBank", "regulators": ["Regulator"]}),
        ),
        (
            TemplateId::CsdRoleInvitation,
            json!({"csd": "CSD", "regulators": ["Regulator"]}),
        ),
        (
            TemplateId::BankRole,
            json!({"bank": "Bank1", "regulators": ["Regulator"]}),
        ),
        (
            TemplateId::AuctionAgentRole,
            json!({"auctionAgent": "AuctionAgent", "regulators": ["Regulator"]}),
        ),
        (
            TemplateId::Auction,
            json!({
                "auctionAgent": "AuctionAgent",
                "auctionName": "testAuction",
                "issuer": "Issuer",
                "bondBundleData": {"assetLabel": "BOND-007"},
                "size": "50000.0",
                "startDate": "2019-01-02",
                "endDate": "2019-01-05",
                "minPrice": "40.0"
            }),
        ),
        (
            TemplateId::AuctionBid,
            json!({
                "auctionAgent": "AuctionAgent",
                "auctionName": "testAuction",
                "bidder": "Bank1",
                "bidData": {"price": "42.0", "quantity": "20000.0"}
            }),
        ),
        (
            TemplateId::AuctionParticipantSettleRequest,
            json!({"issuer": "Issuer", "auctionName": "testAuction"}),
        ),
        (
            TemplateId::AuctionSettleRequest,
            json!({
                "investor": "Bank1",
                "issuerBondAssetDeposit": {
                    "asset": {"id": {"label": "BOND-007"}, "quantity": "20000.0"}
                },
                "cashAmountToPay": "840000.0",
                "cashAssetId": {"label": "USD"}
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn auction(ledger: &SandboxLedger) -> ContractId {
        ledger.create(
            TemplateId::Auction,
            json!({
                "auctionAgent": "AuctionAgent",
                "auctionName": "spring",
                "issuer": "Issuer",
                "bondBundleData": {"assetLabel": "BOND-1"},
                "size": 1000,
                "startDate": "2020-01-01",
                "endDate": "2020-01-02",
                "minPrice": "10.0"
            }),
        )
    }

    #[test]
    fn stream_starts_with_current_set_and_follows_changes() {
        let ledger = SandboxLedger::new();
        let first = auction(&ledger);
        let mut stream = ledger.stream_query(TemplateId::Auction);

        let initial = block_on(stream.next()).expect("item").expect("ok");
        assert_eq!(initial.len(), 1);

        ledger.archive(&first).expect("archive");
        let after = block_on(stream.next()).expect("item").expect("ok");
        assert!(after.is_empty());
    }

    #[test]
    fn dropped_streams_are_pruned() {
        let ledger = SandboxLedger::new();
        let a = ledger.stream_query(TemplateId::Auction);
        let _b = ledger.stream_query(TemplateId::BankRole);
        assert_eq!(ledger.subscriber_count(), 2);
        drop(a);
        assert_eq!(ledger.subscriber_count(), 1);
    }

    #[test]
    fn invite_bidders_creates_participations() {
        let ledger = SandboxLedger::new();
        let id = auction(&ledger);
        let created = block_on(ledger.exercise(ExerciseCommand::new(
            Choice::AuctionInviteBidders,
            id,
            json!({"bidders": ["Bank1", "Bank2"]}),
        )))
        .expect("exercise");

        assert_eq!(created.as_array().map(Vec::len), Some(2));
        let participations = ledger.active(TemplateId::BidderParticipation);
        let bidders: Vec<_> = participations
            .iter()
            .map(|c| c.payload["bidder"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(bidders, vec!["Bank1", "Bank2"]);
        assert_eq!(participations[0].payload["auctionName"], "spring");
        assert_eq!(ledger.active(TemplateId::Auction).len(), 1);
    }

    #[test]
    fn finalize_archives_and_unknown_contract_is_rejected() {
        let ledger = SandboxLedger::new();
        let id = auction(&ledger);
        let finalize = ExerciseCommand::new(Choice::AuctionFinalize, id.clone(), json!({}));
        block_on(ledger.exercise(finalize.clone())).expect("finalize");
        assert!(ledger.active(TemplateId::Auction).is_empty());
        assert_eq!(
            block_on(ledger.exercise(finalize)),
            Err(LedgerError::UnknownContract(id))
        );
        assert_eq!(ledger.exercised().len(), 1);
    }

    #[test]
    fn reject_next_fails_once() {
        let ledger = SandboxLedger::new();
        let id = auction(&ledger);
        ledger.reject_next(LedgerError::Rejected("boom".into()));
        let cmd = ExerciseCommand::new(Choice::AuctionFinalize, id, json!({}));
        assert!(block_on(ledger.exercise(cmd.clone())).is_err());
        assert!(block_on(ledger.exercise(cmd)).is_ok());
    }

    #[test]
    fn demo_data_covers_every_template() {
        let ledger = SandboxLedger::with_demo_data();
        for template in TemplateId::ALL {
            if template == TemplateId::BidderParticipation {
                continue;
            }
            let active = ledger.active(template);
            assert_eq!(active.len(), 1, "{template}");
            active[0].typed().expect("demo payload decodes");
        }
    }
}
