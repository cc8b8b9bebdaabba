use futures::channel::oneshot;
use futures::{FutureExt, StreamExt};
use ledger_core::dialog::DialogError;
use ledger_core::dispatcher::Dispatch;
use ledger_core::ledger::{CommandFuture, ContractStream, LedgerCommand, LedgerError, LedgerQuery};
use ledger_core::pages::{PageId, BIDDERS_FIELD};
use ledger_core::projector::Cell;
use ledger_core::sandbox::SandboxLedger;
use ledger_core::table::{columns, ContractsTable, TableBody, TableHandle, TableView, EMPTY_STATE};
use ledger_core::{ContractId, ExerciseCommand, TemplateId};
use serde_json::json;
use std::cell::{Cell as StdCell, RefCell};
use std::rc::Rc;

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

fn record(handle: &TableHandle) -> Rc<RefCell<Vec<TableView>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    handle.set_listener(move |view| sink.borrow_mut().push(view.clone()));
    seen
}

fn mount(handle: &TableHandle, ledger: &SandboxLedger, template: TemplateId) {
    let handle = handle.clone();
    let ledger = ledger.clone();
    tokio::task::spawn_local(async move { handle.drive(&ledger, template).await });
}

fn auction_payload(name: &str) -> serde_json::Value {
    json!({
        "auctionAgent": "AuctionAgent",
        "auctionName": name,
        "issuer": "Issuer",
        "bondBundleData": {"assetLabel": "BOND-007"},
        "size": "50000.0",
        "startDate": "2019-01-02",
        "endDate": "2019-01-05",
        "minPrice": "40.0"
    })
}

/// Holds every exercise until the test releases it.
#[derive(Default)]
struct GatedLedger {
    calls: StdCell<usize>,
    gates: RefCell<Vec<oneshot::Sender<Result<serde_json::Value, LedgerError>>>>,
}

impl GatedLedger {
    fn release(&self, outcome: Result<serde_json::Value, LedgerError>) {
        let gate = self.gates.borrow_mut().remove(0);
        gate.send(outcome).expect("invoke still waiting");
    }
}

impl LedgerCommand for GatedLedger {
    fn exercise(&self, _command: ExerciseCommand) -> CommandFuture {
        self.calls.set(self.calls.get() + 1);
        let (tx, rx) = oneshot::channel();
        self.gates.borrow_mut().push(tx);
        rx.map(|r| r.unwrap_or_else(|_| Err(LedgerError::Transport("gate dropped".into()))))
            .boxed_local()
    }
}

#[tokio::test]
async fn live_query_renders_rows() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let ledger = SandboxLedger::new();
            ledger.create(TemplateId::Auction, json!({"size": 100}));

            let handle = TableHandle::new(ContractsTable::new(columns(&[
                ("Contract Id", "contractId"),
                ("Size", "payload.size"),
            ])));
            let seen = record(&handle);
            mount(&handle, &ledger, TemplateId::Auction);
            settle().await;

            let view = seen.borrow().last().cloned().expect("rendered");
            assert_eq!(view.rows().len(), 1);
            assert_eq!(
                view.rows()[0].cells,
                vec![Cell::Text("#1:0".into()), Cell::Text("100".into())]
            );

            let second = ledger.create(TemplateId::Auction, json!({"size": 7}));
            settle().await;
            assert_eq!(handle.view().rows().len(), 2);

            ledger.archive(&second).expect("archive");
            ledger.archive(&ContractId::new("#1:0")).expect("archive");
            settle().await;
            assert_eq!(handle.view().body, TableBody::Empty(EMPTY_STATE.into()));
        })
        .await;
}

#[tokio::test]
async fn double_click_sends_one_command() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let sandbox = SandboxLedger::new();
            let id = sandbox.create(TemplateId::Auction, auction_payload("a"));
            let handle = TableHandle::new(PageId::OngoingAuctions.spec().table());
            mount(&handle, &sandbox, TemplateId::Auction);
            settle().await;

            let gated = Rc::new(GatedLedger::default());
            let first = {
                let (handle, gated, id) = (handle.clone(), gated.clone(), id.clone());
                tokio::task::spawn_local(async move { handle.invoke(&gated, 0, &id).await })
            };
            settle().await;
            assert!(handle.view().rows()[0].controls[0].busy);

            assert_eq!(handle.invoke(&gated, 0, &id).await, Dispatch::AlreadyPending);
            assert_eq!(gated.calls.get(), 1);

            gated.release(Ok(json!({})));
            assert_eq!(first.await.expect("join"), Dispatch::Sent);
            assert!(!handle.view().rows()[0].controls[0].busy);
            assert!(handle.view().notices.is_empty());
        })
        .await;
}

#[tokio::test]
async fn failed_command_posts_notice_and_row_can_retry() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let ledger = SandboxLedger::new();
            let id = ledger.create(
                TemplateId::AuctionParticipantSettleRequest,
                json!({"issuer": "Issuer", "auctionName": "a"}),
            );
            let handle = TableHandle::new(PageId::PendingSettlementsForBanks.spec().table());
            mount(&handle, &ledger, TemplateId::AuctionParticipantSettleRequest);
            settle().await;

            ledger.reject_next(LedgerError::Rejected("not a signatory".into()));
            let outcome = handle.invoke(&ledger, 0, &id).await;
            assert_eq!(
                outcome,
                Dispatch::Failed(LedgerError::Rejected("not a signatory".into()))
            );
            let notices = handle.view().notices;
            assert_eq!(notices.len(), 1);
            assert!(notices[0].message.starts_with("Settle failed for #1:0"));
            assert_eq!(handle.view().rows().len(), 1);

            assert!(handle.dismiss_notice(notices[0].id));
            assert_eq!(handle.invoke(&ledger, 0, &id).await, Dispatch::Sent);
            settle().await;
            assert_eq!(handle.view().body, TableBody::Empty(EMPTY_STATE.into()));
            assert!(handle.view().notices.is_empty());

            assert_eq!(handle.invoke(&ledger, 0, &id).await, Dispatch::UnknownRow);
        })
        .await;
}

#[tokio::test]
async fn invite_dialog_passes_normalized_list() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let ledger = SandboxLedger::new();
            let id = ledger.create(TemplateId::Auction, auction_payload("spring"));
            let handle = TableHandle::new(PageId::OngoingAuctions.spec().table());
            mount(&handle, &ledger, TemplateId::Auction);
            settle().await;

            handle.open_dialog(0, &id).expect("open");
            handle.set_field(BIDDERS_FIELD, "A, B,  C").expect("set");
            assert_eq!(handle.submit_dialog(&ledger).await, Ok(Dispatch::Sent));
            assert!(handle.view().dialog.is_none());

            let exercised = ledger.exercised();
            assert_eq!(exercised.len(), 1);
            assert_eq!(exercised[0].choice, "Auction_InviteBidders");
            assert_eq!(exercised[0].argument, json!({"bidders": ["A", "B", "C"]}));
            assert_eq!(ledger.active(TemplateId::BidderParticipation).len(), 3);
        })
        .await;
}

#[tokio::test]
async fn empty_dialog_field_blocks_submit() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let ledger = SandboxLedger::new();
            let id = ledger.create(TemplateId::Auction, auction_payload("spring"));
            let handle = TableHandle::new(PageId::OngoingAuctions.spec().table());
            mount(&handle, &ledger, TemplateId::Auction);
            settle().await;

            handle.open_dialog(0, &id).expect("open");
            handle.set_field(BIDDERS_FIELD, " , ").expect("set");
            assert_eq!(
                handle.submit_dialog(&ledger).await,
                Err(DialogError::MissingField(BIDDERS_FIELD.into()))
            );

            let dialog = handle.view().dialog.expect("still open");
            assert_eq!(dialog.fields[0].value, " , ");
            assert!(dialog.error.is_some());
            assert!(ledger.exercised().is_empty());

            handle.cancel_dialog();
            assert!(handle.view().dialog.is_none());
            assert_eq!(handle.submit_dialog(&ledger).await, Err(DialogError::NotOpen));
        })
        .await;
}

#[tokio::test]
async fn unmount_stops_rendering_and_drops_late_results() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let sandbox = SandboxLedger::new();
            let id = sandbox.create(TemplateId::Auction, auction_payload("a"));
            let handle = TableHandle::new(PageId::OngoingAuctions.spec().table());
            let seen = record(&handle);
            mount(&handle, &sandbox, TemplateId::Auction);
            settle().await;
            assert_eq!(sandbox.subscriber_count(), 1);

            let gated = Rc::new(GatedLedger::default());
            let pending = {
                let (handle, gated, id) = (handle.clone(), gated.clone(), id.clone());
                tokio::task::spawn_local(async move { handle.invoke(&gated, 0, &id).await })
            };
            settle().await;

            handle.unmount();
            settle().await;
            let renders = seen.borrow().len();
            assert_eq!(sandbox.subscriber_count(), 0);

            sandbox.create(TemplateId::Auction, auction_payload("b"));
            gated.release(Err(LedgerError::Transport("connection reset".into())));
            assert_eq!(pending.await.expect("join"), Dispatch::Discarded);
            settle().await;

            assert_eq!(seen.borrow().len(), renders);
            assert!(handle.view().notices.is_empty());
            assert_eq!(handle.invoke(&sandbox, 0, &id).await, Dispatch::Discarded);
        })
        .await;
}

#[tokio::test]
async fn subscription_error_clears_rows() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let ledger = SandboxLedger::new();
            ledger.create(TemplateId::Auction, auction_payload("a"));
            let handle = TableHandle::new(PageId::OngoingAuctions.spec().table());
            mount(&handle, &ledger, TemplateId::Auction);
            settle().await;
            assert_eq!(handle.view().rows().len(), 1);

            ledger.fail_subscriptions(
                TemplateId::Auction,
                LedgerError::Transport("stream closed".into()),
            );
            settle().await;
            assert_eq!(handle.view().body, TableBody::Empty(EMPTY_STATE.into()));

            ledger.create(TemplateId::Auction, auction_payload("b"));
            settle().await;
            assert_eq!(handle.view().rows().len(), 2);
        })
        .await;
}

#[tokio::test]
async fn dialog_command_in_flight_cannot_be_reopened() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let sandbox = SandboxLedger::new();
            let id = sandbox.create(TemplateId::Auction, auction_payload("spring"));
            let handle = TableHandle::new(PageId::OngoingAuctions.spec().table());
            mount(&handle, &sandbox, TemplateId::Auction);
            settle().await;

            let gated = Rc::new(GatedLedger::default());
            handle.open_dialog(0, &id).expect("open");
            handle.set_field(BIDDERS_FIELD, "Bank1").expect("set");
            let first = {
                let (handle, gated) = (handle.clone(), gated.clone());
                tokio::task::spawn_local(async move { handle.submit_dialog(&gated).await })
            };
            settle().await;
            assert!(handle.view().dialog.is_none());
            assert!(handle.view().rows()[0].controls[1].busy);

            let reopened = handle.open_dialog(0, &id);
            assert!(matches!(reopened, Err(DialogError::InFlight { .. })));
            assert!(handle.view().dialog.is_none());
            assert_eq!(gated.calls.get(), 1);

            gated.release(Ok(json!([])));
            assert_eq!(first.await.expect("join"), Ok(Dispatch::Sent));
            assert!(!handle.view().rows()[0].controls[1].busy);
            handle.open_dialog(0, &id).expect("open again once settled");
        })
        .await;
}

#[tokio::test]
async fn failed_dialog_command_posts_notice() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let ledger = SandboxLedger::new();
            let id = ledger.create(TemplateId::Auction, auction_payload("spring"));
            let handle = TableHandle::new(PageId::OngoingAuctions.spec().table());
            mount(&handle, &ledger, TemplateId::Auction);
            settle().await;

            ledger.reject_next(LedgerError::Rejected("auction closed".into()));
            handle.open_dialog(0, &id).expect("open");
            handle.set_field(BIDDERS_FIELD, "Bank1, Bank2").expect("set");
            assert_eq!(
                handle.submit_dialog(&ledger).await,
                Ok(Dispatch::Failed(LedgerError::Rejected("auction closed".into())))
            );

            let view = handle.view();
            assert!(view.dialog.is_none());
            assert_eq!(view.notices.len(), 1);
            assert!(view.notices[0].message.starts_with("Invite bidders failed for #1:0"));
            assert!(!view.rows()[0].controls[1].busy);
            assert!(ledger.active(TemplateId::BidderParticipation).is_empty());
        })
        .await;
}

/// Delivers one empty active set, then ends.
struct OneShotQuery;

impl LedgerQuery for OneShotQuery {
    fn stream_query(&self, _template: TemplateId) -> ContractStream {
        futures::stream::iter(vec![Ok(Vec::new())]).boxed_local()
    }
}

#[tokio::test]
async fn finished_subscription_releases_its_handle() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let handle = TableHandle::new(PageId::OngoingAuctions.spec().table());
            for _ in 0..3 {
                handle.drive(&OneShotQuery, TemplateId::Auction).await;
            }
            assert_eq!(handle.subscription_count(), 0);

            let sandbox = SandboxLedger::new();
            mount(&handle, &sandbox, TemplateId::Auction);
            settle().await;
            assert_eq!(handle.subscription_count(), 1);

            handle.unmount();
            settle().await;
            assert_eq!(handle.subscription_count(), 0);
            assert_eq!(sandbox.subscriber_count(), 0);
        })
        .await;
}
