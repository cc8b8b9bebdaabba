//! The generic contracts table.
//!
//! [`ContractsTable`] is the synchronous state: rows, in-flight commands,
//! notices and the open dialog. [`TableHandle`] shares it on a single-threaded
//! event loop and owns the asynchronous parts: the live subscription and the
//! exercise calls. No `RefCell` borrow is held across an `.await`.

use crate::dialog::{DialogError, DialogSession, DialogSpec, InputKind};
use crate::dispatcher::{ActionSpec, ControlKey, Dispatch, Dispatcher, Notice};
use crate::ledger::{LedgerCommand, LedgerError, LedgerQuery};
use crate::projector::{Cell, Expr};
use contract_registry::{Contract, ContractId, ExerciseCommand, TemplateId};
use futures::future::{AbortHandle, Abortable};
use futures::StreamExt;
use std::cell::{Cell as StdCell, RefCell};
use std::fmt;
use std::rc::Rc;

pub const EMPTY_STATE: &str = "No contracts";

#[derive(Clone, Debug)]
pub struct ColumnSpec {
    label: String,
    expression: String,
    parsed: Option<Expr>,
}

impl ColumnSpec {
    /// An unparseable expression renders as the placeholder in every row.
    pub fn new(label: impl Into<String>, expression: impl Into<String>) -> Self {
        let label = label.into();
        let expression = expression.into();
        let parsed = match Expr::parse(&expression) {
            Ok(expr) => Some(expr),
            Err(err) => {
                tracing::warn!(column = %label, %expression, %err, "column expression does not parse");
                None
            }
        };
        Self {
            label,
            expression,
            parsed,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn project(&self, contract: &Contract) -> Cell {
        self.parsed
            .as_ref()
            .map(|expr| expr.eval(contract))
            .unwrap_or(Cell::Missing)
    }
}

pub fn columns(pairs: &[(&str, &str)]) -> Vec<ColumnSpec> {
    pairs
        .iter()
        .map(|(label, expression)| ColumnSpec::new(*label, *expression))
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct ControlView {
    pub key: ControlKey,
    pub label: String,
    pub busy: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowView {
    pub contract_id: ContractId,
    pub cells: Vec<Cell>,
    pub controls: Vec<ControlView>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TableBody {
    Empty(String),
    Rows(Vec<RowView>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldView {
    pub label: String,
    pub kind: InputKind,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DialogView {
    pub dialog: usize,
    pub title: String,
    pub contract_id: ContractId,
    pub fields: Vec<FieldView>,
    pub error: Option<String>,
}

impl DialogView {
    /// Changes when the modal is replaced or reports an error, not when a
    /// field value is edited.
    pub fn key(&self) -> (usize, ContractId, Option<String>) {
        (self.dialog, self.contract_id.clone(), self.error.clone())
    }
}

/// Everything a renderer needs, as a plain comparable value.
#[derive(Clone, Debug, PartialEq)]
pub struct TableView {
    pub header: Vec<String>,
    pub body: TableBody,
    pub notices: Vec<Notice>,
    pub dialog: Option<DialogView>,
}

impl TableView {
    pub fn rows(&self) -> &[RowView] {
        match &self.body {
            TableBody::Rows(rows) => rows,
            TableBody::Empty(_) => &[],
        }
    }
}

impl fmt::Display for TableView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = match &self.body {
            TableBody::Empty(message) => {
                writeln!(f, "{}", self.header.join(" | "))?;
                writeln!(f, "({message})")?;
                Vec::new()
            }
            TableBody::Rows(rows) => rows
                .iter()
                .map(|row| {
                    let mut line: Vec<String> = row.cells.iter().map(Cell::to_string).collect();
                    line.extend(row.controls.iter().map(|c| {
                        if c.busy {
                            format!("[{}…]", c.label)
                        } else {
                            format!("[{}]", c.label)
                        }
                    }));
                    line
                })
                .collect(),
        };

        if !rows.is_empty() {
            let mut widths: Vec<usize> = self.header.iter().map(|h| h.chars().count()).collect();
            for line in &rows {
                for (i, cell) in line.iter().enumerate() {
                    let w = cell.chars().count();
                    match widths.get_mut(i) {
                        Some(slot) => *slot = (*slot).max(w),
                        None => widths.push(w),
                    }
                }
            }
            let render = |f: &mut fmt::Formatter<'_>, line: &[String]| -> fmt::Result {
                let padded: Vec<String> = line
                    .iter()
                    .zip(&widths)
                    .map(|(cell, w)| format!("{cell:<width$}", width = *w))
                    .collect();
                writeln!(f, "{}", padded.join(" | ").trim_end())
            };
            render(f, &self.header)?;
            for line in &rows {
                render(f, line)?;
            }
        }

        for notice in &self.notices {
            writeln!(f, "! {}", notice.message)?;
        }
        if let Some(dialog) = &self.dialog {
            writeln!(f, "> {} ({})", dialog.title, dialog.contract_id)?;
            for field in &dialog.fields {
                writeln!(f, ">   {}: {}", field.label, field.value)?;
            }
            if let Some(error) = &dialog.error {
                writeln!(f, ">   {error}")?;
            }
        }
        Ok(())
    }
}

pub struct ContractsTable {
    columns: Vec<ColumnSpec>,
    actions: Vec<ActionSpec>,
    dialogs: Vec<DialogSpec>,
    rows: Vec<Contract>,
    dispatcher: Dispatcher,
    dialog: Option<DialogSession>,
    dialog_error: Option<String>,
    mounted: bool,
}

impl ContractsTable {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self {
            columns,
            actions: Vec::new(),
            dialogs: Vec::new(),
            rows: Vec::new(),
            dispatcher: Dispatcher::default(),
            dialog: None,
            dialog_error: None,
            mounted: true,
        }
    }

    pub fn with_actions(mut self, actions: Vec<ActionSpec>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_dialogs(mut self, dialogs: Vec<DialogSpec>) -> Self {
        self.dialogs = dialogs;
        self
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn rows(&self) -> &[Contract] {
        &self.rows
    }

    pub fn contract(&self, id: &ContractId) -> Option<&Contract> {
        self.rows.iter().find(|c| &c.contract_id == id)
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Applies one stream emission. Rows keep the emission's order.
    pub fn replace_rows(&mut self, contracts: Vec<Contract>) {
        self.rows = contracts;
    }

    pub fn subscription_failed(&mut self, err: &LedgerError) {
        tracing::warn!(%err, "subscription failed, showing no data");
        self.rows.clear();
    }

    pub fn notices(&self) -> &[Notice] {
        self.dispatcher.notices()
    }

    pub fn dismiss_notice(&mut self, id: u64) -> bool {
        self.dispatcher.dismiss(id)
    }

    pub fn dialog_session(&self) -> Option<&DialogSession> {
        self.dialog.as_ref()
    }

    pub fn open_dialog(&mut self, dialog: usize, contract_id: &ContractId) -> Result<(), DialogError> {
        if self.dialog.is_some() {
            return Err(DialogError::AlreadyOpen);
        }
        let spec = self
            .dialogs
            .get(dialog)
            .ok_or(DialogError::UnknownDialog(dialog))?;
        let contract = self
            .contract(contract_id)
            .cloned()
            .ok_or_else(|| DialogError::UnknownContract(contract_id.clone()))?;
        if self.dispatcher.is_pending(ControlKey::Dialog(dialog), contract_id) {
            return Err(DialogError::InFlight {
                label: spec.label.clone(),
                contract_id: contract_id.clone(),
            });
        }
        self.dialog = Some(DialogSession::open(dialog, spec, contract));
        self.dialog_error = None;
        Ok(())
    }

    pub fn set_field(&mut self, label: &str, raw: &str) -> Result<(), DialogError> {
        self.dialog.as_mut().ok_or(DialogError::NotOpen)?.set(label, raw)
    }

    /// Closes the modal and throws away whatever was typed.
    pub fn cancel_dialog(&mut self) {
        self.dialog = None;
        self.dialog_error = None;
    }

    pub fn view(&self) -> TableView {
        let header = self.columns.iter().map(|c| c.label.clone()).collect();
        let body = if self.rows.is_empty() {
            TableBody::Empty(EMPTY_STATE.to_string())
        } else {
            TableBody::Rows(self.rows.iter().map(|c| self.row_view(c)).collect())
        };
        TableView {
            header,
            body,
            notices: self.dispatcher.notices().to_vec(),
            dialog: self.dialog_view(),
        }
    }

    fn row_view(&self, contract: &Contract) -> RowView {
        let id = &contract.contract_id;
        let actions = self.actions.iter().enumerate().map(|(i, a)| ControlView {
            key: ControlKey::Action(i),
            label: a.label.clone(),
            busy: self.dispatcher.is_pending(ControlKey::Action(i), id),
        });
        let dialogs = self.dialogs.iter().enumerate().map(|(i, d)| ControlView {
            key: ControlKey::Dialog(i),
            label: d.label.clone(),
            busy: self.dispatcher.is_pending(ControlKey::Dialog(i), id),
        });
        RowView {
            contract_id: id.clone(),
            cells: self.columns.iter().map(|c| c.project(contract)).collect(),
            controls: actions.chain(dialogs).collect(),
        }
    }

    fn dialog_view(&self) -> Option<DialogView> {
        let session = self.dialog.as_ref()?;
        let spec = self.dialogs.get(session.dialog())?;
        Some(DialogView {
            dialog: session.dialog(),
            title: spec.label.clone(),
            contract_id: session.contract().contract_id.clone(),
            fields: spec
                .fields
                .iter()
                .map(|f| FieldView {
                    label: f.label.clone(),
                    kind: f.kind,
                    value: session.value(&f.label).unwrap_or_default().to_string(),
                })
                .collect(),
            error: self.dialog_error.clone(),
        })
    }

    fn begin_action(
        &mut self,
        action: usize,
        contract_id: &ContractId,
    ) -> Result<(String, ExerciseCommand), Dispatch> {
        let spec = self.actions.get(action).ok_or(Dispatch::UnknownControl)?;
        let contract = self
            .rows
            .iter()
            .find(|c| &c.contract_id == contract_id)
            .ok_or(Dispatch::UnknownRow)?;
        let prepared = (spec.label.clone(), spec.command(contract));
        if !self.dispatcher.try_begin(ControlKey::Action(action), contract_id) {
            return Err(Dispatch::AlreadyPending);
        }
        Ok(prepared)
    }

    fn begin_submit(&mut self) -> Result<Result<Submit, Dispatch>, DialogError> {
        let session = self.dialog.as_ref().ok_or(DialogError::NotOpen)?;
        let index = session.dialog();
        let spec = self
            .dialogs
            .get(index)
            .ok_or(DialogError::UnknownDialog(index))?;
        let contract_id = session.contract().contract_id.clone();

        let command = session
            .collect(spec)
            .and_then(|params| spec.command(session.contract(), &params));
        let command = match command {
            Ok(command) => command,
            Err(err) => {
                self.dialog_error = Some(err.to_string());
                return Err(err);
            }
        };

        let label = spec.label.clone();
        if !self.dispatcher.try_begin(ControlKey::Dialog(index), &contract_id) {
            self.dialog_error = Some(
                DialogError::InFlight {
                    label,
                    contract_id,
                }
                .to_string(),
            );
            return Ok(Err(Dispatch::AlreadyPending));
        }
        self.dialog = None;
        self.dialog_error = None;
        Ok(Ok(Submit {
            key: ControlKey::Dialog(index),
            contract_id,
            label,
            command,
        }))
    }

    fn complete(
        &mut self,
        key: ControlKey,
        contract_id: &ContractId,
        label: &str,
        outcome: Result<serde_json::Value, LedgerError>,
    ) -> Dispatch {
        if !self.mounted {
            self.dispatcher.forget(key, contract_id);
            return Dispatch::Discarded;
        }
        self.dispatcher.finish(key, contract_id, label, outcome)
    }
}

struct Submit {
    key: ControlKey,
    contract_id: ContractId,
    label: String,
    command: ExerciseCommand,
}

type Listener = Rc<dyn Fn(&TableView)>;

/// Shared handle to a mounted table.
#[derive(Clone)]
pub struct TableHandle {
    table: Rc<RefCell<ContractsTable>>,
    listener: Rc<RefCell<Option<Listener>>>,
    subscriptions: Rc<RefCell<Vec<(u64, AbortHandle)>>>,
    next_subscription: Rc<StdCell<u64>>,
}

impl TableHandle {
    pub fn new(table: ContractsTable) -> Self {
        Self {
            table: Rc::new(RefCell::new(table)),
            listener: Rc::new(RefCell::new(None)),
            subscriptions: Rc::new(RefCell::new(Vec::new())),
            next_subscription: Rc::new(StdCell::new(0)),
        }
    }

    /// Called with the fresh view after every visible change while mounted.
    pub fn set_listener(&self, listener: impl Fn(&TableView) + 'static) {
        *self.listener.borrow_mut() = Some(Rc::new(listener));
    }

    pub fn view(&self) -> TableView {
        self.table.borrow().view()
    }

    pub fn is_mounted(&self) -> bool {
        self.table.borrow().is_mounted()
    }

    /// Follows the live query until the stream ends or the table unmounts.
    pub async fn drive<Q: LedgerQuery + ?Sized>(&self, query: &Q, template: TemplateId) {
        if !self.is_mounted() {
            return;
        }
        let (abort, registration) = AbortHandle::new_pair();
        let id = self.next_subscription.get();
        self.next_subscription.set(id + 1);
        self.subscriptions.borrow_mut().push((id, abort));

        let mut stream = query.stream_query(template);
        tracing::debug!(%template, "subscribed");
        let follow = async {
            while let Some(next) = stream.next().await {
                if !self.is_mounted() {
                    break;
                }
                match next {
                    Ok(contracts) => self.table.borrow_mut().replace_rows(contracts),
                    Err(err) => self.table.borrow_mut().subscription_failed(&err),
                }
                self.notify();
            }
        };
        if Abortable::new(follow, registration).await.is_err() {
            tracing::debug!(%template, "subscription aborted");
        }
        self.subscriptions.borrow_mut().retain(|(sub, _)| *sub != id);
        tracing::debug!(%template, "unsubscribed");
    }

    /// Live queries currently followed by [`TableHandle::drive`].
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    pub async fn invoke<L: LedgerCommand + ?Sized>(
        &self,
        ledger: &L,
        action: usize,
        contract_id: &ContractId,
    ) -> Dispatch {
        if !self.is_mounted() {
            return Dispatch::Discarded;
        }
        let begun = self.table.borrow_mut().begin_action(action, contract_id);
        let (label, command) = match begun {
            Ok(prepared) => prepared,
            Err(refused) => return refused,
        };
        self.notify();

        tracing::info!(%contract_id, choice = %command.choice, "exercising");
        let outcome = ledger.exercise(command).await;
        let dispatch = self.table.borrow_mut().complete(
            ControlKey::Action(action),
            contract_id,
            &label,
            outcome,
        );
        self.notify();
        dispatch
    }

    pub fn open_dialog(&self, dialog: usize, contract_id: &ContractId) -> Result<(), DialogError> {
        self.table.borrow_mut().open_dialog(dialog, contract_id)?;
        self.notify();
        Ok(())
    }

    /// Field edits are not broadcast; the input element already shows them.
    pub fn set_field(&self, label: &str, raw: &str) -> Result<(), DialogError> {
        self.table.borrow_mut().set_field(label, raw)
    }

    pub fn cancel_dialog(&self) {
        self.table.borrow_mut().cancel_dialog();
        self.notify();
    }

    pub async fn submit_dialog<L: LedgerCommand + ?Sized>(
        &self,
        ledger: &L,
    ) -> Result<Dispatch, DialogError> {
        if !self.is_mounted() {
            return Ok(Dispatch::Discarded);
        }
        let begun = self.table.borrow_mut().begin_submit();
        let submit = match begun {
            Ok(Ok(submit)) => submit,
            Ok(Err(refused)) => {
                self.notify();
                return Ok(refused);
            }
            Err(err) => {
                self.notify();
                return Err(err);
            }
        };
        self.notify();

        tracing::info!(contract_id = %submit.contract_id, choice = %submit.command.choice, "exercising from dialog");
        let outcome = ledger.exercise(submit.command).await;
        let dispatch = self.table.borrow_mut().complete(
            submit.key,
            &submit.contract_id,
            &submit.label,
            outcome,
        );
        self.notify();
        Ok(dispatch)
    }

    pub fn dismiss_notice(&self, id: u64) -> bool {
        let dismissed = self.table.borrow_mut().dismiss_notice(id);
        if dismissed {
            self.notify();
        }
        dismissed
    }

    /// Tears the view down: subscriptions stop, late command results are
    /// dropped and the listener is never called again.
    pub fn unmount(&self) {
        self.table.borrow_mut().mounted = false;
        let subscriptions: Vec<_> = self.subscriptions.borrow_mut().drain(..).collect();
        for (_, abort) in subscriptions {
            abort.abort();
        }
        self.listener.borrow_mut().take();
    }

    fn notify(&self) {
        if !self.is_mounted() {
            return;
        }
        let listener = self.listener.borrow().clone();
        if let Some(listener) = listener {
            let view = self.view();
            listener(&view);
        }
    }
}
