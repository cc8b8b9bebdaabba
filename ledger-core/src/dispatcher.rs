use crate::ledger::LedgerError;
use contract_registry::{Choice, Contract, ContractId, ExerciseCommand};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// A zero-argument row action: one label, one command per click.
#[derive(Clone)]
pub struct ActionSpec {
    pub label: String,
    build: Rc<dyn Fn(&Contract) -> ExerciseCommand>,
}

impl ActionSpec {
    pub fn new(
        label: impl Into<String>,
        build: impl Fn(&Contract) -> ExerciseCommand + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            build: Rc::new(build),
        }
    }

    /// Exercises `choice` on the row's contract with an empty argument.
    pub fn exercise(label: impl Into<String>, choice: Choice) -> Self {
        Self::new(label, move |contract| {
            ExerciseCommand::new(choice, contract.contract_id.clone(), serde_json::json!({}))
        })
    }

    pub fn command(&self, contract: &Contract) -> ExerciseCommand {
        (self.build)(contract)
    }
}

impl fmt::Debug for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSpec").field("label", &self.label).finish()
    }
}

/// Identifies an interactive control within a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ControlKey {
    Action(usize),
    Dialog(usize),
}

/// What happened to a click or submit.
#[derive(Clone, Debug, PartialEq)]
pub enum Dispatch {
    /// The ledger accepted the command. The next emission shows the effect.
    Sent,
    /// Same control on the same contract is still in flight; nothing sent.
    AlreadyPending,
    /// The ledger rejected or never received the command; a notice is shown.
    Failed(LedgerError),
    /// The view was torn down before the command completed.
    Discarded,
    UnknownRow,
    UnknownControl,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub message: String,
}

/// In-flight bookkeeping and user-facing failure notices.
#[derive(Debug, Default)]
pub struct Dispatcher {
    in_flight: HashSet<(ControlKey, ContractId)>,
    notices: Vec<Notice>,
    next_notice: u64,
}

impl Dispatcher {
    /// Marks the pair as in flight. Returns false if it already was.
    pub fn try_begin(&mut self, key: ControlKey, contract_id: &ContractId) -> bool {
        self.in_flight.insert((key, contract_id.clone()))
    }

    pub fn is_pending(&self, key: ControlKey, contract_id: &ContractId) -> bool {
        self.in_flight.contains(&(key, contract_id.clone()))
    }

    pub fn pending_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn finish(
        &mut self,
        key: ControlKey,
        contract_id: &ContractId,
        label: &str,
        outcome: Result<serde_json::Value, LedgerError>,
    ) -> Dispatch {
        self.in_flight.remove(&(key, contract_id.clone()));
        match outcome {
            Ok(_) => {
                tracing::debug!(%contract_id, label, "command accepted");
                Dispatch::Sent
            }
            Err(err) => {
                tracing::warn!(%contract_id, label, %err, "command failed");
                self.push_notice(format!("{label} failed for {contract_id}: {err}"));
                Dispatch::Failed(err)
            }
        }
    }

    /// Drops the in-flight mark without reporting anything.
    pub fn forget(&mut self, key: ControlKey, contract_id: &ContractId) {
        self.in_flight.remove(&(key, contract_id.clone()));
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    fn push_notice(&mut self, message: String) {
        self.next_notice += 1;
        self.notices.push(Notice {
            id: self.next_notice,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contract_registry::TemplateId;

    #[test]
    fn second_begin_for_same_pair_is_refused() {
        let mut d = Dispatcher::default();
        let id = ContractId::new("#1:0");
        assert!(d.try_begin(ControlKey::Action(0), &id));
        assert!(!d.try_begin(ControlKey::Action(0), &id));
        assert!(d.try_begin(ControlKey::Action(1), &id));
        assert!(d.try_begin(ControlKey::Action(0), &ContractId::new("#2:0")));
        assert_eq!(d.pending_count(), 3);
    }

    #[test]
    fn failure_leaves_control_usable_and_posts_notice() {
        let mut d = Dispatcher::default();
        let id = ContractId::new("#1:0");
        d.try_begin(ControlKey::Action(0), &id);
        let outcome = d.finish(
            ControlKey::Action(0),
            &id,
            "Settle",
            Err(LedgerError::Rejected("not authorized".into())),
        );

        assert_eq!(
            outcome,
            Dispatch::Failed(LedgerError::Rejected("not authorized".into()))
        );
        assert!(!d.is_pending(ControlKey::Action(0), &id));
        assert_eq!(d.notices().len(), 1);
        assert!(d.notices()[0].message.contains("Settle failed for #1:0"));

        let notice = d.notices()[0].id;
        assert!(d.dismiss(notice));
        assert!(!d.dismiss(notice));
        assert!(d.try_begin(ControlKey::Action(0), &id));
    }

    #[test]
    fn exercise_action_targets_row_contract() {
        let action = ActionSpec::exercise("Finalize", Choice::AuctionFinalize);
        let contract = Contract::new("#9:0", TemplateId::Auction, serde_json::json!({}));
        let cmd = action.command(&contract);
        assert_eq!(cmd.contract_id, contract.contract_id);
        assert_eq!(cmd.choice, "Auction_Finalize");
        assert_eq!(cmd.argument, serde_json::json!({}));
    }
}
