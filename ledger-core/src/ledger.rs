//! Seams to the external ledger.
//!
//! The console never owns the ledger connection. It reads through
//! [`LedgerQuery`] and writes through [`LedgerCommand`]; both hand back local
//! (non-`Send`) futures so the same code runs on a browser event loop and a
//! current-thread runtime.

use contract_registry::{Contract, ContractId, ExerciseCommand, TemplateId};
use futures::future::LocalBoxFuture;
use futures::stream::LocalBoxStream;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("command rejected: {0}")]
    Rejected(String),
    #[error("ledger unreachable: {0}")]
    Transport(String),
    #[error("unexpected ledger response: {0}")]
    Protocol(String),
    #[error("contract {0} is not active")]
    UnknownContract(ContractId),
    #[error("not logged in")]
    NoSession,
}

/// Each item is the full active contract set at that point in time.
pub type ContractStream = LocalBoxStream<'static, Result<Vec<Contract>, LedgerError>>;

pub type CommandFuture = LocalBoxFuture<'static, Result<serde_json::Value, LedgerError>>;

pub trait LedgerQuery {
    /// Live query for one template. Dropping the stream unsubscribes.
    fn stream_query(&self, template: TemplateId) -> ContractStream;
}

pub trait LedgerCommand {
    fn exercise(&self, command: ExerciseCommand) -> CommandFuture;
}

impl<T: LedgerQuery + ?Sized> LedgerQuery for Rc<T> {
    fn stream_query(&self, template: TemplateId) -> ContractStream {
        (**self).stream_query(template)
    }
}

impl<T: LedgerCommand + ?Sized> LedgerCommand for Rc<T> {
    fn exercise(&self, command: ExerciseCommand) -> CommandFuture {
        (**self).exercise(command)
    }
}
