pub mod dialog;
pub mod dispatcher;
pub mod ledger;
pub mod pages;
pub mod projector;
pub mod sandbox;
pub mod session;
pub mod table;

pub use contract_registry::{Choice, Contract, ContractId, ExerciseCommand, TemplateId};
