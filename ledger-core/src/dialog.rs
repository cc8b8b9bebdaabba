//! Parameterized row commands.
//!
//! A dialog declares its fields; a [`DialogSession`] holds the raw text the
//! user typed while the modal is open. Submitting normalizes every field and
//! hands the structured parameters to the dialog's handler, which builds the
//! command to exercise.
//!
//! Every declared field is required: a field that is empty after
//! normalization blocks the submit and the session stays open.

use contract_registry::{Contract, ContractId, ExerciseCommand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DialogError {
    #[error("a dialog is already open")]
    AlreadyOpen,
    #[error("no dialog is open")]
    NotOpen,
    #[error("unknown dialog #{0}")]
    UnknownDialog(usize),
    #[error("contract {0} is no longer in the table")]
    UnknownContract(ContractId),
    #[error("'{0}' is not a field of this dialog")]
    UnknownField(String),
    #[error("{label} is still running for {contract_id}")]
    InFlight { label: String, contract_id: ContractId },
    #[error("'{0}' is required")]
    MissingField(String),
    #[error("'{0}' has a different input kind")]
    WrongKind(String),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    /// Comma separated list.
    List,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub label: String,
    pub kind: InputKind,
}

pub fn field(label: impl Into<String>, kind: InputKind) -> FieldSpec {
    FieldSpec {
        label: label.into(),
        kind,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    List(Vec<String>),
}

impl ParamValue {
    pub fn is_empty(&self) -> bool {
        match self {
            ParamValue::Text(s) => s.is_empty(),
            ParamValue::List(items) => items.is_empty(),
        }
    }
}

pub fn normalize(kind: InputKind, raw: &str) -> ParamValue {
    match kind {
        InputKind::Text => ParamValue::Text(raw.trim().to_string()),
        InputKind::List => ParamValue::List(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect(),
        ),
    }
}

/// Submitted values keyed by field label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DialogParams(BTreeMap<String, ParamValue>);

impl DialogParams {
    pub fn get(&self, label: &str) -> Option<&ParamValue> {
        self.0.get(label)
    }

    pub fn text(&self, label: &str) -> Result<&str, DialogError> {
        match self.0.get(label) {
            Some(ParamValue::Text(s)) => Ok(s),
            Some(ParamValue::List(_)) => Err(DialogError::WrongKind(label.to_string())),
            None => Err(DialogError::UnknownField(label.to_string())),
        }
    }

    pub fn list(&self, label: &str) -> Result<&[String], DialogError> {
        match self.0.get(label) {
            Some(ParamValue::List(items)) => Ok(items),
            Some(ParamValue::Text(_)) => Err(DialogError::WrongKind(label.to_string())),
            None => Err(DialogError::UnknownField(label.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

type DialogHandler = Rc<dyn Fn(&Contract, &DialogParams) -> Result<ExerciseCommand, DialogError>>;

#[derive(Clone)]
pub struct DialogSpec {
    pub label: String,
    pub fields: Vec<FieldSpec>,
    handler: DialogHandler,
}

impl DialogSpec {
    pub fn new(
        label: impl Into<String>,
        fields: Vec<FieldSpec>,
        handler: impl Fn(&Contract, &DialogParams) -> Result<ExerciseCommand, DialogError> + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            fields,
            handler: Rc::new(handler),
        }
    }

    pub fn command(
        &self,
        contract: &Contract,
        params: &DialogParams,
    ) -> Result<ExerciseCommand, DialogError> {
        (self.handler)(contract, params)
    }
}

impl fmt::Debug for DialogSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogSpec")
            .field("label", &self.label)
            .field("fields", &self.fields)
            .finish()
    }
}

/// An open modal: which dialog, for which row, and the raw field text.
#[derive(Clone, Debug, PartialEq)]
pub struct DialogSession {
    dialog: usize,
    contract: Contract,
    values: BTreeMap<String, String>,
}

impl DialogSession {
    pub fn open(dialog: usize, spec: &DialogSpec, contract: Contract) -> Self {
        let values = spec
            .fields
            .iter()
            .map(|f| (f.label.clone(), String::new()))
            .collect();
        Self {
            dialog,
            contract,
            values,
        }
    }

    pub fn dialog(&self) -> usize {
        self.dialog
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    pub fn value(&self, label: &str) -> Option<&str> {
        self.values.get(label).map(String::as_str)
    }

    pub fn set(&mut self, label: &str, raw: impl Into<String>) -> Result<(), DialogError> {
        let slot = self
            .values
            .get_mut(label)
            .ok_or_else(|| DialogError::UnknownField(label.to_string()))?;
        *slot = raw.into();
        Ok(())
    }

    pub fn collect(&self, spec: &DialogSpec) -> Result<DialogParams, DialogError> {
        let mut params = BTreeMap::new();
        for field in &spec.fields {
            let raw = self.value(&field.label).unwrap_or_default();
            let value = normalize(field.kind, raw);
            if value.is_empty() {
                return Err(DialogError::MissingField(field.label.clone()));
            }
            params.insert(field.label.clone(), value);
        }
        Ok(DialogParams(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contract_registry::{Choice, TemplateId};

    fn invite() -> DialogSpec {
        DialogSpec::new(
            "Invite bidders",
            vec![field("Bidders", InputKind::List), field("Note", InputKind::Text)],
            |contract, params| {
                Ok(ExerciseCommand::new(
                    Choice::AuctionInviteBidders,
                    contract.contract_id.clone(),
                    serde_json::json!({ "bidders": params.list("Bidders")? }),
                ))
            },
        )
    }

    fn auction() -> Contract {
        Contract::new("#3:0", TemplateId::Auction, serde_json::json!({}))
    }

    #[test]
    fn list_fields_split_trim_and_drop_empties() {
        assert_eq!(
            normalize(InputKind::List, "A, B,  C"),
            ParamValue::List(vec!["A".into(), "B".into(), "C".into()])
        );
        assert_eq!(
            normalize(InputKind::List, " ,A,,B , "),
            ParamValue::List(vec!["A".into(), "B".into()])
        );
        assert_eq!(normalize(InputKind::Text, "  x y "), ParamValue::Text("x y".into()));
    }

    #[test]
    fn collect_builds_structured_params() {
        let spec = invite();
        let mut session = DialogSession::open(0, &spec, auction());
        session.set("Bidders", "Bank1, Bank2").expect("set");
        session.set("Note", " first round ").expect("set");

        let params = session.collect(&spec).expect("collect");
        assert_eq!(params.list("Bidders"), Ok(&["Bank1".to_string(), "Bank2".to_string()][..]));
        assert_eq!(params.text("Note"), Ok("first round"));
        assert_eq!(params.text("Bidders"), Err(DialogError::WrongKind("Bidders".into())));

        let cmd = spec.command(session.contract(), &params).expect("command");
        assert_eq!(cmd.argument, serde_json::json!({"bidders": ["Bank1", "Bank2"]}));
    }

    #[test]
    fn empty_field_blocks_collect() {
        let spec = invite();
        let mut session = DialogSession::open(0, &spec, auction());
        session.set("Bidders", " , ").expect("set");
        session.set("Note", "n").expect("set");
        assert_eq!(
            session.collect(&spec),
            Err(DialogError::MissingField("Bidders".into()))
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        let spec = invite();
        let mut session = DialogSession::open(0, &spec, auction());
        assert_eq!(
            session.set("Price", "1"),
            Err(DialogError::UnknownField("Price".into()))
        );
        assert_eq!(session.value("Bidders"), Some(""));
    }
}
