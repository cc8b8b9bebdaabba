//! Who is acting on the ledger.
//!
//! A [`SessionContext`] is created by [`login`], stored in a [`SessionStore`]
//! and passed explicitly to whatever needs it. Logging out tears it down.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoginError {
    #[error("select a party")]
    NoParty,
    #[error("party {0} is not offered here")]
    UnknownParty(String),
    #[error("hosted login needs an access token")]
    MissingToken,
    #[error("invalid participants file: {0}")]
    Participants(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum LoginMode {
    LocalDev,
    #[serde(rename_all = "camelCase")]
    Hosted { login_url: String },
}

impl LoginMode {
    pub fn is_local_dev(&self) -> bool {
        matches!(self, LoginMode::LocalDev)
    }
}

/// What the login screen offers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOptions {
    pub mode: LoginMode,
    pub parties: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub party: String,
    pub token: Option<String>,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    current: Option<SessionContext>,
}

impl SessionStore {
    /// Replaces any previous session.
    pub fn init(&mut self, session: SessionContext) {
        tracing::info!(party = %session.party, "session started");
        self.current = Some(session);
    }

    pub fn teardown(&mut self) -> Option<SessionContext> {
        let previous = self.current.take();
        if let Some(session) = &previous {
            tracing::info!(party = %session.party, "session ended");
        }
        previous
    }

    pub fn current(&self) -> Option<&SessionContext> {
        self.current.as_ref()
    }
}

pub fn local_dev_parties() -> Vec<String> {
    [
        "Operator",
        "Regulator",
        "AuctionAgent",
        "Bank1",
        "Bank2",
        "Bank3",
        "CSD",
        "Issuer",
        "CentralBank",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Deserialize)]
struct Participants {
    party_participants: serde_json::Map<String, serde_json::Value>,
}

/// Reads the hosted deployment's `participants.json`.
pub fn parties_from_participants(json: &str) -> Result<Vec<String>, LoginError> {
    let parsed: Participants =
        serde_json::from_str(json).map_err(|e| LoginError::Participants(e.to_string()))?;
    parsed
        .party_participants
        .values()
        .map(|v| {
            v.as_str()
                .map(capitalize)
                .ok_or_else(|| LoginError::Participants(format!("party name {v} is not a string")))
        })
        .collect()
}

pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn login(options: &LoginOptions, party: &str, password: &str) -> Result<SessionContext, LoginError> {
    let party = party.trim();
    if party.is_empty() {
        return Err(LoginError::NoParty);
    }
    if !options.parties.iter().any(|p| p == party) {
        return Err(LoginError::UnknownParty(party.to_string()));
    }
    let token = match password.trim() {
        "" if options.mode.is_local_dev() => None,
        "" => return Err(LoginError::MissingToken),
        token => Some(token.to_string()),
    };
    Ok(SessionContext {
        party: party.to_string(),
        token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> LoginOptions {
        LoginOptions {
            mode: LoginMode::LocalDev,
            parties: local_dev_parties(),
        }
    }

    #[test]
    fn local_dev_login_without_password_has_no_token() {
        let session = login(&local(), "Bank1", "").expect("login");
        assert_eq!(session.party, "Bank1");
        assert_eq!(session.token, None);
    }

    #[test]
    fn empty_or_unknown_party_is_refused() {
        assert_eq!(login(&local(), "  ", "x"), Err(LoginError::NoParty));
        assert_eq!(
            login(&local(), "Mallory", ""),
            Err(LoginError::UnknownParty("Mallory".into()))
        );
    }

    #[test]
    fn hosted_login_requires_token() {
        let options = LoginOptions {
            mode: LoginMode::Hosted {
                login_url: "https://login.example/".into(),
            },
            parties: vec!["Issuer".into()],
        };
        assert_eq!(login(&options, "Issuer", ""), Err(LoginError::MissingToken));
        let session = login(&options, "Issuer", "abc").expect("login");
        assert_eq!(session.token.as_deref(), Some("abc"));
    }

    #[test]
    fn participants_are_capitalized() {
        let json = r#"{"party_participants": {"p-1": "issuer", "p-2": "bank1", "p-3": ""}}"#;
        assert_eq!(
            parties_from_participants(json).expect("parse"),
            vec!["Issuer", "Bank1", ""]
        );
        assert!(matches!(
            parties_from_participants("{}"),
            Err(LoginError::Participants(_))
        ));
    }

    #[test]
    fn store_init_replaces_and_teardown_clears() {
        let mut store = SessionStore::default();
        store.init(SessionContext {
            party: "Bank1".into(),
            token: None,
        });
        store.init(SessionContext {
            party: "Bank2".into(),
            token: None,
        });
        assert_eq!(store.current().map(|s| s.party.as_str()), Some("Bank2"));
        assert_eq!(store.teardown().map(|s| s.party), Some("Bank2".into()));
        assert!(store.current().is_none());
        assert!(store.teardown().is_none());
    }
}
