use ledger_core::session::{local_dev_parties, parties_from_participants, LoginMode, LoginOptions};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LEDGER_URL: &str = "http://localhost:7575";
pub const DEFAULT_POLL_MS: u64 = 750;
pub const DEFAULT_PARTICIPANTS: &str = "participants.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("hosted mode needs BOND_HOSTED_LOGIN_URL")]
    MissingLoginUrl,
    #[error("cannot read {path}: {source}")]
    Participants {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Startup settings, read once from the environment.
#[derive(Clone, Debug, PartialEq)]
pub struct DesktopConfig {
    pub ledger_url: String,
    pub mode: LoginMode,
    pub poll_interval: Duration,
    pub participants_path: PathBuf,
    /// Headless mode logs in as this party.
    pub party: Option<String>,
    pub token: Option<String>,
}

impl DesktopConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let local_dev = match non_empty("BOND_LOCAL_DEV") {
            None => true,
            Some(v) => parse_bool(&v).ok_or_else(|| ConfigError::Invalid {
                var: "BOND_LOCAL_DEV",
                value: v.clone(),
                reason: "expected true or false".into(),
            })?,
        };
        let mode = if local_dev {
            LoginMode::LocalDev
        } else {
            LoginMode::Hosted {
                login_url: non_empty("BOND_HOSTED_LOGIN_URL").ok_or(ConfigError::MissingLoginUrl)?,
            }
        };

        let poll_ms = match non_empty("BOND_POLL_MS") {
            None => DEFAULT_POLL_MS,
            Some(v) => match v.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "BOND_POLL_MS",
                        value: v,
                        reason: "expected a positive number of milliseconds".into(),
                    })
                }
            },
        };

        Ok(Self {
            ledger_url: non_empty("BOND_LEDGER_URL")
                .unwrap_or_else(|| DEFAULT_LEDGER_URL.into())
                .trim_end_matches('/')
                .to_string(),
            mode,
            poll_interval: Duration::from_millis(poll_ms),
            participants_path: non_empty("BOND_PARTICIPANTS")
                .unwrap_or_else(|| DEFAULT_PARTICIPANTS.into())
                .into(),
            party: non_empty("BOND_PARTY"),
            token: non_empty("BOND_TOKEN"),
        })
    }

    /// Parties offered at login. Hosted mode reads the participants file
    /// on every call so a redeployed file is picked up.
    pub fn login_options(&self) -> Result<LoginOptions, String> {
        let parties = match &self.mode {
            LoginMode::LocalDev => local_dev_parties(),
            LoginMode::Hosted { .. } => {
                let raw = std::fs::read_to_string(&self.participants_path).map_err(|source| {
                    ConfigError::Participants {
                        path: self.participants_path.display().to_string(),
                        source,
                    }
                    .to_string()
                })?;
                parties_from_participants(&raw).map_err(|e| e.to_string())?
            }
        };
        Ok(LoginOptions {
            mode: self.mode.clone(),
            parties,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
