use crate::config::DesktopConfig;
use ledger_core::session::SessionStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DesktopConfig>,
    pub http: reqwest::Client,
    pub session: Arc<Mutex<SessionStore>>,
    /// Running subscription pumps keyed by the id the UI chose.
    pub subscriptions: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}
