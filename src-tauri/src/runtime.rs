use crate::json_api::{ClientError, JsonApiClient};
use contract_registry::{Contract, TemplateId};
use futures::StreamExt;
use ledger_core::ledger::LedgerError;
use std::sync::Arc;
use std::time::Duration;

pub const CONTRACTS_UPDATED: &str = "contracts-updated";
pub const SUBSCRIPTION_FAILED: &str = "subscription-failed";

pub trait EventSink: Send + Sync + 'static {
    fn emit_json(&self, event: &str, payload: serde_json::Value);
}

/// Runs one live query on the async runtime until the handle is aborted.
pub fn spawn_pump(
    sink: Arc<dyn EventSink>,
    client: JsonApiClient,
    subscription_id: String,
    template: TemplateId,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(%subscription_id, %template, "subscription started");
        let mut updates = Box::pin(client.poll(template, interval));
        while let Some(update) = updates.next().await {
            emit_update(sink.as_ref(), &subscription_id, template, update);
        }
    })
}

pub fn emit_update(
    sink: &dyn EventSink,
    subscription_id: &str,
    template: TemplateId,
    update: Result<Vec<Contract>, ClientError>,
) {
    match update {
        Ok(contracts) => {
            tracing::debug!(subscription_id, %template, count = contracts.len(), "active set changed");
            sink.emit_json(
                CONTRACTS_UPDATED,
                serde_json::json!({
                    "subscriptionId": subscription_id,
                    "templateId": template,
                    "contracts": contracts,
                }),
            );
        }
        Err(err) => {
            let err = LedgerError::from(err);
            tracing::warn!(subscription_id, %template, %err, "query failed");
            sink.emit_json(
                SUBSCRIPTION_FAILED,
                serde_json::json!({
                    "subscriptionId": subscription_id,
                    "templateId": template,
                    "error": err.to_string(),
                }),
            );
        }
    }
}

pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit_json(&self, _event: &str, _payload: serde_json::Value) {}
}

#[cfg(feature = "tauri-app")]
pub struct TauriSink {
    app: tauri::AppHandle,
}

#[cfg(feature = "tauri-app")]
impl TauriSink {
    pub fn new(app: tauri::AppHandle) -> Self {
        Self { app }
    }
}

#[cfg(feature = "tauri-app")]
impl EventSink for TauriSink {
    fn emit_json(&self, event: &str, payload: serde_json::Value) {
        use tauri::Manager;
        if let Err(err) = self.app.emit_all(event, payload) {
            tracing::warn!(event, %err, "emit failed");
        }
    }
}
