use crate::json_api::JsonApiClient;
use crate::runtime::{self, EventSink};
use crate::state::AppState;
use contract_registry::{Contract, ExerciseCommand, TemplateId};
use ledger_core::ledger::LedgerError;
use ledger_core::session::{self, LoginOptions, SessionContext};
use std::sync::Arc;

pub fn list_parties(state: &AppState) -> Result<LoginOptions, String> {
    state.config.login_options()
}

pub fn login(state: &AppState, party: String, password: String) -> Result<SessionContext, String> {
    let options = list_parties(state)?;
    let ctx = session::login(&options, &party, &password).map_err(|e| e.to_string())?;
    stop_all_subscriptions(state)?;
    state
        .session
        .lock()
        .map_err(|_| "session lock poisoned".to_string())?
        .init(ctx.clone());
    Ok(ctx)
}

pub fn logout(state: &AppState) -> Result<(), String> {
    stop_all_subscriptions(state)?;
    state
        .session
        .lock()
        .map_err(|_| "session lock poisoned".to_string())?
        .teardown();
    Ok(())
}

pub fn current_session(state: &AppState) -> Result<Option<SessionContext>, String> {
    Ok(state
        .session
        .lock()
        .map_err(|_| "session lock poisoned".to_string())?
        .current()
        .cloned())
}

/// Client acting as the logged-in party.
pub fn client(state: &AppState) -> Result<JsonApiClient, String> {
    let ctx = current_session(state)?.ok_or_else(|| LedgerError::NoSession.to_string())?;
    Ok(JsonApiClient::new(
        state.http.clone(),
        state.config.ledger_url.clone(),
        ctx.token,
    ))
}

pub async fn query_contracts(state: &AppState, template_id: TemplateId) -> Result<Vec<Contract>, String> {
    let client = client(state)?;
    client
        .query(template_id)
        .await
        .map_err(|e| LedgerError::from(e).to_string())
}

pub async fn exercise(state: &AppState, command: ExerciseCommand) -> Result<serde_json::Value, String> {
    let client = client(state)?;
    client
        .exercise(&command)
        .await
        .map_err(|e| LedgerError::from(e).to_string())
}

/// Starts pushing `template_id`'s active set to the UI. Re-using an id
/// replaces the earlier pump.
pub fn subscribe(
    state: &AppState,
    sink: Arc<dyn EventSink>,
    subscription_id: String,
    template_id: TemplateId,
) -> Result<(), String> {
    let client = client(state)?;
    let pump = runtime::spawn_pump(
        sink,
        client,
        subscription_id.clone(),
        template_id,
        state.config.poll_interval,
    );
    let previous = state
        .subscriptions
        .lock()
        .map_err(|_| "subscription lock poisoned".to_string())?
        .insert(subscription_id, pump);
    if let Some(previous) = previous {
        previous.abort();
    }
    Ok(())
}

pub fn unsubscribe(state: &AppState, subscription_id: String) -> Result<bool, String> {
    let pump = state
        .subscriptions
        .lock()
        .map_err(|_| "subscription lock poisoned".to_string())?
        .remove(&subscription_id);
    match pump {
        Some(pump) => {
            pump.abort();
            tracing::info!(%subscription_id, "subscription stopped");
            Ok(true)
        }
        None => Ok(false),
    }
}

fn stop_all_subscriptions(state: &AppState) -> Result<(), String> {
    let mut subscriptions = state
        .subscriptions
        .lock()
        .map_err(|_| "subscription lock poisoned".to_string())?;
    for (_, pump) in subscriptions.drain() {
        pump.abort();
    }
    Ok(())
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn list_parties_cmd(state: tauri::State<'_, AppState>) -> Result<LoginOptions, String> {
    list_parties(&state)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn login_cmd(
    state: tauri::State<'_, AppState>,
    party: String,
    password: String,
) -> Result<SessionContext, String> {
    login(&state, party, password)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn logout_cmd(state: tauri::State<'_, AppState>) -> Result<(), String> {
    logout(&state)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn current_session_cmd(
    state: tauri::State<'_, AppState>,
) -> Result<Option<SessionContext>, String> {
    current_session(&state)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub async fn query_contracts_cmd(
    state: tauri::State<'_, AppState>,
    template_id: TemplateId,
) -> Result<Vec<Contract>, String> {
    query_contracts(&state, template_id).await
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub async fn exercise_cmd(
    state: tauri::State<'_, AppState>,
    command: ExerciseCommand,
) -> Result<serde_json::Value, String> {
    exercise(&state, command).await
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub async fn subscribe_cmd(
    app: tauri::AppHandle,
    state: tauri::State<'_, AppState>,
    subscription_id: String,
    template_id: TemplateId,
) -> Result<(), String> {
    let sink = Arc::new(runtime::TauriSink::new(app));
    subscribe(&state, sink, subscription_id, template_id)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn unsubscribe_cmd(
    state: tauri::State<'_, AppState>,
    subscription_id: String,
) -> Result<bool, String> {
    unsubscribe(&state, subscription_id)
}
