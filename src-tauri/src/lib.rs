pub mod commands;
pub mod config;
pub mod json_api;
pub mod runtime;
pub mod state;

use crate::config::DesktopConfig;
use crate::json_api::JsonApiClient;
use crate::state::AppState;
use ledger_core::pages::PageId;
use ledger_core::sandbox::SandboxLedger;
use ledger_core::table::TableHandle;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
#[cfg(feature = "tauri-app")]
use tauri::Manager;

pub fn build_state(config: DesktopConfig) -> Result<AppState, String> {
    Ok(AppState {
        config: Arc::new(config),
        http: JsonApiClient::http_client().map_err(|e| e.to_string())?,
        session: Arc::new(Mutex::new(Default::default())),
        subscriptions: Arc::new(Mutex::new(HashMap::new())),
    })
}

/// Headless mode: logs in as `BOND_PARTY` and prints every page once.
pub fn run() -> Result<(), String> {
    let config = DesktopConfig::from_env().map_err(|e| e.to_string())?;
    let party = config
        .party
        .clone()
        .ok_or_else(|| "set BOND_PARTY to run without the desktop shell".to_string())?;
    let password = config.token.clone().unwrap_or_default();
    let state = build_state(config)?;
    commands::login(&state, party, password)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| e.to_string())?;
    runtime.block_on(async {
        for page in PageId::ALL {
            let contracts = commands::query_contracts(&state, page.template()).await?;
            let mut table = page.spec().table();
            table.replace_rows(contracts);
            println!("== {page}\n{}", table.view());
        }
        Ok::<_, String>(())
    })?;
    commands::logout(&state)
}

/// Runs the console against the in-memory ledger and prints what each page
/// shows before and after finalizing the demo auction.
pub fn run_demo() -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| e.to_string())?;
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, async {
        let ledger = SandboxLedger::with_demo_data();
        let mut handles = Vec::new();
        for page in PageId::ALL {
            let handle = TableHandle::new(page.spec().table());
            let (driver, query) = (handle.clone(), ledger.clone());
            tokio::task::spawn_local(async move { driver.drive(&query, page.template()).await });
            handles.push((page, handle));
        }
        settle().await;

        for (page, handle) in &handles {
            println!("== {page}\n{}", handle.view());
        }

        let Some((_, auctions)) = handles.iter().find(|(p, _)| *p == PageId::OngoingAuctions) else {
            return Ok(());
        };
        let Some(first) = auctions.view().rows().first().map(|r| r.contract_id.clone()) else {
            return Ok(());
        };
        let outcome = auctions.invoke(&ledger, 0, &first).await;
        tracing::info!(?outcome, "finalized demo auction");
        settle().await;
        println!("== {} after Finalize\n{}", PageId::OngoingAuctions, auctions.view());

        for (page, handle) in &handles {
            tracing::debug!(%page, subscriptions = handle.subscription_count(), "unmounting");
            handle.unmount();
        }
        Ok::<_, String>(())
    })
}

async fn settle() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

#[cfg(feature = "tauri-app")]
pub fn run_tauri() {
    tauri::Builder::default()
        .setup(|app| {
            let config = DesktopConfig::from_env()
                .map_err(|e| -> Box<dyn std::error::Error> { Box::new(e) })?;
            let state = build_state(config).map_err(|e| -> Box<dyn std::error::Error> { e.into() })?;
            if let (Some(party), Some(token)) = (state.config.party.clone(), state.config.token.clone()) {
                if let Err(err) = commands::login(&state, party, token) {
                    tracing::warn!(%err, "preconfigured login failed");
                }
            }
            app.manage(state);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::list_parties_cmd,
            commands::login_cmd,
            commands::logout_cmd,
            commands::current_session_cmd,
            commands::query_contracts_cmd,
            commands::exercise_cmd,
            commands::subscribe_cmd,
            commands::unsubscribe_cmd
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
