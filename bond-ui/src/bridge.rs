use crate::dto::{
    ContractsUpdatedDto, EventEnvelope, SubscriptionFailedDto, CONTRACTS_UPDATED,
    SUBSCRIPTION_FAILED,
};
use contract_registry::{Contract, ExerciseCommand, TemplateId};
use futures::channel::mpsc;
use futures::{FutureExt, Stream, StreamExt};
use js_sys::{Function, Promise, Reflect};
use ledger_core::ledger::{CommandFuture, ContractStream, LedgerCommand, LedgerError, LedgerQuery};
use ledger_core::session::{LoginOptions, SessionContext};
use leptos::logging::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::{spawn_local, JsFuture};

fn tauri_global() -> Result<JsValue, String> {
    let window = web_sys::window().ok_or_else(|| "window not available".to_string())?;
    let tauri = Reflect::get(&window, &JsValue::from_str("__TAURI__"))
        .map_err(|_| "failed to access __TAURI__".to_string())?;
    if tauri.is_undefined() || tauri.is_null() {
        return Err("Tauri bridge unavailable".into());
    }
    Ok(tauri)
}

/// Finds `name` either directly on `__TAURI__` or under one of the given
/// namespaces, returning the receiver together with the function.
fn tauri_fn(name: &str, namespaces: &[&str]) -> Result<(JsValue, Function), String> {
    let tauri = tauri_global()?;

    let direct = Reflect::get(&tauri, &JsValue::from_str(name)).ok();
    if let Some(v) = direct {
        if v.is_function() {
            return Ok((tauri, v.unchecked_into::<Function>()));
        }
    }

    for ns_name in namespaces {
        let Ok(ns) = Reflect::get(&tauri, &JsValue::from_str(ns_name)) else {
            continue;
        };
        if ns.is_undefined() || ns.is_null() {
            continue;
        }
        if let Ok(v) = Reflect::get(&ns, &JsValue::from_str(name)) {
            if v.is_function() {
                return Ok((ns, v.unchecked_into::<Function>()));
            }
        }
    }

    Err(format!("no {name} function available"))
}

pub async fn call<A, R>(cmd: &str, args: &A) -> Result<R, String>
where
    A: Serialize,
    R: DeserializeOwned,
{
    let (this_obj, invoke) = tauri_fn("invoke", &["tauri", "core"])?;
    let args = args
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| e.to_string())?;
    let js = invoke
        .call2(&this_obj, &JsValue::from_str(cmd), &args)
        .map_err(|e| format!("invoke failed: {e:?}"))?;
    let val = JsFuture::from(Promise::from(js))
        .await
        .map_err(|e| format!("invoke rejected: {e:?}"))?;
    serde_wasm_bindgen::from_value(val).map_err(|e| e.to_string())
}

/// Registers `handler` for a backend event and returns the unlisten function.
pub async fn listen(event: &str, handler: &Closure<dyn FnMut(JsValue)>) -> Result<Function, String> {
    let (this_obj, listen) = tauri_fn("listen", &["event"])?;
    let js = listen
        .call2(&this_obj, &JsValue::from_str(event), handler.as_ref())
        .map_err(|e| format!("listen failed: {e:?}"))?;
    let unlisten = JsFuture::from(Promise::from(js))
        .await
        .map_err(|e| format!("listen rejected: {e:?}"))?;
    unlisten
        .dyn_into::<Function>()
        .map_err(|_| "listen did not return an unlisten function".to_string())
}

pub async fn login_options() -> Result<LoginOptions, String> {
    call("list_parties_cmd", &()).await
}

pub async fn login(party: &str, password: &str) -> Result<SessionContext, String> {
    call(
        "login_cmd",
        &serde_json::json!({ "party": party, "password": password }),
    )
    .await
}

pub async fn logout() -> Result<(), String> {
    call("logout_cmd", &()).await
}

pub async fn current_session() -> Result<Option<SessionContext>, String> {
    call("current_session_cmd", &()).await
}

pub async fn exercise(command: &ExerciseCommand) -> Result<serde_json::Value, String> {
    call("exercise_cmd", &serde_json::json!({ "command": command })).await
}

pub async fn subscribe(subscription_id: &str, template: TemplateId) -> Result<(), String> {
    call(
        "subscribe_cmd",
        &serde_json::json!({ "subscriptionId": subscription_id, "templateId": template }),
    )
    .await
}

pub async fn unsubscribe(subscription_id: &str) -> Result<bool, String> {
    call(
        "unsubscribe_cmd",
        &serde_json::json!({ "subscriptionId": subscription_id }),
    )
    .await
}

thread_local! {
    static NEXT_SUBSCRIPTION: Cell<u64> = const { Cell::new(0) };
}

fn next_subscription_id() -> String {
    let n = NEXT_SUBSCRIPTION.with(|c| {
        let n = c.get() + 1;
        c.set(n);
        n
    });
    format!("ui-{}-{n}", js_sys::Date::now() as u64)
}

type Update = Result<Vec<Contract>, LedgerError>;

struct Registration {
    subscription_id: String,
    unlisten: Vec<Function>,
    _handlers: Vec<Closure<dyn FnMut(JsValue)>>,
}

impl Registration {
    fn release(self) {
        for unlisten in &self.unlisten {
            let _ = unlisten.call0(&JsValue::NULL);
        }
        let id = self.subscription_id;
        spawn_local(async move {
            if let Err(err) = unsubscribe(&id).await {
                warn!("unsubscribe {id} failed: {err}");
            }
        });
    }
}

#[derive(Default)]
struct Link {
    dropped: bool,
    registration: Option<Registration>,
}

/// Backend-driven live query. Dropping it stops the backend pump.
struct LiveQuery {
    rx: mpsc::UnboundedReceiver<Update>,
    link: Rc<RefCell<Link>>,
}

impl Stream for LiveQuery {
    type Item = Update;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Update>> {
        self.rx.poll_next_unpin(cx)
    }
}

impl Drop for LiveQuery {
    fn drop(&mut self) {
        let registration = {
            let mut link = self.link.borrow_mut();
            link.dropped = true;
            link.registration.take()
        };
        if let Some(registration) = registration {
            registration.release();
        }
    }
}

fn handler<T: DeserializeOwned + 'static>(
    subscription_id: String,
    tx: mpsc::UnboundedSender<Update>,
    map: impl Fn(T) -> Update + 'static,
    id_of: impl Fn(&T) -> &str + 'static,
) -> Closure<dyn FnMut(JsValue)> {
    Closure::wrap(Box::new(move |event: JsValue| {
        match serde_wasm_bindgen::from_value::<EventEnvelope<T>>(event) {
            Ok(envelope) if id_of(&envelope.payload) == subscription_id => {
                let _ = tx.unbounded_send(map(envelope.payload));
            }
            Ok(_) => {}
            Err(err) => warn!("malformed subscription event: {err}"),
        }
    }) as Box<dyn FnMut(JsValue)>)
}

async fn open_live_query(
    template: TemplateId,
    subscription_id: String,
    tx: mpsc::UnboundedSender<Update>,
    link: Rc<RefCell<Link>>,
) -> Result<(), String> {
    let updated = handler::<ContractsUpdatedDto>(
        subscription_id.clone(),
        tx.clone(),
        |dto| Ok(dto.contracts),
        |dto| dto.subscription_id.as_str(),
    );
    let failed = handler::<SubscriptionFailedDto>(
        subscription_id.clone(),
        tx,
        |dto| Err(LedgerError::Transport(dto.error)),
        |dto| dto.subscription_id.as_str(),
    );
    let unlisten_updated = listen(CONTRACTS_UPDATED, &updated).await?;
    let unlisten_failed = listen(SUBSCRIPTION_FAILED, &failed).await?;

    let registration = Registration {
        subscription_id: subscription_id.clone(),
        unlisten: vec![unlisten_updated, unlisten_failed],
        _handlers: vec![updated, failed],
    };
    let dropped = {
        let mut link = link.borrow_mut();
        if !link.dropped {
            link.registration = Some(registration);
            None
        } else {
            Some(registration)
        }
    };
    if let Some(registration) = dropped {
        registration.release();
        return Ok(());
    }

    subscribe(&subscription_id, template).await?;
    if link.borrow().dropped {
        unsubscribe(&subscription_id).await?;
    }
    Ok(())
}

/// Ledger access through the desktop backend's commands and events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TauriLedger;

impl LedgerQuery for TauriLedger {
    fn stream_query(&self, template: TemplateId) -> ContractStream {
        let (tx, rx) = mpsc::unbounded();
        let link = Rc::new(RefCell::new(Link::default()));
        let subscription_id = next_subscription_id();

        let setup_link = link.clone();
        let setup_tx = tx.clone();
        spawn_local(async move {
            if let Err(err) = open_live_query(template, subscription_id, tx, setup_link).await {
                let _ = setup_tx.unbounded_send(Err(LedgerError::Transport(err)));
            }
        });

        LiveQuery { rx, link }.boxed_local()
    }
}

impl LedgerCommand for TauriLedger {
    fn exercise(&self, command: ExerciseCommand) -> CommandFuture {
        async move {
            exercise(&command)
                .await
                .map_err(LedgerError::Rejected)
        }
        .boxed_local()
    }
}
